use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// BatchStatus - 一括送信バッチのライフサイクル状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Sending,
    Completed,
    Partial,
    Failed,
}

impl BatchStatus {
    /// 最終的な送信数と失敗数から終端ステータスを導出する。
    ///
    /// 成功と失敗が混在すれば `Partial`、成功が0件なら `Failed`、それ以外は `Completed`。
    #[must_use]
    pub fn from_counts(sent_count: u32, failed_count: u32) -> Self {
        if failed_count > 0 && sent_count > 0 {
            BatchStatus::Partial
        } else if sent_count == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Sending => "sending",
            BatchStatus::Completed => "completed",
            BatchStatus::Partial => "partial",
            BatchStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(BatchStatus::Pending),
            "sending" => Some(BatchStatus::Sending),
            "completed" => Some(BatchStatus::Completed),
            "partial" => Some(BatchStatus::Partial),
            "failed" => Some(BatchStatus::Failed),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Partial | BatchStatus::Failed
        )
    }
}

/// DeliveryStatus - 受信者ごとの配信結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
    Pending,
}

impl DeliveryStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Pending => "pending",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(DeliveryStatus::Success),
            "failed" => Some(DeliveryStatus::Failed),
            "pending" => Some(DeliveryStatus::Pending),
            _ => None,
        }
    }
}

/// 永続化された一括送信バッチ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub id: i64,
    pub sender_id: String,
    pub message: String,
    pub total_recipients: u32,
    pub sent_count: u32,
    pub failed_count: u32,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// 永続化された受信者ごとの配信記録（追記のみ）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRecord {
    pub id: i64,
    pub batch_id: i64,
    pub recipient: String,
    pub message: String,
    pub sender_id: String,
    pub status: DeliveryStatus,
    pub response: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 追記前の配信記録。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeliveryRecord {
    pub batch_id: i64,
    pub recipient: String,
    pub message: String,
    pub sender_id: String,
    pub status: DeliveryStatus,
    pub response: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MessageTotals {
    pub total_messages: i64,
    pub sent_messages: i64,
    pub failed_messages: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AllTimeTotals {
    #[serde(flatten)]
    pub messages: MessageTotals,
    pub total_batches: i64,
}

/// 配信記録から集計した送信統計。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    #[serde(rename = "allTime")]
    pub all_time: AllTimeTotals,
    pub today: MessageTotals,
}
