//! Dispatch request and result types.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::clients::Credentials;
use crate::store::models::BatchStatus;

use super::accumulator::RunResult;

/// 受信者間の既定の送信間隔。
pub const DEFAULT_DISPATCH_DELAY: Duration = Duration::from_millis(500);

/// 一括送信の入力。受信者は正規化・重複排除済みであることを前提とする。
#[derive(Debug, Clone)]
pub struct BulkSendRequest {
    pub recipients: Vec<String>,
    pub message: String,
    pub credentials: Credentials,
    pub sender_id: String,
    /// 受信者間の待機時間（最後の受信者の後は待たない）
    pub delay: Duration,
}

impl BulkSendRequest {
    pub fn new(
        recipients: Vec<String>,
        message: impl Into<String>,
        credentials: Credentials,
        sender_id: impl Into<String>,
    ) -> Self {
        Self {
            recipients,
            message: message.into(),
            credentials,
            sender_id: sender_id.into(),
            delay: DEFAULT_DISPATCH_DELAY,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 副作用の前に必須入力を検証する。
    ///
    /// # Errors
    /// 受信者・本文・認証情報・送信者IDのいずれかが欠けていれば
    /// [`DispatchError::PreconditionViolation`] を返す。
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.recipients.is_empty() {
            return Err(DispatchError::PreconditionViolation(
                "recipients must be a non-empty array".to_string(),
            ));
        }
        if let Some(position) = self
            .recipients
            .iter()
            .position(|recipient| recipient.trim().is_empty())
        {
            return Err(DispatchError::PreconditionViolation(format!(
                "recipient at position {position} is empty"
            )));
        }
        if self.message.trim().is_empty() {
            return Err(DispatchError::PreconditionViolation(
                "message is required".to_string(),
            ));
        }
        if !self.credentials.is_complete() || self.sender_id.trim().is_empty() {
            return Err(DispatchError::PreconditionViolation(
                "missing API credentials or sender ID".to_string(),
            ));
        }
        Ok(())
    }
}

/// ディスパッチの致命的エラー。受信者単位のゲートウェイ失敗はここには含まれない。
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),
    #[error("ledger unavailable: {0:#}")]
    LedgerUnavailable(#[source] anyhow::Error),
}

/// 完了したディスパッチの結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub batch_id: i64,
    #[serde(skip)]
    pub status: BatchStatus,
    #[serde(flatten)]
    pub result: RunResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(recipients: &[&str]) -> BulkSendRequest {
        BulkSendRequest::new(
            recipients.iter().map(ToString::to_string).collect(),
            "hello",
            Credentials::new("user", "pass"),
            "SEMA",
        )
    }

    #[test]
    fn default_delay_is_half_a_second() {
        assert_eq!(request(&["254712345678"]).delay, Duration::from_millis(500));
    }

    #[test]
    fn validate_accepts_complete_request() {
        assert!(request(&["254712345678"]).validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_pieces() {
        assert!(matches!(
            request(&[]).validate(),
            Err(DispatchError::PreconditionViolation(_))
        ));
        assert!(matches!(
            request(&["254712345678", " "]).validate(),
            Err(DispatchError::PreconditionViolation(msg)) if msg.contains("position 1")
        ));

        let mut no_message = request(&["254712345678"]);
        no_message.message = String::new();
        assert!(no_message.validate().is_err());

        let mut no_sender = request(&["254712345678"]);
        no_sender.sender_id = String::new();
        assert!(no_sender.validate().is_err());

        let mut no_password = request(&["254712345678"]);
        no_password.credentials = Credentials::new("user", "");
        assert!(no_password.validate().is_err());
    }

    #[test]
    fn report_serializes_caller_facing_shape() {
        let report = DispatchReport {
            batch_id: 7,
            status: BatchStatus::Completed,
            result: RunResult {
                total: 1,
                sent: 1,
                failed: 0,
                details: Vec::new(),
            },
        };
        let value = serde_json::to_value(&report).expect("serializes");
        assert_eq!(value["batchId"], 7);
        assert_eq!(value["total"], 1);
        assert_eq!(value["sent"], 1);
        assert_eq!(value["failed"], 0);
        assert!(value.get("status").is_none());
    }
}
