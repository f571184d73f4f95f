//! 1回のディスパッチ実行における送信結果の集計。

use serde::Serialize;

use crate::clients::GatewayOutcome;
use crate::store::models::DeliveryStatus;

use super::progress::{ProgressEvent, percent_complete};

/// 受信者1件分の結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryDetail {
    pub recipient: String,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub http_status: Option<u16>,
}

impl DeliveryDetail {
    fn from_outcome(recipient: &str, outcome: GatewayOutcome) -> Self {
        let http_status = outcome.http_status();
        let status = outcome.delivery_status();
        match outcome {
            GatewayOutcome::Success { body, .. } => Self {
                recipient: recipient.to_string(),
                status,
                response: Some(body),
                error: None,
                http_status,
            },
            GatewayOutcome::Failure { error, .. } => Self {
                recipient: recipient.to_string(),
                status,
                response: None,
                error: Some(error),
                http_status,
            },
        }
    }
}

/// 集計結果。送信順に並んだ明細を持つ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub details: Vec<DeliveryDetail>,
}

/// ディスパッチループ専有の可変集計器。並行呼び出しは想定しない。
#[derive(Debug)]
pub struct OutcomeAccumulator {
    result: RunResult,
}

impl OutcomeAccumulator {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            result: RunResult {
                total,
                sent: 0,
                failed: 0,
                details: Vec::with_capacity(total),
            },
        }
    }

    /// 受信者1件の結果を追記し、送信数または失敗数を加算する。
    pub fn record_outcome(&mut self, recipient: &str, outcome: GatewayOutcome) -> &DeliveryDetail {
        if outcome.is_success() {
            self.result.sent += 1;
        } else {
            self.result.failed += 1;
        }
        self.result
            .details
            .push(DeliveryDetail::from_outcome(recipient, outcome));
        &self.result.details[self.result.details.len() - 1]
    }

    /// 現在の集計とループ位置（0始まり）から進捗イベントを導出する。状態は変更しない。
    #[must_use]
    pub fn snapshot_progress(&self, index: usize, total: usize) -> ProgressEvent {
        let current = index + 1;
        let last = self.result.details.last();
        ProgressEvent {
            current,
            total,
            percent: percent_complete(current, total),
            last_recipient: last.map(|detail| detail.recipient.clone()),
            last_status: last.map(|detail| detail.status),
        }
    }

    #[must_use]
    pub fn result(&self) -> &RunResult {
        &self.result
    }

    #[must_use]
    pub fn into_result(self) -> RunResult {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> GatewayOutcome {
        GatewayOutcome::Success {
            body: body.to_string(),
            status: 200,
        }
    }

    #[test]
    fn tallies_successes_and_failures_in_order() {
        let mut accumulator = OutcomeAccumulator::new(3);
        accumulator.record_outcome("254700000001", ok("id-1"));
        accumulator.record_outcome(
            "254700000002",
            GatewayOutcome::Failure {
                error: "rejected".to_string(),
                status: Some(422),
            },
        );
        accumulator.record_outcome("254700000003", GatewayOutcome::transport("timed out"));

        let result = accumulator.into_result();
        assert_eq!(result.total, 3);
        assert_eq!(result.sent, 1);
        assert_eq!(result.failed, 2);
        assert_eq!(result.sent + result.failed, result.total);

        let recipients: Vec<&str> = result.details.iter().map(|d| d.recipient.as_str()).collect();
        assert_eq!(recipients, ["254700000001", "254700000002", "254700000003"]);

        assert_eq!(result.details[0].response.as_deref(), Some("id-1"));
        assert!(result.details[0].error.is_none());
        assert_eq!(result.details[1].error.as_deref(), Some("rejected"));
        assert!(result.details[1].response.is_none());
        assert_eq!(result.details[1].http_status, Some(422));
        assert_eq!(result.details[2].http_status, None);
    }

    #[test]
    fn snapshot_reflects_last_recorded_outcome_without_mutation() {
        let mut accumulator = OutcomeAccumulator::new(2);
        accumulator.record_outcome("254700000001", ok("id-1"));

        let event = accumulator.snapshot_progress(0, 2);
        assert_eq!(event.current, 1);
        assert_eq!(event.total, 2);
        assert_eq!(event.percent, 50);
        assert_eq!(event.last_recipient.as_deref(), Some("254700000001"));
        assert_eq!(event.last_status, Some(DeliveryStatus::Success));

        assert_eq!(accumulator.snapshot_progress(0, 2), event);
        assert_eq!(accumulator.result().details.len(), 1);
    }

    #[test]
    fn detail_serializes_response_or_error_only() {
        let mut accumulator = OutcomeAccumulator::new(2);
        accumulator.record_outcome("254700000001", ok("id-1"));
        accumulator.record_outcome("254700000002", GatewayOutcome::transport("reset"));
        let value = serde_json::to_value(accumulator.result()).expect("serializes");

        assert_eq!(value["details"][0]["status"], "success");
        assert_eq!(value["details"][0]["response"], "id-1");
        assert!(value["details"][0].get("error").is_none());
        assert_eq!(value["details"][1]["status"], "failed");
        assert_eq!(value["details"][1]["error"], "reset");
        assert!(value["details"][1].get("response").is_none());
    }
}
