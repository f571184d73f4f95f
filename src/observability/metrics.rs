/// Prometheusメトリクス定義。
use prometheus::{
    Counter, Gauge, Histogram, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};

use crate::store::models::BatchStatus;

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub messages_sent: Counter,
    pub messages_failed: Counter,
    pub batches_started: Counter,
    pub batches_completed: Counter,
    pub batches_partial: Counter,
    pub batches_failed: Counter,
    pub ledger_failures: Counter,

    // ヒストグラム
    pub gateway_latency: Histogram,
    pub batch_duration: Histogram,

    // ゲージ
    pub active_batches: Gauge,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に登録済みの場合はエラーを返す。
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            messages_sent: register_counter_with_registry!(
                "sms_messages_sent_total",
                "Total number of messages accepted by the gateway",
                registry
            )?,
            messages_failed: register_counter_with_registry!(
                "sms_messages_failed_total",
                "Total number of messages rejected by the gateway or lost in transport",
                registry
            )?,
            batches_started: register_counter_with_registry!(
                "sms_batches_started_total",
                "Total number of batches created",
                registry
            )?,
            batches_completed: register_counter_with_registry!(
                "sms_batches_completed_total",
                "Number of batches where every recipient succeeded",
                registry
            )?,
            batches_partial: register_counter_with_registry!(
                "sms_batches_partial_total",
                "Number of batches with mixed outcomes",
                registry
            )?,
            batches_failed: register_counter_with_registry!(
                "sms_batches_failed_total",
                "Number of batches where no recipient succeeded",
                registry
            )?,
            ledger_failures: register_counter_with_registry!(
                "sms_ledger_failures_total",
                "Number of dispatch runs aborted by a ledger write failure",
                registry
            )?,
            gateway_latency: register_histogram_with_registry!(
                "sms_gateway_latency_seconds",
                "Latency of a single gateway send",
                registry
            )?,
            batch_duration: register_histogram_with_registry!(
                "sms_batch_duration_seconds",
                "Duration of an entire dispatch run including pacing",
                registry
            )?,
            active_batches: register_gauge_with_registry!(
                "sms_active_batches",
                "Number of dispatch runs currently in progress",
                registry
            )?,
        })
    }

    /// 終端ステータスに対応するカウンターを加算する。
    pub fn record_batch_status(&self, status: BatchStatus) {
        match status {
            BatchStatus::Completed => self.batches_completed.inc(),
            BatchStatus::Partial => self.batches_partial.inc(),
            BatchStatus::Failed => self.batches_failed.inc(),
            BatchStatus::Pending | BatchStatus::Sending => {}
        }
    }
}
