//! 一括送信ディスパッチループ。
//!
//! 受信者を1件ずつ順番に送信し、結果を配信記録として即時に追記する。
//! 同一バッチでゲートウェイ呼び出しが同時に2件以上走ることはない。

pub mod accumulator;
pub mod progress;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::clients::{Credentials, OutboundSms, SmsGateway};
use crate::observability::Metrics;
use crate::store::BatchLedger;
use crate::store::models::NewDeliveryRecord;
use crate::util::redact::redact_recipient;

pub use accumulator::{DeliveryDetail, OutcomeAccumulator, RunResult};
pub use progress::{ProgressEvent, ProgressObserver, percent_complete};
pub use types::{BulkSendRequest, DEFAULT_DISPATCH_DELAY, DispatchError, DispatchReport};

/// 単発送信（1件のバッチ）の結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleSendReport {
    pub batch_id: i64,
    pub detail: DeliveryDetail,
}

/// ゲートウェイとレジャーを束ねて一括送信を実行する。
#[derive(Clone)]
pub struct BulkDispatcher {
    gateway: Arc<dyn SmsGateway>,
    ledger: Arc<dyn BatchLedger>,
    metrics: Option<Arc<Metrics>>,
}

impl BulkDispatcher {
    pub fn new(gateway: Arc<dyn SmsGateway>, ledger: Arc<dyn BatchLedger>) -> Self {
        Self {
            gateway,
            ledger,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 一括送信を1回実行する。
    ///
    /// 受信者ごとのゲートウェイ失敗は結果に記録されるだけでループは止まらない。
    /// 配信記録の追記に失敗した時点でループを中断し、バッチは `sending` のまま残る。
    ///
    /// # Errors
    /// 入力が不足していれば副作用なしで [`DispatchError::PreconditionViolation`]、
    /// レジャーへの書き込みに失敗すれば [`DispatchError::LedgerUnavailable`] を返す。
    #[instrument(
        skip_all,
        fields(recipients = request.recipients.len(), sender_id = %request.sender_id)
    )]
    pub async fn run(
        &self,
        request: &BulkSendRequest,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<DispatchReport, DispatchError> {
        request.validate()?;

        let total = request.recipients.len();
        let total_u32 = u32::try_from(total).map_err(|_| {
            DispatchError::PreconditionViolation(format!("too many recipients: {total}"))
        })?;

        let batch_id = self
            .ledger
            .create_batch(&request.sender_id, &request.message, total_u32)
            .await
            .map_err(|error| self.ledger_failure(error))?;

        let started = Instant::now();
        if let Some(metrics) = &self.metrics {
            metrics.batches_started.inc();
            metrics.active_batches.inc();
        }
        info!(batch_id, total, "dispatch started");

        let outcome = self
            .dispatch_all(batch_id, request, total, observer)
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.active_batches.dec();
        }
        let result = outcome?;

        let sent = u32::try_from(result.sent).unwrap_or(u32::MAX);
        let failed = u32::try_from(result.failed).unwrap_or(u32::MAX);
        let status = self
            .ledger
            .finalize_batch(batch_id, sent, failed)
            .await
            .map_err(|error| self.ledger_failure(error))?;

        if let Some(metrics) = &self.metrics {
            metrics.record_batch_status(status);
            metrics
                .batch_duration
                .observe(started.elapsed().as_secs_f64());
        }
        info!(
            batch_id,
            total = result.total,
            sent = result.sent,
            failed = result.failed,
            status = status.as_str(),
            "dispatch finished"
        );

        Ok(DispatchReport {
            batch_id,
            status,
            result,
        })
    }

    /// 1件だけを送る。通常の一括送信と同じく1件のバッチとして記録される。
    ///
    /// # Errors
    /// [`BulkDispatcher::run`] と同じ条件でエラーを返す。
    pub async fn send_single(
        &self,
        recipient: impl Into<String>,
        message: impl Into<String>,
        credentials: Credentials,
        sender_id: impl Into<String>,
    ) -> Result<SingleSendReport, DispatchError> {
        let request = BulkSendRequest::new(vec![recipient.into()], message, credentials, sender_id)
            .with_delay(std::time::Duration::ZERO);
        let report = self.run(&request, None).await?;
        let batch_id = report.batch_id;
        let detail = report.result.details.into_iter().next().ok_or_else(|| {
            DispatchError::PreconditionViolation("single send produced no outcome".to_string())
        })?;
        Ok(SingleSendReport { batch_id, detail })
    }

    async fn dispatch_all(
        &self,
        batch_id: i64,
        request: &BulkSendRequest,
        total: usize,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<RunResult, DispatchError> {
        let mut accumulator = OutcomeAccumulator::new(total);

        for (index, recipient) in request.recipients.iter().enumerate() {
            let sms = OutboundSms {
                recipient,
                message: &request.message,
                sender_id: &request.sender_id,
            };

            let sent_at = Instant::now();
            let outcome = self.gateway.send(&sms, &request.credentials).await;
            if let Some(metrics) = &self.metrics {
                metrics
                    .gateway_latency
                    .observe(sent_at.elapsed().as_secs_f64());
                if outcome.is_success() {
                    metrics.messages_sent.inc();
                } else {
                    metrics.messages_failed.inc();
                }
            }

            let detail = accumulator.record_outcome(recipient, outcome);
            debug!(
                batch_id,
                index,
                recipient = %redact_recipient(recipient),
                status = detail.status.as_str(),
                http_status = ?detail.http_status,
                "recipient processed"
            );

            let record = NewDeliveryRecord {
                batch_id,
                recipient: recipient.clone(),
                message: request.message.clone(),
                sender_id: request.sender_id.clone(),
                status: detail.status,
                response: detail.response.clone(),
                error: detail.error.clone(),
            };
            self.ledger
                .append_delivery_record(&record)
                .await
                .map_err(|error| self.ledger_failure(error))?;

            if let Some(observer) = observer {
                observer.on_progress(&accumulator.snapshot_progress(index, total));
            }

            if index + 1 < total && !request.delay.is_zero() {
                tokio::time::sleep(request.delay).await;
            }
        }

        Ok(accumulator.into_result())
    }

    fn ledger_failure(&self, error: anyhow::Error) -> DispatchError {
        warn!(error = %format!("{error:#}"), "ledger write failed; aborting dispatch");
        if let Some(metrics) = &self.metrics {
            metrics.ledger_failures.inc();
        }
        DispatchError::LedgerUnavailable(error)
    }
}
