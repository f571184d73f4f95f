// テスト用のインメモリBatchLedger実装
// DB接続なしで動作し、書き込み失敗を注入できる

use std::sync::Mutex;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ledger::BatchLedger;
use super::models::{
    AllTimeTotals, Batch, BatchStatus, DeliveryRecord, DeliveryStatus, MessageTotals,
    NewDeliveryRecord, Statistics,
};

#[derive(Default)]
struct MockState {
    batches: Vec<Batch>,
    records: Vec<DeliveryRecord>,
}

/// テスト用のモックBatchLedger
#[derive(Default)]
pub(crate) struct MockBatchLedger {
    state: Mutex<MockState>,
    fail_create: bool,
    /// 記録がこの件数に達した後の追記を失敗させる
    fail_appends_after: Option<usize>,
}

impl MockBatchLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// create_batch が常に失敗するレジャー
    pub(crate) fn unavailable() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    /// `count` 件の配信記録を書き込んだ後に到達不能になるレジャー
    pub(crate) fn failing_after(count: usize) -> Self {
        Self {
            fail_appends_after: Some(count),
            ..Self::default()
        }
    }

    pub(crate) fn batches(&self) -> Vec<Batch> {
        self.state.lock().expect("mock ledger lock").batches.clone()
    }

    pub(crate) fn records(&self) -> Vec<DeliveryRecord> {
        self.state.lock().expect("mock ledger lock").records.clone()
    }

    pub(crate) fn batch(&self, batch_id: i64) -> Option<Batch> {
        self.batches().into_iter().find(|batch| batch.id == batch_id)
    }
}

#[async_trait]
impl BatchLedger for MockBatchLedger {
    async fn create_batch(
        &self,
        sender_id: &str,
        message: &str,
        total_recipients: u32,
    ) -> Result<i64> {
        if self.fail_create {
            bail!("mock ledger unavailable");
        }
        let mut state = self.state.lock().expect("mock ledger lock");
        let id = i64::try_from(state.batches.len())? + 1;
        state.batches.push(Batch {
            id,
            sender_id: sender_id.to_string(),
            message: message.to_string(),
            total_recipients,
            sent_count: 0,
            failed_count: 0,
            status: BatchStatus::Sending,
            created_at: Utc::now(),
            completed_at: None,
        });
        Ok(id)
    }

    async fn append_delivery_record(&self, record: &NewDeliveryRecord) -> Result<()> {
        let mut state = self.state.lock().expect("mock ledger lock");
        if self
            .fail_appends_after
            .is_some_and(|limit| state.records.len() >= limit)
        {
            bail!("mock ledger connection lost");
        }
        let id = i64::try_from(state.records.len())? + 1;
        state.records.push(DeliveryRecord {
            id,
            batch_id: record.batch_id,
            recipient: record.recipient.clone(),
            message: record.message.clone(),
            sender_id: record.sender_id.clone(),
            status: record.status,
            response: record.response.clone(),
            error: record.error.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn finalize_batch(
        &self,
        batch_id: i64,
        sent_count: u32,
        failed_count: u32,
    ) -> Result<BatchStatus> {
        let mut state = self.state.lock().expect("mock ledger lock");
        let batch = state
            .batches
            .iter_mut()
            .find(|batch| batch.id == batch_id)
            .ok_or_else(|| anyhow!("batch {batch_id} not found"))?;
        let status = BatchStatus::from_counts(sent_count, failed_count);
        batch.sent_count = sent_count;
        batch.failed_count = failed_count;
        batch.status = status;
        batch.completed_at = Some(Utc::now());
        Ok(status)
    }

    async fn ping(&self) -> Result<()> {
        if self.fail_create {
            bail!("mock ledger unavailable");
        }
        Ok(())
    }

    async fn list_batches(&self, limit: i64, offset: i64) -> Result<Vec<Batch>> {
        let mut batches = self.batches();
        batches.reverse();
        Ok(page(batches, limit, offset))
    }

    async fn count_batches(&self) -> Result<i64> {
        Ok(i64::try_from(self.batches().len())?)
    }

    async fn get_batch(&self, batch_id: i64) -> Result<Option<Batch>> {
        Ok(self.batch(batch_id))
    }

    async fn batch_records(&self, batch_id: i64) -> Result<Vec<DeliveryRecord>> {
        Ok(self
            .records()
            .into_iter()
            .filter(|record| record.batch_id == batch_id)
            .collect())
    }

    async fn list_records(&self, limit: i64, offset: i64) -> Result<Vec<DeliveryRecord>> {
        let mut records = self.records();
        records.reverse();
        Ok(page(records, limit, offset))
    }

    async fn count_records(&self) -> Result<i64> {
        Ok(i64::try_from(self.records().len())?)
    }

    async fn statistics(&self) -> Result<Statistics> {
        let records = self.records();
        let totals = totals(&records);
        let mut batch_ids: Vec<i64> = records.iter().map(|record| record.batch_id).collect();
        batch_ids.sort_unstable();
        batch_ids.dedup();
        Ok(Statistics {
            all_time: AllTimeTotals {
                messages: totals,
                total_batches: i64::try_from(batch_ids.len())?,
            },
            today: totals,
        })
    }

    async fn search_by_recipient(
        &self,
        fragment: &str,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>> {
        let mut records: Vec<DeliveryRecord> = self
            .records()
            .into_iter()
            .filter(|record| record.recipient.contains(fragment))
            .collect();
        records.reverse();
        Ok(page(records, limit, 0))
    }

    async fn records_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>> {
        let mut records: Vec<DeliveryRecord> = self
            .records()
            .into_iter()
            .filter(|record| record.created_at >= start && record.created_at <= end)
            .collect();
        records.reverse();
        Ok(page(records, limit, 0))
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}

fn totals(records: &[DeliveryRecord]) -> MessageTotals {
    let count = |status: DeliveryStatus| {
        i64::try_from(records.iter().filter(|r| r.status == status).count()).unwrap_or(i64::MAX)
    };
    MessageTotals {
        total_messages: i64::try_from(records.len()).unwrap_or(i64::MAX),
        sent_messages: count(DeliveryStatus::Success),
        failed_messages: count(DeliveryStatus::Failed),
    }
}
