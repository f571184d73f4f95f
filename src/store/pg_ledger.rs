/// PgBatchLedger - BatchLedgerトレイトのPostgreSQL実装
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::batch::BatchQueries;
use super::ledger::BatchLedger;
use super::models::{Batch, BatchStatus, DeliveryRecord, NewDeliveryRecord, Statistics};
use super::record::RecordQueries;

#[derive(Debug, Clone)]
pub struct PgBatchLedger {
    pool: PgPool,
}

impl PgBatchLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchLedger for PgBatchLedger {
    async fn create_batch(
        &self,
        sender_id: &str,
        message: &str,
        total_recipients: u32,
    ) -> Result<i64> {
        BatchQueries::create(&self.pool, sender_id, message, total_recipients).await
    }

    async fn append_delivery_record(&self, record: &NewDeliveryRecord) -> Result<()> {
        RecordQueries::insert(&self.pool, record).await
    }

    async fn finalize_batch(
        &self,
        batch_id: i64,
        sent_count: u32,
        failed_count: u32,
    ) -> Result<BatchStatus> {
        BatchQueries::finalize(&self.pool, batch_id, sent_count, failed_count).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("sms database ping failed")?;
        Ok(())
    }

    async fn list_batches(&self, limit: i64, offset: i64) -> Result<Vec<Batch>> {
        BatchQueries::list(&self.pool, limit, offset).await
    }

    async fn count_batches(&self) -> Result<i64> {
        BatchQueries::count(&self.pool).await
    }

    async fn get_batch(&self, batch_id: i64) -> Result<Option<Batch>> {
        BatchQueries::find(&self.pool, batch_id).await
    }

    async fn batch_records(&self, batch_id: i64) -> Result<Vec<DeliveryRecord>> {
        RecordQueries::for_batch(&self.pool, batch_id).await
    }

    async fn list_records(&self, limit: i64, offset: i64) -> Result<Vec<DeliveryRecord>> {
        RecordQueries::list(&self.pool, limit, offset).await
    }

    async fn count_records(&self) -> Result<i64> {
        RecordQueries::count(&self.pool).await
    }

    async fn statistics(&self) -> Result<Statistics> {
        RecordQueries::statistics(&self.pool).await
    }

    async fn search_by_recipient(
        &self,
        fragment: &str,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>> {
        RecordQueries::search_by_recipient(&self.pool, fragment, limit).await
    }

    async fn records_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>> {
        RecordQueries::between(&self.pool, start, end, limit).await
    }
}
