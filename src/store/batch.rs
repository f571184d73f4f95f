use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::models::{Batch, BatchStatus};

pub(crate) struct BatchQueries;

impl BatchQueries {
    /// `sending` 状態でバッチを作成する。
    pub(crate) async fn create(
        pool: &PgPool,
        sender_id: &str,
        message: &str,
        total_recipients: u32,
    ) -> Result<i64> {
        let total = i32::try_from(total_recipients).context("total_recipients exceeds INT range")?;

        let row = sqlx::query(
            r"
            INSERT INTO sms_batches (sender_id, message, total_recipients, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(sender_id)
        .bind(message)
        .bind(total)
        .bind(BatchStatus::Sending.as_str())
        .fetch_one(pool)
        .await
        .context("failed to insert sms_batches record")?;

        row.try_get("id").context("failed to read inserted batch id")
    }

    /// 最終カウントとステータスを書き込み、完了時刻を刻む。
    pub(crate) async fn finalize(
        pool: &PgPool,
        batch_id: i64,
        sent_count: u32,
        failed_count: u32,
    ) -> Result<BatchStatus> {
        let status = BatchStatus::from_counts(sent_count, failed_count);

        let result = sqlx::query(
            r"
            UPDATE sms_batches
            SET sent_count = $2,
                failed_count = $3,
                status = $4,
                completed_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(batch_id)
        .bind(i32::try_from(sent_count).context("sent_count exceeds INT range")?)
        .bind(i32::try_from(failed_count).context("failed_count exceeds INT range")?)
        .bind(status.as_str())
        .execute(pool)
        .await
        .context("failed to finalize sms_batches record")?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                batch_id,
                status = status.as_str(),
                "finalize_batch affected 0 rows - batch may have been deleted"
            );
        }

        Ok(status)
    }

    pub(crate) async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Batch>> {
        let rows = sqlx::query(
            r"
            SELECT id, sender_id, message, total_recipients, sent_count, failed_count,
                   status, created_at, completed_at
            FROM sms_batches
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("failed to fetch sms_batches")?;

        rows.iter().map(batch_from_row).collect()
    }

    pub(crate) async fn count(pool: &PgPool) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM sms_batches")
            .fetch_one(pool)
            .await
            .context("failed to count sms_batches")?;
        row.try_get("count").context("failed to read batch count")
    }

    pub(crate) async fn find(pool: &PgPool, batch_id: i64) -> Result<Option<Batch>> {
        let row = sqlx::query(
            r"
            SELECT id, sender_id, message, total_recipients, sent_count, failed_count,
                   status, created_at, completed_at
            FROM sms_batches
            WHERE id = $1
            ",
        )
        .bind(batch_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch sms_batches record")?;

        row.as_ref().map(batch_from_row).transpose()
    }
}

fn batch_from_row(row: &PgRow) -> Result<Batch> {
    let status_raw: String = row.try_get("status")?;
    let status = BatchStatus::parse(&status_raw)
        .ok_or_else(|| anyhow!("unknown batch status in sms_batches: {status_raw}"))?;

    Ok(Batch {
        id: row.try_get("id")?,
        sender_id: row.try_get("sender_id")?,
        message: row.try_get("message")?,
        total_recipients: non_negative(row.try_get("total_recipients")?),
        sent_count: non_negative(row.try_get("sent_count")?),
        failed_count: non_negative(row.try_get("failed_count")?),
        status,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}
