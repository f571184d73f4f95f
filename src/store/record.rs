use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::models::{
    AllTimeTotals, DeliveryRecord, DeliveryStatus, MessageTotals, NewDeliveryRecord, Statistics,
};

const RECORD_COLUMNS: &str =
    "id, batch_id, recipient, message, sender_id, status, response, error, created_at";

pub(crate) struct RecordQueries;

impl RecordQueries {
    pub(crate) async fn insert(pool: &PgPool, record: &NewDeliveryRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO sms_records
                (batch_id, recipient, message, sender_id, status, response, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(record.batch_id)
        .bind(&record.recipient)
        .bind(&record.message)
        .bind(&record.sender_id)
        .bind(record.status.as_str())
        .bind(record.response.as_deref())
        .bind(record.error.as_deref())
        .execute(pool)
        .await
        .context("failed to insert sms_records record")?;

        Ok(())
    }

    /// 追記順（id昇順）で返す。
    pub(crate) async fn for_batch(pool: &PgPool, batch_id: i64) -> Result<Vec<DeliveryRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM sms_records WHERE batch_id = $1 ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .bind(batch_id)
            .fetch_all(pool)
            .await
            .context("failed to fetch sms_records for batch")?;

        rows.iter().map(record_from_row).collect()
    }

    pub(crate) async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<DeliveryRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM sms_records ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
            .context("failed to fetch sms_records")?;

        rows.iter().map(record_from_row).collect()
    }

    pub(crate) async fn count(pool: &PgPool) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM sms_records")
            .fetch_one(pool)
            .await
            .context("failed to count sms_records")?;
        row.try_get("count").context("failed to read record count")
    }

    pub(crate) async fn search_by_recipient(
        pool: &PgPool,
        fragment: &str,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM sms_records WHERE recipient LIKE $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(format!("%{}%", escape_like(fragment)))
            .bind(limit)
            .fetch_all(pool)
            .await
            .context("failed to search sms_records by recipient")?;

        rows.iter().map(record_from_row).collect()
    }

    pub(crate) async fn between(
        pool: &PgPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM sms_records WHERE created_at BETWEEN $1 AND $2 ORDER BY created_at DESC, id DESC LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(start)
            .bind(end)
            .bind(limit)
            .fetch_all(pool)
            .await
            .context("failed to fetch sms_records by date range")?;

        rows.iter().map(record_from_row).collect()
    }

    pub(crate) async fn statistics(pool: &PgPool) -> Result<Statistics> {
        let all_time = sqlx::query(
            r"
            SELECT
                COUNT(*) AS total_messages,
                COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0) AS sent_messages,
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed_messages,
                COUNT(DISTINCT batch_id) AS total_batches
            FROM sms_records
            ",
        )
        .fetch_one(pool)
        .await
        .context("failed to aggregate all-time statistics")?;

        let today = sqlx::query(
            r"
            SELECT
                COUNT(*) AS total_messages,
                COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0) AS sent_messages,
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed_messages
            FROM sms_records
            WHERE created_at >= date_trunc('day', NOW())
            ",
        )
        .fetch_one(pool)
        .await
        .context("failed to aggregate today's statistics")?;

        Ok(Statistics {
            all_time: AllTimeTotals {
                messages: totals_from_row(&all_time)?,
                total_batches: all_time.try_get("total_batches")?,
            },
            today: totals_from_row(&today)?,
        })
    }
}

fn totals_from_row(row: &PgRow) -> Result<MessageTotals> {
    Ok(MessageTotals {
        total_messages: row.try_get("total_messages")?,
        sent_messages: row.try_get("sent_messages")?,
        failed_messages: row.try_get("failed_messages")?,
    })
}

fn record_from_row(row: &PgRow) -> Result<DeliveryRecord> {
    let status_raw: String = row.try_get("status")?;
    let status = DeliveryStatus::parse(&status_raw)
        .ok_or_else(|| anyhow!("unknown delivery status in sms_records: {status_raw}"))?;

    Ok(DeliveryRecord {
        id: row.try_get("id")?,
        batch_id: row.try_get("batch_id")?,
        recipient: row.try_get("recipient")?,
        message: row.try_get("message")?,
        sender_id: row.try_get("sender_id")?,
        status,
        response: row.try_get("response")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
    })
}

/// LIKE パターンのワイルドカードをエスケープする。
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for ch in fragment.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_guards_wildcards() {
        assert_eq!(escape_like("2547"), "2547");
        assert_eq!(escape_like("25%_7"), "25\\%\\_7");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
