//! 起動時のスキーマ初期化（冪等）。

use anyhow::{Context, Result};
use sqlx::{Executor, PgPool};

const CREATE_BATCHES: &str = r"
    CREATE TABLE IF NOT EXISTS sms_batches (
        id BIGSERIAL PRIMARY KEY,
        sender_id VARCHAR(50) NOT NULL,
        message TEXT NOT NULL,
        total_recipients INT NOT NULL,
        sent_count INT NOT NULL DEFAULT 0,
        failed_count INT NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'sending', 'completed', 'partial', 'failed')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        completed_at TIMESTAMPTZ
    );
    CREATE INDEX IF NOT EXISTS idx_sms_batches_created_at ON sms_batches (created_at);
    CREATE INDEX IF NOT EXISTS idx_sms_batches_status ON sms_batches (status);
";

const CREATE_RECORDS: &str = r"
    CREATE TABLE IF NOT EXISTS sms_records (
        id BIGSERIAL PRIMARY KEY,
        batch_id BIGINT NOT NULL REFERENCES sms_batches (id) ON DELETE CASCADE,
        recipient VARCHAR(20) NOT NULL,
        message TEXT NOT NULL,
        sender_id VARCHAR(50) NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('success', 'failed', 'pending')),
        response TEXT,
        error TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    CREATE INDEX IF NOT EXISTS idx_sms_records_batch_id ON sms_records (batch_id);
    CREATE INDEX IF NOT EXISTS idx_sms_records_status ON sms_records (status);
    CREATE INDEX IF NOT EXISTS idx_sms_records_created_at ON sms_records (created_at);
    CREATE INDEX IF NOT EXISTS idx_sms_records_recipient ON sms_records (recipient);
";

/// `sms_batches` と `sms_records` テーブルを作成する（既存なら何もしない）。
///
/// # Errors
/// DDLの実行に失敗した場合はエラーを返す。
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    pool.execute(CREATE_BATCHES)
        .await
        .context("failed to create sms_batches table")?;
    pool.execute(CREATE_RECORDS)
        .await
        .context("failed to create sms_records table")?;
    Ok(())
}
