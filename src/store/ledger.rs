//! BatchLedger trait - 一括送信バッチと配信記録の永続化境界

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{Batch, BatchStatus, DeliveryRecord, NewDeliveryRecord, Statistics};

/// BatchLedger - バッチ集計と配信記録のデータアクセス層
///
/// 各呼び出しは単独でコミットされる。バッチ全体を包むトランザクションは存在しない。
#[async_trait]
pub trait BatchLedger: Send + Sync {
    /// `sending` 状態・カウント0のバッチを作成し、IDを返す
    async fn create_batch(
        &self,
        sender_id: &str,
        message: &str,
        total_recipients: u32,
    ) -> Result<i64>;

    /// 受信者1件分の配信記録を追記する
    async fn append_delivery_record(&self, record: &NewDeliveryRecord) -> Result<()>;

    /// 最終カウントを書き込み、完了時刻を刻んで終端ステータスへ遷移させる
    async fn finalize_batch(
        &self,
        batch_id: i64,
        sent_count: u32,
        failed_count: u32,
    ) -> Result<BatchStatus>;

    /// 接続確認
    async fn ping(&self) -> Result<()>;

    async fn list_batches(&self, limit: i64, offset: i64) -> Result<Vec<Batch>>;

    async fn count_batches(&self) -> Result<i64>;

    async fn get_batch(&self, batch_id: i64) -> Result<Option<Batch>>;

    /// バッチに属する配信記録を追記順に返す
    async fn batch_records(&self, batch_id: i64) -> Result<Vec<DeliveryRecord>>;

    async fn list_records(&self, limit: i64, offset: i64) -> Result<Vec<DeliveryRecord>>;

    async fn count_records(&self) -> Result<i64>;

    async fn statistics(&self) -> Result<Statistics>;

    /// 受信者番号の部分一致で配信記録を検索する
    async fn search_by_recipient(&self, fragment: &str, limit: i64)
    -> Result<Vec<DeliveryRecord>>;

    async fn records_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>>;
}
