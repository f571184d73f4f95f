//! 進捗通知。

use serde::Serialize;

use crate::store::models::DeliveryStatus;

/// 受信者1件の処理ごとに発行される一時的な進捗イベント。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub current: usize,
    pub total: usize,
    pub percent: u32,
    pub last_recipient: Option<String>,
    pub last_status: Option<DeliveryStatus>,
}

/// `round(100 * current / total)`（0.5は切り上げ）。
#[must_use]
pub fn percent_complete(current: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let rounded = (200 * current + total) / (2 * total);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// 進捗の受け手。ディスパッチループから同期的に呼ばれる。
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event);
    }
}
