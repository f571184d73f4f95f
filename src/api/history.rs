//! 送信履歴の参照エンドポイント。
use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::app::AppState;
use crate::store::models::{Batch, DeliveryRecord, Statistics};

const DEFAULT_BATCH_PAGE: i64 = 50;
const DEFAULT_RECORD_PAGE: i64 = 100;
const DEFAULT_SEARCH_LIMIT: i64 = 50;
const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    limit: Option<String>,
    offset: Option<String>,
}

impl PageQuery {
    /// 数値でない・0以下の値は既定値として扱う。
    fn limit(&self, default: i64) -> i64 {
        parse_positive(self.limit.as_deref())
            .unwrap_or(default)
            .min(MAX_PAGE_SIZE)
    }

    fn offset(&self) -> i64 {
        parse_positive(self.offset.as_deref()).unwrap_or(0)
    }
}

fn parse_positive(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|value| *value > 0)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    recipient: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Pagination {
    limit: i64,
    offset: i64,
    total: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct DataResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
}

impl<T> DataResponse<T> {
    fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            pagination: None,
        }
    }

    fn paged(data: T, pagination: Pagination) -> Self {
        Self {
            success: true,
            data,
            pagination: Some(pagination),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatsData {
    #[serde(flatten)]
    statistics: Statistics,
    total_batches: i64,
    total_records: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchDetail {
    batch: Batch,
    records: Vec<DeliveryRecord>,
}

/// GET /api/sms/stats
pub(crate) async fn stats(
    State(state): State<AppState>,
) -> Result<Json<DataResponse<StatsData>>, ApiError> {
    let ledger = state.ledger();
    let statistics = ledger.statistics().await?;
    let total_batches = ledger.count_batches().await?;
    let total_records = ledger.count_records().await?;

    Ok(Json(DataResponse::new(StatsData {
        statistics,
        total_batches,
        total_records,
    })))
}

/// GET /api/sms/batches
pub(crate) async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<DataResponse<Vec<Batch>>>, ApiError> {
    let limit = query.limit(DEFAULT_BATCH_PAGE);
    let offset = query.offset();
    let ledger = state.ledger();
    let batches = ledger.list_batches(limit, offset).await?;
    let total = ledger.count_batches().await?;

    Ok(Json(DataResponse::paged(
        batches,
        Pagination {
            limit,
            offset,
            total,
        },
    )))
}

/// GET /api/sms/batches/{id}
/// バッチ本体と、その配信記録を追記順で返す。
pub(crate) async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<BatchDetail>>, ApiError> {
    let not_found = || ApiError::NotFound("Batch not found".to_string());
    let batch_id = id.parse::<i64>().map_err(|_| not_found())?;
    let ledger = state.ledger();
    let batch = ledger.get_batch(batch_id).await?.ok_or_else(not_found)?;
    let records = ledger.batch_records(batch_id).await?;

    Ok(Json(DataResponse::new(BatchDetail { batch, records })))
}

/// GET /api/sms/records
pub(crate) async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<DataResponse<Vec<DeliveryRecord>>>, ApiError> {
    let limit = query.limit(DEFAULT_RECORD_PAGE);
    let offset = query.offset();
    let ledger = state.ledger();
    let records = ledger.list_records(limit, offset).await?;
    let total = ledger.count_records().await?;

    Ok(Json(DataResponse::paged(
        records,
        Pagination {
            limit,
            offset,
            total,
        },
    )))
}

/// GET /api/sms/search?recipient=
pub(crate) async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<DataResponse<Vec<DeliveryRecord>>>, ApiError> {
    let Some(fragment) = query
        .recipient
        .as_deref()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
    else {
        return Err(ApiError::bad_request("Recipient query required"));
    };
    let limit = parse_positive(query.limit.as_deref())
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .min(MAX_PAGE_SIZE);

    let records = state.ledger().search_by_recipient(fragment, limit).await?;
    Ok(Json(DataResponse::new(records)))
}

/// GET /api/sms/records/range?start=&end=
/// RFC 3339形式の期間（両端を含む）で配信記録を返す。
pub(crate) async fn records_between(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<DataResponse<Vec<DeliveryRecord>>>, ApiError> {
    let start = parse_timestamp("start", query.start.as_deref())?;
    let end = parse_timestamp("end", query.end.as_deref())?;
    if start > end {
        return Err(ApiError::bad_request("start must not be after end"));
    }
    let limit = parse_positive(query.limit.as_deref())
        .unwrap_or(DEFAULT_RECORD_PAGE)
        .min(MAX_PAGE_SIZE);

    let records = state.ledger().records_between(start, end, limit).await?;
    Ok(Json(DataResponse::new(records)))
}

fn parse_timestamp(name: &str, raw: Option<&str>) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::bad_request(format!("{name} query required")))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| ApiError::bad_request(format!("invalid {name} timestamp: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, 50)]
    #[case(Some("20"), 20)]
    #[case(Some("0"), 50)]
    #[case(Some("-3"), 50)]
    #[case(Some("abc"), 50)]
    #[case(Some("5000"), MAX_PAGE_SIZE)]
    fn page_limit_falls_back_to_default(#[case] raw: Option<&str>, #[case] expected: i64) {
        let query = PageQuery {
            limit: raw.map(str::to_string),
            offset: None,
        };
        assert_eq!(query.limit(DEFAULT_BATCH_PAGE), expected);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn timestamps_require_rfc3339() {
        assert!(parse_timestamp("start", Some("2026-01-02T03:04:05Z")).is_ok());
        assert!(parse_timestamp("start", Some("2026-01-02T06:04:05+03:00")).is_ok());
        assert!(parse_timestamp("start", Some("yesterday")).is_err());
        assert!(parse_timestamp("end", None).is_err());
    }
}
