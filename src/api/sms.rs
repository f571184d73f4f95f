//! 送信系エンドポイント。
use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use super::error::ApiError;
use crate::app::AppState;
use crate::clients::Credentials;
use crate::dispatch::{BulkSendRequest, DispatchReport, ProgressEvent};
use crate::message::{SmsCount, count_sms};
use crate::recipients::{self, normalize_recipients};
use crate::store::models::DeliveryStatus;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CredentialsBody {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SingleSendBody {
    #[serde(default)]
    recipient: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    credentials: Option<CredentialsBody>,
    #[serde(default)]
    sender_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkSendBody {
    #[serde(default)]
    recipients: Option<Vec<String>>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    credentials: Option<CredentialsBody>,
    #[serde(default)]
    sender_id: Option<String>,
    /// 受信者間の待機時間（ミリ秒）
    #[serde(default, alias = "delayMs")]
    delay: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreviewBody {
    #[serde(default)]
    recipients: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SingleSendResponse {
    success: bool,
    data: Option<String>,
    status_code: Option<u16>,
    batch_id: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkSendResponse {
    success: bool,
    results: DispatchReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PreviewData {
    recipients: Vec<String>,
    invalid_count: usize,
    #[serde(flatten)]
    message: SmsCount,
}

#[derive(Debug, Serialize)]
pub(crate) struct PreviewResponse {
    success: bool,
    data: PreviewData,
}

/// リクエストの認証情報・送信者IDを設定の既定値で補完する。項目ごとに補完する。
fn resolve_sender(
    state: &AppState,
    credentials: Option<CredentialsBody>,
    sender_id: Option<String>,
) -> Result<(Credentials, String), ApiError> {
    let config = state.config();
    let credentials = credentials.unwrap_or_default();
    let username = non_blank(credentials.username)
        .or_else(|| config.default_username().map(str::to_string));
    let password = non_blank(credentials.password)
        .or_else(|| config.default_password().map(str::to_string));
    let sender =
        non_blank(sender_id).or_else(|| config.default_sender_id().map(str::to_string));

    match (username, password, sender) {
        (Some(username), Some(password), Some(sender)) => {
            Ok((Credentials::new(username, password), sender))
        }
        _ => Err(ApiError::bad_request("Missing API credentials or sender ID")),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn invalid_numbers_error(invalid: &[String]) -> ApiError {
    ApiError::bad_request(format!("Invalid phone numbers: {}", invalid.join(", ")))
}

/// 一括送信リクエストを検証し、ディスパッチ入力へ変換する。副作用は持たない。
fn prepare_bulk(
    state: &AppState,
    payload: Result<Json<BulkSendBody>, JsonRejection>,
) -> Result<BulkSendRequest, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let raw = body.recipients.unwrap_or_default();
    if raw.is_empty() {
        return Err(ApiError::bad_request("Recipients must be a non-empty array"));
    }
    let Some(message) = non_blank(body.message) else {
        return Err(ApiError::bad_request("Message is required"));
    };
    let (credentials, sender_id) = resolve_sender(state, body.credentials, body.sender_id)?;
    let recipients = normalize_recipients(&raw).map_err(|invalid| invalid_numbers_error(&invalid))?;
    let delay = body
        .delay
        .map_or_else(|| state.config().dispatch_delay(), Duration::from_millis);

    Ok(BulkSendRequest::new(recipients, message, credentials, sender_id).with_delay(delay))
}

/// POST /api/sms/send
/// 1件のバッチとして1通送信する。
pub(crate) async fn send_single(
    State(state): State<AppState>,
    payload: Result<Json<SingleSendBody>, JsonRejection>,
) -> Result<Json<SingleSendResponse>, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let (Some(recipient), Some(message)) = (non_blank(body.recipient), non_blank(body.message))
    else {
        return Err(ApiError::bad_request(
            "Missing required fields: recipient, message",
        ));
    };
    let (credentials, sender_id) = resolve_sender(&state, body.credentials, body.sender_id)?;
    if !recipients::is_valid_phone(&recipient) {
        return Err(invalid_numbers_error(&[recipient]));
    }
    let recipient = recipients::format_phone_number(&recipient);

    let report = state
        .dispatcher()
        .send_single(recipient, message, credentials, sender_id)
        .await?;
    let detail = report.detail;

    Ok(Json(SingleSendResponse {
        success: detail.status == DeliveryStatus::Success,
        data: detail.response.or(detail.error),
        status_code: detail.http_status,
        batch_id: report.batch_id,
    }))
}

/// POST /api/sms/bulk
/// 受信者を順番に送信し、全件の結果をまとめて返す。
pub(crate) async fn send_bulk(
    State(state): State<AppState>,
    payload: Result<Json<BulkSendBody>, JsonRejection>,
) -> Result<Json<BulkSendResponse>, ApiError> {
    let request = prepare_bulk(&state, payload)?;
    info!(
        recipients = request.recipients.len(),
        delay_ms = u64::try_from(request.delay.as_millis()).unwrap_or(u64::MAX),
        "bulk send requested"
    );

    let results = state.dispatcher().run(&request, None).await?;
    Ok(Json(BulkSendResponse {
        success: true,
        results,
    }))
}

/// SSEで送る通知。
#[derive(Debug)]
enum StreamMessage {
    Progress(ProgressEvent),
    Complete(DispatchReport),
    Failed(String),
}

impl StreamMessage {
    fn into_event(self) -> Event {
        let event = match self {
            StreamMessage::Progress(progress) => Event::default().event("progress").json_data(progress),
            StreamMessage::Complete(results) => Event::default().event("complete").json_data(
                BulkSendResponse {
                    success: true,
                    results,
                },
            ),
            StreamMessage::Failed(error) => Event::default()
                .event("error")
                .json_data(serde_json::json!({ "success": false, "error": error })),
        };
        event.unwrap_or_else(|error| {
            warn!(%error, "failed to encode SSE event");
            Event::default().event("error").data("failed to encode event")
        })
    }
}

/// POST /api/sms/bulk/stream
/// 一括送信を別タスクで実行し、進捗を `progress` イベントとして逐次配信する。
///
/// 検証エラーはストリーム開始前に通常のエラー応答として返す。
pub(crate) async fn send_bulk_stream(
    State(state): State<AppState>,
    payload: Result<Json<BulkSendBody>, JsonRejection>,
) -> Response {
    let request = match prepare_bulk(&state, payload) {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = state.dispatcher().clone();
    tokio::spawn(async move {
        let progress_tx = tx.clone();
        let observer = move |event: &ProgressEvent| {
            // The client may have disconnected; the run continues regardless.
            let _ = progress_tx.send(StreamMessage::Progress(event.clone()));
        };
        let message = match dispatcher.run(&request, Some(&observer)).await {
            Ok(report) => StreamMessage::Complete(report),
            Err(error) => StreamMessage::Failed(ApiError::from(error).message()),
        };
        let _ = tx.send(message);
    });

    let stream = UnboundedReceiverStream::new(rx)
        .map(|message: StreamMessage| Ok::<Event, Infallible>(message.into_event()));
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// POST /api/sms/preview
/// 送信前の確認用に、有効な受信者と本文のセグメント数を返す。
pub(crate) async fn preview(
    payload: Result<Json<PreviewBody>, JsonRejection>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    Ok(Json(PreviewResponse {
        success: true,
        data: PreviewData {
            recipients: recipients::unique_recipients(recipients::parse_recipients(
                &body.recipients,
            )),
            invalid_count: recipients::count_invalid_numbers(&body.recipients),
            message: count_sms(&body.message),
        },
    }))
}
