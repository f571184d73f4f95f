/// SemaSMSゲートウェイへの送信クライアント。
///
/// 1受信者につき1リクエストを発行し、HTTPステータスだけで成否を分類します。再試行は行いません。
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, Url, header};
use serde::Serialize;
use tracing::debug;

use crate::store::models::DeliveryStatus;

/// SemaSMSの送信エンドポイント。
pub const DEFAULT_ENDPOINT: &str = "https://portal-api.semasms.co.ke/send";

/// ゲートウェイ認証情報。
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }

    /// `Authorization` ヘッダー値を返す。
    #[must_use]
    pub fn authorization(&self) -> String {
        basic_auth_header(&self.username, &self.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// `username:password` をBase64エンコードしたBasic認証ヘッダー値を構築する。
#[must_use]
pub fn basic_auth_header(username: &str, password: &str) -> String {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}

/// 1受信者分の送信内容。
#[derive(Debug, Clone, Copy)]
pub struct OutboundSms<'a> {
    pub recipient: &'a str,
    pub message: &'a str,
    pub sender_id: &'a str,
}

/// ゲートウェイ呼び出しの分類結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// 2xx応答。本文はそのまま保持する。
    Success { body: String, status: u16 },
    /// 非2xx応答（本文）またはトランスポート例外（メッセージ、ステータスなし）。
    Failure { error: String, status: Option<u16> },
}

impl GatewayOutcome {
    /// HTTP応答を分類する。本文の内容は判定に使わない。
    #[must_use]
    pub fn from_response(status: u16, body: String) -> Self {
        if (200..300).contains(&status) {
            GatewayOutcome::Success { body, status }
        } else {
            GatewayOutcome::Failure {
                error: body,
                status: Some(status),
            }
        }
    }

    /// DNS失敗・タイムアウト・接続リセットなどのトランスポート例外。
    pub fn transport(error: impl fmt::Display) -> Self {
        GatewayOutcome::Failure {
            error: error.to_string(),
            status: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, GatewayOutcome::Success { .. })
    }

    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            GatewayOutcome::Success { status, .. } => Some(*status),
            GatewayOutcome::Failure { status, .. } => *status,
        }
    }

    #[must_use]
    pub fn delivery_status(&self) -> DeliveryStatus {
        if self.is_success() {
            DeliveryStatus::Success
        } else {
            DeliveryStatus::Failed
        }
    }
}

/// 1件送信の抽象。ディスパッチループはこの境界越しにゲートウェイを呼ぶ。
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// 1件送信し、結果を分類する。失敗もエラーではなく `GatewayOutcome::Failure` として返す。
    async fn send(&self, sms: &OutboundSms<'_>, credentials: &Credentials) -> GatewayOutcome;
}

#[derive(Debug, Serialize)]
struct SendSmsPayload<'a> {
    sender: &'a str,
    recipient: &'a str,
    message: &'a str,
    bulk: &'static str,
}

/// SemaSMSクライアントの設定。
#[derive(Debug, Clone)]
pub struct SemaSmsConfig {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
}

/// SemaSMSとの通信を管理するクライアント。
#[derive(Debug, Clone)]
pub struct SemaSmsClient {
    client: Client,
    endpoint: Url,
}

impl SemaSmsClient {
    /// 新しいSemaSMSクライアントを作成する。
    ///
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: SemaSmsConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build SemaSMS HTTP client")?;

        let endpoint = Url::parse(&config.endpoint).context("invalid SemaSMS endpoint URL")?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl SmsGateway for SemaSmsClient {
    async fn send(&self, sms: &OutboundSms<'_>, credentials: &Credentials) -> GatewayOutcome {
        let payload = SendSmsPayload {
            sender: sms.sender_id,
            recipient: sms.recipient,
            message: sms.message,
            bulk: "1",
        };

        let response = match self
            .client
            .post(self.endpoint.clone())
            .header(header::AUTHORIZATION, credentials.authorization())
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "SemaSMS request failed before a response arrived");
                return GatewayOutcome::transport(error);
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => {
                debug!(status, "SemaSMS responded");
                GatewayOutcome::from_response(status, body)
            }
            Err(error) => {
                debug!(status, error = %error, "SemaSMS response body could not be read");
                GatewayOutcome::transport(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(endpoint: String) -> SemaSmsClient {
        SemaSmsClient::new(SemaSmsConfig {
            endpoint,
            connect_timeout: Duration::from_secs(1),
            total_timeout: Duration::from_secs(5),
        })
        .expect("client should build")
    }

    fn sms() -> OutboundSms<'static> {
        OutboundSms {
            recipient: "254712345678",
            message: "Hello there",
            sender_id: "SEMA",
        }
    }

    #[test]
    fn basic_auth_header_encodes_username_and_password() {
        assert_eq!(basic_auth_header("user", "pass"), "Basic dXNlcjpwYXNz");
        assert_eq!(
            Credentials::new("user", "pass").authorization(),
            "Basic dXNlcjpwYXNz"
        );
    }

    #[test]
    fn credentials_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("user", "s3cret"));
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("s3cret"));
    }

    #[rstest]
    #[case(200, true)]
    #[case(201, true)]
    #[case(299, true)]
    #[case(300, false)]
    #[case(401, false)]
    #[case(500, false)]
    fn classification_depends_only_on_status(#[case] status: u16, #[case] success: bool) {
        for body in ["", "OK", "{\"status\":\"error\"}"] {
            let outcome = GatewayOutcome::from_response(status, body.to_string());
            assert_eq!(outcome.is_success(), success);
            assert_eq!(outcome, GatewayOutcome::from_response(status, body.to_string()));
            assert_eq!(outcome.http_status(), Some(status));
        }
    }

    #[tokio::test]
    async fn send_posts_wire_payload_with_basic_auth() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "sender": "SEMA",
                "recipient": "254712345678",
                "message": "Hello there",
                "bulk": "1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("queued:abc123"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(format!("{}/send", server.uri()));
        let outcome = client.send(&sms(), &Credentials::new("user", "pass")).await;

        assert_eq!(
            outcome,
            GatewayOutcome::Success {
                body: "queued:abc123".to_string(),
                status: 200,
            }
        );
    }

    #[tokio::test]
    async fn send_reports_error_status_with_raw_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
            .mount(&server)
            .await;

        let client = test_client(format!("{}/send", server.uri()));
        let outcome = client.send(&sms(), &Credentials::new("user", "wrong")).await;

        assert_eq!(
            outcome,
            GatewayOutcome::Failure {
                error: "invalid credentials".to_string(),
                status: Some(401),
            }
        );
        assert_eq!(outcome.delivery_status(), DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn send_maps_transport_error_to_failure_without_status() {
        // Reserve a free port, then release it so the connection is refused.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);
        let endpoint = format!("http://127.0.0.1:{port}/send");

        let client = test_client(endpoint);
        let outcome = client.send(&sms(), &Credentials::new("user", "pass")).await;

        match outcome {
            GatewayOutcome::Failure { error, status } => {
                assert!(status.is_none());
                assert!(!error.is_empty());
            }
            GatewayOutcome::Success { .. } => panic!("expected transport failure"),
        }
    }

    #[tokio::test]
    async fn send_treats_truncated_body_as_transport_failure() {
        use std::io::{Read, Write};

        // Promise a longer body than is written, then close the connection.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let port = listener.local_addr().expect("local addr").port();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept connection");
            let mut buf = [0_u8; 4096];
            let _ = stream.read(&mut buf);
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort")
                .expect("write partial response");
        });

        let client = test_client(format!("http://127.0.0.1:{port}/send"));
        let outcome = client.send(&sms(), &Credentials::new("user", "pass")).await;
        server.join().expect("server thread");

        match outcome {
            GatewayOutcome::Failure { error, status } => {
                assert!(status.is_none());
                assert!(!error.is_empty());
            }
            GatewayOutcome::Success { .. } => panic!("truncated body must not count as sent"),
        }
    }
}
