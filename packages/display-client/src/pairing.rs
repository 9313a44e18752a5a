//! Pairing client
//!
//! Registers the display, shows the code, and polls until a staff member
//! confirms it. Polling is only used for this one-time handshake; queue
//! state always arrives over the push session.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use qms_protocol::{PairingStatus, RegisterResponse, UnpairRequest};

use crate::error::{ClientError, ClientResult};
use crate::state::CloseReason;

/// Maximum error body size kept in error messages
const MAX_ERROR_BODY_SIZE: usize = 1000;

/// Default interval between pairing status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Station binding obtained from a confirmed pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedDisplay {
    pub station_id: String,
    pub station_name: Option<String>,
    pub client_token: String,
}

/// HTTP client for the display pairing endpoints
#[derive(Debug, Clone)]
pub struct PairingClient {
    http_client: Client,
    base_url: Url,
    poll_interval: Duration,
}

impl PairingClient {
    /// Create a client for the server at `base_url` (e.g. `http://localhost:8080`)
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self::with_client(parse_base_url(base_url)?, http_client))
    }

    /// Create a client with a custom HTTP client (for testing)
    pub fn with_client(base_url: Url, http_client: Client) -> Self {
        Self {
            http_client,
            base_url,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request a fresh pairing code and client token
    pub async fn register(&self) -> ClientResult<RegisterResponse> {
        let url = self.base_url.join("qms/display/register")?;
        let response = self.http_client.post(url).send().await?;
        let ticket: RegisterResponse = Self::json(response).await?;
        tracing::info!(code = %ticket.code, expires_at = %ticket.expires_at, "Pairing code received");
        Ok(ticket)
    }

    /// Current pairing status of a code
    pub async fn poll(&self, code: &str) -> ClientResult<PairingStatus> {
        let url = self.base_url.join(&format!("qms/display/{}/status", code))?;
        let response = self.http_client.get(url).send().await?;
        Self::json(response).await
    }

    /// Ask the server to forget this display's pairing
    pub async fn unpair(&self, client_token: &str) -> ClientResult<()> {
        let url = self.base_url.join("qms/display/pairing")?;
        let response = self
            .http_client
            .delete(url)
            .json(&UnpairRequest {
                client_token: client_token.to_string(),
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Poll until the ticket is confirmed, it expires, or `cancel` fires
    ///
    /// Transient poll failures are logged and retried on the next tick.
    pub async fn wait_for_pairing(
        &self,
        ticket: &RegisterResponse,
        cancel: &CancellationToken,
    ) -> ClientResult<PairedDisplay> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ClientError::Closed(CloseReason::Requested));
                }
                _ = ticker.tick() => {}
            }

            match self.poll(&ticket.code).await {
                Ok(PairingStatus {
                    paired: true,
                    station_id: Some(station_id),
                    station_name,
                }) => {
                    tracing::info!(
                        code = %ticket.code,
                        station_id = %station_id,
                        "Display paired"
                    );
                    return Ok(PairedDisplay {
                        station_id,
                        station_name,
                        client_token: ticket.client_token.clone(),
                    });
                }
                Ok(_) => {}
                Err(e) if e.is_retryable() => {
                    tracing::warn!(error = %e, "Pairing poll failed, retrying");
                }
                Err(e) => return Err(e),
            }

            if Utc::now() >= ticket.expires_at {
                tracing::info!(code = %ticket.code, "Pairing code expired");
                return Err(ClientError::PairingExpired(ticket.code.clone()));
            }
        }
    }

    async fn check(response: Response) -> ClientResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = truncate_error_body(response.text().await.unwrap_or_default());
        Err(ClientError::Server {
            status,
            message: body,
        })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        Ok(Self::check(response).await?.json().await?)
    }
}

/// Parse a server base URL, making sure relative joins keep its path
pub fn parse_base_url(base_url: &str) -> ClientResult<Url> {
    let mut url = Url::parse(base_url)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidUrl(format!(
            "expected an http(s) URL, got {}",
            base_url
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Truncate error body, respecting UTF-8 boundaries
fn truncate_error_body(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY_SIZE {
        return body;
    }
    let truncate_at = body
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|i| *i <= MAX_ERROR_BODY_SIZE)
        .last()
        .unwrap_or(0);
    format!("{}... (truncated)", &body[..truncate_at])
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PairingClient {
        PairingClient::new(&server.uri())
            .unwrap()
            .with_poll_interval(Duration::from_millis(10))
    }

    fn ticket(expires_in: chrono::Duration) -> RegisterResponse {
        RegisterResponse {
            code: "ABC234".to_string(),
            client_token: "token-1".to_string(),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[test]
    fn test_parse_base_url() {
        assert_eq!(
            parse_base_url("http://localhost:8080").unwrap().as_str(),
            "http://localhost:8080/"
        );
        assert_eq!(
            parse_base_url("https://host/prefix").unwrap().as_str(),
            "https://host/prefix/"
        );
        assert!(parse_base_url("ftp://host").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_truncate_error_body() {
        assert_eq!(truncate_error_body("short".into()), "short");
        let truncated = truncate_error_body("日".repeat(500));
        assert!(truncated.ends_with("... (truncated)"));
    }

    #[tokio::test]
    async fn test_register() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/qms/display/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "code": "ABC234",
                "client_token": "token-1",
                "expires_at": "2030-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let ticket = client(&server).register().await.unwrap();
        assert_eq!(ticket.code, "ABC234");
        assert_eq!(ticket.client_token, "token-1");
    }

    #[tokio::test]
    async fn test_server_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/qms/display/register"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        assert_matches!(
            client(&server).register().await,
            Err(ClientError::Server { status: 500, message }) if message == "boom"
        );
    }

    #[tokio::test]
    async fn test_wait_for_pairing_returns_binding() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/qms/display/ABC234/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "paired": false })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/qms/display/ABC234/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "paired": true,
                "station_id": "station-1",
                "station_name": "Counter 1"
            })))
            .mount(&server)
            .await;

        let paired = client(&server)
            .wait_for_pairing(&ticket(chrono::Duration::minutes(10)), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            paired,
            PairedDisplay {
                station_id: "station-1".to_string(),
                station_name: Some("Counter 1".to_string()),
                client_token: "token-1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_wait_for_pairing_expires() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/qms/display/ABC234/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "paired": false })))
            .mount(&server)
            .await;

        assert_matches!(
            client(&server)
                .wait_for_pairing(&ticket(chrono::Duration::seconds(-1)), &CancellationToken::new())
                .await,
            Err(ClientError::PairingExpired(code)) if code == "ABC234"
        );
    }

    #[tokio::test]
    async fn test_wait_for_pairing_cancelled() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_matches!(
            client(&server)
                .wait_for_pairing(&ticket(chrono::Duration::minutes(10)), &cancel)
                .await,
            Err(ClientError::Closed(CloseReason::Requested))
        );
    }
}
