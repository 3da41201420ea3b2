//! HTTP client for the two backend calls: anonymous credential issuance and
//! the conversation stream.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::BackendConfig;
use crate::error::ProxyError;
use crate::protocol::backend::{ConversationRequest, CredentialIssuance};
use crate::session::SessionCredential;

const CREDENTIAL_PATH: &str = "/backend-anon/sentinel/chat-requirements";
const CONVERSATION_PATH: &str = "/backend-api/conversation";

const DEVICE_ID_HEADER: &str = "oai-device-id";
const SENTINEL_TOKEN_HEADER: &str = "openai-sentinel-chat-requirements-token";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct BackendTransport {
    client: reqwest::Client,
    base_url: String,
}

/// The browser-mimicking header set the backend expects on every call.
fn browser_headers(base_url: &str) -> Result<HeaderMap, ProxyError> {
    let origin = HeaderValue::from_str(base_url)
        .map_err(|err| ProxyError::Config(format!("invalid backend base_url: {err}")))?;

    let mut headers = HeaderMap::new();
    headers.insert("accept", HeaderValue::from_static("*/*"));
    headers.insert(
        "accept-language",
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert("cache-control", HeaderValue::from_static("no-cache"));
    headers.insert(
        "content-type",
        HeaderValue::from_static("application/json"),
    );
    headers.insert("oai-language", HeaderValue::from_static("en-US"));
    headers.insert("origin", origin.clone());
    headers.insert("pragma", HeaderValue::from_static("no-cache"));
    headers.insert("referer", origin);
    headers.insert(
        "sec-ch-ua",
        HeaderValue::from_static(
            "\"Google Chrome\";v=\"123\", \"Not:A-Brand\";v=\"8\", \"Chromium\";v=\"123\"",
        ),
    );
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Windows\""));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
    headers.insert(
        "user-agent",
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        ),
    );
    Ok(headers)
}

impl BackendTransport {
    pub fn new(config: &BackendConfig) -> Result<Self, ProxyError> {
        let base_url = config.base_url.trim_end_matches('/').to_owned();
        let headers = browser_headers(&base_url)?;

        // No request timeout: generations may run arbitrarily long; the
        // request ends when the backend closes the connection.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .tcp_nodelay(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| ProxyError::Transport(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { client, base_url })
    }

    /// Ask the backend for a token bound to the given device id.
    pub async fn issue_credential(&self, device_id: &str) -> Result<String, ProxyError> {
        let response = self
            .client
            .post(format!("{}{CREDENTIAL_PATH}", self.base_url))
            .header(DEVICE_ID_HEADER, device_id)
            .send()
            .await
            .map_err(|err| ProxyError::Credential(format!("issuance request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Credential(format!(
                "issuance endpoint returned status {status}"
            )));
        }

        let issued: CredentialIssuance = response
            .json()
            .await
            .map_err(|err| ProxyError::Credential(format!("malformed issuance response: {err}")))?;
        Ok(issued.token)
    }

    /// Open the conversation stream for one request. The caller consumes
    /// the response body as a byte stream.
    pub async fn open_conversation(
        &self,
        credential: &SessionCredential,
        request: &ConversationRequest,
    ) -> Result<reqwest::Response, ProxyError> {
        let response = self
            .client
            .post(format!("{}{CONVERSATION_PATH}", self.base_url))
            .header(DEVICE_ID_HEADER, &credential.device_id)
            .header(SENTINEL_TOKEN_HEADER, &credential.token)
            .json(request)
            .send()
            .await
            .map_err(|err| ProxyError::Transport(format!("conversation request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Transport(format!(
                "backend returned status {status}"
            )));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn test_browser_headers_include_identity_set() {
        let headers = browser_headers("https://chat.openai.com").expect("headers");
        assert_eq!(headers["origin"], "https://chat.openai.com");
        assert_eq!(headers["referer"], "https://chat.openai.com");
        assert_eq!(headers["oai-language"], "en-US");
        assert!(headers.contains_key("user-agent"));
        assert!(headers.contains_key("sec-ch-ua"));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = BackendConfig {
            base_url: "https://chat.openai.com/".to_string(),
            ..BackendConfig::default()
        };
        let transport = BackendTransport::new(&config).expect("transport");
        assert_eq!(transport.base_url, "https://chat.openai.com");
    }
}
