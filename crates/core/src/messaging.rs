//! Messaging collaborator: text confirmations sent to the caller.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

/// Base URL for the Twilio REST API.
const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageReceipt {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("messaging is not configured: {0} is missing")]
    NotConfigured(&'static str),
    #[error("messaging request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("messaging API returned {status}: {body}")]
    Api { status: u16, body: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingService: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> Result<MessageReceipt, MessagingError>;
}

/// Sender identity for [`TwilioMessagingClient`].
#[derive(Debug, Clone, Default)]
pub struct TwilioSettings {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
}

/// `MessagingService` that sends SMS through Twilio.
#[derive(Debug, Clone)]
pub struct TwilioMessagingClient {
    client: reqwest::Client,
    settings: TwilioSettings,
    base_url: String,
}

impl TwilioMessagingClient {
    pub fn new(settings: TwilioSettings) -> Result<Self, MessagingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            settings,
            base_url: TWILIO_API_BASE.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

fn required<'a>(value: &'a Option<String>, what: &'static str) -> Result<&'a str, MessagingError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(MessagingError::NotConfigured(what))
}

#[async_trait]
impl MessagingService for TwilioMessagingClient {
    async fn send_message(&self, to: &str, body: &str) -> Result<MessageReceipt, MessagingError> {
        let account_sid = required(&self.settings.account_sid, "account sid")?;
        let auth_token = required(&self.settings.auth_token, "auth token")?;
        let from = required(&self.settings.from_number, "sender number")?;

        let url = format!("{}/Accounts/{}/Messages.json", self.base_url, account_sid);
        let response = self
            .client
            .post(url)
            .basic_auth(account_sid, Some(auth_token))
            .form(&[("To", to), ("From", from), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MessagingError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

/// A `MessagingService` that only records what it was asked to send.
///
/// Useful in development and tests; never delivers anything.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(destination, body)` pairs in the order they were sent.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessagingService for RecordingMessenger {
    async fn send_message(&self, to: &str, body: &str) -> Result<MessageReceipt, MessagingError> {
        let mut sent = self.sent.lock().await;
        sent.push((to.to_string(), body.to_string()));
        Ok(MessageReceipt {
            sid: format!("SM{}", sent.len()),
            status: Some("recorded".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> TwilioSettings {
        TwilioSettings {
            account_sid: Some("AC123".to_string()),
            auth_token: Some("secret".to_string()),
            from_number: Some("+390600000000".to_string()),
        }
    }

    #[tokio::test]
    async fn test_send_message_posts_form_to_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B393331234567"))
            .and(body_string_contains("From=%2B390600000000"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "sid": "SM1", "status": "queued" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = TwilioMessagingClient::new(settings())
            .unwrap()
            .with_base_url(server.uri());
        let receipt = client
            .send_message("+393331234567", "Prenotazione confermata")
            .await
            .unwrap();
        assert_eq!(receipt.sid, "SM1");
        assert_eq!(receipt.status.as_deref(), Some("queued"));
    }

    #[tokio::test]
    async fn test_api_error_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid To"))
            .mount(&server)
            .await;

        let client = TwilioMessagingClient::new(settings())
            .unwrap()
            .with_base_url(server.uri());
        let err = client.send_message("abc", "x").await.unwrap_err();
        assert!(matches!(err, MessagingError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_missing_sender_is_rejected_before_network() {
        let client = TwilioMessagingClient::new(TwilioSettings {
            from_number: None,
            ..settings()
        })
        .unwrap()
        .with_base_url("http://127.0.0.1:9".to_string());
        let err = client.send_message("+39333", "x").await.unwrap_err();
        assert!(matches!(err, MessagingError::NotConfigured("sender number")));
    }

    #[tokio::test]
    async fn test_recording_messenger_keeps_order() {
        let messenger = RecordingMessenger::new();
        messenger.send_message("+391", "uno").await.unwrap();
        let receipt = messenger.send_message("+392", "due").await.unwrap();
        assert_eq!(receipt.sid, "SM2");
        assert_eq!(
            messenger.sent().await,
            vec![
                ("+391".to_string(), "uno".to_string()),
                ("+392".to_string(), "due".to_string())
            ]
        );
    }
}
