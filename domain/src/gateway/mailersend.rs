use super::{EmailTransport, OutboundEmail};
use crate::error::{DomainErrorKind, Error, ExternalErrorKind, InternalErrorKind};
use async_trait::async_trait;
use email_address::EmailAddress;
use log::*;
use serde::{Deserialize, Serialize};
use service::config::Config;

/// MailerSend API client for sending transactional emails
pub struct MailerSendClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    from: Option<EmailSender>,
}

/// Email recipient with name and email address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub email: String,
    pub name: Option<String>,
}

/// Email sender with name and email address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSender {
    pub email: String,
    pub name: Option<String>,
}

/// Request payload for sending an email via MailerSend
#[derive(Debug, Serialize)]
pub struct SendEmailRequest {
    pub from: EmailSender,
    pub to: Vec<EmailRecipient>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl MailerSendClient {
    /// Builds the client. Missing credentials are not an error here; they are
    /// reported as a configuration error on the first send.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = reqwest::Client::builder().use_rustls_tls().build()?;

        let from = config.email_from_address().map(|email| EmailSender {
            email,
            name: Some(config.email_from_name().to_string()),
        });

        Ok(Self {
            client,
            base_url: config.mailersend_base_url().trim_end_matches('/').to_string(),
            api_key: config.mailersend_api_key(),
            from,
        })
    }

    fn request_for(&self, email: OutboundEmail) -> Result<SendEmailRequest, Error> {
        let from = self.from.clone().ok_or_else(|| {
            warn!("Email sender address is not configured");
            Error::config("EMAIL_FROM_ADDRESS is not set")
        })?;

        if !is_valid_email(&from.email) {
            warn!("Invalid sender email: {}", from.email);
            return Err(Error::config("EMAIL_FROM_ADDRESS is not a valid address"));
        }

        if !is_valid_email(&email.to_email) {
            warn!("Invalid recipient email: {}", email.to_email);
            return Err(Error {
                source: None,
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Validation(format!(
                    "Invalid recipient email address: {}",
                    email.to_email
                ))),
            });
        }

        Ok(SendEmailRequest {
            from,
            to: vec![EmailRecipient {
                email: email.to_email,
                name: email.to_name,
            }],
            subject: email.subject,
            text: email.text,
            html: email.html,
        })
    }
}

#[async_trait]
impl EmailTransport for MailerSendClient {
    async fn send(&self, email: OutboundEmail) -> Result<Option<String>, Error> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            warn!("Failed to get MailerSend API key from config");
            Error::config("MAILERSEND_API_KEY is not set")
        })?;
        let request = self.request_for(email)?;

        let url = format!("{}/email", self.base_url);
        debug!("Email subject: {}", request.subject);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to send email request: {e:?}");
                Error::from(e)
            })?;

        let status = response.status();
        if status.is_success() {
            let message_id = response
                .headers()
                .get("x-message-id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            info!("Email sent successfully, message_id: {:?}", message_id);
            Ok(message_id)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Failed to send email: {} - {}", status, error_text);
            Err(Error {
                source: Some(format!("MailerSend responded {status}").into()),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Other(error_text)),
            })
        }
    }
}

/// Validate email address format using email_address crate
pub fn is_valid_email(email: &str) -> bool {
    EmailAddress::is_valid(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn config(base_url: &str) -> Config {
        Config::from_args(["coaching_pipeline"])
            .unwrap()
            .set_mailersend_base_url(base_url.to_string())
            .set_mailersend_api_key("test_api_key_123".to_string())
            .set_email_from_address("coach@example.com".to_string())
    }

    fn email() -> OutboundEmail {
        OutboundEmail {
            to_email: "pat@example.com".to_string(),
            to_name: Some("Pat".to_string()),
            subject: "Time to practice!".to_string(),
            html: "<p>Hi</p>".to_string(),
            text: "Hi".to_string(),
        }
    }

    #[tokio::test]
    async fn send_posts_to_mailersend_with_bearer_auth() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/email")
            .match_header("authorization", "Bearer test_api_key_123")
            .match_body(Matcher::PartialJson(json!({
                "from": {"email": "coach@example.com", "name": "Sales Coach"},
                "to": [{"email": "pat@example.com", "name": "Pat"}],
                "subject": "Time to practice!"
            })))
            .with_status(202)
            .with_header("x-message-id", "msg_123")
            .create_async()
            .await;

        let client = MailerSendClient::new(&config(&server.url())).unwrap();
        let message_id = client.send(email()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(message_id.as_deref(), Some("msg_123"));
    }

    #[tokio::test]
    async fn provider_rejection_is_an_external_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/email")
            .with_status(422)
            .with_body(r#"{"message":"invalid"}"#)
            .create_async()
            .await;

        let client = MailerSendClient::new(&config(&server.url())).unwrap();
        let err = client.send(email()).await.unwrap_err();

        assert!(matches!(err.error_kind, DomainErrorKind::External(_)));
    }

    #[tokio::test]
    async fn missing_sender_address_is_a_configuration_error() {
        let config = Config::from_args(["coaching_pipeline"])
            .unwrap()
            .set_mailersend_api_key("key".to_string());
        let client = MailerSendClient::new(&config).unwrap();

        let err = client.send(email()).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Config)
        );
    }

    #[test]
    fn test_email_validation() {
        for email in ["", "invalid-email", "@example.com", "test@"] {
            assert!(!is_valid_email(email), "Email '{email}' should be invalid");
        }
        assert!(is_valid_email("user.name@domain.co.uk"));
    }
}
