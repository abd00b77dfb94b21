//! Verification-email dispatch.
//!
//! The production path speaks a Resend-compatible HTTP mail API; without
//! an API key the mailer degrades to logging the code, which keeps local
//! development usable with no outbound mail account.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail API rejected the message: status {0}")]
    Rejected(reqwest::StatusCode),
}

/// Outbound mail transport. Enum dispatch keeps `send_verification` a
/// plain async fn.
pub enum Mailer {
    Http(HttpMailer),
    /// Logs the code instead of sending it. Development fallback.
    Log,
}

pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }
}

#[derive(Serialize)]
struct MailPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: String,
}

impl Mailer {
    /// Send the 6-digit verification code to a freshly registered address.
    pub async fn send_verification(
        &self,
        email: &str,
        username: &str,
        code: &str,
    ) -> Result<(), MailError> {
        match self {
            Mailer::Http(http) => {
                let payload = MailPayload {
                    from: &http.from,
                    to: [email],
                    subject: "Murmur verification code",
                    text: verification_body(username, code),
                };

                let res = http
                    .client
                    .post(&http.api_url)
                    .bearer_auth(&http.api_key)
                    .json(&payload)
                    .send()
                    .await?;
                if !res.status().is_success() {
                    return Err(MailError::Rejected(res.status()));
                }

                info!("Verification email dispatched to {}", email);
                Ok(())
            }
            Mailer::Log => {
                info!(
                    "Mail disabled; verification code for {} <{}>: {}",
                    username, email, code
                );
                Ok(())
            }
        }
    }
}

fn verification_body(username: &str, code: &str) -> String {
    format!(
        "Hello {username},\n\n\
         Your verification code is {code}. It expires in one hour.\n\n\
         If you did not sign up for Murmur, you can ignore this email.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_names_the_user_and_the_code() {
        let body = verification_body("ada", "123456");
        assert!(body.contains("ada"));
        assert!(body.contains("123456"));
    }

    #[test]
    fn payload_serializes_to_the_resend_shape() {
        let payload = MailPayload {
            from: "Murmur <noreply@example.com>",
            to: ["ada@example.com"],
            subject: "Murmur verification code",
            text: "body".to_string(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["from"], "Murmur <noreply@example.com>");
        assert_eq!(json["to"][0], "ada@example.com");
        assert!(json["text"].is_string());
    }
}
