//! Outgoing account mail (reset and verification links).

use async_trait::async_trait;

use crate::config::MailConfig;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailKind {
    ResetPassword,
    VerifyAccount,
}

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub kind: MailKind,
    pub to: String,
    pub subject: String,
    /// Link carrying the action token
    pub link: String,
    /// Raw action token, kept for transports that template their own links
    pub token: String,
}

impl OutgoingMail {
    pub fn reset_password(config: &MailConfig, to: &str, token: String) -> Self {
        Self {
            kind: MailKind::ResetPassword,
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            link: format!("{}/reset-password?token={}", config.client_url.trim_end_matches('/'), token),
            token,
        }
    }

    pub fn verify_account(config: &MailConfig, to: &str, token: String) -> Self {
        Self {
            kind: MailKind::VerifyAccount,
            to: to.to_string(),
            subject: "Verify your account".to_string(),
            link: format!("{}/verify-account?token={}", config.client_url.trim_end_matches('/'), token),
            token,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError>;
}

/// Writes mail to the log instead of delivering it.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self { from: config.from.clone() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        tracing::info!(
            from = %self.from,
            to = %mail.to,
            subject = %mail.subject,
            "📧 {}",
            mail.link
        );
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_use_client_url() {
        let config = MailConfig {
            client_url: "https://rent.example/".into(),
            from: "x@y.z".into(),
        };
        let mail = OutgoingMail::reset_password(&config, "u@test.com", "tok".into());
        assert_eq!(mail.link, "https://rent.example/reset-password?token=tok");

        let mail = OutgoingMail::verify_account(&config, "u@test.com", "tok".into());
        assert_eq!(mail.link, "https://rent.example/verify-account?token=tok");
    }
}
