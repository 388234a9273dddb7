// Code delivery implementations
use crate::config::EmailConfig;
use crate::error::{EmailError, EmailResult};
use async_trait::async_trait;
use dashmap::DashMap;
use logger_redacted::mask_email;
use mail_builder::MessageBuilder;
use mail_send::SmtpClientBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Why a code was issued; selects the message wording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    Registration,
    PasswordReset,
}

impl CodePurpose {
    #[must_use]
    pub fn subject(self) -> &'static str {
        match self {
            Self::Registration => "Verify your DiagnoCare account",
            Self::PasswordReset => "Reset your DiagnoCare password",
        }
    }
}

/// Delivers one-time codes to users
#[async_trait]
pub trait CodeSender: Send + Sync {
    /// Send `code` to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError::SendFailed`] when the transport rejects the message.
    async fn send_code(&self, recipient: &str, code: &str, purpose: CodePurpose)
        -> EmailResult<()>;
}

/// Plain-text body for a code message
#[must_use]
pub fn render_code_message(code: &str, purpose: CodePurpose, ttl_minutes: i64) -> String {
    let action = match purpose {
        CodePurpose::Registration => "complete your registration",
        CodePurpose::PasswordReset => "reset your password",
    };
    format!(
        "Your DiagnoCare verification code is {code}.\n\n\
         Enter it to {action}. The code expires in {ttl_minutes} minutes.\n\n\
         If you did not request this, you can ignore this email."
    )
}

/// SMTP delivery via Stalwart's mail-send
pub struct SmtpCodeSender {
    config: EmailConfig,
}

impl SmtpCodeSender {
    /// # Errors
    ///
    /// Returns [`EmailError::InvalidConfig`] when the host or sender address is empty.
    pub fn new(config: EmailConfig) -> EmailResult<Self> {
        if config.smtp_host.trim().is_empty() {
            return Err(EmailError::InvalidConfig("smtp_host is empty".into()));
        }
        if !config.from_email.contains('@') {
            return Err(EmailError::InvalidConfig(format!(
                "from_email '{}' is not an address",
                config.from_email
            )));
        }
        Ok(Self { config })
    }

    async fn send_message(&self, message: MessageBuilder<'_>) -> EmailResult<String> {
        let mut smtp_client = SmtpClientBuilder::new(self.config.smtp_host.as_str(), self.config.smtp_port)
            .implicit_tls(self.config.implicit_tls);

        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            smtp_client = smtp_client.credentials((user.as_str(), pass.as_str()));
        }

        let mut client = smtp_client
            .connect()
            .await
            .map_err(|e| EmailError::SendFailed(format!("SMTP connection failed: {e}")))?;

        let message_id = Uuid::new_v4().to_string();
        client
            .send(message)
            .await
            .map_err(|e| EmailError::SendFailed(format!("Failed to send email: {e}")))?;

        debug!(provider = "smtp", message_id = %message_id, "Email sent successfully");
        Ok(message_id)
    }
}

#[async_trait]
impl CodeSender for SmtpCodeSender {
    async fn send_code(
        &self,
        recipient: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> EmailResult<()> {
        if !recipient.contains('@') {
            return Err(EmailError::InvalidMessage("recipient is not an address".into()));
        }

        let body = render_code_message(code, purpose, self.config.code_ttl_minutes);
        let message = MessageBuilder::new()
            .from((self.config.from_name.as_str(), self.config.from_email.as_str()))
            .to(recipient)
            .subject(purpose.subject())
            .text_body(body);

        let message_id = self.send_message(message).await?;
        info!(
            recipient = %mask_email(recipient),
            purpose = ?purpose,
            message_id = %message_id,
            "Verification code sent"
        );
        Ok(())
    }
}

/// Logs that a code was issued without delivering it
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send_code(
        &self,
        recipient: &str,
        _code: &str,
        purpose: CodePurpose,
    ) -> EmailResult<()> {
        info!(
            recipient = %mask_email(recipient),
            purpose = ?purpose,
            "Email delivery disabled, verification code not sent"
        );
        Ok(())
    }
}

/// A code captured by [`InMemoryCodeSender`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCode {
    pub code: String,
    pub purpose: CodePurpose,
}

/// Keeps sent codes per recipient; for tests and local development
#[derive(Debug, Clone, Default)]
pub struct InMemoryCodeSender {
    sent: Arc<DashMap<String, Vec<SentCode>>>,
}

impl InMemoryCodeSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent code sent to `recipient`
    #[must_use]
    pub fn last_code(&self, recipient: &str) -> Option<SentCode> {
        self.sent
            .get(&recipient.to_lowercase())
            .and_then(|codes| codes.last().cloned())
    }

    #[must_use]
    pub fn sent_count(&self, recipient: &str) -> usize {
        self.sent
            .get(&recipient.to_lowercase())
            .map_or(0, |codes| codes.len())
    }
}

#[async_trait]
impl CodeSender for InMemoryCodeSender {
    async fn send_code(
        &self,
        recipient: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> EmailResult<()> {
        self.sent
            .entry(recipient.to_lowercase())
            .or_default()
            .push(SentCode {
                code: code.to_string(),
                purpose,
            });
        Ok(())
    }
}

/// Pick a sender for the configuration: SMTP when enabled, logging otherwise
///
/// # Errors
///
/// Propagates [`SmtpCodeSender::new`] validation errors.
pub fn sender_from_config(config: &EmailConfig) -> EmailResult<Arc<dyn CodeSender>> {
    if config.enabled {
        Ok(Arc::new(SmtpCodeSender::new(config.clone())?))
    } else {
        info!("Email service disabled by configuration");
        Ok(Arc::new(LogCodeSender))
    }
}
