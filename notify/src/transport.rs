//! Mail delivery seam and its SMTP implementation

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, warn};

use crate::config::NotifyConfig;
use crate::error::SendError;

/// A fully resolved message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailRequest {
    pub sender: String,
    pub recipients: Vec<String>,
    /// SMTP password read from the credential file
    pub secret: String,
    pub subject: String,
    pub body: String,
    pub attachment_path: Option<PathBuf>,
}

/// Delivers one message
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, request: &MailRequest) -> Result<(), SendError>;
}

/// SMTP delivery through lettre
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    server: String,
    port: u16,
}

impl SmtpMailer {
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(config.smtp_server.clone(), config.smtp_port)
    }

    fn transport(&self, login: &str, secret: &str) -> Result<AsyncSmtpTransport<Tokio1Executor>, SendError> {
        // 465 speaks TLS from the first byte; anything else upgrades with STARTTLS
        let builder = if self.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.server)
        }
        .map_err(|e| SendError::Transport(e.to_string()))?;

        Ok(builder
            .port(self.port)
            .credentials(Credentials::new(login.to_string(), secret.to_string()))
            .build())
    }
}

fn mailbox(address: &str) -> Result<Mailbox, SendError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| SendError::address(address, e))
}

async fn attachment_part(path: &Path) -> Result<Option<SinglePart>, SendError> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable attachment");
            return Ok(None);
        }
    };
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    let content_type = ContentType::parse("application/octet-stream")
        .map_err(|e| SendError::Message(e.to_string()))?;
    Ok(Some(Attachment::new(filename).body(content, content_type)))
}

/// Assemble the MIME message: plain-text body plus an optional attachment
pub async fn build_message(request: &MailRequest) -> Result<Message, SendError> {
    let mut builder = Message::builder()
        .from(mailbox(&request.sender)?)
        .subject(request.subject.as_str());
    for recipient in &request.recipients {
        builder = builder.to(mailbox(recipient)?);
    }

    let mut body = MultiPart::mixed().singlepart(SinglePart::plain(request.body.clone()));
    if let Some(path) = &request.attachment_path {
        if let Some(part) = attachment_part(path).await? {
            body = body.singlepart(part);
        }
    }

    builder
        .multipart(body)
        .map_err(|e| SendError::Message(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, request: &MailRequest) -> Result<(), SendError> {
        let message = build_message(request).await?;
        let transport = self.transport(&request.sender, &request.secret)?;
        debug!(server = %self.server, port = self.port, "Sending mail");
        transport
            .send(message)
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(attachment: Option<PathBuf>) -> MailRequest {
        MailRequest {
            sender: "bench@example.com".into(),
            recipients: vec!["a@example.com".into(), "b@example.com".into()],
            secret: "token".into(),
            subject: "[bench-sweep] scenario 1/1".into(),
            body: "all good".into(),
            attachment_path: attachment,
        }
    }

    #[tokio::test]
    async fn test_build_message_with_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario_01_report.md");
        std::fs::write(&path, "# report").unwrap();

        let message = build_message(&request(Some(path))).await.unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: [bench-sweep] scenario 1/1"));
        assert!(raw.contains("scenario_01_report.md"));
        assert!(raw.contains("a@example.com"));
        assert!(raw.contains("b@example.com"));
    }

    #[tokio::test]
    async fn test_missing_attachment_is_skipped() {
        let message = build_message(&request(Some(PathBuf::from("/nonexistent/file.log"))))
            .await
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(!raw.contains("file.log"));
    }

    #[tokio::test]
    async fn test_bad_address_is_rejected() {
        let mut req = request(None);
        req.recipients = vec!["not an address".into()];
        let err = build_message(&req).await.unwrap_err();
        assert!(matches!(err, SendError::Address { .. }));
    }
}
