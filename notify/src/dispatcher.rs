//! Best-effort notification dispatch

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::NotifyConfig;
use crate::error::SendError;
use crate::transport::{MailRequest, MailTransport};

/// Sends sweep notifications
///
/// Every call is independent. The credential file is read on each send, so
/// fixing a missing file mid-sweep takes effect on the next notification.
/// Failures are logged and returned; callers decide whether to care.
#[derive(Clone)]
pub struct NotificationDispatcher {
    config: NotifyConfig,
    transport: Arc<dyn MailTransport>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(config: NotifyConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// Send `body_path` as the message text, optionally attaching a file
    pub async fn send(
        &self,
        subject: &str,
        body_path: &Path,
        attachment: Option<&Path>,
    ) -> Result<(), SendError> {
        match self.try_send(subject, body_path, attachment).await {
            Ok(()) => {
                info!(subject, recipients = self.config.recipients.len(), "Notification sent");
                Ok(())
            }
            Err(e) => {
                warn!(subject, error = %e, "Notification failed");
                Err(e)
            }
        }
    }

    async fn try_send(
        &self,
        subject: &str,
        body_path: &Path,
        attachment: Option<&Path>,
    ) -> Result<(), SendError> {
        if self.config.sender.trim().is_empty() {
            return Err(SendError::NotConfigured("sender is empty".into()));
        }
        if self.config.recipients.is_empty() {
            return Err(SendError::NotConfigured("no recipients".into()));
        }

        let secret = self.read_secret().await?;
        let body = tokio::fs::read_to_string(body_path)
            .await
            .map_err(|source| SendError::Body {
                path: body_path.to_path_buf(),
                source,
            })?;

        let request = MailRequest {
            sender: self.config.sender.clone(),
            recipients: self.config.recipients.clone(),
            secret,
            subject: subject.to_string(),
            body,
            attachment_path: attachment.map(Path::to_path_buf),
        };
        self.transport.deliver(&request).await
    }

    async fn read_secret(&self) -> Result<String, SendError> {
        let path = &self.config.credential_file;
        match tokio::fs::read_to_string(path).await {
            Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(_) => Err(SendError::MissingCredentials(path.clone())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(SendError::MissingCredentials(path.clone()))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Credential file unreadable");
                Err(SendError::MissingCredentials(path.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<MailRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn deliver(&self, request: &MailRequest) -> Result<(), SendError> {
            if self.fail {
                return Err(SendError::Transport("connection refused".into()));
            }
            self.sent.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        config: NotifyConfig,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let creds = dir.path().join("password.txt");
        std::fs::write(&creds, "s3cret\n").unwrap();
        std::fs::write(dir.path().join("body.txt"), "hello").unwrap();
        let config = NotifyConfig::new("me@example.com", vec!["you@example.com".into()])
            .with_credential_file(creds);
        Fixture { dir, config }
    }

    #[tokio::test]
    async fn test_send_delivers_request() {
        let fx = fixture();
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new(fx.config.clone(), transport.clone());

        let attachment = fx.dir.path().join("report.md");
        dispatcher
            .send("subject", &fx.dir.path().join("body.txt"), Some(&attachment))
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].secret, "s3cret");
        assert_eq!(sent[0].body, "hello");
        assert_eq!(sent[0].attachment_path.as_deref(), Some(attachment.as_path()));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let fx = fixture();
        let config = fx.config.clone().with_credential_file(fx.dir.path().join("absent"));
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new(config, transport.clone());

        let err = dispatcher
            .send("subject", &fx.dir.path().join("body.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::MissingCredentials(_)));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credentials_read_on_every_send() {
        let fx = fixture();
        let creds = fx.dir.path().join("late.txt");
        let config = fx.config.clone().with_credential_file(&creds);
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new(config, transport.clone());
        let body = fx.dir.path().join("body.txt");

        assert!(dispatcher.send("first", &body, None).await.is_err());
        std::fs::write(&creds, "token").unwrap();
        assert!(dispatcher.send("second", &body, None).await.is_ok());
        assert_eq!(transport.sent.lock().unwrap()[0].subject, "second");
    }

    #[tokio::test]
    async fn test_transport_failure_is_returned() {
        let fx = fixture();
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let dispatcher = NotificationDispatcher::new(fx.config.clone(), transport);

        let err = dispatcher
            .send("subject", &fx.dir.path().join("body.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::Transport(_)));
    }

    #[tokio::test]
    async fn test_not_configured_and_missing_body() {
        let fx = fixture();
        let transport = Arc::new(RecordingTransport::default());

        let mut unconfigured = fx.config.clone();
        unconfigured.recipients.clear();
        let dispatcher = NotificationDispatcher::new(unconfigured, transport.clone());
        assert!(matches!(
            dispatcher.send("s", &fx.dir.path().join("body.txt"), None).await,
            Err(SendError::NotConfigured(_))
        ));

        let dispatcher = NotificationDispatcher::new(fx.config.clone(), transport);
        assert!(matches!(
            dispatcher.send("s", &fx.dir.path().join("nope.txt"), None).await,
            Err(SendError::Body { .. })
        ));
    }
}
