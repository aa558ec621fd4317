//! Notification settings

use std::path::PathBuf;

/// Default SMTP relay
pub const DEFAULT_SMTP_SERVER: &str = "smtp.qq.com";

/// Default SMTP port (implicit TLS)
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// Who to notify, how, and when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Sender address; also the SMTP login
    pub sender: String,
    pub recipients: Vec<String>,
    /// File holding the SMTP password or app token
    pub credential_file: PathBuf,
    pub smtp_server: String,
    pub smtp_port: u16,
    /// Notify after every scenario
    pub send_each: bool,
    /// Notify once when the sweep finishes
    pub send_final: bool,
    /// Text prepended to every body
    pub preface: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            sender: String::new(),
            recipients: Vec::new(),
            credential_file: PathBuf::from("config/email_password.txt"),
            smtp_server: DEFAULT_SMTP_SERVER.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            send_each: true,
            send_final: true,
            preface: None,
        }
    }
}

impl NotifyConfig {
    pub fn new(sender: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            sender: sender.into(),
            recipients,
            ..Default::default()
        }
    }

    pub fn with_credential_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential_file = path.into();
        self
    }

    pub fn with_smtp(mut self, server: impl Into<String>, port: u16) -> Self {
        self.smtp_server = server.into();
        self.smtp_port = port;
        self
    }

    pub fn with_triggers(mut self, send_each: bool, send_final: bool) -> Self {
        self.send_each = send_each;
        self.send_final = send_final;
        self
    }

    pub fn with_preface(mut self, preface: Option<String>) -> Self {
        self.preface = preface.filter(|p| !p.trim().is_empty());
        self
    }

    /// Split a comma-separated recipient list, dropping blanks
    pub fn parse_recipients(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect()
    }

    /// Whether a sender and at least one recipient are set
    pub fn is_configured(&self) -> bool {
        !self.sender.trim().is_empty() && !self.recipients.is_empty()
    }

    /// Whether the per-scenario trigger should fire
    pub fn notify_each(&self) -> bool {
        self.send_each && self.is_configured()
    }

    /// Whether the end-of-sweep trigger should fire
    pub fn notify_final(&self) -> bool {
        self.send_final && self.is_configured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NotifyConfig::default();
        assert_eq!(config.smtp_server, "smtp.qq.com");
        assert_eq!(config.smtp_port, 465);
        assert!(config.send_each && config.send_final);
        assert!(!config.is_configured());
        assert!(!config.notify_each());
    }

    #[test]
    fn test_parse_recipients() {
        assert_eq!(
            NotifyConfig::parse_recipients(" a@x.com, b@y.org ,,"),
            vec!["a@x.com", "b@y.org"]
        );
        assert!(NotifyConfig::parse_recipients("").is_empty());
    }

    #[test]
    fn test_triggers_are_independent() {
        let config = NotifyConfig::new("me@x.com", vec!["you@y.com".into()])
            .with_triggers(false, true)
            .with_preface(Some("  ".into()));
        assert!(!config.notify_each());
        assert!(config.notify_final());
        assert!(config.preface.is_none());
    }
}
