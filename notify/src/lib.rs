//! Best-effort email notifications for benchmark sweeps
//!
//! [`NotificationDispatcher`] resolves credentials and bodies from disk and
//! hands a [`MailRequest`] to a [`MailTransport`]. [`SmtpMailer`] is the
//! production transport; tests substitute their own.

#![warn(clippy::all)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod transport;

pub use config::{NotifyConfig, DEFAULT_SMTP_PORT, DEFAULT_SMTP_SERVER};
pub use dispatcher::NotificationDispatcher;
pub use error::SendError;
pub use transport::{build_message, MailRequest, MailTransport, SmtpMailer};
