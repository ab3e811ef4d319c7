//! Mail channels: SMTP submission, IMAP polling, inbound parsing.

pub mod email;
pub mod email_types;

pub use email::{EmailConfig, ImapInbox, Inbox, MailTransport, SmtpMailer};
pub use email_types::InboundEmail;
