//! Email transport: SMTP via lettre for outbound, IMAP over rustls for inbound.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::channels::email_types::{InboundEmail, parse_inbound};
use crate::error::{ConfigError, MailError};

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub poll_interval_secs: u64,
}

impl EmailConfig {
    /// Build config from environment variables.
    ///
    /// `EMAIL_USERNAME` and `EMAIL_PASSWORD` are required; hosts default to Gmail.
    pub fn from_env() -> Result<Self, ConfigError> {
        let imap_host =
            std::env::var("EMAIL_IMAP_HOST").unwrap_or_else(|_| "imap.gmail.com".to_string());

        let imap_port = parse_env("EMAIL_IMAP_PORT", 993)?;

        let smtp_host =
            std::env::var("EMAIL_SMTP_HOST").unwrap_or_else(|_| imap_host.replace("imap", "smtp"));

        let smtp_port = parse_env("EMAIL_SMTP_PORT", 587)?;

        let username = std::env::var("EMAIL_USERNAME")
            .map_err(|_| ConfigError::MissingEnvVar("EMAIL_USERNAME".into()))?;
        let password = std::env::var("EMAIL_PASSWORD")
            .map_err(|_| ConfigError::MissingEnvVar("EMAIL_PASSWORD".into()))?;
        let from_address = std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        let poll_interval_secs = parse_env("EMAIL_POLL_INTERVAL_SECS", 60)?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMAIL_POLL_INTERVAL_SECS".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password: SecretString::from(password),
            from_address,
            poll_interval_secs,
        })
    }
}

/// Parse an optional numeric env var, falling back to `default` when unset.
pub(crate) fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

// ── Outbound ────────────────────────────────────────────────────────

/// Outbound mail submission.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Submit one plain-text message.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Build a plain-text message with From/To/Subject headers.
pub fn build_message(from: &str, to: &str, subject: &str, body: &str) -> Result<Message, MailError> {
    Message::builder()
        .from(from.parse().map_err(|e| MailError::InvalidAddress {
            address: from.to_string(),
            reason: format!("{e}"),
        })?)
        .to(to.parse().map_err(|e| MailError::InvalidAddress {
            address: to.to_string(),
            reason: format!("{e}"),
        })?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| MailError::SendFailed {
            to: to.to_string(),
            reason: format!("Failed to build email: {e}"),
        })
}

/// SMTP submission over STARTTLS, one connection per message.
pub struct SmtpMailer {
    config: Arc<EmailConfig>,
}

impl SmtpMailer {
    pub fn new(config: Arc<EmailConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let email = build_message(&self.config.from_address, to, subject, body)?;
        let config = Arc::clone(&self.config);
        let recipient = to.to_string();

        tokio::task::spawn_blocking(move || {
            let creds = Credentials::new(
                config.username.clone(),
                config.password.expose_secret().to_string(),
            );

            let transport = SmtpTransport::starttls_relay(&config.smtp_host)
                .map_err(|e| MailError::SendFailed {
                    to: recipient.clone(),
                    reason: format!("SMTP relay error: {e}"),
                })?
                .port(config.smtp_port)
                .credentials(creds)
                .build();

            transport.send(&email).map_err(|e| MailError::SendFailed {
                to: recipient.clone(),
                reason: format!("SMTP send failed: {e}"),
            })?;

            info!("Email sent to {recipient}");
            Ok(())
        })
        .await
        .map_err(|e| MailError::SendFailed {
            to: to.to_string(),
            reason: format!("SMTP task panicked: {e}"),
        })?
    }
}

// ── Inbound ─────────────────────────────────────────────────────────

/// Source of unseen inbound mail.
#[async_trait]
pub trait Inbox: Send + Sync {
    /// Fetch every unseen message, marking each as seen.
    async fn fetch_unseen(&self) -> Result<Vec<InboundEmail>, MailError>;
}

/// IMAP inbox over implicit TLS.
pub struct ImapInbox {
    config: Arc<EmailConfig>,
}

impl ImapInbox {
    pub fn new(config: Arc<EmailConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Inbox for ImapInbox {
    async fn fetch_unseen(&self) -> Result<Vec<InboundEmail>, MailError> {
        let config = Arc::clone(&self.config);
        let raw_messages = tokio::task::spawn_blocking(move || fetch_unseen_imap(&config))
            .await
            .map_err(|e| MailError::FetchFailed(format!("IMAP task panicked: {e}")))??;

        let mut emails = Vec::with_capacity(raw_messages.len());
        for raw in raw_messages {
            match parse_inbound(&raw) {
                Some(email) => emails.push(email),
                None => warn!(bytes = raw.len(), "Skipping unparsable message"),
            }
        }
        Ok(emails)
    }
}

/// Fetch unseen messages over TLS (blocking, run in spawn_blocking).
pub fn fetch_unseen_imap(config: &EmailConfig) -> Result<Vec<Vec<u8>>, MailError> {
    let tcp = TcpStream::connect((&*config.imap_host, config.imap_port))
        .map_err(|e| MailError::FetchFailed(format!("connect {}: {e}", config.imap_host)))?;
    tcp.set_read_timeout(Some(Duration::from_secs(30)))
        .map_err(|e| MailError::FetchFailed(e.to_string()))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(config.imap_host.clone())
        .map_err(|e| MailError::FetchFailed(format!("invalid IMAP host: {e}")))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| MailError::FetchFailed(format!("TLS setup: {e}")))?;
    let tls = rustls::StreamOwned::new(conn, tcp);

    let mut session = ImapSession::new(tls);
    session.read_greeting()?;
    fetch_unseen(
        &mut session,
        &config.username,
        config.password.expose_secret(),
    )
}

/// LOGIN → SELECT INBOX → SEARCH UNSEEN → FETCH/STORE each → LOGOUT.
pub(crate) fn fetch_unseen<S: Read + Write>(
    session: &mut ImapSession<S>,
    username: &str,
    password: &str,
) -> Result<Vec<Vec<u8>>, MailError> {
    let login = session.command(&format!(
        "LOGIN {} {}",
        quote_imap(username),
        quote_imap(password)
    ))?;
    if !login.ok {
        return Err(MailError::LoginFailed {
            username: username.to_string(),
        });
    }

    let select = session.command("SELECT \"INBOX\"")?;
    if !select.ok {
        return Err(MailError::FetchFailed("SELECT INBOX rejected".into()));
    }

    let search = session.command("SEARCH UNSEEN")?;
    let ids = parse_search_ids(&search.lines);
    debug!(count = ids.len(), "Unseen messages found");

    let mut messages = Vec::with_capacity(ids.len());
    for id in &ids {
        let fetch = session.command(&format!("FETCH {id} RFC822"))?;
        match fetch.literals.into_iter().next() {
            Some(raw) if fetch.ok => messages.push(raw),
            _ => warn!(id = %id, "FETCH returned no message body"),
        }

        if let Err(e) = session.command(&format!("STORE {id} +FLAGS (\\Seen)")) {
            warn!(id = %id, "Failed to mark message seen: {e}");
        }
    }

    let _ = session.command("LOGOUT");
    Ok(messages)
}

/// Quote a string for an IMAP command argument.
fn quote_imap(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Sequence numbers from `* SEARCH` lines.
fn parse_search_ids(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter(|l| l.starts_with("* SEARCH"))
        .flat_map(|l| l.split_whitespace().skip(2))
        .map(|s| s.to_string())
        .collect()
}

/// Size of a trailing `{N}` literal marker, if the line ends with one.
fn literal_size(line: &str) -> Option<usize> {
    let line = line.trim_end();
    let inner = line.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].parse().ok()
}

/// One tagged command's response.
#[derive(Debug, Default)]
pub(crate) struct ImapResponse {
    /// Untagged and tagged lines, CRLF stripped.
    pub lines: Vec<String>,
    /// Literal payloads in arrival order.
    pub literals: Vec<Vec<u8>>,
    /// Tagged completion was OK.
    pub ok: bool,
}

/// Minimal tagged IMAP command/response session.
pub(crate) struct ImapSession<S: Read + Write> {
    stream: BufReader<S>,
    tag: u32,
}

impl<S: Read + Write> ImapSession<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            tag: 0,
        }
    }

    fn read_line(&mut self) -> Result<String, MailError> {
        let mut buf = Vec::new();
        let n = self
            .stream
            .read_until(b'\n', &mut buf)
            .map_err(|e| MailError::FetchFailed(e.to_string()))?;
        if n == 0 {
            return Err(MailError::FetchFailed("IMAP connection closed".into()));
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    pub fn read_greeting(&mut self) -> Result<(), MailError> {
        let greeting = self.read_line()?;
        if greeting.starts_with("* OK") || greeting.starts_with("* PREAUTH") {
            Ok(())
        } else {
            Err(MailError::FetchFailed(format!("unexpected greeting: {greeting}")))
        }
    }

    pub fn command(&mut self, cmd: &str) -> Result<ImapResponse, MailError> {
        self.tag += 1;
        let tag = format!("A{}", self.tag);
        let full = format!("{tag} {cmd}\r\n");
        let writer = self.stream.get_mut();
        writer
            .write_all(full.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| MailError::FetchFailed(e.to_string()))?;

        let mut response = ImapResponse::default();
        loop {
            let line = self.read_line()?;
            if let Some(size) = literal_size(&line) {
                let mut literal = vec![0u8; size];
                self.stream
                    .read_exact(&mut literal)
                    .map_err(|e| MailError::FetchFailed(e.to_string()))?;
                response.literals.push(literal);
            }
            let done = line.starts_with(&format!("{tag} "));
            if done {
                response.ok = line[tag.len() + 1..].starts_with("OK");
            }
            response.lines.push(line);
            if done {
                return Ok(response);
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
