use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, anyhow};
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use investor_outreach::channels::{EmailConfig, ImapInbox, Inbox, MailTransport, SmtpMailer};
use investor_outreach::config::OutreachConfig;
use investor_outreach::llm::{LlmConfig, create_provider};
use investor_outreach::pipeline::report::status_report;
use investor_outreach::pipeline::{
    AutoResponder, BatchSender, ContentGenerator, ConversationMemory, FollowUpAdvisor,
    GeneratorConfig, ReplyPoller, RulesEngine, approval, spawn_reply_poller,
};
use investor_outreach::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let outreach = OutreachConfig::from_env()?;

    // Stderr always; a daily rolling file when OUTREACH_LOG_DIR is set.
    let (file_layer, _log_guard) = match &outreach.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "outreach.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    let email = Arc::new(EmailConfig::from_env()?);
    let llm_config = LlmConfig::from_env()?;

    eprintln!("📨 Investor Outreach v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {} ({:?})", llm_config.model, llm_config.backend);
    eprintln!("   Sender: {}", email.from_address);
    eprintln!("   SMTP: {}:{}", email.smtp_host, email.smtp_port);
    eprintln!("   IMAP: {}:{}", email.imap_host, email.imap_port);
    eprintln!("   Database: {}", outreach.db_path.display());
    eprintln!("   Approval: {:?}", outreach.approval);
    eprintln!("   Recipients: {}\n", outreach.recipients.join(", "));

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&outreach.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", outreach.db_path.display()))?,
    );

    // ── LLM + mail ───────────────────────────────────────────────────────
    let llm = create_provider(&llm_config)?;
    let generator = Arc::new(ContentGenerator::new(llm, GeneratorConfig::default()));
    let mailer: Arc<dyn MailTransport> = Arc::new(SmtpMailer::new(Arc::clone(&email)));
    let inbox: Arc<dyn Inbox> = Arc::new(ImapInbox::new(Arc::clone(&email)));

    // ── Startup batch ────────────────────────────────────────────────────
    let batch = BatchSender::new(Arc::clone(&generator), Arc::clone(&mailer), Arc::clone(&db));
    match batch.send_batch(&outreach.recipients).await {
        Ok(report) => {
            for row in &report.sent {
                eprintln!("✅ Email sent to {}", row.recipient);
            }
        }
        Err(e) => {
            error!("Outreach batch aborted: {e}");
            eprintln!("❌ Failed to send emails: {e}");
        }
    }

    eprintln!("\n{}\n", status_report(db.as_ref()).await?);

    // ── Reply polling ────────────────────────────────────────────────────
    let poller = ReplyPoller::new(
        inbox,
        Arc::clone(&db),
        RulesEngine::default_rules(),
        AutoResponder::new(
            Arc::clone(&generator),
            mailer,
            approval::gate_for(outreach.approval),
        ),
        FollowUpAdvisor::new(generator),
        ConversationMemory::new(outreach.memory_turns),
    );
    let (handle, shutdown) =
        spawn_reply_poller(poller, Duration::from_secs(email.poll_interval_secs));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    shutdown.store(true, Ordering::Relaxed);
    handle.abort();

    Ok(())
}
