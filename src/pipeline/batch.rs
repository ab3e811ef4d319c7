//! Batch sender: generate drafts, submit each, record what went out.

use std::sync::Arc;

use tracing::{error, info};

use crate::channels::email::MailTransport;
use crate::error::Error;
use crate::pipeline::generator::ContentGenerator;
use crate::pipeline::types::BatchReport;
use crate::store::Database;

pub struct BatchSender {
    generator: Arc<ContentGenerator>,
    mailer: Arc<dyn MailTransport>,
    db: Arc<dyn Database>,
}

impl BatchSender {
    pub fn new(
        generator: Arc<ContentGenerator>,
        mailer: Arc<dyn MailTransport>,
        db: Arc<dyn Database>,
    ) -> Self {
        Self {
            generator,
            mailer,
            db,
        }
    }

    /// Send one generated email per recipient, in draft order.
    ///
    /// A generation failure sends nothing. The first failed submission
    /// abandons the rest of the batch; rows already recorded stay.
    pub async fn send_batch(&self, recipients: &[String]) -> Result<BatchReport, Error> {
        let drafts = self.generator.generate_batch(recipients).await?;

        let mut report = BatchReport::default();
        for draft in drafts {
            if let Err(e) = self
                .mailer
                .send(&draft.recipient, &draft.subject, &draft.body)
                .await
            {
                error!(
                    recipient = %draft.recipient,
                    already_sent = report.sent.len(),
                    "Failed to send email, abandoning batch: {e}"
                );
                return Err(e.into());
            }

            let row = self
                .db
                .record_sent(&draft.recipient, &draft.subject, &draft.body)
                .await?;
            info!(id = row.id, recipient = %row.recipient, "Email sent");
            report.sent.push(row);
        }

        info!(sent = report.sent.len(), "Batch complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GenerationError, MailError};
    use crate::pipeline::generator::GeneratorConfig;
    use crate::pipeline::testing::{RecordingMailer, ScriptedLlm};
    use crate::store::{EmailStatus, LibSqlBackend};

    const TWO_DRAFTS: &str = r#"Sure! {"emails":[
        {"recipient":"a@x.com","subject":"S1","body":"B1"},
        {"recipient":"b@y.com","subject":"S2","body":"B2"}
    ]}"#;

    async fn batch_sender(
        response: &str,
        mailer: Arc<RecordingMailer>,
    ) -> (BatchSender, Arc<LibSqlBackend>) {
        let llm = Arc::new(ScriptedLlm::new(vec![response]));
        let generator = Arc::new(ContentGenerator::new(llm, GeneratorConfig::default()));
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        (BatchSender::new(generator, mailer, db.clone()), db)
    }

    fn recipients() -> Vec<String> {
        vec!["a@x.com".into(), "b@y.com".into()]
    }

    #[tokio::test]
    async fn each_draft_sent_and_recorded_in_order() {
        let mailer = Arc::new(RecordingMailer::default());
        let (sender, db) = batch_sender(TWO_DRAFTS, mailer.clone()).await;

        let report = sender.send_batch(&recipients()).await.unwrap();
        assert_eq!(report.sent.len(), 2);

        let outbox = mailer.sent();
        assert_eq!(outbox.len(), 2);
        assert_eq!((outbox[0].to.as_str(), outbox[0].subject.as_str()), ("a@x.com", "S1"));
        assert_eq!((outbox[1].to.as_str(), outbox[1].body.as_str()), ("b@y.com", "B2"));

        let rows = db.list_emails().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.status == EmailStatus::Sent));
        assert_eq!(rows[0].recipient, "a@x.com");
        assert_eq!(rows[1].subject, "S2");
    }

    #[tokio::test]
    async fn no_json_sends_nothing() {
        let mailer = Arc::new(RecordingMailer::default());
        let (sender, db) = batch_sender("I cannot do that.", mailer.clone()).await;

        let err = sender.send_batch(&recipients()).await.unwrap_err();
        assert!(matches!(err, Error::Generation(GenerationError::NoJsonObject)));
        assert!(mailer.sent().is_empty());
        assert!(db.list_emails().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_emails_key_sends_nothing() {
        let mailer = Arc::new(RecordingMailer::default());
        let (sender, db) = batch_sender(r#"{"drafts": []}"#, mailer.clone()).await;

        let err = sender.send_batch(&recipients()).await.unwrap_err();
        assert!(matches!(err, Error::Generation(GenerationError::MissingEmails)));
        assert!(mailer.sent().is_empty());
        assert!(db.list_emails().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_submission_abandons_rest_of_batch() {
        let mailer = Arc::new(RecordingMailer::failing_for("a@x.com"));
        let (sender, db) = batch_sender(TWO_DRAFTS, mailer.clone()).await;

        let err = sender.send_batch(&recipients()).await.unwrap_err();
        assert!(matches!(err, Error::Mail(MailError::SendFailed { .. })));

        assert!(mailer.sent().is_empty());
        assert!(db.list_emails().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rows_before_failure_are_kept() {
        let mailer = Arc::new(RecordingMailer::failing_for("b@y.com"));
        let (sender, db) = batch_sender(TWO_DRAFTS, mailer.clone()).await;

        assert!(sender.send_batch(&recipients()).await.is_err());

        let outbox = mailer.sent();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, "a@x.com");
        let rows = db.list_emails().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recipient, "a@x.com");
        assert_eq!(rows[0].status, EmailStatus::Sent);
    }

    #[tokio::test]
    async fn duplicate_drafts_are_not_deduplicated() {
        let mailer = Arc::new(RecordingMailer::default());
        let dupes = r#"{"emails":[
            {"recipient":"a@x.com","subject":"S1","body":"B1"},
            {"recipient":"a@x.com","subject":"S1","body":"B1"}
        ]}"#;
        let (sender, db) = batch_sender(dupes, mailer.clone()).await;

        sender.send_batch(&["a@x.com".to_string()]).await.unwrap();
        assert_eq!(mailer.sent().len(), 2);
        assert_eq!(db.list_emails().await.unwrap().len(), 2);
    }
}
