//! Status report: every tracked recipient and where it stands.

use crate::error::DatabaseError;
use crate::store::{Database, TrackedEmail};

/// Render the report for a list of rows.
pub fn render(emails: &[TrackedEmail]) -> String {
    if emails.is_empty() {
        return "📭 No emails found.".to_string();
    }

    let mut out = String::from("📌 Email Statuses:");
    for email in emails {
        out.push_str(&format!("\n📧 {}: {}", email.recipient, email.status));
    }
    out
}

/// Load every row and render the report.
pub async fn status_report(db: &dyn Database) -> Result<String, DatabaseError> {
    let emails = db.list_emails().await?;
    Ok(render(&emails))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EmailStatus, LibSqlBackend};

    #[tokio::test]
    async fn empty_table() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        assert_eq!(status_report(&db).await.unwrap(), "📭 No emails found.");
    }

    #[tokio::test]
    async fn one_line_per_row() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.record_sent("a@x.com", "S1", "B1").await.unwrap();
        db.record_sent("b@y.com", "S2", "B2").await.unwrap();
        db.set_status_for_recipient("b@y.com", EmailStatus::FollowUpNeeded)
            .await
            .unwrap();

        let report = status_report(&db).await.unwrap();
        assert_eq!(
            report,
            "📌 Email Statuses:\n📧 a@x.com: Sent\n📧 b@y.com: Follow-up Needed"
        );
    }
}
