//! CSV export of contact submissions for the admin dashboard.

use anyhow::Result;

use crate::types::ContactSubmission;

/// Serialize submissions to CSV bytes. Column order matches the dashboard's
/// export view; threads (responses/notes) are not included.
pub fn submissions_to_csv(submissions: &[ContactSubmission]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record([
        "id",
        "createdAt",
        "name",
        "email",
        "phone",
        "subject",
        "category",
        "priority",
        "status",
        "budget",
        "timeline",
        "spamScore",
        "tags",
    ])?;

    for s in submissions {
        writer.write_record([
            s.id.to_string(),
            s.created_at.to_rfc3339(),
            s.name.clone(),
            s.email.clone(),
            s.phone.clone().unwrap_or_default(),
            s.subject.clone(),
            serde_plain(&s.category)?,
            serde_plain(&s.priority)?,
            s.status.as_str().to_string(),
            s.budget.clone(),
            s.timeline.clone(),
            s.spam_score.to_string(),
            s.tags.join(";"),
        ])?;
    }

    Ok(writer.into_inner()?)
}

/// Render a serde enum as its bare wire string (without JSON quotes).
fn serde_plain<T: serde::Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(json.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactCategory, ContactPriority, ContactStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample() -> ContactSubmission {
        ContactSubmission {
            id: Uuid::nil(),
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: None,
            subject: "Hello, \"world\"".to_string(),
            message: "A message that is comfortably over the minimum length.".to_string(),
            category: ContactCategory::ProjectCollaboration,
            priority: ContactPriority::High,
            project_type: None,
            budget: "Not specified".to_string(),
            timeline: "Not specified".to_string(),
            status: ContactStatus::New,
            is_spam: false,
            spam_score: 0,
            source: "Website".to_string(),
            ip_address: None,
            user_agent: None,
            referrer: None,
            read_at: None,
            read_by: None,
            follow_up_date: None,
            estimated_value: None,
            tags: vec!["web".to_string(), "design".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_csv_has_header_and_rows() {
        let bytes = submissions_to_csv(&[sample(), sample()]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,createdAt,name,email"));
        assert!(lines[1].contains("jane@example.com"));
        assert!(lines[1].contains("project_collaboration"));
        assert!(lines[1].contains("web;design"));
    }

    #[test]
    fn test_csv_quotes_embedded_quotes() {
        let bytes = submissions_to_csv(&[sample()]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"Hello, \"\"world\"\"\""));
    }

    #[test]
    fn test_csv_empty_input_is_header_only() {
        let bytes = submissions_to_csv(&[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
