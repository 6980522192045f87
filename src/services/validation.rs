//! Field validation for inbound payloads.
//!
//! Validation runs before any storage access; failures carry itemized field
//! errors that handlers serialize into the error envelope's `details`.

use serde::Serialize;
use thiserror::Error;

use crate::types::{
    BulkAction, BulkUpdateRequest, SubmitContactRequest, TrackConversionRequest,
    TrackEventRequest, BUDGET_RANGES, CONVERSION_TYPES, EVENT_TYPES, TIMELINE_RANGES,
};

/// One invalid field
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validation failure with itemized field errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("validation failed: {0} invalid field(s)", .fields.len())]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    /// JSON shape for the error envelope's `details`
    pub fn to_details(&self) -> serde_json::Value {
        serde_json::json!({ "fields": self.fields })
    }
}

fn check(errors: &mut Vec<FieldError>, ok: bool, field: &str, message: &str) {
    if !ok {
        errors.push(FieldError::new(field, message));
    }
}

/// Syntactic email check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = match parts.next() {
        Some(d) => d,
        None => return false,
    };
    if local.is_empty() || domain.is_empty() || email.contains(char::is_whitespace) {
        return false;
    }
    let dot = match domain.rfind('.') {
        Some(i) => i,
        None => return false,
    };
    dot > 0 && dot < domain.len() - 1
}

/// Phone check: digits with optional +, spaces, dashes, parens; 7-20 digits.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=20).contains(&digits) {
        return false;
    }
    phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')' | '.'))
}

/// Validate a public contact submission. Also normalizes nothing — the
/// handler lowercases the email after validation passes.
pub fn validate_submit(req: &SubmitContactRequest) -> Result<(), ValidationError> {
    let mut errors = Vec::new();

    let name_len = req.name.trim().chars().count();
    check(&mut errors, (2..=100).contains(&name_len), "name", "name must be 2-100 characters");

    check(&mut errors, is_valid_email(req.email.trim()), "email", "invalid email address");

    let subject_len = req.subject.trim().chars().count();
    check(&mut errors, (5..=200).contains(&subject_len), "subject", "subject must be 5-200 characters");

    let message_len = req.message.trim().chars().count();
    check(&mut errors, (20..=2000).contains(&message_len), "message", "message must be 20-2000 characters");

    if let Some(ref phone) = req.phone {
        check(&mut errors, is_valid_phone(phone), "phone", "invalid phone number");
    }

    if let Some(ref budget) = req.budget {
        check(&mut errors, BUDGET_RANGES.contains(&budget.as_str()), "budget", "unknown budget range");
    }

    if let Some(ref timeline) = req.timeline {
        check(&mut errors, TIMELINE_RANGES.contains(&timeline.as_str()), "timeline", "unknown timeline");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { fields: errors })
    }
}

/// Validate a bulk action request.
pub fn validate_bulk(req: &BulkUpdateRequest) -> Result<(), ValidationError> {
    let mut errors = Vec::new();

    check(&mut errors, !req.ids.is_empty(), "ids", "ids must not be empty");

    if req.action == BulkAction::UpdateStatus && req.status.is_none() {
        errors.push(FieldError::new("status", "status is required for updateStatus"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { fields: errors })
    }
}

/// Validate an interaction event's type against the fixed list.
pub fn validate_event(req: &TrackEventRequest) -> Result<(), ValidationError> {
    if EVENT_TYPES.contains(&req.event_type.as_str()) {
        Ok(())
    } else {
        Err(ValidationError {
            fields: vec![FieldError::new("type", "unknown event type")],
        })
    }
}

/// Validate a conversion's type against the fixed list.
pub fn validate_conversion(req: &TrackConversionRequest) -> Result<(), ValidationError> {
    if CONVERSION_TYPES.contains(&req.conversion_type.as_str()) {
        Ok(())
    } else {
        Err(ValidationError {
            fields: vec![FieldError::new("type", "unknown conversion type")],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_submit() -> SubmitContactRequest {
        SubmitContactRequest {
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            subject: "Project inquiry".to_string(),
            message: "I would like to discuss building a website for my business.".to_string(),
            phone: None,
            category: None,
            priority: None,
            project_type: None,
            budget: None,
            timeline: None,
            ip_address: None,
            user_agent: None,
            referrer: None,
            session_id: None,
        }
    }

    #[test]
    fn test_valid_submission_passes() {
        assert!(validate_submit(&valid_submit()).is_ok());
    }

    #[test]
    fn test_short_name_rejected() {
        let mut req = valid_submit();
        req.name = "J".to_string();
        let err = validate_submit(&req).unwrap_err();
        assert_eq!(err.fields.len(), 1);
        assert_eq!(err.fields[0].field, "name");
    }

    #[test]
    fn test_invalid_email_rejected() {
        for bad in ["not-an-email", "a@b", "@example.com", "a @example.com", "a@.com", "a@com."] {
            let mut req = valid_submit();
            req.email = bad.to_string();
            assert!(validate_submit(&req).is_err(), "accepted: {}", bad);
        }
    }

    #[test]
    fn test_valid_emails_accepted() {
        for good in ["jane@example.com", "j.doe+tag@sub.example.co.uk"] {
            assert!(is_valid_email(good), "rejected: {}", good);
        }
    }

    #[test]
    fn test_short_message_rejected() {
        let mut req = valid_submit();
        req.message = "too short".to_string();
        let err = validate_submit(&req).unwrap_err();
        assert_eq!(err.fields[0].field, "message");
    }

    #[test]
    fn test_multiple_errors_itemized() {
        let mut req = valid_submit();
        req.name = "".to_string();
        req.subject = "hi".to_string();
        req.message = "x".to_string();
        let err = validate_submit(&req).unwrap_err();
        assert_eq!(err.fields.len(), 3);
        let details = err.to_details();
        assert_eq!(details["fields"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_phone_validation() {
        assert!(is_valid_phone("+420 777 123 456"));
        assert!(is_valid_phone("(555) 123-4567"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("call me maybe"));
    }

    #[test]
    fn test_unknown_budget_rejected() {
        let mut req = valid_submit();
        req.budget = Some("a bag of gold".to_string());
        let err = validate_submit(&req).unwrap_err();
        assert_eq!(err.fields[0].field, "budget");
    }

    #[test]
    fn test_bulk_update_status_requires_status() {
        let req = BulkUpdateRequest {
            ids: vec![uuid::Uuid::new_v4()],
            action: BulkAction::UpdateStatus,
            status: None,
        };
        assert!(validate_bulk(&req).is_err());
    }

    #[test]
    fn test_bulk_empty_ids_rejected() {
        let req = BulkUpdateRequest {
            ids: vec![],
            action: BulkAction::Delete,
            status: None,
        };
        assert!(validate_bulk(&req).is_err());
    }

    #[test]
    fn test_event_type_checked_against_list() {
        let mut req = TrackEventRequest {
            session_id: "s1".to_string(),
            event_type: "project_view".to_string(),
            element: None,
            value: None,
            metadata: None,
        };
        assert!(validate_event(&req).is_ok());
        req.event_type = "keylogger".to_string();
        assert!(validate_event(&req).is_err());
    }

    #[test]
    fn test_conversion_type_checked_against_list() {
        let mut req = TrackConversionRequest {
            session_id: "s1".to_string(),
            conversion_type: "contact_form".to_string(),
            value: None,
            metadata: None,
        };
        assert!(validate_conversion(&req).is_ok());
        req.conversion_type = "nope".to_string();
        assert!(validate_conversion(&req).is_err());
    }
}
