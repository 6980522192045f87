//! Contact submission types
//!
//! A contact submission is one inbound inquiry from the public site form.
//! Responses and notes are append-only child records; the status field is
//! advisory (no strict transition automaton).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

/// Contact status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "contact_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    New,
    Read,
    InProgress,
    Responded,
    Closed,
    Spam,
}

impl Default for ContactStatus {
    fn default() -> Self {
        ContactStatus::New
    }
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Read => "read",
            ContactStatus::InProgress => "in_progress",
            ContactStatus::Responded => "responded",
            ContactStatus::Closed => "closed",
            ContactStatus::Spam => "spam",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ContactStatus::New),
            "read" => Some(ContactStatus::Read),
            "in_progress" => Some(ContactStatus::InProgress),
            "responded" => Some(ContactStatus::Responded),
            "closed" => Some(ContactStatus::Closed),
            "spam" => Some(ContactStatus::Spam),
            _ => None,
        }
    }
}

/// Contact category enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "contact_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactCategory {
    GeneralInquiry,
    ProjectCollaboration,
    JobOpportunity,
    Consultation,
    TechnicalSupport,
    Other,
}

impl Default for ContactCategory {
    fn default() -> Self {
        ContactCategory::GeneralInquiry
    }
}

/// Contact priority enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "contact_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for ContactPriority {
    fn default() -> Self {
        ContactPriority::Medium
    }
}

/// How a response was delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "response_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResponseMethod {
    Email,
    Phone,
    AdminPanel,
}

impl Default for ResponseMethod {
    fn default() -> Self {
        ResponseMethod::AdminPanel
    }
}

/// Accepted budget range labels (stored as plain text)
pub const BUDGET_RANGES: &[&str] = &[
    "Not specified",
    "Under $1,000",
    "$1,000 - $5,000",
    "$5,000 - $10,000",
    "$10,000 - $25,000",
    "Over $25,000",
];

/// Accepted timeline labels (stored as plain text)
pub const TIMELINE_RANGES: &[&str] = &[
    "Not specified",
    "ASAP",
    "Within 1 month",
    "1 - 3 months",
    "3 - 6 months",
    "Flexible",
];

// ============================================================================
// Entities
// ============================================================================

/// Contact submission entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub category: ContactCategory,
    pub priority: ContactPriority,
    pub project_type: Option<String>,
    pub budget: String,
    pub timeline: String,
    pub status: ContactStatus,
    pub is_spam: bool,
    pub spam_score: i16,
    pub source: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub read_by: Option<Uuid>,
    pub follow_up_date: Option<NaiveDate>,
    pub estimated_value: Option<f64>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry in a submission's response thread (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactResponse {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub message: String,
    pub responded_by: Uuid,
    pub method: ResponseMethod,
    pub responded_at: DateTime<Utc>,
}

/// One internal note on a submission (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactNote {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub content: String,
    pub created_by: Uuid,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Requests / responses
// ============================================================================

/// Public form submission payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitContactRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub phone: Option<String>,
    pub category: Option<ContactCategory>,
    pub priority: Option<ContactPriority>,
    pub project_type: Option<String>,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    // Captured by the site at submission time
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    /// Analytics session of the visitor, if known (for the conversion event)
    pub session_id: Option<String>,
}

/// Trimmed acknowledgment returned to the public form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitContactAck {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
}

/// Request for listing contact submissions with filters and sorting
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListContactsRequest {
    pub status: Option<ContactStatus>,
    pub category: Option<ContactCategory>,
    pub priority: Option<ContactPriority>,
    /// Case-insensitive substring match over name/email/subject/message
    pub search: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Sort by field: "createdAt", "priority", "status", "name"
    pub sort_by: Option<String>,
    /// Sort order: "asc", "desc"
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Response for contact list with pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactListResponse {
    pub contacts: Vec<ContactSubmission>,
    pub pagination: crate::types::Pagination,
}

/// Full submission with its threads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetail {
    #[serde(flatten)]
    pub contact: ContactSubmission,
    pub responses: Vec<ContactResponse>,
    pub notes: Vec<ContactNote>,
}

/// Request to get, mark-read or delete a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactIdRequest {
    pub id: Uuid,
}

/// Request to append a response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    pub id: Uuid,
    pub message: String,
    #[serde(default)]
    pub method: ResponseMethod,
}

/// Request to append a note
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNoteRequest {
    pub id: Uuid,
    pub content: String,
    #[serde(default)]
    pub is_private: bool,
}

/// Request to overwrite the status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub id: Uuid,
    pub status: ContactStatus,
}

/// Admin edit of triage fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactRequest {
    pub id: Uuid,
    pub priority: Option<ContactPriority>,
    pub tags: Option<Vec<String>>,
    pub follow_up_date: Option<NaiveDate>,
    pub estimated_value: Option<f64>,
}

/// Bulk action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkAction {
    Delete,
    MarkAsRead,
    MarkAsSpam,
    UpdateStatus,
}

/// Request to apply one action to many submissions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    pub ids: Vec<Uuid>,
    pub action: BulkAction,
    /// Required when action is `updateStatus`
    pub status: Option<ContactStatus>,
}

/// Response for bulk actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResponse {
    pub affected_count: u64,
}

/// Delete response payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted: bool,
}

// ============================================================================
// Stats
// ============================================================================

/// Headline counters for the dashboard (spam excluded except where named)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactOverview {
    pub total_contacts: i64,
    pub unread_contacts: i64,
    pub spam_contacts: i64,
    /// Non-spam submissions in the last 30 days
    pub recent_contacts: i64,
    /// Non-spam submissions in the last 7 days
    pub weekly_contacts: i64,
}

/// Count per enum value
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownCount {
    pub key: String,
    pub count: i64,
}

/// Submissions per calendar day
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

/// Full stats payload
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactStatsResponse {
    pub overview: ContactOverview,
    pub breakdown: ContactBreakdown,
    pub daily_stats: Vec<DailyCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactBreakdown {
    pub status: Vec<BreakdownCount>,
    pub category: Vec<BreakdownCount>,
    pub priority: Vec<BreakdownCount>,
}

/// Export response: CSV bytes, base64-encoded for the JSON envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub filename: String,
    pub content_type: String,
    pub data: String,
    pub row_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_status_serde_roundtrip() {
        let statuses = vec![
            ContactStatus::New,
            ContactStatus::Read,
            ContactStatus::InProgress,
            ContactStatus::Responded,
            ContactStatus::Closed,
            ContactStatus::Spam,
        ];
        for s in statuses {
            let json = serde_json::to_string(&s).unwrap();
            let back: ContactStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(s, back);
        }
    }

    #[test]
    fn test_contact_status_snake_case_wire_format() {
        assert_eq!(serde_json::to_string(&ContactStatus::InProgress).unwrap(), "\"in_progress\"");
        assert_eq!(serde_json::to_string(&ContactStatus::New).unwrap(), "\"new\"");
    }

    #[test]
    fn test_contact_status_from_str() {
        assert_eq!(ContactStatus::from_str("in_progress"), Some(ContactStatus::InProgress));
        assert_eq!(ContactStatus::from_str("spam"), Some(ContactStatus::Spam));
        assert_eq!(ContactStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ContactStatus::default(), ContactStatus::New);
        assert_eq!(ContactCategory::default(), ContactCategory::GeneralInquiry);
        assert_eq!(ContactPriority::default(), ContactPriority::Medium);
        assert_eq!(ResponseMethod::default(), ResponseMethod::AdminPanel);
    }

    #[test]
    fn test_submit_request_deserialize_minimal() {
        let json = r#"{
            "name": "Jane Doe",
            "email": "jane@example.com",
            "subject": "Project inquiry",
            "message": "I would like to discuss a potential project with you."
        }"#;
        let req: SubmitContactRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "Jane Doe");
        assert!(req.category.is_none());
        assert!(req.session_id.is_none());
    }

    #[test]
    fn test_bulk_action_camel_case_wire_format() {
        assert_eq!(serde_json::to_string(&BulkAction::MarkAsRead).unwrap(), "\"markAsRead\"");
        assert_eq!(serde_json::to_string(&BulkAction::MarkAsSpam).unwrap(), "\"markAsSpam\"");
        let back: BulkAction = serde_json::from_str("\"updateStatus\"").unwrap();
        assert_eq!(back, BulkAction::UpdateStatus);
    }

    #[test]
    fn test_respond_request_default_method() {
        let json = r#"{"id": "123e4567-e89b-12d3-a456-426614174000", "message": "Thanks!"}"#;
        let req: RespondRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, ResponseMethod::AdminPanel);
    }

    #[test]
    fn test_list_request_all_optional() {
        let req: ListContactsRequest = serde_json::from_str("{}").unwrap();
        assert!(req.status.is_none());
        assert!(req.page.is_none());
    }
}
