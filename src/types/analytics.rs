//! Analytics types
//!
//! Normalized model: one `AnalyticsSession` row per client sessionId plus
//! typed `AnalyticsEvent` rows. The bigserial `seq` column gives a global
//! monotonic insertion order, so per-session ordering never depends on
//! client clocks.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

// ============================================================================
// Enums
// ============================================================================

/// Traffic channel attributed to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "traffic_channel", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TrafficChannel {
    Direct,
    Search,
    Social,
    Email,
    Referral,
    Other,
}

impl Default for TrafficChannel {
    fn default() -> Self {
        TrafficChannel::Direct
    }
}

impl TrafficChannel {
    /// Classify a session's channel from its referrer and utm medium.
    pub fn classify(referrer: Option<&str>, utm_medium: Option<&str>) -> Self {
        if let Some(medium) = utm_medium {
            let medium = medium.to_lowercase();
            return match medium.as_str() {
                "email" => TrafficChannel::Email,
                "social" => TrafficChannel::Social,
                "cpc" | "organic" | "search" => TrafficChannel::Search,
                "referral" => TrafficChannel::Referral,
                _ => TrafficChannel::Other,
            };
        }

        let referrer = match referrer {
            Some(r) if !r.is_empty() => r.to_lowercase(),
            _ => return TrafficChannel::Direct,
        };

        const SEARCH_ENGINES: &[&str] = &["google.", "bing.", "duckduckgo.", "yahoo.", "seznam."];
        const SOCIAL_SITES: &[&str] = &[
            "facebook.", "twitter.", "x.com", "linkedin.", "instagram.", "reddit.", "t.co",
        ];

        if SEARCH_ENGINES.iter().any(|s| referrer.contains(s)) {
            TrafficChannel::Search
        } else if SOCIAL_SITES.iter().any(|s| referrer.contains(s)) {
            TrafficChannel::Social
        } else {
            TrafficChannel::Referral
        }
    }
}

/// Kind of a stored analytics event row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "analytics_event_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStart,
    PageView,
    Event,
    Conversion,
    SessionEnd,
}

/// Accepted interaction event types
pub const EVENT_TYPES: &[&str] = &[
    "click",
    "form_submit",
    "download",
    "email_click",
    "phone_click",
    "social_click",
    "project_view",
    "scroll",
    "video_play",
    "modal_open",
    "modal_close",
    "file_download",
    "external_link",
    "contact_form",
    "resume_download",
    "other",
];

/// Accepted conversion types
pub const CONVERSION_TYPES: &[&str] = &[
    "contact_form",
    "resume_download",
    "email_click",
    "phone_click",
    "social_follow",
    "project_inquiry",
    "calendly_booking",
    "other",
];

// ============================================================================
// Entities
// ============================================================================

/// Analytics session entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSession {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
    pub duration_seconds: Option<i64>,
    pub page_count: i32,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub channel: TrafficChannel,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub screen: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

/// Stored analytics event row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub seq: i64,
    pub session_id: String,
    pub kind: EventKind,
    pub path: Option<String>,
    pub title: Option<String>,
    pub event_type: Option<String>,
    pub conversion_type: Option<String>,
    pub element: Option<String>,
    pub value: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Ingestion requests
// ============================================================================

/// Request to open a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub session_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub screen: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

/// Request to record a page view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPageViewRequest {
    pub session_id: String,
    pub path: String,
    pub title: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
}

/// Request to record an interaction event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEventRequest {
    pub session_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub element: Option<String>,
    pub value: Option<f64>,
    pub metadata: Option<serde_json::Value>,
}

/// Request to record a conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackConversionRequest {
    pub session_id: String,
    #[serde(rename = "type")]
    pub conversion_type: String,
    pub value: Option<f64>,
    pub metadata: Option<serde_json::Value>,
}

/// Request to close a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub session_id: String,
}

// ============================================================================
// Aggregation requests / responses
// ============================================================================

/// Time window for read queries; defaults to the last 30 days
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRequest {
    #[serde(default = "default_window_days")]
    pub days: i64,
}

fn default_window_days() -> i64 {
    30
}

impl Default for WindowRequest {
    fn default() -> Self {
        Self { days: default_window_days() }
    }
}

/// Headline dashboard numbers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_sessions: i64,
    pub total_page_views: i64,
    pub total_events: i64,
    pub total_conversions: i64,
    /// Seconds, over ended sessions in the window
    pub avg_session_duration: f64,
    /// Fraction of sessions with exactly one page view
    pub bounce_rate: f64,
}

/// One row of the popular-pages report
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PopularPage {
    pub path: String,
    pub views: i64,
    pub unique_visitors: i64,
}

/// One step of the conversion funnel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStep {
    pub step: String,
    pub sessions: i64,
    /// Percentage of the first step (100.0 for the first step itself)
    pub percentage: f64,
}

/// One row of the traffic-sources report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSource {
    pub channel: TrafficChannel,
    pub sessions: i64,
    pub percentage: f64,
}

/// Calendar bucket granularity for rollups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollupGranularity {
    Daily,
    Weekly,
    Monthly,
}

impl RollupGranularity {
    /// Postgres `date_trunc` unit
    pub fn trunc_unit(&self) -> &'static str {
        match self {
            RollupGranularity::Daily => "day",
            RollupGranularity::Weekly => "week",
            RollupGranularity::Monthly => "month",
        }
    }
}

/// Request for a calendar rollup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupRequest {
    pub granularity: RollupGranularity,
    #[serde(default = "default_window_days")]
    pub days: i64,
}

/// One calendar bucket of a rollup
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RollupBucket {
    pub bucket: NaiveDate,
    pub events: i64,
    pub sessions: i64,
}

/// New-vs-returning visitor report
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserAnalytics {
    pub new_visitors: i64,
    pub returning_visitors: i64,
    pub total_duration_seconds: i64,
    pub avg_duration_seconds: f64,
}

/// Grouped session count with share of total (devices, locations)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedCount {
    pub key: String,
    pub sessions: i64,
    pub percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_direct_when_no_referrer() {
        assert_eq!(TrafficChannel::classify(None, None), TrafficChannel::Direct);
        assert_eq!(TrafficChannel::classify(Some(""), None), TrafficChannel::Direct);
    }

    #[test]
    fn test_channel_search_from_referrer() {
        assert_eq!(
            TrafficChannel::classify(Some("https://www.google.com/search?q=portfolio"), None),
            TrafficChannel::Search
        );
        assert_eq!(
            TrafficChannel::classify(Some("https://duckduckgo.com/"), None),
            TrafficChannel::Search
        );
    }

    #[test]
    fn test_channel_social_from_referrer() {
        assert_eq!(
            TrafficChannel::classify(Some("https://www.linkedin.com/feed/"), None),
            TrafficChannel::Social
        );
        assert_eq!(
            TrafficChannel::classify(Some("https://t.co/abc123"), None),
            TrafficChannel::Social
        );
    }

    #[test]
    fn test_channel_referral_fallback() {
        assert_eq!(
            TrafficChannel::classify(Some("https://some-blog.example.org/post"), None),
            TrafficChannel::Referral
        );
    }

    #[test]
    fn test_channel_utm_medium_wins_over_referrer() {
        assert_eq!(
            TrafficChannel::classify(Some("https://google.com"), Some("email")),
            TrafficChannel::Email
        );
    }

    #[test]
    fn test_event_kind_snake_case_serde() {
        assert_eq!(serde_json::to_string(&EventKind::SessionStart).unwrap(), "\"session_start\"");
        assert_eq!(serde_json::to_string(&EventKind::PageView).unwrap(), "\"page_view\"");
    }

    #[test]
    fn test_window_request_default_days() {
        let req: WindowRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.days, 30);
    }

    #[test]
    fn test_track_event_type_field_rename() {
        let json = r#"{"sessionId": "s1", "type": "project_view", "element": "card-3"}"#;
        let req: TrackEventRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.event_type, "project_view");
        assert_eq!(req.element, Some("card-3".to_string()));
    }

    #[test]
    fn test_rollup_granularity_trunc_units() {
        assert_eq!(RollupGranularity::Daily.trunc_unit(), "day");
        assert_eq!(RollupGranularity::Weekly.trunc_unit(), "week");
        assert_eq!(RollupGranularity::Monthly.trunc_unit(), "month");
    }

    #[test]
    fn test_event_and_conversion_type_lists() {
        assert!(EVENT_TYPES.contains(&"contact_form"));
        assert_eq!(EVENT_TYPES.len(), 16);
        assert!(CONVERSION_TYPES.contains(&"calendly_booking"));
        assert_eq!(CONVERSION_TYPES.len(), 8);
    }
}
