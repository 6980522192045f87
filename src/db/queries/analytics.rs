//! Analytics database queries
//!
//! Ingestion writes that touch more than one table run inside a single
//! transaction, so the session counters and the event rows they summarize
//! cannot drift apart. Counter bumps are expressed as
//! `SET page_count = page_count + 1`, never read-then-write, so concurrent
//! requests for the same sessionId cannot lose updates.

use anyhow::Result;
use sqlx::PgPool;

use crate::types::analytics::{
    AnalyticsEvent, AnalyticsSession, CreateSessionRequest, DashboardSummary, FunnelStep,
    GroupedCount, PopularPage, RollupBucket, RollupGranularity, TrafficChannel, TrafficSource,
    UserAnalytics,
};

const SESSION_COLUMNS: &str = r#"
    session_id, started_at, ended_at, last_activity, is_active,
    duration_seconds, page_count, ip_address, user_agent, referrer, channel,
    country, region, city, device_type, browser, os, screen,
    utm_source, utm_medium, utm_campaign
"#;

const EVENT_COLUMNS: &str = r#"
    seq, session_id, kind, path, title, event_type, conversion_type,
    element, value, metadata, created_at
"#;

// ============================================================================
// Ingestion
// ============================================================================

/// Open (or refresh) a session. The session_start marker is recorded only
/// when the row is newly created; a repeated create for a known sessionId
/// just refreshes last_activity.
pub async fn create_session(
    pool: &PgPool,
    req: &CreateSessionRequest,
    channel: TrafficChannel,
) -> Result<AnalyticsSession> {
    let mut tx = pool.begin().await?;

    let created = sqlx::query(
        r#"
        INSERT INTO analytics_sessions (
            session_id, ip_address, user_agent, referrer, channel,
            country, region, city, device_type, browser, os, screen,
            utm_source, utm_medium, utm_campaign
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (session_id) DO NOTHING
        "#,
    )
    .bind(&req.session_id)
    .bind(&req.ip_address)
    .bind(&req.user_agent)
    .bind(&req.referrer)
    .bind(channel)
    .bind(&req.country)
    .bind(&req.region)
    .bind(&req.city)
    .bind(&req.device_type)
    .bind(&req.browser)
    .bind(&req.os)
    .bind(&req.screen)
    .bind(&req.utm_source)
    .bind(&req.utm_medium)
    .bind(&req.utm_campaign)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    if created {
        sqlx::query(
            "INSERT INTO analytics_events (session_id, kind) VALUES ($1, 'session_start')",
        )
        .bind(&req.session_id)
        .execute(&mut *tx)
        .await?;
    }

    let session = sqlx::query_as::<_, AnalyticsSession>(&format!(
        r#"
        UPDATE analytics_sessions
        SET last_activity = NOW()
        WHERE session_id = $1
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(&req.session_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(session)
}

/// Create a bare session row if the sessionId is unknown (find-or-create).
pub async fn ensure_session(pool: &PgPool, session_id: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO analytics_sessions (session_id) VALUES ($1) ON CONFLICT (session_id) DO NOTHING",
    )
    .bind(session_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a page view: event row, page-count bump, activity stamp, and a
/// referrer merge if the session has none yet.
pub async fn insert_page_view(
    pool: &PgPool,
    session_id: &str,
    path: &str,
    title: Option<&str>,
    referrer: Option<&str>,
    user_agent: Option<&str>,
) -> Result<AnalyticsEvent> {
    let mut tx = pool.begin().await?;

    let event = sqlx::query_as::<_, AnalyticsEvent>(&format!(
        r#"
        INSERT INTO analytics_events (session_id, kind, path, title)
        VALUES ($1, 'page_view', $2, $3)
        RETURNING {EVENT_COLUMNS}
        "#
    ))
    .bind(session_id)
    .bind(path)
    .bind(title)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE analytics_sessions
        SET page_count = page_count + 1,
            last_activity = NOW(),
            referrer = COALESCE(referrer, $2),
            user_agent = COALESCE(user_agent, $3)
        WHERE session_id = $1
        "#,
    )
    .bind(session_id)
    .bind(referrer)
    .bind(user_agent)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(event)
}

/// Record an interaction event (type already validated by the handler).
pub async fn insert_event(
    pool: &PgPool,
    session_id: &str,
    event_type: &str,
    element: Option<&str>,
    value: Option<f64>,
    metadata: Option<serde_json::Value>,
) -> Result<AnalyticsEvent> {
    let mut tx = pool.begin().await?;

    let event = sqlx::query_as::<_, AnalyticsEvent>(&format!(
        r#"
        INSERT INTO analytics_events (session_id, kind, event_type, element, value, metadata)
        VALUES ($1, 'event', $2, $3, $4, $5)
        RETURNING {EVENT_COLUMNS}
        "#
    ))
    .bind(session_id)
    .bind(event_type)
    .bind(element)
    .bind(value)
    .bind(metadata)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE analytics_sessions SET last_activity = NOW() WHERE session_id = $1")
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(event)
}

/// Record a conversion (value defaults to 1 upstream).
pub async fn insert_conversion(
    pool: &PgPool,
    session_id: &str,
    conversion_type: &str,
    value: f64,
    metadata: Option<serde_json::Value>,
) -> Result<AnalyticsEvent> {
    let event = sqlx::query_as::<_, AnalyticsEvent>(&format!(
        r#"
        INSERT INTO analytics_events (session_id, kind, conversion_type, value, metadata)
        VALUES ($1, 'conversion', $2, $3, $4)
        RETURNING {EVENT_COLUMNS}
        "#
    ))
    .bind(session_id)
    .bind(conversion_type)
    .bind(value)
    .bind(metadata)
    .fetch_one(pool)
    .await?;

    Ok(event)
}

/// Close a session: stamp the end, compute the duration in seconds, and
/// record the session_end marker.
pub async fn end_session(pool: &PgPool, session_id: &str) -> Result<Option<AnalyticsSession>> {
    let mut tx = pool.begin().await?;

    let session = sqlx::query_as::<_, AnalyticsSession>(&format!(
        r#"
        UPDATE analytics_sessions
        SET is_active = FALSE,
            ended_at = NOW(),
            duration_seconds = EXTRACT(EPOCH FROM (NOW() - started_at))::BIGINT
        WHERE session_id = $1
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(session_id)
    .fetch_optional(&mut *tx)
    .await?;

    if session.is_some() {
        sqlx::query(
            "INSERT INTO analytics_events (session_id, kind) VALUES ($1, 'session_end')",
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(session)
}

/// Look up a session by its client-assigned id
pub async fn get_session(pool: &PgPool, session_id: &str) -> Result<Option<AnalyticsSession>> {
    let session = sqlx::query_as::<_, AnalyticsSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM analytics_sessions WHERE session_id = $1"
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

// ============================================================================
// Aggregations (all windowed by `days`; empty windows yield zeroed shapes)
// ============================================================================

pub async fn dashboard_summary(pool: &PgPool, days: i64) -> Result<DashboardSummary> {
    let sessions: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM analytics_sessions WHERE started_at >= NOW() - ($1 * INTERVAL '1 day')",
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let page_views: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM analytics_events
        WHERE kind = 'page_view' AND created_at >= NOW() - ($1 * INTERVAL '1 day')
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let events: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM analytics_events
        WHERE kind = 'event' AND created_at >= NOW() - ($1 * INTERVAL '1 day')
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let conversions: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM analytics_events
        WHERE kind = 'conversion' AND created_at >= NOW() - ($1 * INTERVAL '1 day')
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let avg_duration: (Option<f64>,) = sqlx::query_as(
        r#"
        SELECT AVG(duration_seconds)::DOUBLE PRECISION FROM analytics_sessions
        WHERE started_at >= NOW() - ($1 * INTERVAL '1 day') AND duration_seconds IS NOT NULL
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    // Bounce = session with exactly one page view
    let bounces: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM analytics_sessions
        WHERE started_at >= NOW() - ($1 * INTERVAL '1 day') AND page_count = 1
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let bounce_rate = if sessions.0 > 0 {
        bounces.0 as f64 / sessions.0 as f64
    } else {
        0.0
    };

    Ok(DashboardSummary {
        total_sessions: sessions.0,
        total_page_views: page_views.0,
        total_events: events.0,
        total_conversions: conversions.0,
        avg_session_duration: avg_duration.0.unwrap_or(0.0),
        bounce_rate,
    })
}

/// Top 10 paths by view count with distinct-session unique visitors.
pub async fn popular_pages(pool: &PgPool, days: i64) -> Result<Vec<PopularPage>> {
    let pages = sqlx::query_as::<_, PopularPage>(
        r#"
        SELECT path, COUNT(*) AS views, COUNT(DISTINCT session_id) AS unique_visitors
        FROM analytics_events
        WHERE kind = 'page_view' AND path IS NOT NULL
          AND created_at >= NOW() - ($1 * INTERVAL '1 day')
        GROUP BY path
        ORDER BY views DESC
        LIMIT 10
        "#,
    )
    .bind(days)
    .fetch_all(pool)
    .await?;

    Ok(pages)
}

/// Conversion funnel computed from marker events (not a static mock):
/// visited → engaged → contact intent → converted.
pub async fn conversion_funnel(pool: &PgPool, days: i64) -> Result<Vec<FunnelStep>> {
    let visited: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT session_id) FROM analytics_events
        WHERE kind = 'page_view' AND created_at >= NOW() - ($1 * INTERVAL '1 day')
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let engaged: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT session_id) FROM analytics_events
        WHERE kind = 'event' AND created_at >= NOW() - ($1 * INTERVAL '1 day')
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let contact_intent: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT session_id) FROM analytics_events
        WHERE kind = 'event' AND event_type = 'contact_form'
          AND created_at >= NOW() - ($1 * INTERVAL '1 day')
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let converted: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT session_id) FROM analytics_events
        WHERE kind = 'conversion' AND created_at >= NOW() - ($1 * INTERVAL '1 day')
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let base = visited.0;
    let pct = |count: i64| -> f64 {
        if base > 0 {
            (count as f64 / base as f64) * 100.0
        } else {
            0.0
        }
    };

    Ok(vec![
        FunnelStep { step: "Visited".to_string(), sessions: visited.0, percentage: pct(visited.0) },
        FunnelStep { step: "Engaged".to_string(), sessions: engaged.0, percentage: pct(engaged.0) },
        FunnelStep { step: "Contact Intent".to_string(), sessions: contact_intent.0, percentage: pct(contact_intent.0) },
        FunnelStep { step: "Converted".to_string(), sessions: converted.0, percentage: pct(converted.0) },
    ])
}

/// Sessions grouped by channel with share of total.
pub async fn traffic_sources(pool: &PgPool, days: i64) -> Result<Vec<TrafficSource>> {
    let rows: Vec<(TrafficChannel, i64)> = sqlx::query_as(
        r#"
        SELECT channel, COUNT(*) FROM analytics_sessions
        WHERE started_at >= NOW() - ($1 * INTERVAL '1 day')
        GROUP BY channel
        ORDER BY COUNT(*) DESC
        "#,
    )
    .bind(days)
    .fetch_all(pool)
    .await?;

    let total: i64 = rows.iter().map(|(_, c)| c).sum();
    Ok(rows
        .into_iter()
        .map(|(channel, sessions)| TrafficSource {
            channel,
            sessions,
            percentage: if total > 0 {
                (sessions as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        })
        .collect())
}

/// Calendar rollup: event count and distinct sessions per bucket, ascending.
pub async fn rollup(
    pool: &PgPool,
    granularity: RollupGranularity,
    days: i64,
) -> Result<Vec<RollupBucket>> {
    // trunc_unit comes from a fixed enum, never from user input
    let buckets = sqlx::query_as::<_, RollupBucket>(&format!(
        r#"
        SELECT date_trunc('{unit}', created_at)::DATE AS bucket,
               COUNT(*) AS events,
               COUNT(DISTINCT session_id) AS sessions
        FROM analytics_events
        WHERE created_at >= NOW() - ($1 * INTERVAL '1 day')
        GROUP BY bucket
        ORDER BY bucket ASC
        "#,
        unit = granularity.trunc_unit()
    ))
    .bind(days)
    .fetch_all(pool)
    .await?;

    Ok(buckets)
}

/// New (one session in the window) vs returning (more) visitors, keyed by
/// ip + user agent, plus duration totals over ended sessions.
pub async fn user_analytics(pool: &PgPool, days: i64) -> Result<UserAnalytics> {
    let visitors: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM analytics_sessions
        WHERE started_at >= NOW() - ($1 * INTERVAL '1 day')
          AND ip_address IS NOT NULL
        GROUP BY ip_address, user_agent
        "#,
    )
    .bind(days)
    .fetch_all(pool)
    .await?;

    let new_visitors = visitors.iter().filter(|(c,)| *c == 1).count() as i64;
    let returning_visitors = visitors.iter().filter(|(c,)| *c > 1).count() as i64;

    let durations: (Option<i64>, Option<f64>) = sqlx::query_as(
        r#"
        SELECT SUM(duration_seconds)::BIGINT, AVG(duration_seconds)::DOUBLE PRECISION
        FROM analytics_sessions
        WHERE started_at >= NOW() - ($1 * INTERVAL '1 day')
          AND duration_seconds IS NOT NULL
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    Ok(UserAnalytics {
        new_visitors,
        returning_visitors,
        total_duration_seconds: durations.0.unwrap_or(0),
        avg_duration_seconds: durations.1.unwrap_or(0.0),
    })
}

/// Sessions grouped by a session column (device type, country) with share
/// of total. The column is a compile-time constant at every call site.
async fn grouped_sessions(pool: &PgPool, column: &str, days: i64) -> Result<Vec<GroupedCount>> {
    let rows: Vec<(Option<String>, i64)> = sqlx::query_as(&format!(
        r#"
        SELECT {column}, COUNT(*) FROM analytics_sessions
        WHERE started_at >= NOW() - ($1 * INTERVAL '1 day')
        GROUP BY {column}
        ORDER BY COUNT(*) DESC
        "#
    ))
    .bind(days)
    .fetch_all(pool)
    .await?;

    let total: i64 = rows.iter().map(|(_, c)| c).sum();
    Ok(rows
        .into_iter()
        .map(|(key, sessions)| GroupedCount {
            key: key.unwrap_or_else(|| "unknown".to_string()),
            sessions,
            percentage: if total > 0 {
                (sessions as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        })
        .collect())
}

pub async fn device_breakdown(pool: &PgPool, days: i64) -> Result<Vec<GroupedCount>> {
    grouped_sessions(pool, "device_type", days).await
}

pub async fn location_breakdown(pool: &PgPool, days: i64) -> Result<Vec<GroupedCount>> {
    grouped_sessions(pool, "country", days).await
}
