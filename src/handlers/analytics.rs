//! Analytics handlers
//!
//! Ingestion subjects are public and rate-limited; ingestion is find-or-create
//! on sessionId so late events after a lost session.create still land.
//! Aggregation subjects require an admin operator token.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::auth;
use crate::db::queries;
use crate::services::rate_limiter::PublicRateLimits;
use crate::services::validation;
use crate::types::{
    CreateSessionRequest, EndSessionRequest, ErrorResponse, Request, RollupRequest,
    SuccessResponse, TrackConversionRequest, TrackEventRequest, TrackPageViewRequest,
    TrafficChannel, WindowRequest,
};

const MAX_WINDOW_DAYS: i64 = 365;

fn clamp_window(days: i64) -> i64 {
    days.clamp(1, MAX_WINDOW_DAYS)
}

// ============================================================================
// Ingestion (public)
// ============================================================================

/// Handle analytics.session.create messages
pub async fn handle_create_session(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    limits: Arc<PublicRateLimits>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received analytics.session.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CreateSessionRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let rate_key = request.payload.ip_address.as_deref().unwrap_or("unknown");
        if !limits.analytics_ingest.check_and_record(rate_key) {
            let error = ErrorResponse::new(request.id, "RATE_LIMITED", "Too many analytics writes");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        if request.payload.session_id.trim().is_empty() {
            let error = ErrorResponse::with_details(
                request.id,
                "VALIDATION_ERROR",
                "Invalid session",
                serde_json::json!({"fields": [{"field": "sessionId", "message": "sessionId must not be empty"}]}),
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let channel = TrafficChannel::classify(
            request.payload.referrer.as_deref(),
            request.payload.utm_medium.as_deref(),
        );

        match queries::analytics::create_session(&pool, &request.payload, channel).await {
            Ok(session) => {
                let response = SuccessResponse::new(request.id, session);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to create session: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle analytics.pageview messages
pub async fn handle_page_view(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    limits: Arc<PublicRateLimits>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received analytics.pageview message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<TrackPageViewRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if !limits.analytics_ingest.check_and_record(&request.payload.session_id) {
            let error = ErrorResponse::new(request.id, "RATE_LIMITED", "Too many analytics writes");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        if request.payload.path.trim().is_empty() {
            let error = ErrorResponse::with_details(
                request.id,
                "VALIDATION_ERROR",
                "Invalid page view",
                serde_json::json!({"fields": [{"field": "path", "message": "path must not be empty"}]}),
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let result = async {
            queries::analytics::ensure_session(&pool, &request.payload.session_id).await?;
            queries::analytics::insert_page_view(
                &pool,
                &request.payload.session_id,
                &request.payload.path,
                request.payload.title.as_deref(),
                request.payload.referrer.as_deref(),
                request.payload.user_agent.as_deref(),
            )
            .await
        }
        .await;

        match result {
            Ok(event) => {
                let response = SuccessResponse::new(request.id, event);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to record page view: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle analytics.event messages
pub async fn handle_track_event(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    limits: Arc<PublicRateLimits>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received analytics.event message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<TrackEventRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if !limits.analytics_ingest.check_and_record(&request.payload.session_id) {
            let error = ErrorResponse::new(request.id, "RATE_LIMITED", "Too many analytics writes");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        if let Err(validation_err) = validation::validate_event(&request.payload) {
            let error = ErrorResponse::with_details(
                request.id,
                "VALIDATION_ERROR",
                "Invalid event",
                validation_err.to_details(),
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let result = async {
            queries::analytics::ensure_session(&pool, &request.payload.session_id).await?;
            queries::analytics::insert_event(
                &pool,
                &request.payload.session_id,
                &request.payload.event_type,
                request.payload.element.as_deref(),
                request.payload.value,
                request.payload.metadata.clone(),
            )
            .await
        }
        .await;

        match result {
            Ok(event) => {
                let response = SuccessResponse::new(request.id, event);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to record event: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle analytics.conversion messages
pub async fn handle_track_conversion(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    limits: Arc<PublicRateLimits>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received analytics.conversion message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<TrackConversionRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if !limits.analytics_ingest.check_and_record(&request.payload.session_id) {
            let error = ErrorResponse::new(request.id, "RATE_LIMITED", "Too many analytics writes");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        if let Err(validation_err) = validation::validate_conversion(&request.payload) {
            let error = ErrorResponse::with_details(
                request.id,
                "VALIDATION_ERROR",
                "Invalid conversion",
                validation_err.to_details(),
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let result = async {
            queries::analytics::ensure_session(&pool, &request.payload.session_id).await?;
            queries::analytics::insert_conversion(
                &pool,
                &request.payload.session_id,
                &request.payload.conversion_type,
                request.payload.value.unwrap_or(1.0),
                request.payload.metadata.clone(),
            )
            .await
        }
        .await;

        match result {
            Ok(event) => {
                let response = SuccessResponse::new(request.id, event);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to record conversion: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle analytics.session.end messages
pub async fn handle_end_session(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    limits: Arc<PublicRateLimits>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received analytics.session.end message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<EndSessionRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if !limits.analytics_ingest.check_and_record(&request.payload.session_id) {
            let error = ErrorResponse::new(request.id, "RATE_LIMITED", "Too many analytics writes");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::analytics::end_session(&pool, &request.payload.session_id).await {
            Ok(Some(session)) => {
                let response = SuccessResponse::new(request.id, session);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Session not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to end session: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

// ============================================================================
// Aggregations (admin)
// ============================================================================

macro_rules! windowed_handler {
    ($(#[$meta:meta])* $name:ident, $query:path) => {
        $(#[$meta])*
        pub async fn $name(
            client: Client,
            mut subscriber: Subscriber,
            pool: PgPool,
            jwt_secret: Arc<String>,
        ) -> Result<()> {
            while let Some(msg) = subscriber.next().await {
                let reply = match msg.reply {
                    Some(ref reply) => reply.clone(),
                    None => {
                        warn!("Message without reply subject");
                        continue;
                    }
                };

                let request: Request<WindowRequest> = match serde_json::from_slice(&msg.payload) {
                    Ok(req) => req,
                    Err(e) => {
                        error!("Failed to parse request: {}", e);
                        let error =
                            ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                        let _ =
                            client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                        continue;
                    }
                };

                let auth_info = match auth::extract_auth(&request, &jwt_secret) {
                    Ok(info) => info,
                    Err(_) => {
                        let error = ErrorResponse::new(
                            request.id,
                            "UNAUTHORIZED",
                            "Authentication required",
                        );
                        let _ =
                            client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                        continue;
                    }
                };
                if !auth_info.is_admin() {
                    let error =
                        ErrorResponse::new(request.id, "FORBIDDEN", "Admin role required");
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    continue;
                }

                match $query(&pool, clamp_window(request.payload.days)).await {
                    Ok(data) => {
                        let response = SuccessResponse::new(request.id, data);
                        let _ =
                            client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                    }
                    Err(e) => {
                        error!("Analytics query failed: {}", e);
                        let error =
                            ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                        let _ =
                            client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    }
                }
            }

            Ok(())
        }
    };
}

windowed_handler!(
    /// Handle analytics.dashboard messages
    handle_dashboard,
    queries::analytics::dashboard_summary
);
windowed_handler!(
    /// Handle analytics.pages messages
    handle_popular_pages,
    queries::analytics::popular_pages
);
windowed_handler!(
    /// Handle analytics.funnel messages
    handle_funnel,
    queries::analytics::conversion_funnel
);
windowed_handler!(
    /// Handle analytics.traffic messages
    handle_traffic_sources,
    queries::analytics::traffic_sources
);
windowed_handler!(
    /// Handle analytics.users messages
    handle_user_analytics,
    queries::analytics::user_analytics
);
windowed_handler!(
    /// Handle analytics.devices messages
    handle_devices,
    queries::analytics::device_breakdown
);
windowed_handler!(
    /// Handle analytics.locations messages
    handle_locations,
    queries::analytics::location_breakdown
);

/// Handle analytics.rollup messages (takes a granularity on top of the window)
pub async fn handle_rollup(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received analytics.rollup message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RollupRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth_info = match auth::extract_auth(&request, &jwt_secret) {
            Ok(info) => info,
            Err(_) => {
                let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };
        if !auth_info.is_admin() {
            let error = ErrorResponse::new(request.id, "FORBIDDEN", "Admin role required");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::analytics::rollup(
            &pool,
            request.payload.granularity,
            clamp_window(request.payload.days),
        )
        .await
        {
            Ok(buckets) => {
                let response = SuccessResponse::new(request.id, buckets);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Rollup query failed: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_window_bounds() {
        assert_eq!(clamp_window(0), 1);
        assert_eq!(clamp_window(-5), 1);
        assert_eq!(clamp_window(30), 30);
        assert_eq!(clamp_window(10_000), MAX_WINDOW_DAYS);
    }
}
