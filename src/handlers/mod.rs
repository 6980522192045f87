//! NATS message handlers

pub mod analytics;
pub mod auth;
pub mod contact;
pub mod ping;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::rate_limiter::PublicRateLimits;
use crate::services::recorder::{ConversionRecorder, PgConversionRecorder};

const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let jwt_secret = Arc::new(config.jwt_secret.clone());
    let limits = Arc::new(PublicRateLimits::new());
    let recorder: Arc<dyn ConversionRecorder> =
        Arc::new(PgConversionRecorder::new(pool.clone()));
    info!("Conversion recorder initialized: {}", recorder.name());

    // Subscribe to all subjects
    let ping_sub = client.subscribe("portfolio.ping").await?;

    let login_sub = client.subscribe("portfolio.auth.login").await?;
    let verify_sub = client.subscribe("portfolio.auth.verify").await?;

    let contact_submit_sub = client.subscribe("portfolio.contact.submit").await?;
    let contact_list_sub = client.subscribe("portfolio.contact.list").await?;
    let contact_get_sub = client.subscribe("portfolio.contact.get").await?;
    let contact_read_sub = client.subscribe("portfolio.contact.read").await?;
    let contact_respond_sub = client.subscribe("portfolio.contact.respond").await?;
    let contact_note_sub = client.subscribe("portfolio.contact.note").await?;
    let contact_status_sub = client.subscribe("portfolio.contact.status").await?;
    let contact_update_sub = client.subscribe("portfolio.contact.update").await?;
    let contact_bulk_sub = client.subscribe("portfolio.contact.bulk").await?;
    let contact_stats_sub = client.subscribe("portfolio.contact.stats").await?;
    let contact_delete_sub = client.subscribe("portfolio.contact.delete").await?;
    let contact_export_sub = client.subscribe("portfolio.contact.export").await?;

    let session_create_sub = client.subscribe("portfolio.analytics.session.create").await?;
    let pageview_sub = client.subscribe("portfolio.analytics.pageview").await?;
    let event_sub = client.subscribe("portfolio.analytics.event").await?;
    let conversion_sub = client.subscribe("portfolio.analytics.conversion").await?;
    let session_end_sub = client.subscribe("portfolio.analytics.session.end").await?;
    let dashboard_sub = client.subscribe("portfolio.analytics.dashboard").await?;
    let pages_sub = client.subscribe("portfolio.analytics.pages").await?;
    let funnel_sub = client.subscribe("portfolio.analytics.funnel").await?;
    let traffic_sub = client.subscribe("portfolio.analytics.traffic").await?;
    let rollup_sub = client.subscribe("portfolio.analytics.rollup").await?;
    let users_sub = client.subscribe("portfolio.analytics.users").await?;
    let devices_sub = client.subscribe("portfolio.analytics.devices").await?;
    let locations_sub = client.subscribe("portfolio.analytics.locations").await?;

    info!("Subscribed to NATS subjects");

    // Drop stale rate-limit entries in the background
    {
        let limits = Arc::clone(&limits);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
            loop {
                interval.tick().await;
                limits.contact_submit.cleanup();
                limits.analytics_ingest.cleanup();
                limits.login.cleanup();
            }
        });
    }

    // Spawn handlers
    let ping_handle = {
        let client = client.clone();
        tokio::spawn(async move { ping::handle_ping(client, ping_sub).await })
    };

    let login_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        let limits = Arc::clone(&limits);
        tokio::spawn(async move { auth::handle_login(client, login_sub, pool, jwt_secret, limits).await })
    };

    let verify_handle = {
        let client = client.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move { auth::handle_verify(client, verify_sub, jwt_secret).await })
    };

    let contact_submit_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let limits = Arc::clone(&limits);
        let recorder = Arc::clone(&recorder);
        tokio::spawn(async move {
            contact::handle_submit(client, contact_submit_sub, pool, limits, recorder).await
        })
    };

    let contact_list_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move { contact::handle_list(client, contact_list_sub, pool, jwt_secret).await })
    };

    let contact_get_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move { contact::handle_get(client, contact_get_sub, pool, jwt_secret).await })
    };

    let contact_read_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            contact::handle_mark_read(client, contact_read_sub, pool, jwt_secret).await
        })
    };

    let contact_respond_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            contact::handle_respond(client, contact_respond_sub, pool, jwt_secret).await
        })
    };

    let contact_note_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            contact::handle_add_note(client, contact_note_sub, pool, jwt_secret).await
        })
    };

    let contact_status_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            contact::handle_update_status(client, contact_status_sub, pool, jwt_secret).await
        })
    };

    let contact_update_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            contact::handle_update(client, contact_update_sub, pool, jwt_secret).await
        })
    };

    let contact_bulk_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move { contact::handle_bulk(client, contact_bulk_sub, pool, jwt_secret).await })
    };

    let contact_stats_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move { contact::handle_stats(client, contact_stats_sub, pool, jwt_secret).await })
    };

    let contact_delete_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            contact::handle_delete(client, contact_delete_sub, pool, jwt_secret).await
        })
    };

    let contact_export_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            contact::handle_export(client, contact_export_sub, pool, jwt_secret).await
        })
    };

    let session_create_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let limits = Arc::clone(&limits);
        tokio::spawn(async move {
            analytics::handle_create_session(client, session_create_sub, pool, limits).await
        })
    };

    let pageview_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let limits = Arc::clone(&limits);
        tokio::spawn(async move {
            analytics::handle_page_view(client, pageview_sub, pool, limits).await
        })
    };

    let event_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let limits = Arc::clone(&limits);
        tokio::spawn(async move {
            analytics::handle_track_event(client, event_sub, pool, limits).await
        })
    };

    let conversion_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let limits = Arc::clone(&limits);
        tokio::spawn(async move {
            analytics::handle_track_conversion(client, conversion_sub, pool, limits).await
        })
    };

    let session_end_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let limits = Arc::clone(&limits);
        tokio::spawn(async move {
            analytics::handle_end_session(client, session_end_sub, pool, limits).await
        })
    };

    let dashboard_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            analytics::handle_dashboard(client, dashboard_sub, pool, jwt_secret).await
        })
    };

    let pages_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            analytics::handle_popular_pages(client, pages_sub, pool, jwt_secret).await
        })
    };

    let funnel_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move { analytics::handle_funnel(client, funnel_sub, pool, jwt_secret).await })
    };

    let traffic_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            analytics::handle_traffic_sources(client, traffic_sub, pool, jwt_secret).await
        })
    };

    let rollup_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move { analytics::handle_rollup(client, rollup_sub, pool, jwt_secret).await })
    };

    let users_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            analytics::handle_user_analytics(client, users_sub, pool, jwt_secret).await
        })
    };

    let devices_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move { analytics::handle_devices(client, devices_sub, pool, jwt_secret).await })
    };

    let locations_handle = {
        let client = client.clone();
        let pool = pool.clone();
        let jwt_secret = Arc::clone(&jwt_secret);
        tokio::spawn(async move {
            analytics::handle_locations(client, locations_sub, pool, jwt_secret).await
        })
    };

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which means an error occurred)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = login_handle => {
            error!("Login handler finished: {:?}", result);
        }
        result = verify_handle => {
            error!("Verify handler finished: {:?}", result);
        }
        result = contact_submit_handle => {
            error!("Contact submit handler finished: {:?}", result);
        }
        result = contact_list_handle => {
            error!("Contact list handler finished: {:?}", result);
        }
        result = contact_get_handle => {
            error!("Contact get handler finished: {:?}", result);
        }
        result = contact_read_handle => {
            error!("Contact read handler finished: {:?}", result);
        }
        result = contact_respond_handle => {
            error!("Contact respond handler finished: {:?}", result);
        }
        result = contact_note_handle => {
            error!("Contact note handler finished: {:?}", result);
        }
        result = contact_status_handle => {
            error!("Contact status handler finished: {:?}", result);
        }
        result = contact_update_handle => {
            error!("Contact update handler finished: {:?}", result);
        }
        result = contact_bulk_handle => {
            error!("Contact bulk handler finished: {:?}", result);
        }
        result = contact_stats_handle => {
            error!("Contact stats handler finished: {:?}", result);
        }
        result = contact_delete_handle => {
            error!("Contact delete handler finished: {:?}", result);
        }
        result = contact_export_handle => {
            error!("Contact export handler finished: {:?}", result);
        }
        result = session_create_handle => {
            error!("Session create handler finished: {:?}", result);
        }
        result = pageview_handle => {
            error!("Page view handler finished: {:?}", result);
        }
        result = event_handle => {
            error!("Event handler finished: {:?}", result);
        }
        result = conversion_handle => {
            error!("Conversion handler finished: {:?}", result);
        }
        result = session_end_handle => {
            error!("Session end handler finished: {:?}", result);
        }
        result = dashboard_handle => {
            error!("Dashboard handler finished: {:?}", result);
        }
        result = pages_handle => {
            error!("Popular pages handler finished: {:?}", result);
        }
        result = funnel_handle => {
            error!("Funnel handler finished: {:?}", result);
        }
        result = traffic_handle => {
            error!("Traffic sources handler finished: {:?}", result);
        }
        result = rollup_handle => {
            error!("Rollup handler finished: {:?}", result);
        }
        result = users_handle => {
            error!("User analytics handler finished: {:?}", result);
        }
        result = devices_handle => {
            error!("Devices handler finished: {:?}", result);
        }
        result = locations_handle => {
            error!("Locations handler finished: {:?}", result);
        }
    }

    Ok(())
}
