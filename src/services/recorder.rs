//! Best-effort conversion recording.
//!
//! The contact submit path fires a `contact_form` conversion into analytics.
//! That write must never fail the submission, so it goes through this trait:
//! handlers hold an `Arc<dyn ConversionRecorder>` and log (not propagate)
//! any error, and tests can inject a failing recorder to prove isolation.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::queries;

#[async_trait]
pub trait ConversionRecorder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Record one conversion event for `session_id`.
    async fn record(
        &self,
        session_id: &str,
        conversion_type: &str,
        value: f64,
        metadata: Option<serde_json::Value>,
    ) -> Result<()>;
}

/// Postgres-backed recorder used in production.
pub struct PgConversionRecorder {
    pool: PgPool,
}

impl PgConversionRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversionRecorder for PgConversionRecorder {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn record(
        &self,
        session_id: &str,
        conversion_type: &str,
        value: f64,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        // The session may not exist if the visitor blocked the tracker.
        queries::analytics::ensure_session(&self.pool, session_id).await?;
        queries::analytics::insert_conversion(
            &self.pool,
            session_id,
            conversion_type,
            value,
            metadata,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Recorder that always fails — used to verify submit isolation.
    pub struct FailingRecorder;

    #[async_trait]
    impl ConversionRecorder for FailingRecorder {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn record(
            &self,
            _session_id: &str,
            _conversion_type: &str,
            _value: f64,
            _metadata: Option<serde_json::Value>,
        ) -> Result<()> {
            anyhow::bail!("analytics store unavailable")
        }
    }

    /// Recorder that counts successful calls.
    #[derive(Default)]
    pub struct CountingRecorder {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl ConversionRecorder for CountingRecorder {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn record(
            &self,
            _session_id: &str,
            _conversion_type: &str,
            _value: f64,
            _metadata: Option<serde_json::Value>,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
