//! Authentication handlers: operator login and token verification

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
use crate::types::{
    AuthResponse, ErrorResponse, LoginRequest, OperatorPublic, Request, SuccessResponse,
    VerifyRequest, VerifyResponse,
};

/// Handle auth.login messages
///
/// Rate-limited per email; failed lookups and bad passwords both reply with
/// a uniform INVALID_CREDENTIALS so the error does not leak which emails
/// exist.
pub async fn handle_login(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
    limits: Arc<PublicRateLimits>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.login message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<LoginRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse login request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let email = request.payload.email.trim().to_lowercase();

        if !limits.login.check_and_record(&email) {
            warn!("Login rate limit hit for {}", email);
            let error = ErrorResponse::new(
                request.id,
                "RATE_LIMITED",
                "Too many login attempts, try again later",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let operator = match queries::operator::find_by_email(&pool, &email).await {
            Ok(op) => op,
            Err(e) => {
                error!("Failed to look up operator: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let operator = match operator {
            Some(op) => op,
            None => {
                let error =
                    ErrorResponse::new(request.id, "INVALID_CREDENTIALS", "Invalid email or password");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let password_ok =
            auth::verify_password(&request.payload.password, &operator.password_hash)
                .unwrap_or(false);
        if !password_ok {
            let error =
                ErrorResponse::new(request.id, "INVALID_CREDENTIALS", "Invalid email or password");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let token = match auth::generate_token(operator.id, &operator.email, &operator.role, &jwt_secret) {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to generate token: {}", e);
                let error = ErrorResponse::new(request.id, "TOKEN_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if let Err(e) = queries::operator::touch_last_login(&pool, operator.id).await {
            warn!("Failed to stamp last login: {}", e);
        }

        let response = SuccessResponse::new(
            request.id,
            AuthResponse {
                token,
                operator: OperatorPublic::from(&operator),
            },
        );
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
        debug!("Operator {} logged in", operator.email);
    }

    Ok(())
}

/// Handle auth.verify messages
pub async fn handle_verify(
    client: Client,
    mut subscriber: Subscriber,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received auth.verify message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<VerifyRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse verify request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let response = match auth::validate_token(&request.payload.token, &jwt_secret) {
            Ok(claims) => SuccessResponse::new(
                request.id,
                VerifyResponse {
                    valid: true,
                    operator_id: Uuid::parse_str(&claims.sub).ok(),
                    email: Some(claims.email),
                    role: Some(claims.role),
                },
            ),
            Err(_) => SuccessResponse::new(
                request.id,
                VerifyResponse {
                    valid: false,
                    operator_id: None,
                    email: None,
                    role: None,
                },
            ),
        };

        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }

    Ok(())
}
