//! Contact submission handlers
//!
//! `contact.submit` is public (rate-limited); everything else requires an
//! admin operator token.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use base64::Engine;
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::auth;
use crate::db::queries;
use crate::services::export::submissions_to_csv;
use crate::services::rate_limiter::PublicRateLimits;
use crate::services::recorder::ConversionRecorder;
use crate::services::spam;
use crate::services::validation;
use crate::types::{
    AddNoteRequest, BulkAction, BulkUpdateRequest, BulkUpdateResponse, ContactDetail,
    ContactIdRequest, ContactListResponse, DeleteResponse, ErrorResponse, ExportResponse,
    ListContactsRequest, Pagination, RespondRequest, Request, SubmitContactAck,
    SubmitContactRequest, SuccessResponse, UpdateContactRequest, UpdateStatusRequest,
};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Fire the contact_form conversion for a stored submission.
///
/// Best-effort: a recorder failure is logged and dropped, never surfaced to
/// the submitter. Returns whether the event landed so the behavior is
/// observable in tests.
async fn record_submit_conversion(
    recorder: &dyn ConversionRecorder,
    session_id: &str,
    contact_id: Uuid,
) -> bool {
    let metadata = serde_json::json!({ "contactId": contact_id });
    match recorder
        .record(session_id, "contact_form", 1.0, Some(metadata))
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!("Conversion event failed (ignored, {}): {}", recorder.name(), e);
            false
        }
    }
}

/// Handle contact.submit messages (public)
///
/// Validation → spam scoring → insert → best-effort conversion event. The
/// conversion write is isolated: a failing analytics store never fails the
/// submission.
pub async fn handle_submit(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    limits: Arc<PublicRateLimits>,
    recorder: Arc<dyn ConversionRecorder>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.submit message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<SubmitContactRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let rate_key = request.payload.ip_address.as_deref().unwrap_or("unknown");
        if !limits.contact_submit.check_and_record(rate_key) {
            warn!("Contact submit rate limit hit for {}", rate_key);
            let error = ErrorResponse::new(
                request.id,
                "RATE_LIMITED",
                "Too many submissions, try again later",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        if let Err(validation_err) = validation::validate_submit(&request.payload) {
            let error = ErrorResponse::with_details(
                request.id,
                "VALIDATION_ERROR",
                "Invalid contact submission",
                validation_err.to_details(),
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let verdict = spam::score(&request.payload.subject, &request.payload.message);

        let contact = match queries::contact::create_contact(&pool, &request.payload, verdict).await
        {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to create contact submission: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if let Some(ref session_id) = request.payload.session_id {
            record_submit_conversion(recorder.as_ref(), session_id, contact.id).await;
        }

        let ack = SubmitContactAck {
            id: contact.id,
            name: contact.name.clone(),
            email: contact.email.clone(),
            subject: contact.subject.clone(),
            status: contact.status,
            created_at: contact.created_at,
        };
        let response = SuccessResponse::new(request.id, ack);
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
        debug!("Created contact submission: {} (spam score {})", contact.id, contact.spam_score);
    }

    Ok(())
}

/// Handle contact.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListContactsRequest> = match serde_json::from_slice(&msg.payload) {
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

        let page = request.payload.page.unwrap_or(1).max(1);
        let limit = request
            .payload
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = Pagination::offset(page, limit);

        match queries::contact::list_contacts(&pool, &request.payload, limit, offset).await {
            Ok((contacts, total)) => {
                let response = SuccessResponse::new(
                    request.id,
                    ContactListResponse {
                        contacts,
                        pagination: Pagination::new(total, page, limit),
                    },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list contacts: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle contact.get messages
pub async fn handle_get(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.get message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ContactIdRequest> = match serde_json::from_slice(&msg.payload) {
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

        let contact = match queries::contact::get_contact(&pool, request.payload.id).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Contact not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
            Err(e) => {
                error!("Failed to get contact: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let responses = match queries::contact::list_responses(&pool, contact.id).await {
            Ok(r) => r,
            Err(e) => {
                error!("Failed to load responses: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };
        let notes = match queries::contact::list_notes(&pool, contact.id).await {
            Ok(n) => n,
            Err(e) => {
                error!("Failed to load notes: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let response = SuccessResponse::new(request.id, ContactDetail { contact, responses, notes });
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }

    Ok(())
}

/// Handle contact.read messages (idempotent mark-as-read)
pub async fn handle_mark_read(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.read message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ContactIdRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::contact::mark_as_read(&pool, request.payload.id, auth_info.operator_id).await
        {
            Ok(Some(contact)) => {
                let response = SuccessResponse::new(request.id, contact);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Contact not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to mark contact read: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle contact.respond messages
///
/// Appends to the response thread and sets the status to responded — even
/// from closed, matching the dashboard's expectation that a reply always
/// resurfaces the record.
pub async fn handle_respond(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.respond message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RespondRequest> = match serde_json::from_slice(&msg.payload) {
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

        if request.payload.message.trim().is_empty() {
            let error = ErrorResponse::with_details(
                request.id,
                "VALIDATION_ERROR",
                "Invalid response",
                serde_json::json!({"fields": [{"field": "message", "message": "message must not be empty"}]}),
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::contact::add_response(
            &pool,
            request.payload.id,
            request.payload.message.trim(),
            auth_info.operator_id,
            request.payload.method,
        )
        .await
        {
            Ok(Some(contact)) => {
                let response = SuccessResponse::new(request.id, contact);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Contact not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to add response: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle contact.note messages (status unchanged)
pub async fn handle_add_note(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.note message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<AddNoteRequest> = match serde_json::from_slice(&msg.payload) {
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

        if request.payload.content.trim().is_empty() {
            let error = ErrorResponse::with_details(
                request.id,
                "VALIDATION_ERROR",
                "Invalid note",
                serde_json::json!({"fields": [{"field": "content", "message": "content must not be empty"}]}),
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::contact::add_note(
            &pool,
            request.payload.id,
            request.payload.content.trim(),
            auth_info.operator_id,
            request.payload.is_private,
        )
        .await
        {
            // The dashboard expects the full submission back, not the note
            Ok(Some(_note)) => match queries::contact::get_contact(&pool, request.payload.id).await
            {
                Ok(Some(contact)) => {
                    let response = SuccessResponse::new(request.id, contact);
                    let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                }
                Ok(None) => {
                    let error = ErrorResponse::new(request.id, "NOT_FOUND", "Contact not found");
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                }
                Err(e) => {
                    error!("Failed to reload contact: {}", e);
                    let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                }
            },
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Contact not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to add note: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle contact.status messages (direct overwrite, no transition checks)
pub async fn handle_update_status(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.status message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateStatusRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::contact::update_status(&pool, request.payload.id, request.payload.status)
            .await
        {
            Ok(Some(contact)) => {
                let response = SuccessResponse::new(request.id, contact);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Contact not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update status: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle contact.update messages (triage fields)
pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateContactRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::contact::update_contact(&pool, &request.payload).await {
            Ok(Some(contact)) => {
                let response = SuccessResponse::new(request.id, contact);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Contact not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update contact: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle contact.bulk messages
pub async fn handle_bulk(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.bulk message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<BulkUpdateRequest> = match serde_json::from_slice(&msg.payload) {
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

        if let Err(validation_err) = validation::validate_bulk(&request.payload) {
            let error = ErrorResponse::with_details(
                request.id,
                "VALIDATION_ERROR",
                "Invalid bulk action",
                validation_err.to_details(),
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let ids = &request.payload.ids;
        let result = match request.payload.action {
            BulkAction::Delete => queries::contact::bulk_delete(&pool, ids).await,
            BulkAction::MarkAsRead => {
                queries::contact::bulk_mark_read(&pool, ids, auth_info.operator_id).await
            }
            BulkAction::MarkAsSpam => queries::contact::bulk_mark_spam(&pool, ids).await,
            BulkAction::UpdateStatus => {
                // status presence checked by validate_bulk
                let status = request.payload.status.unwrap_or_default();
                queries::contact::bulk_update_status(&pool, ids, status).await
            }
        };

        match result {
            Ok(affected_count) => {
                let response =
                    SuccessResponse::new(request.id, BulkUpdateResponse { affected_count });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                debug!("Bulk action affected {} contacts", affected_count);
            }
            Err(e) => {
                error!("Failed to apply bulk action: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle contact.stats messages
pub async fn handle_stats(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.stats message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<crate::types::EmptyPayload> = match serde_json::from_slice(&msg.payload)
        {
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

        match queries::contact::get_stats(&pool).await {
            Ok(stats) => {
                let response = SuccessResponse::new(request.id, stats);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to compute stats: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle contact.delete messages
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ContactIdRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::contact::delete_contact(&pool, request.payload.id).await {
            Ok(true) => {
                let response = SuccessResponse::new(request.id, DeleteResponse { deleted: true });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
                debug!("Deleted contact: {}", request.payload.id);
            }
            Ok(false) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Contact not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to delete contact: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle contact.export messages (CSV, base64 in the JSON envelope)
pub async fn handle_export(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received contact.export message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<crate::types::EmptyPayload> = match serde_json::from_slice(&msg.payload)
        {
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

        let contacts = match queries::contact::list_for_export(&pool).await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load contacts for export: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let csv_bytes = match submissions_to_csv(&contacts) {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to serialize export: {}", e);
                let error = ErrorResponse::new(request.id, "EXPORT_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let response = SuccessResponse::new(
            request.id,
            ExportResponse {
                filename: format!("contacts-{}.csv", chrono::Utc::now().format("%Y-%m-%d")),
                content_type: "text/csv".to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(&csv_bytes),
                row_count: contacts.len(),
            },
        );
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
        debug!("Exported {} contacts", contacts.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::recorder::testing::{CountingRecorder, FailingRecorder};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_submission_survives_conversion_failure() {
        // A dead analytics store must not bubble an error out of the submit
        // path; the helper reports the miss and nothing else.
        let recorded = record_submit_conversion(&FailingRecorder, "sess-1", Uuid::nil()).await;
        assert!(!recorded);
    }

    #[tokio::test]
    async fn test_conversion_recorded_once_per_submission() {
        let recorder = CountingRecorder::default();
        let recorded = record_submit_conversion(&recorder, "sess-1", Uuid::nil()).await;
        assert!(recorded);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    }
}
