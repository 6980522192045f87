//! Contact submission database queries

use anyhow::Result;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::services::spam::SpamVerdict;
use crate::types::contact::{
    BreakdownCount, ContactBreakdown, ContactNote, ContactOverview, ContactResponse,
    ContactStatsResponse, ContactStatus, ContactSubmission, DailyCount, ListContactsRequest,
    ResponseMethod, SubmitContactRequest, UpdateContactRequest,
};

const CONTACT_COLUMNS: &str = r#"
    id, name, email, phone, subject, message, category, priority,
    project_type, budget, timeline, status, is_spam, spam_score,
    source, ip_address, user_agent, referrer,
    read_at, read_by, follow_up_date, estimated_value, tags,
    created_at, updated_at
"#;

/// Insert a new submission. The email is stored lowercased; spam verdict
/// comes from the scorer and is never caller-settable.
pub async fn create_contact(
    pool: &PgPool,
    req: &SubmitContactRequest,
    verdict: SpamVerdict,
) -> Result<ContactSubmission> {
    let contact = sqlx::query_as::<_, ContactSubmission>(
        r#"
        INSERT INTO contact_submissions (
            id, name, email, phone, subject, message, category, priority,
            project_type, budget, timeline, is_spam, spam_score,
            ip_address, user_agent, referrer, created_at, updated_at
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8,
            $9, $10, $11, $12, $13,
            $14, $15, $16, NOW(), NOW()
        )
        RETURNING
            id, name, email, phone, subject, message, category, priority,
            project_type, budget, timeline, status, is_spam, spam_score,
            source, ip_address, user_agent, referrer,
            read_at, read_by, follow_up_date, estimated_value, tags,
            created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.name.trim())
    .bind(req.email.trim().to_lowercase())
    .bind(&req.phone)
    .bind(req.subject.trim())
    .bind(req.message.trim())
    .bind(req.category.unwrap_or_default())
    .bind(req.priority.unwrap_or_default())
    .bind(&req.project_type)
    .bind(req.budget.as_deref().unwrap_or("Not specified"))
    .bind(req.timeline.as_deref().unwrap_or("Not specified"))
    .bind(verdict.is_spam)
    .bind(verdict.score as i16)
    .bind(&req.ip_address)
    .bind(&req.user_agent)
    .bind(&req.referrer)
    .fetch_one(pool)
    .await?;

    Ok(contact)
}

/// Get a submission by ID
pub async fn get_contact(pool: &PgPool, contact_id: Uuid) -> Result<Option<ContactSubmission>> {
    let contact = sqlx::query_as::<_, ContactSubmission>(&format!(
        "SELECT {CONTACT_COLUMNS} FROM contact_submissions WHERE id = $1"
    ))
    .bind(contact_id)
    .fetch_optional(pool)
    .await?;

    Ok(contact)
}

/// Responses for one submission, in insertion order
pub async fn list_responses(pool: &PgPool, contact_id: Uuid) -> Result<Vec<ContactResponse>> {
    let responses = sqlx::query_as::<_, ContactResponse>(
        r#"
        SELECT id, contact_id, message, responded_by, method, responded_at
        FROM contact_responses
        WHERE contact_id = $1
        ORDER BY responded_at ASC, id ASC
        "#,
    )
    .bind(contact_id)
    .fetch_all(pool)
    .await?;

    Ok(responses)
}

/// Notes for one submission, in insertion order
pub async fn list_notes(pool: &PgPool, contact_id: Uuid) -> Result<Vec<ContactNote>> {
    let notes = sqlx::query_as::<_, ContactNote>(
        r#"
        SELECT id, contact_id, content, created_by, is_private, created_at
        FROM contact_notes
        WHERE contact_id = $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(contact_id)
    .fetch_all(pool)
    .await?;

    Ok(notes)
}

/// Append the shared filter predicates to a list/count query.
///
/// Spam is excluded unless the caller filters for the spam status
/// explicitly.
fn push_filters(builder: &mut QueryBuilder<Postgres>, req: &ListContactsRequest) {
    match req.status {
        Some(ContactStatus::Spam) => {
            builder.push(" AND (status = 'spam' OR is_spam = TRUE)");
        }
        Some(status) => {
            builder.push(" AND is_spam = FALSE AND status = ");
            builder.push_bind(status);
        }
        None => {
            builder.push(" AND is_spam = FALSE");
        }
    }

    if let Some(category) = req.category {
        builder.push(" AND category = ");
        builder.push_bind(category);
    }

    if let Some(priority) = req.priority {
        builder.push(" AND priority = ");
        builder.push_bind(priority);
    }

    if let Some(ref search) = req.search {
        let pattern = format!("%{}%", search);
        builder.push(" AND (name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR email ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR subject ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR message ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if let Some(date_from) = req.date_from {
        builder.push(" AND created_at >= ");
        builder.push_bind(date_from);
    }

    if let Some(date_to) = req.date_to {
        builder.push(" AND created_at <= ");
        builder.push_bind(date_to);
    }
}

/// Map the wire sort field to a column (whitelist — never interpolate input).
fn sort_column(sort_by: Option<&str>) -> &'static str {
    match sort_by {
        Some("name") => "name",
        Some("priority") => "priority",
        Some("status") => "status",
        Some("updatedAt") => "updated_at",
        _ => "created_at",
    }
}

/// List submissions with filters, sorting and pagination.
/// Returns the page of items and the total count under the same filters.
pub async fn list_contacts(
    pool: &PgPool,
    req: &ListContactsRequest,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ContactSubmission>, i64)> {
    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM contact_submissions WHERE 1=1");
    push_filters(&mut count_builder, req);
    let total: i64 = count_builder.build_query_scalar().fetch_one(pool).await?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {CONTACT_COLUMNS} FROM contact_submissions WHERE 1=1"
    ));
    push_filters(&mut builder, req);

    let order = match req.sort_order.as_deref() {
        Some("asc") => "ASC",
        _ => "DESC",
    };
    builder.push(format!(
        " ORDER BY {} {} LIMIT ",
        sort_column(req.sort_by.as_deref()),
        order
    ));
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let contacts = builder
        .build_query_as::<ContactSubmission>()
        .fetch_all(pool)
        .await?;

    Ok((contacts, total))
}

/// Mark a submission read. Idempotent — re-invoking just re-stamps.
pub async fn mark_as_read(
    pool: &PgPool,
    contact_id: Uuid,
    operator_id: Uuid,
) -> Result<Option<ContactSubmission>> {
    let contact = sqlx::query_as::<_, ContactSubmission>(&format!(
        r#"
        UPDATE contact_submissions
        SET status = 'read', read_at = NOW(), read_by = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {CONTACT_COLUMNS}
        "#
    ))
    .bind(contact_id)
    .bind(operator_id)
    .fetch_optional(pool)
    .await?;

    Ok(contact)
}

/// Append a response and set the status to responded.
///
/// The status overwrite is unconditional, including from `closed` — the
/// dashboard relies on a reply always surfacing as "responded". Both
/// statements run in one transaction so a record is never left marked
/// responded without the appended response.
pub async fn add_response(
    pool: &PgPool,
    contact_id: Uuid,
    message: &str,
    operator_id: Uuid,
    method: ResponseMethod,
) -> Result<Option<ContactSubmission>> {
    let mut tx = pool.begin().await?;

    let contact = sqlx::query_as::<_, ContactSubmission>(&format!(
        r#"
        UPDATE contact_submissions
        SET status = 'responded', updated_at = NOW()
        WHERE id = $1
        RETURNING {CONTACT_COLUMNS}
        "#
    ))
    .bind(contact_id)
    .fetch_optional(&mut *tx)
    .await?;

    let contact = match contact {
        Some(c) => c,
        None => return Ok(None),
    };

    sqlx::query(
        r#"
        INSERT INTO contact_responses (id, contact_id, message, responded_by, method, responded_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(contact_id)
    .bind(message)
    .bind(operator_id)
    .bind(method)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(contact))
}

/// Append a note. Does not touch the status.
pub async fn add_note(
    pool: &PgPool,
    contact_id: Uuid,
    content: &str,
    operator_id: Uuid,
    is_private: bool,
) -> Result<Option<ContactNote>> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM contact_submissions WHERE id = $1)")
            .bind(contact_id)
            .fetch_one(pool)
            .await?;
    if !exists {
        return Ok(None);
    }

    let note = sqlx::query_as::<_, ContactNote>(
        r#"
        INSERT INTO contact_notes (id, contact_id, content, created_by, is_private, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        RETURNING id, contact_id, content, created_by, is_private, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(contact_id)
    .bind(content)
    .bind(operator_id)
    .bind(is_private)
    .fetch_one(pool)
    .await?;

    Ok(Some(note))
}

/// Overwrite the status (no transition validation — advisory lifecycle).
pub async fn update_status(
    pool: &PgPool,
    contact_id: Uuid,
    status: ContactStatus,
) -> Result<Option<ContactSubmission>> {
    let contact = sqlx::query_as::<_, ContactSubmission>(&format!(
        r#"
        UPDATE contact_submissions
        SET status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {CONTACT_COLUMNS}
        "#
    ))
    .bind(contact_id)
    .bind(status)
    .fetch_optional(pool)
    .await?;

    Ok(contact)
}

/// Admin edit of triage fields
pub async fn update_contact(
    pool: &PgPool,
    req: &UpdateContactRequest,
) -> Result<Option<ContactSubmission>> {
    let contact = sqlx::query_as::<_, ContactSubmission>(&format!(
        r#"
        UPDATE contact_submissions
        SET
            priority = COALESCE($2, priority),
            tags = COALESCE($3, tags),
            follow_up_date = COALESCE($4, follow_up_date),
            estimated_value = COALESCE($5, estimated_value),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {CONTACT_COLUMNS}
        "#
    ))
    .bind(req.id)
    .bind(req.priority)
    .bind(&req.tags)
    .bind(req.follow_up_date)
    .bind(req.estimated_value)
    .fetch_optional(pool)
    .await?;

    Ok(contact)
}

/// Delete one submission (responses/notes cascade)
pub async fn delete_contact(pool: &PgPool, contact_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM contact_submissions WHERE id = $1")
        .bind(contact_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Bulk actions
// ============================================================================

pub async fn bulk_delete(pool: &PgPool, ids: &[Uuid]) -> Result<u64> {
    let result = sqlx::query("DELETE FROM contact_submissions WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn bulk_mark_read(pool: &PgPool, ids: &[Uuid], operator_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE contact_submissions
        SET status = 'read', read_at = NOW(), read_by = $2, updated_at = NOW()
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .bind(operator_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn bulk_mark_spam(pool: &PgPool, ids: &[Uuid]) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE contact_submissions
        SET is_spam = TRUE, status = 'spam', updated_at = NOW()
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn bulk_update_status(
    pool: &PgPool,
    ids: &[Uuid],
    status: ContactStatus,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE contact_submissions
        SET status = $2, updated_at = NOW()
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

// ============================================================================
// Stats
// ============================================================================

/// Dashboard statistics. Spam is excluded from every number except the spam
/// counter itself.
pub async fn get_stats(pool: &PgPool) -> Result<ContactStatsResponse> {
    let now = Utc::now();
    let month_ago = now - chrono::Duration::days(30);
    let week_ago = now - chrono::Duration::days(7);

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM contact_submissions WHERE is_spam = FALSE")
            .fetch_one(pool)
            .await?;

    let unread: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM contact_submissions WHERE is_spam = FALSE AND status = 'new'",
    )
    .fetch_one(pool)
    .await?;

    let spam: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM contact_submissions WHERE is_spam = TRUE")
            .fetch_one(pool)
            .await?;

    let recent: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM contact_submissions WHERE is_spam = FALSE AND created_at >= $1",
    )
    .bind(month_ago)
    .fetch_one(pool)
    .await?;

    let weekly: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM contact_submissions WHERE is_spam = FALSE AND created_at >= $1",
    )
    .bind(week_ago)
    .fetch_one(pool)
    .await?;

    let status_breakdown = sqlx::query_as::<_, BreakdownCount>(
        r#"
        SELECT status::TEXT AS key, COUNT(*) AS count
        FROM contact_submissions
        WHERE is_spam = FALSE
        GROUP BY status
        ORDER BY count DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let category_breakdown = sqlx::query_as::<_, BreakdownCount>(
        r#"
        SELECT category::TEXT AS key, COUNT(*) AS count
        FROM contact_submissions
        WHERE is_spam = FALSE
        GROUP BY category
        ORDER BY count DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let priority_breakdown = sqlx::query_as::<_, BreakdownCount>(
        r#"
        SELECT priority::TEXT AS key, COUNT(*) AS count
        FROM contact_submissions
        WHERE is_spam = FALSE
        GROUP BY priority
        ORDER BY count DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let daily_stats = sqlx::query_as::<_, DailyCount>(
        r#"
        SELECT created_at::DATE AS date, COUNT(*) AS count
        FROM contact_submissions
        WHERE is_spam = FALSE AND created_at >= $1
        GROUP BY created_at::DATE
        ORDER BY date ASC
        "#,
    )
    .bind(month_ago)
    .fetch_all(pool)
    .await?;

    Ok(ContactStatsResponse {
        overview: ContactOverview {
            total_contacts: total.0,
            unread_contacts: unread.0,
            spam_contacts: spam.0,
            recent_contacts: recent.0,
            weekly_contacts: weekly.0,
        },
        breakdown: ContactBreakdown {
            status: status_breakdown,
            category: category_breakdown,
            priority: priority_breakdown,
        },
        daily_stats,
    })
}

/// All non-spam submissions for CSV export, oldest first
pub async fn list_for_export(pool: &PgPool) -> Result<Vec<ContactSubmission>> {
    let contacts = sqlx::query_as::<_, ContactSubmission>(&format!(
        r#"
        SELECT {CONTACT_COLUMNS} FROM contact_submissions
        WHERE is_spam = FALSE
        ORDER BY created_at ASC
        "#
    ))
    .fetch_all(pool)
    .await?;

    Ok(contacts)
}
