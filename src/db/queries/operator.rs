//! Operator database queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::operator::Operator;

const OPERATOR_COLUMNS: &str =
    "id, email, name, password_hash, role, created_at, last_login_at";

/// Find an operator by (lowercased) email
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Operator>> {
    let operator = sqlx::query_as::<_, Operator>(&format!(
        "SELECT {OPERATOR_COLUMNS} FROM operators WHERE email = $1"
    ))
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;

    Ok(operator)
}

/// Create an admin operator, or replace the password/name if the email
/// already exists (used by the create-admin CLI).
pub async fn upsert_admin(
    pool: &PgPool,
    email: &str,
    name: &str,
    password_hash: &str,
) -> Result<Operator> {
    let operator = sqlx::query_as::<_, Operator>(&format!(
        r#"
        INSERT INTO operators (id, email, name, password_hash, role, created_at)
        VALUES ($1, $2, $3, $4, 'admin', NOW())
        ON CONFLICT (email) DO UPDATE
        SET password_hash = EXCLUDED.password_hash, name = EXCLUDED.name
        RETURNING {OPERATOR_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(email.trim().to_lowercase())
    .bind(name)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    Ok(operator)
}

/// Stamp a successful login
pub async fn touch_last_login(pool: &PgPool, operator_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE operators SET last_login_at = NOW() WHERE id = $1")
        .bind(operator_id)
        .execute(pool)
        .await?;

    Ok(())
}
