//! Operator (admin user) types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Operator entity (includes the password hash — never serialize directly)
#[derive(Debug, Clone, FromRow)]
pub struct Operator {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Public view of an operator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorPublic {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl From<&Operator> for OperatorPublic {
    fn from(op: &Operator) -> Self {
        Self {
            id: op.id,
            email: op.email.clone(),
            name: op.name.clone(),
            role: op.role.clone(),
        }
    }
}

/// Login request payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response with the issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub operator: OperatorPublic,
}

/// Token verification request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub token: String,
}

/// Token verification response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    pub operator_id: Option<Uuid>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_public_omits_password_hash() {
        let op = Operator {
            id: Uuid::nil(),
            email: "admin@example.com".to_string(),
            name: "Admin".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: "admin".to_string(),
            created_at: Utc::now(),
            last_login_at: None,
        };
        let public = OperatorPublic::from(&op);
        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("admin@example.com"));
    }
}
