//! Authentication utilities: JWT token management and password hashing

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Request;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (operator ID)
    pub sub: String,
    /// Operator email
    pub email: String,
    /// Operator role (currently always "admin")
    pub role: String,
    /// Issued at (unix timestamp)
    pub iat: usize,
    /// Expiration (unix timestamp)
    pub exp: usize,
}

/// Authentication result from extract_auth
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub operator_id: Uuid,
    pub role: String,
}

impl AuthInfo {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Generate a JWT access token
pub fn generate_token(operator_id: Uuid, email: &str, role: &str, secret: &str) -> Result<String> {
    let now = chrono::Utc::now().timestamp() as usize;
    let exp = now + 8 * 60 * 60; // 8 hours (working day)

    let claims = Claims {
        sub: operator_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        iat: now,
        exp,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a JWT token and return claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| anyhow!("Invalid token: {}", e))?;

    Ok(token_data.claims)
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow!("Invalid password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Extract authentication info from a request envelope.
///
/// The envelope's `token` must hold a valid JWT; there is no legacy
/// unauthenticated path.
pub fn extract_auth<T>(request: &Request<T>, jwt_secret: &str) -> Result<AuthInfo> {
    let token = request
        .token
        .as_deref()
        .ok_or_else(|| anyhow!("No authentication provided — JWT token is required"))?;

    let claims = validate_token(token, jwt_secret)?;
    let operator_id = Uuid::parse_str(&claims.sub)
        .map_err(|e| anyhow!("Invalid operator_id in token: {}", e))?;

    Ok(AuthInfo {
        operator_id,
        role: claims.role,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmptyPayload, Request};

    const TEST_SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    // ---- Password hashing tests ----

    #[test]
    fn test_hash_password_produces_valid_hash() {
        let hash = hash_password("my-secure-password").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(hash.len() > 50);
    }

    #[test]
    fn test_hash_password_different_each_time() {
        let hash1 = hash_password("same-password").unwrap();
        let hash2 = hash_password("same-password").unwrap();
        assert_ne!(hash1, hash2, "Hashes should differ due to random salt");
    }

    #[test]
    fn test_verify_password_correct() {
        let hash = hash_password("correct-password").unwrap();
        assert!(verify_password("correct-password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_incorrect() {
        let hash = hash_password("correct-password").unwrap();
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        let result = verify_password("any-password", "not-a-valid-hash");
        assert!(result.is_err());
    }

    // ---- JWT token tests ----

    #[test]
    fn test_token_roundtrip() {
        let id = Uuid::new_v4();
        let token = generate_token(id, "admin@example.com", "admin", TEST_SECRET).unwrap();
        let claims = validate_token(&token, TEST_SECRET).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.email, "admin@example.com");
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_wrong_secret_rejected() {
        let token = generate_token(Uuid::new_v4(), "a@b.com", "admin", TEST_SECRET).unwrap();
        assert!(validate_token(&token, "another-secret-that-is-long-enough-too").is_err());
    }

    #[test]
    fn test_token_garbage_rejected() {
        assert!(validate_token("not.a.token", TEST_SECRET).is_err());
    }

    // ---- extract_auth tests ----

    #[test]
    fn test_extract_auth_with_valid_token() {
        let id = Uuid::new_v4();
        let token = generate_token(id, "admin@example.com", "admin", TEST_SECRET).unwrap();
        let request = Request::with_token(token, EmptyPayload {});
        let auth = extract_auth(&request, TEST_SECRET).unwrap();
        assert_eq!(auth.operator_id, id);
        assert!(auth.is_admin());
    }

    #[test]
    fn test_extract_auth_no_token_fails() {
        let request = Request::anonymous(EmptyPayload {});
        assert!(extract_auth(&request, TEST_SECRET).is_err());
    }

    #[test]
    fn test_extract_auth_invalid_token_fails() {
        let request = Request::with_token("garbage".to_string(), EmptyPayload {});
        assert!(extract_auth(&request, TEST_SECRET).is_err());
    }

    #[test]
    fn test_non_admin_role_detected() {
        let token = generate_token(Uuid::new_v4(), "v@example.com", "viewer", TEST_SECRET).unwrap();
        let request = Request::with_token(token, EmptyPayload {});
        let auth = extract_auth(&request, TEST_SECRET).unwrap();
        assert!(!auth.is_admin());
    }
}
