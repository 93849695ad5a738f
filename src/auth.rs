use crate::config::SessionConfig;
use crate::error::{AppError, AppResult};
use crate::models::Account;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "auth_token";

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password with argon2 and a fresh random salt
///
/// # Returns
/// The PHC-formatted hash string to store
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Message(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored hash
///
/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Session token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Signing material and cookie policy for session tokens
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
    secure_cookies: bool,
}

impl SessionKeys {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl_secs: config.ttl_days * 24 * 60 * 60,
            secure_cookies: config.secure_cookies,
        }
    }

    /// Issue a signed token for an account
    ///
    /// # Arguments
    /// * `account` - The authenticated account
    ///
    /// # Returns
    /// The encoded HS256 token
    pub fn issue(&self, account: &Account) -> AppResult<String> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: account.id,
            email: account.email.clone(),
            role: account.role.clone(),
            iat,
            exp: iat + self.ttl_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Message(format!("Token signing failed: {}", e)))
    }

    /// Verify a token's signature and expiry
    ///
    /// # Returns
    /// * `Ok(Claims)` if the token is valid
    /// * `Err(AppError::Forbidden)` if it is malformed, tampered with or expired
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Forbidden(format!("Invalid or expired token: {}", e)))
    }

    /// `Set-Cookie` value carrying a fresh session token
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; HttpOnly; Path=/; Max-Age={}; {}",
            SESSION_COOKIE,
            token,
            self.ttl_secs,
            self.same_site()
        )
    }

    /// `Set-Cookie` value that expires the session cookie
    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; HttpOnly; Path=/; Max-Age=0; {}",
            SESSION_COOKIE,
            self.same_site()
        )
    }

    fn same_site(&self) -> &'static str {
        if self.secure_cookies {
            "SameSite=None; Secure"
        } else {
            "SameSite=Lax"
        }
    }
}

/// Extract the session token from a `Cookie` header value
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Extract the token from an `Authorization: Bearer` header value
pub fn token_from_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
