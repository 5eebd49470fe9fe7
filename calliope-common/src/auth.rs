//! Credentials and bearer tokens
//!
//! # Passwords
//!
//! Stored as a random 16-byte salt plus a stretched SHA-256 digest, both hex
//! encoded. Stretching runs [`HASH_ROUNDS`] iterations over
//! `salt || password || previous digest`.
//!
//! # Tokens
//!
//! `base64url(canonical claims JSON) "." hex(SHA-256(canonical JSON || secret))`
//!
//! The secret is a non-zero i64 kept in the `settings` table under
//! [`TOKEN_SECRET_KEY`]. Canonical JSON sorts object keys and drops
//! whitespace, so the signature does not depend on serializer field order.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::db::settings::{get_setting, set_setting};
use crate::{Error, Result};

/// Settings key holding the token signing secret
pub const TOKEN_SECRET_KEY: &str = "token_secret";

/// Salt length in bytes
pub const SALT_BYTES: usize = 16;

/// Key stretching iterations
pub const HASH_ROUNDS: u32 = 10_000;

// ========================================
// Roles
// ========================================

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

// ========================================
// Password Hashing
// ========================================

/// Salted password digest ready for storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
}

/// Hash a password with a freshly generated salt
pub fn hash_password(password: &str) -> PasswordHash {
    let mut salt = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = to_hex(&salt);

    PasswordHash {
        hash: hash_password_with_salt(password, &salt),
        salt,
    }
}

/// Hash a password with a known hex salt
///
/// Iterated salted SHA-256. This slows brute force down by the round count
/// only; it is not a memory-hard KDF such as argon2 or scrypt, so a leaked
/// `users` table is cheap to attack with GPUs.
pub fn hash_password_with_salt(password: &str, salt: &str) -> String {
    let mut digest = [0u8; 32];
    for _ in 0..HASH_ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        hasher.update(digest);
        digest.copy_from_slice(&hasher.finalize());
    }
    to_hex(&digest)
}

/// Check a password against a stored hash and salt
pub fn verify_password(password: &str, hash: &str, salt: &str) -> bool {
    let candidate = hash_password_with_salt(password, salt);
    constant_time_eq(candidate.as_bytes(), hash.as_bytes())
}

// ========================================
// Tokens
// ========================================

/// Claims carried by a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    /// Expiry, Unix seconds
    pub exp: i64,
}

impl Claims {
    pub fn new(sub: Uuid, username: impl Into<String>, role: Role, now: i64, ttl_secs: i64) -> Self {
        Self {
            sub,
            username: username.into(),
            role,
            exp: now + ttl_secs,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Token verification failures
#[derive(Debug, Clone, PartialEq)]
pub enum TokenError {
    /// Not two dot-separated parts, bad base64, or bad JSON
    Malformed(String),

    /// Signature does not match the payload
    InvalidSignature,

    /// Token is past its expiry
    Expired { exp: i64, now: i64 },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed(reason) => write!(f, "Malformed token: {}", reason),
            TokenError::InvalidSignature => write!(f, "Invalid token signature"),
            TokenError::Expired { exp, now } => {
                write!(f, "Token expired {}s ago", now - exp)
            }
        }
    }
}

impl std::error::Error for TokenError {}

/// Sign claims into a bearer token
pub fn issue_token(claims: &Claims, secret: i64) -> Result<String> {
    let value = serde_json::to_value(claims)
        .map_err(|e| Error::Internal(format!("Failed to encode claims: {}", e)))?;
    let canonical = to_canonical_json(&value);
    let signature = sign(&canonical, secret);

    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(canonical.as_bytes()),
        signature
    ))
}

/// Verify a bearer token and return its claims
///
/// `now` is Unix seconds; a token is valid up to and including `exp`.
pub fn verify_token(token: &str, secret: i64, now: i64) -> std::result::Result<Claims, TokenError> {
    let (payload, signature) = token
        .split_once('.')
        .ok_or_else(|| TokenError::Malformed("missing signature".to_string()))?;

    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    let canonical =
        String::from_utf8(decoded).map_err(|e| TokenError::Malformed(e.to_string()))?;

    let expected = sign(&canonical, secret);
    if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        return Err(TokenError::InvalidSignature);
    }

    let claims: Claims =
        serde_json::from_str(&canonical).map_err(|e| TokenError::Malformed(e.to_string()))?;

    if claims.exp < now {
        return Err(TokenError::Expired { exp: claims.exp, now });
    }

    Ok(claims)
}

fn sign(canonical: &str, secret: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(secret.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Convert JSON to canonical form (sorted keys, no whitespace)
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        // serde_json's own rendering handles string escaping and numbers
        other => other.to_string(),
    }
}

// ========================================
// Secret Management
// ========================================

/// Load the token signing secret, generating and storing one on first use
pub async fn load_token_secret(db: &SqlitePool) -> Result<i64> {
    match get_setting(db, TOKEN_SECRET_KEY).await? {
        Some(value) => value
            .parse::<i64>()
            .map_err(|e| Error::Config(format!("Invalid {}: {}", TOKEN_SECRET_KEY, e))),
        None => initialize_token_secret(db).await,
    }
}

/// Generate a random non-zero secret and store it
pub async fn initialize_token_secret(db: &SqlitePool) -> Result<i64> {
    let secret: i64 = {
        let mut rng = rand::thread_rng();
        loop {
            let val = rng.gen::<i64>();
            if val != 0 {
                break val;
            }
        }
    };

    set_setting(db, TOKEN_SECRET_KEY, &secret.to_string()).await?;
    tracing::info!("Generated new token signing secret");

    Ok(secret)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
