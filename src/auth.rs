//! Password hashing, JWT issuing/validation, and Google OAuth plumbing.

use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::AuthPayload;

const ACCESS_TOKEN_EXPIRE_SECS: usize = 30 * 24 * 60 * 60; // 30 days
const REFRESH_TOKEN_EXPIRE_SECS: usize = 30 * 24 * 60 * 60;

fn jwt_secret() -> Vec<u8> {
    // Set JWT_SECRET in the environment for anything beyond local dev
    std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "flyerflow_dev_secret".to_string())
        .into_bytes()
}

pub fn hash_password(password: &str) -> std::result::Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

pub fn verify_password(
    password: &str,
    password_hash: &str,
) -> std::result::Result<bool, bcrypt::BcryptError> {
    verify(password, password_hash)
}

fn create_token(user_id: Uuid, token_type: &str, expire_secs: usize) -> Result<String> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Internal(e.to_string()))?
        .as_secs() as usize
        + expire_secs;

    let claims = AuthPayload {
        sub: user_id.to_string(),
        exp: expiration,
        token_type: token_type.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&jwt_secret()),
    )
    .map_err(|e| Error::Internal(format!("token encoding failed: {e}")))
}

pub fn create_access_token(user_id: Uuid) -> Result<String> {
    create_token(user_id, "access", ACCESS_TOKEN_EXPIRE_SECS)
}

pub fn create_refresh_token(user_id: Uuid) -> Result<String> {
    create_token(user_id, "refresh", REFRESH_TOKEN_EXPIRE_SECS)
}

/// Validates a JWT and checks it is of the expected type
/// ("access" or "refresh"). Any failure maps to Unauthorized.
pub fn validate_token(token: &str, expected_type: &str) -> Result<AuthPayload> {
    let token_data = decode::<AuthPayload>(
        token,
        &DecodingKey::from_secret(&jwt_secret()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| Error::Unauthorized)?;

    if token_data.claims.token_type != expected_type {
        return Err(Error::Unauthorized);
    }
    Ok(token_data.claims)
}

/// Extracts the user id from a validated access token.
pub fn user_id_from_token(token: &str) -> Result<Uuid> {
    let claims = validate_token(token, "access")?;
    Uuid::parse_str(&claims.sub).map_err(|_| Error::Unauthorized)
}

/// One-shot store for OAuth login states.
///
/// Each entry expires individually after the TTL, and `take` removes the
/// entry it returns, so a state can be redeemed at most once. Cleanup
/// happens lazily on `put`; nothing ever clears other users' in-flight
/// states.
pub struct StateStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl StateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, state: String) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        entries.retain(|_, issued| issued.elapsed() <= ttl);
        entries.insert(state, Instant::now());
    }

    /// Removes and returns the issue time for `state` if it exists and has
    /// not expired.
    pub fn take(&self, state: &str) -> Option<Instant> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let issued = entries.remove(state)?;
        (issued.elapsed() <= self.ttl).then_some(issued)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(10 * 60))
    }
}

// --- Google OAuth (code exchange + userinfo via reqwest) ---

#[derive(Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Deserialize, Debug)]
pub struct GoogleUserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

fn oauth_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::Internal(format!("{key} is not configured")))
}

/// Builds the Google authorize URL for a freshly issued state.
pub fn google_authorize_url(state: &str) -> Result<String> {
    let client_id = oauth_env("GOOGLE_CLIENT_ID")?;
    let redirect_uri = oauth_env("GOOGLE_REDIRECT_URI")?;
    Ok(format!(
        "https://accounts.google.com/o/oauth2/v2/auth?client_id={client_id}\
         &redirect_uri={redirect_uri}&response_type=code\
         &scope=openid%20email%20profile&state={state}"
    ))
}

/// Exchanges an authorization code for the Google user profile.
pub async fn exchange_google_code(code: &str) -> Result<GoogleUserInfo> {
    let client = reqwest::Client::new();

    let params = [
        ("code", code.to_string()),
        ("client_id", oauth_env("GOOGLE_CLIENT_ID")?),
        ("client_secret", oauth_env("GOOGLE_CLIENT_SECRET")?),
        ("redirect_uri", oauth_env("GOOGLE_REDIRECT_URI")?),
        ("grant_type", "authorization_code".to_string()),
    ];

    let token_res = client
        .post("https://oauth2.googleapis.com/token")
        .form(&params)
        .send()
        .await
        .map_err(|e| Error::Internal(format!("token exchange failed: {e}")))?;

    if !token_res.status().is_success() {
        return Err(Error::Validation(
            "Failed to exchange authorization code".into(),
        ));
    }

    let tokens: GoogleTokenResponse = token_res
        .json()
        .await
        .map_err(|e| Error::Internal(format!("bad token response: {e}")))?;

    client
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .bearer_auth(tokens.access_token)
        .send()
        .await
        .map_err(|e| Error::Internal(format!("userinfo fetch failed: {e}")))?
        .json::<GoogleUserInfo>()
        .await
        .map_err(|e| Error::Internal(format!("bad userinfo response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hashed = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hashed).unwrap());
        assert!(!verify_password("hunter3", &hashed).unwrap());
    }

    #[test]
    fn test_access_token_roundtrip_and_type_check() {
        let user_id = Uuid::new_v4();
        let access = create_access_token(user_id).unwrap();
        assert_eq!(user_id_from_token(&access).unwrap(), user_id);

        // A refresh token is not accepted where an access token is expected
        let refresh = create_refresh_token(user_id).unwrap();
        assert!(matches!(
            validate_token(&refresh, "access"),
            Err(Error::Unauthorized)
        ));
        assert!(validate_token(&refresh, "refresh").is_ok());

        assert!(matches!(
            user_id_from_token("not-a-token"),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn test_state_store_is_one_shot() {
        let store = StateStore::default();
        store.put("abc".into());
        assert!(store.take("abc").is_some());
        assert!(store.take("abc").is_none(), "states redeem at most once");
        assert!(store.take("never-issued").is_none());
    }

    #[test]
    fn test_state_store_survives_poisoned_lock() {
        let store = std::sync::Arc::new(StateStore::default());
        store.put("before".into());

        let poisoner = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.entries.lock().unwrap();
            panic!("poisoning the state store lock");
        })
        .join();

        store.put("after".into());
        assert!(store.take("before").is_some());
        assert!(store.take("after").is_some());
    }

    #[test]
    fn test_state_store_expires_entries_individually() {
        let store = StateStore::new(Duration::from_millis(20));
        store.put("old".into());
        std::thread::sleep(Duration::from_millis(40));
        store.put("fresh".into());
        assert!(store.take("old").is_none(), "expired state is rejected");
        assert!(store.take("fresh").is_some(), "other states are untouched");
    }
}
