//! Email one-time-code login for the demo wallet.
//!
//! There is no delivery channel: every challenge accepts the fixed demo code.
//! A verified login is remembered as two flags in the key-value store.

use rw_api_types::{OtpChallengeResponse, OtpVerifyRequest, OtpVerifyResponse, SessionResponse};
use rw_storage::KeyValueStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

pub const DEMO_OTP_CODE: &str = "123456";
pub const OTP_EXPIRY: Duration = Duration::from_secs(300);
pub const SESSION_EMAIL_KEY: &str = "rw_session_email";
pub const SESSION_STARTED_AT_KEY: &str = "rw_session_started_at";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("enter a valid email address")]
    InvalidEmail,
    #[error("unknown or already used challenge")]
    UnknownChallenge,
    #[error("challenge expired, request a new code")]
    ChallengeExpired,
    #[error("incorrect code")]
    InvalidCode,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct PendingChallenge {
    pub challenge: String,
    pub email: String,
    pub issued_at_epoch_ms: u128,
}

pub struct OtpAuthenticator {
    store: Arc<dyn KeyValueStore>,
    pending: Mutex<HashMap<String, PendingChallenge>>,
    expiry: Duration,
}

impl OtpAuthenticator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_expiry(store, OTP_EXPIRY)
    }

    pub fn with_expiry(store: Arc<dyn KeyValueStore>, expiry: Duration) -> Self {
        Self {
            store,
            pending: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    pub async fn request_otp(&self, email: &str) -> Result<OtpChallengeResponse, AuthError> {
        let email = normalize_email(email)?;
        let challenge = PendingChallenge {
            challenge: Uuid::new_v4().to_string(),
            email: email.clone(),
            issued_at_epoch_ms: epoch_ms(),
        };
        let response = OtpChallengeResponse {
            challenge: challenge.challenge.clone(),
            email,
            expires_in: self.expiry.as_secs(),
        };

        let mut pending = self.pending.lock().await;
        pending.retain(|_, issued| !self.is_expired(issued, challenge.issued_at_epoch_ms));
        pending.insert(challenge.challenge.clone(), challenge);
        Ok(response)
    }

    pub async fn verify_otp(&self, req: &OtpVerifyRequest) -> Result<OtpVerifyResponse, AuthError> {
        self.verify_at(req, epoch_ms()).await
    }

    async fn verify_at(
        &self,
        req: &OtpVerifyRequest,
        now_epoch_ms: u128,
    ) -> Result<OtpVerifyResponse, AuthError> {
        let email = normalize_email(&req.email)?;
        {
            let mut pending = self.pending.lock().await;
            let Some(issued) = pending.get(&req.challenge) else {
                return Err(AuthError::UnknownChallenge);
            };
            if issued.email != email {
                return Err(AuthError::UnknownChallenge);
            }
            if self.is_expired(issued, now_epoch_ms) {
                pending.remove(&req.challenge);
                return Err(AuthError::ChallengeExpired);
            }
            if req.code.trim() != DEMO_OTP_CODE {
                return Err(AuthError::InvalidCode);
            }
            pending.remove(&req.challenge);
        }

        self.store.set(SESSION_EMAIL_KEY, &email).await?;
        self.store
            .set(SESSION_STARTED_AT_KEY, &now_epoch_ms.to_string())
            .await?;
        info!(email = %email, "session started");

        Ok(OtpVerifyResponse {
            verified: true,
            email,
            verified_at_epoch_ms: now_epoch_ms,
        })
    }

    pub async fn session(&self) -> Result<SessionResponse, AuthError> {
        let email = self.store.get(SESSION_EMAIL_KEY).await?;
        let started_at_epoch_ms = self
            .store
            .get(SESSION_STARTED_AT_KEY)
            .await?
            .and_then(|raw| raw.parse::<u128>().ok());
        Ok(SessionResponse {
            active: email.is_some(),
            email,
            started_at_epoch_ms,
        })
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.store.remove(SESSION_EMAIL_KEY).await?;
        self.store.remove(SESSION_STARTED_AT_KEY).await?;
        Ok(())
    }

    fn is_expired(&self, issued: &PendingChallenge, now_epoch_ms: u128) -> bool {
        now_epoch_ms.saturating_sub(issued.issued_at_epoch_ms) > self.expiry.as_millis()
    }
}

fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_ascii_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail);
    };
    let domain_ok = domain
        .split('.')
        .filter(|label| !label.is_empty())
        .count()
        >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.');
    if local.is_empty()
        || !domain_ok
        || domain.contains('@')
        || email.contains(char::is_whitespace)
    {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email)
}

fn epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}
