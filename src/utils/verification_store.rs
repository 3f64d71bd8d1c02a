use argon2::password_hash::rand_core::{OsRng, RngCore};
use async_trait::async_trait;
use moka::future::Cache;
use std::time::{Duration, Instant};

/// Wrong guesses tolerated before a pending code is thrown away.
const MAX_ATTEMPTS: u8 = 5;

/// How long a verified phone stays usable for registration.
const VERIFIED_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Extra lifetime on cache entries so expiry is always decided at read time.
const SWEEP_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    /// No code was issued, or it expired or was used up.
    Expired,
    Mismatch,
}

/// Short-lived phone verification state. The in-process implementation is
/// fine for a single instance; multi-instance deployments need one backed by
/// a shared key/value store.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Stores `code` for `phone`, replacing any earlier one.
    async fn issue(&self, phone: &str, code: &str);

    /// Checks `code`; a match consumes it and marks the phone verified.
    async fn verify(&self, phone: &str, code: &str) -> VerifyOutcome;

    /// Whether the phone holds an unexpired verified mark. Does not consume it.
    async fn is_verified(&self, phone: &str) -> bool;

    /// Consumes the verified mark, returning whether it was present.
    async fn take_verified(&self, phone: &str) -> bool;
}

#[derive(Clone)]
struct PendingCode {
    code: String,
    expires_at: Instant,
    attempts: u8,
}

pub struct MokaVerificationStore {
    ttl: Duration,
    pending: Cache<String, PendingCode>,
    verified: Cache<String, Instant>,
}

impl MokaVerificationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(ttl + SWEEP_MARGIN)
                .build(),
            verified: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(VERIFIED_WINDOW + SWEEP_MARGIN)
                .build(),
        }
    }
}

#[async_trait]
impl VerificationStore for MokaVerificationStore {
    async fn issue(&self, phone: &str, code: &str) {
        self.pending
            .insert(
                phone.to_string(),
                PendingCode {
                    code: code.to_string(),
                    expires_at: Instant::now() + self.ttl,
                    attempts: 0,
                },
            )
            .await;
    }

    async fn verify(&self, phone: &str, code: &str) -> VerifyOutcome {
        let Some(mut pending) = self.pending.get(phone).await else {
            return VerifyOutcome::Expired;
        };

        if Instant::now() >= pending.expires_at || pending.attempts >= MAX_ATTEMPTS {
            self.pending.invalidate(phone).await;
            return VerifyOutcome::Expired;
        }

        if pending.code != code.trim() {
            pending.attempts += 1;
            self.pending.insert(phone.to_string(), pending).await;
            return VerifyOutcome::Mismatch;
        }

        self.pending.invalidate(phone).await;
        self.verified
            .insert(phone.to_string(), Instant::now() + VERIFIED_WINDOW)
            .await;
        VerifyOutcome::Verified
    }

    async fn is_verified(&self, phone: &str) -> bool {
        self.verified
            .get(phone)
            .await
            .is_some_and(|until| Instant::now() < until)
    }

    async fn take_verified(&self, phone: &str) -> bool {
        match self.verified.remove(phone).await {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }
}

/// Six digit numeric code.
pub fn generate_code() -> String {
    (100_000 + OsRng.next_u32() % 900_000).to_string()
}
