//! Simulated unreliable network and a user lookup that degrades to a
//! fallback record.
//!
//! All randomness comes from a seeded ChaCha8 RNG, so a run is reproducible
//! given the same seed.

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{NetworkError, PolicyViolation};
use crate::retry::{RetryExecutor, Sleeper};

/// Success rate used by [`fetch_user_data`] callers in the CLI; low enough
/// to exercise retries.
pub const DEFAULT_FETCH_SUCCESS_RATE: f64 = 0.4;

/// Payload returned by a successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkResponse {
    pub status: String,
    pub data: String,
    pub timestamp: DateTime<Utc>,
}

/// A remote call that may fail transiently.
pub trait Transport {
    fn fetch(&self) -> Result<NetworkResponse, NetworkError>;
}

/// Fails with [`NetworkError::Simulated`] whenever a uniform draw exceeds
/// `success_rate`.
#[derive(Debug)]
pub struct SimulatedNetwork {
    success_rate: f64,
    // `fetch` takes `&self` so it can be called from the retry closure.
    rng: RefCell<ChaCha8Rng>,
}

impl SimulatedNetwork {
    /// Rejects success rates outside `[0.0, 1.0]`.
    pub fn new(success_rate: f64, seed: u64) -> Result<Self, PolicyViolation> {
        if !(0.0..=1.0).contains(&success_rate) {
            return Err(PolicyViolation::InvalidRate {
                name: "success_rate",
                value: success_rate,
            });
        }
        Ok(Self {
            success_rate,
            rng: RefCell::new(ChaCha8Rng::seed_from_u64(seed)),
        })
    }

    /// Probability that a single fetch succeeds.
    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

impl Transport for SimulatedNetwork {
    fn fetch(&self) -> Result<NetworkResponse, NetworkError> {
        let draw: f64 = self.rng.borrow_mut().r#gen();
        if draw > self.success_rate {
            return Err(NetworkError::Simulated);
        }
        Ok(NetworkResponse {
            status: "success".into(),
            data: "Important data".into(),
            timestamp: Utc::now(),
        })
    }
}

/// Whether a [`UserRecord`] came from the network or the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Fallback,
}

/// User profile returned by [`fetch_user_data`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub status: UserStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Record served when the network is unavailable.
    pub fn fallback(user_id: u64) -> Self {
        Self {
            id: user_id,
            name: "Guest User".into(),
            email: "guest@example.com".into(),
            status: UserStatus::Fallback,
            last_seen: None,
        }
    }

    fn from_response(user_id: u64, response: &NetworkResponse) -> Self {
        Self {
            id: user_id,
            name: format!("User {user_id}"),
            email: format!("user{user_id}@example.com"),
            status: UserStatus::Active,
            last_seen: Some(response.timestamp),
        }
    }
}

/// Fetches a user through `transport`, retrying per `executor`. Never fails:
/// once retries are exhausted the fallback record is returned.
pub fn fetch_user_data<T, S>(
    user_id: u64,
    transport: &T,
    executor: &RetryExecutor<S>,
) -> UserRecord
where
    T: Transport + ?Sized,
    S: Sleeper,
{
    info!(user_id, "Fetching user data for user {user_id}");
    match executor.execute(|| transport.fetch()) {
        Ok(response) => {
            info!(user_id, "Successfully fetched user data for user {user_id}");
            UserRecord::from_response(user_id, &response)
        }
        Err(err) => {
            error!(
                user_id,
                error = %err,
                "Failed to fetch user data for user {user_id} after retries: {err}"
            );
            info!(user_id, "Returning fallback data for user {user_id}");
            UserRecord::fallback(user_id)
        }
    }
}
