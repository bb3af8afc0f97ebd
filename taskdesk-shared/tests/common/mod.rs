//! Shared fixtures for use-case tests
//!
//! Everything runs on the in-memory backend with a manual clock and a
//! minimal-cost password hasher.

#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use taskdesk_shared::auth::password::{Argon2Hasher, HashCost, PasswordError, PasswordHasher};
use taskdesk_shared::auth::session::{SessionService, TokenSettings};
use taskdesk_shared::clock::ManualClock;
use taskdesk_shared::db::memory::MemoryDatabase;
use taskdesk_shared::usecase::{AuthOutput, AuthService, SignupInput, TaskService};
use tokio_util::sync::CancellationToken;

pub const SECRET: &str = "integration-test-secret-32-bytes!!";
pub const PASSWORD: &str = "password123";

/// Argon2 hasher that records every digest it is asked to verify against
pub struct RecordingHasher {
    inner: Argon2Hasher,
    verified: Mutex<Vec<String>>,
}

impl RecordingHasher {
    pub fn new() -> Self {
        Self {
            inner: Argon2Hasher::new(HashCost::low()).unwrap(),
            verified: Mutex::new(Vec::new()),
        }
    }

    /// Digests passed to `verify`, in call order
    pub fn verified_hashes(&self) -> Vec<String> {
        self.verified.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.verified.lock().unwrap().clear();
    }
}

impl PasswordHasher for RecordingHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        self.inner.hash(password)
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        self.verified.lock().unwrap().push(hash.to_string());
        self.inner.verify(password, hash)
    }

    fn dummy_hash(&self) -> &str {
        self.inner.dummy_hash()
    }
}

pub struct TestApp {
    pub db: MemoryDatabase,
    pub clock: Arc<ManualClock>,
    pub hasher: Arc<RecordingHasher>,
    pub sessions: SessionService<MemoryDatabase>,
    pub auth: AuthService<MemoryDatabase>,
    pub tasks: TaskService<MemoryDatabase>,
    pub cancel: CancellationToken,
}

impl TestApp {
    pub fn new() -> Self {
        let db = MemoryDatabase::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
        ));
        let hasher = Arc::new(RecordingHasher::new());

        let sessions = SessionService::new(
            db.clone(),
            clock.clone(),
            TokenSettings::new(SECRET, "taskdesk", Duration::minutes(60)),
        );
        let auth = AuthService::new(db.clone(), sessions.clone(), hasher.clone(), clock.clone());
        let tasks = TaskService::new(db.clone(), clock.clone());

        Self {
            db,
            clock,
            hasher,
            sessions,
            auth,
            tasks,
            cancel: CancellationToken::new(),
        }
    }

    /// Signs up a user named after the local part of `email`
    pub async fn signup(&self, email: &str) -> AuthOutput {
        let name = email.split('@').next().unwrap_or("user").to_string();
        self.auth
            .signup(
                &self.cancel,
                SignupInput {
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                    name,
                },
            )
            .await
            .expect("signup should succeed")
    }

    /// Moves the clock so consecutive writes get distinct timestamps
    pub fn tick(&self) {
        self.clock.advance(Duration::seconds(1));
    }
}
