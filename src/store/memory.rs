//! Concurrent in-memory implementation of the user store.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, error, field, info, warn, Instrument, Span};

use crate::config::StoreConfig;
use crate::observability::metrics;
use crate::observability::tracing::record_exception;
use crate::observability::{DiagnosticContext, DiagnosticKey};
use crate::operation_span;
use crate::store::record::{NewUser, UserRecord};
use crate::store::{StoreError, StoreResult};
use crate::timestamp;

const SAMPLE_USERS: [(&str, &str, &str); 3] = [
    ("john_doe", "john@example.com", "John Doe"),
    ("jane_smith", "jane@example.com", "Jane Smith"),
    ("bob_wilson", "bob@example.com", "Bob Wilson"),
];

/// Thread-safe user store.
///
/// Share it behind an `Arc`; every operation takes `&self`.
pub struct UserStore {
    users: DashMap<u64, UserRecord>,
    next_id: AtomicU64,
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl UserStore {
    /// Create an empty store. Seeding is left to the caller.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicU64::new(1),
            min_delay_ms: config.min_processing_delay_ms.min(config.max_processing_delay_ms),
            max_delay_ms: config.max_processing_delay_ms,
        }
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Insert the three sample users the service ships with.
    pub fn seed_sample_users(&self) -> StoreResult<usize> {
        info!("Seeding sample users");

        let now = timestamp::now();
        for (username, email, full_name) in SAMPLE_USERS {
            let id = self.allocate_id()?;
            let record = NewUser::new(username, email, full_name).into_record(id, now);
            debug!(user_id = id, username = %record.username, "Seeded user");
            self.users.insert(id, record);
        }

        metrics::set_user_count(self.users.len());
        info!(user_count = self.users.len(), "Sample users seeded");
        Ok(SAMPLE_USERS.len())
    }

    /// Snapshot of every user, ordered by id.
    pub fn list_all(&self) -> StoreResult<Vec<UserRecord>> {
        let span = operation_span!(
            "UserStore.list_all",
            operation.kind = "read",
            user.count = field::Empty
        );
        let _entered = span.enter();

        DiagnosticContext::nested_sync(
            [(DiagnosticKey::Operation, "getAllUsers".to_string())],
            || {
                info!("Listing users");

                let mut users: Vec<UserRecord> =
                    self.users.iter().map(|entry| entry.value().clone()).collect();
                users.sort_unstable_by_key(|user| user.id);

                span.record("user.count", users.len() as u64);
                DiagnosticContext::insert(DiagnosticKey::UserCount, users.len().to_string());
                info!(user_count = users.len(), "Users listed");
                debug!(
                    user_ids = ?users.iter().map(|user| user.id).collect::<Vec<_>>(),
                    "Listed user ids"
                );

                Ok(users)
            },
        )
    }

    /// Point lookup. A missing id is `Ok(None)`.
    pub fn get_by_id(&self, id: u64) -> StoreResult<Option<UserRecord>> {
        let span = operation_span!(
            "UserStore.get_by_id",
            user.id = id,
            operation.kind = "read",
            user.found = field::Empty
        );
        let _entered = span.enter();

        DiagnosticContext::nested_sync(
            [
                (DiagnosticKey::Operation, "getUserById".to_string()),
                (DiagnosticKey::UserId, id.to_string()),
            ],
            || {
                info!(user_id = id, "Looking up user");

                let user = self.users.get(&id).map(|entry| entry.value().clone());
                match &user {
                    Some(user) => {
                        info!(user_id = id, username = %user.username, "User found");
                        span.record("user.found", true);
                    }
                    None => {
                        warn!(user_id = id, "User not found");
                        span.record("user.found", false);
                    }
                }

                Ok(user)
            },
        )
    }

    /// Create a user after the simulated processing delay.
    ///
    /// The delay holds no lock; only the final insert touches the map.
    pub async fn create(&self, new_user: NewUser) -> StoreResult<UserRecord> {
        let span = operation_span!(
            "UserStore.create",
            user.username = %new_user.username,
            user.email = %new_user.email,
            operation.kind = "create",
            user.id = field::Empty,
            processing.time.ms = field::Empty
        );
        let fields = [
            (DiagnosticKey::Operation, "createUser".to_string()),
            (DiagnosticKey::Username, new_user.username.clone()),
            (DiagnosticKey::Email, new_user.email.clone()),
        ];

        DiagnosticContext::nested(fields, self.insert_new(new_user))
            .instrument(span)
            .await
    }

    async fn insert_new(&self, new_user: NewUser) -> StoreResult<UserRecord> {
        info!(username = %new_user.username, email = %new_user.email, "Creating user");

        self.simulate_processing().await;

        let id = match self.allocate_id() {
            Ok(id) => id,
            Err(err) => {
                error!(error = %err, username = %new_user.username, "Cannot allocate user id");
                record_exception(&Span::current(), err.kind(), &err);
                return Err(err);
            }
        };

        let record = new_user.into_record(id, timestamp::now());
        self.users.insert(id, record.clone());

        Span::current().record("user.id", id);
        metrics::record_user_created();
        metrics::set_user_count(self.users.len());
        info!(user_id = id, username = %record.username, "User created");

        Ok(record)
    }

    /// Remove a user. `Ok(true)` exactly once per stored id.
    pub fn delete(&self, id: u64) -> StoreResult<bool> {
        let span = operation_span!(
            "UserStore.delete",
            user.id = id,
            operation.kind = "delete",
            user.deleted = field::Empty
        );
        let _entered = span.enter();

        DiagnosticContext::nested_sync(
            [
                (DiagnosticKey::Operation, "deleteUser".to_string()),
                (DiagnosticKey::UserId, id.to_string()),
            ],
            || {
                info!(user_id = id, "Deleting user");

                match self.users.remove(&id) {
                    Some((_, user)) => {
                        span.record("user.deleted", true);
                        metrics::record_user_deleted();
                        metrics::set_user_count(self.users.len());
                        info!(user_id = id, username = %user.username, "User deleted");
                        Ok(true)
                    }
                    None => {
                        span.record("user.deleted", false);
                        warn!(user_id = id, "User to delete not found");
                        Ok(false)
                    }
                }
            },
        )
    }

    /// Always fails with [`StoreError::Simulated`].
    pub fn simulate_failure(&self) -> StoreResult<Infallible> {
        let span = operation_span!("UserStore.simulate_failure", operation.kind = "error");
        let _entered = span.enter();

        DiagnosticContext::nested_sync(
            [(DiagnosticKey::Operation, "simulateError".to_string())],
            || {
                error!("Starting error simulation");

                let err = StoreError::Simulated;
                error!(error = %err, "Simulated failure raised");
                record_exception(&span, err.kind(), &err);

                Err(err)
            },
        )
    }

    async fn simulate_processing(&self) {
        let delay_ms = if self.max_delay_ms == 0 {
            0
        } else {
            fastrand::u64(self.min_delay_ms..=self.max_delay_ms)
        };

        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        Span::current().record("processing.time.ms", delay_ms);
        debug!(processing_time_ms = delay_ms, "Business logic processed");
    }

    fn allocate_id(&self) -> StoreResult<u64> {
        self.next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .map_err(|_| StoreError::IdSpaceExhausted)
    }

    #[cfg(test)]
    pub(crate) fn set_next_id(&self, id: u64) {
        self.next_id.store(id, Ordering::SeqCst);
    }
}
