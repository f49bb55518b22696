//! Request-scoped diagnostic context.
//!
//! A typed key/value map that every log line emitted while handling a request
//! is decorated with (see [`crate::observability::logging::DiagnosticFormat`]).
//! The map lives in Tokio task-local storage and is only reachable inside
//! [`DiagnosticContext::scope`] (or [`DiagnosticContext::sync_scope`]); when the
//! scoped future completes, is dropped, or unwinds, the previous state is
//! restored. There is no `clear` to forget.
//!
//! Task-local values are not inherited by spawned tasks. Wrap the spawned
//! future in [`DiagnosticContext::scope`] with [`DiagnosticContext::inherit`]
//! when work has to carry the current fields along.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use tokio::task_local;

task_local! {
    static CONTEXT: DiagnosticContext;
}

/// Keys understood by the diagnostic context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKey {
    RequestId,
    Endpoint,
    ClientIp,
    UserId,
    Username,
    Email,
    Operation,
    UserCount,
}

impl DiagnosticKey {
    /// Name used when the key is rendered into a log line.
    pub const fn as_str(self) -> &'static str {
        match self {
            DiagnosticKey::RequestId => "requestId",
            DiagnosticKey::Endpoint => "endpoint",
            DiagnosticKey::ClientIp => "clientIp",
            DiagnosticKey::UserId => "userId",
            DiagnosticKey::Username => "username",
            DiagnosticKey::Email => "email",
            DiagnosticKey::Operation => "operation",
            DiagnosticKey::UserCount => "userCount",
        }
    }
}

impl fmt::Display for DiagnosticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value fields attached to the current request.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticContext {
    fields: RefCell<BTreeMap<DiagnosticKey, String>>,
}

impl DiagnosticContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the context currently in scope, or an empty one.
    pub fn inherit() -> Self {
        CONTEXT.try_with(Clone::clone).unwrap_or_default()
    }

    /// Builder-style insert.
    pub fn with(self, key: DiagnosticKey, value: impl Into<String>) -> Self {
        self.fields.borrow_mut().insert(key, value.into());
        self
    }

    /// Builder-style insert of several fields.
    pub fn extend<I>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (DiagnosticKey, String)>,
    {
        self.fields.borrow_mut().extend(fields);
        self
    }

    /// Run `fut` with this context installed.
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        CONTEXT.scope(self, fut).await
    }

    /// Run `f` with this context installed.
    pub fn sync_scope<F, R>(self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        CONTEXT.sync_scope(self, f)
    }

    /// Run `fut` with the current fields plus `fields`. The additions vanish
    /// when `fut` completes; the enclosing scope is left untouched.
    pub async fn nested<I, F>(fields: I, fut: F) -> F::Output
    where
        I: IntoIterator<Item = (DiagnosticKey, String)>,
        F: Future,
    {
        Self::inherit().extend(fields).scope(fut).await
    }

    /// Synchronous counterpart of [`DiagnosticContext::nested`].
    pub fn nested_sync<I, F, R>(fields: I, f: F) -> R
    where
        I: IntoIterator<Item = (DiagnosticKey, String)>,
        F: FnOnce() -> R,
    {
        Self::inherit().extend(fields).sync_scope(f)
    }

    /// Set `key` on the context in scope. Returns `false` outside any scope.
    pub fn insert(key: DiagnosticKey, value: impl Into<String>) -> bool {
        let value = value.into();
        CONTEXT
            .try_with(|ctx| {
                ctx.fields.borrow_mut().insert(key, value);
            })
            .is_ok()
    }

    /// Value of `key` in the context in scope.
    pub fn get(key: DiagnosticKey) -> Option<String> {
        CONTEXT
            .try_with(|ctx| ctx.fields.borrow().get(&key).cloned())
            .ok()
            .flatten()
    }

    /// All fields in scope, ordered by key. `None` outside any scope.
    pub fn snapshot() -> Option<Vec<(DiagnosticKey, String)>> {
        CONTEXT
            .try_with(|ctx| {
                ctx.fields
                    .borrow()
                    .iter()
                    .map(|(key, value)| (*key, value.clone()))
                    .collect()
            })
            .ok()
    }

    /// Whether a diagnostic scope is active on this task.
    pub fn is_active() -> bool {
        CONTEXT.try_with(|_| ()).is_ok()
    }
}
