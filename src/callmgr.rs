//! Call manager: scoped cancellation and outstanding-call accounting
//! for every network/VCS operation the solver issues.
//!
//! A `CallManager` hands out `CallContext`s whose cancellation composes
//! (AND) with the manager's own lifetime token, so cancelling the top-level
//! solve cancels every outstanding call without each call site needing to
//! thread a cancellation flag through by hand.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    HttpMetadata,
    ListVersions,
    GetManifestAndLock,
    RevisionPresentIn,
    ExportTo,
}

impl std::fmt::Display for CallType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CallType::HttpMetadata => "http-metadata",
            CallType::ListVersions => "list-versions",
            CallType::GetManifestAndLock => "get-manifest-and-lock",
            CallType::RevisionPresentIn => "revision-present-in",
            CallType::ExportTo => "export-to",
        };
        write!(f, "{s}")
    }
}

/// A cancellation scope plus a drop guard that decrements the call
/// manager's outstanding-call counter for `(name, call_type)` when the call
/// finishes, however it finishes.
pub struct CallContext<'a> {
    manager: &'a CallManager,
    name: String,
    call_type: CallType,
    token: CancellationToken,
}

impl CallContext<'_> {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CallContext<'_> {
    fn drop(&mut self) {
        self.manager.decrement(&self.name, self.call_type);
    }
}

/// Tracks outstanding calls by `(source name, call type)` and composes a
/// lifetime-scoped cancellation token with each call's own.
pub struct CallManager {
    lifetime: CancellationToken,
    outstanding: Mutex<HashMap<(String, CallType), u64>>,
}

impl CallManager {
    pub fn new() -> Self {
        CallManager { lifetime: CancellationToken::new(), outstanding: Mutex::new(HashMap::new()) }
    }

    /// Cancels every call this manager has ever started a context for,
    /// including ones started after this call (cancellation latches).
    pub fn cancel_all(&self) {
        self.lifetime.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    /// Opens a new call context, composing the manager's lifetime
    /// cancellation with a fresh per-call token so an individual call can
    /// also be cancelled independently via the returned token's `cancel()`.
    pub fn begin_call(&self, name: impl Into<String>, call_type: CallType) -> CallContext<'_> {
        let name = name.into();
        self.increment(&name, call_type);
        CallContext { manager: self, name, call_type, token: self.lifetime.child_token() }
    }

    pub fn outstanding_count(&self, name: &str, call_type: CallType) -> u64 {
        self.outstanding.lock().unwrap().get(&(name.to_string(), call_type)).copied().unwrap_or(0)
    }

    fn increment(&self, name: &str, call_type: CallType) {
        *self.outstanding.lock().unwrap().entry((name.to_string(), call_type)).or_insert(0) += 1;
    }

    fn decrement(&self, name: &str, call_type: CallType) {
        let mut map = self.outstanding.lock().unwrap();
        if let Some(count) = map.get_mut(&(name.to_string(), call_type)) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                map.remove(&(name.to_string(), call_type));
            }
        }
    }
}

impl Default for CallManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_outstanding_calls_per_name_and_type() {
        let mgr = CallManager::new();
        assert_eq!(mgr.outstanding_count("a", CallType::ListVersions), 0);
        {
            let _ctx1 = mgr.begin_call("a", CallType::ListVersions);
            let _ctx2 = mgr.begin_call("a", CallType::ListVersions);
            assert_eq!(mgr.outstanding_count("a", CallType::ListVersions), 2);
        }
        assert_eq!(mgr.outstanding_count("a", CallType::ListVersions), 0);
    }

    #[test]
    fn cancel_all_propagates_to_existing_and_future_contexts() {
        let mgr = CallManager::new();
        let ctx1 = mgr.begin_call("a", CallType::HttpMetadata);
        assert!(!ctx1.is_cancelled());
        mgr.cancel_all();
        assert!(ctx1.is_cancelled());
        let ctx2 = mgr.begin_call("a", CallType::HttpMetadata);
        assert!(ctx2.is_cancelled());
    }

    #[test]
    fn separate_names_and_types_are_counted_independently() {
        let mgr = CallManager::new();
        let _a = mgr.begin_call("a", CallType::ListVersions);
        let _b = mgr.begin_call("b", CallType::ListVersions);
        let _c = mgr.begin_call("a", CallType::ExportTo);
        assert_eq!(mgr.outstanding_count("a", CallType::ListVersions), 1);
        assert_eq!(mgr.outstanding_count("b", CallType::ListVersions), 1);
        assert_eq!(mgr.outstanding_count("a", CallType::ExportTo), 1);
    }
}
