//! Shared state every allocation operation reports into.
//!
//! The [`Context`] owns the options, the error channel read by the dispatch
//! layer, and the [`ObjectTable`] that counts references held inside
//! allocation buffers.

use std::sync::{Arc, Mutex, PoisonError};

use rustc_hash::FxHashMap;

use crate::element::ReferenceTracker;
use crate::error::{AllocationError, ErrorKind};
use crate::options::Options;

/// Last error reported through the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Reference counts for object handles stored in element data.
#[derive(Debug, Default)]
pub struct ObjectTable {
    counts: Mutex<FxHashMap<u32, u32>>,
}

impl ObjectTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current reference count of `handle` (0 if never referenced).
    #[must_use]
    pub fn ref_count(&self, handle: u32) -> u32 {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.get(&handle).copied().unwrap_or(0)
    }

    /// Number of handles with a non-zero count.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ReferenceTracker for ObjectTable {
    fn inc_ref(&self, handle: u32) {
        let mut counts =
            self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        *counts.entry(handle).or_insert(0) += 1;
    }

    fn dec_ref(&self, handle: u32) {
        let mut counts =
            self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        match counts.get_mut(&handle) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                let _ = counts.remove(&handle);
            }
            None => {
                log::warn!("dec_ref on unreferenced object {handle}");
            }
        }
    }
}

/// Error sink, object table and options shared by allocations.
#[derive(Debug, Default)]
pub struct Context {
    options: Options,
    objects: Arc<ObjectTable>,
    last_error: Mutex<Option<ReportedError>>,
}

impl Context {
    /// Context with the given options and an empty object table.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Active options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Object reference table shared with allocations.
    #[must_use]
    pub fn objects(&self) -> &Arc<ObjectTable> {
        &self.objects
    }

    /// Record an error for the dispatch layer and log it.
    pub fn set_error(&self, kind: ErrorKind, message: impl Into<String>) {
        let message = message.into();
        log::error!("{kind}: {message}");
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) =
            Some(ReportedError { kind, message });
    }

    /// Record `err` through [`Context::set_error`].
    pub fn report(&self, err: &AllocationError) {
        self.set_error(err.kind(), err.to_string());
    }

    /// Take the last reported error, clearing the channel.
    pub fn take_error(&self) -> Option<ReportedError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Kind of the last reported error without clearing it.
    #[must_use]
    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|e| e.kind)
    }

    /// Log the context state at debug level.
    pub fn dump_debug(&self) {
        log::debug!(
            "context: live objects={} last error={:?} options={:?}",
            self.objects.live_objects(),
            self.last_error_kind(),
            self.options
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_counts_track_inc_and_dec() {
        let table = ObjectTable::new();
        table.inc_ref(7);
        table.inc_ref(7);
        assert_eq!(table.ref_count(7), 2);
        table.dec_ref(7);
        assert_eq!(table.ref_count(7), 1);
        table.dec_ref(7);
        assert_eq!(table.ref_count(7), 0);
        assert_eq!(table.live_objects(), 0);
    }

    #[test]
    fn dec_on_unknown_handle_is_ignored() {
        let table = ObjectTable::new();
        table.dec_ref(3);
        assert_eq!(table.ref_count(3), 0);
    }

    #[test]
    fn error_channel_keeps_last_error() {
        let ctx = Context::default();
        assert!(ctx.take_error().is_none());
        ctx.set_error(ErrorKind::BadValue, "first");
        ctx.report(&AllocationError::NotImplemented("resize_2d"));
        assert_eq!(ctx.last_error_kind(), Some(ErrorKind::NotImplemented));
        let err = ctx.take_error().unwrap();
        assert!(err.message.contains("resize_2d"));
        assert!(ctx.take_error().is_none());
    }
}
