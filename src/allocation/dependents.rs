//! Consumers invalidated when an allocation changes.
//!
//! The registry never keeps a dependent alive. Entries whose target has been
//! dropped are pruned the next time the registry fans out.

use std::fmt;
use std::sync::Weak;

use crate::error::AllocationError;

/// Something derived from an allocation's contents that must be rebuilt
/// after the allocation changes.
pub trait Dependent: Send + Sync {
    /// Mark derived state stale.
    fn force_dirty(&self);
}

/// Ordered list of non-owning dependent handles.
#[derive(Default)]
pub struct DependentRegistry {
    entries: Vec<Weak<dyn Dependent>>,
}

impl DependentRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `dependent`. Returns `false` if it was already present.
    pub fn add(&mut self, dependent: Weak<dyn Dependent>) -> bool {
        if self.position(&dependent).is_some() {
            return false;
        }
        self.entries.push(dependent);
        true
    }

    /// Unregister `dependent`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::DependentNotRegistered`] if it was never
    /// added or has already been removed.
    pub fn remove(
        &mut self,
        dependent: &Weak<dyn Dependent>,
    ) -> Result<(), AllocationError> {
        let index = self
            .position(dependent)
            .ok_or(AllocationError::DependentNotRegistered)?;
        let _ = self.entries.remove(index);
        Ok(())
    }

    /// Call [`Dependent::force_dirty`] on every live entry, dropping dead
    /// ones.
    pub fn notify(&mut self) {
        self.entries.retain(|weak| match weak.upgrade() {
            Some(dependent) => {
                dependent.force_dirty();
                true
            }
            None => false,
        });
    }

    /// Number of registered entries, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, dependent: &Weak<dyn Dependent>) -> Option<usize> {
        self.entries.iter().position(|e| Weak::ptr_eq(e, dependent))
    }
}

impl fmt::Debug for DependentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependentRegistry")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Dependent for Counter {
        fn force_dirty(&self) {
            let _ = self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn weak(dep: &Arc<Counter>) -> Weak<dyn Dependent> {
        let dep: Arc<dyn Dependent> = dep.clone();
        Arc::downgrade(&dep)
    }

    #[test]
    fn duplicate_add_is_skipped() {
        let dep = Arc::new(Counter::default());
        let mut registry = DependentRegistry::new();
        assert!(registry.add(weak(&dep)));
        assert!(!registry.add(weak(&dep)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removing_twice_fails() {
        let dep = Arc::new(Counter::default());
        let mut registry = DependentRegistry::new();
        let _ = registry.add(weak(&dep));
        assert!(registry.remove(&weak(&dep)).is_ok());
        assert!(matches!(
            registry.remove(&weak(&dep)),
            Err(AllocationError::DependentNotRegistered)
        ));
    }

    #[test]
    fn notify_reaches_live_and_prunes_dead() {
        let live = Arc::new(Counter::default());
        let dead = Arc::new(Counter::default());
        let mut registry = DependentRegistry::new();
        let _ = registry.add(weak(&live));
        let _ = registry.add(weak(&dead));
        drop(dead);

        registry.notify();
        assert_eq!(live.0.load(Ordering::Relaxed), 1);
        assert_eq!(registry.len(), 1);
    }
}
