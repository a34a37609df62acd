#![forbid(unsafe_code)]

//! Unit-of-work identity and the host adapter that reports it.
//!
//! The strategies never ask the OS or an async runtime who is running. They
//! call an injected [`IdentityProvider`], which the host adapter supplies. This
//! module ships one adapter for plain OS threads: a thread-local slot that a
//! [`UnitScope`] guard fills for the duration of a tracked unit.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Opaque identity of a concurrently executing unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u64);

impl UnitId {
    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

impl From<u64> for UnitId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// "Which unit of work is executing right now?"
///
/// Must be callable from any thread. Returns `None` when no tracked unit is
/// active (for example before the program under test spawned anything).
pub type IdentityProvider = Arc<dyn Fn() -> Option<UnitId> + Send + Sync>;

thread_local! {
    static CURRENT_UNIT: Cell<Option<UnitId>> = const { Cell::new(None) };
}

/// Provider backed by the thread-local slot managed by [`UnitScope`].
#[must_use]
pub fn thread_identity() -> IdentityProvider {
    Arc::new(current_thread_unit)
}

/// Provider that never reports a unit.
#[must_use]
pub fn no_identity() -> IdentityProvider {
    Arc::new(|| None)
}

/// Unit currently registered on this thread, if any.
#[must_use]
pub fn current_thread_unit() -> Option<UnitId> {
    CURRENT_UNIT.with(Cell::get)
}

/// RAII registration of the current thread as a tracked unit.
///
/// Scopes nest: dropping a guard restores whatever was registered before it.
/// The guard is tied to the thread that created it:
///
/// ```compile_fail
/// let scope = dfuzz_core::UnitScope::enter(1u64);
/// std::thread::spawn(move || drop(scope));
/// ```
#[derive(Debug)]
#[must_use = "the unit is only tracked while the scope guard is alive"]
pub struct UnitScope {
    previous: Option<UnitId>,
    /// Marker to prevent Send/Sync (thread-local slot).
    _marker: PhantomData<*const ()>,
}

impl UnitScope {
    /// Register `id` as the current unit on this thread.
    pub fn enter(id: impl Into<UnitId>) -> Self {
        let previous = CURRENT_UNIT.with(|slot| slot.replace(Some(id.into())));
        Self {
            previous,
            _marker: PhantomData,
        }
    }
}

impl Drop for UnitScope {
    fn drop(&mut self) {
        CURRENT_UNIT.with(|slot| slot.set(self.previous));
    }
}
