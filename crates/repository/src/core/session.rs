//! Storage sessions keyed by persistence unit name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::RepositoryResult;

/// Opens storage sessions for a host runtime.
pub trait SessionProvider: Send + Sync {
    /// The per-unit session type.
    type Session: Send + Sync;

    /// Opens the session for `unit`.
    fn open(&self, unit: &str) -> RepositoryResult<Self::Session>;

    /// Releases a session removed from the registry.
    fn close(&self, _unit: &str, _session: &Self::Session) -> RepositoryResult<()> {
        Ok(())
    }
}

/// A process-wide cache of sessions, one per unit name.
///
/// Creation is serialised under a single lock so concurrent first callers for
/// the same unit share one session. Sessions live until [`close`](Self::close)
/// or [`shutdown`](Self::shutdown).
pub struct SessionRegistry<P: SessionProvider> {
    provider: P,
    sessions: Mutex<HashMap<String, Arc<P::Session>>>,
}

impl<P: SessionProvider> std::fmt::Debug for SessionRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("units", &self.units())
            .finish()
    }
}

impl<P: SessionProvider> SessionRegistry<P> {
    /// Creates an empty registry.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The session provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the session for `unit`, opening it on first use.
    pub fn get_or_open(&self, unit: &str) -> RepositoryResult<Arc<P::Session>> {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get(unit) {
            return Ok(Arc::clone(session));
        }

        let session = Arc::new(self.provider.open(unit)?);
        sessions.insert(unit.to_string(), Arc::clone(&session));
        info!(unit, "Opened storage session");
        Ok(session)
    }

    /// Returns the session for `unit` if it is open.
    pub fn get(&self, unit: &str) -> Option<Arc<P::Session>> {
        self.sessions.lock().get(unit).cloned()
    }

    /// The names of the open units.
    pub fn units(&self) -> Vec<String> {
        let mut units: Vec<String> = self.sessions.lock().keys().cloned().collect();
        units.sort();
        units
    }

    /// Closes the session for `unit`. Returns false if it was not open.
    pub fn close(&self, unit: &str) -> RepositoryResult<bool> {
        let removed = self.sessions.lock().remove(unit);
        match removed {
            Some(session) => {
                self.provider.close(unit, &session)?;
                info!(unit, "Closed storage session");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Closes every session, returning the first error after trying all.
    pub fn shutdown(&self) -> RepositoryResult<()> {
        let drained: Vec<_> = self.sessions.lock().drain().collect();
        let mut first_error = None;

        for (unit, session) in drained {
            if let Err(e) = self.provider.close(&unit, &session) {
                warn!(unit = %unit, error = %e, "Failed to close storage session");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingProvider {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    impl SessionProvider for CountingProvider {
        type Session = String;

        fn open(&self, unit: &str) -> RepositoryResult<String> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(format!("session:{}", unit))
        }

        fn close(&self, _unit: &str, _session: &String) -> RepositoryResult<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_same_unit_reuses_session() {
        let registry = SessionRegistry::new(CountingProvider::default());
        let a = registry.get_or_open("unit-a").unwrap();
        let again = registry.get_or_open("unit-a").unwrap();
        let b = registry.get_or_open("unit-b").unwrap();

        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(*b, "session:unit-b");
        assert_eq!(registry.provider().opened.load(Ordering::SeqCst), 2);
        assert_eq!(registry.units(), vec!["unit-a", "unit-b"]);
    }

    #[test]
    fn test_concurrent_first_callers_open_once() {
        let registry = SessionRegistry::new(CountingProvider::default());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| registry.get_or_open("shared").unwrap());
            }
        });

        assert_eq!(registry.provider().opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_and_shutdown() {
        let registry = SessionRegistry::new(CountingProvider::default());
        registry.get_or_open("a").unwrap();
        registry.get_or_open("b").unwrap();
        registry.get_or_open("c").unwrap();

        assert!(registry.close("a").unwrap());
        assert!(!registry.close("a").unwrap());
        assert!(registry.get("a").is_none());

        registry.shutdown().unwrap();
        assert!(registry.units().is_empty());
        assert_eq!(registry.provider().closed.load(Ordering::SeqCst), 3);
    }
}
