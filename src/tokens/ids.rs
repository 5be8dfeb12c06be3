use super::Error;
use std::sync::{Mutex, PoisonError};
use ulid::{Generator, Ulid};

/// Source of token and key identifiers.
///
/// Identifiers must sort by creation time and never repeat, even when two are
/// requested within the same millisecond.
pub trait IdGenerator: Send + Sync {
    /// # Errors
    /// Returns `Error::IdOverflow` if the sequence for the current millisecond is exhausted.
    fn next_id(&self) -> Result<Ulid, Error>;
}

/// Monotonic ULIDs behind a single mutex.
pub struct MonotonicIds {
    generator: Mutex<Generator>,
}

impl MonotonicIds {
    #[must_use]
    pub fn new() -> Self {
        Self {
            generator: Mutex::new(Generator::new()),
        }
    }
}

impl Default for MonotonicIds {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MonotonicIds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonotonicIds").finish_non_exhaustive()
    }
}

impl IdGenerator for MonotonicIds {
    fn next_id(&self) -> Result<Ulid, Error> {
        self.generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()
            .map_err(|_| Error::IdOverflow)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// Deterministic generator for tests: a fixed timestamp and a counter.
    #[derive(Debug)]
    pub(crate) struct SequentialIds {
        millis: u64,
        counter: AtomicU64,
    }

    impl SequentialIds {
        pub(crate) fn starting_at(millis: u64) -> Self {
            Self {
                millis,
                counter: AtomicU64::new(1),
            }
        }
    }

    impl IdGenerator for SequentialIds {
        fn next_id(&self) -> Result<Ulid, Error> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(Ulid::from_parts(self.millis, u128::from(n)))
        }
    }

    #[test]
    fn ids_are_strictly_increasing() -> Result<(), Error> {
        let ids = MonotonicIds::new();
        let mut previous = ids.next_id()?;
        for _ in 0..1000 {
            let next = ids.next_id()?;
            assert!(next > previous);
            previous = next;
        }
        Ok(())
    }

    #[test]
    fn concurrent_callers_never_collide() {
        let ids = Arc::new(MonotonicIds::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || {
                    (0..500)
                        .filter_map(|_| ids.next_id().ok())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap_or_default() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn sequential_ids_sort_in_issue_order() -> Result<(), Error> {
        let ids = SequentialIds::starting_at(1_700_000_000_000);
        let a = ids.next_id()?;
        let b = ids.next_id()?;
        assert!(a < b);
        assert_eq!(a.timestamp_ms(), b.timestamp_ms());
        Ok(())
    }
}
