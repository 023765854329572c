// Memoized selection lookups with explicit invalidation.

/// Cache for the selectable-school list shown to the team on the clock.
///
/// Recomputing availability scans the whole eligibility table and the
/// current team's board column, so the result is memoized between reads.
/// Every write path (pick, swap, reset) must call [`invalidate`] — the cache
/// is injected into the components that need it rather than living as
/// ambient module state.
///
/// [`invalidate`]: SelectionCache::invalidate
#[derive(Debug, Default)]
pub struct SelectionCache {
    available: Option<Vec<String>>,
}

impl SelectionCache {
    pub fn new() -> Self {
        SelectionCache::default()
    }

    /// Return the cached list, computing it with `compute` on a miss.
    pub fn available_or<F>(&mut self, compute: F) -> &[String]
    where
        F: FnOnce() -> Vec<String>,
    {
        if self.available.is_none() {
            self.available = Some(compute());
        }
        self.available.as_deref().unwrap_or_default()
    }

    /// Drop the memoized list; the next read recomputes.
    pub fn invalidate(&mut self) {
        self.available = None;
    }

    /// Whether a memoized value is currently held.
    pub fn is_warm(&self) -> bool {
        self.available.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_once_until_invalidated() {
        let mut cache = SelectionCache::new();
        let mut calls = 0;

        let first = cache
            .available_or(|| {
                calls += 1;
                vec!["Michigan".to_string()]
            })
            .to_vec();
        assert_eq!(first, vec!["Michigan"]);
        assert_eq!(calls, 1);
        assert!(cache.is_warm());

        // Second read must not recompute.
        let second = cache
            .available_or(|| {
                calls += 1;
                vec!["Ohio State".to_string()]
            })
            .to_vec();
        assert_eq!(second, vec!["Michigan"]);
        assert_eq!(calls, 1);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let mut cache = SelectionCache::new();
        cache.available_or(|| vec!["Michigan".to_string()]);

        cache.invalidate();
        assert!(!cache.is_warm());

        let refreshed = cache.available_or(|| vec!["Georgia".to_string()]).to_vec();
        assert_eq!(refreshed, vec!["Georgia"]);
    }
}
