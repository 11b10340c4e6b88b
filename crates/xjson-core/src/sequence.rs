//! Phase 5 helper: named monotonic counters with per-evaluation lifetime.

use std::collections::HashMap;

/// Maps a sequence name to its current value. Created empty at the start of
/// an evaluation and discarded at the end — there is no cross-document
/// persistence and no thread-safety requirement, since evaluation is
/// single-threaded.
#[derive(Debug, Default)]
pub struct SequenceRegistry {
    counters: HashMap<String, i64>,
}

impl SequenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `name` by `step` and return the new value. The first call for
    /// a given name initializes it to `step` rather than `0 + step`, so a
    /// fresh sequence's first value is `step` (matching the default-step
    /// case of `1, 2, 3, ...`).
    pub fn next(&mut self, name: &str, step: i64) -> i64 {
        let counter = self.counters.entry(name.to_string()).or_insert(0);
        *counter += step;
        *counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_step_counts_up_from_one() {
        let mut seq = SequenceRegistry::new();
        assert_eq!(seq.next("A", 1), 1);
        assert_eq!(seq.next("A", 1), 2);
        assert_eq!(seq.next("A", 1), 3);
        assert_eq!(seq.next("A", 1), 4);
    }

    #[test]
    fn independent_names_do_not_interfere() {
        let mut seq = SequenceRegistry::new();
        for _ in 0..4 {
            seq.next("A", 1);
        }
        assert_eq!(seq.next("B", 1), 1);
    }

    #[test]
    fn custom_step_is_honored() {
        let mut seq = SequenceRegistry::new();
        assert_eq!(seq.next("C", 5), 5);
        assert_eq!(seq.next("C", 5), 10);
    }
}
