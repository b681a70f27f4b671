// 💾 Form progress - debounced saves and completion deltas
//
// Field edits arrive in bursts; persisting each keystroke would create an
// entry-info write per character. The saver keeps only the latest value and
// releases it once edits have been quiet for `delay`.

use crate::completion::{Category, CompletionMetrics};
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_SAVE_DELAY_MS: i64 = 500;

#[derive(Debug)]
pub struct DebouncedSaver<T> {
    delay: Duration,
    pending: Option<T>,
    last_edit: Option<DateTime<Utc>>,
}

impl<T> DebouncedSaver<T> {
    pub fn new(delay: Duration) -> Self {
        DebouncedSaver {
            delay,
            pending: None,
            last_edit: None,
        }
    }

    /// Replace the pending value and restart the quiet period
    pub fn edit(&mut self, value: T, now: DateTime<Utc>) {
        self.pending = Some(value);
        self.last_edit = Some(now);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value becomes due, if any
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.pending
            .as_ref()
            .and(self.last_edit)
            .map(|t| t + self.delay)
    }

    /// Take the pending value if the quiet period has elapsed
    pub fn due(&mut self, now: DateTime<Utc>) -> Option<T> {
        match self.due_at() {
            Some(at) if now >= at => self.flush(),
            _ => None,
        }
    }

    /// Take the pending value regardless of timing (e.g., screen closed)
    pub fn flush(&mut self) -> Option<T> {
        self.last_edit = None;
        self.pending.take()
    }
}

impl<T> Default for DebouncedSaver<T> {
    fn default() -> Self {
        Self::new(Duration::milliseconds(DEFAULT_SAVE_DELAY_MS))
    }
}

/// What changed between two completion computations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressDelta {
    pub before: u8,
    pub after: u8,
    pub newly_completed: Vec<Category>,
    pub regressed: Vec<Category>,
}

impl ProgressDelta {
    pub fn changed(&self) -> bool {
        self.before != self.after || !self.newly_completed.is_empty() || !self.regressed.is_empty()
    }
}

pub struct FormProgress;

impl FormProgress {
    pub fn delta(before: &CompletionMetrics, after: &CompletionMetrics) -> ProgressDelta {
        let mut newly_completed = Vec::new();
        let mut regressed = Vec::new();

        for category in Category::ALL {
            let was = before.category(category).map_or(false, |c| c.is_complete());
            let now = after.category(category).map_or(false, |c| c.is_complete());
            match (was, now) {
                (false, true) => newly_completed.push(category),
                (true, false) => regressed.push(category),
                _ => {}
            }
        }

        ProgressDelta {
            before: before.percent,
            after: after.percent,
            newly_completed,
            regressed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::compute_completion;
    use crate::completion::tests::complete_thailand_entry;
    use crate::destinations::DestinationRegistry;
    use chrono::TimeZone;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 20, 8, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    #[test]
    fn test_debounce_waits_for_quiet_period() {
        let mut saver = DebouncedSaver::default();
        assert!(saver.due(t(0)).is_none());

        saver.edit("L", t(0));
        saver.edit("Li", t(200));
        saver.edit("Li M", t(400));

        assert!(saver.due(t(800)).is_none());
        assert_eq!(saver.due_at(), Some(t(900)));
        assert_eq!(saver.due(t(900)), Some("Li M"));

        // Nothing left
        assert!(!saver.has_pending());
        assert!(saver.due(t(2000)).is_none());
    }

    #[test]
    fn test_flush_ignores_timing() {
        let mut saver = DebouncedSaver::new(Duration::seconds(10));
        saver.edit(42, t(0));
        assert_eq!(saver.flush(), Some(42));
        assert_eq!(saver.flush(), None);
    }

    #[test]
    fn test_progress_delta() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();

        let mut info = complete_thailand_entry();
        info.funds.clear();
        let before = compute_completion(&info, th);

        let full = compute_completion(&complete_thailand_entry(), th);
        let delta = FormProgress::delta(&before, &full);

        assert!(delta.changed());
        assert_eq!(delta.before, 80);
        assert_eq!(delta.after, 100);
        assert_eq!(delta.newly_completed, vec![Category::Funds]);
        assert!(delta.regressed.is_empty());

        let back = FormProgress::delta(&full, &before);
        assert_eq!(back.regressed, vec![Category::Funds]);
        assert!(!FormProgress::delta(&full, &full).changed());
    }
}
