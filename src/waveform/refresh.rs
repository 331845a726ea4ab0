// Periodic waveform reload for recordings that are still being written

use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
struct PendingRefresh {
    path: String,
    due: Instant,
}

/// What the owner should do after polling
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshAction {
    /// Reload the waveform (and markers) for this recording now
    Reload(String),
}

/// Schedules reloads of a partial recording's waveform.
///
/// A due reload only fires while the recording is still selected, still
/// partial and not playing. While playing it is pushed back by one interval.
#[derive(Debug)]
pub struct PartialRefresher {
    interval: Duration,
    pending: Option<PendingRefresh>,
}

impl PartialRefresher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm a reload one interval from `now`, replacing any pending one
    pub fn schedule(&mut self, path: &str, now: Instant) {
        log::debug!("Partial refresh for {} in {:?}", path, self.interval);
        self.pending = Some(PendingRefresh {
            path: path.to_string(),
            due: now + self.interval,
        });
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            log::debug!("Partial refresh for {} cancelled", pending.path);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending reload is due, if any
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Check the timer.
    ///
    /// `selected` is the currently selected recording path and whether it is
    /// still partial.
    pub fn poll(
        &mut self,
        now: Instant,
        selected: Option<(&str, bool)>,
        is_playing: bool,
    ) -> Option<RefreshAction> {
        let (path, due) = {
            let pending = self.pending.as_ref()?;
            (pending.path.clone(), pending.due)
        };

        let still_wanted = matches!(selected, Some((selected_path, true)) if selected_path == path);
        if !still_wanted {
            self.cancel();
            return None;
        }

        if now < due {
            return None;
        }

        if is_playing {
            log::debug!("Partial refresh for {} deferred while playing", path);
            self.schedule(&path, now);
            return None;
        }

        self.pending = None;
        Some(RefreshAction::Reload(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECS: Duration = Duration::from_secs(5);

    #[test]
    fn test_fires_after_interval() {
        let t0 = Instant::now();
        let mut refresher = PartialRefresher::new(SECS);
        refresher.schedule("r1", t0);

        assert_eq!(refresher.poll(t0 + Duration::from_secs(4), Some(("r1", true)), false), None);
        assert_eq!(
            refresher.poll(t0 + SECS, Some(("r1", true)), false),
            Some(RefreshAction::Reload("r1".into()))
        );
        assert!(!refresher.is_pending());
    }

    #[test]
    fn test_deferred_while_playing() {
        let t0 = Instant::now();
        let mut refresher = PartialRefresher::new(SECS);
        refresher.schedule("r1", t0);

        let t1 = t0 + SECS;
        assert_eq!(refresher.poll(t1, Some(("r1", true)), true), None);
        assert!(refresher.is_pending());
        assert_eq!(refresher.next_due(), Some(t1 + SECS));

        assert_eq!(
            refresher.poll(t1 + SECS, Some(("r1", true)), false),
            Some(RefreshAction::Reload("r1".into()))
        );
    }

    #[test]
    fn test_reselect_cancels() {
        let t0 = Instant::now();
        let mut refresher = PartialRefresher::new(SECS);
        refresher.schedule("r1", t0);

        assert_eq!(refresher.poll(t0 + SECS, Some(("r2", true)), false), None);
        assert!(!refresher.is_pending());
    }

    #[test]
    fn test_no_longer_partial_cancels() {
        let t0 = Instant::now();
        let mut refresher = PartialRefresher::new(SECS);
        refresher.schedule("r1", t0);

        assert_eq!(refresher.poll(t0 + SECS, Some(("r1", false)), false), None);
        assert!(!refresher.is_pending());

        refresher.schedule("r1", t0);
        assert_eq!(refresher.poll(t0 + SECS, None, false), None);
        assert!(!refresher.is_pending());
    }
}
