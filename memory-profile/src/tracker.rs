//! Per-user update tracking: decides when a user's pending persona
//! messages warrant a profile extraction pass (spec.md §4.8).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Tracks how many unconsumed marks a single user has accrued, and how
/// long ago the tracker was last reset.
#[derive(Debug)]
pub struct ProfileUpdateTracker {
    message_limit: u32,
    time_limit: Duration,
    pending_count: u32,
    last_reset: Instant,
}

impl ProfileUpdateTracker {
    /// Construct a tracker with the given thresholds, freshly reset.
    #[must_use]
    pub fn new(message_limit: u32, time_limit_sec: f64) -> Self {
        Self {
            message_limit,
            time_limit: Duration::from_secs_f64(time_limit_sec),
            pending_count: 0,
            last_reset: Instant::now(),
        }
    }

    /// Record one mark (a persona message was ingested for this user).
    pub fn mark_update(&mut self) {
        self.pending_count += 1;
    }

    /// True iff the pending count has reached `message_limit`, or the time
    /// since the last reset has reached `time_limit_sec` with at least one
    /// pending mark.
    #[must_use]
    pub fn should_update(&self) -> bool {
        if self.pending_count >= self.message_limit {
            return true;
        }
        self.pending_count > 0 && self.last_reset.elapsed() >= self.time_limit
    }

    /// Zero the pending count and restart the time window.
    pub fn reset(&mut self) {
        self.pending_count = 0;
        self.last_reset = Instant::now();
    }
}

/// A process-instance-wide (not global) map of user_id -> tracker, guarded
/// by a single async mutex per spec.md §5's "single process-wide instance,
/// mutex-guarded" policy. Owned by one `ProfileMemory`; multiple instances
/// in the same process hold independent managers.
pub struct ProfileUpdateTrackerManager {
    message_limit: u32,
    time_limit_sec: f64,
    trackers: Mutex<HashMap<String, ProfileUpdateTracker>>,
}

impl ProfileUpdateTrackerManager {
    /// Construct a manager; trackers are created lazily per user on first
    /// mark, using these shared thresholds.
    #[must_use]
    pub fn new(message_limit: u32, time_limit_sec: f64) -> Self {
        Self {
            message_limit,
            time_limit_sec,
            trackers: Mutex::new(HashMap::new()),
        }
    }

    /// Record a mark for `user_id`, creating its tracker if needed.
    pub async fn mark_update(&self, user_id: &str) {
        let mut trackers = self.trackers.lock().await;
        trackers
            .entry(user_id.to_string())
            .or_insert_with(|| ProfileUpdateTracker::new(self.message_limit, self.time_limit_sec))
            .mark_update();
    }

    /// Return every user whose tracker currently satisfies `should_update`,
    /// atomically resetting each one so repeated calls don't double-fire.
    pub async fn get_users_to_update(&self) -> Vec<String> {
        let mut trackers = self.trackers.lock().await;
        let mut due = Vec::new();
        for (user_id, tracker) in trackers.iter_mut() {
            if tracker.should_update() {
                tracker.reset();
                due.push(user_id.clone());
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_expires_after_time_limit() {
        let mut tracker = ProfileUpdateTracker::new(2, 0.1);
        assert!(!tracker.should_update());
        tracker.mark_update();
        assert!(!tracker.should_update());
        std::thread::sleep(Duration::from_millis(150));
        assert!(tracker.should_update());
    }

    #[test]
    fn tracker_fires_at_message_limit_and_resets() {
        let mut tracker = ProfileUpdateTracker::new(2, 0.1);
        assert!(!tracker.should_update());
        tracker.mark_update();
        assert!(!tracker.should_update());
        tracker.mark_update();
        assert!(tracker.should_update());
        tracker.reset();
        assert!(!tracker.should_update());
    }

    #[tokio::test]
    async fn manager_reports_only_due_users_and_resets_them() {
        let manager = ProfileUpdateTrackerManager::new(2, 10.0);
        assert_eq!(manager.get_users_to_update().await, Vec::<String>::new());

        for user in ["a", "b", "a", "a"] {
            manager.mark_update(user).await;
        }
        let mut due = manager.get_users_to_update().await;
        due.sort();
        assert_eq!(due, vec!["a".to_string()]);

        for user in ["b", "a"] {
            manager.mark_update(user).await;
        }
        let mut due = manager.get_users_to_update().await;
        due.sort();
        assert_eq!(due, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn manager_reports_all_due_users_after_time_limit() {
        let manager = ProfileUpdateTrackerManager::new(100, 0.1);
        manager.mark_update("a").await;
        manager.mark_update("b").await;
        assert_eq!(manager.get_users_to_update().await, Vec::<String>::new());

        tokio::time::sleep(Duration::from_millis(150)).await;
        let mut due = manager.get_users_to_update().await;
        due.sort();
        assert_eq!(due, vec!["a".to_string(), "b".to_string()]);
    }
}
