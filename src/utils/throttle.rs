//! Log throttling
//!
//! A camera that is unplugged fails on every capture attempt. The throttler
//! lets the first failure through, then holds further messages for the same
//! key until the interval has elapsed, counting what it held back.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Entry {
    last_logged: Instant,
    suppressed: u64,
}

/// Limits how often the same message is logged
pub struct LogThrottler {
    entries: Mutex<HashMap<String, Entry>>,
    interval: Duration,
}

impl LogThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            interval,
        }
    }

    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Returns `true` if a message for `key` should be logged now
    pub fn should_log(&self, key: &str) -> bool {
        self.check(key).is_some()
    }

    /// Like [`should_log`](Self::should_log), but also returns how many
    /// messages were suppressed since the last one that got through.
    pub fn check(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        match entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.last_logged) < self.interval => {
                entry.suppressed += 1;
                None
            }
            Some(entry) => {
                let suppressed = entry.suppressed;
                *entry = Entry {
                    last_logged: now,
                    suppressed: 0,
                };
                Some(suppressed)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        last_logged: now,
                        suppressed: 0,
                    },
                );
                Some(0)
            }
        }
    }

    /// Forget `key`, so the next failure is logged immediately.
    ///
    /// Call this once the condition has recovered.
    pub fn clear(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn clear_all(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for LogThrottler {
    fn default() -> Self {
        Self::with_secs(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_throttler_basic() {
        let throttler = LogThrottler::new(Duration::from_millis(100));

        assert!(throttler.should_log("capture"));
        assert!(!throttler.should_log("capture"));
        assert!(!throttler.should_log("capture"));

        // Other keys are independent
        assert!(throttler.should_log("encode"));
        assert_eq!(throttler.len(), 2);
    }

    #[test]
    fn test_suppressed_count() {
        let throttler = LogThrottler::new(Duration::from_millis(50));

        assert_eq!(throttler.check("capture"), Some(0));
        assert_eq!(throttler.check("capture"), None);
        assert_eq!(throttler.check("capture"), None);

        thread::sleep(Duration::from_millis(70));
        assert_eq!(throttler.check("capture"), Some(2));
    }

    #[test]
    fn test_clear() {
        let throttler = LogThrottler::with_secs(60);

        assert!(throttler.should_log("capture"));
        assert!(!throttler.should_log("capture"));

        throttler.clear("capture");
        assert!(throttler.should_log("capture"));

        throttler.clear_all();
        assert!(throttler.is_empty());
    }
}
