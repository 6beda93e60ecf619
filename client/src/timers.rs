//! Keyed deadline and interval registry.
//!
//! Every timer in the client lives in one of these, keyed by something that
//! names its purpose (a connection phase, a zone id). Arming a key that is
//! already armed replaces the old timer, so a key can never own two timers.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy)]
struct Timer {
    deadline: Instant,
    period: Option<Duration>,
}

#[derive(Debug)]
pub struct TimerRegistry<K> {
    timers: HashMap<K, Timer>,
}

impl<K: Eq + Hash + Clone> TimerRegistry<K> {
    pub fn new() -> Self {
        Self {
            timers: HashMap::new(),
        }
    }

    /// Arms a one-shot timer. Returns true if an existing timer was replaced.
    pub fn arm_once(&mut self, key: K, now: Instant, delay: Duration) -> bool {
        self.timers
            .insert(
                key,
                Timer {
                    deadline: now + delay,
                    period: None,
                },
            )
            .is_some()
    }

    /// Arms a repeating timer whose first firing is one period from `now`.
    pub fn arm_interval(&mut self, key: K, now: Instant, period: Duration) -> bool {
        let period = period.max(MIN_PERIOD);
        self.timers
            .insert(
                key,
                Timer {
                    deadline: now + period,
                    period: Some(period),
                },
            )
            .is_some()
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.timers.remove(key).is_some()
    }

    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let before = self.timers.len();
        self.timers.retain(|key, _| !predicate(key));
        before - self.timers.len()
    }

    pub fn is_armed(&self, key: &K) -> bool {
        self.timers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.timers.len();
        self.timers.clear();
        count
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|timer| timer.deadline).min()
    }

    /// Collects every firing due at or before `now`, oldest first.
    ///
    /// Each key fires at most once per poll. One-shot timers are removed as
    /// they fire. Interval timers that fell behind skip the missed periods and
    /// keep their phase.
    pub fn poll(&mut self, now: Instant) -> Vec<K> {
        let mut fired: Vec<(Instant, K)> = Vec::new();
        let mut expired: Vec<K> = Vec::new();

        for (key, timer) in self.timers.iter_mut() {
            if timer.deadline > now {
                continue;
            }
            fired.push((timer.deadline, key.clone()));
            match timer.period {
                Some(period) => timer.deadline = next_after(timer.deadline, period, now),
                None => expired.push(key.clone()),
            }
        }

        for key in &expired {
            self.timers.remove(key);
        }

        fired.sort_by_key(|(deadline, _)| *deadline);
        fired.into_iter().map(|(_, key)| key).collect()
    }
}

/// First `deadline + n * period` strictly after `now`.
fn next_after(deadline: Instant, period: Duration, now: Instant) -> Instant {
    let period_nanos = period.as_nanos().max(1);
    let behind = now.saturating_duration_since(deadline).as_nanos();
    let periods = behind / period_nanos + 1;
    deadline + Duration::from_nanos((periods * period_nanos) as u64)
}

impl<K: Eq + Hash + Clone> Default for TimerRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_one_shot_fires_once() {
        let start = Instant::now();
        let mut timers = TimerRegistry::new();
        timers.arm_once("reconnect", start, ms(3000));

        assert!(timers.poll(start + ms(2999)).is_empty());
        assert_eq!(timers.poll(start + ms(3000)), vec!["reconnect"]);
        assert!(timers.poll(start + ms(9000)).is_empty());
        assert!(timers.is_empty());
    }

    #[test]
    fn test_rearm_replaces() {
        let start = Instant::now();
        let mut timers = TimerRegistry::new();
        assert!(!timers.arm_interval("z1", start, ms(600)));
        assert!(timers.arm_interval("z1", start, ms(600)));
        assert_eq!(timers.len(), 1);

        assert_eq!(timers.poll(start + ms(600)).len(), 1);
    }

    #[test]
    fn test_interval_fires_once_after_stall() {
        let start = Instant::now();
        let mut timers = TimerRegistry::new();
        timers.arm_interval("tick", start, ms(100));

        assert_eq!(timers.poll(start + ms(350)), vec!["tick"]);
        assert_eq!(timers.next_deadline(), Some(start + ms(400)));
        assert_eq!(timers.poll(start + ms(399)).len(), 0);
        assert_eq!(timers.poll(start + ms(400)).len(), 1);
        assert_eq!(timers.poll(start + ms(6_000)).len(), 1);
        assert_eq!(timers.next_deadline(), Some(start + ms(6_100)));
        assert!(timers.is_armed(&"tick"));
    }

    #[test]
    fn test_fired_in_deadline_order() {
        let start = Instant::now();
        let mut timers = TimerRegistry::new();
        timers.arm_once("late", start, ms(50));
        timers.arm_once("early", start, ms(10));

        assert_eq!(timers.poll(start + ms(60)), vec!["early", "late"]);
    }

    #[test]
    fn test_cancel_and_clear() {
        let start = Instant::now();
        let mut timers = TimerRegistry::new();
        timers.arm_once(1, start, ms(10));
        timers.arm_once(2, start, ms(10));
        timers.arm_once(3, start, ms(10));

        assert!(timers.cancel(&1));
        assert!(!timers.cancel(&1));
        assert_eq!(timers.cancel_where(|key| *key == 2), 1);
        assert_eq!(timers.next_deadline(), Some(start + ms(10)));
        assert_eq!(timers.clear(), 1);
        assert_eq!(timers.next_deadline(), None);
    }
}
