//! # Cooperative Scheduler
//!
//! A deterministic, single-threaded timer queue driven by a virtual clock.
//! Nothing runs on its own: the owner advances the clock and runs due tasks
//! one at a time, handing each task exclusive `&mut` access to the owner.
//!
//! Tasks are ordered by due time, then by scheduling order, so two tasks due
//! at the same instant run first-in first-out.
//!
//! ```rust
//! use core_playback::scheduler::{Scheduler, TaskOwner};
//! use std::time::Duration;
//!
//! let mut scheduler: Scheduler<Vec<&str>> = Scheduler::new();
//! scheduler.set_timeout(TaskOwner::Controller, Duration::from_millis(5), |log| log.push("late"));
//! scheduler.set_timeout(TaskOwner::Controller, Duration::ZERO, |log| log.push("early"));
//!
//! let mut log = Vec::new();
//! while let Some(task) = scheduler.pop_due(Duration::from_millis(10)) {
//!     task.run(&mut log);
//! }
//! assert_eq!(log, vec!["early", "late"]);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::trace;

/// Delay used for animation-frame requests.
pub const ANIMATION_FRAME: Duration = Duration::from_millis(16);

/// Handle for cancelling a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Who a task was scheduled for. Engine tasks are cancelled together when
/// that engine generation is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOwner {
    Controller,
    Engine(u64),
}

type OnceTask<C> = Box<dyn FnOnce(&mut C)>;
type RepeatingTask<C> = Rc<dyn Fn(&mut C)>;

enum Kind<C> {
    Once(OnceTask<C>),
    Interval { period: Duration, callback: RepeatingTask<C> },
}

struct Entry<C> {
    id: TaskId,
    owner: TaskOwner,
    kind: Kind<C>,
}

/// A task removed from the queue, ready to run.
pub enum DueTask<C> {
    Once(OnceTask<C>),
    Repeating(RepeatingTask<C>),
}

impl<C> DueTask<C> {
    pub fn run(self, context: &mut C) {
        match self {
            DueTask::Once(task) => task(context),
            DueTask::Repeating(task) => task(context),
        }
    }
}

/// Virtual-clock timer queue.
pub struct Scheduler<C> {
    now: Duration,
    next_seq: u64,
    queue: BTreeMap<(Duration, u64), Entry<C>>,
    keys: HashMap<TaskId, (Duration, u64)>,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            queue: BTreeMap::new(),
            keys: HashMap::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Moves the clock forward to `time`. The clock never goes backwards.
    pub fn advance_to(&mut self, time: Duration) {
        if time > self.now {
            self.now = time;
        }
    }

    pub fn set_timeout<F>(&mut self, owner: TaskOwner, delay: Duration, task: F) -> TaskId
    where
        F: FnOnce(&mut C) + 'static,
    {
        self.insert(owner, self.now.saturating_add(delay), Kind::Once(Box::new(task)))
    }

    /// Runs `task` every `period` until cancelled. A zero period is treated
    /// as one millisecond.
    pub fn set_interval<F>(&mut self, owner: TaskOwner, period: Duration, task: F) -> TaskId
    where
        F: Fn(&mut C) + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        self.insert(
            owner,
            self.now.saturating_add(period),
            Kind::Interval {
                period,
                callback: Rc::new(task),
            },
        )
    }

    pub fn request_animation_frame<F>(&mut self, owner: TaskOwner, task: F) -> TaskId
    where
        F: FnOnce(&mut C) + 'static,
    {
        self.set_timeout(owner, ANIMATION_FRAME, task)
    }

    fn insert(&mut self, owner: TaskOwner, due: Duration, kind: Kind<C>) -> TaskId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = TaskId(seq);
        self.queue.insert((due, seq), Entry { id, owner, kind });
        self.keys.insert(id, (due, seq));
        id
    }

    /// Cancels a pending task. Returns `false` if it already ran or was
    /// cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.keys.remove(&id) {
            Some(key) => self.queue.remove(&key).is_some(),
            None => false,
        }
    }

    /// Cancels every task of `owner`. Returns how many were cancelled.
    pub fn cancel_owner(&mut self, owner: TaskOwner) -> usize {
        let doomed: Vec<_> = self
            .queue
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(key, entry)| (*key, entry.id))
            .collect();
        for (key, id) in &doomed {
            self.queue.remove(key);
            self.keys.remove(id);
        }
        if !doomed.is_empty() {
            trace!(?owner, cancelled = doomed.len(), "Cancelled tasks");
        }
        doomed.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        self.keys.clear();
        count
    }

    /// Due time of the earliest task.
    pub fn next_due(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Whether any one-shot task is pending. Intervals alone never drain.
    pub fn has_one_shot(&self) -> bool {
        self.queue
            .values()
            .any(|entry| matches!(entry.kind, Kind::Once(_)))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Removes the earliest task due at or before `limit`, moving the clock
    /// to its due time. Intervals are re-armed before being returned.
    pub fn pop_due(&mut self, limit: Duration) -> Option<DueTask<C>> {
        let key = *self.queue.keys().next()?;
        if key.0 > limit {
            return None;
        }
        let entry = self.queue.remove(&key)?;
        self.keys.remove(&entry.id);
        self.advance_to(key.0);

        match entry.kind {
            Kind::Once(task) => Some(DueTask::Once(task)),
            Kind::Interval { period, callback } => {
                let due = key.0.saturating_add(period);
                let rearm_key = (due, key.1);
                self.queue.insert(
                    rearm_key,
                    Entry {
                        id: entry.id,
                        owner: entry.owner,
                        kind: Kind::Interval {
                            period,
                            callback: Rc::clone(&callback),
                        },
                    },
                );
                self.keys.insert(entry.id, rearm_key);
                Some(DueTask::Repeating(callback))
            }
        }
    }
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("pending", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn run_until(scheduler: &mut Scheduler<Vec<String>>, limit: Duration) -> Vec<String> {
        let mut log = Vec::new();
        while let Some(task) = scheduler.pop_due(limit) {
            task.run(&mut log);
        }
        scheduler.advance_to(limit);
        log
    }

    #[test]
    fn test_fifo_for_equal_due_times() {
        let mut scheduler = Scheduler::new();
        for name in ["a", "b", "c"] {
            scheduler.set_timeout(TaskOwner::Controller, ms(1), move |log: &mut Vec<String>| {
                log.push(name.to_string())
            });
        }
        assert_eq!(run_until(&mut scheduler, ms(1)), vec!["a", "b", "c"]);
        assert_eq!(scheduler.now(), ms(1));
    }

    #[test]
    fn test_tasks_not_due_stay_queued() {
        let mut scheduler = Scheduler::new();
        scheduler.set_timeout(TaskOwner::Controller, ms(10), |log: &mut Vec<String>| {
            log.push("late".into())
        });
        assert!(run_until(&mut scheduler, ms(5)).is_empty());
        assert_eq!(scheduler.next_due(), Some(ms(10)));
        assert_eq!(run_until(&mut scheduler, ms(10)), vec!["late"]);
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.set_timeout(TaskOwner::Controller, ms(1), |log: &mut Vec<String>| {
            log.push("x".into())
        });
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(run_until(&mut scheduler, ms(5)).is_empty());
    }

    #[test]
    fn test_cancel_owner_only_hits_that_generation() {
        let mut scheduler = Scheduler::new();
        scheduler.set_timeout(TaskOwner::Engine(1), ms(1), |log: &mut Vec<String>| {
            log.push("old".into())
        });
        scheduler.request_animation_frame(TaskOwner::Engine(1), |log: &mut Vec<String>| {
            log.push("old-frame".into())
        });
        scheduler.set_timeout(TaskOwner::Engine(2), ms(1), |log: &mut Vec<String>| {
            log.push("new".into())
        });

        assert_eq!(scheduler.cancel_owner(TaskOwner::Engine(1)), 2);
        assert_eq!(run_until(&mut scheduler, ms(20)), vec!["new"]);
    }

    #[test]
    fn test_interval_repeats_until_cancelled() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.set_interval(TaskOwner::Controller, ms(4), |log: &mut Vec<String>| {
            log.push("tick".into())
        });
        assert!(!scheduler.has_one_shot());

        assert_eq!(run_until(&mut scheduler, ms(12)).len(), 3);
        assert!(scheduler.cancel(id));
        assert!(run_until(&mut scheduler, ms(40)).is_empty());
    }

    #[test]
    fn test_tasks_can_schedule_more_work() {
        let mut scheduler: Scheduler<Vec<String>> = Scheduler::new();
        scheduler.set_timeout(TaskOwner::Controller, ms(1), |log| log.push("first".into()));

        let mut log = Vec::new();
        while let Some(task) = scheduler.pop_due(ms(5)) {
            task.run(&mut log);
            if log.len() == 1 {
                scheduler.set_timeout(TaskOwner::Controller, Duration::ZERO, |log| {
                    log.push("second".into())
                });
            }
        }
        assert_eq!(log, vec!["first", "second"]);
    }

    #[test]
    fn test_cancel_all() {
        let mut scheduler: Scheduler<Vec<String>> = Scheduler::new();
        scheduler.set_timeout(TaskOwner::Controller, ms(1), |_| {});
        scheduler.set_interval(TaskOwner::Engine(3), ms(1), |_| {});
        assert_eq!(scheduler.cancel_all(), 2);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_far_future_delays_clamp_to_the_end_of_time() {
        let mut scheduler: Scheduler<Vec<String>> = Scheduler::new();
        scheduler.advance_to(ms(5));
        scheduler.set_timeout(TaskOwner::Controller, Duration::MAX, |log| {
            log.push("never".into())
        });
        scheduler.set_interval(TaskOwner::Controller, Duration::MAX, |log| {
            log.push("never".into())
        });
        assert_eq!(scheduler.next_due(), Some(Duration::MAX));
        assert!(run_until(&mut scheduler, ms(1_000)).is_empty());
        assert_eq!(scheduler.cancel_all(), 2);
    }
}
