//! Manually driven scheduler for headless hosts and deterministic tests.

use std::{cell::RefCell, rc::Rc, time::Duration};

use desktop_contract::{DebounceKey, ScheduledTask, Scheduler};

#[derive(Clone, Default)]
/// [`Scheduler`] whose frames and timers are advanced explicitly by the caller;
/// clones share one queue.
///
/// Frame tasks queue until [`ManualScheduler::run_frame`]; debounce timers hold a
/// virtual-time due instant and fire during [`ManualScheduler::advance`].
pub struct ManualScheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

#[derive(Default)]
struct SchedulerInner {
    now_ms: u64,
    frame_tasks: Vec<ScheduledTask>,
    timers: Vec<DebounceTimer>,
}

struct DebounceTimer {
    key: DebounceKey,
    due_at_ms: u64,
    task: ScheduledTask,
}

impl ManualScheduler {
    /// Scheduler at virtual time zero with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.inner.borrow().now_ms
    }

    /// Number of tasks waiting for the next frame.
    pub fn pending_frame_tasks(&self) -> usize {
        self.inner.borrow().frame_tasks.len()
    }

    /// Number of armed debounce timers.
    pub fn pending_debounces(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// Virtual due instant of the timer armed for `key`, if any.
    pub fn debounce_due_at(&self, key: DebounceKey) -> Option<u64> {
        self.inner
            .borrow()
            .timers
            .iter()
            .find(|timer| timer.key == key)
            .map(|timer| timer.due_at_ms)
    }

    /// Runs one frame boundary: executes every task queued so far, in submission
    /// order, and returns how many ran. Tasks queued while the frame runs wait for
    /// the next frame.
    pub fn run_frame(&self) -> usize {
        let tasks = std::mem::take(&mut self.inner.borrow_mut().frame_tasks);
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Advances virtual time and fires every debounce timer that comes due, in due
    /// order; returns how many fired. Timers re-armed by a firing task are honored
    /// if they come due within the same advance.
    pub fn advance(&self, delta: Duration) -> usize {
        let target = {
            let mut inner = self.inner.borrow_mut();
            inner.now_ms = inner.now_ms.saturating_add(delta.as_millis() as u64);
            inner.now_ms
        };

        let mut fired = 0;
        loop {
            let next_due = {
                let mut inner = self.inner.borrow_mut();
                let due_index = inner
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.due_at_ms <= target)
                    .min_by_key(|(_, timer)| timer.due_at_ms)
                    .map(|(index, _)| index);
                due_index.map(|index| inner.timers.remove(index))
            };
            match next_due {
                Some(timer) => {
                    (timer.task)();
                    fired += 1;
                }
                None => break,
            }
        }
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_frame(&self, task: ScheduledTask) {
        self.inner.borrow_mut().frame_tasks.push(task);
    }

    fn debounce(&self, key: DebounceKey, delay: Duration, task: ScheduledTask) {
        let mut inner = self.inner.borrow_mut();
        let due_at_ms = inner.now_ms.saturating_add(delay.as_millis() as u64);
        inner.timers.retain(|timer| timer.key != key);
        inner.timers.push(DebounceTimer {
            key,
            due_at_ms,
            task,
        });
    }

    fn cancel_debounce(&self, key: DebounceKey) {
        self.inner
            .borrow_mut()
            .timers
            .retain(|timer| timer.key != key);
    }
}
