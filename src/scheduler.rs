//! Cooperative task scheduler.
//!
//! A fixed table of interval-driven tasks stepped from a single execution
//! context. Callbacks run to completion, never block, and receive the
//! shared application state plus the current monotonic time. Deadlines
//! use wrap-safe signed differences, and a task that falls more than one
//! interval behind is rescheduled from `now` instead of burning a tight
//! catch-up loop.

pub const MAX_TASKS: usize = 16;

pub type TaskFn<S> = fn(&mut S, u32);

struct Task<S> {
    name: &'static str,
    callback: TaskFn<S>,
    interval_ms: u32,
    next_run_ms: u32,
    enabled: bool,
}

pub struct Scheduler<S, const N: usize = MAX_TASKS> {
    tasks: heapless::Vec<Task<S>, N>,
}

impl<S, const N: usize> Scheduler<S, N> {
    pub fn new() -> Self {
        Self {
            tasks: heapless::Vec::new(),
        }
    }

    /// Returns `false` when the table is full. The first run happens one
    /// interval after registration.
    pub fn register(&mut self, name: &'static str, callback: TaskFn<S>, interval_ms: u32, now: u32) -> bool {
        let task = Task {
            name,
            callback,
            interval_ms,
            next_run_ms: now.wrapping_add(interval_ms),
            enabled: true,
        };
        if self.tasks.push(task).is_err() {
            log::warn!("[sched] task table full, '{}' not registered", name);
            return false;
        }
        true
    }

    /// Disabling leaves the entry in place; re-enabling resumes one full
    /// interval from `now`.
    pub fn set_enabled(&mut self, name: &str, enabled: bool, now: u32) {
        for task in self.tasks.iter_mut() {
            if task.name == name {
                if enabled && !task.enabled {
                    task.next_run_ms = now.wrapping_add(task.interval_ms);
                }
                task.enabled = enabled;
                return;
            }
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.name == name && t.enabled)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Run every due task once.
    pub fn tick(&mut self, state: &mut S, now: u32) {
        for task in self.tasks.iter_mut() {
            if !task.enabled {
                continue;
            }
            if (now.wrapping_sub(task.next_run_ms) as i32) >= 0 {
                (task.callback)(state, now);

                let scheduled = task.next_run_ms.wrapping_add(task.interval_ms);
                if (now.wrapping_sub(scheduled) as i32) >= 0 {
                    // More than one interval late.
                    task.next_run_ms = now.wrapping_add(task.interval_ms);
                } else {
                    task.next_run_ms = scheduled;
                }
            }
        }
    }
}

impl<S, const N: usize> Default for Scheduler<S, N> {
    fn default() -> Self {
        Self::new()
    }
}
