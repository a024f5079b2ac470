// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-threaded cooperative scheduler.
//!
//! The whole protocol core runs on one "main task" driven by repeated calls
//! to [`Scheduler::tick`]. There is no background timer thread: callers
//! derive `now_us` from their own monotonic clock (typically truncated to
//! `u32`, matching the wire-level cycle counters elsewhere in the stack) and
//! feed it in. Every watchdog (DCP SAM lock, DCP identify delay, LLDP TX/RX
//! timers, CPM data-hold timers, alarm retry timers, RPC session fragment
//! timeouts) is one of these one-shot tasks.

use crate::core::rt::arena::{Arena, Handle};

/// Stable handle to a scheduled (or already-fired/cancelled) task.
pub type TimerHandle = Handle;

struct Task<T> {
    /// Absolute fire time in the same wraparound `u32` microsecond space as
    /// the `now_us` passed to `tick`.
    due_us: u32,
    payload: T,
    /// Monotonically increasing insertion index, used to break ties between
    /// tasks due at the same tick: callbacks fire in insertion order.
    seq: u64,
}

/// A single-threaded timer wheel with `u32`-wraparound microsecond time.
///
/// `T` is whatever the caller wants attached to a timer (a closure, an enum
/// tag identifying which watchdog fired, ...). [`Scheduler`] does not call
/// anything itself — `tick` hands the caller back the due payloads in fire
/// order so the caller's own event loop dispatches them. This keeps the
/// scheduler free of dynamic dispatch and keeps borrow-checking simple: the
/// caller owns whatever state the callback needs to touch.
pub struct Scheduler<T> {
    tasks: Arena<Task<T>>,
    next_seq: u64,
}

impl<T> Scheduler<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: Arena::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Register a one-shot task due `delay_us` from `now_us`. Returns a
    /// stable handle usable with `cancel`/`restart`/`is_running`.
    pub fn add(&mut self, now_us: u32, delay_us: u32, payload: T) -> Option<TimerHandle> {
        let due_us = now_us.wrapping_add(delay_us);
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.tasks.insert(Task {
            due_us,
            payload,
            seq,
        })
    }

    /// Cancel any task bound to `handle` and re-arm it with a fresh payload
    /// and delay. If the handle is stale or not found, behaves as `add`.
    pub fn restart(
        &mut self,
        handle: &mut TimerHandle,
        now_us: u32,
        delay_us: u32,
        payload: T,
    ) -> bool {
        self.tasks.remove(*handle);
        match self.add(now_us, delay_us, payload) {
            Some(new_handle) => {
                *handle = new_handle;
                true
            }
            None => false,
        }
    }

    /// Cancel `handle`. Idempotent: cancelling an unknown or already-fired
    /// handle is a no-op.
    pub fn cancel(&mut self, handle: TimerHandle) {
        self.tasks.remove(handle);
    }

    pub fn is_running(&self, handle: TimerHandle) -> bool {
        self.tasks.get(handle).is_some()
    }

    /// Pop every task due at or before `now_us`, in fire order (earliest due
    /// time first, insertion order breaking ties), removing them from the
    /// wheel. `now_us` wraparound is handled with modular comparison: a task
    /// is due iff `(now_us - due_us) mod 2^32` has not "gone backwards" past
    /// a half-range threshold, i.e. the signed difference is >= 0.
    pub fn tick(&mut self, now_us: u32) -> Vec<T> {
        let mut due: Vec<(Handle, u32, u64)> = self
            .tasks
            .iter()
            .filter_map(|(h, t)| {
                if is_due(t.due_us, now_us) {
                    Some((h, t.due_us, t.seq))
                } else {
                    None
                }
            })
            .collect();
        due.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

        due.into_iter()
            .filter_map(|(h, _, _)| self.tasks.remove(h).map(|t| t.payload))
            .collect()
    }
}

/// `due_us` has arrived by `now_us` using wraparound-safe modular
/// comparison: interpret `now_us - due_us` as a signed 32-bit delta so a
/// clock that has wrapped past `due_us` is still recognised as due, while a
/// `due_us` far in the future (more than 2^31 us away) is not mistaken for
/// one already past.
fn is_due(due_us: u32, now_us: u32) -> bool {
    let delta = now_us.wrapping_sub(due_us) as i32;
    delta >= 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_when_due() {
        let mut sched: Scheduler<&'static str> = Scheduler::with_capacity(4);
        sched.add(0, 1000, "a").unwrap();
        assert!(sched.tick(999).is_empty());
        assert_eq!(sched.tick(1000), vec!["a"]);
    }

    #[test]
    fn same_tick_fires_in_insertion_order() {
        let mut sched: Scheduler<u32> = Scheduler::with_capacity(4);
        sched.add(0, 100, 1).unwrap();
        sched.add(0, 100, 2).unwrap();
        sched.add(0, 50, 3).unwrap();
        // 3 is due earlier, then 1, 2 in insertion order.
        assert_eq!(sched.tick(100), vec![3, 1, 2]);
    }

    #[test]
    fn cancel_is_idempotent_and_prevents_fire() {
        let mut sched: Scheduler<u32> = Scheduler::with_capacity(4);
        let h = sched.add(0, 100, 1).unwrap();
        sched.cancel(h);
        sched.cancel(h); // no-op, must not panic
        assert!(sched.tick(1000).is_empty());
    }

    #[test]
    fn restart_replaces_prior_arming() {
        let mut sched: Scheduler<u32> = Scheduler::with_capacity(4);
        let mut h = sched.add(0, 100, 1).unwrap();
        sched.restart(&mut h, 0, 500, 2);
        assert!(sched.tick(100).is_empty(), "original arming must be gone");
        assert_eq!(sched.tick(500), vec![2]);
    }

    #[test]
    fn is_running_reflects_pending_state() {
        let mut sched: Scheduler<u32> = Scheduler::with_capacity(4);
        let h = sched.add(0, 100, 1).unwrap();
        assert!(sched.is_running(h));
        sched.tick(100);
        assert!(!sched.is_running(h));
    }

    #[test]
    fn handles_clock_wraparound() {
        let mut sched: Scheduler<u32> = Scheduler::with_capacity(4);
        let near_wrap = u32::MAX - 10;
        sched.add(near_wrap, 20, 1).unwrap(); // due_us wraps past u32::MAX
        assert!(sched.tick(near_wrap + 5).is_empty());
        assert_eq!(sched.tick(9), vec![1]); // 9 == near_wrap + 20 (wrapped)
    }

    #[test]
    fn full_scheduler_rejects_add() {
        let mut sched: Scheduler<u32> = Scheduler::with_capacity(1);
        sched.add(0, 10, 1).unwrap();
        assert!(sched.add(0, 10, 2).is_none());
    }
}
