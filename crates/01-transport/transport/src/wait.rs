//! Blocking wait/notify over the control slots of a [`SharedBuffer`].
//!
//! Each control slot owns a doorbell: a parking_lot mutex guarding a count of
//! banked wakeups plus a condition variable. `notify` banks wakeups and
//! unparks waiters; `wait` parks the calling thread until it can consume one.
//! Banking makes a notify that lands before the wait begins still release it,
//! and consuming exactly one wakeup per return keeps spurious condvar wakes
//! invisible to callers. The doorbell mutex orders every write made before a
//! notify ahead of the reads made after the matching wait returns.
//!
//! The wait is a real thread park. It must never run on the controller thread
//! and is refused there.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::shared_buffer::IntView;
use crate::{TransportError, TransportResult};

/// Result of attempting to wait on a control slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult {
    /// The value matched and the caller was woken by a notify.
    Ok,
    /// The value no longer matched when the wait was attempted.
    NotEqual,
    /// The wait timed out before a notify was observed.
    TimedOut,
}

#[derive(Default)]
struct BellState {
    banked: u32,
    parked: u32,
}

pub(crate) struct Doorbell {
    state: Mutex<BellState>,
    cond: Condvar,
}

impl Doorbell {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(BellState::default()),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn clear(&self) {
        self.state.lock().banked = 0;
    }
}

/// Parks the calling thread while `view[slot] == expected` until a notify on
/// the same slot arrives, or until `timeout` elapses.
///
/// `None` waits forever.
pub fn wait(
    view: &IntView<'_>,
    slot: usize,
    expected: i32,
    timeout: Option<Duration>,
) -> TransportResult<WaitResult> {
    let buffer = view.buffer();
    if buffer.is_controller_thread() {
        return Err(TransportError::WaitOnControllerThread);
    }
    let cell = view.slot(slot)?;
    let bell = buffer.doorbell(slot)?;
    let deadline = timeout.map(|t| Instant::now() + t);

    let mut state = bell.state.lock();
    if cell.load(std::sync::atomic::Ordering::Acquire) != expected {
        return Ok(WaitResult::NotEqual);
    }

    state.parked += 1;
    let result = loop {
        if state.banked > 0 {
            state.banked -= 1;
            break WaitResult::Ok;
        }
        match deadline {
            Some(deadline) => {
                if bell.cond.wait_until(&mut state, deadline).timed_out() {
                    if state.banked > 0 {
                        state.banked -= 1;
                        break WaitResult::Ok;
                    }
                    break WaitResult::TimedOut;
                }
            }
            None => bell.cond.wait(&mut state),
        }
    };
    state.parked -= 1;
    tracing::trace!(slot, ?result, "wait returned");
    Ok(result)
}

/// Banks `count` wakeups on `slot` and unparks up to `count` waiters.
///
/// Returns the number of threads that were parked and got woken.
pub fn notify(view: &IntView<'_>, slot: usize, count: u32) -> TransportResult<u32> {
    view.slot(slot)?;
    let bell = view.buffer().doorbell(slot)?;
    let woken = {
        let mut state = bell.state.lock();
        state.banked = state.banked.saturating_add(count);
        let woken = state.parked.min(count);
        if count == 1 {
            bell.cond.notify_one();
        } else if count > 1 {
            bell.cond.notify_all();
        }
        woken
    };
    tracing::trace!(slot, count, woken, "notify");
    Ok(woken)
}
