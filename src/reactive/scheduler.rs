//! Per-app debounced render scheduler.
//!
//! Each app owns one [`Scheduler`]: a mutable debounce delay, at most one
//! pending deadline, and the app's render-pass counter. Scheduling always
//! replaces the pending deadline (last call wins), so a burst of triggers
//! inside one delay window collapses into a single render pass.
//!
//! The scheduler only records deadlines. The engine owns the clock loop
//! ([`Engine::run_pending`](crate::app::Engine::run_pending),
//! [`Engine::settle`](crate::app::Engine::settle)).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::value::Value;

struct SchedulerState {
    /// Delay sampled by the next `schedule` call.
    delay: Duration,
    deadline: Option<Instant>,
    pass: u64,
}

/// Debounce timer and pass counter for one app. Cloning shares the state.
#[derive(Clone)]
pub struct Scheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl Scheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: Rc::new(RefCell::new(SchedulerState {
                delay,
                deadline: None,
                pass: 0,
            })),
        }
    }

    pub fn delay(&self) -> Duration {
        self.state.borrow().delay
    }

    /// Set the delay used by the next `schedule` call.
    pub fn set_delay(&self, delay: Duration) {
        self.state.borrow_mut().delay = delay;
    }

    /// Arm the timer at now + delay, cancelling any pending deadline.
    pub fn schedule(&self) -> Instant {
        let mut state = self.state.borrow_mut();
        let deadline = Instant::now() + state.delay;
        state.deadline = Some(deadline);
        trace!(delay_ms = state.delay.as_millis() as u64, "render scheduled");
        deadline
    }

    pub fn cancel(&self) {
        self.state.borrow_mut().deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.state.borrow().deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline().is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|d| d <= now)
    }

    /// Consume the pending deadline and start a new pass. Returns its number.
    pub fn begin_pass(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        state.deadline = None;
        state.pass += 1;
        state.pass
    }

    /// Number of the latest pass (0 before the first render).
    pub fn pass(&self) -> u64 {
        self.state.borrow().pass
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Scheduler")
            .field("delay", &state.delay)
            .field("deadline", &state.deadline)
            .field("pass", &state.pass)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RenderHook
// ---------------------------------------------------------------------------

/// Callback requesting a debounced re-render of one app.
///
/// Handed to the root model (as the `$hook` local) and to every component
/// builder.
#[derive(Clone, Debug)]
pub struct RenderHook {
    app: Rc<str>,
    scheduler: Scheduler,
}

impl RenderHook {
    pub fn new(app: Rc<str>, scheduler: Scheduler) -> Self {
        Self { app, scheduler }
    }

    /// Request a render using the app's current delay.
    pub fn trigger(&self) {
        self.scheduler.schedule();
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The hook as a callable expression value.
    pub fn to_value(&self) -> Value {
        let hook = self.clone();
        Value::function("$hook", move |_, _| {
            hook.trigger();
            Ok(Value::Undefined)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn last_schedule_wins() {
        let scheduler = Scheduler::new(Duration::from_millis(100));
        let first = scheduler.schedule();
        tokio::time::advance(Duration::from_millis(60)).await;
        scheduler.set_delay(Duration::from_millis(10));
        let second = scheduler.schedule();
        assert!(second < first);
        assert_eq!(scheduler.deadline(), Some(second));
        assert!(!scheduler.is_due(Instant::now()));
        tokio::time::advance(Duration::from_millis(10)).await;
        assert!(scheduler.is_due(Instant::now()));
    }

    #[test]
    fn begin_pass_clears_deadline_and_counts() {
        let scheduler = Scheduler::new(Duration::ZERO);
        assert_eq!(scheduler.pass(), 0);
        scheduler.schedule();
        assert!(scheduler.is_pending());
        assert_eq!(scheduler.begin_pass(), 1);
        assert!(!scheduler.is_pending());
        assert_eq!(scheduler.begin_pass(), 2);
    }

    #[test]
    fn hook_shares_scheduler_state() {
        let scheduler = Scheduler::new(Duration::ZERO);
        let hook = RenderHook::new(Rc::from("main"), scheduler.clone());
        assert_eq!(hook.app(), "main");
        let Value::Function(func) = hook.to_value() else {
            panic!("hook is not callable");
        };
        func.call(&Value::Undefined, vec![]).unwrap();
        assert!(scheduler.is_pending());
        scheduler.cancel();
        assert!(!scheduler.is_pending());
    }
}
