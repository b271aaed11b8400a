//! Periodic task scheduler.
//!
//! Timer-driven work never runs on its own thread: the scheduler notifies
//! a [`SchedulerDelegate`] when a task is due, and the runtime's delegate
//! posts [`Event::Scheduled`](crate::events::Event::Scheduled) into the
//! node's queue, where it is serialized with inbound messages.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐   │
//! │  │ Sample    │  │ Data      │  │ Status    │  │ Reconnect│   │
//! │  │ period    │  │ period    │  │ refresh   │  │ check    │   │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘  └─────┬────┘   │
//! │        ▼              ▼              ▼              ▼        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              SchedulerDelegate                         │  │
//! │  │       (runtime pushes into the EventQueue)             │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │                   NodeCore::handle()                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use log::info;

use crate::app::ports::SchedulerDelegate;
use crate::events::Task;
use crate::model::Millis;

/// Maximum number of concurrent schedules (stack-allocated).
const MAX_SCHEDULES: usize = 6;

/// A single periodic schedule.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub task: Task,
    pub interval_ms: Millis,
    /// Fire on the first poll instead of waiting a full period.
    pub immediate: bool,
}

/// Internal bookkeeping for a live schedule.
#[derive(Debug, Clone, Copy)]
struct ScheduleEntry {
    schedule: Schedule,
    next_due: Option<Millis>,
}

/// The scheduler engine.
///
/// Decoupled from the event queue: it only calls the delegate, which keeps
/// it testable without a runtime.
pub struct Scheduler {
    schedules: heapless::Vec<ScheduleEntry, MAX_SCHEDULES>,
    enabled: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schedules: heapless::Vec::new(),
            enabled: true,
        }
    }

    /// Add a schedule.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule) -> Option<usize> {
        let slot = self.schedules.len();
        self.schedules
            .push(ScheduleEntry {
                schedule,
                next_due: None,
            })
            .ok()?;
        info!(
            "Scheduler: added {:?} every {}ms at slot {}",
            schedule.task, schedule.interval_ms, slot
        );
        Some(slot)
    }

    /// Enable or disable the entire scheduler.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Fire every schedule whose deadline has passed.
    ///
    /// A schedule that fell behind by several periods fires once, not once
    /// per missed period; its next deadline is re-anchored on `now`.
    pub fn poll(&mut self, now: Millis, delegate: &mut dyn SchedulerDelegate) {
        if !self.enabled {
            return;
        }

        for entry in &mut self.schedules {
            let schedule = entry.schedule;
            let due = *entry.next_due.get_or_insert(if schedule.immediate {
                now
            } else {
                now + schedule.interval_ms
            });
            if now >= due {
                delegate.on_schedule_fired(schedule.task);
                let next = due + schedule.interval_ms;
                entry.next_due = Some(if next <= now {
                    now + schedule.interval_ms
                } else {
                    next
                });
            }
        }
    }

    /// Earliest pending deadline, used by the runtime to size its sleep.
    pub fn next_deadline(&self) -> Option<Millis> {
        if !self.enabled {
            return None;
        }
        self.schedules.iter().filter_map(|e| e.next_due).min()
    }

    /// Number of registered schedules.
    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
