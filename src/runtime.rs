//! Node runtime: the single serialized core loop.
//!
//! ```text
//!  ┌───────────┐  Scheduled(task)  ┌────────────┐   handle()   ┌──────────┐
//!  │ Scheduler │──────────────────▶│ EventQueue │─────────────▶│ NodeCore │
//!  └───────────┘                   └────────────┘              └──────────┘
//!              Inbound / Ack / TransportLost ▲
//!                    (transport I/O threads) │
//! ```
//!
//! The loop only suspends between events: waiting for the queue or for the
//! next scheduler deadline, whichever comes first.  Core handlers never
//! await.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

use log::info;

use crate::app::ports::{ClockPort, SchedulerDelegate};
use crate::diagnostics::NodeDiagnostics;
use crate::events::{Event, EventQueue, Task};
use crate::model::Millis;
use crate::scheduler::{Schedule, Scheduler};

/// Upper bound on a single sleep, so a shutdown request is noticed.
const MAX_IDLE_MS: Millis = 250;

/// A node service driven by the runtime.
pub trait NodeCore {
    /// Periodic tasks this node needs.
    fn schedules(&self) -> Vec<Schedule>;

    /// Called once before the first event.
    fn start(&mut self, now: Millis);

    /// Process one event to completion.
    fn handle(&mut self, event: Event, now: Millis);

    fn diagnostics_mut(&mut self) -> &mut NodeDiagnostics;
}

/// Scheduler delegate that turns due tasks into queued events.
pub struct QueueDelegate<'a> {
    queue: &'a EventQueue,
}

impl<'a> QueueDelegate<'a> {
    pub fn new(queue: &'a EventQueue) -> Self {
        Self { queue }
    }
}

impl SchedulerDelegate for QueueDelegate<'_> {
    fn on_schedule_fired(&mut self, task: Task) {
        self.queue.post(Event::Scheduled(task));
    }
}

/// Build the scheduler for a core's task set.
pub fn scheduler_for(core: &impl NodeCore) -> Scheduler {
    let mut scheduler = Scheduler::new();
    for schedule in core.schedules() {
        if scheduler.add(schedule).is_none() {
            log::warn!("RUNTIME: no schedule slot for {:?}", schedule.task);
        }
    }
    scheduler
}

/// Fire due schedules, then drain every queued event into the core.
///
/// Returns the number of events handled.
pub fn step(
    core: &mut impl NodeCore,
    scheduler: &mut Scheduler,
    queue: &EventQueue,
    clock: &impl ClockPort,
) -> usize {
    scheduler.poll(clock.now_ms(), &mut QueueDelegate::new(queue));
    let mut handled = 0;
    queue.drain(|event| {
        core.handle(event, clock.now_ms());
        handled += 1;
    });
    core.diagnostics_mut().queue_overflows = queue.overflows();
    handled
}

/// Run a node until `shutdown` is set.
pub async fn run_node(
    core: &mut impl NodeCore,
    queue: &EventQueue,
    clock: &impl ClockPort,
    shutdown: &AtomicBool,
) {
    let mut scheduler = scheduler_for(core);
    core.start(clock.now_ms());
    info!("RUNTIME: core loop started ({} schedules)", scheduler.len());

    while !shutdown.load(Ordering::Relaxed) {
        step(core, &mut scheduler, queue, clock);

        let now = clock.now_ms();
        let wait = scheduler
            .next_deadline()
            .map_or(MAX_IDLE_MS, |due| due.saturating_sub(now))
            .min(MAX_IDLE_MS);

        let woke = futures_lite::future::or(async { Some(queue.next().await) }, async {
            async_io_mini::Timer::after(Duration::from_millis(wait)).await;
            None
        })
        .await;

        if let Some(event) = woke {
            core.handle(event, clock.now_ms());
        }
    }

    info!("RUNTIME: core loop stopped");
}
