use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Callback invoked by a platform timer at a fixed period.
///
/// Runs in interrupt-like context: implementations must not block, allocate
/// or perform I/O.
pub trait TickHandler: Send + Sync {
    fn on_tick(&self);
}

/// Tick intervals driving the periodic flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSchedule {
    /// Ticks between poll-due events.
    pub poll_interval: u32,
    /// Ticks between heartbeat increments.
    pub heartbeat_interval: u32,
    /// Counter value that wraps back to zero.
    pub wrap: u32,
}

impl TickSchedule {
    fn normalized(self) -> Self {
        Self {
            poll_interval: self.poll_interval.max(1),
            heartbeat_interval: self.heartbeat_interval.max(1),
            wrap: self.wrap.max(1),
        }
    }
}

impl Default for TickSchedule {
    fn default() -> Self {
        Self {
            poll_interval: 10,
            heartbeat_interval: 1000,
            wrap: 3_600_000,
        }
    }
}

/// State shared between the tick context and the main loop.
///
/// The tick context is the only writer of the counters; the due flags are
/// armed by the tick context and cleared by the main loop when taken.
#[derive(Debug)]
pub struct TickState {
    schedule: TickSchedule,
    counter: AtomicU32,
    heartbeats: AtomicU32,
    poll_due: AtomicBool,
    heartbeat_due: AtomicBool,
}

impl TickState {
    pub fn new(schedule: TickSchedule) -> Self {
        Self {
            schedule: schedule.normalized(),
            counter: AtomicU32::new(0),
            heartbeats: AtomicU32::new(0),
            poll_due: AtomicBool::new(false),
            heartbeat_due: AtomicBool::new(false),
        }
    }

    pub fn schedule(&self) -> TickSchedule {
        self.schedule
    }

    /// Observe and clear the poll-due flag.
    pub fn take_poll_due(&self) -> bool {
        self.poll_due.swap(false, Ordering::AcqRel)
    }

    /// Observe and clear the heartbeat-due flag.
    pub fn take_heartbeat_due(&self) -> bool {
        self.heartbeat_due.swap(false, Ordering::AcqRel)
    }

    /// Current tick counter, in `0..wrap`.
    pub fn counter(&self) -> u32 {
        self.counter.load(Ordering::Acquire)
    }

    /// Heartbeat periods elapsed since the counter last wrapped.
    pub fn heartbeats(&self) -> u32 {
        self.heartbeats.load(Ordering::Acquire)
    }

    /// Return to the power-on state.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Release);
        self.heartbeats.store(0, Ordering::Release);
        self.poll_due.store(false, Ordering::Release);
        self.heartbeat_due.store(false, Ordering::Release);
    }
}

impl Default for TickState {
    fn default() -> Self {
        Self::new(TickSchedule::default())
    }
}

impl TickHandler for TickState {
    fn on_tick(&self) {
        let schedule = self.schedule;
        let next = match self.counter.load(Ordering::Relaxed) + 1 {
            n if n >= schedule.wrap => 0,
            n => n,
        };
        self.counter.store(next, Ordering::Release);

        if next % schedule.poll_interval == 0 {
            self.poll_due.store(true, Ordering::Release);
        }

        if next == 0 {
            self.heartbeats.store(0, Ordering::Release);
            self.heartbeat_due.store(true, Ordering::Release);
        } else if next % schedule.heartbeat_interval == 0 {
            self.heartbeats.fetch_add(1, Ordering::AcqRel);
            self.heartbeat_due.store(true, Ordering::Release);
        }
    }
}

/// Host stand-in for a hardware timer: calls a [`TickHandler`] from a
/// dedicated thread at a fixed period.
///
/// Missed periods are caught up back to back so the tick count tracks wall
/// time. Stops when dropped.
pub struct ThreadTicker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadTicker {
    pub fn spawn<H: TickHandler + 'static>(
        handler: Arc<H>,
        period: Duration,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = std::thread::Builder::new()
            .name("panelbridge-tick".to_string())
            .spawn(move || {
                let mut deadline = Instant::now() + period;
                while flag.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now < deadline {
                        std::thread::sleep(deadline - now);
                    }
                    handler.on_tick();
                    deadline += period;
                }
            })?;
        tracing::debug!(?period, "tick thread started");
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("tick thread panicked");
            }
        }
    }
}

impl Drop for ThreadTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
