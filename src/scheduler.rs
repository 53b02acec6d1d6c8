use embassy_time::{Duration, Ticker};
use log::{debug, info};

pub enum SchedulerState {
    Stopped,
    Running { ticker: Ticker },
}

/// Drives the telemetry/brew tick cadence while the hub session is up
pub struct Scheduler {
    interval: Duration,
    state: SchedulerState,
    timers_started: u32,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: SchedulerState::Stopped,
            timers_started: 0,
        }
    }

    /// Stopped -> Running. Returns false when a timer is already active.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            debug!("Scheduler already running");
            return false;
        }

        info!("Starting periodic scheduler every {}ms", self.interval.as_millis());
        self.state = SchedulerState::Running {
            ticker: Ticker::every(self.interval),
        };
        self.timers_started += 1;
        true
    }

    /// Running -> Stopped. Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        match self.state {
            SchedulerState::Stopped => false,
            SchedulerState::Running { .. } => {
                info!("Stopping periodic scheduler");
                self.state = SchedulerState::Stopped;
                true
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running { .. })
    }

    /// Number of timers created over the scheduler's lifetime
    pub fn timers_started(&self) -> u32 {
        self.timers_started
    }

    /// Resolves on the next tick; never resolves while stopped
    pub async fn next_tick(&mut self) {
        match &mut self.state {
            SchedulerState::Running { ticker } => ticker.next().await,
            SchedulerState::Stopped => core::future::pending::<()>().await,
        }
    }
}
