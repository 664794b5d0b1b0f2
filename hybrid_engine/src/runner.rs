//! Module control loop.
//!
//! One [`ModuleRunner::step`] is strictly sequential:
//! receive → handle → physics tick → acquire → publish → release → reply.
//! The lock is never held across a channel operation or a sleep, and at
//! most one reply is sent per request.

use crate::engine::Engine;
use crate::error::ModuleError;
use hybrid_common::consts::PAUSE_SLEEP_MS;
use hybrid_common::cycle::{CycleStats, TickBudget};
use hybrid_common::lifecycle::Lifecycle;
use hybrid_common::protocol::{Command, Message, Request};
use hybrid_shared_memory::{Channel, ChannelError, SharedState};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No request was waiting; physics still advanced.
    NoRequest,
    /// A request was handled and answered.
    Handled(Command),
    /// END was processed; this runner writes nothing further.
    Finished,
}

/// Drives one engine against the shared state and its channel.
pub struct ModuleRunner<'a, E: Engine, C: Channel> {
    engine: E,
    state: SharedState,
    channel: C,
    lifecycle: &'a Lifecycle,
    budget: TickBudget,
    stats: CycleStats,
    finished: bool,
}

impl<'a, E: Engine, C: Channel> ModuleRunner<'a, E, C> {
    /// Build a runner, seeding the engine's energy level from the shared record.
    pub fn new(
        mut engine: E,
        state: SharedState,
        channel: C,
        lifecycle: &'a Lifecycle,
        budget: TickBudget,
    ) -> Result<Self, ModuleError> {
        {
            let guard = state.acquire()?;
            engine.seed(&guard);
        }
        info!(
            module = %engine.kind(),
            period_ms = budget.period().as_millis() as u64,
            "module runner ready"
        );
        Ok(Self {
            engine,
            state,
            channel,
            lifecycle,
            budget,
            stats: CycleStats::new(),
            finished: false,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run one loop iteration with physics step `dt`.
    pub fn step(&mut self, dt: Duration) -> Result<StepOutcome, ModuleError> {
        if self.finished {
            return Ok(StepOutcome::Finished);
        }

        let request = self.poll()?;
        if let Some(request) = &request {
            debug!(module = %self.engine.kind(), command = %request.command, power = request.power_level, "request received");
            self.engine.handle(request);
        }
        self.engine.tick(dt);

        {
            let mut guard = self.state.acquire()?;
            self.engine.publish(&mut guard);
        }

        let Some(request) = request else {
            return Ok(StepOutcome::NoRequest);
        };

        let reply = self.engine.reply(request.command);
        match self.channel.send(&Message::Reply(reply)) {
            Ok(()) => {}
            Err(ChannelError::Full) => {
                warn!(module = %self.engine.kind(), "channel full, reply dropped");
            }
            Err(e) => return Err(e.into()),
        }

        if request.command == Command::End {
            self.finished = true;
            self.lifecycle.request_shutdown();
            info!(module = %self.engine.kind(), "END processed, leaving loop");
            return Ok(StepOutcome::Finished);
        }
        Ok(StepOutcome::Handled(request.command))
    }

    /// Take the next request, putting back a reply this module sent earlier.
    fn poll(&mut self) -> Result<Option<Request>, ModuleError> {
        match self.channel.receive() {
            Ok(Some(Message::Request(request))) => Ok(Some(request)),
            Ok(Some(reply @ Message::Reply(_))) => {
                // Our own reply, not yet collected by the VMU.
                if let Err(e) = self.channel.send(&reply) {
                    warn!(module = %self.engine.kind(), error = %e, "could not re-queue reply");
                }
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(ChannelError::Protocol(e)) => {
                warn!(module = %self.engine.kind(), error = %e, "discarding malformed record");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loop until the lifecycle stops running. Pausing skips all shared
    /// access and sleeps coarsely.
    pub fn run(&mut self) -> Result<(), ModuleError> {
        let mut last = Instant::now();
        while self.lifecycle.is_running() && !self.finished {
            if self.lifecycle.is_paused() {
                std::thread::sleep(Duration::from_millis(PAUSE_SLEEP_MS));
                last = Instant::now();
                continue;
            }

            let started = Instant::now();
            let dt = started.duration_since(last);
            last = started;

            self.step(dt)?;

            let elapsed = self.budget.sleep_remainder(started);
            self.stats.record(elapsed, &self.budget);
        }

        info!(
            module = %self.engine.kind(),
            cycles = self.stats.cycle_count,
            avg_us = self.stats.avg_cycle_ns() / 1_000,
            max_us = self.stats.max_cycle_ns / 1_000,
            overruns = self.stats.overruns,
            "module loop stopped"
        );
        Ok(())
    }

    /// Close the channel and release the shared state. Safe to repeat.
    pub fn shutdown(&mut self) {
        self.channel.close();
        self.state.destroy();
    }
}
