//! VMU tick.
//!
//! Each tick runs in a fixed order:
//!
//! 1. velocity from the previous velocity, both RPMs and `dt`
//! 2. driver pedal and drivetrain mode decision
//! 3. one request per module (EV then IEC)
//! 4. after a short grace period, poll EV then IEC and merge replies
//! 5. status line
//!
//! [`Orchestrator::run`] adds pacing and pause handling. The semaphore is
//! held only for the read/modify/write of the shared record, never across a
//! channel operation or a sleep.

use crate::driver::DriverModel;
use crate::dynamics::VehicleDynamics;
use crate::error::VmuError;
use crate::mode::{ModeController, ModeDecision};
use hybrid_common::consts::PAUSE_SLEEP_MS;
use hybrid_common::prelude::*;
use hybrid_shared_memory::{Channel, ChannelError, SharedState};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A module that leaves a request unanswered is reported every this many ticks.
const UNANSWERED_WARN_TICKS: u32 = 3;

fn unanswered_warning_due(ticks: u32) -> bool {
    ticks > 0 && ticks % UNANSWERED_WARN_TICKS == 0
}

/// The VMU's end of one module channel.
///
/// Only one record may be in flight: a new request is sent only after the
/// previous one has been answered.
#[derive(Debug)]
pub struct ModuleLink<C: Channel> {
    kind: ModuleKind,
    channel: C,
    awaiting_reply: bool,
    unanswered_ticks: u32,
    last_state: EngineState,
    last_reply: Option<Reply>,
}

impl<C: Channel> ModuleLink<C> {
    pub fn new(kind: ModuleKind, channel: C) -> Self {
        Self {
            kind,
            channel,
            awaiting_reply: false,
            unanswered_ticks: 0,
            last_state: EngineState::Idle,
            last_reply: None,
        }
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Engine state from the most recent reply; `Idle` before any.
    pub fn last_state(&self) -> EngineState {
        self.last_state
    }

    pub fn last_reply(&self) -> Option<&Reply> {
        self.last_reply.as_ref()
    }

    /// Command for this tick given the decided mode. A module that is
    /// neither wanted nor running gets `SET_POWER(0)` as a heartbeat.
    pub fn command_for(&self, decision: &ModeDecision) -> Command {
        let wanted = decision.wants(self.kind);
        let active = self.last_state == EngineState::Active;
        match (wanted, active) {
            (true, false) => Command::Start,
            (true, true) => Command::SetPower,
            (false, true) => Command::Stop,
            (false, false) => Command::SetPower,
        }
    }

    /// Send `request` unless the previous one is still unanswered.
    /// Returns whether it went out.
    pub fn send(&mut self, request: Request) -> Result<bool, ChannelError> {
        if self.awaiting_reply {
            self.unanswered_ticks += 1;
            if unanswered_warning_due(self.unanswered_ticks) {
                warn!(module = %self.kind, ticks = self.unanswered_ticks, "module not answering");
            } else {
                debug!(module = %self.kind, "previous request unanswered, skipping send");
            }
            return Ok(false);
        }
        match self.channel.send(&Message::Request(request)) {
            Ok(()) => {
                self.awaiting_reply = true;
                Ok(true)
            }
            Err(ChannelError::Full) => {
                warn!(module = %self.kind, "channel full, request dropped");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Collect a reply if one is waiting. Our own unclaimed request is put
    /// back for the module.
    pub fn poll(&mut self) -> Result<Option<Reply>, ChannelError> {
        match self.channel.receive() {
            Ok(Some(Message::Reply(reply))) => {
                self.awaiting_reply = false;
                self.unanswered_ticks = 0;
                self.last_state = reply.state;
                self.last_reply = Some(reply.clone());
                Ok(Some(reply))
            }
            Ok(Some(request @ Message::Request(_))) => {
                if let Err(e) = self.channel.send(&request) {
                    warn!(module = %self.kind, error = %e, "could not re-queue request");
                    self.awaiting_reply = false;
                }
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(ChannelError::Protocol(e)) => {
                warn!(module = %self.kind, error = %e, "discarding malformed record");
                self.awaiting_reply = false;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort END, displacing whatever occupies the slot.
    fn send_end(&mut self) {
        let end = Message::Request(Request::new(Command::End));
        for _ in 0..2 {
            match self.channel.send(&end) {
                Ok(()) => {
                    self.awaiting_reply = true;
                    return;
                }
                Err(ChannelError::Full) => {
                    if let Ok(Some(Message::Reply(reply))) = self.channel.receive() {
                        self.last_state = reply.state;
                    }
                }
                Err(e) => {
                    warn!(module = %self.kind, error = %e, "END not delivered");
                    return;
                }
            }
        }
        warn!(module = %self.kind, "END not delivered: channel busy");
    }

    fn close(&mut self) {
        self.channel.close();
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub decision: ModeDecision,
    pub accelerator: bool,
    /// Requests that went out this tick.
    pub sent: u8,
    /// Replies merged this tick.
    pub merged: u8,
    /// Shared record after the merge.
    pub state: SystemState,
}

pub struct Orchestrator<C: Channel> {
    config: VmuConfig,
    state: SharedState,
    ev: ModuleLink<C>,
    iec: ModuleLink<C>,
    dynamics: VehicleDynamics,
    driver: DriverModel,
    mode: ModeController,
    tick: u64,
    stats: CycleStats,
    shut_down: bool,
}

impl<C: Channel> Orchestrator<C> {
    pub fn new(config: &SystemConfig, state: SharedState, ev: C, iec: C) -> Self {
        let vmu = config.vmu.clone();
        Self {
            dynamics: VehicleDynamics::new(vmu.dynamics.clone(), config.ev.max_rpm, config.iec.max_rpm),
            driver: DriverModel::new(vmu.driver.clone()),
            mode: ModeController::new(vmu.mode.clone()),
            config: vmu,
            state,
            ev: ModuleLink::new(ModuleKind::Ev, ev),
            iec: ModuleLink::new(ModuleKind::Iec, iec),
            tick: 0,
            stats: CycleStats::new(),
            shut_down: false,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn link(&self, kind: ModuleKind) -> &ModuleLink<C> {
        match kind {
            ModuleKind::Ev => &self.ev,
            ModuleKind::Iec => &self.iec,
        }
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Run steps 1 to 5 once, `dt` after the previous tick.
    pub fn tick(&mut self, dt: Duration) -> Result<TickReport, VmuError> {
        self.tick += 1;

        // 1-2: dynamics and mode under one lock; no channel traffic yet.
        let (decision, accelerator, velocity) = {
            let mut guard = self.state.acquire()?;
            let velocity = self.dynamics.step(
                guard.velocity,
                guard.rpm_ev,
                guard.rpm_iec,
                self.driver.accelerator(),
                dt,
            );
            let accelerator = self.driver.update(velocity);
            let decision = self.mode.decide(velocity, guard.battery_level, guard.fuel_level, dt);
            guard.velocity = velocity;
            guard.set_accelerator(accelerator);
            guard.transition_factor = decision.transition_factor;
            guard.tick = self.tick;
            (decision, accelerator, velocity)
        };

        // 3
        let pedal = if accelerator { 1.0 } else { 0.0 };
        let mut sent = 0;
        for link in [&mut self.ev, &mut self.iec] {
            let command = link.command_for(&decision);
            let power = match command {
                Command::Start | Command::SetPower => decision.share(link.kind()) * pedal,
                _ => 0.0,
            };
            let request = Request::new(command).with_power(power).with_inputs(velocity, accelerator);
            let kind = link.kind();
            if link
                .send(request)
                .map_err(|source| VmuError::Channel { module: kind.label(), source })?
            {
                debug!(module = %kind, %command, power, "request sent");
                sent += 1;
            }
        }

        // 4
        if self.config.reply_grace_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.config.reply_grace_ms));
        }
        let mut merged = 0;
        for link in [&mut self.ev, &mut self.iec] {
            let kind = link.kind();
            let reply = link
                .poll()
                .map_err(|source| VmuError::Channel { module: kind.label(), source })?;
            if let Some(reply) = reply {
                let mut guard = self.state.acquire()?;
                merge_reply(&mut guard, kind, &reply);
                merged += 1;
            }
        }

        // 5
        let state = self.state.snapshot()?;
        log_status(&state, &decision);

        Ok(TickReport {
            tick: self.tick,
            decision,
            accelerator,
            sent,
            merged,
            state,
        })
    }

    /// Tick until `lifecycle` stops or `max_ticks` have run, sleeping the
    /// remainder of each tick period.
    pub fn run(&mut self, lifecycle: &Lifecycle, max_ticks: Option<u64>) -> Result<(), VmuError> {
        let budget = TickBudget::new(self.config.tick_period());
        let mut last = Instant::now();
        let mut ran = 0u64;

        while lifecycle.is_running() {
            if max_ticks.is_some_and(|max| ran >= max) {
                info!(ticks = ran, "tick limit reached");
                break;
            }
            if lifecycle.is_paused() {
                std::thread::sleep(Duration::from_millis(PAUSE_SLEEP_MS));
                last = Instant::now();
                continue;
            }

            let started = Instant::now();
            let dt = started.duration_since(last);
            last = started;

            self.tick(dt)?;
            ran += 1;

            let elapsed = budget.sleep_remainder(started);
            self.stats.record(elapsed, &budget);
        }

        info!(
            ticks = self.stats.cycle_count,
            avg_ms = self.stats.avg_cycle_ns() / 1_000_000,
            max_ms = self.stats.max_cycle_ns / 1_000_000,
            overruns = self.stats.overruns,
            "VMU loop stopped"
        );
        Ok(())
    }

    /// Send END to both modules, give them time to answer, then release
    /// every resource. Only the first call has any effect.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.ev.send_end();
        self.iec.send_end();
        if self.config.shutdown_grace_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.config.shutdown_grace_ms));
        }
        for link in [&mut self.ev, &mut self.iec] {
            if let Ok(Some(reply)) = link.poll() {
                info!(module = %link.kind(), state = ?reply.state, "module acknowledged END");
            }
        }

        self.state.destroy();
        self.ev.close();
        self.iec.close();
        info!("VMU resources released");
    }
}

impl<C: Channel> Drop for Orchestrator<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Write a module's reported status into the shared record.
pub fn merge_reply(state: &mut SystemState, kind: ModuleKind, reply: &Reply) {
    let active = reply.rpm > 0.0;
    match kind {
        ModuleKind::Ev => {
            state.rpm_ev = reply.rpm;
            state.battery_level = reply.energy_level;
            state.ev_power = reply.power_level;
            state.set_ev_active(active);
        }
        ModuleKind::Iec => {
            state.rpm_iec = reply.rpm;
            state.fuel_level = reply.energy_level;
            state.gear = reply.gear;
            state.iec_power = reply.power_level;
            state.set_iec_active(active);
        }
    }
}

fn log_status(state: &SystemState, decision: &ModeDecision) {
    info!(
        tick = state.tick,
        velocity = format_args!("{:.1}", state.velocity),
        accelerator = state.accelerator(),
        mode = %decision.primary,
        factor = format_args!("{:.2}", state.transition_factor),
        ev = state.ev_active(),
        rpm_ev = format_args!("{:.0}", state.rpm_ev),
        battery = format_args!("{:.1}", state.battery_level),
        iec = state.iec_active(),
        rpm_iec = format_args!("{:.0}", state.rpm_iec),
        gear = state.gear,
        fuel = format_args!("{:.2}", state.fuel_level),
        "status"
    );
}
