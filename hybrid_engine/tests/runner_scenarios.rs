//! ModuleRunner against a real shared-state segment and an in-process
//! channel. The test holds a clone of the channel and plays the VMU.

use hybrid_common::config::{EvConfig, IecConfig, IpcConfig};
use hybrid_common::cycle::TickBudget;
use hybrid_common::lifecycle::Lifecycle;
use hybrid_common::protocol::{Command, EngineState, Message, Reply, Request};
use hybrid_common::state::SystemState;
use hybrid_engine::{Engine, EvEngine, IecEngine, ModuleRunner, StepOutcome};
use hybrid_shared_memory::{Channel, LocalChannel, PosixIpc, SharedState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const SECOND: Duration = Duration::from_secs(1);

fn unique_ipc() -> IpcConfig {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    IpcConfig::with_suffix(&format!("runner_{}_{n}", std::process::id()))
}

fn shared(battery: f64, fuel: f64) -> SharedState {
    let mut initial = SystemState::new();
    initial.battery_level = battery;
    initial.fuel_level = fuel;
    SharedState::create(&PosixIpc, &unique_ipc(), initial).unwrap()
}

fn spawn<E: Engine>(
    engine: E,
    state: SharedState,
    lifecycle: &Lifecycle,
) -> (ModuleRunner<'_, E, LocalChannel>, LocalChannel) {
    let channel = LocalChannel::new();
    let vmu = channel.clone();
    let runner =
        ModuleRunner::new(engine, state, channel, lifecycle, TickBudget::from_millis(20)).unwrap();
    (runner, vmu)
}

fn spawn_iec(lifecycle: &Lifecycle) -> (ModuleRunner<'_, IecEngine, LocalChannel>, LocalChannel) {
    spawn(IecEngine::new(IecConfig::default()), shared(63.0, 20.0), lifecycle)
}

/// Send `request`, run one step, collect the reply.
fn exchange<E: Engine>(
    runner: &mut ModuleRunner<'_, E, LocalChannel>,
    vmu: &LocalChannel,
    request: Request,
    dt: Duration,
) -> Reply {
    vmu.send(&Message::Request(request)).unwrap();
    runner.step(dt).unwrap();
    match vmu.receive().unwrap() {
        Some(Message::Reply(reply)) => reply,
        other => panic!("expected a reply, got {other:?}"),
    }
}

#[test]
fn runner_seeds_energy_from_shared_state() {
    let lifecycle = Lifecycle::new();
    let (runner, _vmu) = spawn(EvEngine::new(EvConfig::default()), shared(63.0, 20.0), &lifecycle);
    assert_eq!(runner.engine().battery(), 63.0);

    let (runner, _vmu) = spawn_iec(&lifecycle);
    assert_eq!(runner.engine().fuel(), 20.0);
}

#[test]
fn half_power_drains_battery_linearly_for_ten_ticks() {
    let lifecycle = Lifecycle::new();
    let config = EvConfig {
        rpm_slew: 1.0e9,
        ..EvConfig::default()
    };
    let drain = config.drain_per_sec;
    let (mut runner, vmu) = spawn(EvEngine::new(config), shared(50.0, 45.0), &lifecycle);

    let reply = exchange(&mut runner, &vmu, Request::new(Command::Start).with_power(0.5), Duration::ZERO);
    assert_eq!(reply.state, EngineState::Active);
    assert_eq!(runner.state().snapshot().unwrap().battery_level, 50.0);

    for _ in 0..10 {
        let reply = exchange(
            &mut runner,
            &vmu,
            Request::new(Command::SetPower).with_power(0.5).with_inputs(40.0, true),
            SECOND,
        );
        assert_eq!(reply.rpm, 5_000.0);
    }

    let state = runner.state().snapshot().unwrap();
    let expected = (50.0 - 10.0 * 0.5 * drain).max(0.0);
    assert!((state.battery_level - expected).abs() < 1e-9, "battery {}", state.battery_level);
    assert_eq!(state.rpm_ev, 5_000.0);
    assert_eq!(state.ev_power, 0.5);
    assert!(state.ev_active());
}

#[test]
fn active_flag_follows_rpm_not_engine_state() {
    let lifecycle = Lifecycle::new();
    let (mut runner, vmu) = spawn(EvEngine::new(EvConfig::default()), shared(80.0, 45.0), &lifecycle);

    let reply = exchange(&mut runner, &vmu, Request::new(Command::Start).with_power(0.4).with_inputs(20.0, true), SECOND);
    assert!(reply.rpm > 0.0);
    assert!(runner.state().snapshot().unwrap().ev_active());

    for _ in 0..3 {
        let reply = exchange(
            &mut runner,
            &vmu,
            Request::new(Command::SetPower).with_power(0.0).with_inputs(60.0, false),
            SECOND,
        );
        assert_eq!(reply.state, EngineState::Active);
        let state = runner.state().snapshot().unwrap();
        assert_eq!(state.ev_active(), state.rpm_ev > 0.0, "rpm {}", state.rpm_ev);
    }

    let state = runner.state().snapshot().unwrap();
    assert_eq!(state.rpm_ev, 0.0);
    assert!(!state.ev_active());
}

#[test]
fn start_on_empty_battery_stays_idle_and_reports_depletion() {
    let lifecycle = Lifecycle::new();
    let (mut runner, vmu) = spawn(EvEngine::new(EvConfig::default()), shared(0.0, 45.0), &lifecycle);

    let reply = exchange(&mut runner, &vmu, Request::new(Command::Start).with_power(1.0).with_inputs(0.0, true), SECOND);
    assert_eq!(reply.command, Command::Start);
    assert_eq!(reply.state, EngineState::Idle);
    assert_eq!(reply.rpm, 0.0);
    assert!(reply.diagnostic.contains("depleted"), "{}", reply.diagnostic);

    let state = runner.state().snapshot().unwrap();
    assert_eq!(state.rpm_ev, 0.0);
    assert!(!state.ev_active());
}

#[test]
fn unknown_command_leaves_shared_record_untouched() {
    let lifecycle = Lifecycle::new();
    let (mut runner, vmu) = spawn(EvEngine::new(EvConfig::default()), shared(72.0, 45.0), &lifecycle);

    exchange(&mut runner, &vmu, Request::new(Command::Start).with_power(0.4).with_inputs(30.0, true), SECOND);
    let before = runner.state().snapshot().unwrap();

    let reply = exchange(
        &mut runner,
        &vmu,
        Request::new(Command::Unknown(999)).with_power(1.0).with_inputs(150.0, false),
        Duration::ZERO,
    );
    assert_eq!(reply.command, Command::Unknown(999));
    assert_eq!(reply.state, EngineState::Active);
    assert_eq!(runner.state().snapshot().unwrap(), before);
}

#[test]
fn end_stops_the_lifecycle_and_all_further_writes() {
    let lifecycle = Lifecycle::new();
    let (mut runner, vmu) = spawn_iec(&lifecycle);

    exchange(&mut runner, &vmu, Request::new(Command::Start).with_power(0.8).with_inputs(50.0, true), SECOND);
    vmu.send(&Message::Request(Request::new(Command::End))).unwrap();
    assert_eq!(runner.step(SECOND).unwrap(), StepOutcome::Finished);
    assert!(runner.is_finished());
    assert!(!lifecycle.is_running());

    match vmu.receive().unwrap() {
        Some(Message::Reply(reply)) => assert_eq!(reply.state, EngineState::Shutdown),
        other => panic!("expected END reply, got {other:?}"),
    }
    let state = runner.state().snapshot().unwrap();
    assert!(!state.iec_active());
    assert_eq!(state.rpm_iec, 0.0);

    {
        let mut guard = runner.state().acquire().unwrap();
        guard.rpm_iec = 999.0;
    }
    let late = Message::Request(Request::new(Command::Start).with_power(1.0));
    vmu.send(&late).unwrap();
    assert_eq!(runner.step(SECOND).unwrap(), StepOutcome::Finished);
    assert_eq!(runner.state().snapshot().unwrap().rpm_iec, 999.0);
    assert_eq!(vmu.receive().unwrap(), Some(late));
}

#[test]
fn uncollected_reply_is_put_back_for_the_vmu() {
    let lifecycle = Lifecycle::new();
    let (mut runner, vmu) = spawn(EvEngine::new(EvConfig::default()), shared(90.0, 45.0), &lifecycle);

    vmu.send(&Message::Request(Request::new(Command::Start).with_power(0.2))).unwrap();
    assert_eq!(runner.step(SECOND).unwrap(), StepOutcome::Handled(Command::Start));
    assert_eq!(runner.step(SECOND).unwrap(), StepOutcome::NoRequest);
    assert_eq!(vmu.len(), 1);

    match vmu.receive().unwrap() {
        Some(Message::Reply(reply)) => {
            assert_eq!(reply.command, Command::Start);
            assert_eq!(reply.state, EngineState::Active);
        }
        other => panic!("expected the START reply, got {other:?}"),
    }
}

#[test]
fn physics_advances_without_requests() {
    let lifecycle = Lifecycle::new();
    let (mut runner, vmu) = spawn(EvEngine::new(EvConfig::default()), shared(90.0, 45.0), &lifecycle);

    exchange(&mut runner, &vmu, Request::new(Command::Start).with_power(1.0).with_inputs(20.0, true), SECOND);
    let first = runner.state().snapshot().unwrap().rpm_ev;
    assert_eq!(runner.step(SECOND).unwrap(), StepOutcome::NoRequest);
    let second = runner.state().snapshot().unwrap().rpm_ev;
    assert!(second > first, "{first} -> {second}");
}

#[test]
fn shutdown_is_repeatable() {
    let lifecycle = Lifecycle::new();
    let (mut runner, vmu) = spawn(EvEngine::new(EvConfig::default()), shared(90.0, 45.0), &lifecycle);
    runner.shutdown();
    runner.shutdown();
    assert!(!runner.state().is_initialized());
    assert!(vmu.send(&Message::Request(Request::new(Command::Stop))).is_err());
}
