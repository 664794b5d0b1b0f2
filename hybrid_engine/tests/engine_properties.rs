//! Randomised command sequences: energy levels stay within bounds, RPM never
//! exceeds the configured maximum and a STOP always coasts to a standstill.

use hybrid_common::config::{EvConfig, IecConfig};
use hybrid_common::consts::{BATTERY_MAX, BATTERY_MIN};
use hybrid_common::protocol::{Command, EngineState, Request};
use hybrid_engine::{Engine, EvEngine, IecEngine};
use proptest::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Step {
    request: Request,
    dt: Duration,
}

fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        4 => Just(Command::Start),
        4 => Just(Command::SetPower),
        3 => Just(Command::Stop),
        1 => Just(Command::End),
        1 => (4u32..1000).prop_map(Command::Unknown),
    ]
}

fn step() -> impl Strategy<Value = Step> {
    (command(), -0.5f64..1.5, 0.0f64..250.0, any::<bool>(), 0u64..5_000).prop_map(
        |(command, power, velocity, accelerator, dt_ms)| Step {
            request: Request::new(command).with_power(power).with_inputs(velocity, accelerator),
            dt: Duration::from_millis(dt_ms),
        },
    )
}

fn drive<E: Engine>(engine: &mut E, steps: &[Step], mut check: impl FnMut(&E)) {
    for step in steps {
        engine.handle(&step.request);
        engine.tick(step.dt);
        check(engine);
    }
}

fn stop_and_settle<E: Engine>(engine: &mut E) {
    engine.handle(&Request::new(Command::Stop));
    for _ in 0..10 {
        engine.tick(Duration::from_secs(1));
    }
}

proptest! {
    #[test]
    fn ev_battery_and_rpm_stay_bounded(
        start in 0.0f64..=100.0,
        steps in prop::collection::vec(step(), 1..60),
    ) {
        let config = EvConfig::default();
        let max_rpm = config.max_rpm;
        let mut ev = EvEngine::new(config).with_battery(start);
        drive(&mut ev, &steps, |ev| {
            assert!(ev.battery() >= BATTERY_MIN && ev.battery() <= BATTERY_MAX, "battery {}", ev.battery());
            assert!(ev.rpm() >= 0.0 && ev.rpm() <= max_rpm, "rpm {}", ev.rpm());
            if ev.engine_state() == EngineState::Idle {
                assert_eq!(ev.rpm(), 0.0);
            }
        });

        stop_and_settle(&mut ev);
        prop_assert_eq!(ev.rpm(), 0.0);
        prop_assert_ne!(ev.engine_state(), EngineState::Active);
    }

    #[test]
    fn iec_fuel_gear_and_rpm_stay_bounded(
        start in 0.0f64..=45.0,
        steps in prop::collection::vec(step(), 1..60),
    ) {
        let config = IecConfig::default();
        let (max_rpm, max_fuel, gears) = (config.max_rpm, config.max_fuel, config.gear_count());
        let mut iec = IecEngine::new(config).with_fuel(start);
        drive(&mut iec, &steps, |iec| {
            assert!(iec.fuel() >= 0.0 && iec.fuel() <= max_fuel, "fuel {}", iec.fuel());
            assert!(iec.rpm() >= 0.0 && iec.rpm() <= max_rpm, "rpm {}", iec.rpm());
            assert!(iec.gear() <= gears);
            if matches!(iec.engine_state(), EngineState::Idle | EngineState::Shutdown) {
                assert_eq!(iec.rpm(), 0.0);
                assert_eq!(iec.gear(), 0);
            }
        });

        stop_and_settle(&mut iec);
        prop_assert_eq!(iec.rpm(), 0.0);
        prop_assert_eq!(iec.gear(), 0);
        prop_assert_ne!(iec.engine_state(), EngineState::Active);
    }

    #[test]
    fn unknown_commands_never_change_the_engine(
        tag in 4u32..u32::MAX,
        power in -1.0f64..2.0,
    ) {
        let mut ev = EvEngine::new(EvConfig::default()).with_battery(40.0);
        ev.handle(&Request::new(Command::Start).with_power(0.3));
        ev.tick(Duration::from_secs(1));
        let before = ev.clone();

        ev.handle(&Request::new(Command::Unknown(tag)).with_power(power).with_inputs(99.0, false));
        prop_assert_eq!(ev.engine_state(), before.engine_state());
        prop_assert_eq!(ev.power(), before.power());
        prop_assert_eq!(ev.battery(), before.battery());
        prop_assert_eq!(ev.rpm(), before.rpm());
    }
}
