// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Host tests for locator + transition engine against the in-memory bus
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 6 integration tests + 1 property test
//!
//! TEST_SCENARIOS:
//!   - suspend_then_resume_round_trip(): status returns to Active, flags untouched
//!   - resume_of_active_domain_is_idempotent(): re-running resume still succeeds
//!   - not_found_attempts_no_flag_mutation(): lookup failure never reaches the engine
//!   - other_status_is_driven_to_terminal_state(): Other -> Suspended, Other -> Active
//!   - concurrent_resumes_restore_shared_domain_flag(): per-domain serialization
//!   - sibling_units_transition_independently(): only the target domain moves
//!   - flags_restored_for_every_outcome(): property over flags, faults and directions

use std::sync::Arc;
use std::thread;

use devpm::host::{EBUSY, EIO, EPERM};
use devpm::{
    DeviceBus, DeviceId, Direction, Error, HostBus, Locator, PolicyFlag, RuntimeStatus,
    TransitionEngine, UnitConfig,
};
use proptest::prelude::*;

struct Fixture {
    bus: Arc<HostBus>,
    locator: Locator,
    engine: TransitionEngine,
    host: DeviceId,
    unit: DeviceId,
}

fn fixture(host_ignores_children: bool, unit: UnitConfig) -> Fixture {
    let bus = Arc::new(HostBus::new("scsi"));
    let host = bus.add_host("host0", host_ignores_children);
    let unit = bus.add_unit(host, unit);
    bus.add_disk(unit, "sda");
    Fixture {
        locator: Locator::new(bus.clone()),
        engine: TransitionEngine::new(bus.clone()),
        bus,
        host,
        unit,
    }
}

impl Fixture {
    fn run(&self, name: &str, direction: Direction) -> devpm::Result<()> {
        let device = self.locator.find(name)?;
        self.engine.transition(&device, direction)
    }

    fn flags(&self) -> (bool, bool) {
        (
            self.bus.flag(self.unit, PolicyFlag::ManageStartStop),
            self.bus.flag(self.host, PolicyFlag::IgnoreChildren),
        )
    }
}

#[test]
fn suspend_then_resume_round_trip() {
    let fx = fixture(false, UnitConfig::new("0:0:0:0"));
    let before = fx.flags();

    fx.run("sda", Direction::Suspend).expect("suspend");
    assert_eq!(fx.bus.runtime_status(fx.unit), RuntimeStatus::Suspended);
    assert_eq!(fx.flags(), before);

    fx.run("sda", Direction::Resume).expect("resume");
    assert_eq!(fx.bus.runtime_status(fx.unit), RuntimeStatus::Active);
    assert_eq!(fx.flags(), before);
}

#[test]
fn resume_of_active_domain_is_idempotent() {
    let fx = fixture(true, UnitConfig::new("0:0:0:0").manage_start_stop(true));
    fx.run("sda", Direction::Resume).expect("first resume");
    fx.run("sda", Direction::Resume).expect("second resume");
    assert_eq!(fx.bus.runtime_status(fx.unit), RuntimeStatus::Active);
    assert_eq!(fx.bus.transitions(fx.unit), 2);
    assert_eq!(fx.flags(), (true, true));
}

#[test]
fn not_found_attempts_no_flag_mutation() {
    let fx = fixture(false, UnitConfig::new("0:0:0:0"));
    let err = fx.run("zzz", Direction::Suspend).unwrap_err();
    assert_eq!(err, Error::NotFound { name: "zzz".into() });
    assert!(fx.bus.flag_writes().is_empty());
    assert_eq!(fx.bus.transitions(fx.unit), 0);
}

#[test]
fn other_status_is_driven_to_terminal_state() {
    let fx = fixture(false, UnitConfig::new("0:0:0:0").status(RuntimeStatus::Other));
    fx.run("sda", Direction::Suspend).expect("suspend from other");
    assert_eq!(fx.bus.runtime_status(fx.unit), RuntimeStatus::Suspended);

    let fx = fixture(false, UnitConfig::new("0:0:0:0").status(RuntimeStatus::Other));
    fx.run("sda", Direction::Resume).expect("resume from other");
    assert_eq!(fx.bus.runtime_status(fx.unit), RuntimeStatus::Active);
}

#[test]
fn concurrent_resumes_restore_shared_domain_flag() {
    let bus = Arc::new(HostBus::new("scsi"));
    let host = bus.add_host("host0", false);
    let names: Vec<String> = (0..4).map(|i| format!("sd{}", (b'a' + i) as char)).collect();
    for (i, name) in names.iter().enumerate() {
        let unit = bus.add_unit(host, UnitConfig::new(format!("0:0:{i}:0")));
        bus.add_disk(unit, name);
    }
    let engine = Arc::new(TransitionEngine::new(bus.clone()));
    let locator = Arc::new(Locator::new(bus.clone()));

    let workers: Vec<_> = names
        .into_iter()
        .map(|name| {
            let engine = engine.clone();
            let locator = locator.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let device = locator.find(&name).expect("device present");
                    engine.suspend(&device).expect("suspend");
                    engine.resume(&device).expect("resume");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker finished");
    }

    assert!(!bus.flag(host, PolicyFlag::IgnoreChildren));
    for unit in bus.top_level() {
        assert!(!bus.flag(unit, PolicyFlag::ManageStartStop));
        assert_eq!(bus.runtime_status(unit), RuntimeStatus::Active);
    }
}

#[test]
fn sibling_units_transition_independently() {
    let bus = Arc::new(HostBus::new("scsi"));
    let host = bus.add_host("host0", false);
    let first = bus.add_unit(host, UnitConfig::new("0:0:0:0"));
    let second = bus.add_unit(host, UnitConfig::new("0:0:1:0"));
    bus.add_disk(first, "sda");
    bus.add_disk(second, "sdb");
    let locator = Locator::new(bus.clone());
    let engine = TransitionEngine::new(bus.clone());

    engine.suspend(&locator.find("sdb").unwrap()).unwrap();
    assert_eq!(bus.runtime_status(first), RuntimeStatus::Active);
    assert_eq!(bus.runtime_status(second), RuntimeStatus::Suspended);
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    None,
    Fail(i32),
    Pinned,
    NoView,
}

fn fault() -> impl Strategy<Value = Fault> {
    prop_oneof![
        Just(Fault::None),
        prop_oneof![Just(EIO), Just(EBUSY), Just(EPERM)].prop_map(Fault::Fail),
        Just(Fault::Pinned),
        Just(Fault::NoView),
    ]
}

fn status() -> impl Strategy<Value = RuntimeStatus> {
    prop_oneof![
        Just(RuntimeStatus::Active),
        Just(RuntimeStatus::Suspended),
        Just(RuntimeStatus::Other),
    ]
}

proptest! {
    #[test]
    fn flags_restored_for_every_outcome(
        manage_start_stop in any::<bool>(),
        ignore_children in any::<bool>(),
        initial in status(),
        fault in fault(),
        resume in any::<bool>(),
    ) {
        let unit = UnitConfig::new("0:0:0:0")
            .manage_start_stop(manage_start_stop)
            .status(initial)
            .storage(!matches!(fault, Fault::NoView));
        let fx = fixture(ignore_children, unit);
        match fault {
            Fault::Fail(code) => fx.bus.fail_next(fx.unit, code),
            Fault::Pinned => fx.bus.pin_status(fx.unit, true),
            Fault::None | Fault::NoView => {}
        }
        let direction = if resume { Direction::Resume } else { Direction::Suspend };

        let result = fx.run("sda", direction);

        prop_assert_eq!(fx.flags(), (manage_start_stop, ignore_children));
        match fault {
            Fault::None => {
                prop_assert!(result.is_ok());
                prop_assert_eq!(fx.bus.runtime_status(fx.unit), direction.expected_status());
            }
            Fault::Fail(code) => {
                prop_assert_eq!(result, Err(Error::TransitionFailed { direction, code }));
                prop_assert_eq!(fx.bus.runtime_status(fx.unit), initial);
            }
            Fault::Pinned => {
                if initial == direction.expected_status() {
                    prop_assert!(result.is_ok());
                } else {
                    let is_verification_failure =
                        matches!(result, Err(Error::VerificationFailed { .. }));
                    prop_assert!(is_verification_failure);
                }
            }
            Fault::NoView => {
                prop_assert_eq!(result, Err(Error::NotSupported { name: "sda".into() }));
            }
        }
    }
}
