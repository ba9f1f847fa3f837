//! Health tracking driven by real client outcomes.

use std::thread;

use devicebus::health::HealthConfig;
use devicebus::{Backend, BusAddress, BusSet, Health, RetryPolicy, SharedHealth};

fn one_shot_set() -> BusSet {
    BusSet::new(Backend::Simulated, RetryPolicy::disabled())
}

#[test]
fn guard_retries_until_the_device_answers() {
    let mut set = one_shot_set();
    let mut c = set.client("t6713", BusAddress::direct(1, 0x15).unwrap()).unwrap();
    let sim = set.simulator(1).unwrap();

    let mut health = Health::new(10, 50.0);
    for _ in 0..4 {
        health.report_success();
    }
    // [S, S, S, S, F, F] is still above 50%.
    sim.fail_next(0x15, 2);
    let bytes = health.guard(|| c.read(2)).unwrap();
    assert_eq!(bytes.len(), 2);
    assert_eq!(health.len(), 7);
    assert!((health.percent() - 500.0 / 7.0).abs() < 0.01);
}

#[test]
fn guard_gives_up_once_unhealthy() {
    let mut set = one_shot_set();
    let mut c = set.client("t6713", BusAddress::direct(1, 0x15).unwrap()).unwrap();
    let sim = set.simulator(1).unwrap();
    sim.clear_history();

    let mut health = Health::new(4, 50.0);
    health.report_success();
    sim.fail_next(0x15, u32::MAX);
    assert!(health.guard(|| c.read(1)).is_err());

    // [S, F] is still 50%; [S, F, F] drops under the minimum.
    assert_eq!(sim.history().len(), 2);
    assert!(!health.is_healthy());

    health.reset();
    assert!(health.is_healthy());
    assert_eq!(health.percent(), 100.0);
}

#[test]
fn configured_window_applies_to_every_tracker() {
    let mut config = devicebus::config::ControllerConfig {
        simulate: true,
        ..Default::default()
    };
    config.health = HealthConfig {
        window: 4,
        minimum_percent: 50.0,
    };
    let set = BusSet::from_config(&config);

    let mut h = set.health();
    h.report_success();
    for _ in 0..3 {
        h.report_failure();
    }
    assert_eq!(h.percent(), 25.0);
    assert!(!h.is_healthy());
}

#[test]
fn shared_tracker_collects_reports_from_threads() {
    let shared = SharedHealth::new(Health::new(64, 80.0));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let h = shared.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    if i == 0 {
                        h.report_failure();
                    } else {
                        h.report_success();
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(shared.percent(), 75.0);
    assert!(!shared.is_healthy());
}
