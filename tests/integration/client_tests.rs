//! End-to-end client tests against the simulator.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use devicebus::error::{BusError, FaultKind, FaultKinds};
use devicebus::sim::{SimulatedBus, SimulatedPeripheral, Traffic};
use devicebus::{Backend, Bus, BusAddress, BusSet, Client, MuxRoute, RetryPolicy, Transaction};
use embedded_hal::delay::DelayNs;

/// Records requested sleeps instead of sleeping.  Clones share the log.
#[derive(Clone, Default)]
struct RecordingDelay(Arc<Mutex<Vec<Duration>>>);

impl RecordingDelay {
    fn sleeps(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.lock().unwrap().push(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        self.0.lock().unwrap().push(Duration::from_micros(u64::from(us)));
    }
}

fn simulated(index: u8) -> (Arc<Bus>, SimulatedBus) {
    let sim = SimulatedBus::new();
    (Bus::new(index, Box::new(sim.clone())), sim)
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn register_round_trip_behind_mux_through_bus_set() {
    let mut set = BusSet::new(Backend::Simulated, RetryPolicy::default());
    let mut client = set
        .client("sht25", BusAddress::behind_mux(2, 0x77, 0x70, 3).unwrap())
        .unwrap();

    client.write_register(0x01, 0x02).unwrap();
    assert_eq!(client.read_register(0x01).unwrap(), 0x02);
    assert_eq!(set.simulator(2).unwrap().mux().connection(0x70), Some(0x08));
}

#[test]
fn transient_faults_back_off_exponentially() {
    let (bus, sim) = simulated(1);
    sim.add_peripheral(SimulatedPeripheral::new(0x40));
    let delay = RecordingDelay::default();
    let mut c = Client::with_delay(
        "dac",
        bus,
        BusAddress::direct(1, 0x40).unwrap(),
        RetryPolicy::default(),
        Box::new(delay.clone()),
    )
    .unwrap();
    assert!(delay.sleeps().is_empty());

    sim.fail_next(0x40, 2);
    c.write(&[0x30, 0x0F, 0xFF]).unwrap();
    assert_eq!(delay.sleeps(), vec![ms(100), ms(200)]);
}

#[test]
fn exhausted_retries_return_the_original_error() {
    let (bus, sim) = simulated(1);
    sim.add_peripheral(SimulatedPeripheral::new(0x40));
    let delay = RecordingDelay::default();
    let mut c = Client::with_delay(
        "dac",
        bus,
        BusAddress::direct(1, 0x40).unwrap(),
        RetryPolicy::default(),
        Box::new(delay.clone()),
    )
    .unwrap();
    sim.clear_history();

    sim.fail_next(0x40, 100);
    let err = c.read(2).unwrap_err();
    assert!(matches!(err, BusError::Read(f) if f.address == 0x40));
    assert_eq!(delay.sleeps(), vec![ms(100), ms(200), ms(400), ms(800)]);
    assert_eq!(sim.history().len(), 5);
}

#[test]
fn kinds_outside_the_mask_are_not_retried() {
    let (bus, sim) = simulated(1);
    sim.add_peripheral(SimulatedPeripheral::new(0x40));
    let delay = RecordingDelay::default();
    let policy = RetryPolicy {
        kinds: FaultKinds::NONE.with(FaultKind::Read),
        ..RetryPolicy::default()
    };
    let mut c = Client::with_delay(
        "dac",
        bus,
        BusAddress::direct(1, 0x40).unwrap(),
        policy,
        Box::new(delay.clone()),
    )
    .unwrap();

    sim.fail_next(0x40, 1);
    assert!(matches!(c.write(&[1]), Err(BusError::Write(_))));
    assert!(delay.sleeps().is_empty());

    sim.fail_next(0x40, 1);
    c.read(1).unwrap();
    assert_eq!(delay.sleeps(), vec![ms(100)]);
}

#[test]
fn unset_register_is_a_read_error() {
    let (bus, sim) = simulated(1);
    sim.add_peripheral(SimulatedPeripheral::new(0x40).with_register(0x00, 0x11));
    let mut c = Client::with_delay(
        "ph",
        bus,
        BusAddress::direct(1, 0x40).unwrap(),
        RetryPolicy {
            tries: 2,
            ..RetryPolicy::default()
        },
        Box::new(RecordingDelay::default()),
    )
    .unwrap();

    assert_eq!(c.read_register(0x00).unwrap(), 0x11);
    let err = c.read_register(0x05).unwrap_err();
    assert!(matches!(err, BusError::Read(f) if f.register == Some(0x05)));
}

#[test]
fn wrong_channel_is_a_mux_error() {
    let (bus, sim) = simulated(1);
    sim.add_mux(0x70);
    sim.add_peripheral(SimulatedPeripheral::new(0x44).behind(MuxRoute::new(0x70, 2).unwrap()));

    // Configured for channel 5, but the device sits on channel 2.
    let err = Client::with_delay(
        "co2",
        bus,
        BusAddress::behind_mux(1, 0x44, 0x70, 5).unwrap(),
        RetryPolicy::disabled(),
        Box::new(RecordingDelay::default()),
    )
    .unwrap_err();
    let BusError::Initialization { cause, .. } = err else {
        panic!("expected initialization error");
    };
    assert!(matches!(*cause, BusError::Mux(f) if f.address == 0x44));
}

#[test]
fn request_response_protocol_via_canned_reply() {
    let (bus, sim) = simulated(1);
    sim.add_peripheral(
        SimulatedPeripheral::new(0x61).with_response(&[0x03, 0x00], &[0x01, 0xF4, 0x00]),
    );
    let mut c = Client::with_delay(
        "co2",
        bus,
        BusAddress::direct(1, 0x61).unwrap(),
        RetryPolicy::default(),
        Box::new(RecordingDelay::default()),
    )
    .unwrap();

    c.write(&[0x03, 0x00]).unwrap();
    assert_eq!(c.read(3).unwrap(), vec![0x01, 0xF4, 0x00]);
    // Exhausted buffer reads back zeros.
    assert_eq!(c.read(2).unwrap(), vec![0x00, 0x00]);
}

#[test]
fn one_shot_execute_skips_backoff() {
    let (bus, sim) = simulated(1);
    sim.add_peripheral(SimulatedPeripheral::new(0x40));
    let delay = RecordingDelay::default();
    let mut c = Client::with_delay(
        "dac",
        bus,
        BusAddress::direct(1, 0x40).unwrap(),
        RetryPolicy::default(),
        Box::new(delay.clone()),
    )
    .unwrap();
    delay.clear();
    sim.clear_history();

    sim.fail_next(0x40, 1);
    assert!(c.execute(&Transaction::Write(&[1]), false).is_err());
    assert!(delay.sleeps().is_empty());
    assert_eq!(
        sim.history(),
        vec![Traffic::Write {
            address: 0x40,
            bytes: vec![1]
        }]
    );
}

#[test]
fn zero_length_read_is_allowed() {
    let mut set = BusSet::new(Backend::Simulated, RetryPolicy::default());
    let mut c = set.client("x", BusAddress::direct(3, 0x20).unwrap()).unwrap();
    assert!(c.read(0).unwrap().is_empty());
}

#[test]
fn nine_muxes_on_one_bus_all_connect() {
    let mut set = BusSet::new(Backend::Simulated, RetryPolicy::disabled());
    let mut clients = Vec::new();
    for (i, mux) in (0x60..=0x68u8).enumerate() {
        let address = BusAddress::behind_mux(1, 0x40 + i as u8, mux, 0).unwrap();
        clients.push(set.client(format!("d{i}"), address).unwrap());
    }
    assert_eq!(clients[8].bus().mux_state().len(), 9);
    assert_eq!(set.simulator(1).unwrap().mux().connection(0x68), Some(0x01));

    clients[8].write_register(0x00, 0x5A).unwrap();
    assert_eq!(clients[8].read_register(0x00).unwrap(), 0x5A);
}
