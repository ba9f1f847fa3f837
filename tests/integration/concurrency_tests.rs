//! Two drivers sharing one mux from separate threads.
//!
//! Both devices answer at 0x44 but hang off different channels of mux
//! 0x70, and each thread uses its own register.  If another thread could
//! re-point the mux between "select channel" and "transact", the access
//! would land on the other device: a read of a register nobody wrote
//! there, or a value the thread did not write.

use std::thread;

use devicebus::error::BusError;
use devicebus::{Backend, BusAddress, BusSet, RetryPolicy};

const ROUNDS: u16 = 200;

#[test]
fn two_channels_of_one_mux_never_collide() {
    let mut set = BusSet::new(Backend::Simulated, RetryPolicy::disabled());
    let left = set
        .client("left", BusAddress::behind_mux(1, 0x44, 0x70, 0).unwrap())
        .unwrap();
    let right = set
        .client("right", BusAddress::behind_mux(1, 0x44, 0x70, 1).unwrap())
        .unwrap();

    let workers: Vec<_> = [(left, 0x10u16), (right, 0x20u16)]
        .into_iter()
        .map(|(mut client, register)| {
            thread::spawn(move || -> Result<(), BusError> {
                for i in 0..ROUNDS {
                    let value = i % 256;
                    client.write_register(register, value)?;
                    let back = client.read_register(register)?;
                    assert_eq!(u16::from(back), value, "{}", client.name());
                }
                Ok(())
            })
        })
        .collect();

    for worker in workers {
        let result = worker.join().expect("worker panicked");
        assert!(result.is_ok(), "interleaved access: {result:?}");
    }

    let sim = set.simulator(1).unwrap();
    let mux_writes = sim
        .history()
        .iter()
        .filter(|t| t.address() == 0x70)
        .count();
    // One select per transaction, plus the two verification reads.
    assert_eq!(mux_writes, 2 + 2 * 2 * ROUNDS as usize);
}

#[test]
fn clients_from_many_threads_share_one_bus() {
    let mut set = BusSet::new(Backend::Simulated, RetryPolicy::disabled());
    let clients: Vec<_> = (0..8u8)
        .map(|ch| {
            set.client(
                format!("ch{ch}"),
                BusAddress::behind_mux(4, 0x40, 0x70, ch).unwrap(),
            )
            .unwrap()
        })
        .collect();
    assert_eq!(clients[0].bus().clients().len(), 8);

    let handles: Vec<_> = clients
        .into_iter()
        .enumerate()
        .map(|(ch, mut c)| {
            thread::spawn(move || {
                for _ in 0..50 {
                    c.write_register(0x00, ch as u16).unwrap();
                    assert_eq!(c.read_register(0x00).unwrap(), ch as u8);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // Every client dropped with its thread.
    assert!(set.bus(4).unwrap().clients().is_empty());
}
