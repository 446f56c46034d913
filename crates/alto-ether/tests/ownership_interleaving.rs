// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Buffer ownership under arbitrary host/device interleavings: random
// single-threaded schedules on the ports and on a whole gateway, then a
// real device thread.

use alto_ether::codec::{decode, encode};
use alto_ether::device::sim::{simulated, Delivery};
use alto_ether::device::TimingDevice;
use alto_ether::iface::{split_ports, InterfaceLayout, Owner};
use alto_ether::{Direction, Error, Gateway, GatewayOptions, RelayConfig, Status, UdpRelay};
use std::collections::VecDeque;
use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn random_bytes(min: usize, max: usize) -> Vec<u8> {
    let len = fastrand::usize(min..max);
    (0..len).map(|_| fastrand::u8(..)).collect()
}

#[test]
fn test_random_schedules_keep_one_owner() {
    for seed in 0..25 {
        fastrand::seed(seed);
        let (host, mut pru) = simulated(InterfaceLayout::pru()).unwrap();
        let (mut rx, mut tx) = split_ports(Arc::clone(host.region()), host.layout()).unwrap();

        let mut delivered: VecDeque<Vec<u8>> = VecDeque::new();
        let mut committed: VecDeque<Vec<u8>> = VecDeque::new();
        let mut truncated = false;

        for step in 0..600 {
            match fastrand::u8(..4) {
                // Device: input shows up on the wire.
                0 => {
                    let durations = random_bytes(1, 64);
                    match pru.deliver_durations(&durations).unwrap() {
                        Delivery::Delivered => {
                            assert_eq!(rx.owner(), Owner::Host);
                            delivered.push_back(durations);
                        }
                        Delivery::Truncated => truncated = true,
                    }
                }
                // Host: service the receive buffer.
                1 => {
                    match rx.try_acquire() {
                        Some(mut grant) => {
                            let expected = delivered.pop_front().unwrap();
                            assert_eq!(grant.payload().unwrap(), expected.as_slice());
                            assert_eq!(grant.take_truncated(), truncated, "seed {seed} step {step}");
                            truncated = false;
                        }
                        None => assert!(delivered.is_empty()),
                    }
                    assert_eq!(rx.owner(), Owner::Device);
                }
                // Host: a datagram wants out.
                2 => {
                    let frame = random_bytes(2, 64);
                    match tx.try_acquire() {
                        Some(mut grant) => {
                            assert!(committed.is_empty());
                            grant.write(&frame).unwrap();
                            grant.commit();
                            committed.push_back(frame);
                        }
                        None => assert_eq!(committed.len(), 1),
                    }
                }
                // Device: send whatever was committed.
                _ => match pru.take_transmit().unwrap() {
                    Some(frame) => {
                        assert_eq!(Some(frame), committed.pop_front());
                        pru.complete_transmit(Status::OUTPUT_COMPLETE).unwrap();
                        assert_eq!(tx.poll_completion(), Some(Status::OUTPUT_COMPLETE));
                    }
                    None => assert!(committed.is_empty()),
                },
            }
            assert!(delivered.len() <= 1);
            assert!(committed.len() <= 1);
        }
    }
}

fn random_payload(max: usize) -> Vec<u8> {
    let mut payload = random_bytes(2, max);
    payload.truncate(payload.len() & !1);
    payload
}

#[test]
fn test_gateway_schedules_never_overwrite_a_transmit() {
    for seed in 0..10 {
        fastrand::seed(seed);
        let (host, mut pru) = simulated(InterfaceLayout::pru()).unwrap();
        let sink = UdpSocket::bind("127.0.0.1:0").unwrap();
        let relay = UdpRelay::bind(&RelayConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            destination: sink.local_addr().unwrap(),
        })
        .unwrap();
        let mut gateway = Gateway::new(host, relay, GatewayOptions::default()).unwrap();

        let mut pending: Option<Vec<u8>> = None;
        let mut completions = 0u64;
        let mut rejected = 0u64;

        for step in 0..400 {
            match fastrand::u8(..4) {
                // A datagram arrives from an emulator.
                0 => {
                    let payload = random_payload(64);
                    let mut datagram = ((payload.len() / 2) as u16).to_be_bytes().to_vec();
                    datagram.extend_from_slice(&payload);
                    let device_busy = pru.transmit_owner() == Owner::Device;
                    match gateway.handle_datagram(&datagram) {
                        Ok(()) => {
                            assert!(!device_busy, "seed {seed} step {step}");
                            pending = Some(encode(&payload).unwrap().into_bytes());
                        }
                        Err(Error::OwnershipViolation(Direction::Transmit)) => {
                            assert!(device_busy, "seed {seed} step {step}");
                            rejected += 1;
                        }
                        Err(e) => panic!("seed {seed} step {step}: {e}"),
                    }
                }
                // Device: send whatever was committed. Completion fails if
                // the window changed after the commit.
                1 => match pru.take_transmit().unwrap() {
                    Some(frame) => {
                        assert_eq!(Some(frame), pending.take());
                        pru.complete_transmit(Status::OUTPUT_COMPLETE).unwrap();
                        completions += 1;
                    }
                    None => assert!(pending.is_none()),
                },
                // Device: a frame shows up on the wire.
                2 => {
                    let frame = encode(&random_payload(32)).unwrap();
                    pru.deliver_frame(frame.as_bytes()).unwrap();
                }
                // Host: service the receive buffer.
                _ => {
                    gateway.handle_receive().unwrap();
                    assert_eq!(pru.receive_owner(), Owner::Device);
                }
            }

            let transmitted = gateway.stats().frames_transmitted;
            assert!(
                transmitted == completions || transmitted == completions + 1,
                "seed {seed} step {step}: {transmitted} sent, {completions} completed"
            );
        }
        assert_eq!(gateway.stats().datagrams_dropped, rejected);
        assert_eq!(gateway.stats().bad_frames, 0);
    }
}

#[test]
fn test_device_thread_echoes_every_frame() {
    let (host, pru) = simulated(InterfaceLayout::pru()).unwrap();
    let (mut rx, mut tx) = split_ports(Arc::clone(host.region()), host.layout()).unwrap();
    let loopback = pru.spawn_loopback().unwrap();

    for _ in 0..40 {
        let payload: Vec<u8> = random_bytes(0, 40);
        let payload = &payload[..payload.len() & !1];
        let frame = encode(payload).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(mut grant) = tx.try_acquire() {
                grant.write(frame.as_bytes()).unwrap();
                grant.commit();
                break;
            }
            assert!(Instant::now() < deadline, "transmit buffer never came back");
            thread::sleep(Duration::from_micros(100));
        }

        let echoed = loop {
            if let Some(grant) = rx.try_acquire() {
                break decode(grant.payload().unwrap()).unwrap();
            }
            assert!(Instant::now() < deadline, "echo never arrived");
            thread::sleep(Duration::from_micros(100));
        };
        assert_eq!(echoed, frame);
    }

    let report = loopback.stop();
    assert_eq!(report.transmitted, 40);
    assert_eq!(report.echoed, 40);
    assert_eq!(report.overwrites, 0);
    assert_eq!(report.errors, 0);
}
