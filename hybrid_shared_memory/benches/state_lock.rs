//! Lock round-trip and channel codec benchmarks

use criterion::{Criterion, criterion_group, criterion_main};
use hybrid_common::config::IpcConfig;
use hybrid_common::protocol::{Command, Message, Request};
use hybrid_common::state::SystemState;
use hybrid_shared_memory::{Channel, LocalChannel, PosixIpc, SharedState};
use std::hint::black_box;

/// Acquire, write one field, release.
fn bench_acquire_write(c: &mut Criterion) {
    let ipc = IpcConfig::with_suffix(&format!("bench_{}", std::process::id()));
    let state = SharedState::create(&PosixIpc, &ipc, SystemState::new()).unwrap();

    c.bench_function("state_acquire_write_release", |b| {
        b.iter(|| {
            let mut guard = state.acquire().unwrap();
            guard.tick = black_box(guard.tick + 1);
        });
    });

    c.bench_function("state_snapshot", |b| {
        b.iter(|| black_box(state.snapshot().unwrap()));
    });
}

/// Encode + enqueue + dequeue + decode through the in-process channel.
fn bench_local_channel(c: &mut Criterion) {
    let channel = LocalChannel::new();
    let request = Message::Request(Request::new(Command::SetPower).with_power(0.5));

    c.bench_function("local_channel_send_receive", |b| {
        b.iter(|| {
            channel.send(black_box(&request)).unwrap();
            black_box(channel.receive().unwrap());
        });
    });
}

criterion_group!(benches, bench_acquire_write, bench_local_channel);
criterion_main!(benches);
