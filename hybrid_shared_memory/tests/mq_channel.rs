//! POSIX message-queue channel: single-slot behaviour, direction flag,
//! non-blocking receive and idempotent close.

use hybrid_common::protocol::{Command, EngineState, Message, Reply, Request, diagnostic};
use hybrid_shared_memory::{Channel, ChannelError, MqChannel};
use std::sync::atomic::{AtomicUsize, Ordering};

fn unique_queue() -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("/hybrid_test_mq_{}_{n}", std::process::id())
}

fn reply() -> Message {
    Message::Reply(Reply {
        command: Command::Start,
        state: EngineState::Active,
        rpm: 1500.0,
        energy_level: 88.0,
        gear: 0,
        power_level: 0.4,
        diagnostic: diagnostic("EV started"),
    })
}

#[test]
fn empty_queue_returns_none() {
    let channel = MqChannel::create(&unique_queue()).unwrap();
    assert!(channel.receive().unwrap().is_none());
}

#[test]
fn second_record_is_rejected_as_full() {
    let channel = MqChannel::create(&unique_queue()).unwrap();
    let request = Message::Request(Request::new(Command::SetPower).with_power(0.7));
    channel.send(&request).unwrap();
    assert!(matches!(channel.send(&request), Err(ChannelError::Full)));
    assert_eq!(channel.receive().unwrap(), Some(request));
    assert!(channel.receive().unwrap().is_none());
}

#[test]
fn both_ends_share_records_in_both_directions() {
    let name = unique_queue();
    let vmu = MqChannel::create(&name).unwrap();
    let module = MqChannel::open(&name).unwrap();

    let request = Message::Request(Request::new(Command::Start).with_inputs(12.0, true));
    vmu.send(&request).unwrap();
    let received = module.receive().unwrap().unwrap();
    assert!(!received.is_reply());
    assert_eq!(received, request);

    module.send(&reply()).unwrap();
    let back = vmu.receive().unwrap().unwrap();
    assert!(back.is_reply());
    assert_eq!(back, reply());
}

#[test]
fn create_replaces_stale_queue_contents() {
    let name = unique_queue();
    let stale = MqChannel::create(&name).unwrap();
    stale.send(&reply()).unwrap();
    std::mem::forget(stale);

    let fresh = MqChannel::create(&name).unwrap();
    assert!(fresh.receive().unwrap().is_none());
}

#[test]
fn open_missing_queue_is_not_found() {
    assert!(matches!(
        MqChannel::open(&unique_queue()),
        Err(ChannelError::NotFound { .. })
    ));
}

#[test]
fn close_twice_then_use_reports_closed() {
    let name = unique_queue();
    let mut channel = MqChannel::create(&name).unwrap();
    channel.close();
    channel.close();
    assert!(!channel.is_open());
    assert!(matches!(channel.receive(), Err(ChannelError::Closed)));
    assert!(matches!(channel.send(&reply()), Err(ChannelError::Closed)));
    assert!(matches!(MqChannel::open(&name), Err(ChannelError::NotFound { .. })));
}
