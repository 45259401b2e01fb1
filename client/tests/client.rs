extern crate dhcp_client;
extern crate dhcp_protocol;
extern crate eui48;
extern crate routing_core;

use std::{net::Ipv4Addr, time::Duration};

use dhcp_client::*;
use dhcp_protocol::{
    HardwareType, Message, MessageType, OperationCode, Options, SIZE_MESSAGE_MINIMAL,
};
use eui48::MacAddress;
use routing_core::{Datagram, Destination, Outbox, Time};

const SERVER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const OFFERED: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
/// 2025-10-15 12:00:00 UTC
const START: u64 = 1_760_529_600;

#[derive(Default)]
struct RecordingScript {
    calls: Vec<Environment>,
    refuse: Vec<Reason>,
}

impl RecordingScript {
    fn reasons(&self) -> Vec<Reason> {
        self.calls.iter().map(Environment::reason).collect()
    }
}

impl Script for RecordingScript {
    fn run(&mut self, environment: &Environment) -> i32 {
        self.calls.push(environment.clone());
        if self.refuse.contains(&environment.reason()) {
            1
        } else {
            0
        }
    }
}

type TestClient = Client<Outbox, RecordingScript, MemoryLeaseDatabase>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mac() -> MacAddress {
    MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01])
}

fn config() -> Config {
    Config::default().with_rng_seed(42).with_hostname(Some("node".to_owned()))
}

fn client_with(config: Config, leases: Vec<Lease>, script: RecordingScript) -> TestClient {
    init_logger();
    Client::new(
        "eth0",
        mac(),
        config,
        Outbox::new(),
        script,
        MemoryLeaseDatabase::new(leases),
    )
}

fn at(seconds: u64) -> Time {
    Time::from_secs(START + seconds)
}

fn sent(client: &mut TestClient) -> Vec<(Datagram, Message)> {
    client
        .network_mut()
        .drain()
        .into_iter()
        .map(|datagram| {
            let message = Message::from_bytes(&datagram.payload).unwrap();
            (datagram, message)
        })
        .collect()
}

fn reply(client: &TestClient, message_type: Option<MessageType>, address: Ipv4Addr, lease_time: u32) -> Vec<u8> {
    let mut options = Options::new();
    if let Some(message_type) = message_type {
        options.set_dhcp_message_type(message_type);
        options.set_dhcp_server_id(SERVER);
        options.set_address_time(lease_time);
    }
    options.set_subnet_mask(Ipv4Addr::new(255, 255, 255, 0));
    options.set_routers(&[SERVER]);

    let message = Message {
        operation_code: OperationCode::BootReply,
        hardware_type: HardwareType::Ethernet,
        hardware_address_length: 6,
        hardware_options: 0,
        transaction_id: client.xid(),
        seconds: 0,
        is_broadcast: false,
        client_ip_address: Ipv4Addr::UNSPECIFIED,
        your_ip_address: address,
        server_ip_address: SERVER,
        gateway_ip_address: Ipv4Addr::UNSPECIFIED,
        client_hardware_address: mac(),
        server_name: Vec::new(),
        boot_filename: Vec::new(),
        options,
    };
    let mut buffer = vec![0u8; SIZE_MESSAGE_MINIMAL];
    let length = message.to_bytes(&mut buffer).unwrap();
    buffer.truncate(length);
    buffer
}

fn nak(client: &TestClient) -> Vec<u8> {
    let bytes = reply(client, Some(MessageType::DhcpNak), Ipv4Addr::UNSPECIFIED, 0);
    let mut message = Message::from_bytes(&bytes).unwrap();
    message.options.remove(51);
    let mut buffer = vec![0u8; SIZE_MESSAGE_MINIMAL];
    let length = message.to_bytes(&mut buffer).unwrap();
    buffer.truncate(length);
    buffer
}

/// Drives a fresh client to BOUND at `at(1)`.
fn bound_client(config: Config) -> TestClient {
    let mut client = client_with(config, Vec::new(), RecordingScript::default());
    client.start(at(0)).unwrap();
    let offer = reply(&client, Some(MessageType::DhcpOffer), OFFERED, 3600);
    client.handle_message(at(1), &offer).unwrap();
    let ack = reply(&client, Some(MessageType::DhcpAck), OFFERED, 3600);
    client.handle_message(at(1), &ack).unwrap();
    assert_eq!(client.state(), State::Bound);
    client.network_mut().drain();
    client
}

/// Fires timers second by second up to `until`.
fn run_until(client: &mut TestClient, until: Time) {
    while let Some(deadline) = client.next_deadline() {
        if deadline > until {
            break;
        }
        client.handle_timers(deadline).unwrap();
    }
}

#[test]
fn discover_offer_request_ack() {
    let mut client = client_with(config(), Vec::new(), RecordingScript::default());
    client.start(at(0)).unwrap();

    let discover = sent(&mut client);
    assert_eq!(discover.len(), 1);
    let (datagram, message) = &discover[0];
    assert_eq!(datagram.destination, Destination::Broadcast);
    assert_eq!(message.operation_code, OperationCode::BootRequest);
    assert_eq!(message.options.dhcp_message_type(), Some(MessageType::DhcpDiscover));
    assert_eq!(message.transaction_id, client.xid());
    assert_eq!(client.state(), State::Selecting);

    let offer = reply(&client, Some(MessageType::DhcpOffer), OFFERED, 3600);
    client.handle_message(at(1), &offer).unwrap();
    assert_eq!(client.state(), State::Requesting);
    assert!(!client.is_scheduled(Task::SendDiscover));

    let request = sent(&mut client);
    assert_eq!(request.len(), 1);
    let (datagram, message) = &request[0];
    assert_eq!(datagram.destination, Destination::Broadcast);
    assert_eq!(message.options.dhcp_message_type(), Some(MessageType::DhcpRequest));
    assert_eq!(message.options.address_request(), Some(OFFERED));
    assert_eq!(message.options.dhcp_server_id(), Some(SERVER));

    let ack = reply(&client, Some(MessageType::DhcpAck), OFFERED, 3600);
    client.handle_message(at(2), &ack).unwrap();
    assert_eq!(client.state(), State::Bound);

    let lease = client.active_lease().unwrap();
    assert_eq!(lease.address, OFFERED);
    assert_eq!(lease.expiry, at(2 + 3600));
    assert!(lease.renewal > at(2));
    assert!(lease.renewal <= lease.rebind && lease.rebind <= lease.expiry);
    assert!(client.is_scheduled(Task::StateBound));
    assert!(!client.is_scheduled(Task::SendRequest));

    assert_eq!(client.script().reasons(), vec![Reason::Preinit, Reason::Bound]);
    let bound = &client.script().calls[1];
    assert_eq!(bound.get("new_ip_address"), Some("10.0.0.5"));
    assert_eq!(bound.get("new_dhcp_lease_time"), Some("3600"));
    assert_eq!(client.database().leases().len(), 1);
}

#[test]
fn replies_for_other_transactions_are_ignored() {
    let mut client = client_with(config(), Vec::new(), RecordingScript::default());
    client.start(at(0)).unwrap();
    client.network_mut().drain();

    let mut offer = reply(&client, Some(MessageType::DhcpOffer), OFFERED, 3600);
    offer[4] ^= 0xff;
    client.handle_message(at(1), &offer).unwrap();
    client.handle_message(at(1), &[1, 2, 3]).unwrap();

    assert_eq!(client.state(), State::Selecting);
    assert!(client.offered_leases().is_empty());
    assert!(client.network().is_empty());
}

#[test]
fn discover_backoff_respects_cutoff_and_timeout() {
    let mut client = client_with(config(), Vec::new(), RecordingScript::default());
    client.start(at(0)).unwrap();

    let mut sendings = vec![at(0)];
    let mut now = at(0);
    while let Some(deadline) = client.next_deadline() {
        if client.state() != State::Selecting {
            break;
        }
        assert!(deadline - Duration::from_secs(15) <= now, "interval past the cutoff");
        now = deadline;
        client.handle_timers(now).unwrap();
        if !client.network().is_empty() {
            client.network_mut().drain();
            sendings.push(now);
        }
        assert!(client.interval() <= 15);
    }

    for sending in &sendings {
        assert!(*sending <= at(60), "sent at {}", sending);
    }
    assert!(sendings.len() >= 5);
    // nothing recorded, so the client sleeps before starting over
    assert_eq!(client.state(), State::Init);
    assert!(client.is_scheduled(Task::StateInit));
    assert_eq!(client.script().reasons(), vec![Reason::Preinit, Reason::Fail]);
}

#[test]
fn one_try_gives_up_with_exit_status_two() {
    let mut client = client_with(config().with_one_try(true), Vec::new(), RecordingScript::default());
    client.start(at(0)).unwrap();

    let mut result = Ok(());
    while let Some(deadline) = client.next_deadline() {
        result = client.handle_timers(deadline);
        if result.is_err() {
            break;
        }
    }
    match result {
        Err(error @ Error::NoLeaseOnFirstTry) => assert_eq!(error.exit_code(), 2),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn selection_window_prefers_the_requested_address() {
    let recorded = {
        let client = bound_client(config());
        client.active_lease().unwrap().clone()
    };

    let mut client = client_with(
        config().with_select_interval(Duration::from_secs(5)).with_reboot_timeout(Duration::from_secs(2)),
        vec![recorded],
        RecordingScript::default(),
    );
    client.start(at(10)).unwrap();
    assert_eq!(client.state(), State::Rebooting);

    // no answer to INIT-REBOOT
    run_until(&mut client, at(13));
    assert_eq!(client.state(), State::Selecting);
    client.network_mut().drain();

    let other = Ipv4Addr::new(10, 0, 0, 9);
    let first = reply(&client, Some(MessageType::DhcpOffer), other, 600);
    client.handle_message(at(14), &first).unwrap();
    let second = reply(&client, Some(MessageType::DhcpOffer), OFFERED, 600);
    client.handle_message(at(14), &second).unwrap();
    client.handle_message(at(14), &second).unwrap();
    assert_eq!(client.offered_leases().len(), 2);
    assert_eq!(client.offered_leases()[0].address, OFFERED);
    assert!(client.is_scheduled(Task::StateSelecting));

    run_until(&mut client, at(18));
    assert_eq!(client.state(), State::Requesting);
    let request = sent(&mut client);
    assert_eq!(request[0].1.options.address_request(), Some(OFFERED));
}

#[test]
fn renewing_unicasts_then_rebinding_broadcasts() {
    let mut client = bound_client(config());
    let lease = client.active_lease().unwrap().clone();

    client.handle_timers(lease.renewal).unwrap();
    assert_eq!(client.state(), State::Renewing);
    let renew = sent(&mut client);
    assert_eq!(renew[0].0.destination, Destination::Unicast(SERVER));
    assert_eq!(renew[0].1.client_ip_address, OFFERED);

    run_until(&mut client, lease.rebind + Duration::from_secs(20));
    assert_eq!(client.state(), State::Rebinding);
    let rebind = sent(&mut client);
    assert_eq!(rebind.last().unwrap().0.destination, Destination::Broadcast);

    let ack = reply(&client, Some(MessageType::DhcpAck), OFFERED, 7200);
    let now = lease.rebind + Duration::from_secs(30);
    client.handle_message(now, &ack).unwrap();
    assert_eq!(client.state(), State::Bound);
    assert_eq!(client.active_lease().unwrap().expiry, Time::from_secs(now.as_secs() + 7200));
    assert_eq!(client.script().reasons().last(), Some(&Reason::Rebind));
}

#[test]
fn unanswered_renewal_expires_the_lease() {
    let mut client = bound_client(config());
    let expiry = client.active_lease().unwrap().expiry;

    run_until(&mut client, expiry + Duration::from_secs(2));
    assert_eq!(client.state(), State::Selecting);
    let reasons = client.script().reasons();
    assert!(reasons.contains(&Reason::Expire));
    assert_eq!(reasons.last(), Some(&Reason::Preinit));

    let discover = sent(&mut client);
    let (_, message) = discover.last().unwrap();
    assert_eq!(message.options.dhcp_message_type(), Some(MessageType::DhcpDiscover));
    assert_eq!(message.options.address_request(), Some(OFFERED));
}

#[test]
fn nak_restarts_discovery() {
    let mut client = bound_client(config());
    let renewal = client.active_lease().unwrap().renewal;
    client.handle_timers(renewal).unwrap();
    client.network_mut().drain();

    let nak = nak(&client);
    client.handle_message(renewal, &nak).unwrap();
    assert_eq!(client.state(), State::Selecting);
    assert!(client.active_lease().is_none());
    assert!(!client.is_scheduled(Task::SendRequest));
    let discover = sent(&mut client);
    assert_eq!(discover[0].1.options.address_request(), None);
}

#[test]
fn bootp_replies_bind_with_fixed_timers() {
    let mut client = client_with(config(), Vec::new(), RecordingScript::default());
    client.start(at(0)).unwrap();
    let bootp = reply(&client, None, OFFERED, 0);
    client.handle_message(at(1), &bootp).unwrap();

    assert_eq!(client.state(), State::Bound);
    let lease = client.active_lease().unwrap();
    assert!(lease.is_bootp);
    assert_eq!(lease.expiry, at(1 + 12000));
    assert_eq!(lease.renewal, at(1 + 8000));
    assert_eq!(lease.rebind, at(1 + 10000));
}

#[test]
fn refused_lease_is_declined() {
    let script = RecordingScript {
        refuse: vec![Reason::Bound],
        ..Default::default()
    };
    let mut client = client_with(config(), Vec::new(), script);
    client.start(at(0)).unwrap();
    let offer = reply(&client, Some(MessageType::DhcpOffer), OFFERED, 3600);
    client.handle_message(at(1), &offer).unwrap();
    client.network_mut().drain();

    let ack = reply(&client, Some(MessageType::DhcpAck), OFFERED, 3600);
    client.handle_message(at(2), &ack).unwrap();

    let messages = sent(&mut client);
    assert_eq!(messages[0].1.options.dhcp_message_type(), Some(MessageType::DhcpDecline));
    assert_eq!(messages[0].1.options.address_request(), Some(OFFERED));
    assert_eq!(messages[1].1.options.dhcp_message_type(), Some(MessageType::DhcpDiscover));
    assert_eq!(client.state(), State::Selecting);
    assert!(client.active_lease().is_none());
}

#[test]
fn recorded_lease_survives_a_silent_network() {
    let recorded = {
        let client = bound_client(config());
        client.active_lease().unwrap().clone()
    };

    let mut client = client_with(
        config().with_reboot_timeout(Duration::from_secs(2)).with_timeout(Duration::from_secs(10)),
        vec![recorded.clone()],
        RecordingScript::default(),
    );
    client.start(at(5)).unwrap();
    run_until(&mut client, at(30));

    assert_eq!(client.state(), State::Bound);
    assert_eq!(client.active_lease(), Some(&recorded));
    assert!(client.script().reasons().contains(&Reason::Timeout));
    assert!(client.is_scheduled(Task::StateBound));
}

#[test]
fn release_unicasts_to_the_server() {
    let mut client = bound_client(config());
    client.release(at(100)).unwrap();

    let messages = sent(&mut client);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0.destination, Destination::Unicast(SERVER));
    assert_eq!(messages[0].1.options.dhcp_message_type(), Some(MessageType::DhcpRelease));
    assert_eq!(messages[0].1.client_ip_address, OFFERED);
    assert_eq!(client.state(), State::Stopped);
    assert!(client.active_lease().is_none());
    assert!(client.next_deadline().is_none());
    assert_eq!(client.script().reasons().last(), Some(&Reason::Release));
    assert!(client.database().leases().is_empty());
}

#[test]
fn lease_writes_are_throttled() {
    let mut client = bound_client(
        config()
            .with_min_lease_write(Duration::from_secs(100_000))
            .with_lease_rewrite_threshold(1),
    );
    assert_eq!(client.database().appends(), 1);

    // renewed well within the minimal write interval
    let renewal = client.active_lease().unwrap().renewal;
    client.handle_timers(renewal).unwrap();
    let ack = reply(&client, Some(MessageType::DhcpAck), OFFERED, 3600);
    client.handle_message(renewal, &ack).unwrap();
    assert_eq!(client.state(), State::Bound);
    assert_eq!(client.database().appends(), 1);
    assert_eq!(client.database().rewrites(), 0);
}

#[test]
fn lease_database_is_compacted() {
    let mut client = bound_client(
        config()
            .with_min_lease_write(Duration::from_secs(0))
            .with_lease_rewrite_threshold(1),
    );
    assert_eq!(client.database().appends(), 1);

    let renewal = client.active_lease().unwrap().renewal;
    client.handle_timers(renewal).unwrap();
    let ack = reply(&client, Some(MessageType::DhcpAck), OFFERED, 3600);
    client.handle_message(renewal, &ack).unwrap();
    assert_eq!(client.database().appends(), 1);
    assert_eq!(client.database().rewrites(), 1);
    assert_eq!(client.database().leases(), &[client.active_lease().unwrap().clone()][..]);
}

#[test]
fn stop_keeps_the_lease() {
    let mut client = bound_client(config());
    client.stop();
    assert_eq!(client.state(), State::Stopped);
    assert!(client.active_lease().is_some());
    assert!(client.next_deadline().is_none());
    assert_eq!(client.script().reasons().last(), Some(&Reason::Stop));
}
