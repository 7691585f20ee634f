//! End-to-end broker scenarios driven through a recording transport.

use seisbus_broker::{
    errors::QueueError, status, Client, ClientTransport, HostMonitor, Message, MessageDispatcher,
    MessageKind, MessageProcessor, Queue, QueueConfig,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
enum Event {
    Publish {
        sender: Option<String>,
        payload: Vec<u8>,
        kind: MessageKind,
        sequence: Option<u64>,
        processed: bool,
        self_discard: bool,
    },
    Enter {
        group: String,
        member: String,
    },
    Leave {
        group: String,
        member: String,
    },
    Disconnected {
        peer: String,
    },
    Ack,
    Dispose,
}

/// Per-client event log shared between the test and its mock transport.
#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    fn transport(&self) -> Box<dyn ClientTransport> {
        Box::new(MockTransport {
            events: self.events.clone(),
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        })
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn publishes(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Publish { .. }))
            .collect()
    }

    fn acks(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Ack))
            .count()
    }

    fn disposed(&self) -> bool {
        self.events().iter().any(|e| matches!(e, Event::Dispose))
    }
}

struct MockTransport {
    events: Arc<Mutex<Vec<Event>>>,
    ip: IpAddr,
}

impl ClientTransport for MockTransport {
    fn ip_address(&self) -> IpAddr {
        self.ip
    }

    fn publish(&mut self, sender: Option<&str>, msg: &Message) -> usize {
        self.events.lock().unwrap().push(Event::Publish {
            sender: sender.map(str::to_owned),
            payload: msg.payload.to_vec(),
            kind: msg.kind,
            sequence: msg.sequence_number,
            processed: msg.processed,
            self_discard: msg.self_discard,
        });
        msg.payload.len()
    }

    fn enter(&mut self, group: &str, member: &str, _msg: &Message) {
        self.events.lock().unwrap().push(Event::Enter {
            group: group.to_owned(),
            member: member.to_owned(),
        });
    }

    fn leave(&mut self, group: &str, member: &str, _msg: &Message) {
        self.events.lock().unwrap().push(Event::Leave {
            group: group.to_owned(),
            member: member.to_owned(),
        });
    }

    fn disconnected(&mut self, peer: &str, _msg: &Message) {
        self.events.lock().unwrap().push(Event::Disconnected {
            peer: peer.to_owned(),
        });
    }

    fn ack(&mut self) {
        self.events.lock().unwrap().push(Event::Ack);
    }

    fn dispose(&mut self) {
        self.events.lock().unwrap().push(Event::Dispose);
    }
}

struct FakeHost;

impl HostMonitor for FakeHost {
    fn hostname(&self) -> String {
        "testhost".to_owned()
    }

    fn program_name(&self) -> String {
        "scenarios".to_owned()
    }

    fn pid(&self) -> u32 {
        4242
    }

    fn total_memory(&self) -> u64 {
        8 << 30
    }

    fn cpu_usage(&self) -> f64 {
        0.25
    }

    fn memory_usage(&self) -> u64 {
        64 << 20
    }
}

fn queue_with(config: QueueConfig) -> Queue {
    Queue::with_config(config, Box::new(FakeHost))
}

fn connect(queue: &mut Queue, name: &str) -> Recorder {
    let recorder = Recorder::default();
    let client = Client::new(name, recorder.transport());
    queue.connect(client, &[]).unwrap();
    recorder
}

#[test]
fn pubsub_fan_out_with_self_discard() {
    let mut queue = Queue::new("Q", 1_000_000);
    queue.add_group("PICK").unwrap();

    let a = connect(&mut queue, "A");
    let b = connect(&mut queue, "B");
    let c = connect(&mut queue, "C");

    queue.subscribe("A", "PICK").unwrap();
    queue.subscribe("B", "PICK").unwrap();

    queue
        .push("A", Message::regular("PICK", "hello"), 0)
        .unwrap();

    let deliveries = b.publishes();
    assert_eq!(deliveries.len(), 1);
    match &deliveries[0] {
        Event::Publish {
            sender,
            payload,
            sequence,
            ..
        } => {
            assert_eq!(sender.as_deref(), Some("A"));
            assert_eq!(payload, b"hello");
            assert_eq!(*sequence, Some(1));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    assert!(a.publishes().is_empty(), "self-discard must hold");
    assert!(c.publishes().is_empty(), "C is not subscribed");
}

#[test]
fn sequence_continuity_with_ring_wrap() {
    let mut config = QueueConfig::new("Q", 1_000_000);
    config.ring_capacity = 3;
    let mut queue = queue_with(config);
    queue.add_group("PICK").unwrap();

    let _a = connect(&mut queue, "A");
    let _b = connect(&mut queue, "B");
    queue.subscribe("B", "PICK").unwrap();

    for i in 1..=4u8 {
        queue
            .push("A", Message::regular("PICK", vec![i]), 0)
            .unwrap();
    }

    // Oldest survivor after one eviction is sequence 2.
    let replay = queue.get_message(1, "B").expect("replay hit");
    assert_eq!(replay.sequence_number, Some(2));
    assert_eq!(&replay.payload[..], &[2]);

    let replay = queue.get_message(4, "B").expect("replay hit");
    assert_eq!(replay.sequence_number, Some(4));
    assert!(queue.get_message(5, "B").is_none());
}

#[test]
fn acknowledge_window_fires_after_third_publish() {
    let mut queue = Queue::new("Q", 1_000_000);
    queue.add_group("PICK").unwrap();

    let a = connect(&mut queue, "A");
    queue.client_mut("A").unwrap().set_acknowledge_window(3);

    for _ in 0..2 {
        queue
            .push("A", Message::regular("PICK", "m"), 0)
            .unwrap();
        assert_eq!(a.acks(), 0);
        assert!(queue.client("A").unwrap().ack_initiated().is_some());
    }

    queue
        .push("A", Message::regular("PICK", "m"), 0)
        .unwrap();

    assert_eq!(a.acks(), 1);
    assert!(queue.client("A").unwrap().ack_initiated().is_none());
}

#[test]
fn status_payload_is_augmented_and_bypasses_the_ring() {
    let mut queue = Queue::new("Q", 1_000_000);

    let _a = connect(&mut queue, "A");
    let b = connect(&mut queue, "B");
    queue.subscribe("B", "STATUS_GROUP").unwrap();

    queue
        .push("A", Message::status("STATUS_GROUP", "load=0.5"), 0)
        .unwrap();

    let deliveries = b.publishes();
    assert_eq!(deliveries.len(), 1);
    match &deliveries[0] {
        Event::Publish {
            payload,
            kind,
            sequence,
            self_discard,
            ..
        } => {
            assert_eq!(*kind, MessageKind::Status);
            assert_eq!(*sequence, None);
            assert!(!self_discard);

            let info = status::parse(&String::from_utf8(payload.clone()).unwrap());
            assert_eq!(info.get("load").map(String::as_str), Some("0.5"));
            assert_eq!(info.get("address").map(String::as_str), Some("127.0.0.1"));
            let uptime: i64 = info.get("uptime").expect("uptime injected").parse().unwrap();
            assert!(uptime >= 0);
            assert_eq!(info.len(), 3);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    assert!(queue.get_message(1, "B").is_none(), "status must not ring");
}

struct TagProcessor {
    invocations: AtomicUsize,
}

impl MessageProcessor for TagProcessor {
    fn handles_messages(&self) -> bool {
        true
    }

    fn process(&self, msg: &mut Message) -> bool {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if msg.kind == MessageKind::Status {
            let mut payload = msg.payload.to_vec();
            payload.extend_from_slice(b"&tag=1");
            msg.payload = payload.into();
        }
        true
    }
}

#[derive(Default)]
struct SignalDispatcher {
    notified: AtomicUsize,
}

impl MessageDispatcher for SignalDispatcher {
    fn message_available(&self, _queue_name: &str) {
        self.notified.fetch_add(1, Ordering::SeqCst);
    }
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < deadline, "timed out waiting for worker");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn processor_pipeline_with_dispatcher() {
    let mut queue = Queue::new("Q", 1_000_000);
    queue.add_group("PICK").unwrap();

    let processor = Arc::new(TagProcessor {
        invocations: AtomicUsize::new(0),
    });
    assert!(queue.add(processor.clone()));
    assert!(!queue.add(processor.clone()), "double add must fail");

    let dispatcher = Arc::new(SignalDispatcher::default());
    queue.set_message_dispatcher(dispatcher.clone());
    queue.activate();

    let _a = connect(&mut queue, "A");
    let b = connect(&mut queue, "B");
    queue.subscribe("B", "PICK").unwrap();

    queue
        .push("A", Message::regular("PICK", "hello"), 0)
        .unwrap();

    wait_until(Duration::from_secs(5), || {
        dispatcher.notified.load(Ordering::SeqCst) >= 1
    });
    assert_eq!(processor.invocations.load(Ordering::SeqCst), 1);

    queue.flush_processed_messages();

    let deliveries = b.publishes();
    assert_eq!(deliveries.len(), 1);
    match &deliveries[0] {
        Event::Publish {
            payload, processed, ..
        } => {
            assert!(processed);
            assert_eq!(payload, b"hello", "tagging is status-only");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    queue.shutdown();
}

#[test]
fn reconnect_between_submission_and_flush_skips_sender_bookkeeping() {
    let mut queue = Queue::new("Q", 1_000_000);
    queue.add_group("PICK").unwrap();

    let processor = Arc::new(TagProcessor {
        invocations: AtomicUsize::new(0),
    });
    queue.add(processor);
    let dispatcher = Arc::new(SignalDispatcher::default());
    queue.set_message_dispatcher(dispatcher.clone());
    queue.activate();

    let _a = connect(&mut queue, "A");
    let b = connect(&mut queue, "B");
    queue.subscribe("B", "PICK").unwrap();

    queue
        .push("A", Message::regular("PICK", "hello"), 0)
        .unwrap();
    wait_until(Duration::from_secs(5), || {
        dispatcher.notified.load(Ordering::SeqCst) >= 1
    });

    // Reconnect under the same name before the result is flushed.
    queue.disconnect("A").unwrap();
    let _a2 = connect(&mut queue, "A");

    queue.flush_processed_messages();

    assert_eq!(b.publishes().len(), 1, "message still publishes");
    assert_eq!(
        queue.client("A").unwrap().sequence_number(),
        0,
        "new instance must not inherit bookkeeping"
    );

    queue.shutdown();
}

#[test]
fn client_names_are_unique_and_disjoint_from_groups() {
    let mut queue = Queue::new("Q", 1_000_000);
    queue.add_group("PICK").unwrap();

    let _a = connect(&mut queue, "A");

    let duplicate = Client::new("A", Recorder::default().transport());
    assert_eq!(
        queue.connect(duplicate, &[]).unwrap_err(),
        QueueError::ClientNameNotUnique
    );

    let group_named = Client::new("PICK", Recorder::default().transport());
    assert_eq!(
        queue.connect(group_named, &[]).unwrap_err(),
        QueueError::ClientNameNotUnique
    );

    let reserved = Client::new("MASTER", Recorder::default().transport());
    assert_eq!(
        queue.connect(reserved, &[]).unwrap_err(),
        QueueError::ClientNameNotUnique
    );

    // An empty desired name gets a generated one.
    let anonymous = Client::new("", Recorder::default().transport());
    let result = queue.connect(anonymous, &[]).unwrap();
    assert_eq!(result.name.len(), 8);
    assert!(result.name.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn group_table_rejects_duplicates_without_changes() {
    let mut queue = Queue::new("Q", 1_000_000);
    queue.add_group("PICK").unwrap();
    let before = queue.groups().len();

    assert_eq!(
        queue.add_group("PICK").unwrap_err(),
        QueueError::GroupNameNotUnique
    );
    assert_eq!(queue.groups().len(), before);
}

#[test]
fn subscription_errors() {
    let mut queue = Queue::new("Q", 1_000_000);
    queue.add_group("PICK").unwrap();
    let _a = connect(&mut queue, "A");

    assert_eq!(
        queue.subscribe("A", "AMPLITUDE").unwrap_err(),
        QueueError::GroupDoesNotExist
    );

    queue.subscribe("A", "PICK").unwrap();
    assert_eq!(
        queue.subscribe("A", "PICK").unwrap_err(),
        QueueError::GroupAlreadySubscribed
    );

    assert_eq!(
        queue.unsubscribe("A", "AMPLITUDE").unwrap_err(),
        QueueError::GroupDoesNotExist
    );
    queue.unsubscribe("A", "PICK").unwrap();
    assert_eq!(
        queue.unsubscribe("A", "PICK").unwrap_err(),
        QueueError::GroupNotSubscribed
    );
}

#[test]
fn membership_notifications_reach_interested_members() {
    let mut queue = Queue::new("Q", 1_000_000);
    queue.add_group("PICK").unwrap();

    let a = connect(&mut queue, "A");
    let b = connect(&mut queue, "B");

    queue
        .client_mut("A")
        .unwrap()
        .set_membership_information_enabled(true);
    queue.subscribe("A", "PICK").unwrap();

    // Self-notification for the newcomer.
    let enters: Vec<_> = a
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Enter { .. }))
        .collect();
    assert_eq!(enters.len(), 1);

    queue.subscribe("B", "PICK").unwrap();
    let enters: Vec<_> = a
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Enter { .. }))
        .collect();
    assert_eq!(enters.len(), 2);
    match &enters[1] {
        Event::Enter { group, member } => {
            assert_eq!(group, "PICK");
            assert_eq!(member, "B");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    queue.unsubscribe("B", "PICK").unwrap();
    let leaves: Vec<_> = a
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Leave { .. }))
        .collect();
    assert_eq!(leaves.len(), 1);

    // B never asked for membership information, so the only enter events it
    // sees are its own self-notifications.
    assert!(b
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Enter { .. }))
        .all(|e| matches!(e, Event::Enter { member, .. } if member == "B")));

    queue.subscribe("B", "PICK").unwrap();
    queue.disconnect("B").unwrap();
    let leaves: Vec<_> = a
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Leave { .. }))
        .collect();
    assert_eq!(leaves.len(), 2);
    assert!(a
        .events()
        .iter()
        .any(|e| matches!(e, Event::Disconnected { peer } if peer == "B")));
}

#[test]
fn peer_to_peer_messages_deliver_and_replay() {
    let mut queue = Queue::new("Q", 1_000_000);
    let a = connect(&mut queue, "A");
    let b = connect(&mut queue, "B");

    queue
        .push("A", Message::regular("B", "direct"), 0)
        .unwrap();

    assert_eq!(b.publishes().len(), 1);
    assert!(a.publishes().is_empty());

    let replay = queue.get_message(1, "B").expect("replay hit");
    assert_eq!(&replay.payload[..], b"direct");
    assert!(queue.get_message(1, "A").is_none(), "not deliverable to A");
}

#[test]
fn unknown_target_is_rejected() {
    let mut queue = Queue::new("Q", 1_000_000);
    let _a = connect(&mut queue, "A");

    assert_eq!(
        queue
            .push("A", Message::regular("NOWHERE", "x"), 0)
            .unwrap_err(),
        QueueError::GroupDoesNotExist
    );
}

#[test]
fn oversized_payloads_are_rejected() {
    let mut queue = Queue::new("Q", 8);
    queue.add_group("PICK").unwrap();
    let _a = connect(&mut queue, "A");

    assert_eq!(
        queue
            .push("A", Message::regular("PICK", "123456789"), 0)
            .unwrap_err(),
        QueueError::MessageNotAccepted
    );
    assert!(queue
        .push("A", Message::regular("PICK", "12345678"), 0)
        .is_ok());
}

#[test]
fn client_heap_is_bump_allocated() {
    let mut queue = Queue::new("Q", 1_000_000);

    assert_eq!(
        queue.allocate_client_heap(129).unwrap_err(),
        QueueError::NotEnoughClientHeap
    );
    assert_eq!(queue.allocate_client_heap(64).unwrap(), 0);
    assert_eq!(queue.allocate_client_heap(64).unwrap(), 64);
    assert_eq!(
        queue.allocate_client_heap(1).unwrap_err(),
        QueueError::NotEnoughClientHeap
    );
}

#[test]
fn scratch_memory_is_usable_per_client() {
    let mut queue = Queue::new("Q", 1_000_000);
    let _a = connect(&mut queue, "A");

    let offset = queue.allocate_client_heap(4).unwrap();
    let client = queue.client_mut("A").unwrap();
    client.memory_mut(offset, 4).copy_from_slice(&[1, 2, 3, 4]);
    assert_eq!(client.memory(offset, 4), &[1, 2, 3, 4]);
}

#[test]
fn inactive_clients_are_disposed() {
    let mut config = QueueConfig::new("Q", 1_000_000);
    config.inactivity_limit = 2;
    let mut queue = queue_with(config);

    let a = connect(&mut queue, "A");

    queue.timeout();
    queue.timeout();
    assert!(!a.disposed());
    assert!(queue.client("A").is_some());

    queue.timeout();
    assert!(a.disposed());
    assert!(queue.client("A").is_none());
}

#[test]
fn broker_soh_broadcast_carries_host_facts() {
    let mut config = QueueConfig::new("Q", 1_000_000);
    config.soh_interval = 0;
    let mut queue = queue_with(config);

    let b = connect(&mut queue, "B");
    queue.subscribe("B", "STATUS_GROUP").unwrap();

    queue.timeout(); // arms the SOH timestamp
    queue.timeout(); // broadcasts

    let deliveries = b.publishes();
    assert_eq!(deliveries.len(), 1);
    match &deliveries[0] {
        Event::Publish {
            sender,
            payload,
            kind,
            ..
        } => {
            assert_eq!(*kind, MessageKind::Status);
            assert_eq!(*sender, None);

            let info = status::parse(&String::from_utf8(payload.clone()).unwrap());
            assert_eq!(info.get("hostname").map(String::as_str), Some("testhost"));
            assert_eq!(info.get("programname").map(String::as_str), Some("scenarios"));
            assert_eq!(info.get("pid").map(String::as_str), Some("4242"));
            assert_eq!(info.get("clientname").map(String::as_str), Some("MASTER"));
            assert_eq!(info.get("cpuusage").map(String::as_str), Some("0.250"));
            assert!(info.contains_key("time"));
            assert!(info.contains_key("totalmemory"));
            assert!(info.contains_key("clientmemoryusage"));
            assert!(info.contains_key("objectcount"));
            assert!(info.contains_key("messagequeuesize"));
            assert!(info.contains_key("uptime"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn statistics_snapshot_counts_and_resets() {
    let mut queue = Queue::new("Q", 1_000_000);
    queue.add_group("PICK").unwrap();

    let _a = connect(&mut queue, "A");
    let _b = connect(&mut queue, "B");
    queue.subscribe("B", "PICK").unwrap();

    queue
        .push("A", Message::regular("PICK", "hello"), 64)
        .unwrap();

    let stats = queue.get_statistics_snapshot(true);
    assert_eq!(stats.name, "Q");
    assert_eq!(stats.messages.received, 1);
    assert_eq!(stats.messages.sent, 1);
    assert_eq!(stats.bytes.received, 64);
    // The mock transport reports the payload length as its wire size.
    assert_eq!(stats.bytes.sent, 5);
    assert_eq!(stats.payload.received, 5);
    assert_eq!(stats.payload.sent, 5);

    let pick = stats
        .groups
        .iter()
        .find(|g| g.name == "PICK")
        .expect("group stats");
    assert_eq!(pick.messages.received, 1);
    assert_eq!(pick.messages.sent, 1);
    assert_eq!(pick.bytes.received, 64);
    assert_eq!(pick.bytes.sent, 5);
    assert_eq!(pick.payload.received, 5);
    assert_eq!(pick.payload.sent, 5);

    let stats = queue.get_statistics_snapshot(false);
    assert_eq!(stats.messages.received, 0);
    assert_eq!(stats.messages.sent, 0);
    assert_eq!(stats.bytes.sent, 0);
    assert_eq!(stats.payload.sent, 0);
}

#[test]
fn shutdown_is_idempotent_and_clears_state() {
    let mut queue = Queue::new("Q", 1_000_000);
    queue.add_group("PICK").unwrap();

    let _a = connect(&mut queue, "A");
    let _b = connect(&mut queue, "B");
    queue.subscribe("B", "PICK").unwrap();
    queue
        .push("A", Message::regular("PICK", "hello"), 0)
        .unwrap();

    queue.shutdown();
    assert!(queue.client("A").is_none());
    assert!(!queue.group("PICK").unwrap().has_member("B"));
    assert!(queue.get_message(1, "B").is_none());

    queue.shutdown();
}

#[test]
fn replay_on_empty_ring_returns_none() {
    let mut queue = Queue::new("Q", 1_000_000);
    let _a = connect(&mut queue, "A");
    assert!(queue.get_message(1, "A").is_none());
    assert!(queue.get_message(u64::MAX, "A").is_none());
}
