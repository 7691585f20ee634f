use crate::client::Client;
use crate::dispatcher::MessageDispatcher;
use crate::errors::{QueueError, Result};
use crate::group::Group;
use crate::host::{HostMonitor, SystemMonitor};
use crate::message::{Message, MessageKind};
use crate::processor::{KeyValues, MessageProcessor};
use crate::ring::MessageRing;
use crate::statistics::{GroupStatistics, QueueStatistics, Tx};
use crate::status;
use crate::sync::BlockingQueue;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use log::{debug, error, info, warn};
use seisbus_codec::CodecRegistry;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Construction parameters of a [Queue] beyond its name and payload limit.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub name: String,
    /// Advisory ceiling on a single message's payload bytes.
    pub max_payload_size: u64,
    /// Number of recent regular messages kept for replay.
    pub ring_capacity: usize,
    /// Capacity of the task and result queues feeding the worker.
    pub task_capacity: usize,
    /// Seconds between broker state-of-health broadcasts.
    pub soh_interval: i64,
    /// Seconds of inactivity after which a client is disposed.
    pub inactivity_limit: u32,
    /// Reserved sender name of the broker itself.
    pub sender_name: String,
    /// Name of the group receiving state-of-health broadcasts.
    pub status_group: String,
    /// Whether messages whose processing failed are dropped instead of
    /// published.
    pub discard_failed: bool,
}

impl QueueConfig {
    pub fn new(name: &str, max_payload_size: u64) -> Self {
        Self {
            name: name.to_owned(),
            max_payload_size,
            ring_capacity: 10_000,
            task_capacity: 10,
            soh_interval: 12,
            inactivity_limit: 36,
            sender_name: "MASTER".to_owned(),
            status_group: "STATUS_GROUP".to_owned(),
            discard_failed: false,
        }
    }
}

/// Registration outcome of [Queue::connect].
#[derive(Clone, Debug)]
pub struct ConnectResult {
    /// The unique name under which the client was registered.
    pub name: String,
    /// Parameters accumulated across the connection processors.
    pub out_params: KeyValues,
}

enum ClientSlot {
    /// Occupies a name so no client may take it (the broker's own sender
    /// name).
    Reserved,
    Active(Client),
}

/// Identity of a task's sender at submission time. The epoch guards against
/// reconnects under the same name between submission and result flush.
struct SenderKey {
    name: String,
    epoch: u64,
}

struct Task {
    sender: Option<SenderKey>,
    msg: Message,
    failed: bool,
}

/// The central messaging service: receives messages, buffers them and
/// distributes them to subscribed clients.
///
/// All methods must be called from the thread that owns the queue; the only
/// component running elsewhere is the worker, which communicates exclusively
/// through the task and result queues and the dispatcher signal.
pub struct Queue {
    config: QueueConfig,
    codec: CodecRegistry,
    host: Box<dyn HostMonitor>,
    processors: Vec<Arc<dyn MessageProcessor>>,
    connection_processors: Vec<Arc<dyn MessageProcessor>>,
    message_processors: Vec<Arc<dyn MessageProcessor>>,
    dispatcher: Option<Arc<dyn MessageDispatcher>>,
    sequence_number: u64,
    groups: HashMap<String, Group>,
    group_names: Vec<String>,
    ring: MessageRing,
    clients: HashMap<String, ClientSlot>,
    next_epoch: u64,
    worker: Option<JoinHandle<()>>,
    tasks: Arc<BlockingQueue<Task>>,
    results: Arc<BlockingQueue<Task>>,
    created: DateTime<Utc>,
    last_soh: Option<DateTime<Utc>>,
    allocated_client_heap: usize,
    tx_messages: Tx,
    tx_bytes: Tx,
    tx_payload: Tx,
}

impl Queue {
    pub fn new(name: &str, max_payload_size: u64) -> Self {
        Self::with_config(
            QueueConfig::new(name, max_payload_size),
            Box::new(SystemMonitor::new()),
        )
    }

    pub fn with_config(config: QueueConfig, host: Box<dyn HostMonitor>) -> Self {
        let mut clients = HashMap::new();
        clients.insert(config.sender_name.clone(), ClientSlot::Reserved);

        let status_group = config.status_group.clone();
        let mut queue = Self {
            ring: MessageRing::new(config.ring_capacity),
            tasks: Arc::new(BlockingQueue::new(config.task_capacity)),
            results: Arc::new(BlockingQueue::new(config.task_capacity)),
            config,
            codec: CodecRegistry::default(),
            host,
            processors: Vec::new(),
            connection_processors: Vec::new(),
            message_processors: Vec::new(),
            dispatcher: None,
            sequence_number: 0,
            groups: HashMap::new(),
            group_names: Vec::new(),
            clients,
            next_epoch: 0,
            worker: None,
            created: Utc::now(),
            last_soh: None,
            allocated_client_heap: 0,
            tx_messages: Tx::default(),
            tx_bytes: Tx::default(),
            tx_payload: Tx::default(),
        };

        let _ = queue.add_group(&status_group);
        queue
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The reserved sender name of the queue itself.
    pub fn sender_name(&self) -> &str {
        &self.config.sender_name
    }

    pub fn status_group(&self) -> &str {
        &self.config.status_group
    }

    pub fn max_payload_size(&self) -> u64 {
        self.config.max_payload_size
    }

    /// Names of the configured groups, in creation order.
    pub fn groups(&self) -> &[String] {
        &self.group_names
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn client(&self, name: &str) -> Option<&Client> {
        match self.clients.get(name) {
            Some(ClientSlot::Active(client)) => Some(client),
            _ => None,
        }
    }

    pub fn client_mut(&mut self, name: &str) -> Option<&mut Client> {
        match self.clients.get_mut(name) {
            Some(ClientSlot::Active(client)) => Some(client),
            _ => None,
        }
    }

    /// The codec registry messages of this queue decode against.
    pub fn codec(&self) -> &CodecRegistry {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut CodecRegistry {
        &mut self.codec
    }

    /// Adds a processor. Must happen before [activate](Queue::activate);
    /// false when the processor is already attached.
    pub fn add(&mut self, processor: Arc<dyn MessageProcessor>) -> bool {
        if self
            .processors
            .iter()
            .any(|attached| Arc::ptr_eq(attached, &processor))
        {
            return false;
        }

        self.processors.push(processor.clone());
        if processor.handles_messages() {
            self.message_processors.push(processor.clone());
        }
        if processor.handles_connections() {
            self.connection_processors.push(processor.clone());
        }

        processor.attach(self);
        true
    }

    /// Adds a group/topic to the queue.
    pub fn add_group(&mut self, name: &str) -> Result<()> {
        if self.groups.contains_key(name) {
            return Err(QueueError::GroupNameNotUnique);
        }

        self.groups.insert(name.to_owned(), Group::new(name));
        self.group_names.push(name.to_owned());
        Ok(())
    }

    /// Sets the dispatcher bridging the worker to the owning thread. Must
    /// happen before [activate](Queue::activate).
    pub fn set_message_dispatcher(&mut self, dispatcher: Arc<dyn MessageDispatcher>) {
        self.dispatcher = Some(dispatcher);
    }

    /// Registers a client under a unique name, assigning a generated one
    /// when the desired name is empty.
    ///
    /// Every connection processor must accept the client; out-parameters
    /// accumulate across them. On error the client handle is dropped.
    pub fn connect(
        &mut self,
        mut client: Client,
        in_params: &[(String, String)],
    ) -> Result<ConnectResult> {
        if client.name().is_empty() {
            let mut generated = None;
            for _ in 0..10 {
                let candidate = format!("{:08x}", rand::random::<u32>());
                if !self.clients.contains_key(&candidate) && !self.groups.contains_key(&candidate)
                {
                    generated = Some(candidate);
                    break;
                }
            }
            match generated {
                Some(name) => client.set_name(name),
                None => return Err(QueueError::ClientNameNotUnique),
            }
        }

        if self.clients.contains_key(client.name()) {
            warn!("Client name '{}' not unique", client.name());
            return Err(QueueError::ClientNameNotUnique);
        }
        if self.groups.contains_key(client.name()) {
            warn!("Client name '{}' not unique: taken by a group", client.name());
            return Err(QueueError::ClientNameNotUnique);
        }

        let mut out_params = KeyValues::new();
        for processor in &self.connection_processors {
            if !processor.accept_connection(&mut client, in_params, &mut out_params) {
                return Err(QueueError::ClientNotAccepted);
            }
        }

        self.next_epoch += 1;
        client.mark_connected(Utc::now(), self.next_epoch);

        let name = client.name().to_owned();
        debug!("Connect client '{}' to '{}'", name, self.config.name);
        self.clients.insert(name.clone(), ClientSlot::Active(client));

        Ok(ConnectResult { name, out_params })
    }

    /// Unregisters a client: removes it from every group, notifies
    /// remaining members and connection processors, and finally announces
    /// the disconnect to clients that want membership information.
    pub fn disconnect(&mut self, name: &str) -> Result<()> {
        if !matches!(self.clients.get(name), Some(ClientSlot::Active(_))) {
            return Err(QueueError::InternalError);
        }

        let now = Utc::now();

        for group_name in self.group_names.clone() {
            let Some(group) = self.groups.get_mut(&group_name) else {
                continue;
            };
            if !group.remove_member(name) {
                continue;
            }

            let mut msg = None;
            for member in group.members() {
                let Some(ClientSlot::Active(client)) = self.clients.get_mut(member) else {
                    continue;
                };
                if client.wants_membership_information() {
                    let msg = msg.get_or_insert_with(|| {
                        Message::membership(&self.config.sender_name, &group_name, now)
                    });
                    client.leave_hook(&group_name, name, msg);
                }
            }
        }

        if !self.connection_processors.is_empty() {
            if let Some(ClientSlot::Active(client)) = self.clients.get_mut(name) {
                for processor in &self.connection_processors {
                    processor.drop_connection(client);
                }
            }
        }

        self.clients.remove(name);
        debug!("Disconnect client '{name}'");

        let mut msg = None;
        for slot in self.clients.values_mut() {
            let ClientSlot::Active(client) = slot else {
                continue;
            };
            if client.wants_membership_information() {
                let msg = msg
                    .get_or_insert_with(|| Message::membership(&self.config.sender_name, "", now));
                client.disconnected_hook(name, msg);
            }
        }

        Ok(())
    }

    /// Subscribes a client to a group, notifying the newcomer and every
    /// existing member that wants membership information.
    pub fn subscribe(&mut self, client_name: &str, group_name: &str) -> Result<()> {
        if !matches!(self.clients.get(client_name), Some(ClientSlot::Active(_))) {
            return Err(QueueError::InternalError);
        }
        let Some(group) = self.groups.get_mut(group_name) else {
            return Err(QueueError::GroupDoesNotExist);
        };
        if !group.add_member(client_name) {
            return Err(QueueError::GroupAlreadySubscribed);
        }

        let msg = Message::membership(&self.config.sender_name, group_name, Utc::now());

        if let Some(ClientSlot::Active(client)) = self.clients.get_mut(client_name) {
            client.enter_hook(group_name, client_name, &msg);
        }

        for member in group.members() {
            if member == client_name {
                continue;
            }
            let Some(ClientSlot::Active(client)) = self.clients.get_mut(member) else {
                continue;
            };
            if client.wants_membership_information() {
                client.enter_hook(group_name, client_name, &msg);
            }
        }

        Ok(())
    }

    /// Unsubscribes a client from a group; symmetric to
    /// [subscribe](Queue::subscribe) and emits `leave` notifications.
    pub fn unsubscribe(&mut self, client_name: &str, group_name: &str) -> Result<()> {
        let Some(group) = self.groups.get_mut(group_name) else {
            return Err(QueueError::GroupDoesNotExist);
        };
        if !group.remove_member(client_name) {
            return Err(QueueError::GroupNotSubscribed);
        }

        let msg = Message::membership(&self.config.sender_name, group_name, Utc::now());

        if let Some(ClientSlot::Active(client)) = self.clients.get_mut(client_name) {
            client.leave_hook(group_name, client_name, &msg);
        }

        for member in group.members() {
            let Some(ClientSlot::Active(client)) = self.clients.get_mut(member) else {
                continue;
            };
            if client.wants_membership_information() {
                client.leave_hook(group_name, client_name, &msg);
            }
        }

        Ok(())
    }

    /// Accepts a message from a transport client.
    ///
    /// `packet_size` is the wire size of the received packet including
    /// protocol headers; it only feeds statistics. Status messages are
    /// augmented and published immediately, transient messages bypass the
    /// pipeline, and regular messages go through the worker when message
    /// processors are configured.
    pub fn push(&mut self, sender_name: &str, mut msg: Message, packet_size: usize) -> Result<()> {
        self.flush_processed_messages();

        if msg.payload.len() as u64 > self.config.max_payload_size {
            return Err(QueueError::MessageNotAccepted);
        }

        if let Some(group) = self.groups.get_mut(&msg.target) {
            group.tx_messages.received += 1;
            group.tx_bytes.received += packet_size as u64;
            group.tx_payload.received += msg.payload.len() as u64;
        } else if !self.clients.contains_key(&msg.target) {
            return Err(QueueError::GroupDoesNotExist);
        }

        self.tx_messages.received += 1;
        self.tx_bytes.received += packet_size as u64;
        self.tx_payload.received += msg.payload.len() as u64;

        let now = Utc::now();
        let sender_key = {
            let Some(ClientSlot::Active(sender)) = self.clients.get_mut(sender_name) else {
                return Err(QueueError::InternalError);
            };

            msg.sender = sender.name().to_owned();
            sender.reset_inactivity();

            if msg.kind == MessageKind::Status {
                sender.set_last_soh_received(now);

                let mut info = status::parse(&String::from_utf8_lossy(&msg.payload));
                let uptime = (now - sender.created()).num_seconds().max(0);
                info.insert(status::tags::UPTIME.to_owned(), uptime.to_string());
                info.insert(
                    status::tags::ADDRESS.to_owned(),
                    sender.ip_address().to_string(),
                );
                msg.payload = status::format(&info).into();
                msg.self_discard = false;
            }

            SenderKey {
                name: sender.name().to_owned(),
                epoch: sender.epoch(),
            }
        };

        if msg.kind >= MessageKind::Transient || self.message_processors.is_empty() {
            // Transient and status messages bypass the pipeline and the
            // sequence numbering; without processors there is nothing to
            // schedule either.
            self.publish_from(Some(sender_name), msg);
            Ok(())
        } else {
            self.tasks
                .push(Task {
                    sender: Some(sender_key),
                    msg,
                    failed: false,
                })
                .map_err(|_| QueueError::InternalError)
        }
    }

    /// Publishes a message: assigns the sequence number and ring slot for
    /// regular messages, updates the sender's acknowledgement window, and
    /// distributes to the target group or peer.
    fn publish_from(&mut self, sender: Option<&str>, mut msg: Message) -> bool {
        let now = Utc::now();
        msg.timestamp = Some(now);

        if msg.kind == MessageKind::Regular {
            self.sequence_number = self.sequence_number.wrapping_add(1);
            msg.sequence_number = Some(self.sequence_number);
        }

        let payload_len = msg.payload.len() as u64;
        let msg = Arc::new(msg);
        if msg.kind == MessageKind::Regular {
            self.ring.push(msg.clone());
        }

        if let Some(sender_name) = sender {
            if let Some(ClientSlot::Active(client)) = self.clients.get_mut(sender_name) {
                client.note_published(now);
            }
        }

        if let Some(group) = self.groups.get_mut(&msg.target) {
            let mut delivered = 0u64;
            let mut bytes_sent = 0u64;
            for member in group.members() {
                let Some(ClientSlot::Active(client)) = self.clients.get_mut(member) else {
                    continue;
                };
                bytes_sent += client.publish(sender, &msg) as u64;
                delivered += 1;
                self.tx_messages.sent += 1;
                self.tx_payload.sent += payload_len;
            }
            group.tx_messages.sent += delivered;
            group.tx_payload.sent += delivered * payload_len;
            group.tx_bytes.sent += bytes_sent;
            self.tx_bytes.sent += bytes_sent;
            true
        } else if let Some(ClientSlot::Active(client)) = self.clients.get_mut(msg.target.as_str())
        {
            self.tx_bytes.sent += client.publish(sender, &msg) as u64;
            self.tx_messages.sent += 1;
            self.tx_payload.sent += payload_len;
            true
        } else {
            false
        }
    }

    /// Returns the next buffered message at or after `sequence_number` that
    /// is deliverable to the client, interpreting sequence numbers modularly
    /// across the 64-bit wrap.
    pub fn get_message(&mut self, sequence_number: u64, client_name: &str) -> Option<Arc<Message>> {
        let first = self.ring.front_sequence()?;
        let last = self.ring.back_sequence()?;

        let mut wanted = sequence_number;
        if first > last {
            // The sequence counter wrapped inside the ring; clamp requests
            // that fall into the empty gap between back and front.
            if wanted < first && wanted > last {
                wanted = first;
            }
        } else {
            if wanted < first {
                wanted = first;
            }
            if wanted > last {
                return None;
            }
        }

        let mut index = wanted.wrapping_sub(first) as usize;
        while let Some(msg) = self.ring.get(index) {
            let payload_len = msg.payload.len() as u64;

            // No transport return on replay; the payload length stands in
            // for the wire size.
            if let Some(group) = self.groups.get_mut(&msg.target) {
                if group.has_member(client_name) {
                    group.tx_messages.sent += 1;
                    group.tx_bytes.sent += payload_len;
                    group.tx_payload.sent += payload_len;
                    self.tx_messages.sent += 1;
                    self.tx_bytes.sent += payload_len;
                    self.tx_payload.sent += payload_len;
                    return Some(msg.clone());
                }
            }

            if msg.target == client_name {
                self.tx_messages.sent += 1;
                self.tx_bytes.sent += payload_len;
                self.tx_payload.sent += payload_len;
                return Some(msg.clone());
            }

            index += 1;
        }

        None
    }

    /// Starts the worker thread; a no-op without message processors or when
    /// already active.
    pub fn activate(&mut self) {
        if self.worker.is_some() || self.message_processors.is_empty() {
            return;
        }

        let tasks = self.tasks.clone();
        let results = self.results.clone();
        let processors = self.message_processors.clone();
        let dispatcher = self.dispatcher.clone();
        let queue_name = self.config.name.clone();
        let discard_failed = self.config.discard_failed;

        let spawned = std::thread::Builder::new()
            .name(format!("{queue_name}-worker"))
            .spawn(move || {
                debug!("[queue] worker is running");

                while let Ok(mut task) = tasks.pop() {
                    for processor in &processors {
                        if task.msg.kind == MessageKind::Regular && !processor.process(&mut task.msg)
                        {
                            task.failed = true;
                        }
                        task.msg.processed = true;
                    }

                    if discard_failed && task.failed {
                        continue;
                    }

                    if results.push(task).is_err() {
                        break;
                    }
                    if let Some(dispatcher) = &dispatcher {
                        dispatcher.message_available(&queue_name);
                    }
                }

                debug!("[queue] worker stopped");
            });

        match spawned {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => error!("[queue] failed to start worker: {e}"),
        }
    }

    /// Drains the result queue and publishes the processed messages.
    ///
    /// A sender that disconnected or reconnected between submission and
    /// processing is nulled out: the message still publishes but no
    /// per-client bookkeeping is touched.
    pub fn flush_processed_messages(&mut self) {
        while let Some(task) = self.results.try_pop() {
            let Task { sender, msg, .. } = task;

            let sender = sender.and_then(|key| match self.clients.get(&key.name) {
                Some(ClientSlot::Active(client)) if client.epoch() == key.epoch => Some(key.name),
                _ => None,
            });

            self.publish_from(sender.as_deref(), msg);
        }
    }

    /// Cooperative once-a-second tick: flushes stale acknowledgement
    /// windows, disposes inactive clients and emits the periodic
    /// state-of-health broadcast.
    pub fn timeout(&mut self) {
        let now = Utc::now();

        let mut expired = Vec::new();
        for (name, slot) in self.clients.iter_mut() {
            let ClientSlot::Active(client) = slot else {
                continue;
            };

            client.flush_stale_ack(now);

            if client.bump_inactivity() > self.config.inactivity_limit {
                expired.push(name.clone());
            }
        }

        for name in expired {
            info!("Remove client {name} due to inactivity");
            if let Some(ClientSlot::Active(client)) = self.clients.get_mut(&name) {
                client.dispose_hook();
            }
            let _ = self.disconnect(&name);
        }

        match self.last_soh {
            None => self.last_soh = Some(now),
            Some(last) if now - last >= Duration::seconds(self.config.soh_interval) => {
                self.last_soh = Some(now);
                self.broadcast_soh(now);
            }
            _ => {}
        }
    }

    fn broadcast_soh(&mut self, now: DateTime<Utc>) {
        use status::tags;

        let mut cpu = (self.host.cpu_usage() * 1e4).floor() * 1e-4;
        if cpu < 0.0 {
            cpu = 0.0;
        }
        let uptime = (now - self.created).num_milliseconds() as f64 / 1000.0;

        let mut payload = String::new();
        let _ = write!(
            payload,
            "{}={}&{}={}&{}={}&{}={}&{}={}&{}={}&{}={:.3}&{}={}&{}={}&{}={}&{}={:.2}",
            tags::HOSTNAME,
            self.host.hostname(),
            tags::PROGRAM_NAME,
            self.host.program_name(),
            tags::PID,
            self.host.pid(),
            tags::TOTAL_MEMORY,
            self.host.total_memory(),
            tags::TIME,
            now.to_rfc3339_opts(SecondsFormat::Micros, true),
            tags::CLIENT_NAME,
            self.config.sender_name,
            tags::CPU_USAGE,
            cpu,
            tags::CLIENT_MEMORY_USAGE,
            self.host.memory_usage(),
            tags::OBJECT_COUNT,
            self.ring.len(),
            tags::MESSAGE_QUEUE_SIZE,
            self.tasks.len(),
            tags::UPTIME,
            (uptime * 100.0).round() / 100.0,
        );

        for processor in &self.processors {
            processor.get_info(now, &mut payload);
        }

        let mut msg = Message::status(&self.config.status_group, payload);
        msg.sender = self.config.sender_name.clone();
        msg.timestamp = Some(now);
        msg.self_discard = false;

        let payload_len = msg.payload.len() as u64;
        let Some(group) = self.groups.get_mut(&self.config.status_group) else {
            return;
        };

        let mut delivered = 0u64;
        let mut bytes_sent = 0u64;
        for member in group.members() {
            let Some(ClientSlot::Active(client)) = self.clients.get_mut(member) else {
                continue;
            };
            bytes_sent += client.publish(None, &msg) as u64;
            delivered += 1;
            self.tx_messages.sent += 1;
            self.tx_payload.sent += payload_len;
        }
        group.tx_messages.sent += delivered;
        group.tx_payload.sent += delivered * payload_len;
        group.tx_bytes.sent += bytes_sent;
        self.tx_bytes.sent += bytes_sent;
    }

    /// Populates a statistics snapshot, optionally resetting the counters.
    pub fn get_statistics_snapshot(&mut self, reset: bool) -> QueueStatistics {
        let mut stats = QueueStatistics {
            name: self.config.name.clone(),
            messages: self.tx_messages,
            bytes: self.tx_bytes,
            payload: self.tx_payload,
            groups: Vec::with_capacity(self.group_names.len()),
        };

        for name in &self.group_names {
            let Some(group) = self.groups.get_mut(name) else {
                continue;
            };
            stats.groups.push(GroupStatistics {
                name: name.clone(),
                messages: group.tx_messages,
                bytes: group.tx_bytes,
                payload: group.tx_payload,
            });
            if reset {
                group.tx_messages = Tx::default();
                group.tx_bytes = Tx::default();
                group.tx_payload = Tx::default();
            }
        }

        if reset {
            self.tx_messages = Tx::default();
            self.tx_bytes = Tx::default();
            self.tx_payload = Tx::default();
        }

        stats
    }

    /// Reserves bytes in every client's scratch heap and returns their
    /// offset. The region allocator is bump-only; freeing is not supported.
    pub fn allocate_client_heap(&mut self, bytes: usize) -> Result<usize> {
        if self.allocated_client_heap + bytes > Client::MAX_LOCAL_HEAP {
            return Err(QueueError::NotEnoughClientHeap);
        }

        let offset = self.allocated_client_heap;
        self.allocated_client_heap += bytes;
        Ok(offset)
    }

    /// Shuts the queue down: terminates the worker, unregisters all clients
    /// and group members, discards buffered work and closes the processors.
    /// Idempotent and safe on partially initialized queues.
    pub fn shutdown(&mut self) {
        debug!("[queue] Shutdown");

        self.tasks.close();
        self.results.close();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        self.clients.clear();

        for group in self.groups.values_mut() {
            group.clear_members();
        }

        self.tasks.reopen();
        while self.tasks.try_pop().is_some() {}
        self.tasks.close();

        self.results.reopen();
        while self.results.try_pop().is_some() {}
        self.results.close();

        self.ring.clear();
        self.sequence_number = 0;

        for processor in &self.message_processors {
            processor.close();
        }
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
