use crate::message::Message;
use chrono::{DateTime, Utc};
use std::net::IpAddr;

const MAX_LOCAL_HEAP: usize = 128;

/// Transport-side callbacks of one connected peer.
///
/// The broker invokes these on the thread that drives the queue; `publish`
/// must be non-blocking or buffer internally.
pub trait ClientTransport: Send {
    /// IP address of the peer; transports without IP sockets may return an
    /// unspecified address.
    fn ip_address(&self) -> IpAddr;

    /// Encodes and sends a message, returning the number of bytes sent.
    fn publish(&mut self, sender: Option<&str>, msg: &Message) -> usize;

    /// A member entered a group this client is also member of.
    fn enter(&mut self, group: &str, member: &str, msg: &Message);

    /// A member left a group this client is also member of.
    fn leave(&mut self, group: &str, member: &str, msg: &Message);

    /// Another client disconnected from the queue.
    fn disconnected(&mut self, peer: &str, msg: &Message);

    /// Acknowledgement window completed; release the sender's back-pressure.
    fn ack(&mut self);

    /// The queue is about to drop this client (e.g. due to inactivity).
    fn dispose(&mut self);
}

/// Broker-side handle of one connected peer.
///
/// Couples the state the broker manages on the client's behalf (sequence
/// counter, acknowledgement window, inactivity clock, scratch heap) with the
/// transport callbacks.
pub struct Client {
    name: String,
    epoch: u64,
    created: DateTime<Utc>,
    last_soh_received: Option<DateTime<Utc>>,
    wants_membership_info: bool,
    discard_self: bool,
    sequence_number: u64,
    acknowledge_window: u64,
    acknowledge_counter: u64,
    ack_initiated: Option<DateTime<Utc>>,
    inactivity_counter: u32,
    heap: [u8; MAX_LOCAL_HEAP],
    transport: Box<dyn ClientTransport>,
}

impl Client {
    /// Size of the per-client scratch area available to processor plugins.
    pub const MAX_LOCAL_HEAP: usize = MAX_LOCAL_HEAP;

    /// Creates an unregistered handle. An empty name requests a generated
    /// one at [connect](crate::Queue::connect) time.
    pub fn new(name: &str, transport: Box<dyn ClientTransport>) -> Self {
        Self {
            name: name.to_owned(),
            epoch: 0,
            created: Utc::now(),
            last_soh_received: None,
            wants_membership_info: false,
            discard_self: true,
            sequence_number: 0,
            acknowledge_window: 0,
            acknowledge_counter: 0,
            ack_initiated: None,
            inactivity_counter: 0,
            heap: [0; MAX_LOCAL_HEAP],
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registration epoch; distinguishes reconnects under the same name.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Time in UTC when the client connected.
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn last_soh_received(&self) -> Option<DateTime<Utc>> {
        self.last_soh_received
    }

    pub fn set_membership_information_enabled(&mut self, enable: bool) {
        self.wants_membership_info = enable;
    }

    pub fn wants_membership_information(&self) -> bool {
        self.wants_membership_info
    }

    /// Whether to discard messages where the receiver equals the sender.
    pub fn set_discard_self(&mut self, enable: bool) {
        self.discard_self = enable;
    }

    pub fn discard_self(&self) -> bool {
        self.discard_self
    }

    /// Number of published messages between `ack()` callbacks; zero disables
    /// acknowledgement windowing.
    pub fn set_acknowledge_window(&mut self, messages: u64) {
        self.acknowledge_window = messages;
        self.acknowledge_counter = messages;
    }

    pub fn acknowledge_window(&self) -> u64 {
        self.acknowledge_window
    }

    pub fn ack_initiated(&self) -> Option<DateTime<Utc>> {
        self.ack_initiated
    }

    /// Messages this client has produced since connecting.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn ip_address(&self) -> IpAddr {
        self.transport.ip_address()
    }

    /// Scratch heap slice at an offset obtained from
    /// [allocate_client_heap](crate::Queue::allocate_client_heap).
    pub fn memory(&self, offset: usize, len: usize) -> &[u8] {
        &self.heap[offset..offset + len]
    }

    pub fn memory_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.heap[offset..offset + len]
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn mark_connected(&mut self, now: DateTime<Utc>, epoch: u64) {
        self.created = now;
        self.epoch = epoch;
    }

    pub(crate) fn reset_inactivity(&mut self) {
        self.inactivity_counter = 0;
    }

    pub(crate) fn bump_inactivity(&mut self) -> u32 {
        self.inactivity_counter += 1;
        self.inactivity_counter
    }

    pub(crate) fn set_last_soh_received(&mut self, time: DateTime<Utc>) {
        self.last_soh_received = Some(time);
    }

    /// Delivers a message, honoring the self-discard rule.
    pub(crate) fn publish(&mut self, sender: Option<&str>, msg: &Message) -> usize {
        if msg.self_discard && self.discard_self && sender == Some(self.name.as_str()) {
            return 0;
        }
        self.transport.publish(sender, msg)
    }

    pub(crate) fn enter_hook(&mut self, group: &str, member: &str, msg: &Message) {
        self.transport.enter(group, member, msg);
    }

    pub(crate) fn leave_hook(&mut self, group: &str, member: &str, msg: &Message) {
        self.transport.leave(group, member, msg);
    }

    pub(crate) fn disconnected_hook(&mut self, peer: &str, msg: &Message) {
        self.transport.disconnected(peer, msg);
    }

    pub(crate) fn dispose_hook(&mut self) {
        self.transport.dispose();
    }

    /// Acknowledgement window update run after each message this client
    /// published.
    pub(crate) fn note_published(&mut self, timestamp: DateTime<Utc>) {
        self.sequence_number = self.sequence_number.wrapping_add(1);

        if self.acknowledge_counter > 0 {
            self.acknowledge_counter -= 1;
            if self.acknowledge_counter == 0 {
                self.acknowledge_counter = self.acknowledge_window;
                self.transport.ack();
                self.ack_initiated = None;
            } else if self.ack_initiated.is_none() {
                self.ack_initiated = Some(timestamp);
            }
        }
    }

    /// Flushes an acknowledgement cycle that aged at least one second, so
    /// senders are not starved of acks when traffic stops mid-window.
    pub(crate) fn flush_stale_ack(&mut self, now: DateTime<Utc>) {
        if let Some(initiated) = self.ack_initiated {
            if (now - initiated).num_seconds() > 0 {
                self.acknowledge_counter = self.acknowledge_window;
                self.transport.ack();
                self.ack_initiated = None;
            }
        }
    }
}
