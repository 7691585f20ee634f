/// Paired send/receive tally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tx {
    pub sent: u64,
    pub received: u64,
}

#[derive(Clone, Debug, Default)]
pub struct GroupStatistics {
    pub name: String,
    pub messages: Tx,
    pub bytes: Tx,
    pub payload: Tx,
}

/// Snapshot of a queue's traffic counters, per queue and per group.
#[derive(Clone, Debug, Default)]
pub struct QueueStatistics {
    pub name: String,
    pub messages: Tx,
    pub bytes: Tx,
    pub payload: Tx,
    pub groups: Vec<GroupStatistics>,
}
