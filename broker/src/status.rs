//! Ampersand-delimited `key[=value]` payloads of state-of-health messages.
//!
//! A bare key means "flag present, no value". Parsing and formatting go
//! through an ordered map so re-emitted payloads are deterministic.

use std::collections::BTreeMap;

/// Well-known keys of broker-injected state-of-health entries.
pub mod tags {
    pub const ADDRESS: &str = "address";
    pub const CLIENT_MEMORY_USAGE: &str = "clientmemoryusage";
    pub const CLIENT_NAME: &str = "clientname";
    pub const CPU_USAGE: &str = "cpuusage";
    pub const HOSTNAME: &str = "hostname";
    pub const MESSAGE_QUEUE_SIZE: &str = "messagequeuesize";
    pub const OBJECT_COUNT: &str = "objectcount";
    pub const PID: &str = "pid";
    pub const PROGRAM_NAME: &str = "programname";
    pub const TIME: &str = "time";
    pub const TOTAL_MEMORY: &str = "totalmemory";
    pub const UPTIME: &str = "uptime";
}

pub fn parse(payload: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for item in payload.split('&') {
        if item.is_empty() {
            continue;
        }
        match item.split_once('=') {
            Some((key, value)) => map.insert(key.to_owned(), value.to_owned()),
            None => map.insert(item.to_owned(), String::new()),
        };
    }
    map
}

pub fn format(map: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in map {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(key);
        if !value.is_empty() {
            out.push('=');
            out.push_str(value);
        }
    }
    out
}
