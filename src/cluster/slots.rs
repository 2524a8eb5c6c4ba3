/// Slot-to-host mapping and CRC16 slot hashing for cluster mode (§4.6).
///
/// The CRC16 (XMODEM, poly 0x1021) implementation and hash-tag extraction
/// are the canonical versions for the whole crate, grounded on
/// `utils::crc16`/`utils::extract_hash_tag` in the teacher — previously
/// duplicated across three places in the teacher (`utils/mod.rs`,
/// `modes/redis/slots.rs`, `modes/redis/mod.rs`), consolidated here.
use std::collections::HashMap;

use crate::resp::RespValue;

pub const SLOT_COUNT: u16 = 16384;

pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// A key's hash tag (`{...}`) is what gets hashed when present, so that
/// multi-key operations on related keys land on the same slot.
pub fn extract_hash_tag(key: &str) -> &str {
    if let (Some(start), Some(end)) = (key.find('{'), key.find('}')) {
        if end > start + 1 {
            return &key[start + 1..end];
        }
    }
    key
}

pub fn slot_for_key(key: &str) -> u16 {
    crc16(extract_hash_tag(key).as_bytes()) % SLOT_COUNT
}

#[derive(Debug, Clone)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
    pub master: String,
    pub replicas: Vec<String>,
}

impl SlotRange {
    pub fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot <= self.end
    }
}

/// Maps every one of the 16384 slots to a master (and its replicas),
/// rebuilt wholesale whenever `CLUSTER SLOTS` is refreshed.
#[derive(Debug, Clone, Default)]
pub struct SlotMap {
    ranges: Vec<SlotRange>,
    slot_to_range: HashMap<u16, usize>,
}

impl SlotMap {
    pub fn new() -> Self {
        SlotMap::default()
    }

    pub fn rebuild(&mut self, ranges: Vec<SlotRange>) {
        let mut slot_to_range = HashMap::new();
        for (index, range) in ranges.iter().enumerate() {
            for slot in range.start..=range.end {
                slot_to_range.insert(slot, index);
            }
        }
        self.ranges = ranges;
        self.slot_to_range = slot_to_range;
    }

    pub fn master_for_slot(&self, slot: u16) -> Option<&str> {
        self.slot_to_range
            .get(&slot)
            .map(|idx| self.ranges[*idx].master.as_str())
    }

    pub fn replicas_for_slot(&self, slot: u16) -> &[String] {
        self.slot_to_range
            .get(&slot)
            .map(|idx| self.ranges[*idx].replicas.as_slice())
            .unwrap_or(&[])
    }

    pub fn master_for_key(&self, key: &str) -> Option<&str> {
        self.master_for_slot(slot_for_key(key))
    }

    /// Repoint a single slot at `master` without rebuilding the whole map,
    /// for applying a `MOVED` redirect in place (§4.6, §5). The slot gets
    /// its own one-slot range; replicas for it are unknown until the next
    /// full `CLUSTER SLOTS` refresh.
    pub fn update_slot(&mut self, slot: u16, master: String) {
        if let Some(&idx) = self.slot_to_range.get(&slot) {
            if self.ranges[idx].start == self.ranges[idx].end {
                self.ranges[idx].master = master;
                return;
            }
        }
        let new_idx = self.ranges.len();
        self.ranges.push(SlotRange { start: slot, end: slot, master, replicas: Vec::new() });
        self.slot_to_range.insert(slot, new_idx);
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn masters(&self) -> Vec<&str> {
        self.ranges.iter().map(|r| r.master.as_str()).collect()
    }
}

/// Parse a `CLUSTER SLOTS` reply into slot ranges. Each top-level array
/// element is `[start, end, [master_ip, master_port, node_id?], [replica...], ...]`.
pub fn parse_cluster_slots(value: &RespValue) -> crate::error::Result<Vec<SlotRange>> {
    let entries = value
        .as_array()
        .ok_or_else(|| crate::error::Error::unexpected("CLUSTER SLOTS reply was not an array"))?;

    let mut ranges = Vec::with_capacity(entries.len());
    for entry in entries {
        let fields = entry
            .as_array()
            .ok_or_else(|| crate::error::Error::unexpected("CLUSTER SLOTS entry was not an array"))?;
        if fields.len() < 3 {
            return Err(crate::error::Error::unexpected(
                "CLUSTER SLOTS entry missing start/end/master",
            ));
        }
        let start = integer_field(&fields[0])?;
        let end = integer_field(&fields[1])?;
        let master = host_field(&fields[2])?;
        let replicas = fields[3..]
            .iter()
            .filter_map(|f| host_field(f).ok())
            .collect();

        ranges.push(SlotRange {
            start: start as u16,
            end: end as u16,
            master,
            replicas,
        });
    }
    Ok(ranges)
}

fn integer_field(value: &RespValue) -> crate::error::Result<i64> {
    match value {
        RespValue::Integer(n) => Ok(*n),
        other => Err(crate::error::Error::unexpected(format!(
            "expected integer in CLUSTER SLOTS reply, got {:?}",
            other
        ))),
    }
}

fn host_field(value: &RespValue) -> crate::error::Result<String> {
    let fields = value
        .as_array()
        .ok_or_else(|| crate::error::Error::unexpected("expected [ip, port, ...] in CLUSTER SLOTS reply"))?;
    if fields.len() < 2 {
        return Err(crate::error::Error::unexpected(
            "CLUSTER SLOTS host entry missing ip/port",
        ));
    }
    let ip = fields[0]
        .as_bulk()
        .and_then(|b| std::str::from_utf8(b).ok())
        .ok_or_else(|| crate::error::Error::unexpected("CLUSTER SLOTS ip was not a bulk string"))?;
    let port = integer_field(&fields[1])?;
    Ok(format!("{}:{}", ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn crc16_matches_reference_vectors() {
        assert_eq!(crc16(b"123456789"), 12739);
        assert_eq!(crc16(b"foo"), 44950);
    }

    #[test]
    fn hash_tag_extraction() {
        assert_eq!(extract_hash_tag("foo{bar}baz"), "bar");
        assert_eq!(extract_hash_tag("no_tag"), "no_tag");
        assert_eq!(extract_hash_tag("empty{}tag"), "empty{}tag");
        assert_eq!(extract_hash_tag("{user1000}.following"), "user1000");
    }

    #[test]
    fn hash_tagged_keys_share_a_slot() {
        assert_eq!(slot_for_key("{user1000}.following"), slot_for_key("{user1000}.followers"));
    }

    #[test]
    fn slot_map_round_trip() {
        let mut map = SlotMap::new();
        map.rebuild(vec![
            SlotRange { start: 0, end: 8191, master: "a:6379".into(), replicas: vec!["a-r:6379".into()] },
            SlotRange { start: 8192, end: 16383, master: "b:6379".into(), replicas: vec![] },
        ]);
        assert_eq!(map.master_for_slot(0), Some("a:6379"));
        assert_eq!(map.master_for_slot(16383), Some("b:6379"));
        assert_eq!(map.replicas_for_slot(0), &["a-r:6379".to_string()]);
    }

    #[test]
    fn update_slot_repoints_single_slot_without_disturbing_its_neighbors() {
        let mut map = SlotMap::new();
        map.rebuild(vec![
            SlotRange { start: 0, end: 8191, master: "a:6379".into(), replicas: vec![] },
            SlotRange { start: 8192, end: 16383, master: "b:6379".into(), replicas: vec![] },
        ]);
        map.update_slot(100, "c:6379".into());
        assert_eq!(map.master_for_slot(100), Some("c:6379"));
        assert_eq!(map.master_for_slot(99), Some("a:6379"));
        assert_eq!(map.master_for_slot(101), Some("a:6379"));
    }

    #[test]
    fn parse_cluster_slots_reply() {
        let reply = RespValue::Array(Some(vec![RespValue::Array(Some(vec![
            RespValue::Integer(0),
            RespValue::Integer(8191),
            RespValue::Array(Some(vec![
                RespValue::BulkString(Some(Bytes::from("127.0.0.1"))),
                RespValue::Integer(7000),
            ])),
        ]))]));
        let ranges = parse_cluster_slots(&reply).unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].master, "127.0.0.1:7000");
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges[0].end, 8191);
    }
}
