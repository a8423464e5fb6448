//! HPACK encoder implementation per RFC 7541.
//!
//! Chooses the smallest representation per header field, manages its mirror
//! of the dynamic table and emits dynamic table size updates. Alongside the
//! FIFO the encoder keeps a hash-bucketed side index so that name and
//! name-value lookups touch one bucket chain instead of scanning the table.

use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::header_field::{HeaderField, HEADER_ENTRY_OVERHEAD};
use crate::{huffman, integer, static_table};

/// Number of bucket heads in the encoder's side index.
const BUCKETS: usize = 17;

/// String-literal Huffman policy. `Always`/`Never` exist for tests that pin
/// wire bytes to the RFC appendix vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HuffmanMode {
    /// Huffman-code a string only when strictly shorter than the raw octets.
    Adaptive,
    Always,
    Never,
}

/// Literal representation kinds and their wire prefixes.
#[derive(Clone, Copy)]
enum LiteralKind {
    /// `01xxxxxx`, 6-bit name index prefix.
    Incremental,
    /// `0000xxxx`, 4-bit name index prefix.
    WithoutIndexing,
    /// `0001xxxx`, 4-bit name index prefix.
    NeverIndexed,
}

impl LiteralKind {
    fn mask_and_prefix(self) -> (u8, u8) {
        match self {
            LiteralKind::Incremental => (0x40, 6),
            LiteralKind::WithoutIndexing => (0x00, 4),
            LiteralKind::NeverIndexed => (0x10, 4),
        }
    }
}

/// HPACK encoder with dynamic table mirror.
pub struct Encoder {
    table: IndexedTable,
    use_indexing: bool,
    huffman: HuffmanMode,
}

impl Encoder {
    /// Creates a new encoder whose dynamic table holds at most
    /// `max_table_size` octets.
    pub fn new(max_table_size: u32) -> Self {
        Self::with_options(max_table_size, true, HuffmanMode::Adaptive)
    }

    pub(crate) fn with_options(max_table_size: u32, use_indexing: bool, huffman: HuffmanMode) -> Self {
        Self {
            table: IndexedTable::with_capacity(max_table_size),
            use_indexing,
            huffman,
        }
    }

    /// Returns the current dynamic table capacity.
    pub fn max_header_table_size(&self) -> u32 {
        self.table.capacity()
    }

    /// Changes the dynamic table capacity, evicting as needed, and appends
    /// the mandatory size-update signal to `out` (RFC 7541 Section 6.3).
    pub fn set_max_header_table_size(&mut self, out: &mut BytesMut, max_table_size: u32) {
        self.table.set_capacity(max_table_size);
        integer::encode(out, 0x20, 5, max_table_size);
    }

    /// Appends the representation of one header field to `out`.
    ///
    /// `sensitive` forces the Literal-Never-Indexed form and keeps the field
    /// out of the dynamic table.
    pub fn encode_header(&mut self, out: &mut BytesMut, name: &[u8], value: &[u8], sensitive: bool) {
        if sensitive {
            let name_index = self.name_index(name);
            self.encode_literal(out, LiteralKind::NeverIndexed, name_index, name, value);
            return;
        }

        if self.table.capacity() == 0 {
            // Static-only operation.
            if let Some(index) = static_table::index_of(name, value) {
                encode_indexed(out, index);
            } else {
                let name_index = static_table::index_of_name(name);
                self.encode_literal(out, LiteralKind::WithoutIndexing, name_index, name, value);
            }
            return;
        }

        let entry_size = name.len() as u64 + value.len() as u64 + u64::from(HEADER_ENTRY_OVERHEAD);
        if entry_size > u64::from(self.table.capacity()) {
            // Would never fit the table, so indexing it is pointless.
            let name_index = self.name_index(name);
            self.encode_literal(out, LiteralKind::WithoutIndexing, name_index, name, value);
            return;
        }

        if let Some(dyn_index) = self.table.index_of(name, value) {
            encode_indexed(out, static_table::LENGTH + dyn_index);
            return;
        }
        if let Some(index) = static_table::index_of(name, value) {
            encode_indexed(out, index);
            return;
        }

        let name_index = self.name_index(name);
        if self.use_indexing {
            self.encode_literal(out, LiteralKind::Incremental, name_index, name, value);
            self.table.add(name, value);
        } else {
            self.encode_literal(out, LiteralKind::WithoutIndexing, name_index, name, value);
        }
    }

    /// Combined index for a name: static first, then the most recent dynamic
    /// entry with that name.
    fn name_index(&self, name: &[u8]) -> Option<u32> {
        static_table::index_of_name(name)
            .or_else(|| self.table.index_of_name(name).map(|i| static_table::LENGTH + i))
    }

    fn encode_literal(
        &self,
        out: &mut BytesMut,
        kind: LiteralKind,
        name_index: Option<u32>,
        name: &[u8],
        value: &[u8],
    ) {
        let (mask, prefix_bits) = kind.mask_and_prefix();
        match name_index {
            Some(index) => integer::encode(out, mask, prefix_bits, index),
            None => {
                out.put_u8(mask);
                self.encode_string(out, name);
            }
        }
        self.encode_string(out, value);
    }

    fn encode_string(&self, out: &mut BytesMut, octets: &[u8]) {
        let huffman_len = huffman::encoded_len(octets);
        let use_huffman = match self.huffman {
            HuffmanMode::Adaptive => huffman_len < octets.len(),
            HuffmanMode::Always => true,
            HuffmanMode::Never => false,
        };
        if use_huffman {
            integer::encode(out, 0x80, 7, huffman_len as u32);
            huffman::encode(octets, out);
        } else {
            integer::encode(out, 0x00, 7, octets.len() as u32);
            out.put_slice(octets);
        }
    }

    /// Entry count of the dynamic table mirror.
    pub fn table_len(&self) -> u32 {
        self.table.len()
    }

    /// Summed entry size of the dynamic table mirror.
    pub fn table_size(&self) -> u32 {
        self.table.size()
    }

    /// Entry of the dynamic table mirror by 1-based index, 1 being the
    /// newest.
    pub fn table_entry(&self, index: u32) -> Option<&HeaderField> {
        self.table.get(index)
    }
}

/// Indexed header field: `1xxxxxxx` with a 7-bit prefix.
fn encode_indexed(out: &mut BytesMut, index: u32) {
    integer::encode(out, 0x80, 7, index);
}

/// One live entry of the encoder's table: the field plus its bucket-chain
/// overlay (name hash, insertion counter, counter of the next chain node).
struct Entry {
    field: HeaderField,
    hash: u32,
    counter: u32,
    next: Option<u32>,
}

/// The encoder's dynamic table: the FIFO the decoder mirrors, overlaid with
/// an array of bucket heads chaining entries by name hash.
///
/// Each inserted entry takes a counter one below its predecessor's; the
/// 1-based index of a live entry is `counter - newest.counter + 1`, which
/// stays valid under eviction without renumbering. The counter wraps
/// harmlessly: it is only ever used as a relative offset.
struct IndexedTable {
    // Front is the newest entry, back the oldest.
    entries: VecDeque<Entry>,
    buckets: [Option<u32>; BUCKETS],
    size: u32,
    capacity: u32,
    next_counter: u32,
}

impl IndexedTable {
    fn with_capacity(capacity: u32) -> Self {
        Self {
            entries: VecDeque::new(),
            buckets: [None; BUCKETS],
            size: 0,
            capacity,
            next_counter: 0,
        }
    }

    fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn get(&self, index: u32) -> Option<&HeaderField> {
        if index == 0 {
            return None;
        }
        self.entries.get(index as usize - 1).map(|e| &e.field)
    }

    /// Position of a live entry in the FIFO, derived from its counter.
    fn position(&self, counter: u32) -> usize {
        let newest = self.entries.front().expect("chain node without entries").counter;
        counter.wrapping_sub(newest) as usize
    }

    /// 1-based dynamic table index of a live entry.
    fn index_of_counter(&self, counter: u32) -> u32 {
        self.position(counter) as u32 + 1
    }

    fn index_of(&self, name: &[u8], value: &[u8]) -> Option<u32> {
        let hash = hash_name(name);
        let mut cursor = self.buckets[bucket(hash)];
        while let Some(counter) = cursor {
            let entry = &self.entries[self.position(counter)];
            if entry.hash == hash && entry.field.name == name && entry.field.value == value {
                return Some(self.index_of_counter(counter));
            }
            cursor = entry.next;
        }
        None
    }

    /// Index of the most recently inserted entry with the given name. Chains
    /// are prepended on insert, so the first match is the most recent.
    fn index_of_name(&self, name: &[u8]) -> Option<u32> {
        let hash = hash_name(name);
        let mut cursor = self.buckets[bucket(hash)];
        while let Some(counter) = cursor {
            let entry = &self.entries[self.position(counter)];
            if entry.hash == hash && entry.field.name == name {
                return Some(self.index_of_counter(counter));
            }
            cursor = entry.next;
        }
        None
    }

    fn add(&mut self, name: &[u8], value: &[u8]) {
        let field = HeaderField::new(Bytes::copy_from_slice(name), Bytes::copy_from_slice(value));
        let entry_size = field.size();
        if entry_size > self.capacity {
            self.clear();
            return;
        }
        while self.size + entry_size > self.capacity {
            self.evict();
        }

        let hash = hash_name(&field.name);
        let counter = self.next_counter;
        self.next_counter = self.next_counter.wrapping_sub(1);
        let next = self.buckets[bucket(hash)];
        self.buckets[bucket(hash)] = Some(counter);
        self.entries.push_front(Entry {
            field,
            hash,
            counter,
            next,
        });
        self.size += entry_size;
    }

    fn evict(&mut self) {
        let Some(evicted) = self.entries.pop_back() else {
            return;
        };
        self.size -= evicted.field.size();
        self.unlink(evicted.hash, evicted.counter, evicted.next);
        trace!(field = ?evicted.field, "evicted from encoder dynamic table");
    }

    /// Removes the node with the given counter from its bucket chain.
    fn unlink(&mut self, hash: u32, counter: u32, next: Option<u32>) {
        let bucket = bucket(hash);
        let Some(head) = self.buckets[bucket] else {
            return;
        };
        if head == counter {
            self.buckets[bucket] = next;
            return;
        }
        let mut cursor = head;
        loop {
            let position = self.position(cursor);
            match self.entries[position].next {
                Some(n) if n == counter => {
                    self.entries[position].next = next;
                    return;
                }
                Some(n) => cursor = n,
                None => return,
            }
        }
    }

    fn set_capacity(&mut self, capacity: u32) {
        self.capacity = capacity;
        if capacity == 0 {
            self.clear();
            return;
        }
        while self.size > capacity {
            self.evict();
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.buckets = [None; BUCKETS];
        self.size = 0;
    }
}

fn bucket(hash: u32) -> usize {
    (hash % BUCKETS as u32) as usize
}

fn hash_name(name: &[u8]) -> u32 {
    name.iter()
        .fold(0u32, |h, &b| h.wrapping_mul(31).wrapping_add(u32::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn encode_block(encoder: &mut Encoder, headers: &[(&[u8], &[u8])]) -> Vec<u8> {
        let mut out = BytesMut::new();
        for &(name, value) in headers {
            encoder.encode_header(&mut out, name, value, false);
        }
        out.to_vec()
    }

    #[test]
    fn test_indexed_static() {
        let mut encoder = Encoder::new(4096);
        let mut out = BytesMut::new();
        encoder.encode_header(&mut out, b":method", b"GET", false);
        assert_eq!(&out[..], &[0x82]);
        assert_eq!(encoder.table_len(), 0);
    }

    #[test]
    fn test_rfc_c3_requests_without_huffman() {
        // RFC 7541 C.3: three requests on one connection, literal octets.
        let mut encoder = Encoder::with_options(4096, true, HuffmanMode::Never);

        let block = encode_block(
            &mut encoder,
            &[
                (b":method", b"GET"),
                (b":scheme", b"http"),
                (b":path", b"/"),
                (b":authority", b"www.example.com"),
            ],
        );
        assert_eq!(block, hex("828684410f7777772e6578616d706c652e636f6d"));
        assert_eq!(encoder.table_size(), 57);

        let block = encode_block(
            &mut encoder,
            &[
                (b":method", b"GET"),
                (b":scheme", b"http"),
                (b":path", b"/"),
                (b":authority", b"www.example.com"),
                (b"cache-control", b"no-cache"),
            ],
        );
        assert_eq!(block, hex("828684be58086e6f2d6361636865"));
        assert_eq!(encoder.table_size(), 110);

        let block = encode_block(
            &mut encoder,
            &[
                (b":method", b"GET"),
                (b":scheme", b"https"),
                (b":path", b"/index.html"),
                (b":authority", b"www.example.com"),
                (b"custom-key", b"custom-value"),
            ],
        );
        assert_eq!(
            block,
            hex("828785bf400a637573746f6d2d6b65790c637573746f6d2d76616c7565")
        );
        assert_eq!(encoder.table_len(), 3);
        assert_eq!(encoder.table_entry(1).unwrap(), &("custom-key", "custom-value").into());
        assert_eq!(encoder.table_entry(3).unwrap(), &(":authority", "www.example.com").into());
        assert_eq!(encoder.table_size(), 164);
    }

    #[test]
    fn test_rfc_c4_requests_with_huffman() {
        // RFC 7541 C.4: the same requests, Huffman-coded literals.
        let mut encoder = Encoder::new(4096);

        let block = encode_block(
            &mut encoder,
            &[
                (b":method", b"GET"),
                (b":scheme", b"http"),
                (b":path", b"/"),
                (b":authority", b"www.example.com"),
            ],
        );
        assert_eq!(block, hex("828684418cf1e3c2e5f23a6ba0ab90f4ff"));

        let block = encode_block(
            &mut encoder,
            &[
                (b":method", b"GET"),
                (b":scheme", b"http"),
                (b":path", b"/"),
                (b":authority", b"www.example.com"),
                (b"cache-control", b"no-cache"),
            ],
        );
        assert_eq!(block, hex("828684be5886a8eb10649cbf"));

        let block = encode_block(
            &mut encoder,
            &[
                (b":method", b"GET"),
                (b":scheme", b"https"),
                (b":path", b"/index.html"),
                (b":authority", b"www.example.com"),
                (b"custom-key", b"custom-value"),
            ],
        );
        assert_eq!(block, hex("828785bf408825a849e95ba97d7f8925a849e95bb8e8b4bf"));
        assert_eq!(encoder.table_size(), 164);
    }

    #[test]
    fn test_sensitive_never_indexed() {
        // RFC 7541 C.2.3: literal never-indexed, "password: secret".
        let mut encoder = Encoder::with_options(4096, true, HuffmanMode::Never);
        let mut out = BytesMut::new();
        encoder.encode_header(&mut out, b"password", b"secret", true);
        assert_eq!(&out[..], &hex("100870617373776f726406736563726574")[..]);
        assert_eq!(encoder.table_len(), 0);
    }

    #[test]
    fn test_zero_capacity_stays_static_only() {
        let mut encoder = Encoder::with_options(0, true, HuffmanMode::Never);
        let mut out = BytesMut::new();
        encoder.encode_header(&mut out, b":method", b"GET", false);
        encoder.encode_header(&mut out, b":path", b"/sample/path", false);
        // 0x82 indexed, then literal-without-indexing with name index 4.
        assert_eq!(&out[..], &hex("82040c2f73616d706c652f70617468")[..]);
        assert_eq!(encoder.table_len(), 0);
    }

    #[test]
    fn test_oversized_entry_not_indexed() {
        let mut encoder = Encoder::with_options(64, true, HuffmanMode::Never);
        let value = vec![b'v'; 64];
        let mut out = BytesMut::new();
        encoder.encode_header(&mut out, b"x-large", &value, false);
        // Literal without indexing, literal name.
        assert_eq!(out[0], 0x00);
        assert_eq!(encoder.table_len(), 0);
    }

    #[test]
    fn test_dynamic_name_reference() {
        let mut encoder = Encoder::with_options(4096, true, HuffmanMode::Never);
        let mut out = BytesMut::new();
        encoder.encode_header(&mut out, b"x-trace", b"one", false);

        // Same name, new value: literal with incremental indexing referencing
        // the dynamic entry's name at combined index 62.
        out.clear();
        encoder.encode_header(&mut out, b"x-trace", b"two", false);
        assert_eq!(out[0], 0x40 | 62);
        assert_eq!(encoder.table_len(), 2);
        assert_eq!(encoder.table_entry(1).unwrap(), &("x-trace", "two").into());

        // Exact repeat: indexed representation of the newest entry.
        out.clear();
        encoder.encode_header(&mut out, b"x-trace", b"two", false);
        assert_eq!(&out[..], &[0x80 | 62]);
    }

    #[test]
    fn test_indexing_disabled_leaves_mirror_untouched() {
        let mut encoder = Encoder::with_options(4096, false, HuffmanMode::Never);
        let mut out = BytesMut::new();
        encoder.encode_header(&mut out, b"x-trace", b"one", false);
        assert_eq!(out[0], 0x00);
        assert_eq!(encoder.table_len(), 0);
    }

    #[test]
    fn test_size_update_signal() {
        let mut encoder = Encoder::new(4096);
        let mut out = BytesMut::new();
        encoder.set_max_header_table_size(&mut out, 0);
        encoder.set_max_header_table_size(&mut out, 4096);
        assert_eq!(&out[..], &hex("203fe11f")[..]);
        assert_eq!(encoder.max_header_table_size(), 4096);
    }

    #[test]
    fn test_eviction_keeps_index_stable() {
        // Capacity for two 34-octet entries.
        let mut encoder = Encoder::with_options(68, true, HuffmanMode::Never);
        let mut out = BytesMut::new();
        encoder.encode_header(&mut out, b"a", b"1", false);
        encoder.encode_header(&mut out, b"b", b"2", false);
        encoder.encode_header(&mut out, b"c", b"3", false); // evicts ("a", "1")

        assert_eq!(encoder.table_len(), 2);
        assert_eq!(encoder.table_entry(1).unwrap(), &("c", "3").into());
        assert_eq!(encoder.table_entry(2).unwrap(), &("b", "2").into());

        // The surviving entry is still found at its shifted-by-insertion,
        // stable-relative index.
        out.clear();
        encoder.encode_header(&mut out, b"b", b"2", false);
        assert_eq!(&out[..], &[0x80 | 63]);

        // The evicted entry is gone from the side index.
        out.clear();
        encoder.encode_header(&mut out, b"a", b"1", false);
        assert_eq!(out[0], 0x40); // literal name again
    }

    #[test]
    fn test_colliding_names_share_bucket() {
        // With 17 buckets, single-letter names 17 apart collide.
        let mut encoder = Encoder::with_options(4096, true, HuffmanMode::Never);
        let mut out = BytesMut::new();
        encoder.encode_header(&mut out, b"a", b"1", false);
        encoder.encode_header(&mut out, b"r", b"2", false); // 'r' - 'a' == 17

        out.clear();
        encoder.encode_header(&mut out, b"a", b"1", false);
        assert_eq!(&out[..], &[0x80 | 63]);
        out.clear();
        encoder.encode_header(&mut out, b"r", b"2", false);
        assert_eq!(&out[..], &[0x80 | 62]);
    }
}
