//! HPACK decoder implementation per RFC 7541.
//!
//! A byte-driven state machine that consumes a header block incrementally,
//! reconstructs header fields, mirrors the encoder's dynamic table and
//! enforces the receiver-side limits. `decode` may be called repeatedly with
//! more input as it arrives: the machine parks between bytes and reports how
//! much of the buffer it consumed.
//!
//! Oversized headers are not errors. A field whose cumulative decoded length
//! exceeds the block limit is withheld from the listener while its dynamic
//! table side effects are still applied, keeping this table in lockstep with
//! the peer's; `end_header_block` reports the truncation.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::dynamic_table::DynamicTable;
use crate::error::{HpackError, Result};
use crate::header_field::{HeaderField, HEADER_ENTRY_OVERHEAD};
use crate::{huffman, integer, static_table};

/// Receiver of decoded header fields.
///
/// `sensitive` is true for fields carried as Literal-Never-Indexed, which
/// intermediaries must not compress.
pub trait HeaderListener {
    fn on_header(&mut self, name: &[u8], value: &[u8], sensitive: bool);
}

impl<F: FnMut(&[u8], &[u8], bool)> HeaderListener for F {
    fn on_header(&mut self, name: &[u8], value: &[u8], sensitive: bool) {
        self(name, value, sensitive)
    }
}

/// Decoding phase. Phases park between `decode` calls when input runs dry;
/// an unfinished prefix integer is left unconsumed so the next call restarts
/// it from its first continuation octet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    ReadHeaderRepresentation,
    ReadMaxDynamicTableSize,
    ReadIndexedHeader,
    ReadIndexedHeaderName,
    ReadLiteralHeaderNameLengthPrefix,
    ReadLiteralHeaderNameLength,
    ReadLiteralHeaderName,
    SkipLiteralHeaderName,
    ReadLiteralHeaderValueLengthPrefix,
    ReadLiteralHeaderValueLength,
    ReadLiteralHeaderValue,
    SkipLiteralHeaderValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IndexKind {
    Incremental,
    NotIndexed,
    NeverIndexed,
}

/// HPACK decoder with dynamic table.
pub struct Decoder {
    table: DynamicTable,
    /// Receiver-side cap on the dynamic table; wire size updates above this
    /// fail decompression.
    max_table_size: u32,
    /// The table size the peer's encoder currently believes in.
    encoder_max_table_size: u32,
    /// Set when the cap shrank below the peer's view; the next header block
    /// must lead with a size update.
    size_update_pending: bool,

    /// Ceiling on the cumulative decoded name+value octets of one block.
    max_header_block: u32,
    /// Running total for the current block; `max_header_block + 1` is the
    /// sentinel meaning "truncated".
    header_size: u64,

    state: State,
    index_kind: IndexKind,
    /// Pending literal name; empty while a skipped name is being discarded.
    name: Bytes,
    /// Declared (wire) length of the pending literal name.
    name_len: u32,
    value_len: u32,
    huffman_encoded: bool,
    /// Base value for a nameIndex continuation integer (0x3f or 0x0f).
    name_index_base: u32,
    skip_remaining: u32,
}

impl Decoder {
    /// Creates a decoder enforcing `max_header_block_bytes` of decoded
    /// name+value octets per block and a dynamic table of at most
    /// `max_table_size` octets.
    pub fn new(max_header_block_bytes: u32, max_table_size: u32) -> Self {
        Self {
            table: DynamicTable::with_capacity(max_table_size),
            max_table_size,
            encoder_max_table_size: max_table_size,
            size_update_pending: false,
            max_header_block: max_header_block_bytes,
            header_size: 0,
            state: State::ReadHeaderRepresentation,
            index_kind: IndexKind::NotIndexed,
            name: Bytes::new(),
            name_len: 0,
            value_len: 0,
            huffman_encoded: false,
            name_index_base: 0,
            skip_remaining: 0,
        }
    }

    /// Returns the current dynamic table capacity.
    pub fn max_header_table_size(&self) -> u32 {
        self.table.capacity()
    }

    /// Host-side limit change. Shrinking below what the peer believes
    /// obliges the peer to lead its next header block with a size update;
    /// the table shrinks immediately regardless.
    pub fn set_max_header_table_size(&mut self, max_table_size: u32) {
        self.max_table_size = max_table_size;
        if max_table_size < self.encoder_max_table_size {
            self.size_update_pending = true;
            self.table.set_capacity(max_table_size);
        }
    }

    /// The decoder's dynamic table, for inspection.
    pub fn table(&self) -> &DynamicTable {
        &self.table
    }

    /// Consumes as much of `src` as possible, delivering completed fields to
    /// `listener`.
    ///
    /// Returns the number of octets consumed. Anything unconsumed belongs to
    /// an unfinished field; re-present it, extended with further input, on
    /// the next call.
    pub fn decode<L: HeaderListener>(&mut self, src: &[u8], listener: &mut L) -> Result<usize> {
        let mut pos = 0;
        loop {
            match self.state {
                State::ReadHeaderRepresentation => {
                    if pos >= src.len() {
                        return Ok(pos);
                    }
                    let byte = src[pos];
                    pos += 1;
                    if self.size_update_pending && byte & 0xe0 != 0x20 {
                        return Err(HpackError::MissingSizeUpdate);
                    }
                    if byte & 0x80 != 0 {
                        // Indexed header field.
                        let prefix = u32::from(byte & 0x7f);
                        match prefix {
                            0 => return Err(HpackError::InvalidIndex(0)),
                            0x7f => self.state = State::ReadIndexedHeader,
                            _ => self.emit_indexed(prefix, listener)?,
                        }
                    } else if byte & 0x40 != 0 {
                        // Literal with incremental indexing.
                        self.index_kind = IndexKind::Incremental;
                        self.start_literal(u32::from(byte & 0x3f), 0x3f)?;
                    } else if byte & 0x20 != 0 {
                        // Dynamic table size update.
                        let prefix = u32::from(byte & 0x1f);
                        if prefix == 0x1f {
                            self.state = State::ReadMaxDynamicTableSize;
                        } else {
                            self.apply_size_update(prefix)?;
                        }
                    } else {
                        // Literal without indexing / never indexed.
                        self.index_kind = if byte & 0x10 != 0 {
                            IndexKind::NeverIndexed
                        } else {
                            IndexKind::NotIndexed
                        };
                        self.start_literal(u32::from(byte & 0x0f), 0x0f)?;
                    }
                }

                State::ReadMaxDynamicTableSize => {
                    match integer::decode_continuation(&src[pos..], 0x1f)? {
                        None => return Ok(pos),
                        Some((size, consumed)) => {
                            pos += consumed;
                            self.apply_size_update(size)?;
                            self.state = State::ReadHeaderRepresentation;
                        }
                    }
                }

                State::ReadIndexedHeader => {
                    match integer::decode_continuation(&src[pos..], 0x7f)? {
                        None => return Ok(pos),
                        Some((index, consumed)) => {
                            pos += consumed;
                            self.emit_indexed(index, listener)?;
                            self.state = State::ReadHeaderRepresentation;
                        }
                    }
                }

                State::ReadIndexedHeaderName => {
                    match integer::decode_continuation(&src[pos..], self.name_index_base)? {
                        None => return Ok(pos),
                        Some((index, consumed)) => {
                            pos += consumed;
                            self.read_name(index)?;
                            self.state = State::ReadLiteralHeaderValueLengthPrefix;
                        }
                    }
                }

                State::ReadLiteralHeaderNameLengthPrefix => {
                    if pos >= src.len() {
                        return Ok(pos);
                    }
                    let byte = src[pos];
                    pos += 1;
                    self.huffman_encoded = byte & 0x80 != 0;
                    let length = u32::from(byte & 0x7f);
                    if length == 0x7f {
                        self.state = State::ReadLiteralHeaderNameLength;
                    } else {
                        self.begin_name(length)?;
                    }
                }

                State::ReadLiteralHeaderNameLength => {
                    match integer::decode_continuation(&src[pos..], 0x7f)? {
                        None => return Ok(pos),
                        Some((length, consumed)) => {
                            pos += consumed;
                            self.begin_name(length)?;
                        }
                    }
                }

                State::ReadLiteralHeaderName => {
                    let length = self.name_len as usize;
                    if src.len() - pos < length {
                        return Ok(pos);
                    }
                    let raw = &src[pos..pos + length];
                    pos += length;
                    self.name = if self.huffman_encoded {
                        Bytes::from(huffman::decode(raw)?)
                    } else {
                        Bytes::copy_from_slice(raw)
                    };
                    self.state = State::ReadLiteralHeaderValueLengthPrefix;
                }

                State::SkipLiteralHeaderName | State::SkipLiteralHeaderValue => {
                    let available = (src.len() - pos) as u32;
                    let skipped = self.skip_remaining.min(available);
                    pos += skipped as usize;
                    self.skip_remaining -= skipped;
                    if self.skip_remaining > 0 {
                        return Ok(pos);
                    }
                    if self.state == State::SkipLiteralHeaderName {
                        self.name = Bytes::new();
                        self.state = State::ReadLiteralHeaderValueLengthPrefix;
                    } else {
                        self.name = Bytes::new();
                        self.state = State::ReadHeaderRepresentation;
                    }
                }

                State::ReadLiteralHeaderValueLengthPrefix => {
                    if pos >= src.len() {
                        return Ok(pos);
                    }
                    let byte = src[pos];
                    pos += 1;
                    self.huffman_encoded = byte & 0x80 != 0;
                    let length = u32::from(byte & 0x7f);
                    if length == 0x7f {
                        self.state = State::ReadLiteralHeaderValueLength;
                    } else {
                        self.begin_value(length);
                    }
                }

                State::ReadLiteralHeaderValueLength => {
                    match integer::decode_continuation(&src[pos..], 0x7f)? {
                        None => return Ok(pos),
                        Some((length, consumed)) => {
                            pos += consumed;
                            self.begin_value(length);
                        }
                    }
                }

                State::ReadLiteralHeaderValue => {
                    let length = self.value_len as usize;
                    if src.len() - pos < length {
                        return Ok(pos);
                    }
                    let raw = &src[pos..pos + length];
                    pos += length;
                    let value = if self.huffman_encoded {
                        Bytes::from(huffman::decode(raw)?)
                    } else {
                        Bytes::copy_from_slice(raw)
                    };
                    self.complete_literal(value, listener)?;
                    self.state = State::ReadHeaderRepresentation;
                }
            }
        }
    }

    /// Finishes the current header block.
    ///
    /// Returns true when the block was truncated by the block-size limit.
    /// Resets the state machine for the next block; the dynamic table is
    /// untouched.
    pub fn end_header_block(&mut self) -> bool {
        let truncated = self.header_size > u64::from(self.max_header_block);
        if truncated {
            trace!(limit = self.max_header_block, "header block truncated");
        }
        self.header_size = 0;
        self.state = State::ReadHeaderRepresentation;
        self.index_kind = IndexKind::NotIndexed;
        self.name = Bytes::new();
        self.name_len = 0;
        self.value_len = 0;
        self.huffman_encoded = false;
        self.skip_remaining = 0;
        truncated
    }

    fn apply_size_update(&mut self, size: u32) -> Result<()> {
        if size > self.max_table_size {
            return Err(HpackError::SizeUpdateOverLimit(size, self.max_table_size));
        }
        debug!(size, "dynamic table size update");
        self.encoder_max_table_size = size;
        self.size_update_pending = false;
        self.table.set_capacity(size);
        Ok(())
    }

    /// Routes a literal representation by its name index prefix: 0 means a
    /// literal name follows, an all-ones prefix continues the integer, and
    /// anything else is a complete combined index.
    fn start_literal(&mut self, prefix: u32, prefix_max: u32) -> Result<()> {
        if prefix == 0 {
            self.state = State::ReadLiteralHeaderNameLengthPrefix;
        } else if prefix == prefix_max {
            self.name_index_base = prefix_max;
            self.state = State::ReadIndexedHeaderName;
        } else {
            self.read_name(prefix)?;
            self.state = State::ReadLiteralHeaderValueLengthPrefix;
        }
        Ok(())
    }

    /// Resolves a combined index into the pending literal's name.
    fn read_name(&mut self, index: u32) -> Result<()> {
        if let Some((name, _)) = static_table::entry(index) {
            self.name = Bytes::from_static(name);
        } else {
            let field = self
                .table
                .get(index.wrapping_sub(static_table::LENGTH))
                .ok_or(HpackError::InvalidIndex(index))?;
            self.name = field.name.clone();
        }
        self.name_len = self.name.len() as u32;
        Ok(())
    }

    /// Emits the field at a combined index. Indexed fields are never
    /// sensitive and never touch the dynamic table.
    fn emit_indexed<L: HeaderListener>(&mut self, index: u32, listener: &mut L) -> Result<()> {
        if let Some((name, value)) = static_table::entry(index) {
            self.deliver(listener, name, value, false);
            return Ok(());
        }
        let field = self
            .table
            .get(index.wrapping_sub(static_table::LENGTH))
            .ok_or(HpackError::InvalidIndex(index))?;
        let (name, value) = (field.name.clone(), field.value.clone());
        self.deliver(listener, &name, &value, false);
        Ok(())
    }

    /// Registers the declared literal name length, deciding between reading,
    /// skipping, and clearing the table. Skipped fields must still drive the
    /// same table transitions the peer performs, or the mirrors drift.
    fn begin_name(&mut self, length: u32) -> Result<()> {
        self.name_len = length;
        if self.header_size + u64::from(length) > u64::from(self.max_header_block) {
            self.header_size = u64::from(self.max_header_block) + 1;
            if self.index_kind == IndexKind::Incremental {
                if u64::from(length) + u64::from(HEADER_ENTRY_OVERHEAD)
                    <= u64::from(self.table.capacity())
                {
                    // The entry may still fit the table; the name has to be
                    // materialized for insertion even though the header is
                    // dropped.
                    self.state = State::ReadLiteralHeaderName;
                    return Ok(());
                }
                // It can never fit, which on the peer's side clears the table.
                self.table.clear();
            }
            self.name = Bytes::new();
            self.skip_remaining = length;
            self.state = State::SkipLiteralHeaderName;
            return Ok(());
        }
        if length == 0 {
            return Err(HpackError::EmptyHeaderName);
        }
        self.state = State::ReadLiteralHeaderName;
        Ok(())
    }

    /// Registers the declared literal value length; the declared name and
    /// value lengths decide skipping and table clearing before any octet of
    /// the value is read.
    fn begin_value(&mut self, length: u32) {
        self.value_len = length;
        let declared = u64::from(self.name_len) + u64::from(length);
        if self.header_size + declared > u64::from(self.max_header_block) {
            self.header_size = u64::from(self.max_header_block) + 1;
            if self.index_kind == IndexKind::Incremental {
                if declared + u64::from(HEADER_ENTRY_OVERHEAD) <= u64::from(self.table.capacity()) {
                    self.state = State::ReadLiteralHeaderValue;
                    return;
                }
                self.table.clear();
            }
            self.skip_remaining = length;
            self.state = State::SkipLiteralHeaderValue;
            return;
        }
        self.state = State::ReadLiteralHeaderValue;
    }

    /// Completes a literal: delivers the field under the block-size rule and
    /// applies the dynamic table side effect for incremental indexing.
    fn complete_literal<L: HeaderListener>(&mut self, value: Bytes, listener: &mut L) -> Result<()> {
        let name = std::mem::take(&mut self.name);
        if name.is_empty() {
            return Err(HpackError::EmptyHeaderName);
        }
        match self.index_kind {
            IndexKind::Incremental => {
                self.deliver(listener, &name, &value, false);
                self.table.add(HeaderField::new(name, value));
            }
            IndexKind::NotIndexed => self.deliver(listener, &name, &value, false),
            IndexKind::NeverIndexed => self.deliver(listener, &name, &value, true),
        }
        Ok(())
    }

    /// Delivers a field unless the block-size ceiling is hit, in which case
    /// the running total is pinned to the "truncated" sentinel.
    fn deliver<L: HeaderListener>(
        &mut self,
        listener: &mut L,
        name: &[u8],
        value: &[u8],
        sensitive: bool,
    ) {
        let octets = name.len() as u64 + value.len() as u64;
        if self.header_size + octets <= u64::from(self.max_header_block) {
            listener.on_header(name, value, sensitive);
            self.header_size += octets;
        } else {
            self.header_size = u64::from(self.max_header_block) + 1;
        }
    }
}
