//! HPACK: Header Compression for HTTP/2 (RFC 7541)
//!
//! This crate provides the paired HPACK codec: an [`Encoder`] that serializes
//! header fields into a header block octet stream, and a [`Decoder`] that
//! consumes such a stream incrementally and emits the reconstituted fields to
//! a listener. Both sides maintain the stateful compression context the
//! protocol requires: the fixed static table, a size-bounded dynamic table
//! with FIFO eviction, the N-bit-prefix integer encoding and the canonical
//! Huffman coding of string literals.
//!
//! # Features
//!
//! - **RFC 7541 conformant wire format**: interoperates with any conforming
//!   HPACK peer.
//! - **Incremental decoding**: the decoder parks between bytes when input
//!   runs dry and resumes on the next call, without buffering literals.
//! - **Bounded memory**: the dynamic table is capped in octets; oversized
//!   header fields are skipped without being materialized.
//! - **No I/O**: the codec is a pure, synchronous transformation over byte
//!   buffers. Transport, framing and header validation belong to the host.
//!
//! # Example
//!
//! ```rust
//! use bytes::BytesMut;
//! use hpack_codec::{Decoder, Encoder};
//!
//! let mut encoder = Encoder::new(4096);
//! let mut decoder = Decoder::new(8192, 4096);
//!
//! let mut block = BytesMut::new();
//! encoder.encode_header(&mut block, b":method", b"GET", false);
//! encoder.encode_header(&mut block, b"authorization", b"secret", true);
//!
//! let mut headers = Vec::new();
//! let consumed = decoder
//!     .decode(&block, &mut |name: &[u8], value: &[u8], sensitive: bool| {
//!         headers.push((name.to_vec(), value.to_vec(), sensitive));
//!     })
//!     .unwrap();
//! assert_eq!(consumed, block.len());
//! assert!(!decoder.end_header_block());
//! assert_eq!(headers.len(), 2);
//! ```

pub mod decoder;
pub mod dynamic_table;
pub mod encoder;
pub mod error;
pub mod header_field;
pub mod huffman;
pub mod integer;
pub mod static_table;

// Re-export main types
pub use decoder::{Decoder, HeaderListener};
pub use dynamic_table::DynamicTable;
pub use encoder::Encoder;
pub use error::{HpackError, Result};
pub use header_field::{HeaderField, HEADER_ENTRY_OVERHEAD};

// Re-export codec primitives for benchmarking and testing
pub use huffman::{decode as huffman_decode, encode as huffman_encode, encoded_len as huffman_encoded_len};
pub use integer::{decode as decode_integer, encode as encode_integer};
