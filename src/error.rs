//! HPACK error types per RFC 7541.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HpackError>;

/// Errors raised while processing a header block.
///
/// Every variant maps to a COMPRESSION_ERROR at the HTTP/2 layer: the
/// compression state is no longer trustworthy and the connection must be
/// torn down (RFC 7540 Section 4.3). The codec itself performs no recovery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HpackError {
    /// Index 0 used as an indexed header field, or an index beyond the
    /// combined static + dynamic table (RFC 7541 Section 6.1).
    #[error("invalid header table index: {0}")]
    InvalidIndex(u32),

    /// A prefix-coded integer exceeds 2^31 - 1 (RFC 7541 Section 5.1).
    #[error("integer overflow in prefix-coded integer")]
    IntegerOverflow,

    /// The EOS symbol appeared inside a Huffman-coded string
    /// (RFC 7541 Section 5.2).
    #[error("EOS symbol in huffman-coded string")]
    HuffmanEos,

    /// Trailing bits of a Huffman-coded string are not a strict prefix of
    /// the EOS code, or the padding spans 8 bits or more.
    #[error("invalid huffman padding")]
    HuffmanPadding,

    /// A dynamic table size update exceeds the limit configured on this
    /// side (RFC 7541 Section 6.3).
    #[error("dynamic table size update {0} exceeds limit {1}")]
    SizeUpdateOverLimit(u32, u32),

    /// The receiver shrank its table limit but the peer's next header block
    /// did not lead with the mandatory size update (RFC 7541 Section 4.2).
    #[error("expected dynamic table size update")]
    MissingSizeUpdate,

    /// A header field with a zero-length name was decoded.
    #[error("zero-length header name")]
    EmptyHeaderName,
}
