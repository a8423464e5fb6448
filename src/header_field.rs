//! Header field representation.
//!
//! A header field is an HTTP name-value pair as it lives in the static and
//! dynamic tables.

use std::fmt;

use bytes::Bytes;

/// Overhead added to a field's byte length for dynamic table accounting
/// (RFC 7541 Section 4.1).
pub const HEADER_ENTRY_OVERHEAD: u32 = 32;

/// An HTTP header field (name-value pair).
///
/// Equality is byte-wise; ordering is lexicographic on the name, then on the
/// value, comparing unsigned bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeaderField {
    pub name: Bytes,
    pub value: Bytes,
}

impl HeaderField {
    /// Creates a new header field.
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Size of this field for dynamic table accounting.
    ///
    /// Per RFC 7541 Section 4.1: size = name_len + value_len + 32.
    pub fn size(&self) -> u32 {
        self.name.len() as u32 + self.value.len() as u32 + HEADER_ENTRY_OVERHEAD
    }
}

impl fmt::Debug for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HeaderField({:?}: {:?})",
            String::from_utf8_lossy(&self.name),
            String::from_utf8_lossy(&self.value)
        )
    }
}

impl From<(&'static str, &'static str)> for HeaderField {
    fn from((name, value): (&'static str, &'static str)) -> Self {
        Self::new(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_size() {
        let field = HeaderField::new("name", "value");
        assert_eq!(field.size(), 4 + 5 + 32);
    }

    #[test]
    fn test_field_from_tuple() {
        let field: HeaderField = (":method", "GET").into();
        assert_eq!(&field.name[..], b":method");
        assert_eq!(&field.value[..], b"GET");
    }

    #[test]
    fn test_field_ordering() {
        let a = HeaderField::new("a", "z");
        let b = HeaderField::new("b", "a");
        let a2 = HeaderField::new("a", "zz");
        assert!(a < b);
        assert!(a < a2);
    }
}
