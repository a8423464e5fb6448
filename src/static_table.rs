//! HPACK static table (RFC 7541 Appendix A).
//!
//! 61 predefined header fields with fixed 1-based indices, identical on both
//! peers. Entries sharing a name are contiguous, which the name-and-value
//! lookup relies on.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Static table entries: `(name, value)`, indices 1..=61.
const ENTRIES: [(&[u8], &[u8]); 61] = [
    (b":authority", b""),                   // 1
    (b":method", b"GET"),                   // 2
    (b":method", b"POST"),                  // 3
    (b":path", b"/"),                       // 4
    (b":path", b"/index.html"),             // 5
    (b":scheme", b"http"),                  // 6
    (b":scheme", b"https"),                 // 7
    (b":status", b"200"),                   // 8
    (b":status", b"204"),                   // 9
    (b":status", b"206"),                   // 10
    (b":status", b"304"),                   // 11
    (b":status", b"400"),                   // 12
    (b":status", b"404"),                   // 13
    (b":status", b"500"),                   // 14
    (b"accept-charset", b""),               // 15
    (b"accept-encoding", b"gzip, deflate"), // 16
    (b"accept-language", b""),              // 17
    (b"accept-ranges", b""),                // 18
    (b"accept", b""),                       // 19
    (b"access-control-allow-origin", b""),  // 20
    (b"age", b""),                          // 21
    (b"allow", b""),                        // 22
    (b"authorization", b""),                // 23
    (b"cache-control", b""),                // 24
    (b"content-disposition", b""),          // 25
    (b"content-encoding", b""),             // 26
    (b"content-language", b""),             // 27
    (b"content-length", b""),               // 28
    (b"content-location", b""),             // 29
    (b"content-range", b""),                // 30
    (b"content-type", b""),                 // 31
    (b"cookie", b""),                       // 32
    (b"date", b""),                         // 33
    (b"etag", b""),                         // 34
    (b"expect", b""),                       // 35
    (b"expires", b""),                      // 36
    (b"from", b""),                         // 37
    (b"host", b""),                         // 38
    (b"if-match", b""),                     // 39
    (b"if-modified-since", b""),            // 40
    (b"if-none-match", b""),                // 41
    (b"if-range", b""),                     // 42
    (b"if-unmodified-since", b""),          // 43
    (b"last-modified", b""),                // 44
    (b"link", b""),                         // 45
    (b"location", b""),                     // 46
    (b"max-forwards", b""),                 // 47
    (b"proxy-authenticate", b""),           // 48
    (b"proxy-authorization", b""),          // 49
    (b"range", b""),                        // 50
    (b"referer", b""),                      // 51
    (b"refresh", b""),                      // 52
    (b"retry-after", b""),                  // 53
    (b"server", b""),                       // 54
    (b"set-cookie", b""),                   // 55
    (b"strict-transport-security", b""),    // 56
    (b"transfer-encoding", b""),            // 57
    (b"user-agent", b""),                   // 58
    (b"vary", b""),                         // 59
    (b"via", b""),                          // 60
    (b"www-authenticate", b""),             // 61
];

/// Number of entries in the static table.
pub const LENGTH: u32 = ENTRIES.len() as u32;

static NAME_INDEX: OnceLock<HashMap<&'static [u8], u32>> = OnceLock::new();

/// Name to smallest index, built once. Reverse iteration makes the earliest
/// occurrence of each name win.
fn name_index() -> &'static HashMap<&'static [u8], u32> {
    NAME_INDEX.get_or_init(|| {
        let mut map = HashMap::with_capacity(ENTRIES.len());
        for (i, &(name, _)) in ENTRIES.iter().enumerate().rev() {
            map.insert(name, i as u32 + 1);
        }
        map
    })
}

/// Returns the entry at the given 1-based index.
pub fn entry(index: u32) -> Option<(&'static [u8], &'static [u8])> {
    if (1..=LENGTH).contains(&index) {
        Some(ENTRIES[index as usize - 1])
    } else {
        None
    }
}

/// Returns the smallest index whose entry has the given name.
pub fn index_of_name(name: &[u8]) -> Option<u32> {
    name_index().get(name).copied()
}

/// Returns the index of the entry matching both name and value.
///
/// Entries sharing a name are contiguous, so the scan starts at the first
/// entry with the name and stops as soon as the name changes.
pub fn index_of(name: &[u8], value: &[u8]) -> Option<u32> {
    let first = index_of_name(name)?;
    for index in first..=LENGTH {
        let (n, v) = ENTRIES[index as usize - 1];
        if n != name {
            break;
        }
        if v == value {
            return Some(index);
        }
    }
    None
}
