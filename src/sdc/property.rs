//! Helpers for the property sidecar: `(name, value)` UTF-16 pairs stored as
//! fixed 2048-byte records in a name-sorted array at the file tail.

use std::cmp::Ordering;

use byteorder::{ByteOrder, LittleEndian};

/// UTF-16 code units in the name (or value) field of a property record.
pub(crate) const PROPERTY_TEXT_LEN: usize = 256;

/// On-disk size of the name (or value) field of a record.
pub(crate) const PROPERTY_FIELD_SIZE: usize = 2 * PROPERTY_TEXT_LEN;

/// On-disk stride of one `(name, value)` record. The name and value fields
/// sit at offsets 0 and 512; the rest of the record is reserved.
pub(crate) const PROPERTY_RECORD_SIZE: usize = 2048;

/// Encodes `key` as null-terminated UTF-16 code units for record comparison.
pub(crate) fn encode_key(key: &str) -> Vec<u16> {
    let mut units: Vec<u16> = key.encode_utf16().collect();
    units.push(0);
    units
}

/// Compares a stored null-terminated UTF-16 field against an encoded key,
/// code unit by code unit.
pub(crate) fn cmp_utf16(stored: &[u8], key: &[u16]) -> Ordering {
    let units = stored.len() / 2;
    for (i, &k) in key.iter().enumerate() {
        if i >= units {
            return Ordering::Less;
        }
        let s = LittleEndian::read_u16(&stored[2 * i..]);
        if s != k {
            return s.cmp(&k);
        }
        if s == 0 {
            return Ordering::Equal;
        }
    }
    Ordering::Equal
}

/// Decodes a null-terminated UTF-16 field into an owned string.
pub(crate) fn decode_field(raw: &[u8]) -> String {
    let mut units = Vec::with_capacity(raw.len() / 2);
    for chunk in raw.chunks_exact(2) {
        let u = u16::from_le_bytes([chunk[0], chunk[1]]);
        if u == 0 {
            break;
        }
        units.push(u);
    }
    String::from_utf16_lossy(&units)
}

/// Encodes a field the way the writer lays it out: UTF-16 text padded with
/// zeroes to the fixed field size.
#[cfg(test)]
pub(crate) fn encode_field(text: &str) -> Vec<u8> {
    let mut raw = vec![0u8; PROPERTY_FIELD_SIZE];
    for (i, u) in text.encode_utf16().take(PROPERTY_TEXT_LEN - 1).enumerate() {
        LittleEndian::write_u16(&mut raw[2 * i..], u);
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmp_utf16() {
        let brand = encode_field("brand");
        assert_eq!(cmp_utf16(&brand, &encode_key("brand")), Ordering::Equal);
        assert_eq!(cmp_utf16(&brand, &encode_key("locale")), Ordering::Less);
        assert_eq!(cmp_utf16(&brand, &encode_key("alpha")), Ordering::Greater);

        // a stored prefix of the key sorts before it, and vice versa
        assert_eq!(cmp_utf16(&brand, &encode_key("brandy")), Ordering::Less);
        assert_eq!(cmp_utf16(&brand, &encode_key("bran")), Ordering::Greater);
    }

    #[test]
    fn test_decode_field() {
        assert_eq!(decode_field(&encode_field("en-US")), "en-US");
        assert_eq!(decode_field(&encode_field("")), "");

        // non-ASCII round-trips through UTF-16
        assert_eq!(decode_field(&encode_field("слово")), "слово");
    }
}
