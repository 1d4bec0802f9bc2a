//! PDF text-string codec for field names, labels and values.
//!
//! PDF text strings are either UTF-16BE with a `FE FF` byte-order mark or
//! PDFDocEncoding. Many producers also write plain UTF-8, so that is tried
//! before falling back to a Latin-1 reading of PDFDocEncoding.

use lopdf::{Object, StringFormat};

/// Decode a PDF text string.
pub(crate) fn decode(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Encode a value as a PDF string object.
///
/// ASCII stays a literal string; anything else becomes UTF-16BE with a BOM,
/// which every conforming reader accepts for text strings.
pub(crate) fn encode(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Read a string or name object as text. Other object types yield `None`.
pub(crate) fn object_text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}
