//! C layout and text encodings at the bridge.
//!
//! The enumerator hands back a contiguous array of [`RawClientInfo`]
//! terminated by a record whose `name` is null. Names are single-byte text.
//! Nothing here keeps a pointer past the call that produced it: every
//! record is copied into an owned [`ClientRecord`] during the scan.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use sc_common::{ClientId, ClientRecord};

use super::EnumerationError;

/// Replacement byte for characters the single-byte encodings cannot carry.
pub const REPLACEMENT_BYTE: u8 = b'?';

/// One record of the enumerator's array.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawClientInfo {
    pub name: *const c_char,
    pub id: i32,
}

/// Copy a sentinel-terminated client array into owned records.
///
/// Scanning stops at the first record with a null `name` and never reads
/// past it. If no terminator turns up within `max_records` records the
/// whole snapshot is rejected.
///
/// # Safety
///
/// `list` must be null or point to at least `min(n + 1, max_records)`
/// readable records, where `n` is the index of the terminator. Every
/// non-null `name` before the terminator must point to a NUL-terminated
/// string that stays valid for the duration of the call.
pub unsafe fn scan_client_list(
    list: *const RawClientInfo,
    max_records: usize,
) -> Result<Vec<ClientRecord>, EnumerationError> {
    if list.is_null() {
        return Err(EnumerationError::NullRecordPointer);
    }

    let mut records = Vec::new();
    for index in 0..max_records {
        let raw = *list.add(index);
        if raw.name.is_null() {
            return Ok(records);
        }
        let name = decode_single_byte(CStr::from_ptr(raw.name).to_bytes());
        records.push(ClientRecord::new(ClientId(raw.id), name));
    }

    Err(EnumerationError::Unterminated {
        scanned: max_records,
    })
}

/// Decode single-byte text, one character per byte (Latin-1).
pub fn decode_single_byte(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode script text for the validator.
///
/// ASCII passes through. Anything else becomes `?`, once per UTF-16 code
/// unit, so the buffer has the length the validator expects.
pub fn encode_ascii_lossy(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c as u8);
        } else {
            out.extend(std::iter::repeat(REPLACEMENT_BYTE).take(c.len_utf16()));
        }
    }
    out
}

/// Encode a client name for the executor.
///
/// Characters up to U+00FF map to their byte, so names read by
/// [`decode_single_byte`] go back out unchanged.
pub fn encode_single_byte(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(b) => out.push(b),
            Err(_) => out.extend(std::iter::repeat(REPLACEMENT_BYTE).take(c.len_utf16())),
        }
    }
    out
}

/// Build a NUL-terminated buffer. An interior NUL ends the text there, as it
/// would on the C side.
pub fn nul_terminated(mut bytes: Vec<u8>) -> CString {
    if let Some(end) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(end);
    }
    CString::new(bytes).unwrap_or_default()
}
