//! Bencode wire codec (spec.md §4.2)
//!
//! Length-prefixed byte strings, signed decimal integers, lists, and
//! dictionaries whose keys must be byte strings in strictly ascending
//! lexicographic order. This format is used bit-for-bit on the wire —
//! grounded on `original_source/apps/sam/python/src/bencode.py`, the
//! codec the original `stasher.py` reuses verbatim for `messageEncode`/
//! `messageDecode`.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid integer literal")]
    InvalidInt,
    #[error("invalid length prefix")]
    InvalidLength,
    #[error("dictionary keys out of order or duplicated")]
    UnorderedKeys,
    #[error("dictionary key is not a byte string")]
    NonStringKey,
    #[error("trailing data after top-level value")]
    TrailingData,
    #[error("unrecognized type tag {0:?}")]
    UnknownTag(u8),
}

pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Int(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        Value::Bytes(b) => {
            out.extend_from_slice(b.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(b);
        }
        Value::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Value::Dict(map) => {
            out.push(b'd');
            // BTreeMap iterates in ascending key order already.
            for (k, v) in map.iter() {
                encode_into(&Value::Bytes(k.clone()), out);
                encode_into(v, out);
            }
            out.push(b'e');
        }
    }
}

pub fn decode(input: &[u8]) -> Result<Value, CodecError> {
    let mut pos = 0usize;
    let value = decode_value(input, &mut pos)?;
    if pos != input.len() {
        return Err(CodecError::TrailingData);
    }
    Ok(value)
}

fn decode_value(input: &[u8], pos: &mut usize) -> Result<Value, CodecError> {
    let tag = *input.get(*pos).ok_or(CodecError::UnexpectedEof)?;
    match tag {
        b'i' => decode_int(input, pos),
        b'l' => decode_list(input, pos),
        b'd' => decode_dict(input, pos),
        b'0'..=b'9' => decode_bytes(input, pos).map(Value::Bytes),
        other => Err(CodecError::UnknownTag(other)),
    }
}

fn decode_int(input: &[u8], pos: &mut usize) -> Result<Value, CodecError> {
    debug_assert_eq!(input[*pos], b'i');
    *pos += 1;
    let start = *pos;
    let end = find_byte(input, *pos, b'e')?;
    let raw = &input[start..end];
    validate_int_literal(raw)?;
    let text = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidInt)?;
    let n: i64 = text.parse().map_err(|_| CodecError::InvalidInt)?;
    *pos = end + 1;
    Ok(Value::Int(n))
}

fn validate_int_literal(raw: &[u8]) -> Result<(), CodecError> {
    if raw.is_empty() {
        return Err(CodecError::InvalidInt);
    }
    let (sign, digits) = if raw[0] == b'-' { (true, &raw[1..]) } else { (false, raw) };
    if digits.is_empty() || !digits.iter().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::InvalidInt);
    }
    if sign && digits == b"0" {
        // forbidden i-0e
        return Err(CodecError::InvalidInt);
    }
    if digits.len() > 1 && digits[0] == b'0' {
        // leading zeros forbidden except bare i0e
        return Err(CodecError::InvalidInt);
    }
    Ok(())
}

fn decode_bytes(input: &[u8], pos: &mut usize) -> Result<Vec<u8>, CodecError> {
    let start = *pos;
    let colon = find_byte(input, start, b':')?;
    let len_raw = &input[start..colon];
    if len_raw.is_empty() || !len_raw.iter().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::InvalidLength);
    }
    if len_raw.len() > 1 && len_raw[0] == b'0' {
        return Err(CodecError::InvalidLength);
    }
    let len: usize = std::str::from_utf8(len_raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CodecError::InvalidLength)?;
    let data_start = colon + 1;
    let data_end = data_start.checked_add(len).ok_or(CodecError::InvalidLength)?;
    if data_end > input.len() {
        return Err(CodecError::UnexpectedEof);
    }
    *pos = data_end;
    Ok(input[data_start..data_end].to_vec())
}

fn decode_list(input: &[u8], pos: &mut usize) -> Result<Value, CodecError> {
    debug_assert_eq!(input[*pos], b'l');
    *pos += 1;
    let mut items = Vec::new();
    loop {
        match input.get(*pos) {
            None => return Err(CodecError::UnexpectedEof),
            Some(b'e') => {
                *pos += 1;
                break;
            }
            _ => items.push(decode_value(input, pos)?),
        }
    }
    Ok(Value::List(items))
}

fn decode_dict(input: &[u8], pos: &mut usize) -> Result<Value, CodecError> {
    debug_assert_eq!(input[*pos], b'd');
    *pos += 1;
    let mut map = BTreeMap::new();
    let mut last_key: Option<Vec<u8>> = None;
    loop {
        match input.get(*pos) {
            None => return Err(CodecError::UnexpectedEof),
            Some(b'e') => {
                *pos += 1;
                break;
            }
            Some(b'0'..=b'9') => {
                let key = decode_bytes(input, pos)?;
                if let Some(prev) = &last_key {
                    if key <= *prev {
                        return Err(CodecError::UnorderedKeys);
                    }
                }
                let value = decode_value(input, pos)?;
                last_key = Some(key.clone());
                map.insert(key, value);
            }
            _ => return Err(CodecError::NonStringKey),
        }
    }
    Ok(Value::Dict(map))
}

fn find_byte(input: &[u8], from: usize, needle: u8) -> Result<usize, CodecError> {
    input[from..]
        .iter()
        .position(|&b| b == needle)
        .map(|p| from + p)
        .ok_or(CodecError::UnexpectedEof)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(pairs: &[(&str, Value)]) -> Value {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert(k.as_bytes().to_vec(), v.clone());
        }
        Value::Dict(map)
    }

    #[test]
    fn encode_dict_matches_spec_example() {
        let v = dict(&[
            ("age", Value::Int(25)),
            ("eyes", Value::Bytes(b"blue".to_vec())),
        ]);
        assert_eq!(encode(&v), b"d3:agei25e4:eyes4:bluee".to_vec());
    }

    #[test]
    fn decode_list_of_ints() {
        let v = decode(b"li1ei2ei3ee").unwrap();
        assert_eq!(
            v,
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn decode_rejects_unordered_keys() {
        let err = decode(b"d1:b0:1:a0:e").unwrap_err();
        assert_eq!(err, CodecError::UnorderedKeys);
    }

    #[test]
    fn decode_rejects_duplicate_keys() {
        let err = decode(b"d1:a0:1:a0:e").unwrap_err();
        assert_eq!(err, CodecError::UnorderedKeys);
    }

    #[test]
    fn decode_rejects_trailing_data() {
        let err = decode(b"i1ee").unwrap_err();
        assert_eq!(err, CodecError::TrailingData);
    }

    #[test]
    fn decode_rejects_leading_zero() {
        assert!(decode(b"i01e").is_err());
        assert!(decode(b"i0e").is_ok());
    }

    #[test]
    fn decode_rejects_negative_zero() {
        assert!(decode(b"i-0e").is_err());
    }

    #[test]
    fn round_trip_arbitrary_value() {
        let v = dict(&[
            (
                "nodes",
                Value::List(vec![Value::Bytes(b"dest-a".to_vec()), Value::Bytes(b"dest-b".to_vec())]),
            ),
            ("msgId", Value::Int(42)),
        ]);
        let encoded = encode(&v);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(v, decoded);
    }
}
