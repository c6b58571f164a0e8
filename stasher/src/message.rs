//! On-the-wire message envelope (spec.md §6)

use crate::codec::{CodecError, Value};
use crate::id::Identifier;
use std::collections::BTreeMap;

/// A message id, unique within the sending node (per-node monotonic counter).
pub type MsgId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Ping,
    FindNode { hash: Identifier },
    FindData { hash: Identifier },
    Store { key: Identifier, value: Vec<u8> },
}

/// A reply's payload is interpreted by the RPC that owns the binding, not
/// by the wire format itself — `nodes` may carry destinations or, for
/// FIND_VALUE, a single value (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
    Ping,
    FindNode { nodes: Vec<Vec<u8>> },
    FindValueNodes { nodes: Vec<Vec<u8>> },
    FindValueData { value: Vec<u8> },
    Store { status: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request { msg_id: MsgId, request: Request },
    Reply { msg_id: MsgId, payload: ReplyPayload },
}

impl Message {
    pub fn msg_id(&self) -> MsgId {
        match self {
            Message::Request { msg_id, .. } => *msg_id,
            Message::Reply { msg_id, .. } => *msg_id,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        match self {
            Message::Request { msg_id, request } => {
                match request {
                    Request::Ping => {
                        map.insert(b"type".to_vec(), Value::Bytes(b"ping".to_vec()));
                    }
                    Request::FindNode { hash } => {
                        map.insert(b"type".to_vec(), Value::Bytes(b"findNode".to_vec()));
                        map.insert(b"hash".to_vec(), Value::Bytes(hash.as_bytes().to_vec()));
                    }
                    Request::FindData { hash } => {
                        map.insert(b"type".to_vec(), Value::Bytes(b"findData".to_vec()));
                        map.insert(b"hash".to_vec(), Value::Bytes(hash.as_bytes().to_vec()));
                    }
                    Request::Store { key, value } => {
                        map.insert(b"type".to_vec(), Value::Bytes(b"store".to_vec()));
                        map.insert(b"key".to_vec(), Value::Bytes(key.to_hex().into_bytes()));
                        map.insert(b"value".to_vec(), Value::Bytes(value.clone()));
                    }
                }
                map.insert(b"msgId".to_vec(), Value::Int(*msg_id as i64));
            }
            Message::Reply { msg_id, payload } => {
                map.insert(b"type".to_vec(), Value::Bytes(b"reply".to_vec()));
                map.insert(b"msgId".to_vec(), Value::Int(*msg_id as i64));
                match payload {
                    ReplyPayload::Ping => {}
                    ReplyPayload::FindNode { nodes } | ReplyPayload::FindValueNodes { nodes } => {
                        map.insert(
                            b"nodes".to_vec(),
                            Value::List(nodes.iter().map(|d| Value::Bytes(d.clone())).collect()),
                        );
                    }
                    ReplyPayload::FindValueData { value } => {
                        map.insert(b"nodes".to_vec(), Value::Bytes(value.clone()));
                    }
                    ReplyPayload::Store { status } => {
                        map.insert(
                            b"status".to_vec(),
                            Value::Int(if *status { 1 } else { 0 }),
                        );
                    }
                }
            }
        }
        Value::Dict(map)
    }

    pub fn encode(&self) -> Vec<u8> {
        crate::codec::encode(&self.to_value())
    }

    pub fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
        let value = crate::codec::decode(bytes)?;
        Message::from_value(&value)
    }

    /// Decode a request datagram whose reply shape is not yet known.
    pub fn from_value(value: &Value) -> Result<Message, CodecError> {
        let dict = value.as_dict().ok_or(CodecError::NonStringKey)?;
        let ty = dict
            .get(b"type".as_slice())
            .and_then(Value::as_bytes)
            .ok_or(CodecError::UnexpectedEof)?;
        let msg_id = dict
            .get(b"msgId".as_slice())
            .and_then(Value::as_int)
            .ok_or(CodecError::UnexpectedEof)? as MsgId;

        let hash_of = |dict: &BTreeMap<Vec<u8>, Value>| -> Result<Identifier, CodecError> {
            let raw = dict
                .get(b"hash".as_slice())
                .and_then(Value::as_bytes)
                .ok_or(CodecError::UnexpectedEof)?;
            let mut bytes = [0u8; crate::id::ID_BYTES];
            if raw.len() != bytes.len() {
                return Err(CodecError::InvalidLength);
            }
            bytes.copy_from_slice(raw);
            Ok(Identifier::from_bytes(bytes))
        };

        match ty {
            b"ping" => Ok(Message::Request {
                msg_id,
                request: Request::Ping,
            }),
            b"findNode" => Ok(Message::Request {
                msg_id,
                request: Request::FindNode { hash: hash_of(dict)? },
            }),
            b"findData" => Ok(Message::Request {
                msg_id,
                request: Request::FindData { hash: hash_of(dict)? },
            }),
            b"store" => {
                let key_hex = dict
                    .get(b"key".as_slice())
                    .and_then(Value::as_bytes)
                    .ok_or(CodecError::UnexpectedEof)?;
                let key_hex = std::str::from_utf8(key_hex).map_err(|_| CodecError::InvalidInt)?;
                let key = Identifier::from_hex(key_hex).map_err(|_| CodecError::InvalidInt)?;
                let value = dict
                    .get(b"value".as_slice())
                    .and_then(Value::as_bytes)
                    .ok_or(CodecError::UnexpectedEof)?
                    .to_vec();
                Ok(Message::Request {
                    msg_id,
                    request: Request::Store { key, value },
                })
            }
            b"reply" => {
                let payload = if let Some(status) = dict.get(b"status".as_slice()).and_then(Value::as_int) {
                    ReplyPayload::Store { status: status != 0 }
                } else if let Some(nodes_val) = dict.get(b"nodes".as_slice()) {
                    match nodes_val {
                        Value::List(items) => {
                            let mut nodes = Vec::with_capacity(items.len());
                            for item in items {
                                nodes.push(item.as_bytes().ok_or(CodecError::NonStringKey)?.to_vec());
                            }
                            ReplyPayload::FindNode { nodes }
                        }
                        Value::Bytes(b) => ReplyPayload::FindValueData { value: b.clone() },
                        _ => return Err(CodecError::NonStringKey),
                    }
                } else {
                    ReplyPayload::Ping
                };
                Ok(Message::Reply { msg_id, payload })
            }
            other => Err(CodecError::UnknownTag(other.first().copied().unwrap_or(0))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_round_trips() {
        let msg = Message::Request {
            msg_id: 7,
            request: Request::Ping,
        };
        let encoded = msg.encode();
        let decoded = Message::decode(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn find_node_reply_round_trips() {
        let msg = Message::Reply {
            msg_id: 9,
            payload: ReplyPayload::FindNode {
                nodes: vec![b"dest-a".to_vec(), b"dest-b".to_vec()],
            },
        };
        let decoded = Message::decode(&msg.encode()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn find_value_data_reply_round_trips() {
        let msg = Message::Reply {
            msg_id: 3,
            payload: ReplyPayload::FindValueData {
                value: b"hello".to_vec(),
            },
        };
        let decoded = Message::decode(&msg.encode()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn store_request_round_trips() {
        let key = Identifier::from_destination(b"some-key");
        let msg = Message::Request {
            msg_id: 1,
            request: Request::Store {
                key,
                value: b"payload".to_vec(),
            },
        };
        let decoded = Message::decode(&msg.encode()).unwrap();
        assert_eq!(msg, decoded);
    }
}
