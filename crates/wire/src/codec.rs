// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON encode/decode for protocol messages. The transport is a websocket,
//! which already frames individual messages, so unlike a raw TCP pipe there
//! is no length-prefix to add here: each encoded value is exactly one
//! websocket text frame.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(value).map_err(ProtocolError::Encode)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;

    #[test]
    fn encode_returns_plain_json() {
        let request = Request { request: Some("current".into()), ..Default::default() };
        let encoded = encode(&request).unwrap();
        let json_str = std::str::from_utf8(&encoded).unwrap();
        assert!(json_str.starts_with('{'));
    }

    #[test]
    fn decode_roundtrips_encode() {
        let request = Request { key: Some(wrq_core::JobKey::derive("echo hi", "/tmp")), ..Default::default() };
        let encoded = encode(&request).unwrap();
        let decoded: Request = decode(&encoded).unwrap();
        assert_eq!(request, decoded);
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let result: Result<Request, _> = decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
