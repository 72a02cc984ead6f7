//! Frame codec.
//!
//! A frame is `command:json`. Decoding splits on the first `:` only, so the
//! JSON payload may itself contain colons. No length limit is applied here;
//! the transport bounds message size.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value;

use crate::error::FrameError;

const SEPARATOR: u8 = b':';

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub command: String,
    pub payload: Value,
}

impl Frame {
    /// Create a frame, validating the command token.
    pub fn new(command: impl Into<String>, payload: Value) -> Result<Self, FrameError> {
        let command = command.into();
        if !is_valid_command(&command) {
            return Err(FrameError::InvalidCommand(command));
        }
        Ok(Self { command, payload })
    }

    /// Encode this frame to wire bytes.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        encode(&self.command, &self.payload)
    }
}

/// Returns true if `command` matches `[A-Za-z0-9._-]+`.
pub fn is_valid_command(command: &str) -> bool {
    is_valid_token(command.as_bytes())
}

fn is_valid_token(token: &[u8]) -> bool {
    !token.is_empty()
        && token
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Encode `command` and `payload` as `command:json`.
pub fn encode(command: &str, payload: &Value) -> Result<Bytes, FrameError> {
    if !is_valid_command(command) {
        return Err(FrameError::InvalidCommand(command.to_string()));
    }

    let json =
        serde_json::to_vec(payload).map_err(|e| FrameError::InvalidPayload(e.to_string()))?;

    let mut buf = BytesMut::with_capacity(command.len() + 1 + json.len());
    buf.put_slice(command.as_bytes());
    buf.put_u8(SEPARATOR);
    buf.put_slice(&json);
    Ok(buf.freeze())
}

/// Decode wire bytes into a frame.
pub fn decode(bytes: &[u8]) -> Result<Frame, FrameError> {
    let pos = bytes
        .iter()
        .position(|b| *b == SEPARATOR)
        .ok_or_else(|| FrameError::Malformed("missing ':' separator".to_string()))?;

    let (token, rest) = (&bytes[..pos], &bytes[pos + 1..]);
    if !is_valid_token(token) {
        return Err(FrameError::Malformed(format!(
            "invalid command token {:?}",
            String::from_utf8_lossy(token)
        )));
    }

    let payload: Value =
        serde_json::from_slice(rest).map_err(|e| FrameError::InvalidPayload(e.to_string()))?;

    // The token was checked to be ASCII above.
    let command = String::from_utf8_lossy(token).into_owned();

    Ok(Frame { command, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_encode_layout() {
        let bytes = encode("status", &json!({"version": 1})).unwrap();
        assert_eq!(&bytes[..], b"status:{\"version\":1}");
    }

    #[test]
    fn test_decode_splits_on_first_separator() {
        let frame = decode(b"join:{\"agent\":\"a:b\",\"url\":\"http://x\"}").unwrap();
        assert_eq!(frame.command, "join");
        assert_eq!(frame.payload["agent"], "a:b");
        assert_eq!(frame.payload["url"], "http://x");
    }

    #[rstest]
    #[case::no_separator(b"status".as_slice())]
    #[case::empty(b"".as_slice())]
    #[case::empty_command(b":{}".as_slice())]
    #[case::space_in_command(b"sta tus:{}".as_slice())]
    #[case::non_ascii_command("stätus:{}".as_bytes())]
    fn test_decode_malformed(#[case] input: &[u8]) {
        let err = decode(input).unwrap_err();
        assert!(err.is_malformed(), "expected malformed, got {err:?}");
    }

    #[rstest]
    #[case::empty_payload(b"status:".as_slice())]
    #[case::truncated(b"status:{\"version\":".as_slice())]
    #[case::bare_word(b"status:hello".as_slice())]
    fn test_decode_invalid_payload(#[case] input: &[u8]) {
        let err = decode(input).unwrap_err();
        assert!(matches!(err, FrameError::InvalidPayload(_)), "got {err:?}");
    }

    #[rstest]
    #[case("")]
    #[case("has:colon")]
    #[case("white space")]
    fn test_encode_rejects_bad_command(#[case] command: &str) {
        assert_eq!(
            encode(command, &Value::Null).unwrap_err(),
            FrameError::InvalidCommand(command.to_string())
        );
        assert!(Frame::new(command, Value::Null).is_err());
    }

    #[test]
    fn test_payload_may_be_any_json_value() {
        for payload in [json!(null), json!(3), json!("x"), json!([1, 2]), json!({})] {
            let frame = Frame::new("ping.v1", payload.clone()).unwrap();
            let decoded = decode(&frame.encode().unwrap()).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            ".*".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z:]{0,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_round_trip(command in "[A-Za-z0-9._-]{1,24}", payload in json_value()) {
            let bytes = encode(&command, &payload).unwrap();
            let frame = decode(&bytes).unwrap();
            prop_assert_eq!(frame.command, command);
            prop_assert_eq!(frame.payload, payload);
        }

        #[test]
        fn prop_no_separator_is_malformed(input in "[^:]*") {
            prop_assert!(decode(input.as_bytes()).unwrap_err().is_malformed());
        }
    }
}
