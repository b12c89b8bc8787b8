//! Wire-level response shape.
//!
//! Responses arrive as JSON frames: `{"id": <u64>, "status": <string>,
//! "payload": <value>}`. The status string is either `OK`, `NULL`, or
//! `BAD_RESPONSE <TOKEN> <detail...>`. Parsing is total over status
//! strings: anything unrecognized is preserved as a bad status whose token
//! is the raw text, so no information is lost before classification.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Wire-level error tokens returned by the backend.
pub mod token {
    pub const BAD_SIGNATURE: &str = "BAD_SIGNATURE";
    pub const BAD_GUID: &str = "BAD_GUID";
    pub const DUPLICATE_GUID: &str = "DUPLICATE_GUID";
    pub const BAD_ACCOUNT: &str = "BAD_ACCOUNT";
    pub const BAD_ALIAS: &str = "BAD_ALIAS";
    pub const DUPLICATE_ALIAS: &str = "DUPLICATE_ALIAS";
    pub const DUPLICATE_FIELD: &str = "DUPLICATE_FIELD";
    pub const FIELD_NOT_FOUND: &str = "FIELD_NOT_FOUND";
    pub const BAD_GROUP: &str = "BAD_GROUP";
    pub const DUPLICATE_GROUP: &str = "DUPLICATE_GROUP";
    pub const DUPLICATE_NAME: &str = "DUPLICATE_NAME";
    pub const ACCESS_DENIED: &str = "ACCESS_DENIED";
    pub const VERIFICATION_ERROR: &str = "VERIFICATION_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const UNSPECIFIED_ERROR: &str = "UNSPECIFIED_ERROR";
}

const STATUS_OK: &str = "OK";
const STATUS_NULL: &str = "NULL";
const STATUS_BAD_PREFIX: &str = "BAD_RESPONSE";

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed response frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parsed response status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// Successful but empty result.
    Null,
    Bad {
        token: String,
        detail: String,
    },
}

impl Status {
    /// Parse a wire status string. Total: never fails.
    pub fn parse(raw: &str) -> Self {
        match raw {
            STATUS_OK => Status::Ok,
            STATUS_NULL => Status::Null,
            _ => {
                let rest = raw.strip_prefix(STATUS_BAD_PREFIX).unwrap_or(raw);
                let rest = rest.trim_start();
                match rest.split_once(' ') {
                    Some((token, detail)) => Status::Bad {
                        token: token.to_string(),
                        detail: detail.trim().to_string(),
                    },
                    None => Status::Bad {
                        token: if rest.is_empty() {
                            token::UNSPECIFIED_ERROR.to_string()
                        } else {
                            rest.to_string()
                        },
                        detail: String::new(),
                    },
                }
            }
        }
    }
}

/// A response frame, correlated to a dispatch by `id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub id: u64,
    pub status: Status,
    pub payload: Value,
}

#[derive(Deserialize)]
struct RawResponse {
    id: u64,
    status: String,
    #[serde(default)]
    payload: Value,
}

impl Response {
    pub fn from_frame(frame: &[u8]) -> Result<Self, Error> {
        let raw: RawResponse = serde_json::from_slice(frame)?;
        Ok(Self {
            id: raw.id,
            status: Status::parse(&raw.status),
            payload: raw.payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_ok_with_payload() {
        let frame = json!({"id": 42, "status": "OK", "payload": "hello"}).to_string();
        let response = Response::from_frame(frame.as_bytes()).unwrap();
        assert_eq!(response.id, 42);
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.payload, json!("hello"));
    }

    #[test]
    fn null_status_is_successful_and_empty() {
        let frame = json!({"id": 7, "status": "NULL"}).to_string();
        let response = Response::from_frame(frame.as_bytes()).unwrap();
        assert_eq!(response.status, Status::Null);
        assert_eq!(response.payload, Value::Null);
    }

    #[test]
    fn bad_response_splits_token_and_detail() {
        assert_eq!(
            Status::parse("BAD_RESPONSE BAD_SIGNATURE signature mismatch"),
            Status::Bad {
                token: "BAD_SIGNATURE".to_string(),
                detail: "signature mismatch".to_string(),
            }
        );
        assert_eq!(
            Status::parse("BAD_RESPONSE FIELD_NOT_FOUND"),
            Status::Bad {
                token: "FIELD_NOT_FOUND".to_string(),
                detail: String::new(),
            }
        );
    }

    #[test]
    fn unknown_status_is_preserved_as_bad() {
        let status = Status::parse("SOMETHING_WEIRD");
        assert_eq!(
            status,
            Status::Bad {
                token: "SOMETHING_WEIRD".to_string(),
                detail: String::new(),
            }
        );

        // Bare prefix with no token degrades to the unspecified token.
        assert_eq!(
            Status::parse("BAD_RESPONSE"),
            Status::Bad {
                token: token::UNSPECIFIED_ERROR.to_string(),
                detail: String::new(),
            }
        );
    }

    #[test]
    fn structured_payloads_survive() {
        let frame =
            json!({"id": 1, "status": "OK", "payload": {"values": [1, 2, 3]}}).to_string();
        let response = Response::from_frame(frame.as_bytes()).unwrap();
        assert_eq!(response.payload["values"], json!([1, 2, 3]));
    }

    #[test]
    fn malformed_frames_error() {
        assert!(Response::from_frame(b"not json").is_err());
        assert!(Response::from_frame(br#"{"status": "OK"}"#).is_err());
    }
}
