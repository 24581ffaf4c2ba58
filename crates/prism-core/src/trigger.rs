//! Trigger input
//!
//! Parses S3 event notifications into [`SourceDescriptor`]s. Object keys in
//! notifications are form-encoded: `+` stands for a space and everything else
//! is percent-encoded.

use percent_encoding::percent_decode_str;
use serde::Deserialize;
use thiserror::Error;

use crate::models::SourceDescriptor;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("malformed event notification: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("event notification contains no records")]
    NoRecords,

    #[error("object key is not validly percent-encoded: {key}")]
    InvalidKeyEncoding { key: String },
}

#[derive(Debug, Deserialize)]
struct S3Event {
    #[serde(rename = "Records", default)]
    records: Vec<S3EventRecord>,
}

#[derive(Debug, Deserialize)]
struct S3EventRecord {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
}

/// Parse a notification and decode every record, in order.
pub fn parse_event(payload: &str) -> Result<Vec<SourceDescriptor>, TriggerError> {
    let event: S3Event = serde_json::from_str(payload)?;
    if event.records.is_empty() {
        return Err(TriggerError::NoRecords);
    }

    event
        .records
        .into_iter()
        .map(|record| {
            let key = decode_object_key(&record.s3.object.key)?;
            Ok(SourceDescriptor::new(record.s3.bucket.name, key))
        })
        .collect()
}

/// Decode a notification object key: `+` becomes a space, then percent-decode.
///
/// A `%` not followed by two hex digits, or bytes that are not UTF-8 once
/// decoded, reject the key.
pub fn decode_object_key(raw: &str) -> Result<String, TriggerError> {
    if !has_valid_escapes(raw) {
        return Err(TriggerError::InvalidKeyEncoding {
            key: raw.to_string(),
        });
    }

    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| TriggerError::InvalidKeyEncoding {
            key: raw.to_string(),
        })
}

fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !matches!(escape, Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit())
            {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}
