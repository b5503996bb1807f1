//! Opaque pagination cursors.
//!
//! A cursor records the last `(sort_key, bookmark_id)` pair a client has seen
//! together with the fingerprint of the filter that produced it. Tokens are
//! self-contained; nothing is stored server-side.
//!
//! Version 1 layout, base64url without padding:
//!
//! ```text
//! version:u8 | direction:u8 | sort_key_micros:i64 BE | bookmark_id:16 | fingerprint:16 | checksum:4
//! ```
//!
//! The checksum is the first four bytes of SHA-256 over everything before it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::filter::{FilterFingerprint, FINGERPRINT_LEN};

const VERSION_1: u8 = 1;
const CHECKSUM_LEN: usize = 4;
const BODY_LEN: usize = 1 + 1 + 8 + 16 + FINGERPRINT_LEN;
const TOKEN_LEN: usize = BODY_LEN + CHECKSUM_LEN;

/// Direction a cursor continues in. Only forward paging is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
}

impl Direction {
    fn to_byte(self) -> u8 {
        match self {
            Direction::Forward => 0,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Direction::Forward),
            _ => None,
        }
    }
}

/// Decoded pagination cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Sort key of the last row on the previous page.
    pub sort_key: DateTime<Utc>,
    /// Id of the last row on the previous page; breaks sort key ties.
    pub tie_break_id: Uuid,
    pub fingerprint: FilterFingerprint,
    pub direction: Direction,
}

impl Cursor {
    pub fn forward(
        sort_key: DateTime<Utc>,
        tie_break_id: Uuid,
        fingerprint: FilterFingerprint,
    ) -> Self {
        Self {
            sort_key,
            tie_break_id,
            fingerprint,
            direction: Direction::Forward,
        }
    }
}

/// Encoder/decoder for cursor tokens.
pub struct CursorCodec;

impl CursorCodec {
    /// Encode a forward cursor. Identical inputs always give the same token.
    pub fn encode(
        sort_key: DateTime<Utc>,
        tie_break_id: Uuid,
        fingerprint: FilterFingerprint,
    ) -> String {
        Self::encode_cursor(&Cursor::forward(sort_key, tie_break_id, fingerprint))
    }

    pub fn encode_cursor(cursor: &Cursor) -> String {
        let mut buf = Vec::with_capacity(TOKEN_LEN);
        buf.push(VERSION_1);
        buf.push(cursor.direction.to_byte());
        buf.extend_from_slice(&cursor.sort_key.timestamp_micros().to_be_bytes());
        buf.extend_from_slice(cursor.tie_break_id.as_bytes());
        buf.extend_from_slice(cursor.fingerprint.as_bytes());
        let checksum = checksum(&buf);
        buf.extend_from_slice(&checksum);
        URL_SAFE_NO_PAD.encode(buf)
    }

    /// Decode a token produced by [`CursorCodec::encode`].
    ///
    /// Fails with `InvalidCursor` for bad base64, wrong length, unknown
    /// version or direction, checksum mismatch or an unrepresentable sort key.
    pub fn decode(token: &str) -> Result<Cursor> {
        if token.is_empty() {
            return Err(Error::InvalidCursor("empty cursor".to_string()));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| Error::InvalidCursor(format!("not base64url: {}", e)))?;

        // Version is checked before length so future layouts can differ in size.
        match bytes.first() {
            Some(&VERSION_1) => {}
            Some(v) => {
                return Err(Error::InvalidCursor(format!(
                    "unsupported cursor version {}",
                    v
                )))
            }
            None => return Err(Error::InvalidCursor("empty cursor".to_string())),
        }
        if bytes.len() != TOKEN_LEN {
            return Err(Error::InvalidCursor(format!(
                "expected {} bytes, got {}",
                TOKEN_LEN,
                bytes.len()
            )));
        }

        let (body, sum) = bytes.split_at(BODY_LEN);
        if checksum(body) != sum {
            return Err(Error::InvalidCursor("checksum mismatch".to_string()));
        }

        let direction = Direction::from_byte(body[1])
            .ok_or_else(|| Error::InvalidCursor(format!("unknown direction {}", body[1])))?;

        let mut micros = [0u8; 8];
        micros.copy_from_slice(&body[2..10]);
        let micros = i64::from_be_bytes(micros);
        let sort_key = DateTime::<Utc>::from_timestamp_micros(micros)
            .ok_or_else(|| Error::InvalidCursor("sort key out of range".to_string()))?;

        let mut id = [0u8; 16];
        id.copy_from_slice(&body[10..26]);

        let mut fingerprint = [0u8; FINGERPRINT_LEN];
        fingerprint.copy_from_slice(&body[26..26 + FINGERPRINT_LEN]);

        Ok(Cursor {
            sort_key,
            tie_break_id: Uuid::from_bytes(id),
            fingerprint: FilterFingerprint::from_bytes(fingerprint),
            direction,
        })
    }

    /// Reject a cursor issued under a different filter.
    pub fn validate(cursor: &Cursor, current: &FilterFingerprint) -> Result<()> {
        if &cursor.fingerprint != current {
            return Err(Error::CursorFilterMismatch);
        }
        Ok(())
    }
}

fn checksum(body: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(body);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{BookmarkFilter, TopicFilter};
    use chrono::TimeZone;

    fn sample() -> (DateTime<Utc>, Uuid, FilterFingerprint) {
        let at = Utc.with_ymd_and_hms(2017, 6, 15, 9, 30, 0).unwrap();
        let id = Uuid::parse_str("0190a3c2-7b1e-7c3d-8e4f-123456789abc").unwrap();
        let fp = BookmarkFilter::Topics(TopicFilter::new(["a"])).fingerprint();
        (at, id, fp)
    }

    #[test]
    fn test_encode_decode() {
        let (at, id, fp) = sample();
        let token = CursorCodec::encode(at, id, fp);
        let cursor = CursorCodec::decode(&token).unwrap();
        assert_eq!(cursor, Cursor::forward(at, id, fp));
    }

    #[test]
    fn test_encode_is_deterministic_and_url_safe() {
        let (at, id, fp) = sample();
        let a = CursorCodec::encode(at, id, fp);
        let b = CursorCodec::encode(at, id, fp);
        assert_eq!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_decode_preserves_pre_epoch_sort_key() {
        let (_, id, fp) = sample();
        let at = Utc.with_ymd_and_hms(1901, 3, 1, 0, 0, 0).unwrap();
        let cursor = CursorCodec::decode(&CursorCodec::encode(at, id, fp)).unwrap();
        assert_eq!(cursor.sort_key, at);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        for token in ["", "!!!", "not a cursor", "AAAA"] {
            let err = CursorCodec::decode(token).unwrap_err();
            assert!(matches!(err, Error::InvalidCursor(_)), "{:?}", token);
        }
    }

    #[test]
    fn test_decode_rejects_truncated() {
        let (at, id, fp) = sample();
        let token = CursorCodec::encode(at, id, fp);
        let truncated = &token[..token.len() - 4];
        assert!(matches!(
            CursorCodec::decode(truncated),
            Err(Error::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_decode_rejects_tampered_body() {
        let (at, id, fp) = sample();
        let mut bytes = URL_SAFE_NO_PAD
            .decode(CursorCodec::encode(at, id, fp))
            .unwrap();
        bytes[12] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(&bytes);
        let err = CursorCodec::decode(&tampered).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let (at, id, fp) = sample();
        let mut bytes = URL_SAFE_NO_PAD
            .decode(CursorCodec::encode(at, id, fp))
            .unwrap();
        bytes[0] = 2;
        let err = CursorCodec::decode(&URL_SAFE_NO_PAD.encode(&bytes)).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_validate_fingerprint() {
        let (at, id, fp) = sample();
        let cursor = Cursor::forward(at, id, fp);
        assert!(CursorCodec::validate(&cursor, &fp).is_ok());

        let other = BookmarkFilter::Topics(TopicFilter::new(["b"])).fingerprint();
        assert!(matches!(
            CursorCodec::validate(&cursor, &other),
            Err(Error::CursorFilterMismatch)
        ));
    }
}
