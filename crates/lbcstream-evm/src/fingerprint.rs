//! Reading the event fingerprint off a raw EVM log.
//!
//! topics[0] of a non-anonymous event IS the fingerprint, so nothing is
//! recomputed here. Signature hashing lives in `lbcstream_core::descriptor`.

use lbcstream_core::event::EventFingerprint;

/// Fingerprint carried by `topics[0]`.
/// Returns `None` if topics is empty or the first topic is not a 32-byte hex word.
pub fn from_topics(topics: &[String]) -> Option<EventFingerprint> {
    let first = topics.first()?;
    let hex = first.strip_prefix("0x").unwrap_or(first);
    if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(EventFingerprint::new(format!("0x{hex}")))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_topics_valid() {
        let topics = vec![
            "0xA9D44D6E13BB3FEE938C3F66D1103E91F8DC6B12D4405A55EEA558E8F275AA6E".to_string(),
        ];
        let fp = from_topics(&topics).unwrap();
        assert_eq!(
            fp.as_hex(),
            "0xa9d44d6e13bb3fee938c3f66d1103e91f8dc6b12d4405a55eea558e8f275aa6e"
        );
    }

    #[test]
    fn from_topics_accepts_missing_prefix() {
        let topics = vec!["11".repeat(32)];
        assert_eq!(from_topics(&topics).unwrap().as_hex(), format!("0x{}", "11".repeat(32)));
    }

    #[test]
    fn from_topics_rejects_short_word() {
        assert!(from_topics(&["0x1234".to_string()]).is_none());
    }

    #[test]
    fn from_topics_empty() {
        assert!(from_topics(&[]).is_none());
    }
}
