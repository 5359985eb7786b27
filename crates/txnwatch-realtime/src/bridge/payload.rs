//! Raw notification payload parsing.
//!
//! Payloads have the form `<subject_id>,<status>`. Only the first comma
//! separates; the status keeps any later commas verbatim.

use std::num::ParseIntError;

use txnwatch_core::types::EntityId;

use crate::message::event::NotificationEvent;

/// Why a payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// No comma separating the ID from the status.
    #[error("payload has no ',' separator: {0:?}")]
    MissingSeparator(String),
    /// The part before the first comma is not an integer.
    #[error("invalid subject id {id:?}: {source}")]
    InvalidSubjectId {
        /// Offending text.
        id: String,
        /// Parse failure.
        source: ParseIntError,
    },
}

/// Parse a raw payload into an event.
pub fn parse_payload(raw: &str) -> Result<NotificationEvent, PayloadError> {
    let (id, status) = raw
        .split_once(',')
        .ok_or_else(|| PayloadError::MissingSeparator(raw.to_string()))?;

    let subject_id = id
        .parse::<EntityId>()
        .map_err(|source| PayloadError::InvalidSubjectId {
            id: id.to_string(),
            source,
        })?;

    Ok(NotificationEvent::new(subject_id, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_payload() {
        let event = parse_payload("42,confirmed").expect("valid");
        assert_eq!(event.subject_id, EntityId(42));
        assert_eq!(event.status, "confirmed");
    }

    #[test]
    fn test_status_keeps_later_commas() {
        let event = parse_payload("42,a,b").expect("valid");
        assert_eq!(event.subject_id, EntityId(42));
        assert_eq!(event.status, "a,b");
    }

    #[test]
    fn test_empty_status_is_accepted() {
        let event = parse_payload("-7,").expect("valid");
        assert_eq!(event.subject_id, EntityId(-7));
        assert_eq!(event.status, "");
    }

    #[test]
    fn test_missing_separator() {
        assert_eq!(
            parse_payload("42"),
            Err(PayloadError::MissingSeparator("42".to_string()))
        );
    }

    #[test]
    fn test_non_integer_id() {
        let err = parse_payload("abc,confirmed").expect_err("invalid id");
        assert!(matches!(err, PayloadError::InvalidSubjectId { ref id, .. } if id == "abc"));

        // No trimming: surrounding whitespace is not an integer.
        assert!(parse_payload(" 42,confirmed").is_err());
        assert!(parse_payload("99999999999999999999,x").is_err());
    }
}
