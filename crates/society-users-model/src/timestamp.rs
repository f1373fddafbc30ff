//! The one timestamp layout used on the wire.
//!
//! Encoding always emits `YYYY-MM-DDTHH:MM:SS.mmmZ`. Decoding accepts any
//! RFC 3339 timestamp and normalizes it to UTC.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp in the wire layout.
#[must_use]
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp into UTC.
///
/// # Errors
///
/// Returns the parse error when `s` is not RFC 3339.
pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|ts| ts.with_timezone(&Utc))
}

/// Drop sub-millisecond precision, which the wire layout cannot carry.
#[must_use]
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Serde adapter for `Option<DateTime<Utc>>` fields.
pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize in the wire layout; `None` becomes `null`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&super::format(ts)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from an RFC 3339 string; `null` and `""` become `None`.
    ///
    /// Sub-millisecond digits are dropped so a decoded value equals what the
    /// wire layout will show for it.
    ///
    /// # Errors
    ///
    /// Fails when the value is not a string or not RFC 3339.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => super::parse(&s)
                .map(|ts| Some(super::truncate_to_millis(ts)))
                .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {s:?}: {e}"))),
        }
    }
}
