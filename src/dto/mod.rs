use serde::{Deserialize, Deserializer};
use time::{
    OffsetDateTime, PrimitiveDateTime,
    format_description::{self, well_known::Rfc3339},
};

pub mod auth;
pub mod planning;
pub mod scale;
pub mod validation;
pub mod ws;

/// Naive timestamp layouts emitted by the backend (no offset, optional fraction).
const NAIVE_LAYOUTS: [&str; 2] = [
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]",
    "[year]-[month]-[day]T[hour]:[minute]:[second]",
];

/// Parse an RFC 3339 timestamp, or a naive ISO 8601 one interpreted as UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }
    NAIVE_LAYOUTS.iter().find_map(|layout| {
        let description = format_description::parse(layout).ok()?;
        PrimitiveDateTime::parse(raw, description.as_slice())
            .ok()
            .map(PrimitiveDateTime::assume_utc)
    })
}

/// Render a timestamp for logs.
pub fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Lenient timestamp field: unparseable or non-string values become `None`.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let with_offset = parse_timestamp("2024-05-01T10:00:00+02:00").unwrap();
        assert_eq!(with_offset.unix_timestamp(), 1_714_550_400);

        let naive = parse_timestamp("2024-05-01T10:00:00").unwrap();
        assert_eq!(naive.unix_timestamp(), 1_714_557_600);

        let fractional = parse_timestamp("2024-05-01T10:00:00.5").unwrap();
        assert_eq!(fractional.millisecond(), 500);

        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn formats_as_rfc3339() {
        let ts = parse_timestamp("2024-05-01T10:00:00Z").unwrap();
        assert_eq!(format_timestamp(ts), "2024-05-01T10:00:00Z");
    }
}
