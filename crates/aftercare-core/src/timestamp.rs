//! Stable textual form for timestamps.
//!
//! Every persisted timestamp is written as fixed-width RFC 3339 in UTC with
//! nanosecond precision (`2026-10-18T09:30:00.000000000Z`). The fixed width
//! makes the strings sort lexicographically in chronological order, and the
//! full precision makes load(save(t)) == t.
//!
//! Use with `#[serde(with = "crate::timestamp")]`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer, de};

pub fn encode(dt: &DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
  DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

pub fn serialize<S: Serializer>(
  dt: &DateTime<Utc>,
  serializer: S,
) -> Result<S::Ok, S::Error> {
  serializer.serialize_str(&encode(dt))
}

pub fn deserialize<'de, D: Deserializer<'de>>(
  deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
  let raw = String::deserialize(deserializer)?;
  decode(&raw).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn round_trips_nanoseconds() {
    let dt = Utc.timestamp_opt(1_760_000_000, 123_456_789).unwrap();
    let text = encode(&dt);
    assert_eq!(text, "2025-10-09T08:53:20.123456789Z");
    assert_eq!(decode(&text).unwrap(), dt);
  }

  #[test]
  fn encoding_sorts_chronologically() {
    let early = Utc.timestamp_opt(1_000, 900_000_000).unwrap();
    let late = Utc.timestamp_opt(1_001, 0).unwrap();
    assert!(encode(&early) < encode(&late));
  }

  #[test]
  fn accepts_offsets_on_decode() {
    let dt = decode("2026-01-01T02:00:00+02:00").unwrap();
    assert_eq!(encode(&dt), "2026-01-01T00:00:00.000000000Z");
  }
}
