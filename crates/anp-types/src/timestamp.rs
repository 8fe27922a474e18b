//! RFC 3339 UTC timestamps.
//!
//! ANP timestamps travel on the wire as RFC 3339 strings with a `Z` suffix
//! (`2026-08-01T12:00:00Z`), in `DIDWba` authentication headers and mandate
//! envelopes alike. [`UtcTimestamp`] pins the serialization so every emitter
//! produces the same shape regardless of local formatting defaults.

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::ops::{Add, Sub};

/// A UTC timestamp with second precision and fixed RFC 3339 `Z` rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcTimestamp(DateTime<Utc>);

impl UtcTimestamp {
    /// The current system time, truncated to whole seconds.
    pub fn now() -> Self {
        let now = Utc::now();
        Self(Utc.timestamp_opt(now.timestamp(), 0).single().expect("whole-second timestamp"))
    }

    /// Builds a timestamp from seconds since the Unix epoch.
    pub fn from_unix(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    /// Seconds since the Unix epoch.
    pub fn unix(&self) -> i64 {
        self.0.timestamp()
    }

    /// Parses an RFC 3339 timestamp; any offset is normalized to UTC.
    pub fn parse(input: &str) -> Result<Self, chrono::ParseError> {
        let parsed = DateTime::parse_from_rfc3339(input)?;
        Ok(Self(parsed.with_timezone(&Utc)))
    }

    /// Absolute distance to another timestamp.
    pub fn abs_diff(&self, other: &UtcTimestamp) -> Duration {
        (self.0 - other.0).abs()
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for UtcTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl Add<Duration> for UtcTimestamp {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<Duration> for UtcTimestamp {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl Display for UtcTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl Serialize for UtcTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UtcTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        UtcTimestamp::parse(&raw).map_err(serde::de::Error::custom)
    }
}
