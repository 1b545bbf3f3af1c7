use std::{fmt, net::IpAddr};

use serde::Deserialize;

/// Largest magnitude of `ProtoDuration::seconds`, about 10,000 years.
pub const MAX_DURATION_SECONDS: i64 = 315_576_000_000;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A dimension or metric value as carried by the telemetry framework.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum TypedValue {
    #[serde(rename = "stringValue")]
    String(String),
    #[serde(rename = "int64Value")]
    Int64(i64),
    #[serde(rename = "doubleValue")]
    Double(f64),
    #[serde(rename = "boolValue")]
    Bool(bool),
    #[serde(rename = "durationValue")]
    Duration(ProtoDuration),
    #[serde(rename = "ipAddressValue")]
    IpAddress(IpAddr),
    #[serde(rename = "timestampValue")]
    Timestamp(ProtoTimestamp),
    #[serde(rename = "dnsNameValue")]
    DnsName(String),
    #[serde(rename = "emailAddressValue")]
    EmailAddress(String),
    #[serde(rename = "uriValue")]
    Uri(String),
}
impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::DnsName(s) | Self::EmailAddress(s) | Self::Uri(s) => {
                f.write_str(s)
            }
            Self::Int64(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Duration(d) => write!(f, "{d}"),
            Self::IpAddress(ip) => write!(f, "{ip}"),
            Self::Timestamp(ts) => write!(f, "{ts}"),
        }
    }
}

/// Protobuf-style duration: whole seconds plus a signed nanosecond adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ProtoDuration {
    #[serde(default)]
    pub seconds: i64,
    #[serde(default)]
    pub nanos: i32,
}
impl ProtoDuration {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    pub fn validate(&self) -> Result<(), DurationError> {
        if !(-MAX_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&self.seconds) {
            return Err(DurationError::SecondsOutOfRange(*self));
        }
        if i64::from(self.nanos).abs() >= NANOS_PER_SECOND {
            return Err(DurationError::NanosOutOfRange(*self));
        }
        if (self.seconds < 0 && self.nanos > 0) || (self.seconds > 0 && self.nanos < 0) {
            return Err(DurationError::SignMismatch(*self));
        }
        Ok(())
    }

    /// Total signed nanoseconds, provided it fits in an `i64`.
    pub fn total_nanos(&self) -> Result<i64, DurationError> {
        self.validate()?;
        self.seconds
            .checked_mul(NANOS_PER_SECOND)
            .and_then(|nanos| nanos.checked_add(i64::from(self.nanos)))
            .ok_or(DurationError::Overflow(*self))
    }

    /// Fractional seconds.
    pub fn as_secs_f64(&self) -> Result<f64, DurationError> {
        let total = self.total_nanos()?;
        let secs = total / NANOS_PER_SECOND;
        let nanos = total % NANOS_PER_SECOND;
        Ok(secs as f64 + nanos as f64 / 1e9)
    }
}
impl fmt::Display for ProtoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seconds:{} nanos:{}", self.seconds, self.nanos)
    }
}

/// Protobuf-style timestamp relative to the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ProtoTimestamp {
    #[serde(default)]
    pub seconds: i64,
    #[serde(default)]
    pub nanos: i32,
}
impl fmt::Display for ProtoTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seconds:{} nanos:{}", self.seconds, self.nanos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("duration: {0} has seconds out of range")]
    SecondsOutOfRange(ProtoDuration),
    #[error("duration: {0} has out-of-range nanos")]
    NanosOutOfRange(ProtoDuration),
    #[error("duration: {0} has seconds and nanos with different signs")]
    SignMismatch(ProtoDuration),
    #[error("duration: {0} is out of range for a signed nanosecond count")]
    Overflow(ProtoDuration),
}
