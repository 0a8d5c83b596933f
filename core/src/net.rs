use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use unicase::UniCase;

#[derive(
    Validate,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct Port(
    #[validate(minimum = 1)]
    #[validate(maximum = 65535)]
    u16,
);

impl Port {
    pub const fn new(port: u16) -> Self {
        Self(port)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl Display for Port {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsePortError {
    #[error("port must be a number, got {0:?}")]
    NotANumber(String),
    #[error("port {0} is outside 1-65535")]
    OutOfRange(i64),
}

impl TryFrom<i64> for Port {
    type Error = ParsePortError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u16::try_from(value) {
            Ok(port) if port > 0 => Ok(Self(port)),
            _ => Err(ParsePortError::OutOfRange(value)),
        }
    }
}

impl FromStr for Port {
    type Err = ParsePortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|_| ParsePortError::NotANumber(s.to_string()))?;
        Self::try_from(value)
    }
}

const HOSTNAME_MAX_LENGTH: usize = 253;

/// A DNS hostname compared without regard to ASCII case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hostname(UniCase<String>);

impl Hostname {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(UniCase::new(s.as_ref().to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    /// Labels of letters, digits and hyphens separated by dots.
    /// A leading `*.` wildcard label is accepted.
    pub fn is_valid(&self) -> bool {
        let host = self.as_str();
        let host = host.strip_prefix("*.").unwrap_or(host);
        if host.is_empty() || host.len() > HOSTNAME_MAX_LENGTH {
            return false;
        }
        host.split('.').all(is_dns_label)
    }
}

/// RFC 1123 label: at most 63 characters, alphanumerics and `-`, no leading
/// or trailing hyphen.
pub fn is_dns_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        && !label.starts_with('-')
        && !label.ends_with('-')
}

/// RFC 1035 label: an RFC 1123 label that is lowercase and starts with a
/// letter.
pub fn is_dns_1035_label(label: &str) -> bool {
    is_dns_label(label)
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && label.bytes().next().is_some_and(|b| b.is_ascii_lowercase())
}

impl Display for Hostname {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Hostname {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for Hostname {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for Hostname {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Hostname {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(s))
    }
}

impl JsonSchema for Hostname {
    fn schema_name() -> Cow<'static, str> {
        Cow::from(stringify!(Hostname))
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "string",
            "format": "hostname",
            "minLength": 1,
            "maxLength": HOSTNAME_MAX_LENGTH,
        })
    }
}
