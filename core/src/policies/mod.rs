mod resolver;
mod store;

pub use resolver::*;
pub use store::*;

use getset::{CopyGetters, Getters};
use ipnet::IpNet;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display as StrumDisplay, EnumString};
use thiserror::Error;

pub const DEFAULT_ZONE_SIZE: &str = "10M";
pub const DEFAULT_REJECT_CODE: u16 = 503;

/// Identity of a Policy resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Getters, Serialize)]
pub struct PolicyKey {
    #[getset(get = "pub")]
    namespace: String,

    #[getset(get = "pub")]
    name: String,
}

impl PolicyKey {
    pub fn new<N: Into<String>, M: Into<String>>(namespace: N, name: M) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Display for PolicyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RateUnit {
    PerSecond,
    PerMinute,
}

impl RateUnit {
    const fn suffix(self) -> &'static str {
        match self {
            Self::PerSecond => "r/s",
            Self::PerMinute => "r/m",
        }
    }
}

/// A request rate in the proxy's own units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, CopyGetters, Serialize)]
pub struct Rate {
    #[getset(get_copy = "pub")]
    requests: u32,

    #[getset(get_copy = "pub")]
    unit: RateUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rate {0:?} must be a positive number followed by r/s or r/m")]
pub struct ParseRateError(String);

impl Rate {
    pub const fn per_second(requests: u32) -> Self {
        Self {
            requests,
            unit: RateUnit::PerSecond,
        }
    }

    pub const fn per_minute(requests: u32) -> Self {
        Self {
            requests,
            unit: RateUnit::PerMinute,
        }
    }

    /// Requests per minute, the common unit for comparing rates.
    pub fn normalized(self) -> u64 {
        match self.unit {
            RateUnit::PerSecond => u64::from(self.requests) * 60,
            RateUnit::PerMinute => u64::from(self.requests),
        }
    }

    /// Divides the rate across `replicas` with integer truncation. A
    /// per-second rate that would truncate to zero is re-expressed per
    /// minute; the result never drops below `1r/m`.
    pub fn scaled(self, replicas: u32) -> Self {
        if replicas <= 1 {
            return self;
        }

        match self.unit {
            RateUnit::PerSecond if self.requests >= replicas => {
                Self::per_second(self.requests / replicas)
            }
            RateUnit::PerSecond => {
                let per_minute = self.requests.saturating_mul(60) / replicas;
                Self::per_minute(per_minute.max(1))
            }
            RateUnit::PerMinute => Self::per_minute((self.requests / replicas).max(1)),
        }
    }
}

impl Display for Rate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.requests, self.unit.suffix())
    }
}

impl FromStr for Rate {
    type Err = ParseRateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRateError(s.to_string());
        let (requests, unit) = if let Some(requests) = s.strip_suffix("r/s") {
            (requests, RateUnit::PerSecond)
        } else if let Some(requests) = s.strip_suffix("r/m") {
            (requests, RateUnit::PerMinute)
        } else {
            return Err(err());
        };

        if requests.is_empty() || !requests.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        match requests.parse::<u32>() {
            Ok(requests) if requests > 0 => Ok(Self { requests, unit }),
            _ => Err(err()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Notice,
    Warn,
    Error,
}

/// Whether a zone size reads like `512k` or `10M`.
pub fn is_valid_zone_size(size: &str) -> bool {
    let digits = size.strip_suffix(['k', 'K', 'm', 'M']).unwrap_or(size);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && digits.bytes().any(|b| b != b'0')
}

/// A validated rate-limit policy.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters, Serialize)]
pub struct RateLimitPolicy {
    #[getset(get_copy = "pub")]
    rate: Rate,

    #[getset(get = "pub")]
    key: String,

    #[getset(get = "pub")]
    zone_size: String,

    #[getset(get_copy = "pub")]
    burst: Option<u32>,

    #[getset(get_copy = "pub")]
    delay: Option<u32>,

    #[getset(get_copy = "pub")]
    no_delay: bool,

    #[getset(get_copy = "pub")]
    dry_run: bool,

    #[getset(get_copy = "pub")]
    log_level: Option<LogLevel>,

    #[getset(get_copy = "pub")]
    reject_code: u16,

    #[getset(get_copy = "pub")]
    scaling_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum AccessEffect {
    Allow,
    Deny,
}

/// An address or network as written in an access-control list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessSource(IpNet);

impl FromStr for AccessSource {
    type Err = ipnet::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<IpAddr>() {
            Ok(address) => Ok(Self(IpNet::from(address))),
            Err(_) => s.parse::<IpNet>().map(Self),
        }
    }
}

impl Display for AccessSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.prefix_len() == self.0.max_prefix_len() {
            write!(f, "{}", self.0.addr())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters, Serialize)]
pub struct AccessControlPolicy {
    #[getset(get_copy = "pub")]
    effect: AccessEffect,

    #[getset(get = "pub")]
    sources: Vec<AccessSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledPolicy {
    RateLimit(Arc<RateLimitPolicy>),
    AccessControl(Arc<AccessControlPolicy>),
}

impl CompiledPolicy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::RateLimit(_) => PolicyKind::RateLimit,
            Self::AccessControl(_) => PolicyKind::AccessControl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum PolicyKind {
    #[strum(serialize = "rateLimit")]
    RateLimit,
    #[strum(serialize = "accessControl")]
    AccessControl,
}
