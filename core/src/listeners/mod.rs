mod binder;
mod claims;
mod registry;

pub use binder::*;
pub use claims::*;
pub use registry::*;

use crate::net::Port;
use getset::{CopyGetters, Getters};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::net::{Ipv4Addr, Ipv6Addr};
use strum::{Display as StrumDisplay, EnumString, IntoStaticStr};
use typed_builder::TypedBuilder;

/// Name of the listener the proxy reserves for TLS passthrough.
pub const TLS_PASSTHROUGH_LISTENER_NAME: &str = "tls-passthrough";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    StrumDisplay,
    EnumString,
    IntoStaticStr,
    Serialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ListenerProtocol {
    Http,
    Https,
    Tcp,
    Udp,
}

impl ListenerProtocol {
    /// Whether the protocol is served from the `http` block.
    pub fn is_http(self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }

    pub fn requires_ssl(self) -> bool {
        self == Self::Https
    }
}

/// A validated listener from the GlobalConfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters, TypedBuilder, Serialize)]
pub struct ListenerDefinition {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    name: String,

    #[getset(get_copy = "pub")]
    protocol: ListenerProtocol,

    #[getset(get_copy = "pub")]
    port: Port,

    #[getset(get_copy = "pub")]
    #[builder(default)]
    ssl: bool,

    #[getset(get_copy = "pub")]
    #[builder(default, setter(strip_option))]
    ipv4: Option<Ipv4Addr>,

    #[getset(get_copy = "pub")]
    #[builder(default, setter(strip_option))]
    ipv6: Option<Ipv6Addr>,
}

/// Where a resource wants a listener attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerContext {
    HttpBlock,
    HttpsBlock,
    Transport(ListenerProtocol),
}

impl Display for ListenerContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpBlock => f.write_str("listener.http"),
            Self::HttpsBlock => f.write_str("listener.https"),
            Self::Transport(protocol) => write!(f, "listener ({protocol})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct ListenerReference {
    #[getset(get_copy = "pub")]
    context: ListenerContext,

    #[getset(get = "pub")]
    name: String,
}

impl ListenerReference {
    pub fn new<N: Into<String>>(context: ListenerContext, name: N) -> Self {
        Self {
            context,
            name: name.into(),
        }
    }

    pub fn http<N: Into<String>>(name: N) -> Self {
        Self::new(ListenerContext::HttpBlock, name)
    }

    pub fn https<N: Into<String>>(name: N) -> Self {
        Self::new(ListenerContext::HttpsBlock, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("HTTP", ListenerProtocol::Http)]
    #[case("HTTPS", ListenerProtocol::Https)]
    #[case("TCP", ListenerProtocol::Tcp)]
    #[case("UDP", ListenerProtocol::Udp)]
    fn test_protocol_round_trips_uppercase(#[case] input: &str, #[case] expected: ListenerProtocol) {
        assert_eq!(input.parse::<ListenerProtocol>().ok(), Some(expected));
        assert_eq!(expected.to_string(), input);
    }

    #[test]
    fn test_protocol_is_case_sensitive() {
        assert!("http".parse::<ListenerProtocol>().is_err());
    }

    #[test]
    fn test_context_display() {
        assert_eq!(ListenerContext::HttpBlock.to_string(), "listener.http");
        assert_eq!(ListenerContext::HttpsBlock.to_string(), "listener.https");
    }
}
