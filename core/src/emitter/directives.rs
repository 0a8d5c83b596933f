use crate::net::Port;
use getset::CopyGetters;
use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::net::{Ipv4Addr, Ipv6Addr};
use typed_builder::TypedBuilder;

const INDENT: usize = 4;

/// Writes proxy configuration text one directive per line.
#[derive(Debug, Default)]
pub struct ConfigWriter {
    dst: String,
    spaces: usize,
}

impl ConfigWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directive<D: Display>(&mut self, directive: D) -> &mut Self {
        for _ in 0..self.spaces {
            self.dst.push(' ');
        }
        self.dst.push_str(&directive.to_string());
        self.dst.push('\n');
        self
    }

    /// Separates groups of directives. Never emits two blank lines in a row
    /// or a blank first line.
    pub fn blank(&mut self) -> &mut Self {
        if !self.dst.is_empty() && !self.dst.ends_with("\n\n") && !self.dst.ends_with("{\n") {
            self.dst.push('\n');
        }
        self
    }

    pub fn block<H, F>(&mut self, header: H, f: F) -> &mut Self
    where
        H: Display,
        F: FnOnce(&mut Self),
    {
        self.directive(format_args!("{header} {{"));
        self.spaces += INDENT;
        f(self);
        if self.dst.ends_with("\n\n") {
            self.dst.pop();
        }
        self.spaces -= INDENT;
        self.directive("}")
    }

    pub fn finish(self) -> String {
        self.dst
    }
}

/// Parameters of a `listen` directive shared by its IPv4 and IPv6 forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters, TypedBuilder)]
pub struct Listen {
    #[getset(get_copy = "pub")]
    port: Port,

    #[getset(get_copy = "pub")]
    #[builder(default)]
    ssl: bool,

    #[getset(get_copy = "pub")]
    #[builder(default)]
    udp: bool,

    #[getset(get_copy = "pub")]
    #[builder(default)]
    proxy_protocol: bool,
}

impl Listen {
    fn params(&self) -> String {
        let mut params = String::new();
        if self.ssl {
            params.push_str(" ssl");
        }
        if self.udp {
            params.push_str(" udp");
        }
        if self.proxy_protocol {
            params.push_str(" proxy_protocol");
        }
        params
    }

    pub fn ipv4(&self, address: Option<Ipv4Addr>) -> String {
        match address {
            Some(address) => format!("listen {}:{}{};", address, self.port, self.params()),
            None => format!("listen {}{};", self.port, self.params()),
        }
    }

    pub fn ipv6(&self, address: Option<Ipv6Addr>) -> String {
        match address {
            Some(address) => format!("listen [{}]:{}{};", address, self.port, self.params()),
            None => format!("listen [::]:{}{};", self.port, self.params()),
        }
    }

    /// The IPv4 line, then the IPv6 line unless IPv6 is disabled.
    pub fn write(
        &self,
        writer: &mut ConfigWriter,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
        disable_ipv6: bool,
    ) {
        writer.directive(self.ipv4(ipv4));
        if !disable_ipv6 {
            writer.directive(self.ipv6(ipv6));
        }
    }
}

/// A proxy identifier for a shared-memory zone or upstream. Proxy
/// identifiers may not contain `-` or `.`, and folding both into `_` is
/// lossy, so the name ends with a digest of the unfolded parts.
pub fn zone_name<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let parts: Vec<&str> = parts.into_iter().collect();
    let readable = parts
        .iter()
        .map(|part| part.replace(['-', '.'], "_"))
        .collect::<Vec<_>>()
        .join("_");

    let digest = Sha256::digest(parts.join("/").as_bytes());
    let suffix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    format!("{readable}_{suffix:08x}")
}
