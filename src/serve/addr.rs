//! `[addr:]port` argument parsing for the development server.

use std::fmt;
use std::net::Ipv6Addr;

use regex::Regex;

use crate::error::AddrError;

const ADDRPORT_PATTERN: &str = r"(?x)^(?:
    (?P<addr>
        (?P<ipv4>\d{1,3}(?:\.\d{1,3}){3}) |          # IPv4 address
        (?P<ipv6>\[[a-fA-F0-9:]+\]) |                # IPv6 address
        (?P<fqdn>[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*)  # FQDN
    ):)?(?P<port>\d+)$";

pub const DEFAULT_ADDR_IPV6: &str = "::1";

/// Host and port the server binds to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindAddr {
    pub host: String,
    pub port: u16,
    pub ipv6: bool,
}

impl BindAddr {
    /// `host:port` form accepted by [`tokio::net::TcpListener::bind`].
    ///
    /// Only IPv6 literals are bracketed; hostnames are left for the resolver.
    pub fn socket_addr(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for BindAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}/", self.socket_addr())
    }
}

/// Parse an optional `addrport` argument.
///
/// Without an address, `default_addr` is used, or `::1` when `use_ipv6` is
/// set. A bracketed IPv6 address switches IPv6 on by itself.
pub fn parse_addrport(
    addrport: Option<&str>,
    use_ipv6: bool,
    default_addr: &str,
    default_port: u16,
) -> Result<BindAddr, AddrError> {
    let mut ipv6 = use_ipv6;
    let (addr, port) = match addrport {
        None => (None, default_port),
        Some(raw) => {
            let re = Regex::new(ADDRPORT_PATTERN).map_err(|e| AddrError::Pattern(e.to_string()))?;
            let caps = re
                .captures(raw)
                .ok_or_else(|| AddrError::InvalidAddrPort(raw.to_string()))?;

            let port_str = &caps["port"];
            let port: u16 = port_str
                .parse()
                .map_err(|_| AddrError::InvalidPort(port_str.to_string()))?;

            let addr = match (caps.name("addr"), caps.name("ipv6"), caps.name("fqdn")) {
                (None, _, _) => None,
                (Some(_), Some(v6), _) => {
                    ipv6 = true;
                    let bracketed = v6.as_str();
                    Some(bracketed[1..bracketed.len() - 1].to_string())
                }
                (Some(addr), None, None) if ipv6 => {
                    return Err(AddrError::InvalidIpv6(addr.as_str().to_string()));
                }
                (Some(addr), None, _) => Some(addr.as_str().to_string()),
            };
            (addr, port)
        }
    };

    let host = addr.unwrap_or_else(|| {
        if ipv6 {
            DEFAULT_ADDR_IPV6.to_string()
        } else {
            default_addr.to_string()
        }
    });

    Ok(BindAddr { host, port, ipv6 })
}
