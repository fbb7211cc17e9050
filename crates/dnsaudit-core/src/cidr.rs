// ── CIDR containment ──
//
// Every function here is total over string input: anything that fails to
// parse simply does not match.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;
use thiserror::Error;

/// An address/prefix-length pair. A bare address parses as a host route
/// (`/32` for IPv4, `/128` for IPv6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNet(IpNetwork);

/// Why a CIDR string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid CIDR '{0}'")]
pub struct CidrParseError(String);

impl IpNet {
    /// `true` when `other` lies entirely within this block.
    ///
    /// Requires the same address family and a prefix at least as long as
    /// ours; identical blocks cover each other.
    pub fn covers(&self, other: &IpNet) -> bool {
        self.0.prefix() <= other.0.prefix() && self.0.contains(other.0.network())
    }

    /// `true` when the single address `ip` falls inside this block.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.contains(ip)
    }
}

impl FromStr for IpNet {
    type Err = CidrParseError;

    // `IpNetwork`'s own parser accepts truncated IPv4 forms ("10/8"), so
    // the address half goes through `std::net` first.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let err = || CidrParseError(raw.to_owned());

        let (host, prefix) = match raw.split_once('/') {
            Some((host, prefix)) => (host, Some(prefix)),
            None => (raw, None),
        };
        let addr: IpAddr = host.trim().parse().map_err(|_| err())?;
        let prefix_len = match prefix {
            Some(p) => {
                let p = p.trim();
                if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(err());
                }
                p.parse::<u8>().map_err(|_| err())?
            }
            None if addr.is_ipv4() => 32,
            None => 128,
        };
        IpNetwork::new(addr, prefix_len).map(Self).map_err(|_| err())
    }
}

impl fmt::Display for IpNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Decide whether `outer` covers `inner` (a CIDR or a bare address).
///
/// Returns `false` when either operand fails to parse.
pub fn covers(outer: &str, inner: &str) -> bool {
    match (outer.parse::<IpNet>(), inner.parse::<IpNet>()) {
        (Ok(outer), Ok(inner)) => outer.covers(&inner),
        _ => false,
    }
}

/// `true` when `ip` parses and falls inside `cidr`.
pub fn contains_ip(cidr: &str, ip: &str) -> bool {
    match (cidr.parse::<IpNet>(), ip.trim().parse::<IpAddr>()) {
        (Ok(net), Ok(ip)) => net.contains(ip),
        _ => false,
    }
}

/// `true` when `s` is written with an explicit prefix length and parses.
pub fn is_cidr_notation(s: &str) -> bool {
    s.contains('/') && s.parse::<IpNet>().is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn larger_block_covers_smaller() {
        assert!(covers("192.168.0.0/16", "192.168.1.0/24"));
    }

    #[test]
    fn smaller_block_does_not_cover_larger() {
        assert!(!covers("192.168.1.0/24", "192.168.0.0/16"));
    }

    #[test]
    fn sibling_blocks_do_not_cover() {
        assert!(!covers("192.168.1.0/24", "192.168.2.0/24"));
    }

    #[test]
    fn identical_blocks_cover_each_other() {
        assert!(covers("10.0.0.0/8", "10.0.0.0/8"));
        assert!(covers("192.168.1.0/24", "192.168.1.0/24"));
    }

    #[test]
    fn host_bits_are_ignored_when_comparing_networks() {
        assert!(covers("192.168.1.1/24", "192.168.1.0/24"));
        assert!(covers("192.168.0.0/16", "192.168.5.1/24"));
    }

    #[test]
    fn bare_address_is_a_host_route() {
        assert!(covers("192.168.1.0/24", "192.168.1.77"));
        assert!(!covers("192.168.1.77", "192.168.1.0/24"));
        assert!(covers("192.168.1.77", "192.168.1.77"));
    }

    #[test]
    fn zero_prefix_covers_everything_in_family() {
        assert!(covers("0.0.0.0/0", "172.16.4.0/22"));
        assert!(!covers("0.0.0.0/0", "2001:db8::/32"));
    }

    #[test]
    fn malformed_input_never_matches() {
        assert!(!covers("invalid", "192.168.1.0/24"));
        assert!(!covers("192.168.1.0/24", "invalid"));
        assert!(!covers("192.168.1.0/abc", "192.168.1.0/24"));
        assert!(!covers("192.168.1.0/33", "192.168.1.0/24"));
        assert!(!covers("192.168.256.0/24", "192.168.1.0/24"));
        assert!(!covers("192.168.1.0/", "192.168.1.0/24"));
        assert!(!covers("", ""));
        assert!(!covers("10/8", "10.1.0.0/16"));
    }

    #[test]
    fn ipv6_prefixes() {
        assert!(covers("2a07:a8c0::/32", "2a07:a8c0::43:b56f"));
        assert!(!covers("2a07:a8c1::/32", "2a07:a8c0::43:b56f"));
        assert!(!covers("2001:db8::/64", "2001:db8::/48"));
    }

    #[test]
    fn mixed_families_never_cover() {
        assert!(!covers("::/0", "10.0.0.1"));
    }

    #[test]
    fn antisymmetry_for_distinct_blocks() {
        let pairs = [
            ("10.0.0.0/8", "10.1.0.0/16"),
            ("192.168.0.0/23", "192.168.1.0/24"),
            ("172.16.0.0/12", "172.16.0.0/16"),
        ];
        for (a, b) in pairs {
            assert!(!(covers(a, b) && covers(b, a)), "{a} and {b} cover each other");
        }
    }

    #[test]
    fn contains_ip_checks_membership() {
        assert!(contains_ip("10.20.0.0/16", "10.20.30.40"));
        assert!(!contains_ip("10.20.0.0/16", "10.21.0.1"));
        assert!(!contains_ip("10.20.0.0/16", "not-an-ip"));
    }

    #[test]
    fn cidr_notation_requires_prefix() {
        assert!(is_cidr_notation("192.168.10.0/24"));
        assert!(!is_cidr_notation("192.168.10.5"));
        assert!(!is_cidr_notation("192.168.10.0/99"));
    }

    #[test]
    fn display_round_trips_prefix() {
        let net: IpNet = "192.168.1.0/24".parse().unwrap();
        assert_eq!(net.to_string(), "192.168.1.0/24");
        let host: IpNet = "2001:db8::1".parse().unwrap();
        assert_eq!(host.to_string(), "2001:db8::1/128");
    }
}
