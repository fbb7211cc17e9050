// ── Encrypted / public DNS provider registry ──
//
// A compile-time table of well-known resolvers plus lookups against it.
// The table is never mutated; the only swappable piece is the PTR
// resolver held by `ProviderRegistry`.
//
// IP entries ending in a separator (`.` for IPv4, `:` for IPv6) are
// prefixes, everything else must match exactly. Both are compared against
// the canonical text form of the address.

use std::net::{IpAddr, Ipv6Addr};

use serde::Serialize;
use tracing::debug;

use crate::resolver::PtrResolver;
use crate::stamp;

/// A known DNS provider.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct DohProviderInfo {
    pub name: &'static str,
    /// Leading characters shared by the provider's published DoH stamps.
    pub stamp_prefix: &'static str,
    pub hostnames: &'static [&'static str],
    pub dns_ips: &'static [&'static str],
    pub supports_filtering: bool,
    /// Per-account configuration (profiles, custom block lists).
    pub has_custom_config: bool,
    pub description: &'static str,
}

impl DohProviderInfo {
    fn matches_hostname(&self, host: &str) -> bool {
        self.hostnames
            .iter()
            .any(|known| host == *known || host.ends_with(&format!(".{known}")) || host.contains(known))
    }

    fn matches_ip(&self, ip: &str) -> bool {
        self.dns_ips.iter().any(|entry| {
            if entry.ends_with('.') || entry.ends_with(':') {
                ip.starts_with(entry)
            } else {
                ip == *entry
            }
        })
    }
}

pub static PROVIDERS: &[DohProviderInfo] = &[
    DohProviderInfo {
        name: "NextDNS",
        stamp_prefix: "sdns://AgEAAAAAAAAAAAAOZG5zLm5leHRkbnMu",
        hostnames: &["nextdns.io"],
        dns_ips: &["45.90.28.", "45.90.30.", "2a07:a8c0:", "2a07:a8c1:"],
        supports_filtering: true,
        has_custom_config: true,
        description: "Profile-based filtering resolver with per-device analytics",
    },
    DohProviderInfo {
        name: "Cloudflare",
        stamp_prefix: "sdns://AgcAAAAAAAAABzEuMC4wLjEAEmRucy5jbG91ZGZsYXJlLmNv",
        hostnames: &[
            "cloudflare-dns.com",
            "dns.cloudflare.com",
            "one.one.one.one",
            "1dot1dot1dot1.cloudflare-dns.com",
        ],
        dns_ips: &[
            "1.1.1.1",
            "1.0.0.1",
            "1.1.1.2",
            "1.0.0.2",
            "1.1.1.3",
            "1.0.0.3",
            "2606:4700:4700::",
        ],
        supports_filtering: true,
        has_custom_config: false,
        description: "Privacy-focused public resolver with malware and family variants",
    },
    DohProviderInfo {
        name: "Google",
        stamp_prefix: "sdns://AgEAAAAAAAAABzguOC44LjgACmRucy5nb29n",
        hostnames: &["dns.google", "dns.google.com", "8888.google"],
        dns_ips: &["8.8.8.8", "8.8.4.4", "2001:4860:4860::"],
        supports_filtering: false,
        has_custom_config: false,
        description: "Google Public DNS, unfiltered",
    },
    DohProviderInfo {
        name: "Quad9",
        stamp_prefix: "sdns://AgMAAAAAAAAABzkuOS45LjkADWRucy5xdWFkOS5u",
        hostnames: &["quad9.net"],
        dns_ips: &[
            "9.9.9.9",
            "149.112.112.112",
            "9.9.9.10",
            "149.112.112.10",
            "9.9.9.11",
            "149.112.112.11",
            "2620:fe::",
        ],
        supports_filtering: true,
        has_custom_config: false,
        description: "Non-profit resolver with threat-intelligence blocking",
    },
    DohProviderInfo {
        name: "AdGuard DNS",
        stamp_prefix: "sdns://AgEAAAAAAAAADDk0LjE0MC4xNC4xNAATZG5zLmFkZ3VhcmQtZG5zLmNv",
        hostnames: &["adguard-dns.com", "adguard-dns.io", "dns.adguard.com"],
        dns_ips: &["94.140.14.", "94.140.15.", "2a10:50c0::"],
        supports_filtering: true,
        has_custom_config: true,
        description: "Ad-blocking resolver with optional private server profiles",
    },
    DohProviderInfo {
        name: "Control D",
        stamp_prefix: "sdns://AgEAAAAAAAAACTc2Ljc2LjIuMAAUZnJlZWRucy5jb250cm9sZC5j",
        hostnames: &["controld.com"],
        dns_ips: &["76.76.2.", "76.76.10.", "2606:1a40:"],
        supports_filtering: true,
        has_custom_config: true,
        description: "Customizable resolver with per-profile filtering and redirection",
    },
    DohProviderInfo {
        name: "OpenDNS",
        stamp_prefix: "sdns://AgAAAAAAAAAADjIwOC42Ny4yMjIuMjIyAA9kb2gub3BlbmRucy5j",
        hostnames: &["opendns.com"],
        dns_ips: &["208.67.222.", "208.67.220.", "2620:119:35::", "2620:119:53::"],
        supports_filtering: true,
        has_custom_config: true,
        description: "Cisco Umbrella resolver with FamilyShield and account policies",
    },
    DohProviderInfo {
        name: "Mullvad DNS",
        stamp_prefix: "sdns://AgIAAAAAAAAACzE5NC4yNDIuMi4yAA9kbnMubXVsbHZhZC5u",
        hostnames: &["dns.mullvad.net"],
        dns_ips: &["194.242.2.", "2a07:e340::"],
        supports_filtering: true,
        has_custom_config: false,
        description: "No-log resolver with optional ad and tracker blocking",
    },
];

const NEXTDNS_V6_SECOND_GROUPS: [u16; 2] = [0xa8c0, 0xa8c1];

fn normalize_host(raw: &str) -> Option<String> {
    let host = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    (!host.is_empty()).then_some(host)
}

/// Canonical (RFC 5952 compressed, lowercase) form when `raw` parses as an
/// address, so `2606:4700:4700:0:0:0:0:1111` and `2606:4700:4700::1111`
/// compare equal. Unparseable text is only trimmed and lowercased.
fn normalize_ip(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Some(match raw.parse::<IpAddr>() {
        Ok(addr) => addr.to_string(),
        Err(_) => raw.to_ascii_lowercase(),
    })
}

// ── Static lookups ──────────────────────────────────────────────────

/// Identify a provider from a resolver hostname (case-insensitive).
pub fn identify_provider(hostname: &str) -> Option<&'static DohProviderInfo> {
    let host = normalize_host(hostname)?;
    PROVIDERS.iter().find(|p| p.matches_hostname(&host))
}

/// Identify a provider from a configured server name such as
/// `"NextDNS-abc123"` (case-insensitive prefix match on provider names).
pub fn identify_provider_from_name(server_name: &str) -> Option<&'static DohProviderInfo> {
    let name = server_name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }
    PROVIDERS
        .iter()
        .find(|p| name.starts_with(&p.name.to_ascii_lowercase()))
}

/// Identify a provider from a resolver IP (exact or prefix entries).
pub fn identify_provider_from_ip(ip: &str) -> Option<&'static DohProviderInfo> {
    let ip = normalize_ip(ip)?;
    PROVIDERS.iter().find(|p| p.matches_ip(&ip))
}

/// Identify a provider from a DNS stamp: published stamp prefix first,
/// then the decoded hostname.
pub fn identify_provider_from_stamp(raw: &str) -> Option<&'static DohProviderInfo> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    PROVIDERS
        .iter()
        .find(|p| raw.starts_with(p.stamp_prefix))
        .or_else(|| stamp::decode(raw).and_then(|info| info.provider_info))
}

/// `true` when `ip` belongs to a registered public provider.
pub fn is_public_dns_provider_ip(ip: &str) -> bool {
    identify_provider_from_ip(ip).is_some()
}

// ── NextDNS profile helpers ─────────────────────────────────────────

/// Profile id from a NextDNS DoH path (`"/abc123"` -> `"abc123"`).
pub fn extract_nextdns_profile_id(path: &str) -> Option<String> {
    let id = path.trim();
    let id = id.strip_prefix('/').unwrap_or(id);
    (!id.is_empty()).then(|| id.to_owned())
}

fn nextdns_v6_segments(ip: &str) -> Option<[u16; 8]> {
    let addr: Ipv6Addr = ip.trim().parse().ok()?;
    let segments = addr.segments();
    (segments[0] == 0x2a07 && NEXTDNS_V6_SECOND_GROUPS.contains(&segments[1])).then_some(segments)
}

/// Profile id embedded in a NextDNS IPv6 anycast address.
///
/// NextDNS encodes the six-hex-digit profile in the last two groups:
/// `2a07:a8c0::43:b56f` -> `"43b56f"`.
pub fn extract_profile_id_from_nextdns_ipv6(ip: &str) -> Option<String> {
    let segments = nextdns_v6_segments(ip)?;
    let (high, low) = (segments[6], segments[7]);
    if high > 0xff || (high == 0 && low == 0) {
        return None;
    }
    Some(format!("{high:02x}{low:04x}"))
}

/// `true` when `ip` is a NextDNS IPv6 address and, if a profile id is
/// expected, carries that profile.
pub fn nextdns_ipv6_matches_profile(ip: &str, expected_profile_id: Option<&str>) -> bool {
    if nextdns_v6_segments(ip).is_none() {
        return false;
    }
    match expected_profile_id {
        None => true,
        Some(expected) => extract_profile_id_from_nextdns_ipv6(ip)
            .is_some_and(|id| id.eq_ignore_ascii_case(expected.trim())),
    }
}

// ── Registry with PTR support ───────────────────────────────────────

/// Provider lookups that may consult reverse DNS.
///
/// Holds the PTR strategy; everything else reads the static table.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    resolver: PtrResolver,
}

impl ProviderRegistry {
    pub fn new(resolver: PtrResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PtrResolver {
        &self.resolver
    }

    /// Replace the PTR strategy.
    pub fn set_resolver(&mut self, resolver: PtrResolver) {
        self.resolver = resolver;
    }

    /// Restore the system PTR strategy with its default timeout. Calling
    /// it repeatedly is harmless.
    pub fn reset_resolver(&mut self) {
        self.resolver = PtrResolver::system();
    }

    /// PTR name for `ip`; `None` for blank, invalid, or unresolvable input.
    pub async fn reverse_dns_lookup(&self, ip: &str) -> Option<String> {
        let addr: IpAddr = ip.trim().parse().ok()?;
        self.resolver.reverse(addr).await
    }

    /// Identify via the PTR hostname first, then fall back to the static
    /// IP table. Returns the provider (if any) and the PTR name (if any).
    pub async fn identify_provider_from_ip_with_ptr(
        &self,
        ip: &str,
    ) -> (Option<&'static DohProviderInfo>, Option<String>) {
        let hostname = self.reverse_dns_lookup(ip).await;
        if let Some(provider) = hostname.as_deref().and_then(identify_provider) {
            debug!(ip, provider = provider.name, "provider identified via PTR");
            return (Some(provider), hostname);
        }
        (identify_provider_from_ip(ip), hostname)
    }
}
