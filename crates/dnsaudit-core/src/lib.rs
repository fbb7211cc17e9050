//! DNS security analysis for local networks.
//!
//! Given the networks and NAT rules exported from a gateway, this crate
//! answers four questions:
//!
//! - **DNAT coverage** ([`dnat`]): is every network's port-53 traffic
//!   redirected to a controlled resolver? Subnet rules are evaluated with
//!   the CIDR matcher in [`cidr`].
//!
//! - **DNS Stamps** ([`stamp`]): which encrypted resolver does an
//!   `sdns://` stamp describe, and with which properties?
//!
//! - **Provider identification** ([`providers`]): does a hostname, IP, or
//!   stamp belong to a known public resolver? [`ProviderRegistry`] adds
//!   reverse-DNS lookups through an injectable [`PtrResolver`].
//!
//! - **Third-party resolvers** ([`detect`]): are LAN DNS servers Pi-hole
//!   or AdGuard Home instances? [`ThirdPartyDnsDetector`] probes them over
//!   HTTP; [`detect::detect_external_dns`] classifies off-LAN servers
//!   without any I/O.
//!
//! All analysis is total over its input: malformed addresses, records,
//! and stamps, as well as failed probes, degrade to neutral results.

pub mod cidr;
pub mod convert;
pub mod detect;
pub mod dnat;
pub mod error;
pub mod model;
pub mod providers;
pub mod records;
pub mod resolver;
pub mod stamp;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cidr::IpNet;
pub use detect::{ProbeConfig, ProbeEndpoint, ProbeKind, ThirdPartyDnsDetector, is_lan_ip};
pub use error::AuditError;
pub use providers::{DohProviderInfo, ProviderRegistry};
pub use resolver::PtrResolver;
pub use stamp::{DnsStampInfo, StampError, StampProtocol};
pub use transport::{TlsMode, TransportConfig};

pub use model::{
    CoverageType, DnatCoverageResult, DnsCoverageRule, ExternalDnsResult, IpVersion, NatProtocol,
    NatRule, NatRuleType, NetworkDefinition, NetworkPurpose, SourceFilter, ThirdPartyDnsResult,
};
