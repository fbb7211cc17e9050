// ── Domain model ──
//
// Value objects handed in by the audit engine (networks, NAT rules) and
// the result types handed back. Everything here is created fresh per
// analysis call and owned by the caller.

pub mod nat;
pub mod network;
pub mod results;

pub use nat::{IpVersion, NatProtocol, NatRule, NatRuleType, SourceFilter};
pub use network::{NetworkDefinition, NetworkPurpose};
pub use results::{
    CoverageType, DnatCoverageResult, DnsCoverageRule, ExternalDnsResult, ThirdPartyDnsResult,
};
