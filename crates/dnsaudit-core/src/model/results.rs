// ── Analysis result types ──
//
// Produced fresh by each analysis call. The report layer renders them;
// nothing in this crate keeps them around.

use serde::Serialize;

/// How a DNS redirect rule selects the traffic it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CoverageType {
    /// Bound to a configured network by reference.
    Network,
    /// Bound to an address block; covers every network inside it.
    Subnet,
    /// Bound to an inbound interface with no source restriction.
    Interface,
}

/// The analysis-relevant projection of a DNS-redirecting NAT rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsCoverageRule {
    pub rule_id: String,
    pub description: Option<String>,
    pub coverage_type: CoverageType,
    pub network_id: Option<String>,
    pub cidr: Option<String>,
    pub redirect_ip: Option<String>,
    pub in_interface: Option<String>,
}

/// DNS (port 53) DNAT coverage across the configured networks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DnatCoverageResult {
    pub has_dnat_dns_rules: bool,
    pub has_full_coverage: bool,
    pub covered_network_ids: Vec<String>,
    pub uncovered_network_ids: Vec<String>,
    /// Source addresses of rules that match a single host instead of a
    /// network. They are abnormal and contribute no coverage.
    pub single_ip_rules: Vec<String>,
    /// Redirect target of the first qualifying rule.
    pub redirect_target_ip: Option<String>,
    pub rules: Vec<DnsCoverageRule>,
}

/// Classification of one LAN-configured DNS server for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThirdPartyDnsResult {
    pub dns_server_ip: String,
    pub network_id: String,
    pub network_name: String,
    pub network_vlan_id: Option<u16>,
    pub is_lan_ip: bool,
    pub is_pihole: bool,
    pub pihole_version: Option<String>,
    pub is_adguard_home: bool,
    pub adguard_home_version: Option<String>,
    pub dns_provider_name: String,
}

/// A DHCP-handed DNS server that lives outside every configured network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalDnsResult {
    pub dns_server_ip: String,
    pub network_name: String,
    pub is_public_dns: bool,
    pub provider_name: Option<String>,
}
