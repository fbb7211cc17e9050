// ── DNS DNAT coverage analysis ──
//
// Decides which configured networks have their port-53 traffic forced
// through a DNAT redirect. Coverage is computed per call from the rules
// and networks handed in; nothing is cached.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cidr::{self, IpNet};
use crate::model::{
    CoverageType, DnatCoverageResult, DnsCoverageRule, IpVersion, NatRule, NetworkDefinition,
    SourceFilter,
};

/// Outcome of classifying one qualifying rule.
enum Classified {
    Coverage(DnsCoverageRule),
    /// Source filter names a single host; abnormal, no coverage.
    SingleIp(String),
}

fn classify(rule: &NatRule) -> Classified {
    let base = |coverage_type, network_id, cidr, in_interface| DnsCoverageRule {
        rule_id: rule.id.clone(),
        description: rule.description.clone(),
        coverage_type,
        network_id,
        cidr,
        redirect_ip: rule.redirect_ip.clone(),
        in_interface,
    };

    match &rule.source_filter {
        SourceFilter::NetworkReference(network_id) => Classified::Coverage(base(
            CoverageType::Network,
            Some(network_id.clone()),
            None,
            rule.in_interface_network_id.clone(),
        )),
        SourceFilter::AnySource => match &rule.in_interface_network_id {
            Some(iface) => Classified::Coverage(base(
                CoverageType::Interface,
                Some(iface.clone()),
                None,
                Some(iface.clone()),
            )),
            // No source and no interface restriction: the rule sees everything.
            None => {
                let everything = match rule.ip_version {
                    IpVersion::Ipv6 => "::/0",
                    IpVersion::Ipv4 | IpVersion::Both => "0.0.0.0/0",
                };
                Classified::Coverage(base(
                    CoverageType::Subnet,
                    None,
                    Some(everything.to_owned()),
                    None,
                ))
            }
        },
        SourceFilter::AddressAndPort(address) => {
            if cidr::is_cidr_notation(address) {
                Classified::Coverage(base(
                    CoverageType::Subnet,
                    None,
                    Some(address.trim().to_owned()),
                    rule.in_interface_network_id.clone(),
                ))
            } else {
                Classified::SingleIp(address.clone())
            }
        }
    }
}

/// Networks a classified rule covers, as ids, in network-list order.
fn networks_covered_by<'a>(
    rule: &DnsCoverageRule,
    networks: &'a [NetworkDefinition],
) -> Vec<&'a str> {
    match rule.coverage_type {
        CoverageType::Network | CoverageType::Interface => networks
            .iter()
            .filter(|n| rule.network_id.as_deref() == Some(n.id.as_str()))
            .map(|n| n.id.as_str())
            .collect(),
        CoverageType::Subnet => {
            let Some(block) = rule.cidr.as_deref().and_then(|c| c.parse::<IpNet>().ok()) else {
                return Vec::new();
            };
            networks
                .iter()
                .filter(|n| n.subnet().is_some_and(|subnet| block.covers(&subnet)))
                .map(|n| n.id.as_str())
                .collect()
        }
    }
}

/// Analyze DNS DNAT coverage of `networks` by `nat_rules`.
///
/// Absent or empty inputs produce a neutral result: with no networks
/// there is nothing to cover, and with no rules every network is
/// uncovered.
pub fn analyze(
    nat_rules: Option<&[NatRule]>,
    networks: Option<&[NetworkDefinition]>,
) -> DnatCoverageResult {
    let networks = networks.unwrap_or_default();
    if networks.is_empty() {
        return DnatCoverageResult::default();
    }
    let Some(nat_rules) = nat_rules else {
        return DnatCoverageResult {
            uncovered_network_ids: networks.iter().map(|n| n.id.clone()).collect(),
            ..DnatCoverageResult::default()
        };
    };

    let mut result = DnatCoverageResult::default();
    let mut covered: HashSet<&str> = HashSet::new();
    let mut first_target_taken = false;

    for rule in nat_rules.iter().filter(|r| r.is_dns_redirect()) {
        result.has_dnat_dns_rules = true;
        if !first_target_taken {
            result.redirect_target_ip.clone_from(&rule.redirect_ip);
            first_target_taken = true;
        }

        match classify(rule) {
            Classified::Coverage(coverage) => {
                let hits = networks_covered_by(&coverage, networks);
                debug!(
                    rule_id = %coverage.rule_id,
                    coverage_type = %coverage.coverage_type,
                    covered = hits.len(),
                    "classified DNS redirect rule"
                );
                covered.extend(hits);
                result.rules.push(coverage);
            }
            Classified::SingleIp(address) => {
                warn!(
                    rule_id = %rule.id,
                    address = %address,
                    "DNS redirect rule matches a single source address"
                );
                result.single_ip_rules.push(address);
            }
        }
    }

    for network in networks {
        if covered.contains(network.id.as_str()) {
            result.covered_network_ids.push(network.id.clone());
        } else {
            result.uncovered_network_ids.push(network.id.clone());
        }
    }
    result.has_full_coverage = result.uncovered_network_ids.is_empty();
    result
}

/// Parse a raw controller rule collection, then [`analyze`] it.
pub fn analyze_records(
    nat_rules: Option<&Value>,
    networks: Option<&[NetworkDefinition]>,
) -> DnatCoverageResult {
    let parsed = nat_rules.map(NatRule::parse_collection);
    analyze(parsed.as_deref(), networks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NatProtocol, NatRuleType};

    fn network(id: &str, subnet: &str) -> NetworkDefinition {
        NetworkDefinition {
            subnet_cidr: Some(subnet.into()),
            dhcp_enabled: true,
            ..NetworkDefinition::new(id, id.to_uppercase())
        }
    }

    fn dns_rule(id: &str, source_filter: SourceFilter) -> NatRule {
        NatRule {
            redirect_ip: Some("192.168.1.53".into()),
            destination_port_spec: Some("53".into()),
            ..NatRule::new(id, NatRuleType::Dnat, source_filter)
        }
    }

    fn two_networks() -> Vec<NetworkDefinition> {
        vec![network("net1", "192.168.1.0/24"), network("net2", "192.168.2.0/24")]
    }

    #[test]
    fn network_reference_covers_only_that_network() {
        let rules = vec![dns_rule("r1", SourceFilter::NetworkReference("net1".into()))];
        let result = analyze(Some(&rules), Some(&two_networks()));

        assert!(result.has_dnat_dns_rules);
        assert!(!result.has_full_coverage);
        assert_eq!(result.covered_network_ids, vec!["net1"]);
        assert_eq!(result.uncovered_network_ids, vec!["net2"]);
        assert_eq!(result.redirect_target_ip.as_deref(), Some("192.168.1.53"));
        assert_eq!(result.rules[0].coverage_type, CoverageType::Network);
    }

    #[test]
    fn supernet_rule_covers_contained_networks() {
        let rules = vec![dns_rule("r1", SourceFilter::AddressAndPort("192.168.0.0/16".into()))];
        let result = analyze(Some(&rules), Some(&two_networks()));

        assert!(result.has_full_coverage);
        assert_eq!(result.covered_network_ids, vec!["net1", "net2"]);
        assert!(result.uncovered_network_ids.is_empty());
    }

    #[test]
    fn exact_subnet_rule_covers_its_network() {
        let rules = vec![dns_rule("r1", SourceFilter::AddressAndPort("192.168.2.0/24".into()))];
        let result = analyze(Some(&rules), Some(&two_networks()));
        assert_eq!(result.covered_network_ids, vec!["net2"]);
    }

    #[test]
    fn narrower_subnet_rule_covers_nothing() {
        let rules = vec![dns_rule("r1", SourceFilter::AddressAndPort("192.168.1.0/25".into()))];
        let result = analyze(Some(&rules), Some(&two_networks()));

        assert!(result.has_dnat_dns_rules);
        assert!(result.covered_network_ids.is_empty());
        assert_eq!(result.rules.len(), 1, "rule stays visible without coverage");
    }

    #[test]
    fn interface_rule_covers_interface_network() {
        let mut rule = dns_rule("r1", SourceFilter::AnySource);
        rule.in_interface_network_id = Some("net2".into());
        let result = analyze(Some(&[rule]), Some(&two_networks()));

        assert_eq!(result.covered_network_ids, vec!["net2"]);
        assert_eq!(result.rules[0].coverage_type, CoverageType::Interface);
        assert_eq!(result.rules[0].in_interface.as_deref(), Some("net2"));
    }

    #[test]
    fn unrestricted_rule_covers_everything() {
        let rule = dns_rule("r1", SourceFilter::AnySource);
        let result = analyze(Some(&[rule]), Some(&two_networks()));

        assert!(result.has_full_coverage);
        assert_eq!(result.rules[0].cidr.as_deref(), Some("0.0.0.0/0"));
    }

    #[test]
    fn single_ip_rule_is_flagged_without_coverage() {
        let rules = vec![dns_rule("r1", SourceFilter::AddressAndPort("192.168.1.10".into()))];
        let result = analyze(Some(&rules), Some(&two_networks()));

        assert!(result.has_dnat_dns_rules);
        assert_eq!(result.single_ip_rules, vec!["192.168.1.10"]);
        assert!(result.covered_network_ids.is_empty());
        assert!(result.rules.is_empty());
        assert!(!result.has_full_coverage);
    }

    #[test]
    fn non_dns_rules_are_ignored() {
        let mut disabled = dns_rule("r1", SourceFilter::NetworkReference("net1".into()));
        disabled.enabled = false;
        let mut tcp_only = dns_rule("r2", SourceFilter::NetworkReference("net1".into()));
        tcp_only.protocol = NatProtocol::Tcp;
        let mut wrong_port = dns_rule("r3", SourceFilter::NetworkReference("net1".into()));
        wrong_port.destination_port_spec = Some("853".into());

        let result = analyze(Some(&[disabled, tcp_only, wrong_port]), Some(&two_networks()));

        assert!(!result.has_dnat_dns_rules);
        assert!(result.redirect_target_ip.is_none());
        assert_eq!(result.uncovered_network_ids, vec!["net1", "net2"]);
    }

    #[test]
    fn first_qualifying_rule_sets_redirect_target() {
        let mut first = dns_rule("r1", SourceFilter::NetworkReference("net1".into()));
        first.redirect_ip = Some("10.0.0.53".into());
        let second = dns_rule("r2", SourceFilter::NetworkReference("net2".into()));
        let result = analyze(Some(&[first, second]), Some(&two_networks()));

        assert!(result.has_full_coverage);
        assert_eq!(result.redirect_target_ip.as_deref(), Some("10.0.0.53"));
        assert_eq!(result.rules[1].redirect_ip.as_deref(), Some("192.168.1.53"));
    }

    #[test]
    fn unknown_network_reference_covers_nothing() {
        let rules = vec![dns_rule("r1", SourceFilter::NetworkReference("ghost".into()))];
        let result = analyze(Some(&rules), Some(&two_networks()));
        assert!(result.covered_network_ids.is_empty());
        assert_eq!(result.rules.len(), 1);
    }

    #[test]
    fn covered_and_uncovered_are_disjoint() {
        let rules = vec![
            dns_rule("r1", SourceFilter::NetworkReference("net1".into())),
            dns_rule("r2", SourceFilter::AddressAndPort("192.168.1.0/24".into())),
        ];
        let result = analyze(Some(&rules), Some(&two_networks()));
        for id in &result.covered_network_ids {
            assert!(!result.uncovered_network_ids.contains(id));
        }
        assert_eq!(result.covered_network_ids, vec!["net1"]);
    }

    #[test]
    fn missing_inputs_yield_neutral_results() {
        let rules = vec![dns_rule("r1", SourceFilter::AnySource)];

        let no_networks = analyze(Some(&rules), None);
        assert_eq!(no_networks, DnatCoverageResult::default());
        assert!(!no_networks.has_full_coverage);

        let empty_networks = analyze(Some(&rules), Some(&[]));
        assert_eq!(empty_networks, DnatCoverageResult::default());

        let no_rules = analyze(None, Some(&two_networks()));
        assert!(!no_rules.has_dnat_dns_rules);
        assert_eq!(no_rules.uncovered_network_ids, vec!["net1", "net2"]);
    }

    #[test]
    fn static_networks_are_still_checked() {
        let mut static_net = network("net3", "10.10.0.0/24");
        static_net.dhcp_enabled = false;
        let result = analyze(Some(&[]), Some(&[static_net]));
        assert_eq!(result.uncovered_network_ids, vec!["net3"]);
    }
}
