// Static classification of DNS servers that live outside every
// configured network. No network I/O.

use std::collections::HashSet;

use tracing::debug;

use super::{is_lan_ip, parse_ip};
use crate::model::{ExternalDnsResult, NetworkDefinition};
use crate::providers;

/// Classify the DNS servers DHCP-enabled networks hand out that are
/// neither the network's gateway nor inside any configured subnet.
pub fn detect_external_dns(networks: &[NetworkDefinition]) -> Vec<ExternalDnsResult> {
    let mut results = Vec::new();
    for network in networks.iter().filter(|n| n.dhcp_enabled) {
        let mut listed = HashSet::new();
        for raw in network.dns_servers() {
            let Some(ip) = parse_ip(raw) else {
                debug!(network_id = %network.id, ip = raw, "skipping unparseable DNS server");
                continue;
            };
            if network.is_gateway(raw) || networks.iter().any(|n| n.contains(ip)) {
                continue;
            }
            if !listed.insert(ip) {
                continue;
            }
            results.push(ExternalDnsResult {
                dns_server_ip: raw.to_owned(),
                network_name: network.name.clone(),
                is_public_dns: !is_lan_ip(ip),
                provider_name: providers::identify_provider_from_ip(raw).map(|p| p.name.to_owned()),
            });
        }
    }
    results
}
