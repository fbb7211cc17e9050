// ── Third-party DNS detection ──
//
// Classifies the DNS servers that networks hand out over DHCP. LAN
// resolvers are fingerprinted over HTTP (Pi-hole, AdGuard Home); servers
// outside every configured subnet are classified statically.

mod external;
mod probe;

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};

use futures_util::StreamExt;
use futures_util::stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::error::AuditError;
use crate::model::{NetworkDefinition, ThirdPartyDnsResult};
use crate::providers;
use crate::transport::TransportConfig;

pub use external::detect_external_dns;
pub use probe::{DEFAULT_PROBE_ORDER, ProbeKind};
use probe::Fingerprint;

pub const GENERIC_LAN_PROVIDER: &str = "Third-Party LAN DNS";
pub const GENERIC_PROVIDER: &str = "Third-Party DNS";

const DEFAULT_MAX_CONCURRENCY: usize = 8;

// ── Probe configuration ─────────────────────────────────────────────

/// One port/scheme combination to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeEndpoint {
    pub port: u16,
    pub https: bool,
}

impl ProbeEndpoint {
    pub const fn http(port: u16) -> Self {
        Self { port, https: false }
    }

    pub const fn https(port: u16) -> Self {
        Self { port, https: true }
    }

    fn base_url(self, ip: IpAddr) -> Option<Url> {
        let scheme = if self.https { "https" } else { "http" };
        Url::parse(&format!("{scheme}://{}/", SocketAddr::new(ip, self.port))).ok()
    }
}

/// Tuning for [`ThirdPartyDnsDetector`].
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub transport: TransportConfig,
    /// Upper bound on candidates probed at the same time.
    pub max_concurrency: usize,
    pub pihole_endpoints: Vec<ProbeEndpoint>,
    pub adguard_endpoints: Vec<ProbeEndpoint>,
    /// Cascade order; the first probe that recognizes a server wins.
    pub probe_order: Vec<ProbeKind>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            pihole_endpoints: vec![
                ProbeEndpoint::http(80),
                ProbeEndpoint::http(8080),
                ProbeEndpoint::https(443),
            ],
            adguard_endpoints: vec![
                ProbeEndpoint::http(80),
                ProbeEndpoint::http(3000),
                ProbeEndpoint::https(443),
            ],
            probe_order: DEFAULT_PROBE_ORDER.to_vec(),
        }
    }
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.transport.timeout.is_zero() {
            return Err(invalid("timeout", "must be greater than zero"));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency", "must be greater than zero"));
        }
        let mut endpoints = self.pihole_endpoints.iter().chain(&self.adguard_endpoints);
        if endpoints.any(|e| e.port == 0) {
            return Err(invalid("endpoints", "port 0 is not probeable"));
        }
        Ok(())
    }

    fn endpoints(&self, kind: ProbeKind) -> &[ProbeEndpoint] {
        match kind {
            ProbeKind::Pihole => &self.pihole_endpoints,
            ProbeKind::AdGuardHome => &self.adguard_endpoints,
        }
    }

    /// Endpoints for one probe: the custom port first (HTTP, then HTTPS),
    /// then the defaults, each at most once.
    fn ordered_endpoints(&self, kind: ProbeKind, custom_port: Option<u16>) -> Vec<ProbeEndpoint> {
        let custom = custom_port
            .filter(|p| *p != 0)
            .map(|p| [ProbeEndpoint::http(p), ProbeEndpoint::https(p)]);
        let mut seen = HashSet::new();
        custom
            .into_iter()
            .flatten()
            .chain(self.endpoints(kind).iter().copied())
            .filter(|e| seen.insert(*e))
            .collect()
    }
}

fn invalid(field: &str, reason: &str) -> AuditError {
    AuditError::InvalidConfig {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// `true` for RFC 1918 IPv4 and IPv6 unique-local (`fc00::/7`) addresses.
pub fn is_lan_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(v6) => v6.is_unique_local(),
    }
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse().ok()
}

// ── Detector ────────────────────────────────────────────────────────

/// A (network, DNS server) pairing that needs a probe result.
struct Pairing<'a> {
    network: &'a NetworkDefinition,
    dns_server_ip: &'a str,
    ip: IpAddr,
}

/// Fingerprints LAN DNS servers over HTTP.
#[derive(Debug, Clone)]
pub struct ThirdPartyDnsDetector {
    client: reqwest::Client,
    config: ProbeConfig,
}

impl ThirdPartyDnsDetector {
    pub fn new(config: ProbeConfig) -> Result<Self, AuditError> {
        config.validate()?;
        let client = config.transport.build_client()?;
        Ok(Self { client, config })
    }

    /// Use a prebuilt client; `config.transport` is ignored.
    pub fn with_client(client: reqwest::Client, config: ProbeConfig) -> Result<Self, AuditError> {
        config.validate()?;
        Ok(Self { client, config })
    }

    /// Probe every LAN DNS server the DHCP-enabled `networks` hand out.
    ///
    /// Gateways and known public resolvers are skipped. Each distinct
    /// server is probed once; its classification is repeated for every
    /// network that lists it.
    pub async fn detect_third_party_dns(
        &self,
        networks: &[NetworkDefinition],
        custom_port: Option<u16>,
    ) -> Vec<ThirdPartyDnsResult> {
        self.detect_third_party_dns_with_cancel(networks, custom_port, &CancellationToken::new())
            .await
    }

    /// Like [`Self::detect_third_party_dns`], stopping early once `cancel`
    /// fires. Only candidates whose cascade finished are reported.
    pub async fn detect_third_party_dns_with_cancel(
        &self,
        networks: &[NetworkDefinition],
        custom_port: Option<u16>,
        cancel: &CancellationToken,
    ) -> Vec<ThirdPartyDnsResult> {
        let pairings = collect_pairings(networks);
        let mut unique = Vec::new();
        let mut queued = HashSet::new();
        for pairing in &pairings {
            if queued.insert(pairing.ip) {
                unique.push(pairing.ip);
            }
        }
        if unique.is_empty() || cancel.is_cancelled() {
            return Vec::new();
        }
        debug!(
            candidates = unique.len(),
            pairings = pairings.len(),
            "probing third-party DNS candidates"
        );

        let classified: HashMap<IpAddr, Option<Fingerprint>> = stream::iter(unique)
            .map(|ip| async move { (ip, self.classify(ip, custom_port).await) })
            .buffer_unordered(self.config.max_concurrency)
            .take_until(cancel.cancelled())
            .collect()
            .await;

        let results: Vec<ThirdPartyDnsResult> = pairings
            .iter()
            .filter_map(|p| classified.get(&p.ip).map(|fp| build_result(p, fp.as_ref())))
            .collect();
        info!(
            results = results.len(),
            pihole = results.iter().filter(|r| r.is_pihole).count(),
            adguard_home = results.iter().filter(|r| r.is_adguard_home).count(),
            cancelled = cancel.is_cancelled(),
            "third-party DNS detection finished"
        );
        results
    }

    /// Run the probe cascade for one server, stopping at the first hit.
    async fn classify(&self, ip: IpAddr, custom_port: Option<u16>) -> Option<Fingerprint> {
        for &kind in &self.config.probe_order {
            for endpoint in self.config.ordered_endpoints(kind, custom_port) {
                let Some(base) = endpoint.base_url(ip) else {
                    continue;
                };
                match kind.run(&self.client, &base).await {
                    Ok(fingerprint) => {
                        info!(%ip, port = endpoint.port, product = %kind, "DNS server fingerprinted");
                        return Some(fingerprint);
                    }
                    Err(e) => {
                        debug!(%ip, port = endpoint.port, https = endpoint.https, probe = %kind, error = %e, "probe negative");
                    }
                }
            }
        }
        None
    }
}

/// Probe candidates in network order, then DNS-server order. A network
/// listing the same server twice yields one pairing.
fn collect_pairings(networks: &[NetworkDefinition]) -> Vec<Pairing<'_>> {
    let mut pairings = Vec::new();
    for network in networks.iter().filter(|n| n.dhcp_enabled) {
        let mut listed = HashSet::new();
        for dns_server_ip in network.dns_servers() {
            if network.is_gateway(dns_server_ip) {
                debug!(network_id = %network.id, ip = dns_server_ip, "skipping gateway DNS");
                continue;
            }
            if providers::is_public_dns_provider_ip(dns_server_ip) {
                debug!(network_id = %network.id, ip = dns_server_ip, "skipping public resolver");
                continue;
            }
            let Some(ip) = parse_ip(dns_server_ip) else {
                debug!(network_id = %network.id, ip = dns_server_ip, "skipping unparseable DNS server");
                continue;
            };
            if listed.insert(ip) {
                pairings.push(Pairing {
                    network,
                    dns_server_ip,
                    ip,
                });
            }
        }
    }
    pairings
}

fn build_result(pairing: &Pairing<'_>, fingerprint: Option<&Fingerprint>) -> ThirdPartyDnsResult {
    let is_lan_ip = is_lan_ip(pairing.ip);
    let kind = fingerprint.map(|f| f.kind);
    let version = fingerprint.and_then(|f| f.version.clone());
    let dns_provider_name = match kind {
        Some(kind) => kind.to_string(),
        None if is_lan_ip => GENERIC_LAN_PROVIDER.to_owned(),
        None => GENERIC_PROVIDER.to_owned(),
    };
    let is_pihole = kind == Some(ProbeKind::Pihole);
    let is_adguard_home = kind == Some(ProbeKind::AdGuardHome);
    ThirdPartyDnsResult {
        dns_server_ip: pairing.dns_server_ip.to_owned(),
        network_id: pairing.network.id.clone(),
        network_name: pairing.network.name.clone(),
        network_vlan_id: pairing.network.vlan_id,
        is_lan_ip,
        is_pihole,
        pihole_version: version.clone().filter(|_| is_pihole),
        is_adguard_home,
        adguard_home_version: version.filter(|_| is_adguard_home),
        dns_provider_name,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn network(id: &str, subnet: &str, gateway: &str, dns: &[&str]) -> NetworkDefinition {
        NetworkDefinition {
            subnet_cidr: Some(subnet.into()),
            gateway_ip: Some(gateway.into()),
            dhcp_enabled: true,
            dns_server_ips: dns.iter().map(|s| (*s).to_owned()).collect(),
            ..NetworkDefinition::new(id, id.to_uppercase())
        }
    }

    #[test]
    fn lan_ip_ranges() {
        for ip in ["10.0.0.1", "172.16.5.4", "192.168.1.5", "fd00::53", "fc12::1"] {
            assert!(is_lan_ip(ip.parse().unwrap()), "{ip}");
        }
        for ip in ["8.8.8.8", "172.32.0.1", "100.64.0.1", "2001:db8::1", "fe80::1"] {
            assert!(!is_lan_ip(ip.parse().unwrap()), "{ip}");
        }
    }

    #[test]
    fn default_endpoints_without_custom_port() {
        let config = ProbeConfig::default();
        assert_eq!(
            config.ordered_endpoints(ProbeKind::Pihole, None),
            vec![
                ProbeEndpoint::http(80),
                ProbeEndpoint::http(8080),
                ProbeEndpoint::https(443),
            ]
        );
        assert_eq!(
            config.ordered_endpoints(ProbeKind::AdGuardHome, Some(0)),
            vec![
                ProbeEndpoint::http(80),
                ProbeEndpoint::http(3000),
                ProbeEndpoint::https(443),
            ]
        );
    }

    #[test]
    fn custom_port_goes_first_and_is_not_retried() {
        let config = ProbeConfig::default();
        assert_eq!(
            config.ordered_endpoints(ProbeKind::Pihole, Some(8080)),
            vec![
                ProbeEndpoint::http(8080),
                ProbeEndpoint::https(8080),
                ProbeEndpoint::http(80),
                ProbeEndpoint::https(443),
            ]
        );
    }

    #[test]
    fn validation_rejects_unusable_settings() {
        let mut config = ProbeConfig::default();
        assert!(config.validate().is_ok());

        config.max_concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(AuditError::InvalidConfig { ref field, .. }) if field == "max_concurrency"
        ));

        let mut config = ProbeConfig::default();
        config.adguard_endpoints.push(ProbeEndpoint::http(0));
        assert!(config.validate().is_err());

        let mut config = ProbeConfig::default();
        config.transport.timeout = std::time::Duration::ZERO;
        assert!(ThirdPartyDnsDetector::new(config).is_err());
    }

    #[test]
    fn ipv6_base_url_is_bracketed() {
        let url = ProbeEndpoint::https(443).base_url("fd00::53".parse().unwrap()).unwrap();
        assert_eq!(url.as_str(), "https://[fd00::53]/");
        let url = ProbeEndpoint::http(8080).base_url("192.168.1.5".parse().unwrap()).unwrap();
        assert_eq!(url.as_str(), "http://192.168.1.5:8080/");
    }

    #[test]
    fn pairings_skip_gateway_public_and_junk() {
        let mut guest = network("guest", "10.0.0.0/24", "10.0.0.1", &["192.168.1.5"]);
        guest.dhcp_enabled = false;
        let networks = vec![
            network(
                "lan",
                "192.168.1.0/24",
                "192.168.1.1",
                &["192.168.1.1", "1.1.1.1", "", "bogus", "192.168.1.5", " 192.168.1.5 "],
            ),
            guest,
        ];
        let pairings = collect_pairings(&networks);
        assert_eq!(pairings.len(), 1);
        assert_eq!(pairings[0].network.id, "lan");
        assert_eq!(pairings[0].dns_server_ip, "192.168.1.5");
    }

    #[test]
    fn shared_server_yields_one_pairing_per_network() {
        let networks = vec![
            network("lan", "192.168.1.0/24", "192.168.1.1", &["192.168.1.5"]),
            network("iot", "192.168.20.0/24", "192.168.20.1", &["192.168.1.5"]),
        ];
        let pairings = collect_pairings(&networks);
        let ids: Vec<_> = pairings.iter().map(|p| p.network.id.as_str()).collect();
        assert_eq!(ids, ["lan", "iot"]);
    }

    #[test]
    fn result_naming() {
        let networks = [network("lan", "192.168.1.0/24", "192.168.1.1", &["192.168.1.5"])];
        let pairing = Pairing {
            network: &networks[0],
            dns_server_ip: "192.168.1.5",
            ip: "192.168.1.5".parse().unwrap(),
        };
        let generic = build_result(&pairing, None);
        assert_eq!(generic.dns_provider_name, GENERIC_LAN_PROVIDER);
        assert!(!generic.is_pihole && !generic.is_adguard_home);

        let fp = Fingerprint {
            kind: ProbeKind::AdGuardHome,
            version: Some("0.107.52".into()),
        };
        let adguard = build_result(&pairing, Some(&fp));
        assert_eq!(adguard.dns_provider_name, "AdGuard Home");
        assert_eq!(adguard.adguard_home_version.as_deref(), Some("0.107.52"));
        assert!(adguard.pihole_version.is_none());

        let public = Pairing {
            ip: "203.0.113.7".parse().unwrap(),
            dns_server_ip: "203.0.113.7",
            ..pairing
        };
        assert_eq!(build_result(&public, None).dns_provider_name, GENERIC_PROVIDER);
    }
}
