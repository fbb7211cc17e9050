// ── NAT rule domain types ──

use serde::{Deserialize, Serialize};

/// NAT rule kind. Only `Dnat` rules can redirect DNS traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum NatRuleType {
    #[strum(serialize = "DNAT")]
    Dnat,
    #[strum(serialize = "SNAT")]
    Snat,
    #[strum(serialize = "OTHER")]
    Other,
}

impl NatRuleType {
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DNAT" => Self::Dnat,
            "SNAT" => Self::Snat,
            _ => Self::Other,
        }
    }
}

/// Transport protocol a NAT rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum NatProtocol {
    Tcp,
    Udp,
    TcpUdp,
    All,
    Other,
}

impl NatProtocol {
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tcp" => Self::Tcp,
            "udp" => Self::Udp,
            "tcp_udp" | "tcp-udp" | "tcp/udp" => Self::TcpUdp,
            "all" | "any" => Self::All,
            _ => Self::Other,
        }
    }

    /// `true` when the rule matches UDP, which is where resolver traffic lives.
    /// TCP-only rules are not counted as DNS redirection.
    pub fn matches_udp(self) -> bool {
        matches!(self, Self::Udp | Self::TcpUdp | Self::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum IpVersion {
    #[default]
    Ipv4,
    Ipv6,
    Both,
}

impl IpVersion {
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "IPV6" => Self::Ipv6,
            "BOTH" | "ALL" => Self::Both,
            _ => Self::Ipv4,
        }
    }
}

/// Which traffic a rule's source side matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SourceFilter {
    /// Traffic originating from a configured network (`NETWORK_CONF`).
    NetworkReference(String),
    /// No source restriction (`ANY`).
    AnySource,
    /// A literal address or CIDR (`ADDRESS_AND_PORT`).
    AddressAndPort(String),
}

/// A NAT rule as the controller exports it, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatRule {
    pub id: String,
    pub description: Option<String>,
    pub rule_type: NatRuleType,
    pub enabled: bool,
    pub protocol: NatProtocol,
    pub ip_version: IpVersion,
    /// Redirect target (`ip_address` in the controller record).
    pub redirect_ip: Option<String>,
    /// Network id of the inbound interface, if the rule is pinned to one.
    pub in_interface_network_id: Option<String>,
    /// Destination port filter: `"53"`, `"50:60"`, or `"53,853"`.
    pub destination_port_spec: Option<String>,
    pub source_filter: SourceFilter,
}

impl NatRule {
    /// A minimal enabled rule; tests and callers fill in the rest.
    pub fn new(id: impl Into<String>, rule_type: NatRuleType, source_filter: SourceFilter) -> Self {
        Self {
            id: id.into(),
            description: None,
            rule_type,
            enabled: true,
            protocol: NatProtocol::Udp,
            ip_version: IpVersion::Ipv4,
            redirect_ip: None,
            in_interface_network_id: None,
            destination_port_spec: None,
            source_filter,
        }
    }

    /// `true` when the destination port filter includes `port`.
    pub fn targets_port(&self, port: u16) -> bool {
        self.destination_port_spec
            .as_deref()
            .is_some_and(|spec| port_spec_includes(spec, port))
    }

    /// Enabled DNAT over UDP whose destination includes port 53.
    pub fn is_dns_redirect(&self) -> bool {
        self.rule_type == NatRuleType::Dnat
            && self.enabled
            && self.protocol.matches_udp()
            && self.targets_port(53)
    }
}

/// Check a port specification against a single port.
///
/// Accepts a single port, an inclusive `start:end` (or `start-end`) range,
/// or a comma-separated list of either. Unparseable items never match.
pub fn port_spec_includes(spec: &str, port: u16) -> bool {
    spec.split(',').any(|item| {
        let item = item.trim();
        if item.is_empty() {
            return false;
        }
        match item.split_once([':', '-']) {
            Some((start, end)) => match (start.trim().parse::<u16>(), end.trim().parse::<u16>()) {
                (Ok(start), Ok(end)) => (start..=end).contains(&port),
                _ => false,
            },
            None => item.parse::<u16>() == Ok(port),
        }
    })
}
