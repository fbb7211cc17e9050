// ── Network domain types ──

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::cidr::IpNet;

/// Network purpose, as the controller labels it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkPurpose {
    #[default]
    Corporate,
    Guest,
    Wan,
    VlanOnly,
    #[serde(other)]
    Other,
}

/// A configured LAN/VLAN, immutable for the duration of an audit run.
///
/// Address fields stay as strings: they come straight from controller
/// exports and may be empty or malformed, which every consumer treats as
/// "does not match" rather than an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub vlan_id: Option<u16>,
    #[serde(default)]
    pub subnet_cidr: Option<String>,
    #[serde(default)]
    pub dhcp_enabled: bool,
    #[serde(default)]
    pub gateway_ip: Option<String>,
    #[serde(default)]
    pub dns_server_ips: Vec<String>,
    #[serde(default)]
    pub purpose: NetworkPurpose,
}

impl NetworkDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// The parsed subnet, if one is configured and valid.
    pub fn subnet(&self) -> Option<IpNet> {
        self.subnet_cidr.as_deref()?.parse().ok()
    }

    /// `true` when `ip` is this network's gateway address.
    pub fn is_gateway(&self, ip: &str) -> bool {
        let Some(gateway) = self.gateway_ip.as_deref() else {
            return false;
        };
        let gateway = gateway.trim();
        let ip = ip.trim();
        if gateway.is_empty() {
            return false;
        }
        match (gateway.parse::<IpAddr>(), ip.parse::<IpAddr>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => gateway.eq_ignore_ascii_case(ip),
        }
    }

    /// `true` when `ip` falls inside this network's subnet.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.subnet().is_some_and(|net| net.contains(ip))
    }

    /// Configured DNS servers with blank entries dropped.
    pub fn dns_servers(&self) -> impl Iterator<Item = &str> {
        self.dns_server_ips
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}
