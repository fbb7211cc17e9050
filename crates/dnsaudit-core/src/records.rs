// Controller NAT rule records
//
// Wire shapes for NAT rules as the controller exports them. Fields use
// `#[serde(default)]` liberally because exports differ across firmware
// versions; `convert` normalizes them into `model::NatRule`.

use serde::Deserialize;
use serde_json::Value;

/// One NAT rule record.
#[derive(Debug, Clone, Deserialize)]
pub struct NatRuleRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub ip_version: Option<String>,
    /// Redirect target for DNAT rules.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Network id of the inbound interface.
    #[serde(default)]
    pub in_interface: Option<String>,
    #[serde(default)]
    pub destination_filter: Option<FilterRecord>,
    #[serde(default)]
    pub source_filter: Option<FilterRecord>,
}

/// Source or destination filter block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterRecord {
    /// `NETWORK_CONF`, `ANY`, or `ADDRESS_AND_PORT`.
    #[serde(default)]
    pub filter_type: Option<String>,
    #[serde(default)]
    pub network_conf_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Port spec; some firmware emits a bare number instead of a string.
    #[serde(default)]
    pub port: Option<Value>,
}

impl FilterRecord {
    /// The port filter as text, whatever JSON type it arrived as.
    pub fn port_spec(&self) -> Option<String> {
        match self.port.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
