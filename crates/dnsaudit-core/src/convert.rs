// ── Record-to-domain conversions ──
//
// Bridges controller NAT rule records into `model::NatRule`. Parsing is
// lenient: a record that cannot be read is skipped, never fatal.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::model::{IpVersion, NatProtocol, NatRule, NatRuleType, SourceFilter};
use crate::records::{FilterRecord, NatRuleRecord};

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

/// Map a source filter block onto the closed `SourceFilter` variants.
///
/// A missing block or an unrecognized `filter_type` places no source
/// restriction on the rule, so it maps to `AnySource`.
fn source_filter_from(filter: Option<FilterRecord>) -> SourceFilter {
    let Some(filter) = filter else {
        return SourceFilter::AnySource;
    };
    let kind = filter
        .filter_type
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase();
    match kind.as_str() {
        "NETWORK_CONF" => match non_empty(filter.network_conf_id) {
            Some(id) => SourceFilter::NetworkReference(id),
            None => SourceFilter::AnySource,
        },
        "ADDRESS_AND_PORT" => {
            SourceFilter::AddressAndPort(non_empty(filter.address).unwrap_or_default())
        }
        _ => SourceFilter::AnySource,
    }
}

impl From<NatRuleRecord> for NatRule {
    fn from(r: NatRuleRecord) -> Self {
        let destination_port_spec = r.destination_filter.as_ref().and_then(FilterRecord::port_spec);
        NatRule {
            id: r.id,
            description: non_empty(r.description),
            rule_type: r
                .rule_type
                .as_deref()
                .map_or(NatRuleType::Other, NatRuleType::from_label),
            enabled: r.enabled,
            protocol: r
                .protocol
                .as_deref()
                .map_or(NatProtocol::All, NatProtocol::from_label),
            ip_version: r
                .ip_version
                .as_deref()
                .map_or(IpVersion::Ipv4, IpVersion::from_label),
            redirect_ip: non_empty(r.ip_address),
            in_interface_network_id: non_empty(r.in_interface),
            destination_port_spec,
            source_filter: source_filter_from(r.source_filter),
        }
    }
}

impl NatRule {
    /// Parse a single controller record. Returns `None` for anything that
    /// is not a rule object with an `_id`.
    pub fn from_record(value: &Value) -> Option<Self> {
        match NatRuleRecord::deserialize(value) {
            Ok(record) => Some(Self::from(record)),
            Err(e) => {
                debug!(error = %e, "skipping unreadable NAT rule record");
                None
            }
        }
    }

    /// Parse a rule collection: a bare array, or a `{ "data": [...] }`
    /// envelope. Unreadable entries are dropped.
    pub fn parse_collection(value: &Value) -> Vec<Self> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(map) => match map.get("data") {
                Some(Value::Array(items)) => items,
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        items.iter().filter_map(Self::from_record).collect()
    }
}
