// ── DNS Stamp decoding ──
//
// A stamp is `sdns://` + URL-safe base64 of:
//
//   protocol (1) | props (8, LE) | protocol-specific length-prefixed fields
//
// DNSCrypt: addr, public key, provider name
// DoH:      addr, hashes (VLP), hostname, path, [bootstrap (VLP)]
// DoT/DoQ:  addr, hashes (VLP), hostname, [bootstrap (VLP)]
// ODoH:     hostname, path
//
// VLP ("variable-length list") items set the high bit of their length byte
// when another item follows.

use std::net::IpAddr;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::providers::{self, DohProviderInfo};

const SCHEME: &str = "sdns://";

const PROP_DNSSEC: u64 = 1;
const PROP_NO_LOGS: u64 = 1 << 1;
const PROP_NO_FILTER: u64 = 1 << 2;

const VLP_MORE: u8 = 0x80;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encrypted DNS protocol carried by a stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum StampProtocol {
    #[strum(serialize = "DNSCrypt")]
    DnsCrypt,
    #[strum(serialize = "DoH")]
    DoH,
    #[strum(serialize = "DoT")]
    DoT,
    #[strum(serialize = "DoQ")]
    DoQ,
    #[strum(serialize = "ODoH")]
    ODoH,
}

impl StampProtocol {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::DnsCrypt),
            0x02 => Some(Self::DoH),
            0x03 => Some(Self::DoT),
            0x04 => Some(Self::DoQ),
            0x05 => Some(Self::ODoH),
            _ => None,
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::DoT | Self::DoQ => 853,
            Self::DoH | Self::ODoH | Self::DnsCrypt => 443,
        }
    }

    fn has_path(self) -> bool {
        matches!(self, Self::DoH | Self::ODoH)
    }
}

/// Why a stamp could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StampError {
    #[error("stamp is empty")]
    Empty,

    #[error("stamp is not valid URL-safe base64")]
    Base64,

    #[error("stamp payload is {0} bytes, need at least 2")]
    TooShort(usize),

    #[error("unsupported stamp protocol 0x{0:02x}")]
    UnknownProtocol(u8),

    #[error("stamp truncated while reading {field}")]
    Truncated { field: &'static str },

    #[error("stamp {field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
}

/// Decoded description of an encrypted DNS endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsStampInfo {
    pub protocol: StampProtocol,
    pub hostname: Option<String>,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub dnssec_enabled: bool,
    pub no_logging: bool,
    pub no_filtering: bool,
    pub provider_info: Option<&'static DohProviderInfo>,
    pub raw_stamp: String,
}

/// Cursor over the stamp payload.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn byte(&mut self, field: &'static str) -> Result<u8, StampError> {
        let b = *self.buf.get(self.pos).ok_or(StampError::Truncated { field })?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], StampError> {
        let end = self.pos.checked_add(len).ok_or(StampError::Truncated { field })?;
        let bytes = self.buf.get(self.pos..end).ok_or(StampError::Truncated { field })?;
        self.pos = end;
        Ok(bytes)
    }

    /// Props: 8 bytes, little-endian. Payloads that stop short of 8 bytes
    /// carry only the bytes present.
    fn props(&mut self) -> u64 {
        let mut raw = [0u8; 8];
        for slot in &mut raw {
            match self.buf.get(self.pos) {
                Some(b) => {
                    *slot = *b;
                    self.pos += 1;
                }
                None => break,
            }
        }
        u64::from_le_bytes(raw)
    }

    /// One length-prefixed byte string.
    fn lp(&mut self, field: &'static str) -> Result<&'a [u8], StampError> {
        let len = self.byte(field)?;
        self.take(usize::from(len), field)
    }

    /// Length-prefixed UTF-8 string; empty strings become `None`.
    fn lp_str(&mut self, field: &'static str) -> Result<Option<String>, StampError> {
        let bytes = self.lp(field)?;
        let s = std::str::from_utf8(bytes).map_err(|_| StampError::InvalidUtf8 { field })?;
        Ok(Some(s.trim().to_owned()).filter(|s| !s.is_empty()))
    }

    /// Skip a variable-length list of byte strings.
    fn skip_vlp(&mut self, field: &'static str) -> Result<(), StampError> {
        loop {
            let len = self.byte(field)?;
            self.take(usize::from(len & !VLP_MORE), field)?;
            if len & VLP_MORE == 0 {
                return Ok(());
            }
        }
    }
}

/// Split a stamp address field into host and optional port.
///
/// Handles `host`, `host:port`, `[v6]`, `[v6]:port`, and bare IPv6.
fn split_host_port(addr: &str) -> (Option<String>, Option<u16>) {
    let addr = addr.trim();
    if addr.is_empty() {
        return (None, None);
    }
    if let Some(rest) = addr.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((host, tail)) => {
                let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
                (Some(host.to_owned()).filter(|h| !h.is_empty()), port)
            }
            None => (Some(rest.to_owned()), None),
        };
    }
    // More than one colon without brackets: a bare IPv6 literal.
    if addr.matches(':').count() > 1 {
        return (Some(addr.to_owned()), None);
    }
    match addr.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (Some(host.to_owned()).filter(|h| !h.is_empty()), Some(port)),
            Err(_) => (Some(addr.to_owned()), None),
        },
        None => (Some(addr.to_owned()), None),
    }
}

fn decode_payload(stamp: &str) -> Result<(String, Vec<u8>), StampError> {
    let raw = stamp.trim();
    if raw.is_empty() {
        return Err(StampError::Empty);
    }
    let body = raw
        .get(..SCHEME.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(SCHEME))
        .map_or(raw, |_| &raw[SCHEME.len()..]);
    if body.is_empty() {
        return Err(StampError::Empty);
    }
    let payload = URL_SAFE_LENIENT
        .decode(body)
        .map_err(|_| StampError::Base64)?;
    Ok((raw.to_owned(), payload))
}

impl DnsStampInfo {
    /// Decode a stamp, reporting why it failed.
    pub fn parse(stamp: &str) -> Result<Self, StampError> {
        let (raw_stamp, payload) = decode_payload(stamp)?;
        if payload.len() < 2 {
            return Err(StampError::TooShort(payload.len()));
        }

        let mut r = Reader::new(&payload);
        let kind = r.byte("protocol")?;
        let protocol = StampProtocol::from_byte(kind).ok_or(StampError::UnknownProtocol(kind))?;
        let props = r.props();

        let (address, hostname, path) = match protocol {
            StampProtocol::DnsCrypt => {
                let address = r.lp_str("address")?;
                r.lp("public key")?;
                let provider = r.lp_str("provider name")?;
                (address, provider, None)
            }
            StampProtocol::DoH | StampProtocol::DoT | StampProtocol::DoQ => {
                let address = r.lp_str("address")?;
                r.skip_vlp("hashes")?;
                let hostname = r.lp_str("hostname")?;
                let path = if protocol.has_path() {
                    r.lp_str("path")?
                } else {
                    None
                };
                (address, hostname, path)
            }
            StampProtocol::ODoH => {
                let hostname = r.lp_str("hostname")?;
                let path = r.lp_str("path")?;
                (None, hostname, path)
            }
        };
        if !r.is_empty() {
            debug!(protocol = %protocol, "ignoring trailing stamp fields");
        }

        let (host, addr_port) = address.as_deref().map_or((None, None), split_host_port);
        let ip = host
            .as_deref()
            .and_then(|h| h.parse::<IpAddr>().ok())
            .map(|ip| ip.to_string());
        // A named address stands in for a missing hostname field.
        let hostname = hostname.or_else(|| host.filter(|_| ip.is_none()));
        // DoH/DoT hostnames may carry their own port.
        let (hostname, host_port) = match hostname {
            Some(h) => match split_host_port(&h) {
                (Some(name), port) if name.parse::<IpAddr>().is_err() => (Some(name), port),
                _ => (Some(h), None),
            },
            None => (None, None),
        };
        let port = addr_port
            .or(host_port)
            .unwrap_or_else(|| protocol.default_port());

        let provider_info = hostname.as_deref().and_then(providers::identify_provider);

        Ok(Self {
            protocol,
            hostname,
            ip,
            port: Some(port),
            path,
            dnssec_enabled: props & PROP_DNSSEC != 0,
            no_logging: props & PROP_NO_LOGS != 0,
            no_filtering: props & PROP_NO_FILTER != 0,
            provider_info,
            raw_stamp,
        })
    }

    /// Filtering is active when the stamp does not disclaim it and the
    /// recognized provider offers it.
    pub fn is_filtered(&self) -> bool {
        !self.no_filtering && self.provider_info.is_some_and(|p| p.supports_filtering)
    }

    /// Human-readable one-liner, e.g. `"Cloudflare (DNSSEC) No-Log"`.
    pub fn display_summary(&self) -> String {
        let name = self
            .provider_info
            .map(|p| p.name)
            .or(self.hostname.as_deref())
            .unwrap_or("Unknown");
        let mut parts = vec![name];
        if self.dnssec_enabled {
            parts.push("(DNSSEC)");
        }
        if self.no_logging {
            parts.push("No-Log");
        }
        if self.is_filtered() {
            parts.push("Filtered");
        }
        parts.join(" ")
    }
}

/// Decode a stamp; any failure yields `None`.
pub fn decode(stamp: &str) -> Option<DnsStampInfo> {
    match DnsStampInfo::parse(stamp) {
        Ok(info) => Some(info),
        Err(e) => {
            debug!(error = %e, "stamp decode failed");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CLOUDFLARE_DOH: &str =
        "sdns://AgcAAAAAAAAABzEuMC4wLjEAEmRucy5jbG91ZGZsYXJlLmNvbQovZG5zLXF1ZXJ5";
    const GOOGLE_DOT: &str = "sdns://AwcAAAAAAAAABzguOC44LjgACmRucy5nb29nbGU";
    const QUAD9_DOT_WITH_PORT: &str = "sdns://AwEAAAAAAAAACzkuOS45Ljk6ODUzAA1kbnMucXVhZDkubmV0";
    const NEXTDNS_DOH: &str = "sdns://AgEAAAAAAAAAAAAOZG5zLm5leHRkbnMuaW8HL2FiYzEyMw";
    const IPV6_DOH: &str = "sdns://AgAAAAAAAAAAG1syNjA2OjQ3MDA6NDcwMDo6MTExMV06ODQ0MwASY2xvdWRmbGFyZS1kbnMuY29tCi9kbnMtcXVlcnk";
    const ADGUARD_DOQ: &str = "sdns://BAMAAAAAAAAADDk0LjE0MC4xNC4xNAATZG5zLmFkZ3VhcmQtZG5zLmNvbQ";
    const CLOUDFLARE_ODOH: &str = "sdns://BQEAAAAAAAAAF29kb2guY2xvdWRmbGFyZS1kbnMuY29tCi9kbnMtcXVlcnk";
    const OPENDNS_DNSCRYPT: &str = "sdns://AQYAAAAAAAAADjIwOC42Ny4yMjIuMjIyIAEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBGzIuZG5zY3J5cHQtY2VydC5vcGVuZG5zLmNvbQ";
    const MULTI_HASH_DOH: &str = "sdns://AgQAAAAAAAAAAIKquwLM3Q91bmtub3duLmV4YW1wbGUCL3E";

    #[test]
    fn decodes_cloudflare_doh() {
        let info = decode(CLOUDFLARE_DOH).unwrap();
        assert_eq!(info.protocol, StampProtocol::DoH);
        assert!(info.hostname.as_deref().unwrap().contains("cloudflare"));
        assert!(info.path.as_deref().unwrap().contains("dns-query"));
        assert_eq!(info.ip.as_deref(), Some("1.0.0.1"));
        assert_eq!(info.port, Some(443));
        assert!(info.dnssec_enabled);
        assert!(info.no_logging);
        assert!(info.no_filtering);
        assert_eq!(info.provider_info.unwrap().name, "Cloudflare");
        assert_eq!(info.raw_stamp, CLOUDFLARE_DOH);
    }

    #[test]
    fn decodes_google_dot() {
        let info = decode(GOOGLE_DOT).unwrap();
        assert_eq!(info.protocol, StampProtocol::DoT);
        assert_eq!(info.port, Some(853));
        assert_eq!(info.hostname.as_deref(), Some("dns.google"));
        assert!(info.path.is_none());
        assert_eq!(info.provider_info.unwrap().name, "Google");
    }

    #[test]
    fn explicit_port_in_address_wins() {
        let info = decode(QUAD9_DOT_WITH_PORT).unwrap();
        assert_eq!(info.ip.as_deref(), Some("9.9.9.9"));
        assert_eq!(info.port, Some(853));
        assert!(info.dnssec_enabled);
        assert!(!info.no_logging);
    }

    #[test]
    fn bracketed_ipv6_address() {
        let info = decode(IPV6_DOH).unwrap();
        assert_eq!(info.ip.as_deref(), Some("2606:4700:4700::1111"));
        assert_eq!(info.port, Some(8443));
        assert!(!info.dnssec_enabled);
    }

    #[test]
    fn empty_address_keeps_hostname_and_path() {
        let info = decode(NEXTDNS_DOH).unwrap();
        assert!(info.ip.is_none());
        assert_eq!(info.hostname.as_deref(), Some("dns.nextdns.io"));
        assert_eq!(info.path.as_deref(), Some("/abc123"));
        assert_eq!(info.provider_info.unwrap().name, "NextDNS");
    }

    #[test]
    fn decodes_other_protocols() {
        let doq = decode(ADGUARD_DOQ).unwrap();
        assert_eq!(doq.protocol, StampProtocol::DoQ);
        assert_eq!(doq.port, Some(853));

        let odoh = decode(CLOUDFLARE_ODOH).unwrap();
        assert_eq!(odoh.protocol, StampProtocol::ODoH);
        assert_eq!(odoh.hostname.as_deref(), Some("odoh.cloudflare-dns.com"));
        assert_eq!(odoh.path.as_deref(), Some("/dns-query"));

        let dnscrypt = decode(OPENDNS_DNSCRYPT).unwrap();
        assert_eq!(dnscrypt.protocol, StampProtocol::DnsCrypt);
        assert_eq!(dnscrypt.hostname.as_deref(), Some("2.dnscrypt-cert.opendns.com"));
        assert_eq!(dnscrypt.ip.as_deref(), Some("208.67.222.222"));
    }

    #[test]
    fn skips_every_hash_in_list() {
        let info = decode(MULTI_HASH_DOH).unwrap();
        assert_eq!(info.hostname.as_deref(), Some("unknown.example"));
        assert_eq!(info.path.as_deref(), Some("/q"));
        assert!(info.provider_info.is_none());
    }

    #[test]
    fn scheme_is_optional() {
        let bare = CLOUDFLARE_DOH.trim_start_matches(SCHEME);
        assert_eq!(decode(bare).unwrap().protocol, StampProtocol::DoH);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(decode("").is_none());
        assert!(decode("sdns://").is_none());
        assert!(decode("sdns://!!!not-base64!!!").is_none());
        assert_eq!(DnsStampInfo::parse("sdns://Ag"), Err(StampError::TooShort(1)));
        assert_eq!(
            DnsStampInfo::parse("sdns://AAcAAAAAAAAA"),
            Err(StampError::UnknownProtocol(0))
        );
        // Address length byte claims more bytes than remain.
        assert!(matches!(
            DnsStampInfo::parse("sdns://AgcAAAAAAAAAEDEu"),
            Err(StampError::Truncated { .. })
        ));
    }

    #[test]
    fn display_summary_composition() {
        let cloudflare = decode(CLOUDFLARE_DOH).unwrap();
        assert_eq!(cloudflare.display_summary(), "Cloudflare (DNSSEC) No-Log");

        let nextdns = decode(NEXTDNS_DOH).unwrap();
        assert_eq!(nextdns.display_summary(), "NextDNS (DNSSEC) Filtered");

        let unknown = decode(MULTI_HASH_DOH).unwrap();
        assert_eq!(unknown.display_summary(), "unknown.example");

        let mut anonymous = unknown;
        anonymous.hostname = None;
        assert_eq!(anonymous.display_summary(), "Unknown");
    }

    #[test]
    fn host_port_splitting() {
        assert_eq!(split_host_port("1.1.1.1"), (Some("1.1.1.1".into()), None));
        assert_eq!(split_host_port("1.1.1.1:853"), (Some("1.1.1.1".into()), Some(853)));
        assert_eq!(split_host_port("[::1]:53"), (Some("::1".into()), Some(53)));
        assert_eq!(split_host_port("[::1]"), (Some("::1".into()), None));
        assert_eq!(split_host_port("2001:db8::1"), (Some("2001:db8::1".into()), None));
        assert_eq!(split_host_port(""), (None, None));
    }
}
