//! Configuration for dnsaudit consumers.
//!
//! TOML file + `DNSAUDIT_` environment overrides, translated into the
//! core's `ProbeConfig` and `PtrResolver`. Probe endpoints, timeouts, and
//! concurrency are tunable; the analysis itself has no knobs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dnsaudit_core::{ProbeConfig, ProbeEndpoint, PtrResolver, TlsMode, TransportConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeSettings,

    #[serde(default)]
    pub resolver: ResolverSettings,
}

/// HTTP probing of LAN resolvers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProbeSettings {
    /// Per-request timeout in seconds.
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,

    /// Candidates probed at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Admin port tried before the defaults (HTTP, then HTTPS).
    ///
    /// Not part of `ProbeConfig`: pass it to
    /// `ThirdPartyDnsDetector::detect_third_party_dns` per run.
    pub custom_port: Option<u16>,

    #[serde(default = "default_pihole_ports")]
    pub pihole_ports: Vec<EndpointSettings>,

    #[serde(default = "default_adguard_ports")]
    pub adguard_ports: Vec<EndpointSettings>,

    /// Accept self-signed admin panels.
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,

    /// CA certificate used when invalid certificates are not accepted.
    pub ca_cert: Option<PathBuf>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout(),
            max_concurrency: default_max_concurrency(),
            custom_port: None,
            pihole_ports: default_pihole_ports(),
            adguard_ports: default_adguard_ports(),
            accept_invalid_certs: default_accept_invalid_certs(),
            ca_cert: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct EndpointSettings {
    pub port: u16,
    #[serde(default)]
    pub https: bool,
}

impl From<EndpointSettings> for ProbeEndpoint {
    fn from(e: EndpointSettings) -> Self {
        Self {
            port: e.port,
            https: e.https,
        }
    }
}

/// Reverse-DNS lookups used for provider identification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolverSettings {
    #[serde(default = "default_ptr_lookups")]
    pub ptr_lookups: bool,

    #[serde(default = "default_ptr_timeout")]
    pub timeout_secs: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            ptr_lookups: default_ptr_lookups(),
            timeout_secs: default_ptr_timeout(),
        }
    }
}

fn default_probe_timeout() -> u64 {
    3
}
fn default_max_concurrency() -> usize {
    8
}
fn default_accept_invalid_certs() -> bool {
    true
}
fn default_ptr_lookups() -> bool {
    true
}
fn default_ptr_timeout() -> u64 {
    2
}

fn endpoints(list: &[(u16, bool)]) -> Vec<EndpointSettings> {
    list.iter()
        .map(|&(port, https)| EndpointSettings { port, https })
        .collect()
}

fn default_pihole_ports() -> Vec<EndpointSettings> {
    endpoints(&[(80, false), (8080, false), (443, true)])
}
fn default_adguard_ports() -> Vec<EndpointSettings> {
    endpoints(&[(80, false), (3000, false), (443, true)])
}

// ── Translation to core types ───────────────────────────────────────

impl Config {
    /// Validate probe settings and build the detector configuration.
    ///
    /// `probe.custom_port` is validated here but travels separately, as
    /// the per-run argument of `detect_third_party_dns`.
    pub fn probe_config(&self) -> Result<ProbeConfig, ConfigError> {
        let probe = &self.probe;
        if probe.timeout_secs == 0 {
            return Err(invalid("probe.timeout_secs", "must be greater than zero"));
        }
        if probe.max_concurrency == 0 {
            return Err(invalid("probe.max_concurrency", "must be greater than zero"));
        }
        if probe.custom_port == Some(0) {
            return Err(invalid("probe.custom_port", "port 0 is not probeable"));
        }
        for (field, list) in [
            ("probe.pihole_ports", &probe.pihole_ports),
            ("probe.adguard_ports", &probe.adguard_ports),
        ] {
            if list.iter().any(|e| e.port == 0) {
                return Err(invalid(field, "port 0 is not probeable"));
            }
        }

        let tls = match (&probe.ca_cert, probe.accept_invalid_certs) {
            (_, true) => TlsMode::DangerAcceptInvalid,
            (Some(path), false) => TlsMode::CustomCa(path.clone()),
            (None, false) => TlsMode::System,
        };

        Ok(ProbeConfig {
            transport: TransportConfig {
                tls,
                timeout: Duration::from_secs(probe.timeout_secs),
            },
            max_concurrency: probe.max_concurrency,
            pihole_endpoints: probe.pihole_ports.iter().copied().map(Into::into).collect(),
            adguard_endpoints: probe.adguard_ports.iter().copied().map(Into::into).collect(),
            ..ProbeConfig::default()
        })
    }

    /// PTR strategy for provider identification.
    pub fn ptr_resolver(&self) -> Result<PtrResolver, ConfigError> {
        if !self.resolver.ptr_lookups {
            return Ok(PtrResolver::disabled());
        }
        if self.resolver.timeout_secs == 0 {
            return Err(invalid("resolver.timeout_secs", "must be greater than zero"));
        }
        Ok(PtrResolver::system_with_timeout(Duration::from_secs(
            self.resolver.timeout_secs,
        )))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "dnsaudit", "dnsaudit").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("dnsaudit");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the TOML file at `path`, then `DNSAUDIT_` variables
/// (`DNSAUDIT_PROBE__TIMEOUT_SECS=5`).
fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DNSAUDIT_").split("__"))
}

/// Load the full Config from the platform config file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file is
/// not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    Ok(figment(path).extract()?)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}
