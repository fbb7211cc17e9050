// ── Product fingerprint probes ──
//
// Each probe is one ordered step of the detection cascade. A probe issues
// HTTP requests against a single endpoint and either recognizes the
// product or fails; every failure is a negative result for that endpoint.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Self-hosted DNS products the detector can fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ProbeKind {
    #[strum(serialize = "Pi-hole")]
    Pihole,
    #[strum(serialize = "AdGuard Home")]
    AdGuardHome,
}

/// Cascade order: Pi-hole is always tried before AdGuard Home.
pub const DEFAULT_PROBE_ORDER: &[ProbeKind] = &[ProbeKind::Pihole, ProbeKind::AdGuardHome];

const PIHOLE_LOGIN_PATH: &str = "api/info/login";
const ADGUARD_LOGIN_PATH: &str = "login.html";
const ADGUARD_MARKER: &str = "AdGuard Home";

static SCRIPT_SRC: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?i)<script\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).ok()
});

static ADGUARD_VERSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"AdGuard Home v(\d+(?:\.\d+)+)").ok());

/// Why a single probe step came back negative.
#[derive(Debug, Error)]
pub(crate) enum ProbeError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error("response not recognized: {0}")]
    Unrecognized(&'static str),
}

/// A positive fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fingerprint {
    pub kind: ProbeKind,
    pub version: Option<String>,
}

impl ProbeKind {
    /// Run this probe against `base` (`scheme://ip:port/`).
    pub(crate) async fn run(
        self,
        client: &reqwest::Client,
        base: &Url,
    ) -> Result<Fingerprint, ProbeError> {
        let version = match self {
            Self::Pihole => probe_pihole(client, base).await?,
            Self::AdGuardHome => probe_adguard_home(client, base).await?,
        };
        Ok(Fingerprint { kind: self, version })
    }
}

async fn fetch_text(client: &reqwest::Client, url: Url) -> Result<String, ProbeError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if status != StatusCode::OK {
        return Err(ProbeError::Status(status));
    }
    Ok(resp.text().await?)
}

fn join(base: &Url, path: &str) -> Result<Url, ProbeError> {
    base.join(path)
        .map_err(|_| ProbeError::Unrecognized("unresolvable probe path"))
}

// ── Pi-hole ─────────────────────────────────────────────────────────

async fn probe_pihole(
    client: &reqwest::Client,
    base: &Url,
) -> Result<Option<String>, ProbeError> {
    let body = fetch_text(client, join(base, PIHOLE_LOGIN_PATH)?).await?;
    pihole_fingerprint(&body)
}

/// Inspect the Pi-hole login-info body.
///
/// A JSON body must carry `"dns": true`. A body that is not JSON at all
/// is accepted when it still mentions the `"dns"` key.
pub(crate) fn pihole_fingerprint(body: &str) -> Result<Option<String>, ProbeError> {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            if json.get("dns").and_then(Value::as_bool) == Some(true) {
                Ok(json
                    .get("version")
                    .and_then(Value::as_str)
                    .map(str::to_owned))
            } else {
                Err(ProbeError::Unrecognized("login info without dns flag"))
            }
        }
        Err(_) if body.contains("\"dns\"") => Ok(None),
        Err(_) => Err(ProbeError::Unrecognized("login info is not JSON")),
    }
}

// ── AdGuard Home ────────────────────────────────────────────────────

async fn probe_adguard_home(
    client: &reqwest::Client,
    base: &Url,
) -> Result<Option<String>, ProbeError> {
    let login_url = join(base, ADGUARD_LOGIN_PATH)?;
    let html = fetch_text(client, login_url.clone()).await?;
    let src = login_script_src(&html)
        .ok_or(ProbeError::Unrecognized("no login script reference"))?;
    let script = fetch_text(client, join(&login_url, src)?).await?;
    adguard_fingerprint(&script)
}

/// The first `<script src>` whose file name starts with `login.`.
pub(crate) fn login_script_src(html: &str) -> Option<&str> {
    let re = SCRIPT_SRC.as_ref()?;
    re.captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|src| {
            let path = src.split(['?', '#']).next().unwrap_or(src);
            path.rsplit('/')
                .next()
                .is_some_and(|file| file.starts_with("login."))
        })
}

pub(crate) fn adguard_fingerprint(script: &str) -> Result<Option<String>, ProbeError> {
    if !script.contains(ADGUARD_MARKER) {
        return Err(ProbeError::Unrecognized("login script lacks product marker"));
    }
    Ok(ADGUARD_VERSION
        .as_ref()
        .and_then(|re| re.captures(script))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned()))
}
