// ── Reverse DNS strategy ──
//
// PTR lookups are the only piece of the analysis that talks to the
// system resolver. They go through `PtrResolver`, a cloneable strategy
// value, so callers and tests can swap in a deterministic lookup without
// touching global state.

use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use tracing::{debug, warn};

/// Default bound on a single PTR query.
pub const DEFAULT_PTR_TIMEOUT: Duration = Duration::from_secs(2);

type LookupFn = dyn Fn(IpAddr) -> BoxFuture<'static, Option<String>> + Send + Sync;

/// Reverse-DNS lookup strategy.
#[derive(Clone)]
pub struct PtrResolver {
    lookup: Arc<LookupFn>,
    label: &'static str,
    timeout: Option<Duration>,
}

impl PtrResolver {
    /// Real PTR queries through the system resolver configuration.
    pub fn system() -> Self {
        Self::system_with_timeout(DEFAULT_PTR_TIMEOUT)
    }

    /// Real PTR queries, each bounded by `timeout`.
    ///
    /// The system configuration is read once here. Each lookup builds its
    /// own hickory resolver inside the calling runtime, so clones stay
    /// usable across runtimes.
    pub fn system_with_timeout(timeout: Duration) -> Self {
        let (config, opts) = system_conf(timeout);
        let lookup = move |ip: IpAddr| {
            let resolver = TokioAsyncResolver::tokio(config.clone(), opts.clone());
            async move {
                match tokio::time::timeout(timeout, resolver.reverse_lookup(ip)).await {
                    Ok(Ok(names)) => names
                        .iter()
                        .next()
                        .map(|name| name.to_utf8().trim_end_matches('.').to_owned())
                        .filter(|name| !name.is_empty()),
                    Ok(Err(e)) => {
                        debug!(%ip, error = %e, "PTR lookup failed");
                        None
                    }
                    Err(_) => {
                        debug!(%ip, timeout_ms = timeout.as_millis(), "PTR lookup timed out");
                        None
                    }
                }
            }
            .boxed()
        };
        Self {
            lookup: Arc::new(lookup),
            label: "system",
            timeout: Some(timeout),
        }
    }

    /// A resolver that never answers. Used when PTR lookups are turned off
    /// and as the deterministic stand-in for tests.
    pub fn disabled() -> Self {
        Self {
            lookup: Arc::new(|_: IpAddr| futures_util::future::ready(None::<String>).boxed()),
            label: "disabled",
            timeout: None,
        }
    }

    /// Wrap an arbitrary async lookup.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(IpAddr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        Self {
            lookup: Arc::new(move |ip| f(ip).boxed()),
            label: "custom",
            timeout: None,
        }
    }

    /// Look up the PTR name for `ip`.
    pub async fn reverse(&self, ip: IpAddr) -> Option<String> {
        (self.lookup)(ip).await
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Per-query bound of the system strategy; `None` for the others.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for PtrResolver {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for PtrResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtrResolver")
            .field("label", &self.label)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn system_conf(timeout: Duration) -> (ResolverConfig, ResolverOpts) {
    let (config, mut opts) = hickory_resolver::system_conf::read_system_conf().unwrap_or_else(|e| {
        warn!(error = %e, "system resolver config unavailable, using library defaults");
        (ResolverConfig::default(), ResolverOpts::default())
    });
    opts.timeout = timeout;
    opts.attempts = 1;
    (config, opts)
}
