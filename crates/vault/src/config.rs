//! Configuration loading and validation for the vault service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;
use zeroize::Zeroize;

/// A configuration string that must never be printed.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Sensitive(String);

impl Sensitive {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Sensitive {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::fmt::Debug for Sensitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for Sensitive {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base64 master secret from which every record key is derived. **Required.**
    pub master_secret: Sensitive,

    /// RFC 7662 token introspection endpoint of the identity provider. **Required.**
    pub idp_introspection_url: String,

    /// Client id used to authenticate to the introspection endpoint. **Required.**
    pub idp_client_id: String,

    /// Client secret used to authenticate to the introspection endpoint. **Required.**
    pub idp_client_secret: Sensitive,

    /// Path of the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Port the HTTP(S) server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// PEM certificate chain. Set together with `tls_key_path` to enable TLS.
    #[serde(default)]
    pub tls_cert_path: Option<String>,

    /// PEM private key. Set together with `tls_cert_path` to enable TLS.
    #[serde(default)]
    pub tls_key_path: Option<String>,

    /// OTLP endpoint for span export. Spans are not exported when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database_path() -> String {
    "propvault.db".into()
}
fn default_listen_port() -> u16 {
    8443
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Both TLS paths, if TLS is enabled.
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    ///
    /// The master secret is only checked for presence here; its encoding is
    /// checked when it is decoded at startup.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(self.master_secret.expose(), "MASTER_SECRET")?;
        ensure_non_empty(&self.idp_introspection_url, "IDP_INTROSPECTION_URL")?;
        ensure_non_empty(&self.idp_client_id, "IDP_CLIENT_ID")?;
        ensure_non_empty(self.idp_client_secret.expose(), "IDP_CLIENT_SECRET")?;
        ensure_non_empty(&self.database_path, "DATABASE_PATH")?;
        validate_introspection_url(&self.idp_introspection_url)?;

        if self.tls_cert_path.is_some() != self.tls_key_path.is_some() {
            anyhow::bail!("TLS_CERT_PATH and TLS_KEY_PATH must be set together");
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

/// Tokens travel to this URL, so it must be `https` unless it is loopback.
fn validate_introspection_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw).context("IDP_INTROSPECTION_URL is not a valid URL")?;
    match url.scheme() {
        "https" => Ok(()),
        "http" if is_loopback(&url) => Ok(()),
        other => anyhow::bail!("IDP_INTROSPECTION_URL must use https (got {other})"),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(d)) => d == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
