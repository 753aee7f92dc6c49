//! Process configuration, built once at startup from the environment.

use std::path::PathBuf;

/// Typed view over the gateway's environment-variable surface.
///
/// CLI flags in the `gateway` binary crate override these when present; otherwise each
/// field falls back to the matching env var, then to its default.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub config_dir: PathBuf,
    pub certs_dir: PathBuf,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub icp_ca_cert_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            config_dir: PathBuf::from("./config/connectors"),
            certs_dir: PathBuf::from("./certs"),
            port: 8081,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            icp_ca_cert_path: None,
        }
    }
}

impl GatewayConfig {
    /// Build configuration from the process environment, falling back to defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        let default = GatewayConfig::default();
        GatewayConfig {
            config_dir: std::env::var("CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.config_dir),
            certs_dir: std::env::var("CERTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.certs_dir),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
            environment: std::env::var("ENVIRONMENT").unwrap_or(default.environment),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(default.log_level),
            icp_ca_cert_path: std::env::var("ICP_CA_CERT_PATH").ok().map(PathBuf::from),
        }
    }
}
