//! Secret providers (SPEC_FULL.md §4.B).

mod clustered;
mod env;

pub use clustered::{ClusteredSecretProvider, ClusterBackend, UnconfiguredClusterBackend};
pub use env::EnvSecretProvider;
use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),
}

/// `secrets.get(ref) -> string | NotFound`.
pub trait SecretProvider: Send + Sync {
    fn get_secret(&self, reference: &str) -> Result<SecretString, SecretError>;
}
