use secrecy::SecretString;

use super::{SecretError, SecretProvider};

/// Resolves `ref` against `SECRET_<NORMALIZED_REF>`, normalizing by upcasing and replacing
/// `-` with `_`.
#[derive(Debug, Default)]
pub struct EnvSecretProvider;

impl EnvSecretProvider {
    pub fn new() -> Self {
        EnvSecretProvider
    }

    fn normalize(reference: &str) -> String {
        format!(
            "SECRET_{}",
            reference.to_uppercase().replace('-', "_")
        )
    }
}

impl SecretProvider for EnvSecretProvider {
    fn get_secret(&self, reference: &str) -> Result<SecretString, SecretError> {
        let key = Self::normalize(reference);
        std::env::var(&key)
            .map(SecretString::from)
            .map_err(|_| SecretError::NotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn normalizes_ref() {
        assert_eq!(EnvSecretProvider::normalize("my-key"), "SECRET_MY_KEY");
    }

    #[test]
    fn resolves_env_var() {
        // SAFETY: test-only, single-threaded access to this specific var name.
        unsafe { std::env::set_var("SECRET_DEMO_TOKEN", "abc123") };
        let provider = EnvSecretProvider::new();
        let secret = provider.get_secret("demo-token").unwrap();
        assert_eq!(secret.expose_secret(), "abc123");
        unsafe { std::env::remove_var("SECRET_DEMO_TOKEN") };
    }

    #[test]
    fn missing_var_is_not_found() {
        let provider = EnvSecretProvider::new();
        assert_matches::assert_matches!(provider.get_secret("totally-unset-thing"), Err(SecretError::NotFound(_)));
    }
}
