use std::path::Path;

use crate::types::{Connector, IntegrationType};

use super::RegistryError;

/// Reads and validates one connector spec per `.yaml`/`.yml` file in `dir`.
pub struct Loader;

impl Loader {
    pub fn load_all(dir: &Path) -> Result<Vec<Connector>, RegistryError> {
        let mut connectors = Vec::new();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| RegistryError::Io(format!("reading {}: {e}", dir.display())))?;
        for entry in entries {
            let entry = entry.map_err(|e| RegistryError::Io(e.to_string()))?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }
            connectors.push(Self::load_file(&path)?);
        }
        Ok(connectors)
    }

    pub fn load_file(path: &Path) -> Result<Connector, RegistryError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Io(format!("reading {}: {e}", path.display())))?;
        let connector: Connector = serde_yaml::from_str(&raw).map_err(|e| {
            RegistryError::Invalid(format!("{}: {e}", path.display()))
        })?;
        Self::validate(&connector)?;
        Ok(connector)
    }

    fn validate(connector: &Connector) -> Result<(), RegistryError> {
        let invalid = |reason: String| RegistryError::Invalid(format!("{}: {reason}", connector.id));

        if connector.id.is_empty() || !is_valid_id(&connector.id) {
            return Err(invalid("id must match [a-z0-9-]+".to_string()));
        }
        if connector.name.is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if connector.version.is_empty() {
            return Err(invalid("version must not be empty".to_string()));
        }
        if connector.environments.is_empty() {
            return Err(invalid("at least one environment is required".to_string()));
        }
        if connector.integration.endpoints.is_empty() {
            return Err(invalid("at least one endpoint is required".to_string()));
        }
        for (name, endpoint) in &connector.integration.endpoints {
            if !endpoint.path.starts_with('/') {
                return Err(invalid(format!("endpoint {name}: path must start with '/'")));
            }
            if endpoint.response.success_status.is_empty() {
                return Err(invalid(format!(
                    "endpoint {name}: response.successStatus must have at least one entry"
                )));
            }
            for placeholder in path_placeholders(&endpoint.path) {
                let declared = endpoint
                    .path_params
                    .iter()
                    .any(|p| p.name == placeholder);
                if !declared {
                    return Err(invalid(format!(
                        "endpoint {name}: path placeholder {{{placeholder}}} has no declared path param"
                    )));
                }
            }
        }
        if matches!(connector.integration.kind, IntegrationType::RestApi) {
            // executable today; nothing further to validate at load time.
        }
        Ok(())
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn path_placeholders(path: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            for c2 in chars.by_ref() {
                if c2 == '}' {
                    break;
                }
                name.push(c2);
            }
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_id() {
        let yaml = r#"
id: "Bad_Id"
name: "x"
version: "1.0.0"
integration:
  type: rest_api
  auth:
    type: none
  endpoints:
    get:
      method: GET
      path: /foo
      response:
        successStatus: [200]
environments:
  dev:
    baseUrl: https://example.test
"#;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.yaml");
        std::fs::write(&file, yaml).unwrap();
        let err = Loader::load_file(&file).unwrap_err();
        assert_matches::assert_matches!(err, RegistryError::Invalid(_));
    }

    #[test]
    fn loads_valid_connector() {
        let yaml = r#"
id: "viacep"
name: "ViaCEP"
version: "1.0.0"
provider: "viacep"
integration:
  type: rest_api
  auth:
    type: none
  endpoints:
    lookup:
      method: GET
      path: /ws/{cep}/json/
      pathParams:
        - name: cep
          required: true
      response:
        successStatus: [200]
        mapping:
          cep: "$.cep"
          uf: "$.uf"
environments:
  dev:
    baseUrl: https://example.test
"#;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("viacep.yaml");
        std::fs::write(&file, yaml).unwrap();
        let connector = Loader::load_file(&file).unwrap();
        assert_eq!(connector.id, "viacep");
        assert_eq!(connector.integration.endpoints.len(), 1);
    }
}
