// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = parse_config(&contents, is_yaml(path))?;
    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(contents: &str, yaml: bool) -> Result<Config> {
    let config: Config = if yaml {
        serde_yaml::from_str(contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(contents).context("Failed to parse JSON config")?
    };

    config.validate()?;
    Ok(config)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyType;

    const YAML: &str = r#"
sources:
  - name: office
    max_concurrent: 2
    servers:
      - { proxy_type: http, host: 10.0.0.1, port: 3128 }
      - proxy_type: socks5h
        host: 10.0.0.2
        port: 1080
        username: alice
        password: secret
  - name: backup
    servers:
      - { proxy_type: socks4a, host: backup.internal, port: 1080 }
health_check:
  mode: http
  timeout_secs: 3
  target_url: http://example.com/generate_204
  expected_status: 204
"#;

    #[test]
    fn test_parse_yaml() {
        let config = parse_config(YAML, true).unwrap();

        assert_eq!(config.sources.len(), 2);
        let office = &config.sources[0];
        assert_eq!(office.max_concurrent, 2);
        assert_eq!(office.servers[1].proxy_type, ProxyType::SOCKS5H);
        assert_eq!(office.servers[1].username.as_deref(), Some("alice"));
        assert_eq!(config.sources[1].max_concurrent, -1);

        assert_eq!(config.health_check.mode, HealthCheckMode::Http);
        assert_eq!(config.health_check.expected_status, Some(204));
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_parse_json_defaults() {
        let json = r#"{"sources":[{"name":"a","servers":[{"proxy_type":"http","host":"h","port":8080}]}]}"#;
        let config = parse_config(json, false).unwrap();
        assert_eq!(config.health_check.mode, HealthCheckMode::Tcp);
        assert_eq!(config.health_check.timeout_secs, 5);
    }

    #[test]
    fn test_validation_errors() {
        let duplicate = r#"
sources:
  - { name: a, servers: [{ proxy_type: http, host: h, port: 1 }] }
  - { name: a, servers: [{ proxy_type: http, host: h, port: 2 }] }
"#;
        assert!(parse_config(duplicate, true).is_err());

        let zero_port = r#"
sources:
  - { name: a, servers: [{ proxy_type: http, host: h, port: 0 }] }
"#;
        assert!(parse_config(zero_port, true).is_err());

        let http_without_url = r#"
health_check: { mode: http }
"#;
        assert!(parse_config(http_without_url, true).is_err());

        let bad_kind = r#"
sources:
  - { name: a, servers: [{ proxy_type: ftp, host: h, port: 1 }] }
"#;
        assert!(parse_config(bad_kind, true).is_err());
    }

    #[tokio::test]
    async fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/proxy-lease.yaml").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
