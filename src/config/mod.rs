mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file at an explicit path.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from `custom_path`, or else the default search path, or else
/// a validated default `Config`.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./vaultcast.toml",
        "~/.config/vaultcast/config.toml",
        "/etc/vaultcast/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let config = Config::default();
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    if config.server.local_port == 0 {
        anyhow::bail!("local_port cannot be 0");
    }

    if config.segments.max_segment_bytes == 0 {
        anyhow::bail!("segments.max_segment_bytes cannot be 0");
    }

    if config.segments.min_segment_duration <= 0.0
        || config.segments.max_segment_duration < config.segments.min_segment_duration
    {
        anyhow::bail!(
            "segments.min_segment_duration/max_segment_duration must satisfy 0 < min <= max"
        );
    }

    let mut seen = std::collections::HashSet::new();
    for account in &config.accounts {
        if !seen.insert(account.id.as_str()) {
            anyhow::bail!("duplicate account id in config: {}", account.id);
        }
    }

    if config.server.auth.enabled && config.server.auth.api_key.is_none() {
        anyhow::bail!("server.auth.enabled is true but no api_key is configured");
    }

    if config.cache.cache_type == CacheType::Disk {
        anyhow::bail!("cache.cache_type = \"disk\" has no backing implementation; only \"memory\" is supported");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.server.local_port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_duplicate_account_ids() {
        use vaultcast_blob::AccountConfig;
        use vaultcast_common::AccountId;

        let mut config = Config::default();
        config.accounts = vec![
            AccountConfig {
                id: AccountId::new("a"),
                credential: "x".into(),
                destination_id: "y".into(),
            },
            AccountConfig {
                id: AccountId::new("a"),
                credential: "x".into(),
                destination_id: "y".into(),
            },
        ];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_auth_enabled_without_key() {
        let mut config = Config::default();
        config.server.auth.enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_disk_cache_type() {
        let mut config = Config::default();
        config.cache.cache_type = CacheType::Disk;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn loads_from_toml() {
        let toml_str = r#"
            [server]
            local_port = 9090

            [[accounts]]
            id = "acct-0"
            credential = "tok"
            destination_id = "https://example.test/dest"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.local_port, 9090);
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.segments.max_segment_bytes, 15 * 1024 * 1024);
    }
}
