use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use std::path::Path;

const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");
const EXAMPLE_ALLOCATION: &str = include_str!("../../docs/example_allocation.yaml");
const EXAMPLE_LEDGER: &str = include_str!("../../docs/example_ledger.yaml");

/// Creates a default configuration file with example content at the default location
pub fn setup() -> Result<()> {
    let path = AppConfig::default_config_path()?;
    setup_at_path(path)
}

/// Creates a default configuration file at `path`, with example allocation and ledger files
/// next to it when those do not exist yet.
pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    for (name, content) in [
        ("allocation.yaml", EXAMPLE_ALLOCATION),
        ("ledger.yaml", EXAMPLE_LEDGER),
    ] {
        let data_path = dir.join(name);
        if !data_path.exists() {
            std::fs::write(&data_path, content)
                .with_context(|| format!("Failed to write {}", data_path.display()))?;
        }
    }

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AllocationFile, LedgerFile};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_setup_creates_config_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");

        setup_at_path(&config_path)?;

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path)?;
        assert!(content.contains("currency:"));
        assert!(content.contains("# Example configuration file for asset-allocation"));

        let config = AppConfig::load_from_path(&config_path)?;
        AllocationFile::load(&config.allocation_path)?;
        LedgerFile::load(&config.ledger_path)?;
        Ok(())
    }

    #[test]
    fn test_setup_fails_if_config_exists() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");

        std::fs::write(&config_path, "test")?;

        let result = setup_at_path(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&config_path)?, "test");

        Ok(())
    }

    #[test]
    fn test_example_config_is_valid_yaml() -> Result<()> {
        let config: AppConfig = serde_yaml::from_str(EXAMPLE_CONFIG)
            .context("Failed to parse example config as YAML")?;

        assert_eq!(config.currency, "AUD");
        assert!(config.providers.yahoo.is_some());
        assert_eq!(
            config.yahoo().exchanges.get("ASX").map(String::as_str),
            Some(".AX")
        );
        Ok(())
    }
}
