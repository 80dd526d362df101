use home::home_dir;
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use crate::{constant, ChirpError, ChirpResult};

/// Client configuration, stored as toml in `~/.chirp/chirp.toml`.
/// The `CHIRPCONF` env var overrides the file location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChirpConfig {
    /// Socket address of the API server. Should be <ip>:<port>
    /// Example: 127.0.0.1:8080
    pub socket: SocketAddr,
    /// Posts requested per feed page.
    pub page_size: u32,
    /// Cool-down between incremental loads, in milliseconds.
    pub cooldown_ms: u64,
    /// Directory containing the config file.
    #[serde(skip)]
    pub dirpath: PathBuf,
    /// Full path of the config file itself.
    #[serde(skip)]
    pub filepath: PathBuf,
}

impl Default for ChirpConfig {
    fn default() -> Self {
        let home_dir = home_dir().unwrap_or_else(|| {
            std::env::current_dir().expect("Unable to get current working directory")
        });
        let dirpath = home_dir.join(constant::CONFIG_DIR);
        let filepath = dirpath.join(constant::CONFIG_FILE);
        Self {
            socket: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080),
            page_size: constant::PAGE_SIZE_DEFAULT,
            cooldown_ms: constant::LOAD_COOLDOWN_MS,
            dirpath,
            filepath,
        }
    }
}

impl ChirpConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Point the config at a different file; the directory is derived
    /// from it.
    pub fn set_filepath(&mut self, path: PathBuf) -> ChirpResult<()> {
        let dirpath = path
            .parent()
            .ok_or_else(|| ChirpError::config_error("Config path has no parent dir".into()))?;
        self.dirpath = dirpath.to_path_buf();
        self.filepath = path;
        Ok(())
    }

    /// Write the config to its filepath, creating the directory if
    /// needed.
    pub fn save(&self) -> ChirpResult<()> {
        if !std::fs::exists(&self.dirpath)? {
            std::fs::create_dir_all(&self.dirpath)?;
        }
        let content = toml::to_string(self)
            .map_err(|e| ChirpError::config_error(format!("Unable to serialize config: {e}")))?;
        std::fs::write(&self.filepath, content)?;
        Ok(())
    }

    /// Load from `path`, or from `CHIRPCONF`, or from the default
    /// location, in that order.
    pub fn load(path: Option<PathBuf>) -> ChirpResult<Self> {
        let mut config = ChirpConfig::default();
        let filepath = path
            .or_else(|| std::env::var(constant::CONFIG_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| config.filepath.clone());

        let content = std::fs::read_to_string(&filepath)?;
        let parsed: ChirpConfig = toml::from_str(&content)
            .map_err(|e| ChirpError::config_error(format!("Unable to parse config: {e}")))?;

        if parsed.page_size == 0 || parsed.page_size > constant::PAGE_SIZE_LIMIT {
            return Err(ChirpError::config_error(format!(
                "page_size must be between 1 and {}",
                constant::PAGE_SIZE_LIMIT
            ))
            .into());
        }

        config.socket = parsed.socket;
        config.page_size = parsed.page_size;
        config.cooldown_ms = parsed.cooldown_ms;
        config.set_filepath(filepath)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = ChirpConfig::default();
        assert_eq!(config.page_size, constant::PAGE_SIZE_DEFAULT);
        assert_eq!(config.cooldown(), Duration::from_millis(1000));
        assert!(config.filepath.ends_with(constant::CONFIG_FILE));
    }

    #[test]
    fn save_then_load() {
        let mut config = ChirpConfig::default();
        config.page_size = 10;
        config.cooldown_ms = 250;
        config
            .set_filepath(std::env::temp_dir().join("chirp-test").join(constant::CONFIG_FILE))
            .unwrap();

        config.save().unwrap();
        let loaded = ChirpConfig::load(Some(config.filepath.clone())).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_file(&config.filepath).expect("Config cleanup failed");
    }

    #[test]
    fn out_of_range_page_size_is_rejected() {
        let mut config = ChirpConfig::default();
        config.page_size = constant::PAGE_SIZE_LIMIT + 1;
        config
            .set_filepath(std::env::temp_dir().join("chirp-test").join("bad.toml"))
            .unwrap();
        config.save().unwrap();

        assert!(ChirpConfig::load(Some(config.filepath.clone())).is_err());

        std::fs::remove_file(&config.filepath).expect("Config cleanup failed");
    }
}
