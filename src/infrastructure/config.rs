use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::config::AircomConfig;
use crate::domain::error::{AircomError, AircomResult};

/// Configuration manager
///
/// Layers a global file (`~/.config/aircom/config.toml`) with an optional
/// project file (`.aircom/config.toml`, found by walking up from the
/// current directory). Global settings win for the `global` section;
/// project device entries extend the global list.
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> AircomResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Load configuration from files
    pub fn load_config(&self) -> AircomResult<AircomConfig> {
        let mut config = AircomConfig::default();

        if self.global_config_path.exists() {
            let global_config = self.load_config_from_path(&self.global_config_path)?;
            config.global = global_config.global;
            config.devices = global_config.devices;
        }

        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                let project_config = self.load_config_from_path(project_path)?;
                config.devices.extend(project_config.devices);
            }
        }

        Ok(config)
    }

    /// Save configuration to the global file
    pub fn save_config(&self, config: &AircomConfig) -> AircomResult<()> {
        if let Some(parent) = self.global_config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| AircomError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }
        self.save_config_to_path(&self.global_config_path, config)
    }

    /// Path of the global configuration file
    pub fn global_path(&self) -> &Path {
        &self.global_config_path
    }

    /// Path of the project configuration file, if one was found
    pub fn project_path(&self) -> Option<&Path> {
        self.project_config_path.as_deref()
    }

    fn get_global_config_path() -> AircomResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| AircomError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join("aircom").join("config.toml"))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(".aircom").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> AircomResult<AircomConfig> {
        let content = fs::read_to_string(path).map_err(|e| AircomError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| AircomError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &AircomConfig) -> AircomResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| AircomError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| AircomError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::StaticDeviceConfig;
    use tempfile::tempdir;

    fn manager_with_paths(global: PathBuf, project: Option<PathBuf>) -> ConfigManager {
        ConfigManager {
            global_config_path: global,
            project_config_path: project,
        }
    }

    #[test]
    fn test_missing_files_yield_defaults() {
        let dir = tempdir().unwrap();
        let manager = manager_with_paths(dir.path().join("missing.toml"), None);
        let config = manager.load_config().unwrap();
        assert_eq!(config.global.log_level, "info");
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let manager = manager_with_paths(path.clone(), None);

        let mut config = AircomConfig::default();
        config.global.log_level = "debug".to_string();
        config.devices.push(StaticDeviceConfig {
            name: "lab-console".to_string(),
            host: "192.168.10.1".to_string(),
            port: 3696,
            port_count: 1,
        });

        manager.save_config_to_path(&path, &config).unwrap();
        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.global.log_level, "debug");
        assert_eq!(loaded.devices.len(), 1);
        assert_eq!(loaded.devices[0].name, "lab-console");
    }

    #[test]
    fn test_project_devices_extend_global() {
        let dir = tempdir().unwrap();
        let global_path = dir.path().join("global.toml");
        let project_path = dir.path().join("project.toml");
        let manager = manager_with_paths(global_path.clone(), Some(project_path.clone()));

        let mut global = AircomConfig::default();
        global.devices.push(StaticDeviceConfig {
            name: "global-device".to_string(),
            host: "10.0.0.1".to_string(),
            port: 3696,
            port_count: 1,
        });
        manager.save_config_to_path(&global_path, &global).unwrap();

        let mut project = AircomConfig::default();
        project.devices.push(StaticDeviceConfig {
            name: "project-device".to_string(),
            host: "10.0.0.2".to_string(),
            port: 3696,
            port_count: 1,
        });
        manager
            .save_config_to_path(&project_path, &project)
            .unwrap();

        let merged = manager.load_config().unwrap();
        assert_eq!(merged.devices.len(), 2);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "not [valid toml").unwrap();
        let manager = manager_with_paths(path.clone(), None);
        assert!(matches!(
            manager.load_config_from_path(&path),
            Err(AircomError::Config { .. })
        ));
    }
}
