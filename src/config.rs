use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::WorkshopError;
use crate::persistence::StorageError;

/// 应用配置，来自 config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkshopConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub app: AppConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

/// 应用信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl Default for WorkshopConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5218,
            },
            storage: StorageConfig {
                data_dir: "data".to_string(),
            },
            app: AppConfig {
                name: "插件创意工坊".to_string(),
                version: "1.0.0".to_string(),
                description: "插件评分系统".to_string(),
            },
        }
    }
}

impl WorkshopConfig {
    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, WorkshopError> {
        let content = fs::read_to_string(path.as_ref()).map_err(StorageError::from)?;
        let config: WorkshopConfig = serde_json::from_str(&content).map_err(|e| {
            WorkshopError::InvalidInput(format!(
                "Config file {} is malformed: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// 加载配置；文件不存在时写出默认配置并使用它
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, WorkshopError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            info!("Created default config at {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// 将配置写回文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), WorkshopError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| WorkshopError::InvalidInput(format!("Config serialization failed: {}", e)))?;
        fs::write(path, content).map_err(StorageError::from)?;
        Ok(())
    }

    /// 校验配置完整性
    pub fn validate(&self) -> Result<(), WorkshopError> {
        if self.server.host.is_empty() {
            return Err(WorkshopError::InvalidInput(
                "server.host must not be empty".to_string(),
            ));
        }
        if self.server.port == 0 {
            return Err(WorkshopError::InvalidInput(
                "server.port must not be 0".to_string(),
            ));
        }
        if self.storage.data_dir.is_empty() {
            return Err(WorkshopError::InvalidInput(
                "storage.data_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WorkshopConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 5218);
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut config = WorkshopConfig::default();
        config.server.host.clear();
        assert!(matches!(
            config.validate(),
            Err(WorkshopError::InvalidInput(_))
        ));

        let mut config = WorkshopConfig::default();
        config.storage.data_dir.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = WorkshopConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: WorkshopConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.app.name, config.app.name);
    }
}
