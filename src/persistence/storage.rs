use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Item not found: {0}")]
    NotFound(String),
}

/// 存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Plugin,
    Rating,
    Statistics,
}

impl StorageKind {
    fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Plugin => "plugins",
            StorageKind::Rating => "ratings",
            StorageKind::Statistics => "statistics",
        }
    }
}

/// 存储接口，定义数据持久化操作
///
/// 记录以序列化后的字节存取，序列化格式由调用方决定（评分引擎统一使用
/// bincode），因此接口是对象安全的，各组件可以共享 `Arc<dyn StorageProvider>`。
#[async_trait::async_trait]
pub trait StorageProvider: Send + Sync {
    async fn save(&self, kind: StorageKind, id: &str, bytes: &[u8]) -> Result<(), StorageError>;
    async fn load(&self, kind: StorageKind, id: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, kind: StorageKind, id: &str) -> Result<(), StorageError>;
    async fn list(&self, kind: StorageKind) -> Result<Vec<Vec<u8>>, StorageError>;
}

/// 文件系统存储实现
pub struct FileSystemStorage {
    base_dir: PathBuf,
    cache: Arc<RwLock<HashMap<(StorageKind, String), Vec<u8>>>>,
}

impl FileSystemStorage {
    /// 创建新的文件系统存储
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_dir = base_dir.as_ref().to_path_buf();

        // 确保各类型存储目录存在
        fs::create_dir_all(&base_dir)?;
        fs::create_dir_all(base_dir.join(StorageKind::Plugin.as_str()))?;
        fs::create_dir_all(base_dir.join(StorageKind::Rating.as_str()))?;
        fs::create_dir_all(base_dir.join(StorageKind::Statistics.as_str()))?;

        Ok(Self {
            base_dir,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// 获取存储项的文件路径
    fn get_file_path(&self, kind: StorageKind, id: &str) -> PathBuf {
        self.base_dir.join(kind.as_str()).join(format!("{}.bin", id))
    }
}

#[async_trait::async_trait]
impl StorageProvider for FileSystemStorage {
    async fn save(&self, kind: StorageKind, id: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let file_path = self.get_file_path(kind, id);

        // 更新缓存
        {
            let mut cache = self.cache.write().await;
            cache.insert((kind, id.to_string()), bytes.to_vec());
        }

        // 写入文件
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(file_path)?;

        file.write_all(bytes)?;
        file.flush()?;

        debug!("Saved {} with id {} to storage", kind.as_str(), id);
        Ok(())
    }

    async fn load(&self, kind: StorageKind, id: &str) -> Result<Vec<u8>, StorageError> {
        // 先检查缓存
        {
            let cache = self.cache.read().await;
            if let Some(bytes) = cache.get(&(kind, id.to_string())) {
                return Ok(bytes.clone());
            }
        }

        // 从文件加载
        let file_path = self.get_file_path(kind, id);
        if !file_path.exists() {
            return Err(StorageError::NotFound(format!(
                "{} with id {} not found",
                kind.as_str(),
                id
            )));
        }

        let mut file = File::open(file_path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;

        // 更新缓存
        {
            let mut cache = self.cache.write().await;
            cache.insert((kind, id.to_string()), buffer.clone());
        }

        Ok(buffer)
    }

    async fn delete(&self, kind: StorageKind, id: &str) -> Result<(), StorageError> {
        let file_path = self.get_file_path(kind, id);

        // 从缓存中删除
        {
            let mut cache = self.cache.write().await;
            cache.remove(&(kind, id.to_string()));
        }

        if file_path.exists() {
            fs::remove_file(file_path)?;
            debug!("Deleted {} with id {} from storage", kind.as_str(), id);
        } else {
            warn!("Attempt to delete non-existent {} with id {}", kind.as_str(), id);
        }

        Ok(())
    }

    async fn list(&self, kind: StorageKind) -> Result<Vec<Vec<u8>>, StorageError> {
        let dir_path = self.base_dir.join(kind.as_str());
        let mut items = Vec::new();

        if !dir_path.exists() {
            return Ok(items);
        }

        for entry in fs::read_dir(dir_path)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() && path.extension().map_or(false, |ext| ext == "bin") {
                let mut file = File::open(&path)?;
                let mut buffer = Vec::new();
                file.read_to_end(&mut buffer)?;
                items.push(buffer);
            }
        }

        Ok(items)
    }
}

/// 内存存储实现（仅用于测试）
pub struct InMemoryStorage {
    data: Arc<RwLock<HashMap<(StorageKind, String), Vec<u8>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageProvider for InMemoryStorage {
    async fn save(&self, kind: StorageKind, id: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.insert((kind, id.to_string()), bytes.to_vec());
        Ok(())
    }

    async fn load(&self, kind: StorageKind, id: &str) -> Result<Vec<u8>, StorageError> {
        let data = self.data.read().await;
        if let Some(bytes) = data.get(&(kind, id.to_string())) {
            Ok(bytes.clone())
        } else {
            Err(StorageError::NotFound(format!(
                "{} with id {} not found",
                kind.as_str(),
                id
            )))
        }
    }

    async fn delete(&self, kind: StorageKind, id: &str) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.remove(&(kind, id.to_string()));
        Ok(())
    }

    async fn list(&self, kind: StorageKind) -> Result<Vec<Vec<u8>>, StorageError> {
        let data = self.data.read().await;
        let items = data
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, bytes)| bytes.clone())
            .collect();

        Ok(items)
    }
}
