//! 任务持久化存储
//!
//! 每个任务以 id 为键保存为一条 JSON 记录。读取时忽略未知字段，
//! 因此不同版本之间无需迁移。

use super::types::ExtractionTask;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn save(&self, task: &ExtractionTask) -> Result<()>;
    async fn load(&self, id: &str) -> Result<Option<ExtractionTask>>;
    async fn remove(&self, id: &str) -> Result<()>;
    async fn list(&self) -> Result<Vec<ExtractionTask>>;

    /// 所有非终态任务，按创建时间排序
    async fn list_active(&self) -> Result<Vec<ExtractionTask>> {
        let mut tasks: Vec<_> = self
            .list()
            .await?
            .into_iter()
            .filter(|t| t.is_active())
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }
}

/// 内存存储（测试和一次性运行）
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, ExtractionTask>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn save(&self, task: &ExtractionTask) -> Result<()> {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<ExtractionTask>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.tasks.write().await.remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ExtractionTask>> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }
}

/// 文件存储：目录下每个任务一个 `task_<id>.json`
pub struct FileTaskStore {
    dir: PathBuf,
}

impl FileTaskStore {
    /// 打开（必要时创建）存储目录
    pub async fn open<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create task store directory: {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        let safe: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("task_{}.json", safe))
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn save(&self, task: &ExtractionTask) -> Result<()> {
        let path = self.path_for(&task.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(task).context("Failed to serialize task")?;

        // 先写临时文件再重命名，读者不会看到半截记录
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write task to {:?}", tmp))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move task into place at {:?}", path))
    }

    async fn load(&self, id: &str) -> Result<Option<ExtractionTask>> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read task from {:?}", path))
            }
        };
        let task = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to deserialize task at {:?}", path))?;
        Ok(Some(task))
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove task {:?}", path)),
        }
    }

    async fn list(&self) -> Result<Vec<ExtractionTask>> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list task store {:?}", self.dir))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_task_file = path.extension().and_then(|s| s.to_str()) == Some("json")
                && path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .map(|s| s.starts_with("task_"))
                    .unwrap_or(false);
            if is_task_file {
                paths.push(path);
            }
        }

        let reads = futures::future::join_all(paths.iter().map(tokio::fs::read)).await;
        let mut tasks = Vec::with_capacity(paths.len());
        for (path, read) in paths.iter().zip(reads) {
            // 文件可能在列目录和读取之间被清理掉
            let bytes = match read {
                Ok(b) => b,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read task from {:?}", path))
                }
            };
            match serde_json::from_slice::<ExtractionTask>(&bytes) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable task record");
                }
            }
        }

        Ok(tasks)
    }
}
