//! 本地 KV 存储 - 各集合 JSON 快照的同步持久层
//!
//! 对应浏览器端的 localStorage：按字符串键同步读写，值为序列化后的
//! 集合快照。原生宿主默认用 sled 实现；无持久化能力的宿主（或测试）
//! 用内存实现。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use sled::{Db, Tree};

use crate::error::{MiniTrackError, Result};

/// 本地键值存储接口
///
/// 同步语义：域存储在每次变更时立刻写入，调用方不等待任何网络。
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// sled 实现 - 原生宿主的默认本地存储
#[derive(Debug)]
pub struct SledLocalStore {
    #[allow(dead_code)]
    base_path: PathBuf,
    #[allow(dead_code)]
    db: Arc<Db>,
    tree: Tree,
}

impl SledLocalStore {
    /// 打开本地存储
    ///
    /// 切换账号后旧实例可能刚释放文件锁，打开失败时重试多次带退避。
    pub fn open(base_path: &Path) -> Result<Self> {
        let base_path = base_path.to_path_buf();
        let kv_path = base_path.join("kv");
        std::fs::create_dir_all(&kv_path)
            .map_err(|e| MiniTrackError::IO(format!("failed to create kv dir: {}", e)))?;

        const MAX_OPEN_RETRIES: u32 = 8;
        const RETRY_DELAY_MS: u64 = 300;
        let mut db_opt: Option<Db> = None;
        let mut last_err: Option<sled::Error> = None;
        for attempt in 0..MAX_OPEN_RETRIES {
            match sled::open(&kv_path) {
                Ok(d) => {
                    db_opt = Some(d);
                    break;
                }
                Err(e) => {
                    let msg = format!("{}", e);
                    last_err = Some(e);
                    let is_lock = msg.contains("could not acquire lock")
                        || msg.contains("Resource temporarily unavailable")
                        || msg.contains("WouldBlock");
                    if is_lock && attempt + 1 < MAX_OPEN_RETRIES {
                        let delay_ms = RETRY_DELAY_MS * (1 << attempt);
                        std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                    } else {
                        break;
                    }
                }
            }
        }
        let db = db_opt.ok_or_else(|| {
            MiniTrackError::LocalStore(
                last_err
                    .map(|e| format!("failed to open sled db: {}", e))
                    .unwrap_or_else(|| "failed to open sled db".to_string()),
            )
        })?;

        let tree = db
            .open_tree("collections")
            .map_err(|e| MiniTrackError::LocalStore(format!("failed to open tree: {}", e)))?;

        tracing::info!("local store opened at {}", kv_path.display());

        Ok(Self {
            base_path,
            db: Arc::new(db),
            tree,
        })
    }
}

impl LocalStore for SledLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.tree.get(key)?;
        match value {
            Some(bytes) => {
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|e| MiniTrackError::LocalStore(format!("non-utf8 value: {}", e)))?;
                Ok(Some(s))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.tree.insert(key, value.as_bytes())?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.tree.remove(key)?;
        Ok(())
    }
}

/// 内存实现 - 测试与无持久化能力的宿主
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sled_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledLocalStore::open(temp_dir.path()).unwrap();

        assert_eq!(store.get("notes").unwrap(), None);
        store.set("notes", "[]").unwrap();
        assert_eq!(store.get("notes").unwrap().as_deref(), Some("[]"));

        store.set("notes", r#"[{"id":"n1"}]"#).unwrap();
        assert_eq!(
            store.get("notes").unwrap().as_deref(),
            Some(r#"[{"id":"n1"}]"#)
        );

        store.remove("notes").unwrap();
        assert_eq!(store.get("notes").unwrap(), None);
    }

    #[test]
    fn test_sled_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = SledLocalStore::open(temp_dir.path()).unwrap();
            store.set("settings", r#"{"dollarRate":97.0}"#).unwrap();
        }
        let store = SledLocalStore::open(temp_dir.path()).unwrap();
        assert_eq!(
            store.get("settings").unwrap().as_deref(),
            Some(r#"{"dollarRate":97.0}"#)
        );
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryLocalStore::new();
        store.set("debts", "[]").unwrap();
        assert_eq!(store.get("debts").unwrap().as_deref(), Some("[]"));
        store.remove("debts").unwrap();
        assert_eq!(store.get("debts").unwrap(), None);
    }
}
