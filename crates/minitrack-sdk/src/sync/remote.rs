//! 云端 KV 存储接口
//!
//! 对应宿主平台的按用户云存储：异步、单 key 有大小上限、可用性不保证
//! （能力对象可能随会话出现/消失，每次操作前都要重新探测）。
//!
//! 大小上限不在存储实现里强制，由同步引擎在写入前检查并产生
//! `Oversize` 错误，这样部分失败能精确到集合。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{MiniTrackError, Result};

/// 云端单 key 大小约束
#[derive(Debug, Clone, Copy)]
pub struct RemoteLimits {
    /// 单 key 最大字节数（序列化后的 UTF-8 长度）
    pub max_item_bytes: usize,
}

impl Default for RemoteLimits {
    fn default() -> Self {
        // 主路径的实际上限约 150KB
        Self {
            max_item_bytes: 150 * 1024,
        }
    }
}

/// 旧版严格路径的单 key 上限（4KB），宿主按需使用
pub const STRICT_LEGACY_LIMIT: usize = 4 * 1024;

/// 云端键值存储接口
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 能力探测：同步、无副作用、不得 panic
    ///
    /// 仅当宿主暴露云存储能力对象，且对象同时具备单条读和单条写时返回 true。
    /// 探测过程中的任何异常都视为不可用。结果不跨调用缓存。
    fn is_available(&self) -> bool;

    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// 写入单条；宿主确认写入返回 true
    async fn set_item(&self, key: &str, value: &str) -> Result<bool>;

    /// 批量读取
    ///
    /// 支持批量读的宿主覆写本方法（一次挂起点）；默认实现逐 key 顺序读取。
    async fn get_items(&self, keys: &[&str]) -> Result<HashMap<String, Option<String>>> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            let value = self.get_item(key).await?;
            out.insert((*key).to_string(), value);
        }
        Ok(out)
    }

    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// 内存实现 - 测试与参考实现
///
/// 可切换可用性、按 key 注入写失败、统计读写次数（会话抑制与防抖
/// 合并的测试依赖这些计数）。
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    items: Mutex<BTreeMap<String, String>>,
    available: AvailableFlag,
    failing_keys: Mutex<BTreeSet<String>>,
    get_calls: AtomicUsize,
    set_calls: AtomicUsize,
}

#[derive(Debug)]
struct AvailableFlag(AtomicBool);

impl Default for AvailableFlag {
    fn default() -> Self {
        Self(AtomicBool::new(true))
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟能力对象消失/出现
    pub fn set_available(&self, available: bool) {
        self.available.0.store(available, Ordering::SeqCst);
    }

    /// 注入：对指定 key 的写入永远失败
    pub fn fail_writes_for(&self, key: &str) {
        self.failing_keys.lock().insert(key.to_string());
    }

    pub fn clear_write_failures(&self) {
        self.failing_keys.lock().clear();
    }

    /// 累计读取调用数（含批量读中的逐条）
    pub fn get_call_count(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn set_call_count(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// 直接读 key（测试断言用，不计入调用计数）
    pub fn raw_get(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    /// 直接写 key（测试布置用）
    pub fn raw_set(&self, key: &str, value: &str) {
        self.items.lock().insert(key.to_string(), value.to_string());
    }

    fn ensure_online(&self) -> Result<()> {
        if !self.available.0.load(Ordering::SeqCst) {
            return Err(MiniTrackError::Remote("remote store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    fn is_available(&self) -> bool {
        self.available.0.load(Ordering::SeqCst)
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.ensure_online()?;
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<bool> {
        self.ensure_online()?;
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_keys.lock().contains(key) {
            return Err(MiniTrackError::Remote(format!(
                "injected write failure for '{}'",
                key
            )));
        }
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.ensure_online()?;
        Ok(self.items.lock().keys().cloned().collect())
    }
}
