//! 事件系统模块 - 集合变更的广播与订阅
//!
//! 域存储的每次变更都会广播一条 [`DataChanged`]；订阅方包括：
//! - 防抖同步调度器（变更 ⇢ 重置窗口）
//! - 宿主 UI（变更 ⇢ 刷新视图）
//!
//! 没有订阅者时发布是 no-op，不报错。

use tokio::sync::broadcast;
use tracing::debug;

use crate::sync::Collection;

/// 集合变更事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChanged {
    pub collection: Collection,
}

/// 事件总线
///
/// tokio broadcast 包装：多订阅者，慢订阅者丢消息（Lagged）而不阻塞发布方。
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<DataChanged>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 发布变更事件（无订阅者时静默丢弃）
    pub fn publish(&self, collection: Collection) {
        if let Err(e) = self.sender.send(DataChanged { collection }) {
            debug!("no active subscribers for data change event: {}", e);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataChanged> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
