//! 双端存储同步模块
//!
//! 职责：
//! - 探测宿主云存储能力（每次操作重新探测，不跨会话缓存）
//! - 推送：内存快照 → 云端（按集合独立写入，允许部分失败）
//! - 拉取：云端 → 域存储 + 本地镜像（整体覆盖，不做合并）
//! - 会话级拉取抑制（session guard）
//! - 首跑引导：云端为空而本地有数据时，用本地数据播种云端
//! - 防抖自动同步调度

pub mod debounce;
pub mod remote;
pub mod sync_engine;

pub use debounce::SyncScheduler;
pub use remote::{InMemoryRemoteStore, RemoteLimits, RemoteStore, STRICT_LEGACY_LIMIT};
pub use sync_engine::{PullOutcome, PullReport, PushOutcome, PushReport, SyncEngine};

use crate::storage::keys;

/// 同步涉及的集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Notes,
    Finances,
    Debts,
    Settings,
}

/// 全部集合，按固定顺序（推送/拉取按此顺序汇报状态）
pub const ALL_COLLECTIONS: &[Collection] = &[
    Collection::Notes,
    Collection::Finances,
    Collection::Debts,
    Collection::Settings,
];

impl Collection {
    /// 规范存储键（本地与云端一致）
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Notes => keys::NOTES,
            Collection::Finances => keys::FINANCES,
            Collection::Debts => keys::DEBTS,
            Collection::Settings => keys::SETTINGS,
        }
    }

    /// 本地历史键名，优先级从高到低
    pub fn legacy_keys(&self) -> &'static [&'static str] {
        match self {
            Collection::Notes => keys::legacy::NOTES,
            Collection::Finances => keys::legacy::FINANCES,
            Collection::Debts => keys::legacy::DEBTS,
            Collection::Settings => keys::legacy::SETTINGS,
        }
    }

    /// 线上形状：true ⇢ JSON 数组；false ⇢ JSON 对象（仅 Settings）
    pub fn is_list(&self) -> bool {
        !matches!(self, Collection::Settings)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
