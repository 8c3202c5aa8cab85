//! MiniTrack SDK - 个人数据追踪同步 SDK
//!
//! 本 SDK 管理笔记、交易、债务、设置四类个人数据，提供：
//! - 📝 域存储：内存快照 + 同步本地持久化，读写不等待云端
//! - 🔄 同步引擎：整集合快照在本地与云端键值存储之间双向对账
//! - ⏱️ 防抖调度：连续变更在窗口内合并为一次推送
//! - 🛡️ 部分失败隔离：单个集合出错不拖垮其余集合
//! - 🌱 引导播种：云端为空时用本地数据自动初始化
//! - 📦 文件备份：全量快照的导出与全有或全无的导入
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use minitrack_sdk::{MiniTrackSdk, MiniTrackConfig, InMemoryRemoteStore, Note};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 配置 SDK
//!     let config = MiniTrackConfig::builder()
//!         .data_dir("/path/to/data")
//!         .build();
//!
//!     // 初始化 SDK（RemoteStore 由宿主平台注入）
//!     let remote = Arc::new(InMemoryRemoteStore::new());
//!     let sdk = MiniTrackSdk::initialize(config, remote)?;
//!
//!     // 启动拉取：云端快照覆盖本地（每会话一次）
//!     sdk.pull().await?;
//!
//!     // 本地写入立即生效，防抖窗口到期后自动推送
//!     sdk.notes().add(Note::new("标题", "内容", "General"))?;
//!
//!     // 关闭 SDK
//!     sdk.shutdown().await;
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod backup;
pub mod error;
pub mod events;
pub mod notify;
pub mod sdk;
pub mod storage;
pub mod store;
pub mod sync;
pub mod version;

// 重新导出核心类型，方便使用
pub use backup::{export_snapshot, import_snapshot, backup_filename, BackupDocument, ImportSummary};
pub use error::{MiniTrackError, Result};
pub use events::{DataChanged, EventBus};
pub use notify::{Notifier, NoopNotifier, NotifyKind};
pub use sdk::{EventConfig, MiniTrackConfig, MiniTrackConfigBuilder, MiniTrackSdk, SyncConfig};
pub use storage::entities::{
    Debt, DebtStatus, Note, Settings, SyncStatus, Transaction, TransactionKind,
};
pub use storage::local::{LocalStore, MemoryLocalStore, SledLocalStore};
pub use store::{CollectionStore, SettingsStore};
pub use sync::debounce::{SyncScheduler, DEFAULT_DEBOUNCE_WINDOW};
pub use sync::remote::{InMemoryRemoteStore, RemoteLimits, RemoteStore};
pub use sync::sync_engine::{PullOutcome, PullReport, PushOutcome, PushReport, SyncEngine};
pub use sync::{Collection, ALL_COLLECTIONS};
pub use version::{BACKUP_FORMAT_VERSION, SDK_VERSION};
