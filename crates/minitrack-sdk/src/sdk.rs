//! 统一 SDK 接口 - MiniTrackSdk 主入口
//!
//! 分层架构设计：
//! ```text
//! MiniTrackSdk (门面层)
//!   ├── CollectionStore / SettingsStore (域存储层)
//!   ├── LocalStore (本地持久层, sled)
//!   ├── RemoteStore (云端键值层, 宿主注入)
//!   ├── SyncEngine (同步引擎层)
//!   └── SyncScheduler (防抖调度层)
//! ```
//!
//! 设计原则：
//! - 异步优先：同步引擎 API 使用 async/await
//! - 本地优先：域存储的读写全部同步完成，云端只做镜像
//! - 依赖注入：RemoteStore 由宿主平台提供，SDK 不假设具体实现

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::backup::{self, BackupDocument, ImportSummary};
use crate::error::{MiniTrackError, Result};
use crate::events::EventBus;
use crate::notify::{Notifier, NoopNotifier};
use crate::storage::entities::{Debt, Note, Settings, Transaction};
use crate::storage::local::{LocalStore, SledLocalStore};
use crate::store::{CollectionStore, SettingsStore};
use crate::sync::debounce::{SyncScheduler, DEFAULT_DEBOUNCE_WINDOW};
use crate::sync::remote::{RemoteLimits, RemoteStore};
use crate::sync::sync_engine::{PullReport, PushReport, SyncEngine};
use crate::sync::{Collection, ALL_COLLECTIONS};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 防抖窗口
    pub debounce_window: Duration,
    /// 云端单键 payload 上限（字节）
    pub max_item_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            max_item_bytes: RemoteLimits::default().max_item_bytes,
        }
    }
}

/// 事件配置
#[derive(Debug, Clone)]
pub struct EventConfig {
    /// 事件缓冲区大小
    pub buffer_size: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { buffer_size: 256 }
    }
}

/// MiniTrack SDK 配置
#[derive(Debug, Clone)]
pub struct MiniTrackConfig {
    /// 数据存储目录
    pub data_dir: PathBuf,
    /// 同步配置
    pub sync_config: SyncConfig,
    /// 事件配置
    pub event_config: EventConfig,
    /// 调试模式
    pub debug_mode: bool,
}

impl Default for MiniTrackConfig {
    fn default() -> Self {
        Self {
            data_dir: get_default_data_dir(),
            sync_config: SyncConfig::default(),
            event_config: EventConfig::default(),
            debug_mode: false,
        }
    }
}

/// 获取默认数据目录 ~/.minitrack/
fn get_default_data_dir() -> PathBuf {
    if let Some(home_dir) = std::env::var("HOME").ok().map(PathBuf::from) {
        home_dir.join(".minitrack")
    } else if let Some(home_dir) = std::env::var("USERPROFILE").ok().map(PathBuf::from) {
        // Windows 支持
        home_dir.join(".minitrack")
    } else {
        // 无法获取用户主目录时回退到当前目录
        PathBuf::from("./minitrack_data")
    }
}

/// MiniTrack SDK 配置构建器
pub struct MiniTrackConfigBuilder {
    config: MiniTrackConfig,
}

impl MiniTrackConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MiniTrackConfig::default(),
        }
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn debounce_window(mut self, window: Duration) -> Self {
        self.config.sync_config.debounce_window = window;
        self
    }

    pub fn max_item_bytes(mut self, bytes: usize) -> Self {
        self.config.sync_config.max_item_bytes = bytes;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_config.buffer_size = size;
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.config.debug_mode = enabled;
        self
    }

    pub fn build(self) -> MiniTrackConfig {
        self.config
    }
}

impl Default for MiniTrackConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MiniTrackConfig {
    pub fn builder() -> MiniTrackConfigBuilder {
        MiniTrackConfigBuilder::new()
    }
}

/// MiniTrack SDK 主入口
pub struct MiniTrackSdk {
    config: MiniTrackConfig,
    events: Arc<EventBus>,

    notes: Arc<CollectionStore<Note>>,
    finances: Arc<CollectionStore<Transaction>>,
    debts: Arc<CollectionStore<Debt>>,
    settings: Arc<SettingsStore>,

    engine: Arc<SyncEngine>,
    scheduler: SyncScheduler,
}

impl MiniTrackSdk {
    /// 初始化 SDK（sled 本地存储 + 静默通知器）
    ///
    /// `remote` 由宿主提供（例如 Telegram CloudStorage 的桥接实现）。
    pub fn initialize(
        config: MiniTrackConfig,
        remote: Arc<dyn RemoteStore>,
    ) -> Result<Arc<Self>> {
        let local: Arc<dyn LocalStore> = Arc::new(SledLocalStore::open(&config.data_dir)?);
        Self::initialize_with(config, remote, local, Arc::new(NoopNotifier))
    }

    /// 初始化 SDK，本地存储与通知器均由调用方注入
    ///
    /// 分层初始化顺序：
    /// 1. 本地存储 → 2. 事件总线 → 3. 域存储 → 4. 同步引擎 → 5. 防抖调度器
    pub fn initialize_with(
        config: MiniTrackConfig,
        remote: Arc<dyn RemoteStore>,
        local: Arc<dyn LocalStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Arc<Self>> {
        info!("正在初始化 MiniTrackSdk...");
        Self::validate_config(&config)?;

        // === 第1层：事件总线 ===
        let events = Arc::new(EventBus::new(config.event_config.buffer_size));

        // === 第2层：域存储（启动时从本地整体加载，损坏的集合按空集处理）===
        let notes = Arc::new(CollectionStore::new(
            Collection::Notes,
            local.clone(),
            events.clone(),
        ));
        let finances = Arc::new(CollectionStore::new(
            Collection::Finances,
            local.clone(),
            events.clone(),
        ));
        let debts = Arc::new(CollectionStore::new(
            Collection::Debts,
            local.clone(),
            events.clone(),
        ));
        let settings = Arc::new(SettingsStore::new(local.clone(), events.clone()));

        let note_count = notes.load()?;
        let finance_count = finances.load()?;
        let debt_count = debts.load()?;
        settings.load()?;
        info!(
            "域存储加载完成: {} 笔记 / {} 交易 / {} 债务",
            note_count, finance_count, debt_count
        );

        // === 第3层：同步引擎 ===
        let limits = RemoteLimits {
            max_item_bytes: config.sync_config.max_item_bytes,
        };
        let engine = Arc::new(SyncEngine::new(
            remote,
            limits,
            notifier,
            notes.clone(),
            finances.clone(),
            debts.clone(),
            settings.clone(),
        ));

        // === 第4层：防抖调度器 ===
        let scheduler = SyncScheduler::start(
            engine.clone(),
            &events,
            config.sync_config.debounce_window,
        );
        info!(
            "✅ MiniTrackSdk 初始化完成 (防抖窗口 {:?})",
            config.sync_config.debounce_window
        );

        Ok(Arc::new(Self {
            config,
            events,
            notes,
            finances,
            debts,
            settings,
            engine,
            scheduler,
        }))
    }

    fn validate_config(config: &MiniTrackConfig) -> Result<()> {
        if config.sync_config.debounce_window.is_zero() {
            return Err(MiniTrackError::Config(
                "debounce_window 必须大于零".to_string(),
            ));
        }
        if config.sync_config.max_item_bytes == 0 {
            return Err(MiniTrackError::Config(
                "max_item_bytes 必须大于零".to_string(),
            ));
        }
        if config.event_config.buffer_size == 0 {
            return Err(MiniTrackError::Config(
                "事件缓冲区大小必须大于零".to_string(),
            ));
        }
        Ok(())
    }

    pub fn config(&self) -> &MiniTrackConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn notes(&self) -> &CollectionStore<Note> {
        &self.notes
    }

    pub fn finances(&self) -> &CollectionStore<Transaction> {
        &self.finances
    }

    pub fn debts(&self) -> &CollectionStore<Debt> {
        &self.debts
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn current_settings(&self) -> Settings {
        self.settings.get()
    }

    /// 同步引擎（状态查询、手动推送/拉取）
    pub fn sync(&self) -> &SyncEngine {
        &self.engine
    }

    /// 立即推送全量快照，绕过防抖窗口
    pub async fn push_now(&self) -> Result<PushReport> {
        self.engine.push().await
    }

    /// 启动拉取（会话内已拉取过则直接短路）
    pub async fn pull(&self) -> Result<PullReport> {
        self.engine.pull().await
    }

    /// 导出全量快照文档
    pub fn export_snapshot(&self) -> BackupDocument {
        backup::export_snapshot(&self.notes, &self.finances, &self.debts, &self.settings)
    }

    /// 导出为 JSON 字符串（配套文件名见 [`backup::backup_filename`]）
    pub fn export_to_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export_snapshot())?)
    }

    /// 校验并导入备份文档；成功后立即推送，失败零写入
    pub async fn import_from_str(&self, raw: &str) -> Result<ImportSummary> {
        let summary = backup::import_snapshot(
            raw,
            &self.notes,
            &self.finances,
            &self.debts,
            &self.settings,
        )?;
        // 导入属于批量变更，直接推送而不是等防抖窗口
        if let Err(e) = self.engine.push().await {
            warn!("导入后推送失败: {}", e);
        }
        Ok(summary)
    }

    /// 各集合的同步状态快照
    pub fn sync_statuses(&self) -> Vec<(Collection, crate::storage::entities::SyncStatus)> {
        ALL_COLLECTIONS
            .iter()
            .map(|&c| (c, self.engine.status(c)))
            .collect()
    }

    /// 关闭 SDK：停止调度器，丢弃未到期的防抖窗口
    pub async fn shutdown(&self) {
        info!("正在关闭 MiniTrackSdk...");
        self.scheduler.shutdown().await;
        info!("✅ MiniTrackSdk 已关闭");
    }
}
