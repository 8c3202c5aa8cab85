//! 同步引擎
//!
//! 职责：
//! - 推送：内存快照 → 云端，按集合独立写入（部分失败是常态，不是异常）
//! - 拉取：云端 → 域存储 + 本地镜像，整体覆盖不做合并
//! - 会话级拉取抑制（防止每次导航都重复拉取）
//! - 首跑引导：云端全空而本地有数据时，用本地数据播种云端
//! - 各集合的瞬态 SyncStatus，每次尝试重算
//!
//! 引擎自身不拥有数据，只在三个位置之间搬运快照。单次推送内各 key
//! 的写入相互独立、顺序不定；`last-sync` 标记严格排在全部集合写入
//! 确认之后。引擎内部用一把操作锁串行化自己的推送/拉取，手动触发与
//! 自动触发不会并发执行两个推送。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{MiniTrackError, Result};
use crate::notify::{Notifier, NotifyKind};
use crate::storage::entities::{now_millis, Debt, Note, SyncStatus, Transaction};
use crate::store::{CollectionStore, SettingsStore};
use crate::sync::remote::{RemoteLimits, RemoteStore};
use crate::sync::{Collection, ALL_COLLECTIONS};
use crate::storage::keys;

/// 推送的聚合结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// 全部集合写入成功
    Success,
    /// 部分集合写入成功
    Partial,
    /// 没有任何集合写入成功
    Failure,
}

/// 推送报告：聚合结果 + 各集合状态
#[derive(Debug, Clone)]
pub struct PushReport {
    pub outcome: PushOutcome,
    pub statuses: Vec<(Collection, SyncStatus)>,
}

/// 拉取的聚合结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// 本会话已拉取过，直接短路（未发起任何云端调用）
    AlreadyLoaded,
    /// 至少一个集合应用成功
    Applied,
    /// 云端没有任何数据，本地也没有可播种的数据
    Empty,
    /// 云端有数据但没有任何集合应用成功（全部解析/应用失败）；
    /// 会话标志不置位，本会话内可重试
    NothingApplied,
    /// 云端没有任何数据，已用本地数据完成播种推送
    Bootstrapped,
}

/// 拉取报告
#[derive(Debug, Clone)]
pub struct PullReport {
    pub outcome: PullOutcome,
    pub statuses: Vec<(Collection, SyncStatus)>,
}

/// 同步引擎
pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    limits: RemoteLimits,
    notifier: Arc<dyn Notifier>,

    notes: Arc<CollectionStore<Note>>,
    finances: Arc<CollectionStore<Transaction>>,
    debts: Arc<CollectionStore<Debt>>,
    settings: Arc<SettingsStore>,

    /// 各集合的瞬态同步状态
    statuses: RwLock<HashMap<Collection, SyncStatus>>,
    /// 会话级拉取抑制标志
    pulled_this_session: AtomicBool,
    /// 最近一次推送/拉取成功的 payload 指纹（sha256），内容未变时跳过云端写入
    fingerprints: RwLock<HashMap<Collection, String>>,
    /// 操作锁：引擎内的推送/拉取互斥
    op_lock: tokio::sync::Mutex<()>,
}

fn fingerprint(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        limits: RemoteLimits,
        notifier: Arc<dyn Notifier>,
        notes: Arc<CollectionStore<Note>>,
        finances: Arc<CollectionStore<Transaction>>,
        debts: Arc<CollectionStore<Debt>>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            remote,
            limits,
            notifier,
            notes,
            finances,
            debts,
            settings,
            statuses: RwLock::new(HashMap::new()),
            pulled_this_session: AtomicBool::new(false),
            fingerprints: RwLock::new(HashMap::new()),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// 能力探测：每次调用重新探测，不缓存
    pub fn probe_remote_availability(&self) -> bool {
        self.remote.is_available()
    }

    /// 单个集合的当前同步状态
    pub fn status(&self, collection: Collection) -> SyncStatus {
        self.statuses
            .read()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// 全部集合的当前同步状态
    pub fn statuses(&self) -> Vec<(Collection, SyncStatus)> {
        ALL_COLLECTIONS
            .iter()
            .map(|&c| (c, self.status(c)))
            .collect()
    }

    /// 清除会话级拉取抑制（测试/宿主显式刷新用）
    pub fn reset_session_guard(&self) {
        self.pulled_this_session.store(false, Ordering::SeqCst);
    }

    /// 云端的最近一次全量推送时间（毫秒时间戳）
    pub async fn last_synced_at(&self) -> Result<Option<i64>> {
        if !self.remote.is_available() {
            return Err(MiniTrackError::RemoteUnavailable);
        }
        let raw = self.remote.get_item(keys::LAST_SYNC).await?;
        Ok(raw.and_then(|s| s.parse::<i64>().ok()))
    }

    /// 推送：内存快照 → 云端
    pub async fn push(&self) -> Result<PushReport> {
        let _guard = self.op_lock.lock().await;
        self.push_locked().await
    }

    /// 拉取：云端 → 域存储 + 本地镜像
    pub async fn pull(&self) -> Result<PullReport> {
        let _guard = self.op_lock.lock().await;

        // 会话抑制：本会话已拉取过则直接短路，零云端调用
        if self.pulled_this_session.load(Ordering::SeqCst) {
            debug!("pull suppressed: already loaded this session");
            return Ok(PullReport {
                outcome: PullOutcome::AlreadyLoaded,
                statuses: self.statuses(),
            });
        }

        if !self.remote.is_available() {
            self.mark_all_failed("cloud storage is not available");
            return Err(MiniTrackError::RemoteUnavailable);
        }

        // 一次挂起点批量读取全部集合键；缺失的 key 不是错误
        let collection_keys: Vec<&str> = ALL_COLLECTIONS.iter().map(|c| c.key()).collect();
        let values = match self.remote.get_items(&collection_keys).await {
            Ok(values) => values,
            Err(e) => {
                self.mark_all_failed(e.to_string());
                self.notifier
                    .notify("Failed to load data from cloud", NotifyKind::Error);
                return Err(e);
            }
        };

        let mut found_any = false;
        let mut applied_any = false;

        for &collection in ALL_COLLECTIONS {
            let raw = values.get(collection.key()).and_then(|v| v.as_deref());
            let Some(raw) = raw else {
                // 该集合在云端还没有数据
                self.set_status(
                    collection,
                    SyncStatus {
                        is_loaded: false,
                        count: None,
                        timestamp: Some(now_millis()),
                        error: None,
                    },
                );
                continue;
            };
            found_any = true;

            // 单个集合解析/应用失败不阻断其余集合的恢复
            match self.apply_remote_payload(collection, raw) {
                Ok(count) => {
                    applied_any = true;
                    self.set_status(collection, SyncStatus::ok(count));
                }
                Err(e) => {
                    warn!("pull: failed to apply '{}': {}", collection, e);
                    self.set_status(collection, SyncStatus::failed(e.to_string()));
                }
            }
        }

        // 至少应用了一个集合，或确认云端完全没有数据，才记录会话标志；
        // 全部损坏时保留本会话内重试的机会
        if applied_any || !found_any {
            self.pulled_this_session.store(true, Ordering::SeqCst);
        }

        if applied_any {
            info!("✅ 云端拉取完成");
            self.notifier
                .notify("Data loaded from cloud", NotifyKind::Success);
            return Ok(PullReport {
                outcome: PullOutcome::Applied,
                statuses: self.statuses(),
            });
        }

        // 首跑引导：云端全空而本地已有数据时，立刻用本地数据播种云端
        if !found_any && self.has_local_data() {
            info!("🌱 云端为空，用本地数据播种");
            let push_report = self.push_locked().await?;
            return Ok(PullReport {
                outcome: PullOutcome::Bootstrapped,
                statuses: push_report.statuses,
            });
        }

        let outcome = if found_any {
            PullOutcome::NothingApplied
        } else {
            PullOutcome::Empty
        };
        Ok(PullReport {
            outcome,
            statuses: self.statuses(),
        })
    }

    // ============================================================
    // 私有方法
    // ============================================================

    async fn push_locked(&self) -> Result<PushReport> {
        if !self.remote.is_available() {
            self.mark_all_failed("cloud storage is not available");
            self.notifier
                .notify("Cloud storage is not available", NotifyKind::Error);
            return Err(MiniTrackError::RemoteUnavailable);
        }

        // 1. 按集合序列化内存快照（推送的事实来源是内存，不是 LocalStore）
        // 2. 大小超限/序列化失败只记在该集合头上，其余集合照常写
        let mut write_jobs: Vec<(Collection, String, usize)> = Vec::new();
        let mut results: HashMap<Collection, std::result::Result<usize, String>> = HashMap::new();

        for &collection in ALL_COLLECTIONS {
            match self.serialize_collection(collection) {
                Ok((payload, count)) => {
                    if payload.len() > self.limits.max_item_bytes {
                        let err = MiniTrackError::Oversize {
                            collection,
                            size: payload.len(),
                            limit: self.limits.max_item_bytes,
                        };
                        warn!("push: {}", err);
                        results.insert(collection, Err(err.to_string()));
                        continue;
                    }
                    // 内容未变：视为成功但跳过云端写入
                    let unchanged = self
                        .fingerprints
                        .read()
                        .get(&collection)
                        .map(|f| *f == fingerprint(&payload))
                        .unwrap_or(false);
                    if unchanged {
                        debug!("push: '{}' unchanged, skipping write", collection);
                        results.insert(collection, Ok(count));
                        continue;
                    }
                    write_jobs.push((collection, payload, count));
                }
                Err(e) => {
                    results.insert(collection, Err(e.to_string()));
                }
            }
        }

        // 3. 各 key 独立写入，无多 key 事务；完成顺序不定
        let writes = write_jobs.iter().map(|(collection, payload, _)| {
            let remote = Arc::clone(&self.remote);
            let collection = *collection;
            async move {
                let result = remote.set_item(collection.key(), payload).await;
                (collection, result)
            }
        });
        let write_results = futures::future::join_all(writes).await;

        for ((collection, payload, count), (_, result)) in
            write_jobs.iter().zip(write_results.into_iter())
        {
            match result {
                Ok(true) => {
                    self.fingerprints
                        .write()
                        .insert(*collection, fingerprint(payload));
                    results.insert(*collection, Ok(*count));
                }
                Ok(false) => {
                    results.insert(
                        *collection,
                        Err(format!("host refused write for '{}'", collection)),
                    );
                }
                Err(e) => {
                    warn!("push: write failed for '{}': {}", collection, e);
                    results.insert(*collection, Err(e.to_string()));
                }
            }
        }

        // 4. 汇总状态
        let mut statuses = Vec::with_capacity(ALL_COLLECTIONS.len());
        let mut ok_count = 0usize;
        for &collection in ALL_COLLECTIONS {
            let status = match results.get(&collection) {
                Some(Ok(count)) => {
                    ok_count += 1;
                    SyncStatus::ok(*count)
                }
                Some(Err(message)) => SyncStatus::failed(message.clone()),
                None => SyncStatus::failed("write was not attempted"),
            };
            self.set_status(collection, status.clone());
            statuses.push((collection, status));
        }

        // 5. 仅当全部集合成功时写 last-sync 标记（严格排在集合写入确认之后）
        let outcome = if ok_count == ALL_COLLECTIONS.len() {
            if let Err(e) = self
                .remote
                .set_item(keys::LAST_SYNC, &now_millis().to_string())
                .await
            {
                warn!("push: failed to write last-sync marker: {}", e);
            }
            PushOutcome::Success
        } else if ok_count > 0 {
            PushOutcome::Partial
        } else {
            PushOutcome::Failure
        };

        // 通知只在全成功/全失败时触达宿主（尽力而为）
        match outcome {
            PushOutcome::Success => {
                info!("✅ 云端推送完成: {} 个集合", ok_count);
                self.notifier
                    .notify("Data synced to cloud", NotifyKind::Success);
            }
            PushOutcome::Partial => {
                warn!(
                    "⚠️ 云端推送部分成功: {}/{}",
                    ok_count,
                    ALL_COLLECTIONS.len()
                );
            }
            PushOutcome::Failure => {
                warn!("❌ 云端推送失败");
                self.notifier
                    .notify("Failed to sync data to cloud", NotifyKind::Error);
            }
        }

        Ok(PushReport { outcome, statuses })
    }

    fn serialize_collection(&self, collection: Collection) -> Result<(String, usize)> {
        match collection {
            Collection::Notes => Ok((self.notes.serialize()?, self.notes.count())),
            Collection::Finances => Ok((self.finances.serialize()?, self.finances.count())),
            Collection::Debts => Ok((self.debts.serialize()?, self.debts.count())),
            Collection::Settings => Ok((self.settings.serialize()?, 1)),
        }
    }

    /// 解析并应用单个集合的云端 payload
    ///
    /// 先按集合的线上形状预检（列表集合必须是 JSON 数组，Settings 必须
    /// 是对象），再做类型化反序列化，不符都按解析失败处理。应用后复核
    /// 内存中的数量，不一致时恰好重试一次（针对延迟/批量状态传播的
    /// 防御性检查）。
    fn apply_remote_payload(&self, collection: Collection, raw: &str) -> Result<usize> {
        let map_err = |e: serde_json::Error| MiniTrackError::Parse {
            collection,
            message: e.to_string(),
        };

        let value: serde_json::Value = serde_json::from_str(raw).map_err(map_err)?;
        let shape_ok = if collection.is_list() {
            value.is_array()
        } else {
            value.is_object()
        };
        if !shape_ok {
            return Err(MiniTrackError::Parse {
                collection,
                message: format!(
                    "expected {}",
                    if collection.is_list() {
                        "a JSON array"
                    } else {
                        "a JSON object"
                    }
                ),
            });
        }

        let count = match collection {
            Collection::Notes => {
                let items: Vec<Note> = serde_json::from_value(value).map_err(map_err)?;
                self.apply_list(&self.notes, items)?
            }
            Collection::Finances => {
                let items: Vec<Transaction> = serde_json::from_value(value).map_err(map_err)?;
                self.apply_list(&self.finances, items)?
            }
            Collection::Debts => {
                let items: Vec<Debt> = serde_json::from_value(value).map_err(map_err)?;
                self.apply_list(&self.debts, items)?
            }
            Collection::Settings => {
                let settings: crate::storage::entities::Settings =
                    serde_json::from_value(value).map_err(map_err)?;
                self.settings.replace(settings)?;
                let canonical = self.settings.serialize()?;
                self.fingerprints
                    .write()
                    .insert(collection, fingerprint(&canonical));
                1
            }
        };
        Ok(count)
    }

    fn apply_list<T: crate::storage::entities::Record>(
        &self,
        store: &CollectionStore<T>,
        items: Vec<T>,
    ) -> Result<usize> {
        let expected = items.len();
        // replace_all 同时完成本地镜像写入（规范序列化后的 payload）
        store.replace_all(items.clone())?;
        if store.count() != expected {
            warn!(
                "apply recheck: '{}' has {} records, expected {}, retrying once",
                store.collection(),
                store.count(),
                expected
            );
            store.replace_all(items)?;
        }
        let canonical = store.serialize()?;
        self.fingerprints
            .write()
            .insert(store.collection(), fingerprint(&canonical));
        Ok(expected)
    }

    fn has_local_data(&self) -> bool {
        !self.notes.is_empty() || !self.finances.is_empty() || !self.debts.is_empty()
    }

    fn set_status(&self, collection: Collection, status: SyncStatus) {
        self.statuses.write().insert(collection, status);
    }

    fn mark_all_failed(&self, message: impl Into<String>) {
        let message = message.into();
        for &collection in ALL_COLLECTIONS {
            self.set_status(collection, SyncStatus::failed(message.clone()));
        }
    }
}
