//! 防抖自动同步调度器
//!
//! 一个共享的延迟窗口（默认 5 秒）：每次集合变更都取消并重置待触发
//! 的定时器，只有连续一个完整窗口没有新变更时才执行一次推送。快速
//! 连续的编辑（比如批量导入）被合并成一次云端写入，符合云存储的
//! 单次操作与频率约束。
//!
//! 推送进行中收到的变更会继续重置窗口，但不会启动第二个并发推送
//! （引擎的操作锁负责互斥；调度器自身在推送返回前也不处理新事件）。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::events::{DataChanged, EventBus};
use crate::sync::sync_engine::SyncEngine;

/// 默认防抖窗口
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(5);

/// 防抖调度器
///
/// 拥有唯一的待触发定时器；变更事件来自 [`EventBus`] 订阅。
pub struct SyncScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    /// 启动调度器后台任务
    pub fn start(engine: Arc<SyncEngine>, events: &EventBus, window: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let receiver = events.subscribe();
        let handle = tokio::spawn(run_loop(engine, receiver, shutdown_rx, window));
        Self {
            shutdown_tx,
            handle: tokio::sync::Mutex::new(Some(handle)),
        }
    }

    /// 停止调度器并等待后台任务退出
    ///
    /// 已在执行中的推送会跑完；仅处于等待窗口中的推送被丢弃。
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("sync scheduler task ended abnormally: {}", e);
            }
        }
    }
}

async fn run_loop(
    engine: Arc<SyncEngine>,
    mut events: broadcast::Receiver<DataChanged>,
    mut shutdown: watch::Receiver<bool>,
    window: Duration,
) {
    // 远端哨兵时刻：timer 未武装时停在这里，永远不会自然到期
    let timer = tokio::time::sleep(Duration::from_secs(86400 * 365));
    tokio::pin!(timer);
    let mut armed = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(changed) => {
                        debug!("debounce: '{}' changed, window reset", changed.collection);
                        timer.as_mut().reset(Instant::now() + window);
                        armed = true;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // 丢了事件也只意味着有过变更，窗口照常重置
                        debug!("debounce: lagged {} events, window reset", skipped);
                        timer.as_mut().reset(Instant::now() + window);
                        armed = true;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = &mut timer, if armed => {
                armed = false;
                debug!("debounce: window elapsed, pushing");
                if let Err(e) = engine.push().await {
                    // Unavailable 等错误不自动重试，下一次变更会重新开窗
                    warn!("debounced push failed: {}", e);
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("sync scheduler loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::notify::NoopNotifier;
    use crate::storage::entities::{Note, Transaction, TransactionKind};
    use crate::storage::local::{LocalStore, MemoryLocalStore};
    use crate::store::{CollectionStore, SettingsStore};
    use crate::sync::remote::{InMemoryRemoteStore, RemoteLimits};
    use crate::sync::Collection;
    use chrono::NaiveDate;

    struct Fixture {
        events: Arc<EventBus>,
        remote: Arc<InMemoryRemoteStore>,
        notes: Arc<CollectionStore<Note>>,
        finances: Arc<CollectionStore<Transaction>>,
        engine: Arc<SyncEngine>,
    }

    fn fixture() -> Fixture {
        let local: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let events = Arc::new(EventBus::new(64));
        let remote = Arc::new(InMemoryRemoteStore::new());

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
        let settings = Arc::new(SettingsStore::new(local, events.clone()));

        let engine = Arc::new(SyncEngine::new(
            remote.clone(),
            RemoteLimits::default(),
            Arc::new(NoopNotifier),
            notes.clone(),
            finances.clone(),
            debts,
            settings,
        ));

        Fixture {
            events,
            remote,
            notes,
            finances,
            engine,
        }
    }

    async fn settle() {
        // 让后台任务消化完已广播的事件
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ten_mutations_coalesce_into_one_push() {
        let f = fixture();
        let scheduler = SyncScheduler::start(f.engine.clone(), &f.events, Duration::from_secs(5));

        // 1 秒内 10 次变更
        for i in 0..10 {
            f.notes
                .add(Note::new(format!("note-{}", i), "body", "General"))
                .unwrap();
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        settle().await;
        assert_eq!(f.remote.set_call_count(), 0, "no push before the window");

        // 窗口走完：恰好一次推送，内容是第 10 次变更后的状态
        tokio::time::advance(Duration::from_secs(6)).await;
        settle().await;

        let pushed = f.remote.raw_get("notes").expect("notes pushed");
        let records: Vec<serde_json::Value> = serde_json::from_str(&pushed).unwrap();
        assert_eq!(records.len(), 10);
        // 4 个集合 + last-sync 标记，且只推送了一轮
        assert_eq!(f.remote.set_call_count(), 5);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_mutation_resets_the_window() {
        let f = fixture();
        let scheduler = SyncScheduler::start(f.engine.clone(), &f.events, Duration::from_secs(5));

        f.notes.add(Note::new("a", "b", "c")).unwrap();
        settle().await;
        // 4 秒后（窗口未走完）又一次变更
        tokio::time::advance(Duration::from_secs(4)).await;
        f.notes.add(Note::new("d", "e", "f")).unwrap();
        settle().await;
        // 距第一次变更已 8 秒，但第二次变更重置过窗口：仍不应推送
        tokio::time::advance(Duration::from_secs(4)).await;
        settle().await;
        assert_eq!(f.remote.set_call_count(), 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert!(f.remote.raw_get("notes").is_some());

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_coffee_scenario_lands_in_remote_finances() {
        let f = fixture();
        let scheduler = SyncScheduler::start(f.engine.clone(), &f.events, Duration::from_secs(5));

        f.finances
            .add(Transaction::new(
                "Coffee",
                150.0,
                TransactionKind::Expense,
                "Food",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ))
            .unwrap();
        settle().await;

        tokio::time::advance(Duration::from_secs(6)).await;
        settle().await;

        let raw = f.remote.raw_get("finances").expect("finances pushed");
        let records: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["amount"], 150.0);
        assert_eq!(records[0]["type"], "expense");

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_pending_window() {
        let f = fixture();
        let scheduler = SyncScheduler::start(f.engine.clone(), &f.events, Duration::from_secs(5));

        f.notes.add(Note::new("a", "b", "c")).unwrap();
        settle().await;
        scheduler.shutdown().await;

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(f.remote.set_call_count(), 0);
    }
}
