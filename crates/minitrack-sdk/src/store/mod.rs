//! 域存储 - 各集合的内存属主
//!
//! 每个集合一个属主容器：内存中的集合是 UI 消费的唯一事实来源，
//! 所有变更都走定义好的操作（replace/add/update/delete），外部
//! 拿到的是快照克隆，没有可变共享。
//!
//! 每次变更同步写入 LocalStore（整集合 JSON 快照），然后广播
//! [`DataChanged`](crate::events::DataChanged) 事件；防抖调度器据此
//! 安排云端推送。

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{MiniTrackError, Result};
use crate::events::EventBus;
use crate::storage::entities::{Debt, DebtStatus, Record, Settings, Transaction, TransactionKind};
use crate::storage::local::LocalStore;
use crate::storage::migration::resolve_local_payload;
use crate::sync::Collection;

/// 集合属主容器
pub struct CollectionStore<T: Record> {
    collection: Collection,
    local: Arc<dyn LocalStore>,
    events: Arc<EventBus>,
    items: RwLock<Vec<T>>,
}

impl<T: Record> CollectionStore<T> {
    pub fn new(collection: Collection, local: Arc<dyn LocalStore>, events: Arc<EventBus>) -> Self {
        Self {
            collection,
            local,
            events,
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// 从 LocalStore 装载（含历史键名迁移）
    ///
    /// 本地快照损坏时记日志并以空集合启动，但不覆盖损坏的数据，
    /// 留给后续拉取/人工修复的机会。
    pub fn load(&self) -> Result<usize> {
        let payload = resolve_local_payload(self.local.as_ref(), self.collection)?;
        let items: Vec<T> = match payload {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(items) => items,
                Err(e) => {
                    warn!(
                        "corrupt local snapshot for '{}', starting empty: {}",
                        self.collection, e
                    );
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let count = items.len();
        *self.items.write() = items;
        debug!("loaded {} records for '{}'", count, self.collection);
        Ok(count)
    }

    /// 当前集合快照（克隆）
    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().clone()
    }

    pub fn count(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.items.read().iter().find(|item| item.id() == id).cloned()
    }

    /// 整体替换（拉取/导入路径：覆盖语义，不做合并）
    pub fn replace_all(&self, items: Vec<T>) -> Result<usize> {
        let count = items.len();
        *self.items.write() = items;
        self.persist()?;
        Ok(count)
    }

    pub fn add(&self, item: T) -> Result<()> {
        item.validate()?;
        self.items.write().push(item);
        self.persist()
    }

    /// 按 id 原地更新
    pub fn update(&self, item: T) -> Result<()> {
        item.validate()?;
        {
            let mut items = self.items.write();
            let slot = items
                .iter_mut()
                .find(|existing| existing.id() == item.id())
                .ok_or_else(|| {
                    MiniTrackError::NotFound(format!(
                        "no record '{}' in '{}'",
                        item.id(),
                        self.collection
                    ))
                })?;
            *slot = item;
        }
        self.persist()
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        {
            let mut items = self.items.write();
            let before = items.len();
            items.retain(|item| item.id() != id);
            if items.len() == before {
                return Err(MiniTrackError::NotFound(format!(
                    "no record '{}' in '{}'",
                    id, self.collection
                )));
            }
        }
        self.persist()
    }

    /// 当前快照的规范序列化（本地镜像与云端推送共用同一份格式）
    pub fn serialize(&self) -> Result<String> {
        let items = self.items.read();
        Ok(serde_json::to_string(&*items)?)
    }

    fn persist(&self) -> Result<()> {
        let payload = self.serialize()?;
        self.local.set(self.collection.key(), &payload)?;
        self.events.publish(self.collection);
        Ok(())
    }
}

impl CollectionStore<Transaction> {
    /// 收入合计
    pub fn income_total(&self) -> f64 {
        self.items
            .read()
            .iter()
            .filter(|t| t.kind == TransactionKind::Income)
            .map(|t| t.amount)
            .sum()
    }

    /// 支出合计
    pub fn expense_total(&self) -> f64 {
        self.items
            .read()
            .iter()
            .filter(|t| t.kind == TransactionKind::Expense)
            .map(|t| t.amount)
            .sum()
    }

    /// 余额（符号由交易方向推导，而不是金额的正负）
    pub fn balance(&self) -> f64 {
        self.items.read().iter().map(|t| t.signed_amount()).sum()
    }
}

impl CollectionStore<Debt> {
    /// 未结清债务的剩余总额
    pub fn active_debt_total(&self) -> f64 {
        self.items
            .read()
            .iter()
            .filter(|d| d.status != DebtStatus::Paid)
            .map(|d| d.remaining())
            .sum()
    }
}

/// 设置容器（单条记录，非集合）
pub struct SettingsStore {
    local: Arc<dyn LocalStore>,
    events: Arc<EventBus>,
    settings: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(local: Arc<dyn LocalStore>, events: Arc<EventBus>) -> Self {
        Self {
            local,
            events,
            settings: RwLock::new(Settings::default()),
        }
    }

    pub fn load(&self) -> Result<()> {
        let payload = resolve_local_payload(self.local.as_ref(), Collection::Settings)?;
        if let Some(raw) = payload {
            match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => *self.settings.write() = settings,
                Err(e) => {
                    warn!("corrupt local settings, keeping defaults: {}", e);
                }
            }
        }
        Ok(())
    }

    pub fn get(&self) -> Settings {
        self.settings.read().clone()
    }

    /// 整体替换（拉取/导入路径）
    pub fn replace(&self, settings: Settings) -> Result<()> {
        *self.settings.write() = settings;
        self.persist()
    }

    /// 原地修改并校验
    pub fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Settings),
    {
        {
            let mut settings = self.settings.write();
            let mut next = settings.clone();
            mutate(&mut next);
            next.validate()?;
            *settings = next;
        }
        self.persist()
    }

    pub fn serialize(&self) -> Result<String> {
        let settings = self.settings.read();
        Ok(serde_json::to_string(&*settings)?)
    }

    fn persist(&self) -> Result<()> {
        let payload = self.serialize()?;
        self.local.set(Collection::Settings.key(), &payload)?;
        self.events.publish(Collection::Settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::entities::Note;
    use crate::storage::local::MemoryLocalStore;
    use chrono::NaiveDate;

    fn fixture() -> (Arc<MemoryLocalStore>, Arc<EventBus>) {
        (Arc::new(MemoryLocalStore::new()), Arc::new(EventBus::new(64)))
    }

    #[test]
    fn test_mutations_persist_to_local_store() {
        let (local, events) = fixture();
        let store: CollectionStore<Note> =
            CollectionStore::new(Collection::Notes, local.clone(), events);

        let note = Note::new("Title", "Body", "General");
        let id = note.id.clone();
        store.add(note).unwrap();

        // 每次变更后 LocalStore 里都是最新快照
        let raw = local.get("notes").unwrap().unwrap();
        assert!(raw.contains(&id));

        store.delete(&id).unwrap();
        assert_eq!(local.get("notes").unwrap().unwrap(), "[]");
    }

    #[test]
    fn test_update_replaces_by_id() {
        let (local, events) = fixture();
        let store: CollectionStore<Note> = CollectionStore::new(Collection::Notes, local, events);

        let mut note = Note::new("Before", "Body", "General");
        store.add(note.clone()).unwrap();

        note.title = "After".to_string();
        store.update(note.clone()).unwrap();

        assert_eq!(store.get(&note.id).unwrap().title, "After");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_update_missing_record_fails() {
        let (local, events) = fixture();
        let store: CollectionStore<Note> = CollectionStore::new(Collection::Notes, local, events);
        let orphan = Note::new("T", "B", "C");
        assert!(matches!(
            store.update(orphan),
            Err(MiniTrackError::NotFound(_))
        ));
    }

    #[test]
    fn test_add_validates_amount() {
        let (local, events) = fixture();
        let store: CollectionStore<Transaction> =
            CollectionStore::new(Collection::Finances, local, events);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bad = Transaction::new("Bad", -1.0, TransactionKind::Income, "Misc", date);
        assert!(store.add(bad).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_migrates_legacy_key() {
        let (local, events) = fixture();
        local
            .set(
                "telegram-notes-data",
                r#"[{"id":"n1","title":"t","content":"c","category":"g","createdAt":1}]"#,
            )
            .unwrap();

        let store: CollectionStore<Note> =
            CollectionStore::new(Collection::Notes, local.clone(), events);
        assert_eq!(store.load().unwrap(), 1);
        assert!(local.get("notes").unwrap().is_some());
        assert_eq!(local.get("telegram-notes-data").unwrap(), None);
    }

    #[test]
    fn test_load_corrupt_snapshot_starts_empty_without_overwrite() {
        let (local, events) = fixture();
        local.set("notes", "not json at all").unwrap();

        let store: CollectionStore<Note> =
            CollectionStore::new(Collection::Notes, local.clone(), events);
        assert_eq!(store.load().unwrap(), 0);
        // 损坏的本地数据保持原样，等待拉取或人工修复
        assert_eq!(local.get("notes").unwrap().unwrap(), "not json at all");
    }

    #[test]
    fn test_finance_summaries() {
        let (local, events) = fixture();
        let store: CollectionStore<Transaction> =
            CollectionStore::new(Collection::Finances, local, events);
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        store
            .add(Transaction::new("Salary", 1000.0, TransactionKind::Income, "Work", date))
            .unwrap();
        store
            .add(Transaction::new("Rent", 400.0, TransactionKind::Expense, "Home", date))
            .unwrap();

        assert_eq!(store.income_total(), 1000.0);
        assert_eq!(store.expense_total(), 400.0);
        assert_eq!(store.balance(), 600.0);
    }

    #[test]
    fn test_debt_total_ignores_settled() {
        let (local, events) = fixture();
        let store: CollectionStore<Debt> = CollectionStore::new(Collection::Debts, local, events);
        let due = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();

        let mut paid = Debt::new("Alice", 100.0, None, due);
        paid.record_payment(100.0);
        let mut partial = Debt::new("Bob", 300.0, None, due);
        partial.record_payment(100.0);

        store.add(paid).unwrap();
        store.add(partial).unwrap();
        store.add(Debt::new("Carol", 50.0, None, due)).unwrap();

        assert_eq!(store.active_debt_total(), 250.0);
    }

    #[test]
    fn test_settings_update_validates() {
        let (local, events) = fixture();
        let store = SettingsStore::new(local.clone(), events);

        store.update(|s| s.dollar_rate = 97.5).unwrap();
        assert_eq!(store.get().dollar_rate, 97.5);

        // 非法值被拒绝，旧值保留
        assert!(store.update(|s| s.dollar_rate = -1.0).is_err());
        assert_eq!(store.get().dollar_rate, 97.5);

        let raw = local.get("settings").unwrap().unwrap();
        assert!(raw.contains("97.5"));
    }
}
