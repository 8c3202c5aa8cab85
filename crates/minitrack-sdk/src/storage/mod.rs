//! 存储模块 - 数据持久化层
//!
//! 分层设计：
//! - Entities: 数据实体定义，类型安全的数据传输
//! - LocalStore: 同步 KV 接口（sled / 内存实现），存各集合的 JSON 快照
//! - Keys: 规范键与历史键名表
//! - Migration: 装载期的键名迁移与实体 schema 迁移

pub mod entities;
pub mod keys;
pub mod local;
pub mod migration;

// 重新导出核心类型
pub use entities::{
    Debt, DebtStatus, Note, Record, Settings, SyncStatus, Transaction, TransactionKind,
};
pub use local::{LocalStore, MemoryLocalStore, SledLocalStore};
pub use migration::resolve_local_payload;
