//! 存储键常量
//!
//! 规范键本地/云端共用（两边都按集合名存快照）。旧版 Web 端用过若干
//! 历史键名，按固定优先级作为回退来源，命中后迁移到规范键（见
//! `storage::migration`），不会在每次读取时重复探测。

/// 笔记集合
pub const NOTES: &str = "notes";
/// 财务交易集合
pub const FINANCES: &str = "finances";
/// 债务集合
pub const DEBTS: &str = "debts";
/// 设置（单条记录）
pub const SETTINGS: &str = "settings";

/// 最近一次全量推送成功的时间标记（仅云端）
pub const LAST_SYNC: &str = "last-sync";

/// 历史键名（优先级从高到低）
pub mod legacy {
    pub const NOTES: &[&str] = &["telegram-notes-data"];
    pub const FINANCES: &[&str] = &["telegram-finance-data", "transactions"];
    pub const DEBTS: &[&str] = &["telegram-debts-data"];
    pub const SETTINGS: &[&str] = &["app-settings"];
}
