//! SDK 版本元信息
//!
//! **SDK Version** → Cargo.toml（唯一权威源）。

/// SDK semver，来自 Cargo.toml
///
/// 禁止手写版本号，必须用 `env!("CARGO_PKG_VERSION")` 与 Cargo.toml 保持同步。
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// 备份文档格式版本（见 `backup` 模块）
///
/// v1 为旧版 Web 端导出格式（要求四个顶层字段全部存在）；
/// v2 起各字段独立可选，校验仍然是 all-or-nothing。
pub const BACKUP_FORMAT_VERSION: &str = "2";
