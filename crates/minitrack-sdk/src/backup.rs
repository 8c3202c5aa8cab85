//! 文件备份 - 全量快照的导出与导入
//!
//! 导出：四个集合 + 格式版本 + 导出时间，单个 UTF-8 JSON 文档，
//! 文件名带日期戳，宿主限定 JSON 选择器回收。
//!
//! 导入：对文档里出现的每个已知字段先做形状校验（集合必须是数组、
//! settings 必须是对象），任何一处不合格整体拒绝、零部分写入；校验
//! 通过后每个出现的字段整体替换对应域存储与本地镜像（与拉取一致的
//! 覆盖语义，不做合并）。各字段独立可选（v2 起），但一个已知字段都
//! 没有的文档按非法处理。

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{MiniTrackError, Result};
use crate::storage::entities::{Debt, Note, Settings, Transaction};
use crate::store::{CollectionStore, SettingsStore};
use crate::sync::Collection;
use crate::version::BACKUP_FORMAT_VERSION;

/// 备份文档
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: String,
    /// 导出时间（毫秒时间戳）
    pub export_date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Note>>,
    /// 旧版文档里这个字段叫 `transactions`
    #[serde(default, alias = "transactions", skip_serializing_if = "Option::is_none")]
    pub finances: Option<Vec<Transaction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debts: Option<Vec<Debt>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

/// 导入校验错误
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("backup document must be a JSON object")]
    NotAnObject,
    #[error("field '{field}' must be {expected}")]
    WrongShape {
        field: String,
        expected: &'static str,
    },
    #[error("field '{field}' failed to decode: {message}")]
    Decode { field: String, message: String },
    #[error("backup document contains no known collections")]
    EmptyDocument,
}

impl From<ImportError> for MiniTrackError {
    fn from(error: ImportError) -> Self {
        MiniTrackError::Validation(error.to_string())
    }
}

/// 导入结果：每个被替换的集合及其记录数
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub applied: Vec<(Collection, usize)>,
}

/// 导出全量快照（来源是内存中的域存储）
pub fn export_snapshot(
    notes: &CollectionStore<Note>,
    finances: &CollectionStore<Transaction>,
    debts: &CollectionStore<Debt>,
    settings: &SettingsStore,
) -> BackupDocument {
    BackupDocument {
        version: BACKUP_FORMAT_VERSION.to_string(),
        export_date: Utc::now().timestamp_millis(),
        notes: Some(notes.snapshot()),
        finances: Some(finances.snapshot()),
        debts: Some(debts.snapshot()),
        settings: Some(settings.get()),
    }
}

/// 备份文件名，如 `minitrack-backup-2024-01-01.json`
pub fn backup_filename() -> String {
    format!("minitrack-backup-{}.json", Utc::now().format("%Y-%m-%d"))
}

/// 校验并导入备份文档
///
/// 形状校验全部通过之前不碰任何域存储；校验失败整体拒绝。
pub fn import_snapshot(
    raw: &str,
    notes: &CollectionStore<Note>,
    finances: &CollectionStore<Transaction>,
    debts: &CollectionStore<Debt>,
    settings: &SettingsStore,
) -> Result<ImportSummary> {
    let document = validate_document(raw)?;

    let mut applied = Vec::new();
    if let Some(items) = document.notes {
        let count = notes.replace_all(items)?;
        applied.push((Collection::Notes, count));
    }
    if let Some(items) = document.finances {
        let count = finances.replace_all(items)?;
        applied.push((Collection::Finances, count));
    }
    if let Some(items) = document.debts {
        let count = debts.replace_all(items)?;
        applied.push((Collection::Debts, count));
    }
    if let Some(value) = document.settings {
        settings.replace(value)?;
        applied.push((Collection::Settings, 1));
    }

    tracing::info!("📥 备份导入完成: {} 个集合", applied.len());
    Ok(ImportSummary { applied })
}

/// 先按形状逐字段校验，再做类型化解码；两步都过才返回文档
fn validate_document(raw: &str) -> std::result::Result<BackupDocument, ImportError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ImportError::Json(e.to_string()))?;
    let object = value.as_object().ok_or(ImportError::NotAnObject)?;

    let mut known_fields = 0usize;
    for field in ["notes", "finances", "transactions", "debts"] {
        if let Some(v) = object.get(field) {
            known_fields += 1;
            if !v.is_array() {
                return Err(ImportError::WrongShape {
                    field: field.to_string(),
                    expected: "an array",
                });
            }
        }
    }
    if let Some(v) = object.get("settings") {
        known_fields += 1;
        if !v.is_object() {
            return Err(ImportError::WrongShape {
                field: "settings".to_string(),
                expected: "an object",
            });
        }
    }
    if known_fields == 0 {
        return Err(ImportError::EmptyDocument);
    }

    // 记录级形状（字段类型、日期格式等）由类型化解码把关
    serde_json::from_value(value).map_err(|e| ImportError::Decode {
        field: "document".to_string(),
        message: e.to_string(),
    })
}
