//! 数据实体定义 - 对应各集合的存储结构
//!
//! 这里定义了所有集合对应的 Rust 结构体，用于：
//! - 类型安全的数据传输
//! - 统一的数据表示
//! - 序列化/反序列化支持
//!
//! 线上格式为 camelCase JSON（与宿主 Mini App 存储的历史数据一致）。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// 当前时刻的毫秒时间戳
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 集合记录的统一约束：稳定 id + 自校验
///
/// 存储层只通过这个 trait 识别记录，字段含义由具体实体负责。
pub trait Record: Clone + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static {
    /// 稳定、唯一的记录 id
    fn id(&self) -> &str;

    /// 写入前校验；默认无约束
    fn validate(&self) -> crate::error::Result<()> {
        Ok(())
    }
}

/// 笔记实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    /// 创建时间（毫秒时间戳）
    pub created_at: i64,
}

impl Note {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            category: category.into(),
            created_at: now_millis(),
        }
    }
}

impl Record for Note {
    fn id(&self) -> &str {
        &self.id
    }
}

/// 交易方向
///
/// 余额的正负由方向推导，`amount` 始终为正数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }

    /// 对余额的符号：收入 +1，支出 -1
    pub fn sign(&self) -> f64 {
        match self {
            TransactionKind::Income => 1.0,
            TransactionKind::Expense => -1.0,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 财务交易实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub title: String,
    /// 金额，恒为正数；对余额的影响由 `kind` 决定
    pub amount: f64,
    /// 线上字段名为 `type`（历史数据如此）
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// 自由文本分类
    pub category: String,
    /// 交易日期（`YYYY-MM-DD`）
    pub date: NaiveDate,
    /// 创建时间（毫秒时间戳）
    pub created_at: i64,
}

impl Transaction {
    pub fn new(
        title: impl Into<String>,
        amount: f64,
        kind: TransactionKind,
        category: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            amount,
            kind,
            category: category.into(),
            date,
            created_at: now_millis(),
        }
    }

    /// 带符号的金额（收入为正，支出为负）
    pub fn signed_amount(&self) -> f64 {
        self.kind.sign() * self.amount
    }
}

impl Record for Transaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> crate::error::Result<()> {
        if !(self.amount > 0.0) {
            return Err(crate::error::MiniTrackError::InvalidData(format!(
                "transaction amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// 债务状态
///
/// 旧版数据用 `isReturned: bool` 表示；新版用本枚举 + `paidAmount`，
/// 能表达部分还款。反序列化兼容两种形式（见 `DebtWire`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    Active,
    PartiallyPaid,
    Paid,
}

impl DebtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtStatus::Active => "active",
            DebtStatus::PartiallyPaid => "partially_paid",
            DebtStatus::Paid => "paid",
        }
    }

    /// 是否已结清
    pub fn is_settled(&self) -> bool {
        matches!(self, DebtStatus::Paid)
    }
}

impl fmt::Display for DebtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 债务实体
///
/// 序列化经由 [`DebtWire`]：写出时同时带上派生的 `isReturned`，
/// 读入时接受仅有 `isReturned` 的旧版文档并迁移到枚举形式。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DebtWire", into = "DebtWire")]
pub struct Debt {
    pub id: String,
    pub person_name: String,
    /// 债务总额，恒为正数
    pub amount: f64,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub status: DebtStatus,
    /// 已还金额；`status == Paid` 时等于 `amount`
    pub paid_amount: f64,
}

impl Debt {
    pub fn new(
        person_name: impl Into<String>,
        amount: f64,
        description: Option<String>,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            person_name: person_name.into(),
            amount,
            description,
            due_date,
            status: DebtStatus::Active,
            paid_amount: 0.0,
        }
    }

    /// 未还金额
    pub fn remaining(&self) -> f64 {
        (self.amount - self.paid_amount).max(0.0)
    }

    /// 记录一笔还款并推导状态
    pub fn record_payment(&mut self, payment: f64) {
        self.paid_amount = (self.paid_amount + payment).min(self.amount);
        self.status = if self.paid_amount >= self.amount {
            DebtStatus::Paid
        } else if self.paid_amount > 0.0 {
            DebtStatus::PartiallyPaid
        } else {
            DebtStatus::Active
        };
    }
}

impl Record for Debt {
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> crate::error::Result<()> {
        if !(self.amount > 0.0) {
            return Err(crate::error::MiniTrackError::InvalidData(format!(
                "debt amount must be positive, got {}",
                self.amount
            )));
        }
        if self.paid_amount < 0.0 || self.paid_amount > self.amount {
            return Err(crate::error::MiniTrackError::InvalidData(format!(
                "debt paid amount {} out of range [0, {}]",
                self.paid_amount, self.amount
            )));
        }
        Ok(())
    }
}

/// 债务的线上表示（schema v1 与 v2 的并集）
///
/// v1: `isReturned: bool`，无 `status` / `paidAmount`。
/// v2: `status` + `paidAmount`。
/// 写出时两套字段都带，旧版读端继续可用。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtWire {
    pub id: String,
    pub person_name: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub status: Option<DebtStatus>,
    #[serde(default)]
    pub paid_amount: Option<f64>,
    #[serde(default)]
    pub is_returned: Option<bool>,
}

impl From<DebtWire> for Debt {
    fn from(wire: DebtWire) -> Self {
        // 枚举字段优先；缺失时从旧版布尔派生（paid ⇢ 全额已还）
        let status = wire.status.unwrap_or_else(|| {
            if wire.is_returned.unwrap_or(false) {
                DebtStatus::Paid
            } else {
                DebtStatus::Active
            }
        });
        let paid_amount = wire.paid_amount.unwrap_or(match status {
            DebtStatus::Paid => wire.amount,
            _ => 0.0,
        });
        Self {
            id: wire.id,
            person_name: wire.person_name,
            amount: wire.amount,
            description: wire.description,
            due_date: wire.due_date,
            status,
            paid_amount,
        }
    }
}

impl From<Debt> for DebtWire {
    fn from(debt: Debt) -> Self {
        Self {
            id: debt.id,
            person_name: debt.person_name,
            amount: debt.amount,
            description: debt.description,
            due_date: debt.due_date,
            is_returned: Some(debt.status.is_settled()),
            status: Some(debt.status),
            paid_amount: Some(debt.paid_amount),
        }
    }
}

/// 应用设置（单条记录，非集合）
///
/// 未知的顶层键通过 `extra` 原样保留，升级/降级不丢数据。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// 美元汇率，恒为正数
    pub dollar_rate: f64,
    /// 深色主题开关
    #[serde(default)]
    pub dark_theme: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dollar_rate: 1.0,
            dark_theme: false,
            extra: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(self.dollar_rate > 0.0) {
            return Err(crate::error::MiniTrackError::InvalidData(format!(
                "dollar rate must be positive, got {}",
                self.dollar_rate
            )));
        }
        Ok(())
    }
}

/// 单个集合的同步状态
///
/// 派生/瞬态数据：每次同步尝试都重算，从不持久化。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// 本次会话内是否已成功装载过
    pub is_loaded: bool,
    /// 最近一次同步涉及的记录数
    pub count: Option<usize>,
    /// 最近一次同步尝试时间（毫秒时间戳）
    pub timestamp: Option<i64>,
    /// 最近一次失败的人类可读描述
    pub error: Option<String>,
}

impl SyncStatus {
    pub fn ok(count: usize) -> Self {
        Self {
            is_loaded: true,
            count: Some(count),
            timestamp: Some(now_millis()),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            is_loaded: false,
            count: None,
            timestamp: Some(now_millis()),
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_signed_amount() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let income = Transaction::new("Salary", 1000.0, TransactionKind::Income, "Work", date);
        let expense = Transaction::new("Coffee", 150.0, TransactionKind::Expense, "Food", date);

        assert_eq!(income.signed_amount(), 1000.0);
        assert_eq!(expense.signed_amount(), -150.0);
        assert!(income.validate().is_ok());
    }

    #[test]
    fn test_transaction_rejects_non_positive_amount() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tx = Transaction::new("Bad", 0.0, TransactionKind::Expense, "Misc", date);
        assert!(tx.validate().is_err());

        let tx = Transaction::new("Worse", -5.0, TransactionKind::Expense, "Misc", date);
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_transaction_wire_format_uses_type_field() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tx = Transaction::new("Coffee", 150.0, TransactionKind::Expense, "Food", date);
        let json = serde_json::to_value(&tx).unwrap();

        assert_eq!(json["type"], "expense");
        assert_eq!(json["amount"], 150.0);
        assert_eq!(json["date"], "2024-01-01");
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_debt_migrates_legacy_is_returned() {
        // 旧版（schema v1）：只有 isReturned
        let legacy = serde_json::json!({
            "id": "d1",
            "personName": "Alice",
            "amount": 500.0,
            "dueDate": "2024-06-01",
            "isReturned": true
        });
        let debt: Debt = serde_json::from_value(legacy).unwrap();
        assert_eq!(debt.status, DebtStatus::Paid);
        assert_eq!(debt.paid_amount, 500.0);

        let legacy_open = serde_json::json!({
            "id": "d2",
            "personName": "Bob",
            "amount": 300.0,
            "dueDate": "2024-06-01",
            "isReturned": false
        });
        let debt: Debt = serde_json::from_value(legacy_open).unwrap();
        assert_eq!(debt.status, DebtStatus::Active);
        assert_eq!(debt.paid_amount, 0.0);
    }

    #[test]
    fn test_debt_serializes_both_representations() {
        let mut debt = Debt::new(
            "Carol",
            200.0,
            None,
            NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
        );
        debt.record_payment(50.0);

        let json = serde_json::to_value(&debt).unwrap();
        assert_eq!(json["status"], "partially_paid");
        assert_eq!(json["paidAmount"], 50.0);
        assert_eq!(json["isReturned"], false);

        // 回读后保持枚举形式
        let back: Debt = serde_json::from_value(json).unwrap();
        assert_eq!(back.status, DebtStatus::PartiallyPaid);
        assert_eq!(back.remaining(), 150.0);
    }

    #[test]
    fn test_debt_payment_lifecycle() {
        let mut debt = Debt::new(
            "Dave",
            100.0,
            Some("lunch".to_string()),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        );
        assert_eq!(debt.status, DebtStatus::Active);

        debt.record_payment(40.0);
        assert_eq!(debt.status, DebtStatus::PartiallyPaid);
        assert_eq!(debt.remaining(), 60.0);

        debt.record_payment(60.0);
        assert_eq!(debt.status, DebtStatus::Paid);
        assert_eq!(debt.remaining(), 0.0);
    }

    #[test]
    fn test_settings_preserves_unknown_keys() {
        let json = serde_json::json!({
            "dollarRate": 98.5,
            "darkTheme": true,
            "language": "en",
            "chartStyle": {"bars": true}
        });
        let settings: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(settings.dollar_rate, 98.5);
        assert!(settings.dark_theme);
        assert_eq!(settings.extra["language"], "en");

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["chartStyle"]["bars"], true);
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());
        settings.dollar_rate = 0.0;
        assert!(settings.validate().is_err());
    }
}
