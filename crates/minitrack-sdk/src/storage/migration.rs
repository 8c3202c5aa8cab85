//! 本地数据迁移
//!
//! 两类迁移，都在装载时一次性完成：
//! - **键名迁移**：历史键名按固定优先级探测，命中后搬到规范键并删除旧键，
//!   之后读取只看规范键，不再重复探测别名。
//! - **实体迁移**：债务 schema v1（`isReturned`）→ v2（`status` + `paidAmount`），
//!   由实体层的线上表示自动完成（见 `entities::DebtWire`）。

use crate::error::Result;
use crate::storage::local::LocalStore;
use crate::sync::Collection;

/// 按优先级解析集合的本地快照，必要时迁移到规范键
///
/// 返回规范键下（迁移后）的原始 JSON 字符串；两边都没有数据时返回 None。
pub fn resolve_local_payload(
    local: &dyn LocalStore,
    collection: Collection,
) -> Result<Option<String>> {
    let canonical = collection.key();
    if let Some(payload) = local.get(canonical)? {
        return Ok(Some(payload));
    }

    for alias in collection.legacy_keys() {
        if let Some(payload) = local.get(alias)? {
            tracing::info!(
                "migrating '{}' from legacy key '{}' to '{}'",
                collection,
                alias,
                canonical
            );
            local.set(canonical, &payload)?;
            local.remove(alias)?;
            return Ok(Some(payload));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::local::MemoryLocalStore;

    #[test]
    fn test_canonical_key_wins() {
        let local = MemoryLocalStore::new();
        local.set("notes", r#"[{"id":"new"}]"#).unwrap();
        local.set("telegram-notes-data", r#"[{"id":"old"}]"#).unwrap();

        let payload = resolve_local_payload(&local, Collection::Notes)
            .unwrap()
            .unwrap();
        assert!(payload.contains("new"));
        // 规范键有数据时别名原样保留
        assert!(local.get("telegram-notes-data").unwrap().is_some());
    }

    #[test]
    fn test_legacy_key_is_migrated_once() {
        let local = MemoryLocalStore::new();
        local
            .set("telegram-finance-data", r#"[{"id":"t1"}]"#)
            .unwrap();

        let payload = resolve_local_payload(&local, Collection::Finances)
            .unwrap()
            .unwrap();
        assert!(payload.contains("t1"));

        // 迁移后：规范键有数据，旧键已删除
        assert!(local.get("finances").unwrap().is_some());
        assert_eq!(local.get("telegram-finance-data").unwrap(), None);
    }

    #[test]
    fn test_alias_priority_order() {
        let local = MemoryLocalStore::new();
        // finances 的两个历史键都有数据，优先级高的胜出
        local
            .set("telegram-finance-data", r#"[{"id":"priority"}]"#)
            .unwrap();
        local.set("transactions", r#"[{"id":"fallback"}]"#).unwrap();

        let payload = resolve_local_payload(&local, Collection::Finances)
            .unwrap()
            .unwrap();
        assert!(payload.contains("priority"));
    }

    #[test]
    fn test_missing_everywhere() {
        let local = MemoryLocalStore::new();
        assert_eq!(resolve_local_payload(&local, Collection::Debts).unwrap(), None);
    }
}
