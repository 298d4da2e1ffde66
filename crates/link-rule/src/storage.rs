use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::model::{Rule, RuleId, RulePayload};

/// 规则持久化接口
///
/// 每个调用相互独立，没有跨调用的事务；并发编辑按规则粒度后写覆盖。
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// 创建规则，返回带服务端 ID 的规则
    async fn create(&self, link_id: &str, rule: &RulePayload) -> Result<Rule, StoreError>;

    /// 更新规则
    async fn update(&self, link_id: &str, rule_id: &str, patch: &RulePayload) -> Result<Rule, StoreError>;

    /// 删除规则
    async fn delete(&self, link_id: &str, rule_id: &str) -> Result<(), StoreError>;

    /// 列出链接的全部规则
    async fn list(&self, link_id: &str) -> Result<Vec<Rule>, StoreError>;

    /// 存储类型
    fn store_type(&self) -> &str;
}

/// 规则存储（内存实现）
pub struct MemoryRuleStore {
    links: Arc<RwLock<HashMap<String, Vec<Rule>>>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self {
            links: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn create(&self, link_id: &str, rule: &RulePayload) -> Result<Rule, StoreError> {
        let now = Utc::now();
        let id = RuleId::persisted(uuid::Uuid::new_v4().to_string());
        let created = rule.clone().into_rule(id, now, now);

        let mut links = self.links.write().await;
        links
            .entry(link_id.to_string())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn update(&self, link_id: &str, rule_id: &str, patch: &RulePayload) -> Result<Rule, StoreError> {
        let mut links = self.links.write().await;
        let existing = links
            .get_mut(link_id)
            .and_then(|rules| rules.iter_mut().find(|r| r.id.as_persisted() == Some(rule_id)))
            .ok_or_else(|| StoreError::NotFound {
                link_id: link_id.to_string(),
                rule_id: rule_id.to_string(),
            })?;

        let created_at = existing.created_at.unwrap_or_else(Utc::now);
        *existing = patch
            .clone()
            .into_rule(existing.id.clone(), created_at, Utc::now());
        Ok(existing.clone())
    }

    async fn delete(&self, link_id: &str, rule_id: &str) -> Result<(), StoreError> {
        let mut links = self.links.write().await;
        let rules = links.get_mut(link_id);
        let position = rules
            .as_ref()
            .and_then(|rules| rules.iter().position(|r| r.id.as_persisted() == Some(rule_id)));

        match (rules, position) {
            (Some(rules), Some(position)) => {
                rules.remove(position);
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                link_id: link_id.to_string(),
                rule_id: rule_id.to_string(),
            }),
        }
    }

    async fn list(&self, link_id: &str) -> Result<Vec<Rule>, StoreError> {
        let links = self.links.read().await;
        let mut rules = links.get(link_id).cloned().unwrap_or_default();
        rules.sort_by_key(|rule| rule.priority);
        Ok(rules)
    }

    fn store_type(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;

    fn payload(priority: u32, url: &str) -> RulePayload {
        let rule = Rule {
            priority,
            action: Action::redirect(url),
            ..Default::default()
        };
        RulePayload::from(&rule)
    }

    #[tokio::test]
    async fn test_create_assigns_server_id() {
        let store = MemoryRuleStore::new();
        let rule = store.create("link", &payload(0, "https://a.example")).await.unwrap();

        assert!(!rule.id.is_draft());
        assert!(rule.created_at.is_some());
        assert!(rule.conditions.is_empty());
        assert_eq!(store.list("link").await.unwrap(), vec![rule]);
    }

    #[tokio::test]
    async fn test_list_sorted_by_priority() {
        let store = MemoryRuleStore::new();
        store.create("link", &payload(1, "https://b.example")).await.unwrap();
        store.create("link", &payload(0, "https://a.example")).await.unwrap();
        store.create("other", &payload(0, "https://c.example")).await.unwrap();

        let rules = store.list("link").await.unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].action, Action::redirect("https://a.example"));
        assert!(store.list("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryRuleStore::new();
        let rule = store.create("link", &payload(0, "https://a.example")).await.unwrap();
        let id = rule.id.as_persisted().unwrap().to_string();

        let updated = store
            .update("link", &id, &payload(0, "https://b.example"))
            .await
            .unwrap();
        assert_eq!(updated.id, rule.id);
        assert_eq!(updated.created_at, rule.created_at);
        assert_eq!(updated.action, Action::redirect("https://b.example"));

        store.delete("link", &id).await.unwrap();
        assert!(store.list("link").await.unwrap().is_empty());
        assert!(matches!(
            store.delete("link", &id).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.update("link", &id, &payload(0, "https://c.example")).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
