use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use crate::condition::Condition;

const DRAFT_PREFIX: &str = "draft-";

/// 规则 ID
///
/// 新建规则在工作副本中使用客户端临时 ID，保存后由服务端分配正式 ID。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleId {
    /// 服务端分配的 ID
    Persisted(String),

    /// 仅存在于本地工作副本的临时 ID
    Draft(Uuid),
}

impl RuleId {
    pub fn draft() -> Self {
        RuleId::Draft(Uuid::new_v4())
    }

    pub fn persisted(id: impl Into<String>) -> Self {
        RuleId::Persisted(id.into())
    }

    pub fn parse(value: &str) -> Self {
        value
            .strip_prefix(DRAFT_PREFIX)
            .and_then(|rest| Uuid::parse_str(rest).ok())
            .map(RuleId::Draft)
            .unwrap_or_else(|| RuleId::Persisted(value.to_string()))
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, RuleId::Draft(_))
    }

    pub fn as_persisted(&self) -> Option<&str> {
        match self {
            RuleId::Persisted(id) => Some(id),
            RuleId::Draft(_) => None,
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleId::Persisted(id) => f.write_str(id),
            RuleId::Draft(uuid) => write!(f, "{DRAFT_PREFIX}{uuid}"),
        }
    }
}

impl Serialize for RuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RuleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Number(u64),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Text(text) => RuleId::parse(&text),
            Wire::Number(number) => RuleId::Persisted(number.to_string()),
        })
    }
}

/// 条件组合方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    #[default]
    #[serde(rename = "AND")]
    And,

    #[serde(rename = "OR")]
    Or,
}

/// 跳转设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectSettings {
    #[serde(default)]
    pub url: String,
}

/// 拦截设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockAccessSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// 密码访问设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordGateSettings {
    #[serde(default)]
    pub password_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// 通知设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 规则动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "settings", rename_all = "snake_case")]
pub enum Action {
    Redirect(RedirectSettings),
    BlockAccess(BlockAccessSettings),
    PasswordGate(PasswordGateSettings),
    Notify(NotifySettings),
}

impl Action {
    pub fn redirect(url: impl Into<String>) -> Self {
        Action::Redirect(RedirectSettings { url: url.into() })
    }

    pub fn block(reason: Option<&str>) -> Self {
        Action::BlockAccess(BlockAccessSettings {
            reason: reason.map(str::to_string),
        })
    }

    pub fn password_gate(password_hash: impl Into<String>, hint: Option<&str>) -> Self {
        Action::PasswordGate(PasswordGateSettings {
            password_hash: password_hash.into(),
            hint: hint.map(str::to_string),
        })
    }

    pub fn notify(webhook_url: Option<&str>, message: Option<&str>) -> Self {
        Action::Notify(NotifySettings {
            webhook_url: webhook_url.map(str::to_string),
            message: message.map(str::to_string),
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Redirect(_) => "redirect",
            Action::BlockAccess(_) => "block_access",
            Action::PasswordGate(_) => "password_gate",
            Action::Notify(_) => "notify",
        }
    }

    /// 第一个缺失的必填设置项（线上字段名）
    pub fn missing_setting(&self) -> Option<&'static str> {
        match self {
            Action::Redirect(settings) if settings.url.trim().is_empty() => Some("url"),
            Action::PasswordGate(settings) if settings.password_hash.trim().is_empty() => {
                Some("passwordHash")
            }
            _ => None,
        }
    }

    /// 去除首尾空白，空的可选项置为 None
    pub fn normalized(&self) -> Self {
        match self {
            Action::Redirect(settings) => Action::redirect(settings.url.trim()),
            Action::BlockAccess(settings) => Action::BlockAccess(BlockAccessSettings {
                reason: trimmed(&settings.reason),
            }),
            Action::PasswordGate(settings) => Action::PasswordGate(PasswordGateSettings {
                password_hash: settings.password_hash.trim().to_string(),
                hint: trimmed(&settings.hint),
            }),
            Action::Notify(settings) => Action::Notify(NotifySettings {
                webhook_url: trimmed(&settings.webhook_url),
                message: trimmed(&settings.message),
            }),
        }
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn default_enabled() -> bool {
    true
}

/// 短链接的条件跳转规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// 规则 ID（规则文件中省略时视为未保存的新规则）
    #[serde(default = "RuleId::draft")]
    pub id: RuleId,

    /// 优先级（同一链接内从 0 开始连续，数字越小越先求值）
    pub priority: u32,

    /// 是否启用
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// 条件组合方式
    #[serde(rename = "match", default)]
    pub match_type: MatchType,

    /// 条件列表
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// 条件满足时执行的动作
    pub action: Action,

    /// 条件不满足时执行的动作
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub else_action: Option<Action>,

    /// 创建时间（服务端维护）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// 更新时间（服务端维护）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            id: RuleId::draft(),
            priority: 0,
            enabled: true,
            match_type: MatchType::And,
            conditions: vec![Condition::Always],
            action: Action::Redirect(RedirectSettings::default()),
            else_action: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Rule {
    /// 去掉 always 占位后的有效条件
    pub fn effective_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(|c| !c.is_always())
    }

    /// 除 ID 和服务端时间戳外的结构比较
    pub fn content_eq(&self, other: &Rule) -> bool {
        RulePayload::from(self) == RulePayload::from(other)
    }
}

/// 创建/更新请求体，不含 ID
///
/// always 占位条件被移除；空的 `conditions` 表示无条件匹配。
/// `elseAction` 总是写出，`null` 用于清除已有的否则动作。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePayload {
    pub priority: u32,
    pub enabled: bool,
    #[serde(rename = "match")]
    pub match_type: MatchType,
    pub conditions: Vec<Condition>,
    pub action: Action,
    #[serde(default)]
    pub else_action: Option<Action>,
}

impl From<&Rule> for RulePayload {
    fn from(rule: &Rule) -> Self {
        Self {
            priority: rule.priority,
            enabled: rule.enabled,
            match_type: rule.match_type,
            conditions: rule
                .effective_conditions()
                .map(Condition::normalized)
                .collect(),
            action: rule.action.normalized(),
            else_action: rule.else_action.as_ref().map(Action::normalized),
        }
    }
}

impl RulePayload {
    pub fn into_rule(self, id: RuleId, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Rule {
        Rule {
            id,
            priority: self.priority,
            enabled: self.enabled,
            match_type: self.match_type,
            conditions: self.conditions,
            action: self.action,
            else_action: self.else_action,
            created_at: Some(created_at),
            updated_at: Some(updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::SetOperator;
    use serde_json::json;

    #[test]
    fn test_rule_default() {
        let rule = Rule::default();
        assert!(rule.id.is_draft());
        assert!(rule.enabled);
        assert_eq!(rule.match_type, MatchType::And);
        assert_eq!(rule.conditions, vec![Condition::Always]);
    }

    #[test]
    fn test_rule_id_wire_forms() {
        let draft = RuleId::draft();
        assert_eq!(RuleId::parse(&draft.to_string()), draft);
        assert_eq!(RuleId::parse("42"), RuleId::persisted("42"));
        assert_eq!(RuleId::parse("draft-not-a-uuid"), RuleId::persisted("draft-not-a-uuid"));

        let numeric: RuleId = serde_json::from_value(json!(17)).unwrap();
        assert_eq!(numeric, RuleId::persisted("17"));
        assert_eq!(serde_json::to_value(RuleId::persisted("abc")).unwrap(), json!("abc"));
    }

    #[test]
    fn test_rule_from_wire() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "r1",
            "priority": 0,
            "enabled": true,
            "match": "OR",
            "conditions": [{"field": "country", "operator": "in", "value": ["FR"]}],
            "action": {"type": "redirect", "settings": {"url": "https://example.fr"}},
            "elseAction": null,
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(rule.id, RuleId::persisted("r1"));
        assert_eq!(rule.match_type, MatchType::Or);
        assert_eq!(rule.action, Action::redirect("https://example.fr"));
        assert!(rule.else_action.is_none());
        assert!(rule.created_at.is_some());
    }

    #[test]
    fn test_rule_without_id_is_draft() {
        let rule: Rule = serde_json::from_value(json!({
            "priority": 2,
            "action": {"type": "block_access", "settings": {}}
        }))
        .unwrap();

        assert!(rule.id.is_draft());
        assert!(rule.enabled);
        assert!(rule.conditions.is_empty());
        assert_eq!(rule.action, Action::block(None));
    }

    #[test]
    fn test_action_wire_shape() {
        let action = Action::password_gate("abc123", Some("pet name"));
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"type": "password_gate", "settings": {"passwordHash": "abc123", "hint": "pet name"}})
        );

        let action: Action = serde_json::from_value(json!({
            "type": "notify",
            "settings": {"webhookUrl": "https://hooks.example.com/x"}
        }))
        .unwrap();
        assert_eq!(action, Action::notify(Some("https://hooks.example.com/x"), None));
    }

    #[test]
    fn test_missing_setting() {
        assert_eq!(Action::redirect("  ").missing_setting(), Some("url"));
        assert_eq!(Action::password_gate("", None).missing_setting(), Some("passwordHash"));
        assert_eq!(Action::block(None).missing_setting(), None);
        assert_eq!(Action::notify(None, None).missing_setting(), None);
    }

    #[test]
    fn test_payload_strips_always_and_normalizes() {
        let rule = Rule {
            id: RuleId::persisted("r1"),
            conditions: vec![
                Condition::Always,
                Condition::Country {
                    operator: SetOperator::In,
                    codes: vec![" us".to_string(), "mx ".to_string()],
                },
            ],
            action: Action::redirect(" https://example.com "),
            else_action: Some(Action::block(Some("  "))),
            ..Default::default()
        };

        let payload = RulePayload::from(&rule);
        assert_eq!(
            payload.conditions,
            vec![Condition::Country {
                operator: SetOperator::In,
                codes: vec!["US".to_string(), "MX".to_string()],
            }]
        );
        assert_eq!(payload.action, Action::redirect("https://example.com"));
        assert_eq!(payload.else_action, Some(Action::block(None)));

        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["match"], json!("AND"));
    }

    #[test]
    fn test_only_always_serializes_as_empty_conditions() {
        let rule = Rule {
            action: Action::redirect("https://example.com"),
            ..Default::default()
        };
        let value = serde_json::to_value(RulePayload::from(&rule)).unwrap();
        assert_eq!(value["conditions"], json!([]));
        assert_eq!(value["elseAction"], json!(null));
    }

    #[test]
    fn test_content_eq_ignores_id_timestamps_and_sentinels() {
        let a = Rule {
            id: RuleId::persisted("1"),
            action: Action::redirect("https://a.example"),
            conditions: vec![Condition::Always],
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        let b = Rule {
            id: RuleId::persisted("2"),
            conditions: Vec::new(),
            created_at: None,
            ..a.clone()
        };
        assert!(a.content_eq(&b));

        let c = Rule {
            priority: 1,
            ..a.clone()
        };
        assert!(!a.content_eq(&c));
    }
}
