use thiserror::Error;

use crate::condition::ConditionField;
use crate::model::RuleId;

/// 动作所在分支
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSlot {
    Action,
    ElseAction,
}

impl ActionSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionSlot::Action => "action",
            ActionSlot::ElseAction => "elseAction",
        }
    }
}

/// 保存前的校验错误
///
/// 在任何网络调用之前产生，整个保存被中止。规则序号为工作副本中的
/// 位置（从 0 开始）。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Rule {rule_index}: {} setting `{setting}` is required", .slot.as_str())]
    MissingActionSetting {
        rule_index: usize,
        slot: ActionSlot,
        setting: &'static str,
    },

    #[error("Rule {rule_index}: condition {condition_index} ({field}) has no value")]
    MissingConditionValue {
        rule_index: usize,
        condition_index: usize,
        field: ConditionField,
    },

    #[error("Rule {rule_index}: condition {condition_index} has unsupported field/operator `{field}`/`{operator}`")]
    UnsupportedCondition {
        rule_index: usize,
        condition_index: usize,
        field: String,
        operator: String,
    },

    #[error("Rule limit exceeded: {actual} rules, plan allows {limit} per link")]
    RuleLimitExceeded { limit: usize, actual: usize },

    #[error("Rule {rule_index}: condition limit exceeded: {actual} conditions, plan allows {limit} per rule")]
    ConditionLimitExceeded {
        rule_index: usize,
        limit: usize,
        actual: usize,
    },

    #[error("Rule {rule_index}: priority {found} out of sequence, expected {rule_index}")]
    PriorityOutOfSequence { rule_index: usize, found: u32 },

    #[error("Rule {rule_index}: id {rule_id} already used by rule {first_index}")]
    DuplicateRuleId {
        rule_index: usize,
        first_index: usize,
        rule_id: RuleId,
    },
}

impl ValidationError {
    /// 出错的规则序号；规则数超限时为第一条超出上限的规则
    pub fn rule_index(&self) -> usize {
        match self {
            ValidationError::MissingActionSetting { rule_index, .. }
            | ValidationError::MissingConditionValue { rule_index, .. }
            | ValidationError::UnsupportedCondition { rule_index, .. }
            | ValidationError::ConditionLimitExceeded { rule_index, .. }
            | ValidationError::PriorityOutOfSequence { rule_index, .. }
            | ValidationError::DuplicateRuleId { rule_index, .. } => *rule_index,
            ValidationError::RuleLimitExceeded { limit, .. } => *limit,
        }
    }

    /// 出错的字段路径
    pub fn field(&self) -> String {
        match self {
            ValidationError::MissingActionSetting { slot, setting, .. } => {
                format!("{}.settings.{}", slot.as_str(), setting)
            }
            ValidationError::MissingConditionValue {
                condition_index, ..
            } => format!("conditions[{condition_index}].value"),
            ValidationError::UnsupportedCondition {
                condition_index, ..
            } => format!("conditions[{condition_index}].operator"),
            ValidationError::RuleLimitExceeded { .. } => "rules".to_string(),
            ValidationError::ConditionLimitExceeded { .. } => "conditions".to_string(),
            ValidationError::PriorityOutOfSequence { .. } => "priority".to_string(),
            ValidationError::DuplicateRuleId { .. } => "id".to_string(),
        }
    }
}

/// 编辑工作副本时的错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("Rule not found in working copy: {0}")]
    RuleNotFound(RuleId),

    #[error("Position {position} out of range for {len} rules")]
    PositionOutOfRange { position: usize, len: usize },

    #[error("Condition {index} out of range for rule {rule_id}")]
    ConditionOutOfRange { rule_id: RuleId, index: usize },

    #[error(transparent)]
    Limit(#[from] ValidationError),
}

/// 规则存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Rule not found: {rule_id} (link {link_id})")]
    NotFound { link_id: String, rule_id: String },

    #[error("Rule {0} has not been saved yet")]
    Unsaved(RuleId),

    #[error("Rule store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rule store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
