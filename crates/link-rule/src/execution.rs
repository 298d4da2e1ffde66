use serde::{Deserialize, Serialize};

use crate::model::{Action, RuleId};

/// 命中规则时走的分支
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// 条件满足，执行 action
    Matched,

    /// 条件不满足，执行 elseAction
    Else,
}

/// 一次访问的求值结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    /// 某条规则给出了终止结果
    Rule {
        rule_id: RuleId,
        priority: u32,
        branch: Branch,
        action: Action,
    },

    /// 没有规则给出终止结果，直接跳转到原始长链接
    Default { url: String },
}

impl Decision {
    pub fn action(&self) -> Option<&Action> {
        match self {
            Decision::Rule { action, .. } => Some(action),
            Decision::Default { .. } => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Decision::Default { .. })
    }

    /// 结果为跳转时的目标地址
    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            Decision::Default { url } => Some(url),
            Decision::Rule {
                action: Action::Redirect(settings),
                ..
            } => Some(&settings.url),
            Decision::Rule { .. } => None,
        }
    }
}

/// 规则在一次求值中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStep {
    Disabled,
    Matched,
    ElseTaken,
    FellThrough,
    /// 更高优先级的规则已经给出终止结果
    NotReached,
}

/// 求值过程记录（调试用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTrace {
    pub rule_id: RuleId,
    pub priority: u32,
    pub step: TraceStep,
}
