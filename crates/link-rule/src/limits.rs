use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::ValidationError;

/// 套餐上限（None 表示不限）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    /// 每个链接最多的规则数
    #[serde(default)]
    pub max_rules_per_link: Option<usize>,

    /// 每条规则最多的条件数
    #[serde(default)]
    pub max_conditions_per_rule: Option<usize>,
}

impl PlanLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn new(max_rules_per_link: Option<usize>, max_conditions_per_rule: Option<usize>) -> Self {
        Self {
            max_rules_per_link,
            max_conditions_per_rule,
        }
    }
}

/// 套餐上限检查
///
/// 编辑时用 `can_add_*` 阻止继续添加，保存时用 `check_*` 做最终检查。
/// 条件数只统计有效条件（不含 always 占位）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitPolicy {
    limits: PlanLimits,
}

impl LimitPolicy {
    pub fn new(limits: PlanLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> PlanLimits {
        self.limits
    }

    pub fn can_add_rule(&self, current: usize) -> bool {
        self.limits
            .max_rules_per_link
            .map_or(true, |limit| current < limit)
    }

    pub fn can_add_condition(&self, current: usize) -> bool {
        self.limits
            .max_conditions_per_rule
            .map_or(true, |limit| current < limit)
    }

    pub fn check_rule_count(&self, actual: usize) -> Result<(), ValidationError> {
        match self.limits.max_rules_per_link {
            Some(limit) if actual > limit => {
                Err(ValidationError::RuleLimitExceeded { limit, actual })
            }
            _ => Ok(()),
        }
    }

    pub fn check_condition_count(
        &self,
        rule_index: usize,
        actual: usize,
    ) -> Result<(), ValidationError> {
        match self.limits.max_conditions_per_rule {
            Some(limit) if actual > limit => Err(ValidationError::ConditionLimitExceeded {
                rule_index,
                limit,
                actual,
            }),
            _ => Ok(()),
        }
    }
}

/// 套餐上限提供方
#[async_trait]
pub trait PlanLimitsProvider: Send + Sync {
    /// 查询某个身份当前套餐的上限
    async fn limits_for(&self, identity: &str) -> anyhow::Result<PlanLimits>;
}

/// 固定套餐表
#[derive(Debug, Clone, Default)]
pub struct StaticPlanLimits {
    plans: HashMap<String, PlanLimits>,
    assignments: HashMap<String, String>,
    fallback: PlanLimits,
}

impl StaticPlanLimits {
    pub fn new(fallback: PlanLimits) -> Self {
        Self {
            fallback,
            ..Default::default()
        }
    }

    pub fn with_plan(mut self, name: impl Into<String>, limits: PlanLimits) -> Self {
        self.plans.insert(name.into(), limits);
        self
    }

    pub fn assign(mut self, identity: impl Into<String>, plan: impl Into<String>) -> Self {
        self.assignments.insert(identity.into(), plan.into());
        self
    }

    pub fn plan(&self, name: &str) -> Option<PlanLimits> {
        self.plans.get(name).copied()
    }
}

#[async_trait]
impl PlanLimitsProvider for StaticPlanLimits {
    async fn limits_for(&self, identity: &str) -> anyhow::Result<PlanLimits> {
        let Some(plan) = self.assignments.get(identity) else {
            return Ok(self.fallback);
        };

        match self.plans.get(plan) {
            Some(limits) => Ok(*limits),
            None => {
                warn!(identity = %identity, plan = %plan, "Unknown plan, using fallback limits");
                Ok(self.fallback)
            }
        }
    }
}
