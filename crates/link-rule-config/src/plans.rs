use link_rule::PlanLimits;
use serde::{Deserialize, Serialize};

/// 套餐配置（未设置的上限表示不限）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlanConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rules_per_link: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_conditions_per_rule: Option<usize>,
}

impl PlanConfig {
    /// 值为 0 的上限
    pub fn zero_ceiling(&self) -> Option<&'static str> {
        if self.max_rules_per_link == Some(0) {
            Some("max_rules_per_link")
        } else if self.max_conditions_per_rule == Some(0) {
            Some("max_conditions_per_rule")
        } else {
            None
        }
    }
}

impl From<PlanConfig> for PlanLimits {
    fn from(plan: PlanConfig) -> Self {
        PlanLimits::new(plan.max_rules_per_link, plan.max_conditions_per_rule)
    }
}
