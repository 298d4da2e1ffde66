use anyhow::{anyhow, Result};
use link_rule::{PlanLimits, StaticPlanLimits};
use link_rule_logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::plans::PlanConfig;

/// 全局配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkRuleConfig {
    /// 未指定套餐时使用；为空表示不限
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_plan: Option<String>,

    pub service: ServiceConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub plans: HashMap<String, PlanConfig>,
}

/// 服务配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "link-rule".to_string(),
        }
    }
}

/// 规则存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Http,
}

/// 规则存储配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            base_url: None,
            api_token: None,
            timeout_secs: 10,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LinkRuleConfig {
    /// 按名称查找套餐上限；未给名称时使用默认套餐
    pub fn plan_limits(&self, name: Option<&str>) -> Result<PlanLimits> {
        match name.or(self.default_plan.as_deref()) {
            None => Ok(PlanLimits::unlimited()),
            Some(name) => self
                .plans
                .get(name)
                .map(|plan| PlanLimits::from(*plan))
                .ok_or_else(|| anyhow!("Unknown plan: {}", name)),
        }
    }

    /// 以默认套餐为回退的套餐表
    pub fn plan_table(&self) -> Result<StaticPlanLimits> {
        let table = self
            .plans
            .iter()
            .fold(StaticPlanLimits::new(self.plan_limits(None)?), |table, (name, plan)| {
                table.with_plan(name.clone(), PlanLimits::from(*plan))
            });
        Ok(table)
    }

    /// 检查配置的一致性
    pub fn validate(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Http {
            let base_url = self.store.base_url.as_deref().map(str::trim).unwrap_or_default();
            if base_url.is_empty() {
                return Err(anyhow!("store.base_url is required for the http backend"));
            }
        }

        if self.store.timeout_secs == 0 {
            return Err(anyhow!("store.timeout_secs must be greater than 0"));
        }

        for (name, plan) in &self.plans {
            if let Some(field) = plan.zero_ceiling() {
                return Err(anyhow!("plans.{}.{} must be greater than 0", name, field));
            }
        }

        if let Some(plan) = &self.default_plan {
            if !self.plans.contains_key(plan) {
                return Err(anyhow!("default_plan ({}) is not defined in plans", plan));
            }
        }

        Ok(())
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
