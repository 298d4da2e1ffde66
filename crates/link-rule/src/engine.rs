use tracing::debug;

use crate::context::RequestContext;
use crate::execution::{Branch, Decision, RuleTrace, TraceStep};
use crate::matcher::matches;
use crate::model::Rule;

/// 规则引擎
///
/// 按链接构造一次，构造时按优先级排序。求值只读、无副作用，
/// 可以放在 `Arc` 里被并发访问共享。
#[derive(Debug, Clone)]
pub struct RuleEngine {
    /// 原始长链接，没有终止结果时跳转到这里
    long_url: String,

    /// 按优先级升序排列的规则
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new(long_url: impl Into<String>, mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(|rule| rule.priority);

        Self {
            long_url: long_url.into(),
            rules,
        }
    }

    pub fn long_url(&self) -> &str {
        &self.long_url
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// 为一次访问选出要执行的动作
    ///
    /// 依次处理启用的规则：条件满足执行 action 并停止；不满足但有
    /// elseAction 则执行 elseAction 并停止；否则继续下一条。
    pub fn decide(&self, ctx: &RequestContext) -> Decision {
        for rule in self.rules.iter().filter(|rule| rule.enabled) {
            if let Some(branch) = Self::step(rule, ctx) {
                let action = match (branch, &rule.else_action) {
                    (Branch::Else, Some(else_action)) => else_action.clone(),
                    _ => rule.action.clone(),
                };

                debug!(
                    rule_id = %rule.id,
                    priority = rule.priority,
                    branch = ?branch,
                    action = action.type_name(),
                    "Rule produced terminal result"
                );

                return Decision::Rule {
                    rule_id: rule.id.clone(),
                    priority: rule.priority,
                    branch,
                    action,
                };
            }
        }

        debug!(rules = self.rules.len(), "No terminal rule, using default redirect");

        Decision::Default {
            url: self.long_url.clone(),
        }
    }

    /// 演练一次求值，返回每条规则的处理情况
    pub fn explain(&self, ctx: &RequestContext) -> Vec<RuleTrace> {
        let mut decided = false;

        self.rules
            .iter()
            .map(|rule| {
                let step = if decided {
                    TraceStep::NotReached
                } else if !rule.enabled {
                    TraceStep::Disabled
                } else {
                    match Self::step(rule, ctx) {
                        Some(Branch::Matched) => TraceStep::Matched,
                        Some(Branch::Else) => TraceStep::ElseTaken,
                        None => TraceStep::FellThrough,
                    }
                };

                if matches!(step, TraceStep::Matched | TraceStep::ElseTaken) {
                    decided = true;
                }

                RuleTrace {
                    rule_id: rule.id.clone(),
                    priority: rule.priority,
                    step,
                }
            })
            .collect()
    }

    /// 单条启用规则的终止分支，None 表示落到下一条
    fn step(rule: &Rule, ctx: &RequestContext) -> Option<Branch> {
        if matches(rule, ctx) {
            Some(Branch::Matched)
        } else if rule.else_action.is_some() {
            Some(Branch::Else)
        } else {
            None
        }
    }
}
