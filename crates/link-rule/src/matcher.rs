use crate::context::RequestContext;
use crate::evaluator::evaluate;
use crate::model::{MatchType, Rule};

/// 按规则的组合方式合并各条件的结果
///
/// 去掉 always 占位后没有有效条件的规则无条件匹配。
pub fn matches(rule: &Rule, ctx: &RequestContext) -> bool {
    let mut conditions = rule.effective_conditions().peekable();
    if conditions.peek().is_none() {
        return true;
    }

    match rule.match_type {
        MatchType::And => conditions.all(|condition| evaluate(condition, ctx)),
        MatchType::Or => conditions.any(|condition| evaluate(condition, ctx)),
    }
}
