//! 保存前校验
//!
//! 对整个工作副本做校验，遇到第一个错误即返回；校验通过之前不会发起
//! 任何存储调用。

use std::collections::HashMap;

use crate::condition::Condition;
use crate::error::{ActionSlot, ValidationError};
use crate::limits::LimitPolicy;
use crate::model::{Action, Rule, RuleId};

/// 校验整个规则列表（按工作副本中的顺序）
pub fn validate(rules: &[Rule], policy: &LimitPolicy) -> Result<(), ValidationError> {
    policy.check_rule_count(rules.len())?;
    check_unique_ids(rules)?;

    for (rule_index, rule) in rules.iter().enumerate() {
        validate_rule(rule_index, rule, policy)?;
    }

    Ok(())
}

/// 同一 ID 出现两次会在保存时产生两个针对同一条规则的更新
fn check_unique_ids(rules: &[Rule]) -> Result<(), ValidationError> {
    let mut seen: HashMap<&RuleId, usize> = HashMap::with_capacity(rules.len());
    for (rule_index, rule) in rules.iter().enumerate() {
        if let Some(&first_index) = seen.get(&rule.id) {
            return Err(ValidationError::DuplicateRuleId {
                rule_index,
                first_index,
                rule_id: rule.id.clone(),
            });
        }
        seen.insert(&rule.id, rule_index);
    }
    Ok(())
}

fn validate_rule(rule_index: usize, rule: &Rule, policy: &LimitPolicy) -> Result<(), ValidationError> {
    if rule.priority as usize != rule_index {
        return Err(ValidationError::PriorityOutOfSequence {
            rule_index,
            found: rule.priority,
        });
    }

    policy.check_condition_count(rule_index, rule.effective_conditions().count())?;

    for (condition_index, condition) in rule.conditions.iter().enumerate() {
        validate_condition(rule_index, condition_index, condition)?;
    }

    validate_action(rule_index, ActionSlot::Action, &rule.action)?;
    if let Some(else_action) = &rule.else_action {
        validate_action(rule_index, ActionSlot::ElseAction, else_action)?;
    }

    Ok(())
}

fn validate_condition(
    rule_index: usize,
    condition_index: usize,
    condition: &Condition,
) -> Result<(), ValidationError> {
    if let Condition::Unrecognized {
        field, operator, ..
    } = condition
    {
        return Err(ValidationError::UnsupportedCondition {
            rule_index,
            condition_index,
            field: field.clone(),
            operator: operator.clone(),
        });
    }

    match condition.field() {
        Some(field) if !condition.has_value() => Err(ValidationError::MissingConditionValue {
            rule_index,
            condition_index,
            field,
        }),
        _ => Ok(()),
    }
}

fn validate_action(rule_index: usize, slot: ActionSlot, action: &Action) -> Result<(), ValidationError> {
    match action.missing_setting() {
        Some(setting) => Err(ValidationError::MissingActionSetting {
            rule_index,
            slot,
            setting,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ConditionField, SetOperator};
    use crate::limits::PlanLimits;
    use crate::reorder::reassign_priorities;
    use serde_json::json;

    fn redirect_rule(url: &str) -> Rule {
        Rule {
            action: Action::redirect(url),
            ..Default::default()
        }
    }

    fn numbered(mut rules: Vec<Rule>) -> Vec<Rule> {
        reassign_priorities(&mut rules);
        rules
    }

    fn unlimited() -> LimitPolicy {
        LimitPolicy::new(PlanLimits::unlimited())
    }

    #[test]
    fn test_valid_rules_pass() {
        let rules = numbered(vec![
            redirect_rule("https://a.example"),
            Rule {
                conditions: vec![Condition::country_from_input(SetOperator::In, "fr")],
                action: Action::block(None),
                else_action: Some(Action::notify(None, Some("blocked"))),
                ..Default::default()
            },
        ]);
        assert!(validate(&rules, &unlimited()).is_ok());
    }

    #[test]
    fn test_missing_redirect_url() {
        let rules = numbered(vec![redirect_rule("https://a.example"), redirect_rule("")]);
        let error = validate(&rules, &unlimited()).unwrap_err();
        assert_eq!(error.rule_index(), 1);
        assert_eq!(error.field(), "action.settings.url");
    }

    #[test]
    fn test_missing_else_password_hash() {
        let rules = numbered(vec![Rule {
            else_action: Some(Action::password_gate(" ", Some("hint"))),
            ..redirect_rule("https://a.example")
        }]);
        assert_eq!(
            validate(&rules, &unlimited()),
            Err(ValidationError::MissingActionSetting {
                rule_index: 0,
                slot: ActionSlot::ElseAction,
                setting: "passwordHash",
            })
        );
    }

    #[test]
    fn test_missing_condition_value() {
        let rules = numbered(vec![Rule {
            conditions: vec![
                Condition::country_from_input(SetOperator::In, "fr"),
                Condition::blank(ConditionField::Date),
            ],
            ..redirect_rule("https://a.example")
        }]);
        assert_eq!(
            validate(&rules, &unlimited()),
            Err(ValidationError::MissingConditionValue {
                rule_index: 0,
                condition_index: 1,
                field: ConditionField::Date,
            })
        );
    }

    #[test]
    fn test_unrecognized_condition_rejected() {
        let rules = numbered(vec![Rule {
            conditions: vec![Condition::Unrecognized {
                field: "ip".to_string(),
                operator: "in_cidr".to_string(),
                value: json!("10.0.0.0/8"),
            }],
            ..redirect_rule("https://a.example")
        }]);
        let error = validate(&rules, &unlimited()).unwrap_err();
        assert_eq!(error.field(), "conditions[0].operator");
    }

    #[test]
    fn test_rule_limit() {
        let rules = numbered(vec![
            redirect_rule("https://a.example"),
            redirect_rule("https://b.example"),
            redirect_rule("https://c.example"),
            redirect_rule("https://d.example"),
        ]);
        let policy = LimitPolicy::new(PlanLimits::new(Some(3), None));
        assert_eq!(
            validate(&rules, &policy),
            Err(ValidationError::RuleLimitExceeded { limit: 3, actual: 4 })
        );
        assert!(validate(&rules[..3], &policy).is_ok());
    }

    #[test]
    fn test_condition_limit_ignores_sentinel() {
        let rules = numbered(vec![Rule {
            conditions: vec![
                Condition::Always,
                Condition::country_from_input(SetOperator::In, "fr"),
                Condition::country_from_input(SetOperator::NotIn, "de"),
            ],
            ..redirect_rule("https://a.example")
        }]);
        let policy = LimitPolicy::new(PlanLimits::new(None, Some(2)));
        assert!(validate(&rules, &policy).is_ok());

        let policy = LimitPolicy::new(PlanLimits::new(None, Some(1)));
        assert!(matches!(
            validate(&rules, &policy),
            Err(ValidationError::ConditionLimitExceeded { limit: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn test_duplicate_rule_id_rejected() {
        let mut rules = numbered(vec![
            redirect_rule("https://a.example"),
            redirect_rule("https://b.example"),
            redirect_rule("https://c.example"),
        ]);
        rules[0].id = RuleId::persisted("a");
        rules[1].id = RuleId::persisted("b");
        rules[2].id = RuleId::persisted("a");

        let error = validate(&rules, &unlimited()).unwrap_err();
        assert_eq!(
            error,
            ValidationError::DuplicateRuleId {
                rule_index: 2,
                first_index: 0,
                rule_id: RuleId::persisted("a"),
            }
        );
        assert_eq!(error.field(), "id");

        rules[2].id = RuleId::persisted("c");
        assert!(validate(&rules, &unlimited()).is_ok());
    }

    #[test]
    fn test_priority_sequence() {
        let mut rules = numbered(vec![
            redirect_rule("https://a.example"),
            redirect_rule("https://b.example"),
        ]);
        rules[1].priority = 3;
        assert_eq!(
            validate(&rules, &unlimited()),
            Err(ValidationError::PriorityOutOfSequence {
                rule_index: 1,
                found: 3,
            })
        );
    }
}
