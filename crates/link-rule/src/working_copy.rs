use crate::condition::Condition;
use crate::error::{EditError, ValidationError};
use crate::limits::{LimitPolicy, PlanLimits};
use crate::model::{Action, Rule, RuleId};
use crate::reorder::{move_rule, reassign_priorities};

/// 规则编辑工作副本
///
/// 保存最近一次持久化的快照和本地编辑中的规则列表。快照保留服务端的
/// 优先级原值；所有修改只作用于本地列表，本地优先级始终等于列表位置。
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    link_id: String,
    committed: Vec<Rule>,
    rules: Vec<Rule>,
    policy: LimitPolicy,
}

impl WorkingCopy {
    pub fn new(link_id: impl Into<String>, persisted: Vec<Rule>, limits: PlanLimits) -> Self {
        let committed = snapshot(persisted);

        Self {
            link_id: link_id.into(),
            rules: prepare_for_editing(committed.clone()),
            committed,
            policy: LimitPolicy::new(limits),
        }
    }

    pub fn link_id(&self) -> &str {
        &self.link_id
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn committed(&self) -> &[Rule] {
        &self.committed
    }

    pub fn policy(&self) -> &LimitPolicy {
        &self.policy
    }

    pub fn rule(&self, id: &RuleId) -> Option<&Rule> {
        self.rules.iter().find(|rule| &rule.id == id)
    }

    pub fn position(&self, id: &RuleId) -> Option<usize> {
        self.rules.iter().position(|rule| &rule.id == id)
    }

    pub fn can_add_rule(&self) -> bool {
        self.policy.can_add_rule(self.rules.len())
    }

    pub fn can_add_condition(&self, id: &RuleId) -> bool {
        self.rule(id).is_some_and(|rule| {
            self.policy
                .can_add_condition(rule.effective_conditions().count())
        })
    }

    /// 在末尾添加一条新规则，返回其临时 ID
    pub fn add_rule(&mut self, action: Action) -> Result<RuleId, EditError> {
        if !self.can_add_rule() {
            let limit = self.policy.limits().max_rules_per_link.unwrap_or_default();
            return Err(ValidationError::RuleLimitExceeded {
                limit,
                actual: self.rules.len() + 1,
            }
            .into());
        }

        let rule = Rule {
            id: RuleId::draft(),
            priority: self.rules.len() as u32,
            action,
            ..Default::default()
        };
        let id = rule.id.clone();
        self.rules.push(rule);
        Ok(id)
    }

    pub fn remove_rule(&mut self, id: &RuleId) -> Result<Rule, EditError> {
        let index = self.index_of(id)?;
        let rule = self.rules.remove(index);
        reassign_priorities(&mut self.rules);
        Ok(rule)
    }

    /// 拖动排序
    pub fn move_rule(&mut self, from: usize, to: usize) -> Result<(), EditError> {
        let len = self.rules.len();
        if !move_rule(&mut self.rules, from, to) {
            let position = if from >= len { from } else { to };
            return Err(EditError::PositionOutOfRange { position, len });
        }
        Ok(())
    }

    /// 添加条件；规则只有 always 占位时替换占位
    pub fn add_condition(&mut self, id: &RuleId, condition: Condition) -> Result<(), EditError> {
        let index = self.index_of(id)?;
        let rule = &mut self.rules[index];

        if !condition.is_always() {
            let current = rule.effective_conditions().count();
            if !self.policy.can_add_condition(current) {
                let limit = self
                    .policy
                    .limits()
                    .max_conditions_per_rule
                    .unwrap_or_default();
                return Err(ValidationError::ConditionLimitExceeded {
                    rule_index: index,
                    limit,
                    actual: current + 1,
                }
                .into());
            }
        }

        if rule.conditions.iter().all(Condition::is_always) && !condition.is_always() {
            rule.conditions.clear();
        }
        rule.conditions.push(condition);
        Ok(())
    }

    pub fn set_condition(
        &mut self,
        id: &RuleId,
        index: usize,
        condition: Condition,
    ) -> Result<(), EditError> {
        let rule_index = self.index_of(id)?;
        let rule = &mut self.rules[rule_index];
        let slot = rule
            .conditions
            .get_mut(index)
            .ok_or_else(|| EditError::ConditionOutOfRange {
                rule_id: id.clone(),
                index,
            })?;
        *slot = condition;
        Ok(())
    }

    /// 删除条件；删空后放回 always 占位，保持至少一行
    pub fn remove_condition(&mut self, id: &RuleId, index: usize) -> Result<Condition, EditError> {
        let rule_index = self.index_of(id)?;
        let rule = &mut self.rules[rule_index];
        if index >= rule.conditions.len() {
            return Err(EditError::ConditionOutOfRange {
                rule_id: id.clone(),
                index,
            });
        }

        let removed = rule.conditions.remove(index);
        if rule.conditions.is_empty() {
            rule.conditions.push(Condition::Always);
        }
        Ok(removed)
    }

    /// 修改规则的其他字段（启用、组合方式、动作等）
    ///
    /// ID 和优先级由工作副本管理，修改后会被恢复。
    pub fn update_rule<F>(&mut self, id: &RuleId, f: F) -> Result<(), EditError>
    where
        F: FnOnce(&mut Rule),
    {
        let index = self.index_of(id)?;
        let rule = &mut self.rules[index];
        f(rule);
        rule.id = id.clone();
        rule.priority = index as u32;
        if rule.conditions.is_empty() {
            rule.conditions.push(Condition::Always);
        }
        Ok(())
    }

    /// 用一组新规则整体替换本地列表，快照保持不变
    ///
    /// 与快照 ID 相同的规则在保存时作为更新，其余作为新建；上限在保存时检查。
    pub fn replace_rules(&mut self, rules: Vec<Rule>) {
        self.rules = prepare_for_editing(rules);
    }

    /// 本地是否有未保存的修改
    pub fn is_dirty(&self) -> bool {
        self.rules.len() != self.committed.len()
            || self
                .rules
                .iter()
                .zip(&self.committed)
                .any(|(local, committed)| local.id != committed.id || !local.content_eq(committed))
    }

    /// 放弃所有本地修改，回到最近一次持久化的快照
    pub fn discard(&mut self) {
        self.rules = prepare_for_editing(self.committed.clone());
    }

    /// 采用重新拉取的服务端状态作为新的快照
    pub fn commit(&mut self, persisted: Vec<Rule>) {
        self.committed = snapshot(persisted);
        self.rules = prepare_for_editing(self.committed.clone());
    }

    fn index_of(&self, id: &RuleId) -> Result<usize, EditError> {
        self.position(id)
            .ok_or_else(|| EditError::RuleNotFound(id.clone()))
    }
}

/// 按优先级排序并补上 always 占位，不改动优先级
fn snapshot(mut rules: Vec<Rule>) -> Vec<Rule> {
    rules.sort_by_key(|rule| rule.priority);
    for rule in &mut rules {
        if rule.conditions.is_empty() {
            rule.conditions.push(Condition::Always);
        }
    }
    rules
}

/// 本地列表：在快照的顺序上连续编号
fn prepare_for_editing(rules: Vec<Rule>) -> Vec<Rule> {
    let mut rules = snapshot(rules);
    reassign_priorities(&mut rules);
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ConditionField, SetOperator};
    use crate::model::MatchType;
    use crate::reorder::has_contiguous_priorities;

    fn persisted(id: &str, priority: u32) -> Rule {
        Rule {
            id: RuleId::persisted(id),
            priority,
            conditions: Vec::new(),
            action: Action::redirect(format!("https://{id}.example")),
            ..Default::default()
        }
    }

    fn copy_with(limits: PlanLimits) -> WorkingCopy {
        WorkingCopy::new(
            "link-1",
            vec![persisted("b", 1), persisted("a", 0)],
            limits,
        )
    }

    #[test]
    fn test_new_sorts_and_adds_sentinel() {
        let copy = copy_with(PlanLimits::unlimited());
        let ids: Vec<_> = copy.rules().iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(copy
            .rules()
            .iter()
            .all(|rule| rule.conditions == vec![Condition::Always]));
        assert!(!copy.is_dirty());
    }

    #[test]
    fn test_add_rule_respects_limit() {
        let mut copy = copy_with(PlanLimits::new(Some(3), None));
        let id = copy.add_rule(Action::block(None)).unwrap();
        assert!(id.is_draft());
        assert_eq!(copy.rule(&id).unwrap().priority, 2);
        assert!(!copy.can_add_rule());

        let error = copy.add_rule(Action::block(None)).unwrap_err();
        assert_eq!(
            error,
            EditError::Limit(ValidationError::RuleLimitExceeded { limit: 3, actual: 4 })
        );
        assert_eq!(copy.rules().len(), 3);
    }

    #[test]
    fn test_remove_and_move_keep_priorities_contiguous() {
        let mut copy = copy_with(PlanLimits::unlimited());
        let c = copy.add_rule(Action::block(None)).unwrap();
        copy.move_rule(2, 0).unwrap();
        assert_eq!(copy.position(&c), Some(0));
        assert!(has_contiguous_priorities(copy.rules()));

        copy.remove_rule(&RuleId::persisted("a")).unwrap();
        assert_eq!(copy.rules().len(), 2);
        assert!(has_contiguous_priorities(copy.rules()));

        assert_eq!(
            copy.move_rule(0, 7),
            Err(EditError::PositionOutOfRange { position: 7, len: 2 })
        );
    }

    #[test]
    fn test_add_condition_replaces_sentinel() {
        let mut copy = copy_with(PlanLimits::new(None, Some(2)));
        let id = RuleId::persisted("a");

        copy.add_condition(&id, Condition::country_from_input(SetOperator::In, "fr"))
            .unwrap();
        assert_eq!(copy.rule(&id).unwrap().conditions.len(), 1);

        copy.add_condition(&id, Condition::blank(ConditionField::Device))
            .unwrap();
        assert!(!copy.can_add_condition(&id));

        let error = copy
            .add_condition(&id, Condition::blank(ConditionField::Ip))
            .unwrap_err();
        assert!(matches!(
            error,
            EditError::Limit(ValidationError::ConditionLimitExceeded { rule_index: 0, limit: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_remove_last_condition_restores_sentinel() {
        let mut copy = copy_with(PlanLimits::unlimited());
        let id = RuleId::persisted("a");
        copy.add_condition(&id, Condition::blank(ConditionField::IsBot))
            .unwrap();

        let removed = copy.remove_condition(&id, 0).unwrap();
        assert_eq!(removed, Condition::IsBot { expected: None });
        assert_eq!(copy.rule(&id).unwrap().conditions, vec![Condition::Always]);

        assert_eq!(
            copy.remove_condition(&id, 3),
            Err(EditError::ConditionOutOfRange {
                rule_id: id.clone(),
                index: 3,
            })
        );
    }

    #[test]
    fn test_update_rule_cannot_change_identity() {
        let mut copy = copy_with(PlanLimits::unlimited());
        let id = RuleId::persisted("b");
        copy.update_rule(&id, |rule| {
            rule.id = RuleId::persisted("hijack");
            rule.priority = 9;
            rule.match_type = MatchType::Or;
            rule.enabled = false;
        })
        .unwrap();

        let rule = copy.rule(&id).unwrap();
        assert_eq!(rule.priority, 1);
        assert_eq!(rule.match_type, MatchType::Or);
        assert!(!rule.enabled);
        assert!(copy.is_dirty());
    }

    #[test]
    fn test_discard_reverts_to_snapshot() {
        let mut copy = copy_with(PlanLimits::unlimited());
        copy.add_rule(Action::block(None)).unwrap();
        copy.move_rule(0, 1).unwrap();
        assert!(copy.is_dirty());

        copy.discard();
        assert!(!copy.is_dirty());
        assert_eq!(copy.rules(), copy.committed());
    }

    #[test]
    fn test_gapped_snapshot_needs_renumbering() {
        let copy = WorkingCopy::new(
            "link-1",
            vec![persisted("b", 2), persisted("a", 0)],
            PlanLimits::unlimited(),
        );

        let committed: Vec<_> = copy.committed().iter().map(|r| r.priority).collect();
        assert_eq!(committed, vec![0, 2]);
        assert!(has_contiguous_priorities(copy.rules()));
        assert_eq!(copy.rules()[1].id, RuleId::persisted("b"));
        assert!(copy.is_dirty());
    }

    #[test]
    fn test_discard_renumbers_gapped_snapshot() {
        let mut copy = WorkingCopy::new(
            "link-1",
            vec![persisted("a", 3), persisted("b", 7)],
            PlanLimits::unlimited(),
        );
        copy.remove_rule(&RuleId::persisted("a")).unwrap();

        copy.discard();
        let priorities: Vec<_> = copy.rules().iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![0, 1]);
        assert_eq!(copy.committed()[1].priority, 7);
    }

    #[test]
    fn test_commit_adopts_server_state() {
        let mut copy = copy_with(PlanLimits::unlimited());
        copy.add_rule(Action::block(None)).unwrap();

        copy.commit(vec![persisted("x", 0)]);
        assert!(!copy.is_dirty());
        assert_eq!(copy.rules().len(), 1);
        assert_eq!(copy.rules()[0].id, RuleId::persisted("x"));
    }

    #[test]
    fn test_replace_rules_keeps_snapshot() {
        let mut copy = copy_with(PlanLimits::unlimited());
        copy.replace_rules(vec![
            persisted("z", 9),
            Rule {
                priority: 4,
                conditions: Vec::new(),
                ..Default::default()
            },
            persisted("a", 0),
        ]);

        assert_eq!(copy.committed().len(), 2);
        assert!(has_contiguous_priorities(copy.rules()));
        assert_eq!(copy.rules()[0].id, RuleId::persisted("a"));
        assert!(copy.rules()[1].id.is_draft());
        assert_eq!(copy.rules()[1].conditions, vec![Condition::Always]);
        assert!(copy.is_dirty());
    }

    #[test]
    fn test_unknown_rule() {
        let mut copy = copy_with(PlanLimits::unlimited());
        let missing = RuleId::persisted("nope");
        assert_eq!(
            copy.remove_rule(&missing),
            Err(EditError::RuleNotFound(missing.clone()))
        );
        assert!(!copy.can_add_condition(&missing));
    }
}
