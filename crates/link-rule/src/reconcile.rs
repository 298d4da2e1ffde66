use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{StoreError, ValidationError};
use crate::limits::{LimitPolicy, PlanLimits};
use crate::model::{Rule, RuleId, RulePayload};
use crate::storage::RuleStore;
use crate::validation::validate;
use crate::working_copy::WorkingCopy;

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// 一次保存要发出的单个存储调用
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create { local_id: RuleId, payload: RulePayload },
    Update { rule_id: RuleId, payload: RulePayload },
    Delete { rule_id: RuleId },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create { .. } => OperationKind::Create,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Delete { .. } => OperationKind::Delete,
        }
    }

    pub fn rule_id(&self) -> &RuleId {
        match self {
            Operation::Create { local_id, .. } => local_id,
            Operation::Update { rule_id, .. } | Operation::Delete { rule_id } => rule_id,
        }
    }
}

/// 校验通过的保存计划
///
/// 新建 = 本地有而快照中没有的 ID；更新 = 两边都有但内容不同
/// （包括拖动排序造成的优先级变化）；删除 = 快照有而本地没有。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavePlan {
    pub creates: Vec<Operation>,
    pub updates: Vec<Operation>,
    pub deletes: Vec<Operation>,
}

impl SavePlan {
    /// 校验整个工作副本，通过后计算差异
    pub fn prepare(committed: &[Rule], local: &[Rule], policy: &LimitPolicy) -> Result<Self, ValidationError> {
        validate(local, policy)?;
        Ok(Self::diff(committed, local))
    }

    /// 纯差异计算，不做校验
    pub fn diff(committed: &[Rule], local: &[Rule]) -> Self {
        let original: HashMap<&RuleId, &Rule> = committed.iter().map(|rule| (&rule.id, rule)).collect();
        let mut plan = SavePlan::default();

        for rule in local {
            match original.get(&rule.id) {
                None => plan.creates.push(Operation::Create {
                    local_id: rule.id.clone(),
                    payload: RulePayload::from(rule),
                }),
                Some(before) if !before.content_eq(rule) => plan.updates.push(Operation::Update {
                    rule_id: rule.id.clone(),
                    payload: RulePayload::from(rule),
                }),
                Some(_) => {}
            }
        }

        let kept: HashSet<&RuleId> = local.iter().map(|rule| &rule.id).collect();
        plan.deletes = committed
            .iter()
            .filter(|rule| !kept.contains(&rule.id))
            .map(|rule| Operation::Delete {
                rule_id: rule.id.clone(),
            })
            .collect();

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    /// 发出顺序：先删除，再更新，最后新建
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.deletes
            .iter()
            .chain(self.updates.iter())
            .chain(self.creates.iter())
    }
}

/// 单个操作的结果
#[derive(Debug)]
pub struct OperationOutcome {
    pub kind: OperationKind,

    /// 新建时为本地临时 ID，其余为服务端 ID
    pub rule_id: RuleId,

    /// 新建/更新成功时为服务端返回的规则
    pub result: Result<Option<Rule>, StoreError>,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// 一次保存的结果
///
/// 各操作之间没有事务，失败不会回滚已经成功的操作；调用方应在保存后
/// 重新拉取服务端状态。
#[derive(Debug)]
pub struct SaveReport {
    pub link_id: String,
    pub outcomes: Vec<OperationOutcome>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(OperationOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_success()).count()
    }
}

/// 将工作副本同步到规则存储
pub struct RuleSetReconciler {
    store: Arc<dyn RuleStore>,
}

impl RuleSetReconciler {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }

    /// 拉取服务端状态，得到新的工作副本
    pub async fn load(&self, link_id: &str, limits: PlanLimits) -> Result<WorkingCopy, StoreError> {
        let rules = self.store.list(link_id).await?;
        Ok(WorkingCopy::new(link_id, rules, limits))
    }

    /// 重新拉取服务端状态并作为工作副本的新快照
    pub async fn refresh(&self, copy: &mut WorkingCopy) -> Result<(), StoreError> {
        let rules = self.store.list(copy.link_id()).await?;
        copy.commit(rules);
        Ok(())
    }

    /// 校验并保存工作副本
    ///
    /// 校验失败时不发出任何存储调用。
    pub async fn save(&self, copy: &WorkingCopy) -> Result<SaveReport, ValidationError> {
        let plan = SavePlan::prepare(copy.committed(), copy.rules(), copy.policy())?;
        Ok(self.apply(copy.link_id(), &plan).await)
    }

    /// 依次发出保存计划中的操作
    pub async fn apply(&self, link_id: &str, plan: &SavePlan) -> SaveReport {
        info!(
            link_id = %link_id,
            store = self.store.store_type(),
            creates = plan.creates.len(),
            updates = plan.updates.len(),
            deletes = plan.deletes.len(),
            "Saving rule set"
        );

        let mut outcomes = Vec::with_capacity(plan.len());
        for operation in plan.operations() {
            let result = self.execute(link_id, operation).await;
            if let Err(e) = &result {
                warn!(
                    link_id = %link_id,
                    rule_id = %operation.rule_id(),
                    kind = ?operation.kind(),
                    error = %e,
                    "Rule operation failed"
                );
            }

            outcomes.push(OperationOutcome {
                kind: operation.kind(),
                rule_id: operation.rule_id().clone(),
                result,
            });
        }

        let report = SaveReport {
            link_id: link_id.to_string(),
            outcomes,
        };
        info!(
            link_id = %link_id,
            succeeded = report.success_count(),
            failed = report.failures().count(),
            "Rule set saved"
        );
        report
    }

    async fn execute(&self, link_id: &str, operation: &Operation) -> Result<Option<Rule>, StoreError> {
        match operation {
            Operation::Create { payload, .. } => self.store.create(link_id, payload).await.map(Some),
            Operation::Update { rule_id, payload } => {
                let id = persisted_id(rule_id)?;
                self.store.update(link_id, id, payload).await.map(Some)
            }
            Operation::Delete { rule_id } => {
                let id = persisted_id(rule_id)?;
                self.store.delete(link_id, id).await.map(|_| None)
            }
        }
    }
}

fn persisted_id(rule_id: &RuleId) -> Result<&str, StoreError> {
    rule_id
        .as_persisted()
        .ok_or_else(|| StoreError::Unsaved(rule_id.clone()))
}
