pub mod condition;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod execution;
pub mod http;
pub mod limits;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod reorder;
pub mod storage;
pub mod validation;
pub mod working_copy;

pub use condition::{
    Condition, ConditionField, CountOperator, DateOperator, EqualityOperator, RawCondition,
    SetOperator,
};
pub use context::{DeviceClass, RequestContext};
pub use engine::RuleEngine;
pub use error::{ActionSlot, EditError, StoreError, ValidationError};
pub use evaluator::evaluate;
pub use execution::{Branch, Decision, RuleTrace, TraceStep};
pub use http::HttpRuleStore;
pub use limits::{LimitPolicy, PlanLimits, PlanLimitsProvider, StaticPlanLimits};
pub use matcher::matches;
pub use model::{
    Action, BlockAccessSettings, MatchType, NotifySettings, PasswordGateSettings, RedirectSettings,
    Rule, RuleId, RulePayload,
};
pub use reconcile::{
    Operation, OperationKind, OperationOutcome, RuleSetReconciler, SavePlan, SaveReport,
};
pub use storage::{MemoryRuleStore, RuleStore};
pub use validation::validate;
pub use working_copy::WorkingCopy;
