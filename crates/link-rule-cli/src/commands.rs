use anyhow::{anyhow, bail, Result};
use link_rule::{
    validate, HttpRuleStore, LimitPolicy, MemoryRuleStore, OperationKind, RequestContext,
    RuleEngine, RuleSetReconciler, RuleStore, SavePlan,
};
use link_rule::reorder::sort_by_priority;
use link_rule_config::{LinkRuleConfig, StoreBackend};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::rules_file::read_rules;
use crate::{DiffArgs, EvaluateArgs, SyncArgs, ValidateArgs};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn kind_name(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Create => "create",
        OperationKind::Update => "update",
        OperationKind::Delete => "delete",
    }
}

fn print_plan(plan: &SavePlan) {
    if plan.is_empty() {
        println!("no changes");
        return;
    }
    for operation in plan.operations() {
        println!("{} {}", kind_name(operation.kind()), operation.rule_id());
    }
}

/// 根据配置创建规则存储
pub fn build_store(config: &LinkRuleConfig) -> Result<Arc<dyn RuleStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryRuleStore::new())),
        StoreBackend::Http => {
            let base_url = config
                .store
                .base_url
                .as_deref()
                .ok_or_else(|| anyhow!("store.base_url is required for the http backend"))?;
            let store = HttpRuleStore::new(
                base_url,
                config.store.api_token.clone(),
                config.store.timeout(),
            )?;
            Ok(Arc::new(store))
        }
    }
}

pub fn evaluate(args: EvaluateArgs) -> Result<()> {
    let rules = read_rules(&args.rules)?;
    let engine = RuleEngine::new(args.long_url, rules);

    let mut ctx = RequestContext::new()
        .with_bot(args.bot)
        .with_vpn(args.vpn)
        .with_prior_access_count(args.prior_count);
    if let Some(country) = args.country {
        ctx = ctx.with_country(country);
    }
    if let Some(device) = args.device {
        ctx = ctx.with_device(device);
    }
    if let Some(ip) = args.ip {
        ctx = ctx.with_ip(ip);
    }
    if let Some(at) = args.at {
        ctx = ctx.at(at);
    }

    if args.explain {
        print_json(&engine.explain(&ctx))?;
    }
    print_json(&engine.decide(&ctx))
}

pub fn validate_rules(config: &LinkRuleConfig, args: ValidateArgs) -> Result<()> {
    let mut rules = read_rules(&args.rules)?;
    sort_by_priority(&mut rules);

    let policy = LimitPolicy::new(config.plan_limits(args.plan.as_deref())?);
    validate(&rules, &policy)?;
    println!("{} rules ok", rules.len());
    Ok(())
}

pub fn diff(args: DiffArgs) -> Result<()> {
    let mut original = read_rules(&args.original)?;
    let mut local = read_rules(&args.local)?;
    // 原始文件保留优先级原值，有空洞时会生成更新
    original.sort_by_key(|rule| rule.priority);
    sort_by_priority(&mut local);

    print_plan(&SavePlan::diff(&original, &local));
    Ok(())
}

/// 内存后端每次运行都是空的，真正保存没有意义
fn check_sync_target(config: &LinkRuleConfig, dry_run: bool) -> Result<()> {
    if config.store.backend == StoreBackend::Memory && !dry_run {
        bail!("sync needs a persistent store: set store.backend = \"http\" or pass --dry-run");
    }
    Ok(())
}

pub async fn sync(config: &LinkRuleConfig, args: SyncArgs) -> Result<()> {
    check_sync_target(config, args.dry_run)?;
    let limits = config.plan_limits(args.plan.as_deref())?;
    let reconciler = RuleSetReconciler::new(build_store(config)?);

    let mut copy = reconciler.load(&args.link, limits).await?;
    copy.replace_rules(read_rules(&args.rules)?);

    if args.dry_run {
        let plan = SavePlan::prepare(copy.committed(), copy.rules(), copy.policy())?;
        print_plan(&plan);
        return Ok(());
    }

    let report = reconciler.save(&copy).await?;
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(Some(rule)) => println!(
                "ok {} {} -> {}",
                kind_name(outcome.kind),
                outcome.rule_id,
                rule.id
            ),
            Ok(None) => println!("ok {} {}", kind_name(outcome.kind), outcome.rule_id),
            Err(e) => println!("failed {} {}: {}", kind_name(outcome.kind), outcome.rule_id, e),
        }
    }

    // 部分失败时服务端状态以重新拉取的结果为准
    reconciler.refresh(&mut copy).await?;
    info!(link_id = %args.link, rules = copy.rules().len(), "Rule set refreshed");

    if !report.is_complete() {
        bail!(
            "{} of {} operations failed",
            report.failures().count(),
            report.outcomes.len()
        );
    }
    Ok(())
}
