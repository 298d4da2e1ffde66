use link_rule::{
    Action, Condition, ConditionField, DeviceClass, EqualityOperator, MemoryRuleStore, PlanLimits,
    RequestContext, RuleEngine, RuleSetReconciler, SetOperator,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("短链接条件跳转规则演示\n");

    let store = Arc::new(MemoryRuleStore::new());
    let reconciler = RuleSetReconciler::new(store.clone());

    println!("{}", "=".repeat(60));
    println!("示例 1: 编辑并保存规则");
    println!("{}", "=".repeat(60));

    let mut copy = reconciler
        .load("promo", PlanLimits::new(Some(3), Some(5)))
        .await?;

    let geo = copy.add_rule(Action::redirect("https://example.fr/promo"))?;
    copy.add_condition(&geo, Condition::country_from_input(SetOperator::In, "fr, be"))?;

    let mobile = copy.add_rule(Action::redirect("https://m.example.com/promo"))?;
    copy.add_condition(
        &mobile,
        Condition::Device {
            operator: EqualityOperator::Equals,
            device: Some(DeviceClass::Mobile),
        },
    )?;

    let bots = copy.add_rule(Action::block(Some("bots not allowed")))?;
    copy.add_condition(&bots, Condition::IsBot { expected: Some(true) })?;

    // 套餐最多 3 条规则
    if let Err(e) = copy.add_rule(Action::block(None)) {
        println!("❌ 无法添加第 4 条规则: {}", e);
    }

    // 爬虫拦截放到最前面
    copy.move_rule(2, 0)?;

    let report = reconciler.save(&copy).await?;
    println!(
        "✅ 保存完成: {} 个操作成功, {} 个失败",
        report.success_count(),
        report.failures().count()
    );
    reconciler.refresh(&mut copy).await?;

    println!("\n{}", "=".repeat(60));
    println!("示例 2: 对访问求值");
    println!("{}", "=".repeat(60));

    let engine = RuleEngine::new("https://example.com/promo", copy.rules().to_vec());
    let visits = [
        ("法国桌面访问", RequestContext::new().with_country("FR").with_device(DeviceClass::Desktop)),
        ("德国手机访问", RequestContext::new().with_country("DE").with_device(DeviceClass::Mobile)),
        ("法国爬虫", RequestContext::new().with_country("FR").with_bot(true)),
        ("美国桌面访问", RequestContext::new().with_country("US").with_device(DeviceClass::Desktop)),
    ];

    for (label, ctx) in visits {
        let decision = engine.decide(&ctx);
        println!("{}: {}", label, serde_json::to_string(&decision)?);
    }

    println!("\n{}", "=".repeat(60));
    println!("示例 3: 编辑器可选操作符");
    println!("{}", "=".repeat(60));

    for field in ConditionField::ALL {
        println!("{:<14} {:?}", field.as_str(), field.operators());
    }

    Ok(())
}
