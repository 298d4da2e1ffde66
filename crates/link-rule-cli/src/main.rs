mod commands;
mod rules_file;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use link_rule::DeviceClass;
use link_rule_config::ConfigLoader;
use link_rule_logging::init_logging;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(author, version, about = "Short link redirect rule tool")]
struct Cli {
    /// 配置目录（读取其中的 link-rule.toml）
    #[arg(long, default_value = "./config")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 对一次访问求值
    Evaluate(EvaluateArgs),
    /// 按套餐上限校验规则文件
    Validate(ValidateArgs),
    /// 比较两个规则文件，输出保存时会发出的操作
    Diff(DiffArgs),
    /// 将规则文件同步到规则存储
    Sync(SyncArgs),
    /// 输出生效的配置
    Config,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub rules: PathBuf,

    #[arg(long)]
    pub long_url: String,

    #[arg(long)]
    pub country: Option<String>,

    #[arg(long, value_parser = parse_device)]
    pub device: Option<DeviceClass>,

    #[arg(long)]
    pub ip: Option<String>,

    #[arg(long)]
    pub bot: bool,

    #[arg(long)]
    pub vpn: bool,

    /// 访问时间（RFC 3339），默认当前时间
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// 本次之前的访问次数
    #[arg(long, default_value_t = 0)]
    pub prior_count: u64,

    /// 同时输出每条规则的求值过程
    #[arg(long)]
    pub explain: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(long)]
    pub rules: PathBuf,

    #[arg(long)]
    pub plan: Option<String>,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    #[arg(long)]
    pub original: PathBuf,

    #[arg(long)]
    pub local: PathBuf,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[arg(long)]
    pub link: String,

    #[arg(long)]
    pub rules: PathBuf,

    #[arg(long)]
    pub plan: Option<String>,

    /// 只输出保存计划，不发出请求
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_device(value: &str) -> Result<DeviceClass, String> {
    DeviceClass::parse(value).ok_or_else(|| format!("unknown device class: {}", value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = ConfigLoader::new(&cli.config).validate()?;
    init_logging(&config.logging)?;
    debug!(service = %config.service.name, backend = ?config.store.backend, "Configuration loaded");

    match cli.command {
        Command::Evaluate(args) => commands::evaluate(args),
        Command::Validate(args) => commands::validate_rules(&config, args),
        Command::Diff(args) => commands::diff(args),
        Command::Sync(args) => commands::sync(&config, args).await,
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
