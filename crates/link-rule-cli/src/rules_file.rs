use anyhow::{Context, Result};
use link_rule::Rule;
use serde::Deserialize;
use std::path::Path;

/// 规则文件可以是规则数组，也可以是 `{"rules": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum RulesFile {
    Bare(Vec<Rule>),
    Wrapped { rules: Vec<Rule> },
}

pub fn parse_rules(text: &str) -> Result<Vec<Rule>> {
    let file: RulesFile = serde_json::from_str(text)?;
    Ok(match file {
        RulesFile::Bare(rules) | RulesFile::Wrapped { rules } => rules,
    })
}

pub fn read_rules(path: &Path) -> Result<Vec<Rule>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file {}", path.display()))?;
    parse_rules(&text).with_context(|| format!("Invalid rules file {}", path.display()))
}
