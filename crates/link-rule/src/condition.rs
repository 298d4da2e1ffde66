use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::context::DeviceClass;
use crate::normalize::{format_country_codes, normalize_code_list, normalize_country_codes};

/// 条件字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Always,
    Country,
    Device,
    Ip,
    IsBot,
    IsVpn,
    Date,
    AccessCount,
}

impl ConditionField {
    pub const ALL: [ConditionField; 8] = [
        ConditionField::Always,
        ConditionField::Country,
        ConditionField::Device,
        ConditionField::Ip,
        ConditionField::IsBot,
        ConditionField::IsVpn,
        ConditionField::Date,
        ConditionField::AccessCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionField::Always => "always",
            ConditionField::Country => "country",
            ConditionField::Device => "device",
            ConditionField::Ip => "ip",
            ConditionField::IsBot => "is_bot",
            ConditionField::IsVpn => "is_vpn",
            ConditionField::Date => "date",
            ConditionField::AccessCount => "access_count",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == value)
    }

    /// 该字段允许的操作符，第一个为编辑器默认值
    pub fn operators(&self) -> &'static [&'static str] {
        match self {
            ConditionField::Always => &["equals"],
            ConditionField::Country => &["in", "not_in"],
            ConditionField::Device | ConditionField::Ip => &["equals", "not_equals"],
            ConditionField::IsBot | ConditionField::IsVpn => &["equals"],
            ConditionField::Date => &["before", "after"],
            ConditionField::AccessCount => &["equals", "greater_than", "less_than"],
        }
    }
}

impl fmt::Display for ConditionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 集合操作符（国家）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOperator {
    In,
    NotIn,
}

impl SetOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetOperator::In => "in",
            SetOperator::NotIn => "not_in",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in" => Some(SetOperator::In),
            "not_in" => Some(SetOperator::NotIn),
            _ => None,
        }
    }
}

/// 相等操作符（设备、IP）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityOperator {
    Equals,
    NotEquals,
}

impl EqualityOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            EqualityOperator::Equals => "equals",
            EqualityOperator::NotEquals => "not_equals",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "equals" => Some(EqualityOperator::Equals),
            "not_equals" => Some(EqualityOperator::NotEquals),
            _ => None,
        }
    }
}

/// 日期操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOperator {
    Before,
    After,
}

impl DateOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateOperator::Before => "before",
            DateOperator::After => "after",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "before" => Some(DateOperator::Before),
            "after" => Some(DateOperator::After),
            _ => None,
        }
    }
}

/// 计数操作符（访问次数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountOperator {
    Equals,
    GreaterThan,
    LessThan,
}

impl CountOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountOperator::Equals => "equals",
            CountOperator::GreaterThan => "greater_than",
            CountOperator::LessThan => "less_than",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "equals" => Some(CountOperator::Equals),
            "greater_than" => Some(CountOperator::GreaterThan),
            "less_than" => Some(CountOperator::LessThan),
            _ => None,
        }
    }
}

/// 规则条件
///
/// 每个字段一个变体，操作符按字段区分类型。值缺失（编辑器刚创建、
/// 用户尚未填写）用 `None` / 空列表 / 空字符串表示，由校验阶段报告。
/// 无法解码的线上条件保存为 `Unrecognized`，求值恒为 false，
/// 序列化时原样写回。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCondition", into = "RawCondition")]
pub enum Condition {
    /// 无条件匹配的占位条件，持久化前会被移除
    Always,

    Country {
        operator: SetOperator,
        codes: Vec<String>,
    },

    Device {
        operator: EqualityOperator,
        device: Option<DeviceClass>,
    },

    /// 精确字符串比较，不支持 CIDR
    Ip {
        operator: EqualityOperator,
        address: String,
    },

    IsBot {
        expected: Option<bool>,
    },

    IsVpn {
        expected: Option<bool>,
    },

    Date {
        operator: DateOperator,
        instant: Option<DateTime<Utc>>,
    },

    AccessCount {
        operator: CountOperator,
        count: Option<u64>,
    },

    Unrecognized {
        field: String,
        operator: String,
        value: Value,
    },
}

impl Condition {
    /// 编辑器选中某个字段时的默认条件
    pub fn blank(field: ConditionField) -> Self {
        match field {
            ConditionField::Always => Condition::Always,
            ConditionField::Country => Condition::Country {
                operator: SetOperator::In,
                codes: Vec::new(),
            },
            ConditionField::Device => Condition::Device {
                operator: EqualityOperator::Equals,
                device: None,
            },
            ConditionField::Ip => Condition::Ip {
                operator: EqualityOperator::Equals,
                address: String::new(),
            },
            ConditionField::IsBot => Condition::IsBot { expected: None },
            ConditionField::IsVpn => Condition::IsVpn { expected: None },
            ConditionField::Date => Condition::Date {
                operator: DateOperator::Before,
                instant: None,
            },
            ConditionField::AccessCount => Condition::AccessCount {
                operator: CountOperator::Equals,
                count: None,
            },
        }
    }

    /// 从编辑框的逗号分隔输入构造国家条件
    pub fn country_from_input(operator: SetOperator, input: &str) -> Self {
        Condition::Country {
            operator,
            codes: normalize_country_codes(input),
        }
    }

    /// 国家条件在编辑框中的显示值
    pub fn country_input(&self) -> Option<String> {
        match self {
            Condition::Country { codes, .. } => Some(format_country_codes(codes)),
            _ => None,
        }
    }

    /// 条件字段，无法识别的条件返回 None
    pub fn field(&self) -> Option<ConditionField> {
        match self {
            Condition::Always => Some(ConditionField::Always),
            Condition::Country { .. } => Some(ConditionField::Country),
            Condition::Device { .. } => Some(ConditionField::Device),
            Condition::Ip { .. } => Some(ConditionField::Ip),
            Condition::IsBot { .. } => Some(ConditionField::IsBot),
            Condition::IsVpn { .. } => Some(ConditionField::IsVpn),
            Condition::Date { .. } => Some(ConditionField::Date),
            Condition::AccessCount { .. } => Some(ConditionField::AccessCount),
            Condition::Unrecognized { .. } => None,
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Condition::Always)
    }

    /// 条件值是否已经填写
    pub fn has_value(&self) -> bool {
        match self {
            Condition::Always | Condition::Unrecognized { .. } => true,
            Condition::Country { codes, .. } => !codes.is_empty(),
            Condition::Device { device, .. } => device.is_some(),
            Condition::Ip { address, .. } => !address.trim().is_empty(),
            Condition::IsBot { expected } | Condition::IsVpn { expected } => expected.is_some(),
            Condition::Date { instant, .. } => instant.is_some(),
            Condition::AccessCount { count, .. } => count.is_some(),
        }
    }

    /// 持久化前的规范化形式
    pub fn normalized(&self) -> Self {
        match self {
            Condition::Country { operator, codes } => Condition::Country {
                operator: *operator,
                codes: normalize_code_list(codes),
            },
            Condition::Ip { operator, address } => Condition::Ip {
                operator: *operator,
                address: address.trim().to_string(),
            },
            other => other.clone(),
        }
    }
}

/// 线上的条件格式 `{field, operator, value}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCondition {
    pub field: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl From<RawCondition> for Condition {
    fn from(raw: RawCondition) -> Self {
        match decode(&raw) {
            Some(condition) => condition,
            None => Condition::Unrecognized {
                field: raw.field,
                operator: raw.operator,
                value: raw.value,
            },
        }
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        let (field, operator, value) = match condition {
            Condition::Always => (ConditionField::Always, "equals", Value::Null),
            Condition::Country { operator, codes } => (
                ConditionField::Country,
                operator.as_str(),
                Value::Array(codes.into_iter().map(Value::String).collect()),
            ),
            Condition::Device { operator, device } => (
                ConditionField::Device,
                operator.as_str(),
                device.map_or(Value::Null, |d| Value::from(d.as_str())),
            ),
            Condition::Ip { operator, address } => {
                (ConditionField::Ip, operator.as_str(), Value::String(address))
            }
            Condition::IsBot { expected } => (
                ConditionField::IsBot,
                "equals",
                expected.map_or(Value::Null, Value::Bool),
            ),
            Condition::IsVpn { expected } => (
                ConditionField::IsVpn,
                "equals",
                expected.map_or(Value::Null, Value::Bool),
            ),
            Condition::Date { operator, instant } => (
                ConditionField::Date,
                operator.as_str(),
                instant.map_or(Value::Null, |i| {
                    Value::String(i.to_rfc3339_opts(SecondsFormat::Millis, true))
                }),
            ),
            Condition::AccessCount { operator, count } => (
                ConditionField::AccessCount,
                operator.as_str(),
                count.map_or(Value::Null, Value::from),
            ),
            Condition::Unrecognized {
                field,
                operator,
                value,
            } => {
                return RawCondition {
                    field,
                    operator,
                    value,
                }
            }
        };

        RawCondition {
            field: field.as_str().to_string(),
            operator: operator.to_string(),
            value,
        }
    }
}

fn decode(raw: &RawCondition) -> Option<Condition> {
    let field = ConditionField::parse(&raw.field)?;
    let operator = raw.operator.as_str();
    let value = &raw.value;

    let condition = match field {
        // always 的操作符和值没有意义
        ConditionField::Always => Condition::Always,
        ConditionField::Country => Condition::Country {
            operator: SetOperator::parse(operator)?,
            codes: decode_country(value)?,
        },
        ConditionField::Device => Condition::Device {
            operator: EqualityOperator::parse(operator)?,
            device: decode_device(value)?,
        },
        ConditionField::Ip => Condition::Ip {
            operator: EqualityOperator::parse(operator)?,
            address: decode_text(value)?,
        },
        ConditionField::IsBot => {
            expect_equals(operator)?;
            Condition::IsBot {
                expected: decode_flag(value)?,
            }
        }
        ConditionField::IsVpn => {
            expect_equals(operator)?;
            Condition::IsVpn {
                expected: decode_flag(value)?,
            }
        }
        ConditionField::Date => Condition::Date {
            operator: DateOperator::parse(operator)?,
            instant: decode_instant(value)?,
        },
        ConditionField::AccessCount => Condition::AccessCount {
            operator: CountOperator::parse(operator)?,
            count: decode_count(value)?,
        },
    };

    Some(condition)
}

fn expect_equals(operator: &str) -> Option<()> {
    (operator == "equals").then_some(())
}

fn decode_country(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::String(text) => Some(normalize_country_codes(text)),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str())
            .collect::<Option<Vec<_>>>()
            .map(|codes| normalize_code_list(&codes)),
        _ => None,
    }
}

fn decode_device(value: &Value) -> Option<Option<DeviceClass>> {
    match value {
        Value::Null => Some(None),
        Value::String(text) if text.trim().is_empty() => Some(None),
        Value::String(text) => DeviceClass::parse(text).map(Some),
        _ => None,
    }
}

fn decode_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}

fn decode_flag(value: &Value) -> Option<Option<bool>> {
    match value {
        Value::Null => Some(None),
        Value::Bool(flag) => Some(Some(*flag)),
        Value::String(text) => match text.trim() {
            "" => Some(None),
            "true" => Some(Some(true)),
            "false" => Some(Some(false)),
            _ => None,
        },
        _ => None,
    }
}

fn decode_instant(value: &Value) -> Option<Option<DateTime<Utc>>> {
    match value {
        Value::Null => Some(None),
        Value::String(text) if text.trim().is_empty() => Some(None),
        Value::String(text) => parse_instant(text.trim()).map(Some),
        _ => None,
    }
}

/// 接受 RFC 3339，以及日期选择器产生的不带时区的本地格式（按 UTC 处理）
fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

fn decode_count(value: &Value) -> Option<Option<u64>> {
    match value {
        Value::Null => Some(None),
        Value::Number(number) => number.as_u64().map(Some),
        Value::String(text) if text.trim().is_empty() => Some(None),
        Value::String(text) => text.trim().parse::<u64>().ok().map(Some),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn decode_json(value: Value) -> Condition {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_country_array_normalizes() {
        let condition = decode_json(json!({
            "field": "country",
            "operator": "in",
            "value": [" fr", "de "]
        }));

        assert_eq!(
            condition,
            Condition::Country {
                operator: SetOperator::In,
                codes: vec!["FR".to_string(), "DE".to_string()],
            }
        );
    }

    #[test]
    fn test_decode_country_legacy_string() {
        let condition = decode_json(json!({
            "field": "country",
            "operator": "not_in",
            "value": "us, mx , ca"
        }));

        assert_eq!(condition.country_input().as_deref(), Some("US, MX, CA"));
    }

    #[test]
    fn test_country_serializes_as_array() {
        let condition = Condition::country_from_input(SetOperator::In, "us, mx , ca");
        let value = serde_json::to_value(&condition).unwrap();

        assert_eq!(
            value,
            json!({"field": "country", "operator": "in", "value": ["US", "MX", "CA"]})
        );
    }

    #[test]
    fn test_decode_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();

        for text in ["2024-06-01T09:30:00Z", "2024-06-01T11:30:00+02:00", "2024-06-01T09:30"] {
            let condition = decode_json(json!({
                "field": "date",
                "operator": "after",
                "value": text
            }));
            assert_eq!(
                condition,
                Condition::Date {
                    operator: DateOperator::After,
                    instant: Some(expected),
                },
                "failed for {text}"
            );
        }
    }

    #[test]
    fn test_decode_access_count() {
        let condition = decode_json(json!({
            "field": "access_count",
            "operator": "greater_than",
            "value": "10"
        }));

        assert_eq!(
            condition,
            Condition::AccessCount {
                operator: CountOperator::GreaterThan,
                count: Some(10),
            }
        );
    }

    #[test]
    fn test_missing_values_stay_representable() {
        let condition = decode_json(json!({"field": "ip", "operator": "equals", "value": null}));
        assert!(!condition.has_value());

        let condition = decode_json(json!({"field": "is_bot", "operator": "equals"}));
        assert_eq!(condition, Condition::IsBot { expected: None });
        assert!(!condition.has_value());
    }

    #[test]
    fn test_bad_pairing_is_unrecognized() {
        let raw = json!({"field": "country", "operator": "greater_than", "value": ["FR"]});
        let condition = decode_json(raw.clone());

        assert!(matches!(condition, Condition::Unrecognized { .. }));
        assert_eq!(condition.field(), None);
        // 原样写回
        assert_eq!(serde_json::to_value(&condition).unwrap(), raw);
    }

    #[test]
    fn test_unknown_device_is_unrecognized() {
        let condition = decode_json(json!({"field": "device", "operator": "equals", "value": "watch"}));
        assert!(matches!(condition, Condition::Unrecognized { .. }));

        let condition = decode_json(json!({"field": "access_count", "operator": "equals", "value": -1}));
        assert!(matches!(condition, Condition::Unrecognized { .. }));
    }

    #[test]
    fn test_always_ignores_operator_and_value() {
        let condition = decode_json(json!({"field": "always", "operator": "whatever", "value": 42}));
        assert!(condition.is_always());
    }

    #[test]
    fn test_blank_uses_first_operator() {
        for field in ConditionField::ALL {
            let raw = RawCondition::from(Condition::blank(field));
            assert_eq!(raw.field, field.as_str());
            assert_eq!(raw.operator, field.operators()[0]);
        }
    }

    #[test]
    fn test_date_serializes_like_iso_string() {
        let condition = Condition::Date {
            operator: DateOperator::Before,
            instant: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
        };
        let raw = RawCondition::from(condition);
        assert_eq!(raw.value, json!("2025-01-01T00:00:00.000Z"));
    }
}
