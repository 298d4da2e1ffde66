//! 单个条件求值
//!
//! 纯函数，不会失败：值缺失或无法识别的条件一律视为不满足，
//! 一条坏规则不会影响其他流量。

use crate::condition::{Condition, CountOperator, DateOperator, EqualityOperator, SetOperator};
use crate::context::RequestContext;

/// 对请求上下文求值一个条件
pub fn evaluate(condition: &Condition, ctx: &RequestContext) -> bool {
    match condition {
        Condition::Always => true,

        Condition::Country { operator, codes } => {
            if codes.is_empty() {
                return false;
            }
            let listed = ctx
                .country
                .as_deref()
                .map(str::trim)
                .filter(|country| !country.is_empty())
                .is_some_and(|country| {
                    codes
                        .iter()
                        .any(|code| code.trim().eq_ignore_ascii_case(country))
                });
            match operator {
                SetOperator::In => listed,
                SetOperator::NotIn => !listed,
            }
        }

        Condition::Device { operator, device } => {
            let Some(expected) = device else {
                return false;
            };
            let same = ctx.device == Some(*expected);
            match operator {
                EqualityOperator::Equals => same,
                EqualityOperator::NotEquals => !same,
            }
        }

        Condition::Ip { operator, address } => {
            let address = address.trim();
            if address.is_empty() {
                return false;
            }
            let same = ctx.ip.as_deref() == Some(address);
            match operator {
                EqualityOperator::Equals => same,
                EqualityOperator::NotEquals => !same,
            }
        }

        Condition::IsBot { expected } => expected.is_some_and(|flag| ctx.is_bot == flag),

        Condition::IsVpn { expected } => expected.is_some_and(|flag| ctx.is_vpn == flag),

        Condition::Date { operator, instant } => match (operator, instant) {
            (_, None) => false,
            (DateOperator::Before, Some(instant)) => ctx.timestamp < *instant,
            (DateOperator::After, Some(instant)) => ctx.timestamp > *instant,
        },

        // 只比较此前的访问次数，当前请求不计入
        Condition::AccessCount { operator, count } => match count {
            None => false,
            Some(count) => match operator {
                CountOperator::Equals => ctx.prior_access_count == *count,
                CountOperator::GreaterThan => ctx.prior_access_count > *count,
                CountOperator::LessThan => ctx.prior_access_count < *count,
            },
        },

        Condition::Unrecognized { .. } => false,
    }
}
