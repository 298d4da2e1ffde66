//! 优先级重排
//!
//! 规则按位置存放，优先级就是位置下标；任何增删或拖动之后都整体
//! 重新编号，不会出现空洞或重复的优先级。

use crate::model::Rule;

/// 按列表位置重新编号为 0..N-1
pub fn reassign_priorities(rules: &mut [Rule]) {
    for (index, rule) in rules.iter_mut().enumerate() {
        rule.priority = index as u32;
    }
}

/// 按现有优先级稳定排序后重新编号
pub fn sort_by_priority(rules: &mut [Rule]) {
    rules.sort_by_key(|rule| rule.priority);
    reassign_priorities(rules);
}

/// 把 `from` 位置的规则移动到 `to` 位置，越界时返回 false
pub fn move_rule(rules: &mut Vec<Rule>, from: usize, to: usize) -> bool {
    if from >= rules.len() || to >= rules.len() {
        return false;
    }

    let rule = rules.remove(from);
    rules.insert(to, rule);
    reassign_priorities(rules);
    true
}

/// 优先级是否恰好是 {0, …, N-1} 且各用一次
pub fn has_contiguous_priorities(rules: &[Rule]) -> bool {
    let mut seen = vec![false; rules.len()];
    for rule in rules {
        match seen.get_mut(rule.priority as usize) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}
