//! 国家代码规范化
//!
//! 编辑时国家条件是一个逗号分隔的字符串（"us, mx , ca"），持久化时是
//! 去空格、大写后的数组（["US", "MX", "CA"]）。

/// 将编辑框中的逗号分隔字符串转换为规范化的国家代码数组
pub fn normalize_country_codes(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .collect()
}

/// 规范化已经是数组形式的国家代码
///
/// 旧数据里单个元素可能仍然包含逗号，这里一并拆开。
pub fn normalize_code_list<S: AsRef<str>>(codes: &[S]) -> Vec<String> {
    codes
        .iter()
        .flat_map(|code| normalize_country_codes(code.as_ref()))
        .collect()
}

/// 将国家代码数组渲染回编辑框使用的字符串
pub fn format_country_codes<S: AsRef<str>>(codes: &[S]) -> String {
    codes
        .iter()
        .map(|code| code.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}
