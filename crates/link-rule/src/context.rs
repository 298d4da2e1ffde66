use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 访问设备类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mobile" => Some(DeviceClass::Mobile),
            "tablet" => Some(DeviceClass::Tablet),
            "desktop" => Some(DeviceClass::Desktop),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次访问的请求上下文
///
/// 由外部的请求上下文提供方在每次访问时构造。`prior_access_count`
/// 由外部计数器维护，不包含当前这次请求，且不保证实时。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// 访问者国家代码（未知时为 None）
    #[serde(default)]
    pub country: Option<String>,

    /// 设备类型
    #[serde(default, rename = "deviceClass")]
    pub device: Option<DeviceClass>,

    /// 访问者 IP
    #[serde(default)]
    pub ip: Option<String>,

    /// 是否为爬虫
    #[serde(default)]
    pub is_bot: bool,

    /// 是否通过 VPN 访问
    #[serde(default)]
    pub is_vpn: bool,

    /// 访问时间
    pub timestamp: DateTime<Utc>,

    /// 此前的访问次数
    #[serde(default)]
    pub prior_access_count: u64,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            ..Default::default()
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_device(mut self, device: DeviceClass) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_bot(mut self, is_bot: bool) -> Self {
        self.is_bot = is_bot;
        self
    }

    pub fn with_vpn(mut self, is_vpn: bool) -> Self {
        self.is_vpn = is_vpn;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_prior_access_count(mut self, count: u64) -> Self {
        self.prior_access_count = count;
        self
    }
}
