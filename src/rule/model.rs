//! 规则数据模型定义
//! 仅存储配置快照数据，无任何业务逻辑，支持序列化/反序列化

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{CgResult, ClickGuardError};

/// 规则集中标记"已知网络爬虫"的标签
pub const WEB_CRAWLER_RULE_SET: &str = "web_crawler";

/// 轮询间隔（毫秒），固定值
pub const POLL_INTERVAL_MS: u64 = 200;

/// 防护持续时间上下限（秒）
pub const MIN_DURATION_SECONDS: u32 = 1;
pub const MAX_DURATION_SECONDS: u32 = 120;

/// 机器人过滤规则的匹配维度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum MatchKind {
    VisitorAgent,
    PageLocation,
    Referrer,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::VisitorAgent => "visitorAgent",
            MatchKind::PageLocation => "pageLocation",
            MatchKind::Referrer => "referrer",
        }
    }
}

/// 机器人过滤规则
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchRule {
    pub kind: MatchKind,
    pub text_pattern: String,
    #[serde(default)]
    pub enabled: bool,
}

impl MatchRule {
    pub fn new(kind: MatchKind, text_pattern: impl Into<String>) -> Self {
        Self {
            kind,
            text_pattern: text_pattern.into(),
            enabled: true,
        }
    }
}

/// 请求触发器的取值维度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    Url,
    Path,
    QueryParam,
}

/// 请求触发器的判定条件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TriggerCondition {
    Contains,
    DoesNotContain,
}

/// 请求触发规则
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestTrigger {
    pub kind: TriggerKind,
    pub condition: TriggerCondition,
    pub text_pattern: String,
    #[serde(default)]
    pub enabled: bool,
}

impl RequestTrigger {
    pub fn new(kind: TriggerKind, condition: TriggerCondition, text_pattern: impl Into<String>) -> Self {
        Self {
            kind,
            condition,
            text_pattern: text_pattern.into(),
            enabled: true,
        }
    }
}

/// 访客判定等级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VerdictTier {
    Good,
    Warning,
    Bad,
}

impl fmt::Display for VerdictTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictTier::Good => write!(f, "good"),
            VerdictTier::Warning => write!(f, "warning"),
            VerdictTier::Bad => write!(f, "bad"),
        }
    }
}

impl FromStr for VerdictTier {
    type Err = ClickGuardError;

    fn from_str(s: &str) -> CgResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "good" => Ok(VerdictTier::Good),
            "warning" => Ok(VerdictTier::Warning),
            "bad" => Ok(VerdictTier::Bad),
            other => Err(ClickGuardError::InvalidInput(format!("未知的判定等级: {}", other))),
        }
    }
}

/// 访客判定结果（等级 + 命中的规则集标签）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verdict {
    pub tier: VerdictTier,
    #[serde(default)]
    pub rule_sets: Vec<String>,
}

impl Verdict {
    pub fn new(tier: VerdictTier, rule_sets: Vec<String>) -> Self {
        Self { tier, rule_sets }
    }

    /// 是否被规则集标记为已知网络爬虫
    pub fn is_web_crawler(&self) -> bool {
        self.rule_sets
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(WEB_CRAWLER_RULE_SET))
    }
}

/// 动作/跳转的触发条件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ResultCondition {
    #[default]
    NoDisable,
    NoRedirect,
    OnWarning,
    OnBad,
    OnBoth,
}

/// 单个防护动作的配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    pub name: String,
    #[serde(default)]
    pub result_condition: ResultCondition,
}

impl ActionConfig {
    pub fn new(name: impl Into<String>, result_condition: ResultCondition) -> Self {
        Self {
            name: name.into(),
            result_condition,
        }
    }
}

/// 轮询重试策略（轮询间隔固定为 [`POLL_INTERVAL_MS`]）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u32,
    #[serde(default)]
    pub stop_after_first_element: bool,
}

fn default_duration_seconds() -> u32 {
    10
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            duration_seconds: default_duration_seconds(),
            stop_after_first_element: false,
        }
    }
}

impl RetryPolicy {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_seconds))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(POLL_INTERVAL_MS)
    }
}

/// 支持的广告平台（顺序即部署顺序）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AdPlatform {
    #[serde(alias = "gtag", alias = "googleAds")]
    Google,
    #[serde(alias = "facebook")]
    Meta,
    #[serde(alias = "bing")]
    Microsoft,
    LinkedIn,
    TikTok,
    #[serde(alias = "x")]
    Twitter,
}

impl AdPlatform {
    pub const ALL: [AdPlatform; 6] = [
        AdPlatform::Google,
        AdPlatform::Meta,
        AdPlatform::Microsoft,
        AdPlatform::LinkedIn,
        AdPlatform::TikTok,
        AdPlatform::Twitter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdPlatform::Google => "google",
            AdPlatform::Meta => "meta",
            AdPlatform::Microsoft => "microsoft",
            AdPlatform::LinkedIn => "linkedin",
            AdPlatform::TikTok => "tiktok",
            AdPlatform::Twitter => "twitter",
        }
    }
}

impl fmt::Display for AdPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 广告平台标签配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagConfig {
    pub platform: AdPlatform,
    pub tag_id: String,
    #[serde(default)]
    pub enabled: bool,
}

impl TagConfig {
    pub fn new(platform: AdPlatform, tag_id: impl Into<String>) -> Self {
        Self {
            platform,
            tag_id: tag_id.into(),
            enabled: true,
        }
    }
}

/// 排除受众配置（平台名保持原始字符串，由适配器表校验）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionAudience {
    pub platform: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub enabled: bool,
}

impl ExclusionAudience {
    pub fn new<'a>(platform: impl Into<String>, fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            platform: platform.into(),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            enabled: true,
        }
    }
}

/// 跳转配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RedirectSettings {
    #[serde(default = "default_redirect_condition")]
    pub condition: ResultCondition,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub bypass_web_crawlers: bool,
}

fn default_redirect_condition() -> ResultCondition {
    ResultCondition::NoRedirect
}

impl Default for RedirectSettings {
    fn default() -> Self {
        Self {
            condition: default_redirect_condition(),
            url: None,
            bypass_web_crawlers: false,
        }
    }
}

/// 页面上下文
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PageContext {
    #[default]
    Standard,
    LoginPage,
}
