//! 全局配置管理,存储外部设置层下发的只读配置快照

use std::path::Path;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CgResult, ClickGuardError};
use crate::rule::{
    ActionConfig, ExclusionAudience, MatchRule, RedirectSettings, RequestTrigger, RetryPolicy,
    TagConfig, MAX_DURATION_SECONDS, MIN_DURATION_SECONDS,
};

/// 默认的反欺诈分析脚本地址
pub const DEFAULT_LOADER_ENDPOINT: &str = "https://monitor.clickguard.example/v1/loader.js";

/// 机器人过滤配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotFilterConfig {
    pub enabled: bool,
    pub rules: Vec<MatchRule>,
}

/// 请求触发配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerConfig {
    pub enabled: bool,
    pub triggers: Vec<RequestTrigger>,
}

/// 附加数据键值对（注入脚本时按 1 开始编号）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdditionalData {
    pub key: String,
    pub value: String,
}

/// 反欺诈分析脚本注入参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderSettings {
    pub endpoint: String,
    pub source: Option<String>,
    pub campaign: Option<String>,
    pub additional_data: Vec<AdditionalData>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LOADER_ENDPOINT.to_string(),
            source: None,
            campaign: None,
            additional_data: Vec::new(),
        }
    }
}

/// 引擎配置快照（每次页面加载传入一次，运行期只读）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub instance_id: u64,
    pub callback_name: Option<String>,
    pub bot_filter: BotFilterConfig,
    pub request_triggers: TriggerConfig,
    pub actions: Vec<ActionConfig>,
    pub retry: RetryPolicy,
    pub redirect: RedirectSettings,
    pub tags: Vec<TagConfig>,
    pub exclusion_audiences: Vec<ExclusionAudience>,
    pub loader: LoaderSettings,
}

impl EngineConfig {
    /// 从JSON字符串加载并校验
    pub fn from_json_str(json: &str) -> CgResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        debug!(
            instance_id = config.instance_id,
            actions = config.actions.len(),
            tags = config.tags.len(),
            "Engine config loaded"
        );
        Ok(config)
    }

    /// 从JSON文件加载并校验
    pub fn from_json_file(path: impl AsRef<Path>) -> CgResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 校验取值范围
    pub fn validate(&self) -> CgResult<()> {
        let duration = self.retry.duration_seconds;
        if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&duration) {
            return Err(ClickGuardError::InvalidConfig(format!(
                "durationSeconds 必须在 {}..={} 之间，当前值: {}",
                MIN_DURATION_SECONDS, MAX_DURATION_SECONDS, duration
            )));
        }

        if let Some(target) = self.redirect.url.as_deref().filter(|u| !u.is_empty()) {
            url::Url::parse(target)?;
        }

        // 回调名须是合法的全局标识符
        static CALLBACK_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$").unwrap()
        });
        if let Some(name) = self.callback_name.as_deref().filter(|n| !n.is_empty()) {
            if !CALLBACK_NAME_REGEX.is_match(name) {
                return Err(ClickGuardError::InvalidConfig(format!("callbackName 不是合法的标识符: {}", name)));
            }
        }

        url::Url::parse(&self.loader.endpoint)?;
        Ok(())
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> EngineConfig {
        EngineConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// 配置构建器（便于在代码中组装配置）
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: EngineConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance_id(mut self, id: u64) -> Self {
        self.config.instance_id = id;
        self
    }

    pub fn callback_name(mut self, name: impl Into<String>) -> Self {
        self.config.callback_name = Some(name.into());
        self
    }

    pub fn bot_filter(mut self, enabled: bool, rules: Vec<MatchRule>) -> Self {
        self.config.bot_filter = BotFilterConfig { enabled, rules };
        self
    }

    pub fn request_triggers(mut self, enabled: bool, triggers: Vec<RequestTrigger>) -> Self {
        self.config.request_triggers = TriggerConfig { enabled, triggers };
        self
    }

    pub fn action(mut self, action: ActionConfig) -> Self {
        self.config.actions.push(action);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn redirect(mut self, redirect: RedirectSettings) -> Self {
        self.config.redirect = redirect;
        self
    }

    pub fn tag(mut self, tag: TagConfig) -> Self {
        self.config.tags.push(tag);
        self
    }

    pub fn exclusion_audience(mut self, audience: ExclusionAudience) -> Self {
        self.config.exclusion_audiences.push(audience);
        self
    }

    pub fn loader(mut self, loader: LoaderSettings) -> Self {
        self.config.loader = loader;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
