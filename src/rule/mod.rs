//! 规则模块：配置快照的数据模型定义
pub mod model;

// 导出核心接口
pub use self::model::{
    ActionConfig, AdPlatform, ExclusionAudience, MatchKind, MatchRule, PageContext,
    RedirectSettings, RequestTrigger, ResultCondition, RetryPolicy, TagConfig, TriggerCondition,
    TriggerKind, Verdict, VerdictTier, MAX_DURATION_SECONDS, MIN_DURATION_SECONDS,
    POLL_INTERVAL_MS, WEB_CRAWLER_RULE_SET,
};
