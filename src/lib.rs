//! rsclickguard - 基于反欺诈判定结果的页面防护与广告标签部署引擎

// 导出全局错误类型
pub use self::error::{CgResult, ClickGuardError};

// 导出配置模块
pub use self::config::{ConfigBuilder, ConfigManager, EngineConfig};

// 导出规则数据模型
pub use self::rule::{
    ActionConfig, AdPlatform, ExclusionAudience, MatchKind, MatchRule, PageContext, RedirectSettings,
    RequestTrigger, ResultCondition, RetryPolicy, TagConfig, TriggerCondition, TriggerKind, Verdict, VerdictTier,
};

// 导出编译模块核心接口
pub use self::compiler::{CombinedPattern, PatternCompiler, PatternMatcher};

// 导出准入模块核心接口
pub use self::gate::{GateDecision, RequestContext, VisitorGate};

// 导出防护动作核心接口
pub use self::action::{
    ActionCommand, ActionCommandFactory, ActionKind, ConditionEvaluator, RetryScheduler, SchedulerState,
    StartOutcome, TickOutcome,
};

// 导出标签部署与排除受众接口
pub use self::exclusion::{ExclusionAudienceManager, ExclusionReport};
pub use self::tag::{BootstrapStrategy, DeployOutcome, PlatformBootstrap, TagDeploymentManager, TagDeploymentStrategy};

// 导出宿主环境与客户端能力
pub use self::client::{ClientLibrary, FraudClient, LibraryCall, StaticClient};
pub use self::host::{ElementQuery, GlobalCall, GlobalStub, HostEnvironment, PageHost, ScriptTag};

// 导出页面引擎
pub use self::engine::{EngineOutcome, PageEngine};

// 声明所有子模块
pub mod action;
pub mod client;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod exclusion;
pub mod gate;
pub mod host;
pub mod rule;
pub mod tag;
