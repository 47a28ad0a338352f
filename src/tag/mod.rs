//! 广告平台标签部署模块
//! 平台描述（纯数据）→ 通用执行器 → 策略 → 管理器

pub mod executor;
pub mod manager;
pub mod platform;
pub mod strategy;

pub use self::executor::{ensure_and_fire, DeployOutcome};
pub use self::manager::TagDeploymentManager;
pub use self::platform::{bootstrap_for, FireTiming, PlatformBootstrap};
pub use self::strategy::{BootstrapStrategy, TagDeploymentStrategy};
