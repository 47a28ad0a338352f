//! 标签部署管理器
//! 仅在判定为 good 时调用；按固定顺序把完整的标签配置交给每个策略

use tracing::debug;

use super::executor::DeployOutcome;
use super::strategy::{BootstrapStrategy, TagDeploymentStrategy};
use crate::host::HostEnvironment;
use crate::rule::{AdPlatform, TagConfig};

#[derive(Debug)]
pub struct TagDeploymentManager {
    strategies: Vec<Box<dyn TagDeploymentStrategy>>,
}

impl Default for TagDeploymentManager {
    fn default() -> Self {
        Self::with_default_strategies()
    }
}

impl TagDeploymentManager {
    /// 空管理器（不含任何策略）
    pub fn new() -> Self {
        Self { strategies: Vec::new() }
    }

    /// 全部内置平台，顺序：google, meta, microsoft, linkedin, tiktok, twitter
    pub fn with_default_strategies() -> Self {
        let mut manager = Self::new();
        for platform in AdPlatform::ALL {
            manager.register(Box::new(BootstrapStrategy::new(platform)));
        }
        manager
    }

    pub fn register(&mut self, strategy: Box<dyn TagDeploymentStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn platforms(&self) -> Vec<AdPlatform> {
        self.strategies.iter().map(|s| s.platform_id()).collect()
    }

    /// 依次调用每个策略；策略自行筛选本平台配置
    pub fn handle_good_result(
        &self,
        host: &dyn HostEnvironment,
        tags: &[TagConfig],
    ) -> Vec<(AdPlatform, DeployOutcome)> {
        let mut deployed = Vec::new();
        for strategy in &self.strategies {
            if let Some(outcome) = strategy.deploy(host, tags) {
                deployed.push((strategy.platform_id(), outcome));
            }
        }
        debug!(platforms = deployed.len(), "Tag deployment finished");
        deployed
    }
}
