//! 标签部署策略
//! 所有平台共用一个执行骨架，差异只在初始化描述

use std::fmt::Debug;

use super::executor::{ensure_and_fire, DeployOutcome};
use super::platform::{bootstrap_for, PlatformBootstrap};
use crate::host::HostEnvironment;
use crate::rule::{AdPlatform, TagConfig};

/// 标签部署策略的通用抽象
pub trait TagDeploymentStrategy: Debug {
    fn platform_id(&self) -> AdPlatform;

    /// 平台初始化描述，策略的唯一差异点
    fn bootstrap(&self) -> &PlatformBootstrap;

    /// 通用部署骨架：筛选本平台已启用的 id → 确保全局对象 → 触发
    fn deploy(&self, host: &dyn HostEnvironment, tags: &[TagConfig]) -> Option<DeployOutcome> {
        let platform = self.platform_id();
        let ids: Vec<&str> = tags
            .iter()
            .filter(|t| t.enabled && t.platform == platform)
            .map(|t| t.tag_id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        ensure_and_fire(host, self.bootstrap(), &ids)
    }
}

/// 基于静态描述的策略
#[derive(Debug, Clone, Copy)]
pub struct BootstrapStrategy {
    bootstrap: &'static PlatformBootstrap,
}

impl BootstrapStrategy {
    pub fn new(platform: AdPlatform) -> Self {
        Self {
            bootstrap: bootstrap_for(platform),
        }
    }
}

impl TagDeploymentStrategy for BootstrapStrategy {
    fn platform_id(&self) -> AdPlatform {
        self.bootstrap.platform
    }

    fn bootstrap(&self) -> &PlatformBootstrap {
        self.bootstrap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::PageHost;

    #[test]
    fn test_deploy_filters_platform_and_enabled() {
        let host = PageHost::from_html("");
        let mut disabled = TagConfig::new(AdPlatform::Twitter, "o2");
        disabled.enabled = false;
        let tags = vec![
            TagConfig::new(AdPlatform::Meta, "111"),
            TagConfig::new(AdPlatform::Twitter, "o1"),
            disabled,
        ];
        let outcome = BootstrapStrategy::new(AdPlatform::Twitter).deploy(&host, &tags).unwrap();
        assert_eq!(outcome.tag_count(), 1);
        assert!(!host.has_global("fbq"));
    }

    #[test]
    fn test_deploy_without_matching_tags_is_noop() {
        let host = PageHost::from_html("");
        let tags = vec![TagConfig::new(AdPlatform::Meta, "111")];
        assert!(BootstrapStrategy::new(AdPlatform::TikTok).deploy(&host, &tags).is_none());
        assert!(host.injected_scripts().is_empty());
    }
}
