//! 通用"确保全局对象存在，然后触发"执行器
//! 解释 [`PlatformBootstrap`] 描述：已存在则直接为每个 id 触发；
//! 否则创建桩、注入加载脚本，并按平台约定同步触发或在 load 后触发

use std::time::{SystemTime, UNIX_EPOCH};
use serde::Serialize;
use tracing::{debug, info};

use super::platform::{FireTiming, PlatformBootstrap};
use crate::host::{GlobalCall, HostEnvironment, ScriptTag};

/// 单个平台的部署结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum DeployOutcome {
    /// 全局对象已存在，跳过脚本注入，直接触发
    #[serde(rename_all = "camelCase")]
    AlreadyPresent { fired: usize },
    /// 新建桩并注入加载脚本
    #[serde(rename_all = "camelCase")]
    Bootstrapped {
        #[serde(skip_serializing_if = "Option::is_none")]
        loader_src: Option<String>,
        fired_now: usize,
        deferred: usize,
    },
}

impl DeployOutcome {
    /// 已触发或已排期触发的 id 数
    pub fn tag_count(&self) -> usize {
        match self {
            DeployOutcome::AlreadyPresent { fired } => *fired,
            DeployOutcome::Bootstrapped { fired_now, deferred, .. } => fired_now + deferred,
        }
    }
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// 按描述部署；无标签 id 时返回 None
pub fn ensure_and_fire(
    host: &dyn HostEnvironment,
    bootstrap: &PlatformBootstrap,
    tag_ids: &[&str],
) -> Option<DeployOutcome> {
    let first_id = *tag_ids.first()?;
    let ts = timestamp_ms();

    if host.has_global(bootstrap.global) {
        ensure_companions(host, bootstrap);
        for id in tag_ids {
            fire_all(host, bootstrap.fire_calls(id, ts));
        }
        debug!(platform = %bootstrap.platform, ids = tag_ids.len(), "Tracking object present, fired directly");
        return Some(DeployOutcome::AlreadyPresent { fired: tag_ids.len() });
    }

    host.install_global(bootstrap.global, &bootstrap.stub);
    ensure_companions(host, bootstrap);
    fire_all(host, bootstrap.setup_calls(ts));

    let fires: Vec<GlobalCall> = tag_ids
        .iter()
        .flat_map(|id| bootstrap.fire_calls(id, ts))
        .collect();
    let loader_src = bootstrap.loader_src(first_id);

    // 无独立加载脚本时由触发调用自行加载，只能立即触发
    let (fired_now, deferred) = match (loader_src.as_deref(), bootstrap.timing) {
        (Some(src), FireTiming::OnLoad) => {
            host.inject_script(ScriptTag::async_src(src), fires);
            (0, tag_ids.len())
        }
        (Some(src), FireTiming::Immediate) => {
            fire_all(host, fires);
            host.inject_script(ScriptTag::async_src(src), Vec::new());
            (tag_ids.len(), 0)
        }
        (None, _) => {
            fire_all(host, fires);
            (tag_ids.len(), 0)
        }
    };

    for id in tag_ids {
        if let Some(pixel) = bootstrap.noscript_src(id) {
            let noscript = host.append_element(None, "noscript", &[]);
            host.append_element(
                Some(noscript),
                "img",
                &[("height", "1"), ("width", "1"), ("style", "display:none"), ("alt", ""), ("src", pixel.as_str())],
            );
        }
    }

    info!(platform = %bootstrap.platform, src = ?loader_src, fired_now, deferred, "Tag bootstrap injected");
    Some(DeployOutcome::Bootstrapped {
        loader_src,
        fired_now,
        deferred,
    })
}

fn ensure_companions(host: &dyn HostEnvironment, bootstrap: &PlatformBootstrap) {
    for (name, stub) in bootstrap.companion_globals {
        if !host.has_global(name) {
            host.install_global(name, stub);
        }
    }
}

fn fire_all(host: &dyn HostEnvironment, calls: Vec<GlobalCall>) {
    for call in calls {
        host.call_global(call);
    }
}
