//! 排除受众管理
//! 判定非 good 时，按平台分组已启用的排除受众，经固定适配器表调用客户端库的排除接口

use std::collections::BTreeMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::client::ClientLibrary;
use crate::error::{CgResult, ClickGuardError};
use crate::rule::ExclusionAudience;

/// 排除接口接受的 id 形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdArity {
    /// 单个 id，仅处理组内第一个受众
    Single,
    /// id 列表，组内全部受众一次调用
    List,
}

/// 平台适配器：从受众字段提取排除 id 的方式 + 调用形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionAdapter {
    pub platform: &'static str,
    /// 组成 id 的字段，多个字段以 `/` 连接
    pub id_fields: &'static [&'static str],
    pub arity: IdArity,
}

impl ExclusionAdapter {
    /// 缺字段或字段为空时返回 None
    pub fn audience_id(&self, audience: &ExclusionAudience) -> Option<String> {
        let parts: Option<Vec<&str>> = self
            .id_fields
            .iter()
            .map(|field| {
                audience
                    .fields
                    .get(*field)
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
            })
            .collect();
        parts.map(|p| p.join("/"))
    }
}

pub const EXCLUSION_ADAPTERS: &[ExclusionAdapter] = &[
    ExclusionAdapter {
        platform: "google",
        id_fields: &["conversionId", "conversionLabel"],
        arity: IdArity::Single,
    },
    ExclusionAdapter {
        platform: "meta",
        id_fields: &["pixelId"],
        arity: IdArity::List,
    },
    ExclusionAdapter {
        platform: "microsoft",
        id_fields: &["tagId"],
        arity: IdArity::Single,
    },
    ExclusionAdapter {
        platform: "linkedin",
        id_fields: &["partnerId"],
        arity: IdArity::List,
    },
    ExclusionAdapter {
        platform: "tiktok",
        id_fields: &["pixelId"],
        arity: IdArity::List,
    },
    ExclusionAdapter {
        platform: "twitter",
        id_fields: &["pixelId"],
        arity: IdArity::Single,
    },
];

/// 按平台名查找适配器（大小写不敏感）
pub fn adapter_for(platform: &str) -> CgResult<&'static ExclusionAdapter> {
    EXCLUSION_ADAPTERS
        .iter()
        .find(|a| a.platform.eq_ignore_ascii_case(platform.trim()))
        .ok_or_else(|| ClickGuardError::UnsupportedPlatform {
            platform: platform.to_string(),
            supported: EXCLUSION_ADAPTERS
                .iter()
                .map(|a| a.platform)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// 单个平台的处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusionReport {
    pub platform: String,
    pub ids: Vec<String>,
}

/// 排除受众管理器
#[derive(Debug, Default)]
pub struct ExclusionAudienceManager;

impl ExclusionAudienceManager {
    pub fn new() -> Self {
        Self
    }

    /// 按平台分组（保持组内配置顺序）
    pub fn group<'a>(audiences: &'a [ExclusionAudience]) -> BTreeMap<String, Vec<&'a ExclusionAudience>> {
        let mut groups: BTreeMap<String, Vec<&ExclusionAudience>> = BTreeMap::new();
        for audience in audiences.iter().filter(|a| a.enabled) {
            groups
                .entry(audience.platform.trim().to_ascii_lowercase())
                .or_default()
                .push(audience);
        }
        groups
    }

    /// 处理所有平台；单个平台失败不影响其他平台
    pub fn apply(&self, library: &dyn ClientLibrary, audiences: &[ExclusionAudience]) -> Vec<ExclusionReport> {
        let mut reports = Vec::new();
        for (platform, group) in Self::group(audiences) {
            match self.apply_platform(library, &platform, &group) {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => debug!(platform = %platform, "No usable exclusion ids"),
                Err(e) => warn!(platform = %platform, error = %e, "Skipping exclusion platform"),
            }
        }
        reports
    }

    fn apply_platform(
        &self,
        library: &dyn ClientLibrary,
        platform: &str,
        group: &[&ExclusionAudience],
    ) -> CgResult<Option<ExclusionReport>> {
        let adapter = adapter_for(platform)?;
        let ids: Vec<String> = match adapter.arity {
            IdArity::List => group.iter().filter_map(|a| adapter.audience_id(a)).collect(),
            IdArity::Single => group
                .first()
                .and_then(|a| adapter.audience_id(a))
                .into_iter()
                .collect(),
        };
        if ids.is_empty() {
            return Ok(None);
        }

        match adapter.arity {
            IdArity::List => library.add_exclusions(adapter.platform, &ids),
            IdArity::Single => library.add_exclusion(adapter.platform, &ids[0]),
        }
        debug!(platform = adapter.platform, ids = ids.len(), "Exclusion audience applied");
        Ok(Some(ExclusionReport {
            platform: adapter.platform.to_string(),
            ids,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FraudClient, LibraryCall, StaticClient};
    use crate::rule::VerdictTier;

    fn linkedin(id: &str) -> ExclusionAudience {
        ExclusionAudience::new("linkedin", [("partnerId", id)])
    }

    #[test]
    fn test_two_linkedin_audiences_one_list_call() {
        let client = StaticClient::new(VerdictTier::Bad);
        let audiences = vec![linkedin("100"), linkedin("200")];
        ExclusionAudienceManager::new().apply(client.library(), &audiences);
        assert_eq!(
            client.library_calls(),
            vec![LibraryCall::AddExclusions {
                platform: "linkedin".into(),
                ids: vec!["100".into(), "200".into()],
            }]
        );
    }

    #[test]
    fn test_single_id_platform_takes_first_only() {
        let client = StaticClient::new(VerdictTier::Warning);
        let audiences = vec![
            ExclusionAudience::new("twitter", [("pixelId", "t1")]),
            ExclusionAudience::new("twitter", [("pixelId", "t2")]),
            ExclusionAudience::new("Google", [("conversionId", "AW-9"), ("conversionLabel", "abc")]),
        ];
        let reports = ExclusionAudienceManager::new().apply(client.library(), &audiences);
        assert_eq!(reports.len(), 2);
        assert_eq!(
            client.library_calls(),
            vec![
                LibraryCall::AddExclusion { platform: "google".into(), id: "AW-9/abc".into() },
                LibraryCall::AddExclusion { platform: "twitter".into(), id: "t1".into() },
            ]
        );
    }

    #[test]
    fn test_unsupported_platform_is_skipped() {
        let client = StaticClient::new(VerdictTier::Bad);
        let audiences = vec![
            ExclusionAudience::new("myspace", [("id", "1")]),
            ExclusionAudience::new("meta", [("pixelId", "p1")]),
        ];
        let reports = ExclusionAudienceManager::new().apply(client.library(), &audiences);
        assert_eq!(reports, vec![ExclusionReport { platform: "meta".into(), ids: vec!["p1".into()] }]);

        let err = adapter_for("myspace").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("myspace"));
        assert!(message.contains("linkedin"));
    }

    #[test]
    fn test_disabled_and_incomplete_audiences_ignored() {
        let client = StaticClient::new(VerdictTier::Bad);
        let mut disabled = linkedin("1");
        disabled.enabled = false;
        let incomplete = ExclusionAudience::new("google", [("conversionId", "AW-1")]);
        let reports = ExclusionAudienceManager::new().apply(client.library(), &[disabled, incomplete]);
        assert!(reports.is_empty());
        assert!(client.library_calls().is_empty());
    }
}
