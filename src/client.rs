//! 反欺诈分析客户端能力接口
//! 引擎只通过固定能力调用外部客户端：获取判定、规则集、访客标识与客户端库

use std::cell::RefCell;
use serde::Serialize;

use crate::rule::{Verdict, VerdictTier};

/// 客户端库暴露的能力（禁用输入、各平台排除受众）
pub trait ClientLibrary {
    /// 客户端内置的输入禁用例程
    fn disable_inputs(&self);
    /// 单个 id 的排除调用
    fn add_exclusion(&self, platform: &str, id: &str);
    /// 列表形式的排除调用
    fn add_exclusions(&self, platform: &str, ids: &[String]);
}

/// 反欺诈分析客户端
pub trait FraudClient {
    fn visitor_id(&self) -> Option<String>;
    fn is_good(&self) -> bool;
    fn is_warning(&self) -> bool;
    fn is_bad(&self) -> bool;
    fn rule_sets(&self) -> Vec<String>;
    fn library(&self) -> &dyn ClientLibrary;

    /// 判定可用后回调
    fn query_result(&self, callback: &mut dyn FnMut(&dyn FraudClient));

    /// 当前判定等级，尚无判定时为 None
    fn tier(&self) -> Option<VerdictTier> {
        if self.is_bad() {
            Some(VerdictTier::Bad)
        } else if self.is_warning() {
            Some(VerdictTier::Warning)
        } else if self.is_good() {
            Some(VerdictTier::Good)
        } else {
            None
        }
    }

    fn verdict(&self) -> Option<Verdict> {
        self.tier().map(|tier| Verdict::new(tier, self.rule_sets()))
    }
}

/// 客户端库调用记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum LibraryCall {
    DisableInputs,
    AddExclusion { platform: String, id: String },
    AddExclusions { platform: String, ids: Vec<String> },
}

/// 记录调用的客户端库
#[derive(Debug, Default)]
pub struct RecordingLibrary {
    calls: RefCell<Vec<LibraryCall>>,
}

impl RecordingLibrary {
    pub fn calls(&self) -> Vec<LibraryCall> {
        self.calls.borrow().clone()
    }
}

impl ClientLibrary for RecordingLibrary {
    fn disable_inputs(&self) {
        self.calls.borrow_mut().push(LibraryCall::DisableInputs);
    }

    fn add_exclusion(&self, platform: &str, id: &str) {
        self.calls.borrow_mut().push(LibraryCall::AddExclusion {
            platform: platform.to_string(),
            id: id.to_string(),
        });
    }

    fn add_exclusions(&self, platform: &str, ids: &[String]) {
        self.calls.borrow_mut().push(LibraryCall::AddExclusions {
            platform: platform.to_string(),
            ids: ids.to_vec(),
        });
    }
}

/// 固定判定的客户端（命令行与测试使用）
#[derive(Debug)]
pub struct StaticClient {
    verdict: Verdict,
    visitor_id: Option<String>,
    library: RecordingLibrary,
}

impl StaticClient {
    pub fn new(tier: VerdictTier) -> Self {
        Self {
            verdict: Verdict::new(tier, Vec::new()),
            visitor_id: None,
            library: RecordingLibrary::default(),
        }
    }

    pub fn with_rule_sets(mut self, rule_sets: Vec<String>) -> Self {
        self.verdict.rule_sets = rule_sets;
        self
    }

    pub fn with_visitor_id(mut self, id: impl Into<String>) -> Self {
        self.visitor_id = Some(id.into());
        self
    }

    pub fn library_calls(&self) -> Vec<LibraryCall> {
        self.library.calls()
    }
}

impl FraudClient for StaticClient {
    fn visitor_id(&self) -> Option<String> {
        self.visitor_id.clone()
    }

    fn is_good(&self) -> bool {
        self.verdict.tier == VerdictTier::Good
    }

    fn is_warning(&self) -> bool {
        self.verdict.tier == VerdictTier::Warning
    }

    fn is_bad(&self) -> bool {
        self.verdict.tier == VerdictTier::Bad
    }

    fn rule_sets(&self) -> Vec<String> {
        self.verdict.rule_sets.clone()
    }

    fn library(&self) -> &dyn ClientLibrary {
        &self.library
    }

    fn query_result(&self, callback: &mut dyn FnMut(&dyn FraudClient)) {
        callback(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_client_verdict() {
        let client = StaticClient::new(VerdictTier::Warning).with_rule_sets(vec!["web_crawler".into()]);
        assert_eq!(client.tier(), Some(VerdictTier::Warning));
        assert!(client.verdict().unwrap().is_web_crawler());
    }

    #[test]
    fn test_recording_library() {
        let client = StaticClient::new(VerdictTier::Bad);
        client.library().disable_inputs();
        client.library().add_exclusions("meta", &["1".to_string(), "2".to_string()]);
        assert_eq!(
            client.library_calls(),
            vec![
                LibraryCall::DisableInputs,
                LibraryCall::AddExclusions { platform: "meta".into(), ids: vec!["1".into(), "2".into()] },
            ]
        );
    }
}
