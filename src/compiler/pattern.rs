//! 编译后模式模型
//! 按维度合并后的正则匹配器

use std::collections::BTreeMap;
use regex::Regex;

use crate::rule::{MatchKind, MatchRule, RequestTrigger, TriggerKind};

/// 可编译的文本规则（机器人规则 / 请求触发器共用）
pub trait PatternSource {
    type Kind: Copy + Ord + std::fmt::Debug;

    fn kind(&self) -> Self::Kind;
    fn text_pattern(&self) -> &str;
    fn is_enabled(&self) -> bool;
}

impl PatternSource for MatchRule {
    type Kind = MatchKind;

    fn kind(&self) -> MatchKind {
        self.kind
    }

    fn text_pattern(&self) -> &str {
        &self.text_pattern
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl PatternSource for RequestTrigger {
    type Kind = TriggerKind;

    fn kind(&self) -> TriggerKind {
        self.kind
    }

    fn text_pattern(&self) -> &str {
        &self.text_pattern
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// 单一维度的合并正则
/// 合并编译失败时退化为逐条正则，匹配语义不变
#[derive(Debug, Clone)]
pub struct CombinedPattern {
    pub regexes: Vec<Regex>,
    /// 参与合并的规则数量
    pub source_count: usize,
}

impl CombinedPattern {
    #[inline]
    pub fn is_match(&self, input: &str) -> bool {
        self.regexes.iter().any(|regex| regex.is_match(input))
    }

    /// 是否已合并为单条正则
    pub fn is_merged(&self) -> bool {
        self.regexes.len() == 1
    }

    /// 规则描述（用于日志输出）
    pub fn describe(&self) -> String {
        self.regexes
            .iter()
            .map(Regex::as_str)
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// 按维度分组的合并匹配器
/// 某维度没有任何可用规则时不存在对应条目，该维度永不匹配
#[derive(Debug, Clone)]
pub struct PatternMatcher<K: Ord> {
    pub(crate) by_kind: BTreeMap<K, CombinedPattern>,
}

impl<K: Ord + Copy + std::fmt::Debug> PatternMatcher<K> {
    pub fn empty() -> Self {
        Self {
            by_kind: BTreeMap::new(),
        }
    }

    /// 没有任何维度可匹配
    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    pub fn get(&self, kind: K) -> Option<&CombinedPattern> {
        self.by_kind.get(&kind)
    }

    /// 指定维度是否匹配输入
    pub fn is_match(&self, kind: K, input: &str) -> bool {
        self.by_kind
            .get(&kind)
            .map(|pattern| pattern.is_match(input))
            .unwrap_or(false)
    }

    /// 任意维度匹配其对应输入即返回 true
    pub fn matches_any<'a, I>(&self, inputs: I) -> bool
    where
        I: IntoIterator<Item = (K, &'a str)>,
    {
        inputs.into_iter().any(|(kind, input)| self.is_match(kind, input))
    }
}
