//! 规则编译器核心
//! 负责将文本规则编译为大小写不敏感的正则，并按维度合并

use std::collections::BTreeMap;
use std::time::Instant;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use super::pattern::{CombinedPattern, PatternMatcher, PatternSource};
use crate::error::CgResult;

/// 规则编译器
pub struct PatternCompiler;

impl PatternCompiler {
    /// 编译规则列表并按维度合并
    /// 1. 仅处理启用且非空的规则
    /// 2. 单条编译失败的规则直接丢弃（不致命）
    /// 3. 每条规则包裹为非捕获分组后，同维度以 `|` 合并为一条正则
    pub fn build<S: PatternSource>(sources: &[S]) -> PatternMatcher<S::Kind> {
        let start = Instant::now();
        let mut grouped: BTreeMap<S::Kind, Vec<&str>> = BTreeMap::new();
        let mut stats = CompileStats::default();

        for source in sources.iter().filter(|s| s.is_enabled()) {
            let raw = source.text_pattern();
            if raw.trim().is_empty() {
                stats.skipped += 1;
                continue;
            }

            // 先单独编译，保证坏规则不会污染合并结果
            if let Err(e) = Self::compile_single(raw) {
                warn!(kind = ?source.kind(), pattern = raw, error = %e, "Dropping uncompilable pattern");
                stats.rejected += 1;
                continue;
            }

            grouped
                .entry(source.kind())
                .or_default()
                .push(raw);
            stats.accepted += 1;
        }

        let mut by_kind = BTreeMap::new();
        for (kind, parts) in grouped {
            let source_count = parts.len();
            let combined = parts
                .iter()
                .map(|p| Self::group_pattern(p))
                .collect::<Vec<_>>()
                .join("|");
            let regexes = match Self::compile_single(&combined) {
                Ok(regex) => vec![regex],
                Err(e) => {
                    // 各条规则单独可编译，合并失败（如重名捕获组、行尾注释）时逐条保留
                    warn!(kind = ?kind, error = %e, "Combined pattern rejected, keeping rules separate");
                    parts.iter().filter_map(|p| Self::compile_single(p).ok()).collect()
                }
            };
            by_kind.insert(kind, CombinedPattern { regexes, source_count });
        }

        debug!(
            accepted = stats.accepted,
            rejected = stats.rejected,
            skipped = stats.skipped,
            kinds = by_kind.len(),
            "Pattern compilation finished in {:?}",
            start.elapsed()
        );

        PatternMatcher { by_kind }
    }

    /// 编译单条大小写不敏感正则
    pub fn compile_single(pattern: &str) -> CgResult<Regex> {
        Ok(RegexBuilder::new(pattern).case_insensitive(true).build()?)
    }

    /// 编译带单词边界的触发器正则
    pub fn compile_word_bounded(pattern: &str) -> CgResult<Regex> {
        Self::compile_single(&format!(r"\b(?:{})\b", pattern))
    }

    /// 合并前包裹为非捕获分组，使 `|` 与内联标志（如 `(?-i)`、`(?x)`）的作用域止于本条规则
    pub fn group_pattern(pattern: &str) -> String {
        format!("(?:{})", pattern)
    }
}

/// 编译统计信息
#[derive(Debug, Clone, Default)]
struct CompileStats {
    accepted: usize,
    rejected: usize,
    skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{MatchKind, MatchRule, RequestTrigger, TriggerCondition, TriggerKind};

    fn rules(patterns: &[(MatchKind, &str)]) -> Vec<MatchRule> {
        patterns.iter().map(|(k, p)| MatchRule::new(*k, *p)).collect()
    }

    #[test]
    fn test_alternation_is_grouped_before_join() {
        // 测试场景：`^a|b` 与 `c$` 合并，必须等价于 (^a)|(b)|(c$)
        let matcher = PatternCompiler::build(&rules(&[
            (MatchKind::VisitorAgent, "^a|b"),
            (MatchKind::VisitorAgent, "c$"),
        ]));
        let pattern = matcher.get(MatchKind::VisitorAgent).unwrap();
        assert_eq!(pattern.describe(), "(?:^a|b)|(?:c$)");
        assert!(pattern.is_merged());
        assert_eq!(pattern.source_count, 2);

        assert!(matcher.is_match(MatchKind::VisitorAgent, "abc"));
        assert!(matcher.is_match(MatchKind::VisitorAgent, "xbx"));
        assert!(matcher.is_match(MatchKind::VisitorAgent, "xxc"));
        assert!(!matcher.is_match(MatchKind::VisitorAgent, "xax"));
        assert!(!matcher.is_match(MatchKind::VisitorAgent, "cx"));
    }

    #[test]
    fn test_combined_matcher_is_case_insensitive() {
        let matcher = PatternCompiler::build(&rules(&[(MatchKind::VisitorAgent, "googlebot")]));
        assert!(matcher.is_match(MatchKind::VisitorAgent, "Mozilla/5.0 (compatible; Googlebot/2.1)"));
    }

    #[test]
    fn test_invalid_pattern_is_dropped() {
        let matcher = PatternCompiler::build(&rules(&[
            (MatchKind::Referrer, "(unclosed"),
            (MatchKind::Referrer, "spam\\.example"),
        ]));
        let pattern = matcher.get(MatchKind::Referrer).unwrap();
        assert_eq!(pattern.source_count, 1);
        assert!(matcher.is_match(MatchKind::Referrer, "https://spam.example/"));
    }

    #[test]
    fn test_kind_without_valid_patterns_is_absent() {
        let mut disabled = MatchRule::new(MatchKind::PageLocation, "checkout");
        disabled.enabled = false;
        let matcher = PatternCompiler::build(&[
            disabled,
            MatchRule::new(MatchKind::Referrer, "[broken"),
        ]);
        assert!(matcher.is_empty());
        assert!(!matcher.is_match(MatchKind::PageLocation, "/checkout"));
    }

    #[test]
    fn test_inline_flags_stay_within_their_rule() {
        // `(?-i)` 仅约束第一条规则，第二条仍大小写不敏感
        let matcher = PatternCompiler::build(&rules(&[
            (MatchKind::VisitorAgent, "(?-i)BOT"),
            (MatchKind::VisitorAgent, "spider"),
        ]));
        assert!(matcher.is_match(MatchKind::VisitorAgent, "Spider/1.0"));
        assert!(matcher.is_match(MatchKind::VisitorAgent, "xBOTx"));
        assert!(!matcher.is_match(MatchKind::VisitorAgent, "xbotx"));

        let verbose = PatternCompiler::build(&rules(&[
            (MatchKind::Referrer, "(?x) spam \\.example"),
            (MatchKind::Referrer, "ads farm"),
        ]));
        assert!(verbose.is_match(MatchKind::Referrer, "https://spam.example/"));
        assert!(verbose.is_match(MatchKind::Referrer, "ads farm network"));
    }

    #[test]
    fn test_duplicate_group_names_keep_both_rules() {
        let matcher = PatternCompiler::build(&rules(&[
            (MatchKind::VisitorAgent, "(?P<n>bot)"),
            (MatchKind::VisitorAgent, "(?P<n>spider)"),
        ]));
        let pattern = matcher.get(MatchKind::VisitorAgent).unwrap();
        assert!(!pattern.is_merged());
        assert_eq!(pattern.source_count, 2);
        assert!(matcher.is_match(MatchKind::VisitorAgent, "Googlebot/2.1"));
        assert!(matcher.is_match(MatchKind::VisitorAgent, "Baiduspider"));
        assert!(!matcher.is_match(MatchKind::VisitorAgent, "Mozilla/5.0"));
    }

    #[test]
    fn test_verbose_comment_rule_falls_back_to_separate_regexes() {
        let matcher = PatternCompiler::build(&rules(&[
            (MatchKind::VisitorAgent, "(?x) crawler  # known crawlers"),
            (MatchKind::VisitorAgent, "headless"),
        ]));
        let pattern = matcher.get(MatchKind::VisitorAgent).unwrap();
        assert!(!pattern.is_merged());
        assert!(matcher.is_match(MatchKind::VisitorAgent, "SomeCrawler/3"));
        assert!(matcher.is_match(MatchKind::VisitorAgent, "HeadlessChrome"));
    }

    #[test]
    fn test_request_triggers_group_by_trigger_kind() {
        let triggers = vec![
            RequestTrigger::new(TriggerKind::QueryParam, TriggerCondition::Contains, "gclid"),
            RequestTrigger::new(TriggerKind::Path, TriggerCondition::Contains, "^/landing"),
            RequestTrigger::new(TriggerKind::QueryParam, TriggerCondition::Contains, "fbclid"),
        ];
        let matcher = PatternCompiler::build(&triggers);
        assert_eq!(matcher.get(TriggerKind::QueryParam).unwrap().source_count, 2);
        assert!(matcher.is_match(TriggerKind::QueryParam, "FBCLID=1"));
        assert!(matcher.is_match(TriggerKind::Path, "/landing/a"));
        assert!(!matcher.is_match(TriggerKind::Url, "https://x/landing"));
    }

    #[test]
    fn test_word_bounded_trigger_pattern() {
        let regex = PatternCompiler::compile_word_bounded("utm_source").unwrap();
        assert!(regex.is_match("?UTM_SOURCE=google"));
        assert!(!regex.is_match("?xutm_sourcex=1"));
    }
}
