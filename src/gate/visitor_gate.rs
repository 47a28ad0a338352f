//! 访客准入判定
//! 机器人过滤与请求触发器两项检查同时通过才运行引擎，登录页始终放行

use serde::Serialize;
use tracing::{debug, warn};

use super::request::RequestContext;
use crate::compiler::{PatternCompiler, PatternMatcher};
use crate::config::{BotFilterConfig, TriggerConfig};
use crate::rule::{MatchKind, RequestTrigger, TriggerCondition};

/// 准入判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GateDecision {
    /// 登录页，跳过全部检查
    LoginPage,
    /// 两项检查均通过
    Proceed,
    /// 命中机器人过滤规则
    FilteredBot,
    /// 请求触发器未满足
    TriggerNotSatisfied,
}

impl GateDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, GateDecision::LoginPage | GateDecision::Proceed)
    }
}

/// 访客准入闸门
#[derive(Debug, Clone)]
pub struct VisitorGate {
    bot_filter_active: bool,
    bot_matcher: PatternMatcher<MatchKind>,
    triggers_enabled: bool,
    triggers: Vec<RequestTrigger>,
}

impl VisitorGate {
    pub fn new(bot_filter: &BotFilterConfig, request_triggers: &TriggerConfig) -> Self {
        let has_enabled_rule = bot_filter.rules.iter().any(|r| r.enabled);
        let bot_filter_active = bot_filter.enabled && has_enabled_rule;
        let bot_matcher = if bot_filter_active {
            PatternCompiler::build(&bot_filter.rules)
        } else {
            PatternMatcher::empty()
        };

        Self {
            bot_filter_active,
            bot_matcher,
            triggers_enabled: request_triggers.enabled,
            triggers: request_triggers
                .triggers
                .iter()
                .filter(|t| t.enabled && !t.text_pattern.trim().is_empty())
                .cloned()
                .collect(),
        }
    }

    /// 综合判定
    pub fn evaluate(&self, req: &RequestContext) -> GateDecision {
        if req.is_login_page() {
            return GateDecision::LoginPage;
        }
        if self.is_filtered_bot(req) {
            debug!(user_agent = %req.user_agent, "Visitor filtered as bot");
            return GateDecision::FilteredBot;
        }
        if !self.triggers_allow(req) {
            debug!(url = %req.url, "Request triggers not satisfied");
            return GateDecision::TriggerNotSatisfied;
        }
        GateDecision::Proceed
    }

    /// 机器人过滤：任一维度规则命中对应输入即判为机器人
    pub fn is_filtered_bot(&self, req: &RequestContext) -> bool {
        if !self.bot_filter_active {
            return false;
        }
        self.bot_matcher.matches_any(
            [MatchKind::VisitorAgent, MatchKind::PageLocation, MatchKind::Referrer]
                .into_iter()
                .map(|kind| (kind, req.match_input(kind))),
        )
    }

    /// 请求触发器：按列表顺序求值，首个满足条件的触发器即放行；
    /// 遇到无法编译的触发器立即判为不放行
    pub fn triggers_allow(&self, req: &RequestContext) -> bool {
        if !self.triggers_enabled || self.triggers.is_empty() {
            return true;
        }

        for trigger in &self.triggers {
            let regex = match PatternCompiler::compile_word_bounded(&trigger.text_pattern) {
                Ok(regex) => regex,
                Err(e) => {
                    warn!(pattern = %trigger.text_pattern, error = %e, "Request trigger failed to compile, not proceeding");
                    return false;
                }
            };

            let matched = regex.is_match(&req.trigger_input(trigger.kind));
            let satisfied = match trigger.condition {
                TriggerCondition::Contains => matched,
                TriggerCondition::DoesNotContain => !matched,
            };
            if satisfied {
                debug!(pattern = %trigger.text_pattern, kind = ?trigger.kind, "Request trigger satisfied");
                return true;
            }
        }

        false
    }
}
