//! 轮询重试调度器
//! 状态机：Idle → RedirectCheck → Polling → Stopped
//! 以可恢复的步进函数 [`RetryScheduler::tick`] 暴露，计时器、任务队列或测试时钟都可驱动；
//! [`RetryScheduler::run`] 是基于 tokio interval 的默认驱动

use std::time::Duration;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::command::{ActionCommand, BLOCK_LOGIN};
use super::condition::ConditionEvaluator;
use super::factory::ActionCommandFactory;
use crate::client::FraudClient;
use crate::host::HostEnvironment;
use crate::rule::{ActionConfig, RedirectSettings, RetryPolicy, Verdict};

/// 调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    RedirectCheck,
    Polling,
    Stopped,
}

/// 启动结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum StartOutcome {
    /// 已跳转（终态，不执行任何动作）
    Redirected { url: String },
    /// 无可执行动作，未启动计时器
    NothingToRun,
    /// 已进入轮询
    Polling { commands: usize },
}

/// 单次步进结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 需要继续调度下一次
    Continue,
    /// 不再调度
    Stopped,
}

/// 跳转判定：条件满足、目标已设置，且未因爬虫豁免而放行
pub fn redirect_target<'a>(redirect: &'a RedirectSettings, verdict: &Verdict) -> Option<&'a str> {
    if !ConditionEvaluator::evaluate(redirect.condition, verdict.tier) {
        return None;
    }
    let url = redirect.url.as_deref().filter(|u| !u.trim().is_empty())?;
    if redirect.bypass_web_crawlers && verdict.is_web_crawler() {
        debug!(url, "Redirect bypassed for web crawler");
        return None;
    }
    Some(url)
}

/// 按判定等级筛选并构建命令；未知动作名记录后跳过
pub fn build_commands(actions: &[ActionConfig], verdict: &Verdict, stop_after_first: bool) -> Vec<ActionCommand> {
    actions
        .iter()
        .filter(|action| action.name != BLOCK_LOGIN)
        .filter(|action| ConditionEvaluator::evaluate(action.result_condition, verdict.tier))
        .filter_map(|action| match ActionCommandFactory::create(&action.name, stop_after_first) {
            Ok(command) => {
                debug!(action = %command.kind(), condition = ?action.result_condition, "Action scheduled");
                Some(command)
            }
            Err(e) => {
                warn!(action = %action.name, error = %e, "Skipping action");
                None
            }
        })
        .collect()
}

/// 轮询重试调度器
#[derive(Debug)]
pub struct RetryScheduler {
    state: SchedulerState,
    commands: Vec<ActionCommand>,
    budget: Duration,
    interval: Duration,
    stop_after_first: bool,
    started_at: Option<Instant>,
    ticks: u32,
}

impl RetryScheduler {
    pub fn new(retry: &RetryPolicy) -> Self {
        Self {
            state: SchedulerState::Idle,
            commands: Vec::new(),
            budget: retry.duration(),
            interval: retry.poll_interval(),
            stop_after_first: retry.stop_after_first_element,
            started_at: None,
            ticks: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn commands(&self) -> &[ActionCommand] {
        &self.commands
    }

    /// 已执行的步进次数
    pub fn tick_count(&self) -> u32 {
        self.ticks
    }

    pub fn is_polling(&self) -> bool {
        self.state == SchedulerState::Polling
    }

    /// 启动：先做跳转判定，再构建命令列表；仅在 Idle 状态有效
    pub fn start(
        &mut self,
        actions: &[ActionConfig],
        redirect: &RedirectSettings,
        verdict: &Verdict,
        host: &dyn HostEnvironment,
        now: Instant,
    ) -> StartOutcome {
        if self.state != SchedulerState::Idle {
            return match self.state {
                SchedulerState::Polling => StartOutcome::Polling { commands: self.commands.len() },
                _ => StartOutcome::NothingToRun,
            };
        }

        self.state = SchedulerState::RedirectCheck;
        if let Some(url) = redirect_target(redirect, verdict) {
            info!(url, tier = %verdict.tier, "Redirecting visitor");
            host.navigate(url);
            self.state = SchedulerState::Stopped;
            return StartOutcome::Redirected { url: url.to_string() };
        }

        self.commands = build_commands(actions, verdict, self.stop_after_first);
        if self.commands.is_empty() {
            debug!(tier = %verdict.tier, "No applicable actions, scheduler stopped");
            self.state = SchedulerState::Stopped;
            return StartOutcome::NothingToRun;
        }

        info!(
            commands = self.commands.len(),
            budget_ms = self.budget.as_millis() as u64,
            stop_after_first = self.stop_after_first,
            "Polling started"
        );
        self.started_at = Some(now);
        self.state = SchedulerState::Polling;
        StartOutcome::Polling { commands: self.commands.len() }
    }

    /// 单次步进：先检查是否到期，再按顺序执行全部命令；
    /// 到期或首个元素即停时，本次执行完成后不再调度
    pub fn tick(&mut self, now: Instant, host: &dyn HostEnvironment, client: &dyn FraudClient) -> TickOutcome {
        if self.state != SchedulerState::Polling {
            return TickOutcome::Stopped;
        }

        let started_at = *self.started_at.get_or_insert(now);
        let expired = now.saturating_duration_since(started_at) >= self.budget;

        for command in &self.commands {
            command.execute(host, client);
        }
        self.ticks += 1;

        if expired || self.stop_after_first {
            self.state = SchedulerState::Stopped;
            info!(ticks = self.ticks, expired, "Polling stopped");
            return TickOutcome::Stopped;
        }
        TickOutcome::Continue
    }

    /// 以固定间隔驱动步进直至停止，返回总步进次数
    pub async fn run(&mut self, host: &dyn HostEnvironment, client: &dyn FraudClient) -> u32 {
        if !self.is_polling() {
            return self.ticks;
        }

        let start = self.started_at.unwrap_or_else(Instant::now);
        let mut interval = tokio::time::interval_at(start + self.interval, self.interval);
        loop {
            let now = interval.tick().await;
            if self.tick(now, host, client) == TickOutcome::Stopped {
                break;
            }
        }
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::command::{DISABLE_ALL_INPUTS, DISABLE_ALL_SUBMITS, DISABLE_LINKS};
    use crate::client::{LibraryCall, StaticClient};
    use crate::host::{ElementQuery, PageHost};
    use crate::rule::{ResultCondition, VerdictTier};

    fn retry(duration_seconds: u32, stop_after_first_element: bool) -> RetryPolicy {
        RetryPolicy {
            duration_seconds,
            stop_after_first_element,
        }
    }

    fn verdict(tier: VerdictTier) -> Verdict {
        Verdict::new(tier, Vec::new())
    }

    fn redirect_on_bad(bypass_web_crawlers: bool) -> RedirectSettings {
        RedirectSettings {
            condition: ResultCondition::OnBad,
            url: Some("https://example.com/blocked".into()),
            bypass_web_crawlers,
        }
    }

    #[test]
    fn test_redirect_is_terminal() {
        let host = PageHost::from_html("<form><input type=\"submit\"></form>");
        let mut scheduler = RetryScheduler::new(&retry(5, false));
        let actions = vec![ActionConfig::new(DISABLE_ALL_SUBMITS, ResultCondition::OnBad)];

        let outcome = scheduler.start(&actions, &redirect_on_bad(false), &verdict(VerdictTier::Bad), &host, Instant::now());
        assert_eq!(outcome, StartOutcome::Redirected { url: "https://example.com/blocked".into() });
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(host.navigations(), vec!["https://example.com/blocked".to_string()]);
        assert!(scheduler.commands().is_empty());
    }

    #[test]
    fn test_redirect_bypassed_for_web_crawler() {
        let host = PageHost::from_html("");
        let mut scheduler = RetryScheduler::new(&retry(5, false));
        let crawler = Verdict::new(VerdictTier::Bad, vec!["web_crawler".into()]);
        let outcome = scheduler.start(&[], &redirect_on_bad(true), &crawler, &host, Instant::now());
        assert_eq!(outcome, StartOutcome::NothingToRun);
        assert!(host.navigations().is_empty());

        // 未开启豁免时爬虫同样跳转
        assert!(redirect_target(&redirect_on_bad(false), &crawler).is_some());
    }

    #[test]
    fn test_redirect_requires_url() {
        let settings = RedirectSettings {
            condition: ResultCondition::OnBoth,
            url: None,
            bypass_web_crawlers: false,
        };
        assert_eq!(redirect_target(&settings, &verdict(VerdictTier::Warning)), None);
    }

    #[test]
    fn test_build_commands_skips_unknown_and_reserved() {
        let actions = vec![
            ActionConfig::new("bogusAction", ResultCondition::OnBoth),
            ActionConfig::new(BLOCK_LOGIN, ResultCondition::OnBoth),
            ActionConfig::new(DISABLE_LINKS, ResultCondition::OnBad),
            ActionConfig::new(DISABLE_ALL_INPUTS, ResultCondition::OnWarning),
        ];
        let commands = build_commands(&actions, &verdict(VerdictTier::Bad), false);
        assert_eq!(commands, vec![ActionCommand::DisableLinks { stop_after_first: false }]);
    }

    #[test]
    fn test_empty_command_list_never_polls() {
        let host = PageHost::from_html("");
        let client = StaticClient::new(VerdictTier::Good);
        let mut scheduler = RetryScheduler::new(&retry(5, false));
        let actions = vec![ActionConfig::new(DISABLE_LINKS, ResultCondition::OnBoth)];
        let now = Instant::now();
        assert_eq!(
            scheduler.start(&actions, &RedirectSettings::default(), &verdict(VerdictTier::Good), &host, now),
            StartOutcome::NothingToRun
        );
        assert_eq!(scheduler.tick(now, &host, &client), TickOutcome::Stopped);
        assert_eq!(scheduler.tick_count(), 0);
    }

    #[test]
    fn test_step_function_expires_after_budget() {
        let host = PageHost::from_html("");
        let client = StaticClient::new(VerdictTier::Bad);
        let mut scheduler = RetryScheduler::new(&retry(1, false));
        let actions = vec![ActionConfig::new(DISABLE_ALL_INPUTS, ResultCondition::OnBad)];
        let start = Instant::now();
        scheduler.start(&actions, &RedirectSettings::default(), &verdict(VerdictTier::Bad), &host, start);

        let mut step = 1;
        while scheduler.tick(start + Duration::from_millis(200 * step), &host, &client) == TickOutcome::Continue {
            step += 1;
        }
        assert_eq!(scheduler.tick_count(), 5);
        assert_eq!(client.library_calls().len(), 5);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_stop_after_first_runs_single_tick() {
        let host = PageHost::from_html(
            r#"<form><input type="submit"></form><form><input type="submit"></form><form><input type="submit"></form>"#,
        );
        let client = StaticClient::new(VerdictTier::Warning);
        let mut scheduler = RetryScheduler::new(&retry(30, true));
        let actions = vec![ActionConfig::new(DISABLE_ALL_SUBMITS, ResultCondition::OnBoth)];
        let start = Instant::now();
        scheduler.start(&actions, &RedirectSettings::default(), &verdict(VerdictTier::Warning), &host, start);

        assert_eq!(scheduler.tick(start + Duration::from_millis(200), &host, &client), TickOutcome::Stopped);
        let submits = host.query_all(&ElementQuery::SubmitControl);
        assert!(host.is_disabled(submits[0]));
        assert!(!host.is_disabled(submits[1]));
        assert!(!host.is_disabled(submits[2]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_executes_about_five_times_per_second() {
        let host = PageHost::from_html("");
        let client = StaticClient::new(VerdictTier::Bad);
        let mut scheduler = RetryScheduler::new(&retry(1, false));
        let actions = vec![ActionConfig::new(DISABLE_ALL_INPUTS, ResultCondition::OnBoth)];
        scheduler.start(&actions, &RedirectSettings::default(), &verdict(VerdictTier::Bad), &host, Instant::now());

        let ticks = scheduler.run(&host, &client).await;
        assert_eq!(ticks, 5);
        assert!(client.library_calls().iter().all(|c| *c == LibraryCall::DisableInputs));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }
}
