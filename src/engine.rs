//! 页面引擎：准入 → 注入分析脚本 → 判定下发后的处理
//! 判定处理顺序：跳转判定/轮询启动 → 排除受众（非 good）→ 标签部署（good）→ 用户回调
//! 跳转只取代轮询，其余步骤不受影响

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::action::{RetryScheduler, StartOutcome};
use crate::client::FraudClient;
use crate::config::EngineConfig;
use crate::error::CgResult;
use crate::exclusion::{ExclusionAudienceManager, ExclusionReport};
use crate::gate::{GateDecision, RequestContext, VisitorGate};
use crate::host::{ElementId, ElementQuery, GlobalCall, HostEnvironment, ScriptTag};
use crate::rule::{AdPlatform, PageContext, VerdictTier};
use crate::tag::{DeployOutcome, TagDeploymentManager};

/// 登录表单的元素 id
pub const LOGIN_FORM_ID: &str = "loginform";
/// 登录表单中携带访客标识的隐藏字段名
pub const VISITOR_ID_FIELD: &str = "cg_visitor_id";

/// 判定处理结果
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOutcome {
    pub tier: Option<VerdictTier>,
    /// 登录页写入的访客标识
    pub login_visitor_id: Option<String>,
    pub scheduler: Option<StartOutcome>,
    pub exclusions: Vec<ExclusionReport>,
    pub tags: Vec<(AdPlatform, DeployOutcome)>,
    pub callback_invoked: bool,
    /// 仍在轮询的调度器，由调用方驱动
    #[serde(skip)]
    pub polling: Option<RetryScheduler>,
}

impl EngineOutcome {
    pub fn redirected(&self) -> Option<&str> {
        match &self.scheduler {
            Some(StartOutcome::Redirected { url }) => Some(url),
            _ => None,
        }
    }
}

/// 页面引擎
#[derive(Debug)]
pub struct PageEngine {
    config: EngineConfig,
    gate: VisitorGate,
    tags: TagDeploymentManager,
    exclusions: ExclusionAudienceManager,
}

impl PageEngine {
    pub fn new(config: EngineConfig) -> Self {
        let gate = VisitorGate::new(&config.bot_filter, &config.request_triggers);
        Self {
            config,
            gate,
            tags: TagDeploymentManager::with_default_strategies(),
            exclusions: ExclusionAudienceManager::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn should_run(&self, req: &RequestContext) -> GateDecision {
        self.gate.evaluate(req)
    }

    /// 构建分析脚本元素
    pub fn loader_script(&self, cache_buster: u32) -> CgResult<ScriptTag> {
        let loader = &self.config.loader;
        let mut url = Url::parse(&loader.endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("id", &self.config.instance_id.to_string());
            if let Some(callback) = self.config.callback_name.as_deref().filter(|c| !c.is_empty()) {
                query.append_pair("callback", callback);
            }
            if let Some(source) = loader.source.as_deref().filter(|s| !s.is_empty()) {
                query.append_pair("source", source);
            }
            if let Some(campaign) = loader.campaign.as_deref().filter(|c| !c.is_empty()) {
                query.append_pair("campaign", campaign);
            }
            if !loader.additional_data.is_empty() {
                let mut data = Map::new();
                for (i, entry) in loader.additional_data.iter().enumerate() {
                    data.insert((i + 1).to_string(), json!({ "key": entry.key, "value": entry.value }));
                }
                query.append_pair("data", &Value::Object(data).to_string());
            }
            query.append_pair("rnd", &cache_buster.to_string());
        }
        Ok(ScriptTag::async_src(url.to_string()))
    }

    /// 以随机防缓存参数注入分析脚本
    pub fn inject_loader(&self, host: &dyn HostEnvironment) -> CgResult<ScriptTag> {
        let script = self.loader_script(rand::random::<u32>())?;
        host.inject_script(script.clone(), Vec::new());
        info!(src = %script.src, "Loader script injected");
        Ok(script)
    }

    /// 判定下发后的处理
    pub fn handle_verdict(
        &self,
        host: &dyn HostEnvironment,
        client: &dyn FraudClient,
        page_context: PageContext,
        now: Instant,
    ) -> EngineOutcome {
        let mut outcome = EngineOutcome::default();
        let Some(verdict) = client.verdict() else {
            warn!("Verdict unavailable, nothing to do");
            return outcome;
        };
        outcome.tier = Some(verdict.tier);

        if page_context == PageContext::LoginPage {
            outcome.login_visitor_id = self.write_login_field(host, client);
            return outcome;
        }

        let mut scheduler = RetryScheduler::new(&self.config.retry);
        let start = scheduler.start(&self.config.actions, &self.config.redirect, &verdict, host, now);
        outcome.scheduler = Some(start);
        // 跳转仅终止轮询，排除受众、标签与回调照常执行
        if scheduler.is_polling() {
            outcome.polling = Some(scheduler);
        }

        if verdict.tier != VerdictTier::Good && !self.config.exclusion_audiences.is_empty() {
            outcome.exclusions = self.exclusions.apply(client.library(), &self.config.exclusion_audiences);
        }
        if verdict.tier == VerdictTier::Good {
            outcome.tags = self.tags.handle_good_result(host, &self.config.tags);
        }

        if let Some(name) = self.config.callback_name.as_deref().filter(|n| !n.is_empty()) {
            if host.has_global(name) {
                host.call_global(GlobalCall::new(name, Vec::new()));
                outcome.callback_invoked = true;
            } else {
                debug!(callback = name, "User callback not defined");
            }
        }

        info!(
            tier = %verdict.tier,
            exclusions = outcome.exclusions.len(),
            tags = outcome.tags.len(),
            polling = outcome.polling.is_some(),
            "Verdict handled"
        );
        outcome
    }

    /// 完整流程：准入 → 注入分析脚本 → 等待判定 → 处理 → 轮询至结束
    pub async fn run(
        &self,
        host: &dyn HostEnvironment,
        client: &dyn FraudClient,
        req: &RequestContext,
    ) -> CgResult<(GateDecision, Option<EngineOutcome>)> {
        let decision = self.should_run(req);
        if !decision.should_run() {
            info!(decision = ?decision, "Engine skipped for this request");
            return Ok((decision, None));
        }

        self.inject_loader(host)?;

        let mut handled = None;
        client.query_result(&mut |c: &dyn FraudClient| {
            handled = Some(self.handle_verdict(host, c, req.page_context, Instant::now()));
        });

        if let Some(outcome) = handled.as_mut() {
            if let Some(scheduler) = outcome.polling.as_mut() {
                scheduler.run(host, client).await;
            }
        }
        Ok((decision, handled))
    }

    /// 登录页：在登录表单中追加或替换携带访客标识的隐藏字段
    fn write_login_field(&self, host: &dyn HostEnvironment, client: &dyn FraudClient) -> Option<String> {
        let visitor_id = client.visitor_id().filter(|id| !id.is_empty())?;
        let Some(form) = host.query_all(&ElementQuery::Id(LOGIN_FORM_ID)).into_iter().next() else {
            debug!("Login form not found");
            return None;
        };

        match find_named_input(host, form, VISITOR_ID_FIELD) {
            Some(existing) => host.set_attribute(existing, "value", &visitor_id),
            None => {
                host.append_element(
                    Some(form),
                    "input",
                    &[("type", "hidden"), ("name", VISITOR_ID_FIELD), ("value", visitor_id.as_str())],
                );
            }
        }
        debug!(visitor_id = %visitor_id, "Login visitor field written");
        Some(visitor_id)
    }
}

fn find_named_input(host: &dyn HostEnvironment, form: ElementId, name: &str) -> Option<ElementId> {
    host.query_within(form, &ElementQuery::Tag("input"))
        .into_iter()
        .find(|&input| host.attribute(input, "name").as_deref() == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{LibraryCall, StaticClient};
    use crate::config::{AdditionalData, ConfigManager, LoaderSettings};
    use crate::host::PageHost;
    use crate::rule::{
        ActionConfig, ExclusionAudience, MatchKind, MatchRule, RedirectSettings, ResultCondition, RetryPolicy,
        TagConfig,
    };

    const PAGE: &str = r#"<html><body>
<form id="contact"><input type="text" name="email"><button>Send</button></form>
</body></html>"#;

    fn guarded_config() -> EngineConfig {
        ConfigManager::custom()
            .instance_id(7)
            .callback_name("onGuardDone")
            .action(ActionConfig::new("disableAllSubmits", ResultCondition::OnBoth))
            .retry(RetryPolicy { duration_seconds: 1, stop_after_first_element: false })
            .tag(TagConfig::new(AdPlatform::Meta, "111"))
            .exclusion_audience(ExclusionAudience::new("meta", [("pixelId", "111")]))
            .build()
    }

    #[test]
    fn test_loader_script_query() {
        let config = ConfigManager::custom()
            .instance_id(42)
            .callback_name("cb")
            .loader(LoaderSettings {
                source: Some("adwords".into()),
                additional_data: vec![AdditionalData { key: "k".into(), value: "v".into() }],
                ..LoaderSettings::default()
            })
            .build();
        let script = PageEngine::new(config).loader_script(99).unwrap();
        assert!(script.is_async);

        let url = Url::parse(&script.src).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("id".into(), "42".into()));
        assert_eq!(pairs[1], ("callback".into(), "cb".into()));
        assert_eq!(pairs[2], ("source".into(), "adwords".into()));
        assert_eq!(pairs[3].0, "data");
        let data: Value = serde_json::from_str(&pairs[3].1).unwrap();
        assert_eq!(data, json!({"1": {"key": "k", "value": "v"}}));
        assert_eq!(pairs[4], ("rnd".into(), "99".into()));
    }

    #[test]
    fn test_bad_verdict_starts_polling_and_excludes() {
        let host = PageHost::from_html(PAGE);
        host.define_global("onGuardDone");
        let client = StaticClient::new(VerdictTier::Bad);
        let engine = PageEngine::new(guarded_config());

        let outcome = engine.handle_verdict(&host, &client, PageContext::Standard, Instant::now());
        assert_eq!(outcome.scheduler, Some(StartOutcome::Polling { commands: 1 }));
        assert!(outcome.polling.is_some());
        assert_eq!(outcome.exclusions.len(), 1);
        assert!(outcome.tags.is_empty());
        assert!(outcome.callback_invoked);
        assert_eq!(host.calls_to("onGuardDone").len(), 1);
        assert_eq!(
            client.library_calls(),
            vec![LibraryCall::AddExclusions { platform: "meta".into(), ids: vec!["111".into()] }]
        );
    }

    #[test]
    fn test_good_verdict_deploys_tags_only() {
        let host = PageHost::from_html(PAGE);
        let client = StaticClient::new(VerdictTier::Good);
        let outcome = PageEngine::new(guarded_config()).handle_verdict(&host, &client, PageContext::Standard, Instant::now());
        assert_eq!(outcome.scheduler, Some(StartOutcome::NothingToRun));
        assert!(outcome.exclusions.is_empty());
        assert_eq!(outcome.tags.len(), 1);
        assert!(!outcome.callback_invoked);
        assert!(client.library_calls().is_empty());
    }

    #[test]
    fn test_redirect_replaces_polling_but_still_excludes() {
        let mut config = guarded_config();
        config.redirect = RedirectSettings {
            condition: ResultCondition::OnBad,
            url: Some("https://example.com/denied".into()),
            bypass_web_crawlers: false,
        };
        let host = PageHost::from_html(PAGE);
        host.define_global("onGuardDone");
        let client = StaticClient::new(VerdictTier::Bad);
        let outcome = PageEngine::new(config).handle_verdict(&host, &client, PageContext::Standard, Instant::now());
        assert_eq!(outcome.redirected(), Some("https://example.com/denied"));
        assert_eq!(host.navigations(), vec!["https://example.com/denied".to_string()]);
        assert!(outcome.polling.is_none());
        assert_eq!(outcome.exclusions.len(), 1);
        assert_eq!(
            client.library_calls(),
            vec![LibraryCall::AddExclusions { platform: "meta".into(), ids: vec!["111".into()] }]
        );
        assert!(outcome.callback_invoked);
        assert_eq!(host.calls_to("onGuardDone").len(), 1);
    }

    #[test]
    fn test_login_page_writes_hidden_field_once() {
        let host = PageHost::from_html(r#"<form id="loginform"><input name="log"><input type="submit"></form>"#);
        let client = StaticClient::new(VerdictTier::Bad).with_visitor_id("v-1");
        let engine = PageEngine::new(guarded_config());

        let outcome = engine.handle_verdict(&host, &client, PageContext::LoginPage, Instant::now());
        assert_eq!(outcome.login_visitor_id.as_deref(), Some("v-1"));
        assert!(outcome.scheduler.is_none());

        let client = StaticClient::new(VerdictTier::Bad).with_visitor_id("v-2");
        engine.handle_verdict(&host, &client, PageContext::LoginPage, Instant::now());

        let form = host.query_all(&ElementQuery::Id(LOGIN_FORM_ID))[0];
        let field = find_named_input(&host, form, VISITOR_ID_FIELD).unwrap();
        assert_eq!(host.attribute(field, "type").as_deref(), Some("hidden"));
        assert_eq!(host.attribute(field, "value").as_deref(), Some("v-2"));
        assert_eq!(host.to_html().matches(VISITOR_ID_FIELD).count(), 1);
        // 登录页不触发任何防护动作
        let submit = host.query_all(&ElementQuery::SubmitControl)[0];
        assert!(!host.is_disabled(submit));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_gates_bots() {
        let config = ConfigManager::custom()
            .bot_filter(true, vec![MatchRule::new(MatchKind::VisitorAgent, "Googlebot")])
            .build();
        let engine = PageEngine::new(config);
        let host = PageHost::from_html(PAGE);
        let client = StaticClient::new(VerdictTier::Bad);
        let req = RequestContext::new("Mozilla/5.0 (compatible; Googlebot/2.1)", "https://shop.example/", "");

        let (decision, outcome) = engine.run(&host, &client, &req).await.unwrap();
        assert_eq!(decision, GateDecision::FilteredBot);
        assert!(outcome.is_none());
        assert!(host.injected_scripts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_until_budget_spent() {
        let engine = PageEngine::new(guarded_config());
        let host = PageHost::from_html(PAGE);
        let client = StaticClient::new(VerdictTier::Warning);
        let req = RequestContext::new("Mozilla/5.0", "https://shop.example/contact", "");

        let (decision, outcome) = engine.run(&host, &client, &req).await.unwrap();
        assert_eq!(decision, GateDecision::Proceed);
        let outcome = outcome.unwrap();
        let scheduler = outcome.polling.as_ref().unwrap();
        assert_eq!(scheduler.tick_count(), 5);

        let button = host.query_all(&ElementQuery::SubmitControl)[0];
        assert!(host.is_disabled(button));
        let form = host.closest_form(button).unwrap();
        assert!(!host.submit_form(form));
        assert_eq!(host.injected_scripts().len(), 1);
    }
}
