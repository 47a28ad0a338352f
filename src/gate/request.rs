//! 请求上下文：访客代理、页面地址、来源页及其派生字段

use serde::{Deserialize, Serialize};
use url::Url;

use crate::rule::{MatchKind, PageContext, TriggerKind};

/// 当前页面请求的上下文
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestContext {
    pub user_agent: String,
    pub url: String,
    pub referrer: String,
    pub page_context: PageContext,
}

impl RequestContext {
    pub fn new(user_agent: impl Into<String>, url: impl Into<String>, referrer: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            url: url.into(),
            referrer: referrer.into(),
            page_context: PageContext::Standard,
        }
    }

    pub fn with_page_context(mut self, page_context: PageContext) -> Self {
        self.page_context = page_context;
        self
    }

    pub fn is_login_page(&self) -> bool {
        self.page_context == PageContext::LoginPage
    }

    /// 页面路径（地址无法解析时退化为完整地址）
    pub fn path(&self) -> String {
        match Url::parse(&self.url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => self.url.clone(),
        }
    }

    /// 查询字符串（不含 `?`）
    pub fn query(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|parsed| parsed.query().map(str::to_string))
            .unwrap_or_default()
    }

    /// 机器人过滤规则各维度对应的输入
    pub fn match_input(&self, kind: MatchKind) -> &str {
        match kind {
            MatchKind::VisitorAgent => &self.user_agent,
            MatchKind::PageLocation => &self.url,
            MatchKind::Referrer => &self.referrer,
        }
    }

    /// 请求触发器各维度对应的输入
    pub fn trigger_input(&self, kind: TriggerKind) -> String {
        match kind {
            TriggerKind::Url => self.url.clone(),
            TriggerKind::Path => self.path(),
            TriggerKind::QueryParam => self.query(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_path_and_query() {
        let req = RequestContext::new("ua", "https://shop.example/landing/page?gclid=abc&x=1", "");
        assert_eq!(req.path(), "/landing/page");
        assert_eq!(req.query(), "gclid=abc&x=1");
        assert_eq!(req.trigger_input(TriggerKind::Url), req.url);
    }

    #[test]
    fn test_unparseable_url_falls_back() {
        let req = RequestContext::new("ua", "/relative/only", "");
        assert_eq!(req.path(), "/relative/only");
        assert_eq!(req.query(), "");
    }
}
