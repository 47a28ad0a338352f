//! 防护动作命令
//! 封闭的动作变体集合，统一以 `execute()` 执行；每次轮询都会重复调用，
//! 因此所有副作用必须可重复执行（表单拦截以标记属性保证只注册一次）

use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::client::FraudClient;
use crate::error::{CgResult, ClickGuardError};
use crate::host::{ElementId, ElementQuery, HostEnvironment, FORM_CONTROLS, GUARD_MARKER_ATTR};

/// 动作名称
pub const DISABLE_FORMS: &str = "disableForms";
pub const DISABLE_COMMENT_SUBMITS: &str = "disableCommentSubmits";
pub const DISABLE_ALL_SUBMITS: &str = "disableAllSubmits";
pub const DISABLE_LINKS: &str = "disableLinks";
pub const DISABLE_ALL_INPUTS: &str = "disableAllInputs";
/// 登录防护动作，由登录页流程单独处理，不进入轮询
pub const BLOCK_LOGIN: &str = "blockLogin";

/// 评论表单提交按钮的位置
pub const COMMENT_SUBMIT: ElementQuery = ElementQuery::Within {
    ancestor_id: "commentform",
    inner: &ElementQuery::SubmitControl,
};

/// 动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    DisableForms,
    DisableCommentSubmits,
    DisableAllSubmits,
    DisableLinks,
    DisableAllInputs,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::DisableForms => DISABLE_FORMS,
            ActionKind::DisableCommentSubmits => DISABLE_COMMENT_SUBMITS,
            ActionKind::DisableAllSubmits => DISABLE_ALL_SUBMITS,
            ActionKind::DisableLinks => DISABLE_LINKS,
            ActionKind::DisableAllInputs => DISABLE_ALL_INPUTS,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ClickGuardError;

    fn from_str(name: &str) -> CgResult<Self> {
        match name {
            DISABLE_FORMS => Ok(ActionKind::DisableForms),
            DISABLE_COMMENT_SUBMITS => Ok(ActionKind::DisableCommentSubmits),
            DISABLE_ALL_SUBMITS => Ok(ActionKind::DisableAllSubmits),
            DISABLE_LINKS => Ok(ActionKind::DisableLinks),
            DISABLE_ALL_INPUTS => Ok(ActionKind::DisableAllInputs),
            other => Err(ClickGuardError::UnknownAction(other.to_string())),
        }
    }
}

/// 防护动作命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCommand {
    /// 禁用所有表单内控件，并为每个表单注册一次提交拦截
    DisableForms { stop_after_first: bool },
    /// 仅拦截评论表单的提交按钮
    DisableCommentSubmits { stop_after_first: bool },
    /// 禁用页面上所有提交类控件，并拦截其所属表单
    DisableAllSubmits { stop_after_first: bool },
    /// 为所有锚点设置非标准的 disabled 标记（需由使用方显式检查）
    DisableLinks { stop_after_first: bool },
    /// 委托客户端内置的输入禁用例程
    DisableAllInputs,
}

impl ActionCommand {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionCommand::DisableForms { .. } => ActionKind::DisableForms,
            ActionCommand::DisableCommentSubmits { .. } => ActionKind::DisableCommentSubmits,
            ActionCommand::DisableAllSubmits { .. } => ActionKind::DisableAllSubmits,
            ActionCommand::DisableLinks { .. } => ActionKind::DisableLinks,
            ActionCommand::DisableAllInputs => ActionKind::DisableAllInputs,
        }
    }

    /// 执行一次；无匹配元素时为空操作
    pub fn execute(&self, host: &dyn HostEnvironment, client: &dyn FraudClient) {
        match *self {
            ActionCommand::DisableForms { stop_after_first } => {
                for form in first_or_all(host.query_all(&ElementQuery::Tag("form")), stop_after_first) {
                    for control in host.query_within(form, &FORM_CONTROLS) {
                        host.set_disabled(control, true);
                    }
                    guard_form(host, form);
                }
            }
            ActionCommand::DisableCommentSubmits { stop_after_first } => {
                disable_submits(host, &COMMENT_SUBMIT, stop_after_first);
            }
            ActionCommand::DisableAllSubmits { stop_after_first } => {
                disable_submits(host, &ElementQuery::SubmitControl, stop_after_first);
            }
            ActionCommand::DisableLinks { stop_after_first } => {
                for link in first_or_all(host.query_all(&ElementQuery::Tag("a")), stop_after_first) {
                    host.set_disabled(link, true);
                }
            }
            ActionCommand::DisableAllInputs => client.library().disable_inputs(),
        }
    }
}

fn first_or_all(elements: Vec<ElementId>, stop_after_first: bool) -> impl Iterator<Item = ElementId> {
    let limit = if stop_after_first { 1 } else { usize::MAX };
    elements.into_iter().take(limit)
}

fn disable_submits(host: &dyn HostEnvironment, query: &ElementQuery, stop_after_first: bool) {
    for button in first_or_all(host.query_all(query), stop_after_first) {
        host.set_disabled(button, true);
        if let Some(form) = host.closest_form(button) {
            guard_form(host, form);
        }
    }
}

/// 为表单注册提交拦截；已带标记的表单直接跳过
pub(crate) fn guard_form(host: &dyn HostEnvironment, form: ElementId) -> bool {
    if host.attribute(form, GUARD_MARKER_ATTR).is_some() {
        return false;
    }
    host.set_attribute(form, GUARD_MARKER_ATTR, "true");
    host.add_submit_blocker(form);
    debug!(form = form.index(), "Submission blocker attached");
    true
}
