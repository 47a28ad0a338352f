//! 动作命令工厂：符号名 → 命令变体

use super::command::{ActionCommand, ActionKind};
use crate::error::CgResult;

/// 动作命令工厂
pub struct ActionCommandFactory;

impl ActionCommandFactory {
    /// 按动作名构建命令；未知名称返回 [`ClickGuardError::UnknownAction`]
    ///
    /// [`ClickGuardError::UnknownAction`]: crate::error::ClickGuardError::UnknownAction
    pub fn create(name: &str, stop_after_first: bool) -> CgResult<ActionCommand> {
        let command = match name.parse::<ActionKind>()? {
            ActionKind::DisableForms => ActionCommand::DisableForms { stop_after_first },
            ActionKind::DisableCommentSubmits => ActionCommand::DisableCommentSubmits { stop_after_first },
            ActionKind::DisableAllSubmits => ActionCommand::DisableAllSubmits { stop_after_first },
            ActionKind::DisableLinks => ActionCommand::DisableLinks { stop_after_first },
            ActionKind::DisableAllInputs => ActionCommand::DisableAllInputs,
        };
        Ok(command)
    }
}
