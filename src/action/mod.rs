//! 防护动作模块
//! 条件求值 → 命令工厂 → 轮询调度

pub mod command;
pub mod condition;
pub mod factory;
pub mod scheduler;

pub use self::command::{ActionCommand, ActionKind, BLOCK_LOGIN, COMMENT_SUBMIT};
pub use self::condition::ConditionEvaluator;
pub use self::factory::ActionCommandFactory;
pub use self::scheduler::{
    build_commands, redirect_target, RetryScheduler, SchedulerState, StartOutcome, TickOutcome,
};
