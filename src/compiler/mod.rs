//! 编译模块：将文本规则编译为可执行的合并正则
pub mod pattern;
pub mod compiler;

pub use self::pattern::{CombinedPattern, PatternMatcher, PatternSource};
pub use self::compiler::PatternCompiler;
