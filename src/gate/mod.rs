//! 准入模块：决定当前访客/请求是否需要运行引擎
pub mod request;
pub mod visitor_gate;

pub use self::request::RequestContext;
pub use self::visitor_gate::{GateDecision, VisitorGate};
