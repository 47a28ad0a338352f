//! 宿主环境模块
//! 页面元素树、全局作用域、脚本注入与跳转等浏览器能力统一抽象为注入的能力对象，
//! 幂等检查（"全局对象是否已存在"、"表单是否已加防护标记"）都通过它显式读取

pub mod dom;
pub mod page;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use self::dom::{ElementId, PageDocument};
pub use self::page::{InjectedScript, PageHost};

/// 表单已注册提交拦截的标记属性
pub const GUARD_MARKER_ATTR: &str = "data-cg-guarded";

/// 元素查询（封闭的选择器集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementQuery {
    /// 指定标签名
    Tag(&'static str),
    /// 任一标签名
    AnyTag(&'static [&'static str]),
    /// 提交类控件：`input[type=submit]` 与默认/显式 submit 的 `button`
    SubmitControl,
    /// 指定 id
    Id(&'static str),
    /// 位于指定 id 祖先元素内部的匹配元素
    Within {
        ancestor_id: &'static str,
        inner: &'static ElementQuery,
    },
}

/// 表单内可禁用的控件
pub const FORM_CONTROLS: ElementQuery = ElementQuery::AnyTag(&["input", "button", "textarea", "select"]);

/// 全局跟踪对象的初始化桩形态（对应各平台官方片段的内联初始化写法）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GlobalStub {
    /// 数据层数组 + 向其推送参数的函数（gtag 形态）
    DataLayerFunction { layer: &'static str },
    /// 调用先进入 queue，加载完成后回放的函数（fbq / twq / lintrk 形态）
    QueuedFunction,
    /// 普通数组（uetq / 合作伙伴 id 列表形态）
    Array,
    /// 预置具名方法、调用先排队的对象（ttq 形态）
    MethodQueue { methods: &'static [&'static str] },
}

/// 对全局函数/方法的一次调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalCall {
    /// 调用目标，点号分隔路径，如 `gtag`、`ttq.page`
    pub target: String,
    pub args: Vec<Value>,
}

impl GlobalCall {
    pub fn new(target: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            target: target.into(),
            args,
        }
    }
}

/// 待注入的脚本元素
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptTag {
    pub src: String,
    pub is_async: bool,
}

impl ScriptTag {
    pub fn async_src(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            is_async: true,
        }
    }
}

/// 宿主环境能力（单线程，所有方法以 `&self` 调用）
pub trait HostEnvironment {
    // ===================== 元素树 =====================
    /// 按文档顺序返回全部匹配元素
    fn query_all(&self, query: &ElementQuery) -> Vec<ElementId>;
    /// 返回 root 子树内（不含 root）按文档顺序的匹配元素
    fn query_within(&self, root: ElementId, query: &ElementQuery) -> Vec<ElementId>;
    /// 最近的祖先 form 元素
    fn closest_form(&self, element: ElementId) -> Option<ElementId>;
    fn attribute(&self, element: ElementId, name: &str) -> Option<String>;
    fn set_attribute(&self, element: ElementId, name: &str, value: &str);
    /// 设置元素的 disabled 标记（锚点上为应用层约定的非标准标记）
    fn set_disabled(&self, element: ElementId, disabled: bool);
    fn is_disabled(&self, element: ElementId) -> bool;
    /// 为表单注册阻止默认提交并停止冒泡的处理器
    fn add_submit_blocker(&self, form: ElementId);
    /// 在 parent 末尾追加子元素，parent 为 None 时追加到 body（无 body 时为文档根）
    fn append_element(&self, parent: Option<ElementId>, tag: &str, attrs: &[(&str, &str)]) -> ElementId;

    // ===================== 全局作用域 =====================
    fn has_global(&self, name: &str) -> bool;
    fn install_global(&self, name: &str, stub: &GlobalStub);
    fn call_global(&self, call: GlobalCall);

    // ===================== 脚本与导航 =====================
    /// 注入脚本，on_load 中的调用在脚本 load 事件触发后执行
    fn inject_script(&self, script: ScriptTag, on_load: Vec<GlobalCall>);
    fn navigate(&self, url: &str);
}
