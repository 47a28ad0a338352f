//! 内存宿主环境
//! 以 [`PageDocument`] 作为元素树，记录全局调用、脚本注入与导航，
//! 可模拟脚本 load 事件与表单提交，供命令行与测试使用

use std::cell::RefCell;
use std::collections::BTreeMap;
use serde::Serialize;
use tracing::debug;

use super::dom::{ElementId, PageDocument};
use super::{ElementQuery, GlobalCall, GlobalStub, HostEnvironment, ScriptTag};

/// 已注入的脚本及其待执行的 load 回调
#[derive(Debug, Clone, Serialize)]
pub struct InjectedScript {
    pub src: String,
    pub is_async: bool,
    pub loaded: bool,
    #[serde(skip)]
    pub on_load: Vec<GlobalCall>,
}

/// 全局对象的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GlobalOrigin {
    /// 页面上其他代码预先定义
    Predefined,
    /// 由初始化桩创建
    Stub(GlobalStub),
}

#[derive(Debug, Default)]
struct HostState {
    globals: BTreeMap<String, GlobalOrigin>,
    calls: Vec<GlobalCall>,
    scripts: Vec<InjectedScript>,
    navigations: Vec<String>,
}

/// 内存页面宿主
#[derive(Debug)]
pub struct PageHost {
    document: RefCell<PageDocument>,
    state: RefCell<HostState>,
}

impl PageHost {
    pub fn from_html(html: &str) -> Self {
        Self::from_document(PageDocument::parse(html))
    }

    pub fn from_document(document: PageDocument) -> Self {
        Self {
            document: RefCell::new(document),
            state: RefCell::new(HostState::default()),
        }
    }

    /// 预定义全局对象（模拟页面上已有的跟踪代码或用户回调）
    pub fn define_global(&self, name: &str) {
        self.state
            .borrow_mut()
            .globals
            .insert(name.to_string(), GlobalOrigin::Predefined);
    }

    pub fn global_origin(&self, name: &str) -> Option<GlobalOrigin> {
        self.state.borrow().globals.get(name).copied()
    }

    /// 全部全局调用记录（按调用顺序）
    pub fn global_calls(&self) -> Vec<GlobalCall> {
        self.state.borrow().calls.clone()
    }

    /// 指定目标的全局调用记录
    pub fn calls_to(&self, target: &str) -> Vec<GlobalCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.target == target)
            .cloned()
            .collect()
    }

    pub fn injected_scripts(&self) -> Vec<InjectedScript> {
        self.state.borrow().scripts.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.borrow().navigations.clone()
    }

    /// 触发 src 对应脚本的 load 事件，返回执行的回调数量
    pub fn complete_script_load(&self, src: &str) -> usize {
        let pending: Vec<GlobalCall> = {
            let mut state = self.state.borrow_mut();
            let Some(script) = state.scripts.iter_mut().find(|s| s.src == src && !s.loaded) else {
                return 0;
            };
            script.loaded = true;
            std::mem::take(&mut script.on_load)
        };

        let count = pending.len();
        for call in pending {
            self.call_global(call);
        }
        debug!(src, callbacks = count, "Script load completed");
        count
    }

    /// 触发所有未加载脚本的 load 事件
    pub fn complete_all_script_loads(&self) -> usize {
        let pending: Vec<String> = self
            .state
            .borrow()
            .scripts
            .iter()
            .filter(|s| !s.loaded)
            .map(|s| s.src.clone())
            .collect();
        pending.iter().map(|src| self.complete_script_load(src)).sum()
    }

    /// 模拟提交表单：存在拦截处理器时返回 false
    pub fn submit_form(&self, form: ElementId) -> bool {
        self.document
            .borrow()
            .element(form)
            .map(|el| el.submit_blockers == 0)
            .unwrap_or(false)
    }

    pub fn submit_blocker_count(&self, form: ElementId) -> usize {
        self.document
            .borrow()
            .element(form)
            .map(|el| el.submit_blockers)
            .unwrap_or(0)
    }

    pub fn to_html(&self) -> String {
        self.document.borrow().to_html()
    }
}

impl HostEnvironment for PageHost {
    fn query_all(&self, query: &ElementQuery) -> Vec<ElementId> {
        self.document.borrow().query(None, query)
    }

    fn query_within(&self, root: ElementId, query: &ElementQuery) -> Vec<ElementId> {
        self.document.borrow().query(Some(root), query)
    }

    fn closest_form(&self, element: ElementId) -> Option<ElementId> {
        self.document.borrow().closest(element, "form")
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.document.borrow().attribute(element, name)
    }

    fn set_attribute(&self, element: ElementId, name: &str, value: &str) {
        self.document.borrow_mut().set_attribute(element, name, value);
    }

    fn set_disabled(&self, element: ElementId, disabled: bool) {
        if let Some(el) = self.document.borrow_mut().element_mut(element) {
            el.disabled = disabled;
        }
    }

    fn is_disabled(&self, element: ElementId) -> bool {
        self.document
            .borrow()
            .element(element)
            .map(|el| el.disabled)
            .unwrap_or(false)
    }

    fn add_submit_blocker(&self, form: ElementId) {
        if let Some(el) = self.document.borrow_mut().element_mut(form) {
            el.submit_blockers += 1;
        }
    }

    fn append_element(&self, parent: Option<ElementId>, tag: &str, attrs: &[(&str, &str)]) -> ElementId {
        self.document.borrow_mut().append_element(parent, tag, attrs)
    }

    fn has_global(&self, name: &str) -> bool {
        self.state.borrow().globals.contains_key(name)
    }

    fn install_global(&self, name: &str, stub: &GlobalStub) {
        let mut state = self.state.borrow_mut();
        if let GlobalStub::DataLayerFunction { layer } = stub {
            state
                .globals
                .entry(layer.to_string())
                .or_insert(GlobalOrigin::Stub(GlobalStub::Array));
        }
        state
            .globals
            .entry(name.to_string())
            .or_insert(GlobalOrigin::Stub(*stub));
    }

    fn call_global(&self, call: GlobalCall) {
        debug!(call_target = %call.target, args = ?call.args, "Global call");
        self.state.borrow_mut().calls.push(call);
    }

    fn inject_script(&self, script: ScriptTag, on_load: Vec<GlobalCall>) {
        let async_value = if script.is_async { "true" } else { "false" };
        self.document
            .borrow_mut()
            .append_element(None, "script", &[("src", script.src.as_str()), ("async", async_value)]);
        self.state.borrow_mut().scripts.push(InjectedScript {
            src: script.src,
            is_async: script.is_async,
            loaded: false,
            on_load,
        });
    }

    fn navigate(&self, url: &str) {
        self.state.borrow_mut().navigations.push(url.to_string());
    }
}
