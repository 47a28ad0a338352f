//! 内存页面元素树
//! 基于 html5ever 分词器把 HTML 构建为扁平节点池，并可序列化回 HTML

use std::cell::RefCell;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts
};
use markup5ever::interface::Attribute;
use serde::Serialize;
use tendril::StrTendril;

use super::ElementQuery;

/// 空元素（无结束标签）
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

/// 文档根节点下标
const ROOT: usize = 0;

/// 元素句柄（节点池下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub disabled: bool,
    pub submit_blockers: usize,
}

impl ElementData {
    fn new(tag: String, attrs: Vec<(String, String)>) -> Self {
        // disabled 以标记位保存，序列化时再还原为属性
        let disabled = attrs.iter().any(|(name, _)| name == "disabled");
        let attrs = attrs.into_iter().filter(|(name, _)| name != "disabled").collect();
        Self {
            tag,
            attrs,
            disabled,
            submit_blockers: 0,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    fn is_submit_control(&self) -> bool {
        let kind = self.attribute("type").map(str::to_ascii_lowercase);
        match self.tag.as_str() {
            "input" => kind.as_deref() == Some("submit"),
            // button 缺省 type 即为 submit
            "button" => matches!(kind.as_deref(), None | Some("submit")),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Document,
    Doctype(String),
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// 页面文档
#[derive(Debug, Clone)]
pub struct PageDocument {
    nodes: Vec<Node>,
}

impl Default for PageDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PageDocument {
    /// 仅含文档根的空文档
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// 解析HTML字符串（容错，不校验嵌套合法性）
    pub fn parse(html: &str) -> Self {
        let sink = DomSink {
            doc: RefCell::new(PageDocument::new()),
            open: RefCell::new(Vec::new()),
        };
        let tokenizer = Tokenizer::new(sink, TokenizerOpts::default());
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from(html));

        let _ = tokenizer.feed(&queue);
        tokenizer.end();

        tokenizer.sink.doc.into_inner()
    }

    pub fn element(&self, id: ElementId) -> Option<&ElementData> {
        match self.nodes.get(id.0).map(|n| &n.data) {
            Some(NodeData::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> Option<&mut ElementData> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.data) {
            Some(NodeData::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn attribute(&self, id: ElementId, name: &str) -> Option<String> {
        self.element(id)
            .and_then(|el| el.attribute(name))
            .map(str::to_string)
    }

    pub(crate) fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.set_attribute(name, value);
        }
    }

    /// 按文档顺序查询；root 为 None 时查询整个文档
    pub fn query(&self, root: Option<ElementId>, query: &ElementQuery) -> Vec<ElementId> {
        let start = root.map(|r| r.0).unwrap_or(ROOT);
        self.descendants(start)
            .into_iter()
            .filter(|&idx| self.matches(idx, query))
            .map(ElementId)
            .collect()
    }

    /// 最近的指定标签祖先元素
    pub fn closest(&self, id: ElementId, tag: &str) -> Option<ElementId> {
        let mut cursor = self.nodes.get(id.0)?.parent;
        while let Some(idx) = cursor {
            if self.is_tag(idx, tag) {
                return Some(ElementId(idx));
            }
            cursor = self.nodes[idx].parent;
        }
        None
    }

    pub fn body(&self) -> Option<ElementId> {
        self.query(None, &ElementQuery::Tag("body")).into_iter().next()
    }

    /// 追加子元素，parent 为 None 时追加到 body（无 body 时为文档根）
    pub(crate) fn append_element(
        &mut self,
        parent: Option<ElementId>,
        tag: &str,
        attrs: &[(&str, &str)],
    ) -> ElementId {
        let parent_idx = parent
            .or_else(|| self.body())
            .map(|p| p.0)
            .filter(|&idx| idx < self.nodes.len())
            .unwrap_or(ROOT);
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let idx = self.push_node(parent_idx, NodeData::Element(ElementData::new(tag.to_ascii_lowercase(), attrs)));
        ElementId(idx)
    }

    /// 序列化为HTML
    pub fn to_html(&self) -> String {
        let mut out = String::with_capacity(self.nodes.len() * 16);
        for &child in &self.nodes[ROOT].children {
            self.write_node(child, &mut out);
        }
        out
    }

    fn push_node(&mut self, parent: usize, data: NodeData) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(idx);
        idx
    }

    /// 前序遍历子树（不含起点）
    fn descendants(&self, start: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[start].children.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            out.push(idx);
            stack.extend(self.nodes[idx].children.iter().rev().copied());
        }
        out
    }

    fn is_tag(&self, idx: usize, tag: &str) -> bool {
        matches!(&self.nodes[idx].data, NodeData::Element(el) if el.tag.eq_ignore_ascii_case(tag))
    }

    fn has_ancestor_with_id(&self, idx: usize, id: &str) -> bool {
        let mut cursor = self.nodes[idx].parent;
        while let Some(p) = cursor {
            if let NodeData::Element(el) = &self.nodes[p].data {
                if el.attribute("id") == Some(id) {
                    return true;
                }
            }
            cursor = self.nodes[p].parent;
        }
        false
    }

    fn matches(&self, idx: usize, query: &ElementQuery) -> bool {
        let NodeData::Element(el) = &self.nodes[idx].data else {
            return false;
        };
        match query {
            ElementQuery::Tag(tag) => el.tag.eq_ignore_ascii_case(tag),
            ElementQuery::AnyTag(tags) => tags.iter().any(|t| el.tag.eq_ignore_ascii_case(t)),
            ElementQuery::SubmitControl => el.is_submit_control(),
            ElementQuery::Id(id) => el.attribute("id") == Some(*id),
            ElementQuery::Within { ancestor_id, inner } => {
                self.matches(idx, inner) && self.has_ancestor_with_id(idx, ancestor_id)
            }
        }
    }

    fn in_raw_text(&self, idx: usize) -> bool {
        self.nodes[idx]
            .parent
            .map(|p| self.is_tag(p, "script") || self.is_tag(p, "style"))
            .unwrap_or(false)
    }

    fn write_node(&self, idx: usize, out: &mut String) {
        match &self.nodes[idx].data {
            NodeData::Document => {}
            NodeData::Doctype(name) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeData::Text(text) => {
                if self.in_raw_text(idx) {
                    out.push_str(text);
                } else {
                    escape_into(text, false, out);
                }
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                if el.disabled {
                    out.push_str(" disabled");
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                    return;
                }
                for &child in &self.nodes[idx].children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}

fn escape_into(text: &str, in_attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' if in_attribute => out.push_str("&quot;"),
            '<' if !in_attribute => out.push_str("&lt;"),
            '>' if !in_attribute => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// 分词器回调：维护打开元素栈并构建节点池
struct DomSink {
    doc: RefCell<PageDocument>,
    open: RefCell<Vec<usize>>,
}

impl DomSink {
    fn current_parent(&self) -> usize {
        self.open.borrow().last().copied().unwrap_or(ROOT)
    }

    fn push(&self, data: NodeData) -> usize {
        let parent = self.current_parent();
        self.doc.borrow_mut().push_node(parent, data)
    }

    fn process_tag(&self, tag: Tag) -> TokenSinkResult<()> {
        let name = tag.name.as_ref().to_ascii_lowercase();
        match tag.kind {
            TagKind::StartTag => {
                let attrs = tag
                    .attrs
                    .iter()
                    .map(|attr: &Attribute| (attr.name.local.as_ref().to_string(), attr.value.to_string()))
                    .collect();
                let idx = self.push(NodeData::Element(ElementData::new(name.clone(), attrs)));
                let is_void = tag.self_closing || VOID_ELEMENTS.contains(&name.as_str());
                if is_void {
                    return TokenSinkResult::Continue;
                }
                self.open.borrow_mut().push(idx);

                // 原始文本元素需切换分词状态，避免内联脚本被当作标签解析
                match name.as_str() {
                    "script" => TokenSinkResult::RawData(RawKind::ScriptData),
                    "style" => TokenSinkResult::RawData(RawKind::Rawtext),
                    "textarea" | "title" => TokenSinkResult::RawData(RawKind::Rcdata),
                    _ => TokenSinkResult::Continue,
                }
            }
            TagKind::EndTag => {
                let doc = self.doc.borrow();
                let mut open = self.open.borrow_mut();
                if let Some(pos) = open.iter().rposition(|&idx| doc.is_tag(idx, &name)) {
                    open.truncate(pos);
                }
                TokenSinkResult::Continue
            }
        }
    }
}

impl TokenSink for DomSink {
    type Handle = ();

    fn process_token(&self, token: Token, _line: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => return self.process_tag(tag),
            Token::CharacterTokens(text) => {
                self.push(NodeData::Text(text.to_string()));
            }
            Token::CommentToken(text) => {
                self.push(NodeData::Comment(text.to_string()));
            }
            Token::DoctypeToken(doctype) => {
                let name = doctype
                    .name
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "html".to_string());
                self.push(NodeData::Doctype(name));
            }
            _ => {}
        }
        TokenSinkResult::Continue
    }
}
