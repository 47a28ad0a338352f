//! 各广告平台的初始化描述（纯数据）
//! 脚本地址、全局桩形态、触发调用签名、同步/加载后触发方式均在此声明，
//! 由 [`super::executor`] 统一解释执行

use serde_json::{json, Map, Value};

use crate::host::{GlobalCall, GlobalStub};
use crate::rule::AdPlatform;

/// 标签 id 占位符
pub const TAG_ID_PLACEHOLDER: &str = "{id}";

/// 触发时机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireTiming {
    /// 创建桩后立即触发
    Immediate,
    /// 加载脚本 load 事件后触发
    OnLoad,
}

/// 调用参数模板
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgTemplate {
    /// 字符串字面量
    Str(&'static str),
    /// 标签 id
    TagId,
    /// `{ <key>: 标签 id }` 形式的对象
    TagIdObject(&'static str),
    /// 当前时间戳（毫秒）
    Timestamp,
}

impl ArgTemplate {
    fn render(&self, tag_id: &str, timestamp_ms: u64) -> Value {
        match *self {
            ArgTemplate::Str(s) => Value::String(s.to_string()),
            ArgTemplate::TagId => Value::String(tag_id.to_string()),
            ArgTemplate::TagIdObject(key) => {
                let mut map = Map::new();
                map.insert(key.to_string(), Value::String(tag_id.to_string()));
                Value::Object(map)
            }
            ArgTemplate::Timestamp => json!(timestamp_ms),
        }
    }
}

/// 全局调用模板
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTemplate {
    pub target: &'static str,
    pub args: &'static [ArgTemplate],
}

impl CallTemplate {
    pub const fn new(target: &'static str, args: &'static [ArgTemplate]) -> Self {
        Self { target, args }
    }

    pub fn render(&self, tag_id: &str, timestamp_ms: u64) -> GlobalCall {
        GlobalCall::new(
            self.target,
            self.args.iter().map(|a| a.render(tag_id, timestamp_ms)).collect(),
        )
    }
}

/// 平台初始化描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformBootstrap {
    pub platform: AdPlatform,
    /// 判断是否已初始化的全局跟踪对象
    pub global: &'static str,
    pub stub: GlobalStub,
    /// 伴随创建的其他全局对象
    pub companion_globals: &'static [(&'static str, GlobalStub)],
    /// 加载脚本地址模板，`{id}` 替换为首个标签 id；
    /// None 表示由触发调用自行加载（如 `ttq.load`）
    pub loader_url: Option<&'static str>,
    /// 创建桩后执行一次的调用
    pub setup: &'static [CallTemplate],
    /// 每个标签 id 各执行一次的触发调用
    pub fire: &'static [CallTemplate],
    pub timing: FireTiming,
    /// noscript 像素回退地址模板
    pub noscript_pixel: Option<&'static str>,
}

impl PlatformBootstrap {
    pub fn loader_src(&self, first_tag_id: &str) -> Option<String> {
        self.loader_url
            .map(|tpl| tpl.replace(TAG_ID_PLACEHOLDER, &encode_component(first_tag_id)))
    }

    pub fn noscript_src(&self, tag_id: &str) -> Option<String> {
        self.noscript_pixel
            .map(|tpl| tpl.replace(TAG_ID_PLACEHOLDER, &encode_component(tag_id)))
    }

    pub fn fire_calls(&self, tag_id: &str, timestamp_ms: u64) -> Vec<GlobalCall> {
        self.fire.iter().map(|c| c.render(tag_id, timestamp_ms)).collect()
    }

    pub fn setup_calls(&self, timestamp_ms: u64) -> Vec<GlobalCall> {
        self.setup.iter().map(|c| c.render("", timestamp_ms)).collect()
    }
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub const GOOGLE: PlatformBootstrap = PlatformBootstrap {
    platform: AdPlatform::Google,
    global: "gtag",
    stub: GlobalStub::DataLayerFunction { layer: "dataLayer" },
    companion_globals: &[],
    loader_url: Some("https://www.googletagmanager.com/gtag/js?id={id}"),
    setup: &[CallTemplate::new("gtag", &[ArgTemplate::Str("js"), ArgTemplate::Timestamp])],
    fire: &[CallTemplate::new("gtag", &[ArgTemplate::Str("config"), ArgTemplate::TagId])],
    timing: FireTiming::OnLoad,
    noscript_pixel: None,
};

pub const META: PlatformBootstrap = PlatformBootstrap {
    platform: AdPlatform::Meta,
    global: "fbq",
    stub: GlobalStub::QueuedFunction,
    companion_globals: &[("_fbq", GlobalStub::QueuedFunction)],
    loader_url: Some("https://connect.facebook.net/en_US/fbevents.js"),
    setup: &[],
    fire: &[
        CallTemplate::new("fbq", &[ArgTemplate::Str("init"), ArgTemplate::TagId]),
        CallTemplate::new("fbq", &[ArgTemplate::Str("track"), ArgTemplate::Str("PageView")]),
    ],
    timing: FireTiming::Immediate,
    noscript_pixel: Some("https://www.facebook.com/tr?id={id}&ev=PageView&noscript=1"),
};

pub const MICROSOFT: PlatformBootstrap = PlatformBootstrap {
    platform: AdPlatform::Microsoft,
    global: "uetq",
    stub: GlobalStub::Array,
    companion_globals: &[],
    loader_url: Some("https://bat.bing.com/bat.js"),
    setup: &[],
    fire: &[
        CallTemplate::new("UET", &[ArgTemplate::TagIdObject("ti")]),
        CallTemplate::new("uetq.push", &[ArgTemplate::Str("pageLoad")]),
    ],
    timing: FireTiming::OnLoad,
    noscript_pixel: None,
};

pub const LINKEDIN: PlatformBootstrap = PlatformBootstrap {
    platform: AdPlatform::LinkedIn,
    global: "lintrk",
    stub: GlobalStub::QueuedFunction,
    companion_globals: &[("_linkedin_data_partner_ids", GlobalStub::Array)],
    loader_url: Some("https://snap.licdn.com/li.lms-analytics/insight.min.js"),
    setup: &[],
    fire: &[
        CallTemplate::new("_linkedin_data_partner_ids.push", &[ArgTemplate::TagId]),
        CallTemplate::new("lintrk", &[ArgTemplate::Str("track")]),
    ],
    timing: FireTiming::Immediate,
    noscript_pixel: Some("https://px.ads.linkedin.com/collect/?pid={id}&fmt=gif"),
};

pub const TIKTOK: PlatformBootstrap = PlatformBootstrap {
    platform: AdPlatform::TikTok,
    global: "ttq",
    stub: GlobalStub::MethodQueue {
        methods: &["page", "track", "identify", "instances", "debug", "on", "off", "once", "ready", "alias", "group", "enableCookie", "disableCookie"],
    },
    companion_globals: &[],
    loader_url: None,
    setup: &[],
    fire: &[
        CallTemplate::new("ttq.load", &[ArgTemplate::TagId]),
        CallTemplate::new("ttq.page", &[]),
    ],
    timing: FireTiming::Immediate,
    noscript_pixel: None,
};

pub const TWITTER: PlatformBootstrap = PlatformBootstrap {
    platform: AdPlatform::Twitter,
    global: "twq",
    stub: GlobalStub::QueuedFunction,
    companion_globals: &[],
    loader_url: Some("https://static.ads-twitter.com/uwt.js"),
    setup: &[],
    fire: &[CallTemplate::new("twq", &[ArgTemplate::Str("config"), ArgTemplate::TagId])],
    timing: FireTiming::OnLoad,
    noscript_pixel: None,
};

/// 平台 → 初始化描述
pub fn bootstrap_for(platform: AdPlatform) -> &'static PlatformBootstrap {
    match platform {
        AdPlatform::Google => &GOOGLE,
        AdPlatform::Meta => &META,
        AdPlatform::Microsoft => &MICROSOFT,
        AdPlatform::LinkedIn => &LINKEDIN,
        AdPlatform::TikTok => &TIKTOK,
        AdPlatform::Twitter => &TWITTER,
    }
}
