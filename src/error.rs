//! 全局错误类型定义

use thiserror::Error;
use regex::Error as RegexError;
use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;
use url::ParseError as UrlParseError;

#[derive(Error, Debug)]
pub enum ClickGuardError {
    // 配置形态错误（分发边界捕获后跳过，不向访客暴露）
    #[error("未知的防护动作：{0}")]
    UnknownAction(String),
    #[error("不支持的排除受众平台：{platform}（支持的平台：{supported}）")]
    UnsupportedPlatform { platform: String, supported: String },
    #[error("无效配置：{0}")]
    InvalidConfig(String),

    // 编译相关错误
    #[error("正则编译失败：{0}")]
    RegexCompileError(#[from] RegexError),

    // 序列化/反序列化错误
    #[error("JSON解析失败：{0}")]
    JsonError(#[from] SerdeJsonError),

    // 基础错误
    #[error("IO操作失败：{0}")]
    IoError(#[from] IoError),
    #[error("URL解析失败：{0}")]
    UrlError(#[from] UrlParseError),
    #[error("无效输入：{0}")]
    InvalidInput(String),
}

// 全局Result类型
pub type CgResult<T> = Result<T, ClickGuardError>;
