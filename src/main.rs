//! rsclickguard 命令行：对一个 HTML 页面模拟一次完整的访客处理流程

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rsclickguard::{
    ConfigManager, EngineConfig, FraudClient, PageContext, PageEngine, PageHost, RequestContext,
    StaticClient, VerdictTier,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fraud-verdict driven page guard and ad tag deployment")]
struct Args {
    /// JSON 配置文件，缺省时使用默认配置
    #[arg(long)]
    config: Option<PathBuf>,

    /// 待处理的 HTML 页面
    #[arg(long)]
    page: PathBuf,

    /// 访客判定等级：good | warning | bad
    #[arg(long, default_value = "good")]
    verdict: VerdictTier,

    /// 命中的规则集标签（可重复）
    #[arg(long = "rule-set")]
    rule_sets: Vec<String>,

    #[arg(long)]
    visitor_id: Option<String>,

    #[arg(long, default_value = "")]
    user_agent: String,

    #[arg(long, default_value = "https://localhost/")]
    url: String,

    #[arg(long, default_value = "")]
    referrer: String,

    /// 按登录页处理
    #[arg(long)]
    login_page: bool,

    /// 页面上预先存在的全局对象（可重复）
    #[arg(long = "globals")]
    globals: Vec<String>,

    /// 处理后的 HTML 输出路径，缺省写到标准输出
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConfigManager::get_default(),
    };

    let html = tokio::fs::read_to_string(&args.page)
        .await
        .with_context(|| format!("failed to read page {}", args.page.display()))?;
    let host = PageHost::from_html(&html);
    for name in &args.globals {
        host.define_global(name);
    }

    let mut client = StaticClient::new(args.verdict).with_rule_sets(args.rule_sets.clone());
    if let Some(id) = &args.visitor_id {
        client = client.with_visitor_id(id.clone());
    }

    let page_context = if args.login_page {
        PageContext::LoginPage
    } else {
        PageContext::Standard
    };
    let req = RequestContext::new(&args.user_agent, &args.url, &args.referrer).with_page_context(page_context);

    let engine = PageEngine::new(config);
    let (decision, outcome) = engine.run(&host, &client, &req).await?;
    let loaded = host.complete_all_script_loads();
    info!(decision = ?decision, deferred_calls = loaded, "Page processed");

    let report = json!({
        "decision": decision,
        "outcome": &outcome,
        "ticks": outcome.as_ref().and_then(|o| o.polling.as_ref()).map(|s| s.tick_count()),
        "navigations": host.navigations(),
        "globalCalls": host.global_calls(),
        "injectedScripts": host.injected_scripts(),
        "libraryCalls": client.library_calls(),
        "visitorId": client.visitor_id(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    let rendered = host.to_html();
    match &args.output {
        Some(path) => tokio::fs::write(path, rendered)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", rendered),
    }
    Ok(())
}
