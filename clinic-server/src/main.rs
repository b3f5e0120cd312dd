//! 诊所服务器主程序

mod config;

use clap::Parser;
use clinic_web::{AppState, WebServer};
use config::ClinicConfig;
use std::net::SocketAddr;
use tracing::{error, info};

/// 诊所服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "clinic-server")]
#[command(about = "大学诊所管理系统服务器")]
struct Args {
    /// 监听主机
    #[arg(long)]
    host: Option<String>,

    /// 服务器端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    info!("启动诊所服务器...");

    // 加载配置，命令行参数优先于配置文件
    let mut config = match &args.config {
        Some(path) => ClinicConfig::load(path)?,
        None => ClinicConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("诊所服务器配置:");
    info!("  监听主机: {}", config.server.host);
    info!("  监听端口: {}", config.server.port);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address: {}", e))?;

    // 创建并启动Web服务器
    let state = AppState::new();
    let server = WebServer::new(addr, state);

    if let Err(e) = server.run().await {
        error!("服务器启动失败: {}", e);
        return Err(e.into());
    }

    Ok(())
}
