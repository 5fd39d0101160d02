use std::process::ExitCode;

use clap::Parser;
use phone_status_scraper::cli::Cli;
use phone_status_scraper::{logger, App, Config, RunExit};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    // 加载配置：环境变量，然后命令行
    let mut config = Config::from_env();
    Cli::parse().apply(&mut config);

    // 初始化日志
    if let Err(e) = logger::init(config.verbosity, Some(&config.log_file())) {
        eprintln!("日志初始化失败: {:#}", e);
    }

    // 初始化并运行应用
    let exit = match App::initialize(config).await {
        Ok(app) => match app.run().await {
            Ok(exit) => exit,
            Err(e) => {
                error!("❌ {}", e);
                e.exit_status()
            }
        },
        Err(e) => {
            error!("❌ {}", e);
            e.exit_status()
        }
    };

    if exit != RunExit::Success {
        error!("退出码: {}", exit.code());
    }
    ExitCode::from(exit.code())
}
