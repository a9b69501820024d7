use anyhow::Result;
use clap::Parser;
use tracing::error;

use longmem_bench::cli::Cli;
use longmem_bench::config::Config;
use longmem_bench::logger;
use longmem_bench::orchestrator::App;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日志
    logger::init(cli.common.verbose);

    if let Err(err) = run(cli).await {
        error!("❌ 执行失败: {}", err);
        for cause in err.chain().skip(1) {
            error!("   原因: {}", cause);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // 加载配置：默认值 → 配置文件 → 环境变量 → 命令行
    let mut config = Config::load(cli.common.config.as_deref())?;
    cli.common.apply(&mut config);

    let app = App::new(config, cli.common.limit)?;
    app.run(cli.command).await
}
