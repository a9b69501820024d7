use std::path::Path;

use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::RenderError;

/// A4 页面在 96 DPI 下的宽高
pub const A4_VIEWPORT: (u32, u32) = (794, 1123);
/// 截图按 300 DPI 输出
pub const DEVICE_SCALE_FACTOR: f64 = 300.0 / 96.0;

/// 启动无头浏览器
///
/// # 参数
/// - `executable`: 浏览器可执行文件路径（可选，默认自动查找 Chrome/Chromium）
pub async fn launch_headless_browser(executable: Option<&str>) -> Result<Browser, RenderError> {
    info!("🚀 启动无头浏览器...");

    let mut builder = BrowserConfig::builder()
        .new_headless_mode()
        .viewport(Viewport {
            width: A4_VIEWPORT.0,
            height: A4_VIEWPORT.1,
            device_scale_factor: Some(DEVICE_SCALE_FACTOR),
            ..Default::default()
        })
        .args(vec![
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
        ]);

    if let Some(path) = executable {
        debug!("使用浏览器: {}", path);
        builder = builder.chrome_executable(Path::new(path));
    }

    let config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        RenderError::BrowserLaunch(e.into())
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        RenderError::BrowserLaunch(Box::new(e))
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    Ok(browser)
}
