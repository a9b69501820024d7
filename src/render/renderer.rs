//! 渲染能力
//!
//! 只负责"把 HTML 变成 PNG / PDF 文件"，不关心切块和检查点。

use std::path::Path;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, PrintToPdfParams};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use tracing::{debug, warn};

use crate::browser::launch_headless_browser;
use crate::error::RenderError;

/// 40px 页边距（英寸）
const PDF_MARGIN_INCHES: f64 = 40.0 / 96.0;
const A4_WIDTH_INCHES: f64 = 8.27;
const A4_HEIGHT_INCHES: f64 = 11.69;

/// 渲染协作方
#[async_trait]
pub trait Renderer: Send + Sync {
    /// 整页截图保存为 PNG
    async fn render_png(&self, html: &str, path: &Path) -> Result<(), RenderError>;

    /// 按 A4 打印为 PDF
    async fn render_pdf(&self, html: &str, path: &Path) -> Result<(), RenderError>;
}

/// 基于无头 Chromium 的渲染器
///
/// 一个批次共享同一个浏览器进程，每次渲染打开一个新标签页。
pub struct ChromiumRenderer {
    browser: Browser,
}

impl ChromiumRenderer {
    pub async fn launch(executable: Option<&str>) -> Result<Self, RenderError> {
        let browser = launch_headless_browser(executable).await?;
        Ok(Self { browser })
    }

    /// 关闭浏览器进程
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("关闭浏览器失败: {}", e);
        }
        let _ = self.browser.wait().await;
    }

    async fn open(&self, html: &str, path: &Path) -> Result<Page, RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::page_failed(path, e))?;
        page.set_content(html)
            .await
            .map_err(|e| RenderError::page_failed(path, e))?;
        Ok(page)
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render_png(&self, html: &str, path: &Path) -> Result<(), RenderError> {
        let page = self.open(html, path).await?;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();

        let result = page.save_screenshot(params, path).await;
        let _ = page.close().await;
        result.map_err(|e| RenderError::page_failed(path, e))?;

        debug!("✓ 已生成图片: {}", path.display());
        Ok(())
    }

    async fn render_pdf(&self, html: &str, path: &Path) -> Result<(), RenderError> {
        let page = self.open(html, path).await?;

        let params = PrintToPdfParams {
            print_background: Some(true),
            prefer_css_page_size: Some(true),
            scale: Some(1.0),
            paper_width: Some(A4_WIDTH_INCHES),
            paper_height: Some(A4_HEIGHT_INCHES),
            margin_top: Some(PDF_MARGIN_INCHES),
            margin_bottom: Some(PDF_MARGIN_INCHES),
            margin_left: Some(PDF_MARGIN_INCHES),
            margin_right: Some(PDF_MARGIN_INCHES),
            ..Default::default()
        };

        let result = page.save_pdf(params, path).await;
        let _ = page.close().await;
        result.map_err(|e| RenderError::page_failed(path, e))?;

        debug!("✓ 已生成 PDF: {}", path.display());
        Ok(())
    }
}
