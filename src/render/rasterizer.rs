//! PDF 栅格化
//!
//! 把一个 PDF 的每一页写成 `<out>/page.N.png`（N 从 1 开始），
//! 产物可以直接作为图片上下文使用。

use std::path::{Path, PathBuf};
use std::thread;

use async_trait::async_trait;
use pdfium_render::prelude::*;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::RenderError;

/// A4 在 150 DPI 下的像素尺寸
pub const PAGE_WIDTH_PX: i32 = 1240;
pub const PAGE_HEIGHT_PX: i32 = 1754;

/// 栅格化协作方
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// 把 PDF 每一页写成 `out_dir/page.N.png`
    ///
    /// # 返回
    /// 写出的页数
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<usize, RenderError>;
}

/// 第 N 页（从 1 开始）的文件名
pub fn page_file_name(page_number: usize) -> String {
    format!("page.{}.png", page_number)
}

struct RasterizeRequest {
    pdf: PathBuf,
    out_dir: PathBuf,
    reply: oneshot::Sender<Result<usize, RenderError>>,
}

/// 基于 pdfium 的栅格化器
///
/// pdfium 实例不能跨线程使用，由一个专用线程持有，请求按到达顺序依次处理。
pub struct PdfiumRasterizer {
    requests: mpsc::UnboundedSender<RasterizeRequest>,
}

impl PdfiumRasterizer {
    /// 启动渲染线程并绑定 pdfium 动态库
    ///
    /// # 参数
    /// - `library_dir`: pdfium 动态库所在目录（可选，找不到时回退到系统库）
    pub async fn launch(library_dir: Option<&str>) -> Result<Self, RenderError> {
        let library_dir = library_dir.map(PathBuf::from);
        let (requests, mut inbox) = mpsc::unbounded_channel::<RasterizeRequest>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), RenderError>>();

        thread::Builder::new()
            .name("pdfium".to_string())
            .spawn(move || {
                let pdfium = match bind_pdfium(library_dir.as_deref()) {
                    Ok(pdfium) => {
                        let _ = ready_tx.send(Ok(()));
                        pdfium
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Some(request) = inbox.blocking_recv() {
                    let result = rasterize_file(&pdfium, &request.pdf, &request.out_dir);
                    let _ = request.reply.send(result);
                }
                debug!("pdfium 渲染线程退出");
            })
            .map_err(|e| RenderError::PdfiumUnavailable(Box::new(e)))?;

        ready_rx
            .await
            .map_err(|e| RenderError::PdfiumUnavailable(Box::new(e)))??;

        info!("✓ pdfium 已加载");
        Ok(Self { requests })
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<usize, RenderError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(RasterizeRequest {
                pdf: pdf.to_path_buf(),
                out_dir: out_dir.to_path_buf(),
                reply,
            })
            .map_err(|_| RenderError::PdfiumUnavailable("渲染线程已退出".into()))?;

        answer
            .await
            .map_err(|_| RenderError::PdfiumUnavailable("渲染线程已退出".into()))?
    }
}

fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, RenderError> {
    let dir = library_dir.unwrap_or_else(|| Path::new("./"));
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| RenderError::PdfiumUnavailable(e.to_string().into()))?;
    Ok(Pdfium::new(bindings))
}

fn rasterize_file(pdfium: &Pdfium, pdf: &Path, out_dir: &Path) -> Result<usize, RenderError> {
    let pdf_failed = |e: PdfiumError| RenderError::PageFailed {
        path: pdf.to_path_buf(),
        source: e.to_string().into(),
    };

    let document = pdfium.load_pdf_from_file(pdf, None).map_err(pdf_failed)?;
    std::fs::create_dir_all(out_dir).map_err(|e| RenderError::page_failed(out_dir, e))?;

    let config = PdfRenderConfig::new()
        .set_target_width(PAGE_WIDTH_PX)
        .set_maximum_height(PAGE_HEIGHT_PX)
        .render_form_data(true);

    let mut written = 0;
    for (idx, page) in document.pages().iter().enumerate() {
        let path = out_dir.join(page_file_name(idx + 1));
        let bitmap = page.render_with_config(&config).map_err(pdf_failed)?;
        bitmap
            .as_image()
            .save(&path)
            .map_err(|e| RenderError::page_failed(&path, e))?;
        written += 1;
    }

    if written == 0 {
        return Err(RenderError::IncompleteContext {
            path: pdf.to_path_buf(),
            required: 1,
            found: 0,
        });
    }

    debug!("✓ {} → {} 页", pdf.display(), written);
    Ok(written)
}
