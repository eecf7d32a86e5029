use anyhow::{Context, Result};
use handlebars::{Handlebars, RenderError};
use rust_embed::Embed;
use serde::Serialize;

#[derive(Embed)]
#[folder = "templates"]
struct Templates;

/// 编译进程序的 HTML 模板，输出默认做 HTML 转义
pub struct PageRenderer {
    registry: Handlebars<'static>,
}

impl PageRenderer {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        for file in Templates::iter() {
            let Some(name) = file.strip_suffix(".hbs") else {
                continue;
            };
            let content = Templates::get(&file).with_context(|| format!("模板 {} 不存在", file))?;
            let source = std::str::from_utf8(&content.data).with_context(|| format!("模板 {} 不是 UTF-8", file))?;
            registry
                .register_template_string(name, source)
                .with_context(|| format!("模板 {} 解析失败", file))?;
            debug!("已加载模板: {}", name);
        }
        Ok(Self { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, RenderError> {
        self.registry.render(name, data)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_templates_are_embedded() {
        let renderer = PageRenderer::new().unwrap();
        let html = renderer
            .render(
                "pdf_list",
                &json!({
                    "count": 1,
                    "files": [{"name": "<b>标题</b>.pdf", "url": "/pdf/x.pdf", "size": "1.00 MB", "modified": "2024-01-01 00:00:00"}],
                }),
            )
            .unwrap();
        assert!(html.contains("共 1 个PDF文件"));
        assert!(html.contains("&lt;b&gt;标题&lt;/b&gt;.pdf"));

        let empty = renderer.render("pdf_list", &json!({"count": 0, "files": []})).unwrap();
        assert!(empty.contains("PDF目录为空"));
    }

    #[test]
    fn test_index_auto_refresh() {
        let renderer = PageRenderer::new().unwrap();
        let idle = renderer
            .render("index", &json!({"tasks": [], "total": 0, "running": 0, "auto_refresh": false, "version": "test"}))
            .unwrap();
        assert!(!idle.contains("http-equiv=\"refresh\""));
        assert!(idle.contains("暂无下载任务"));

        let busy = renderer
            .render(
                "index",
                &json!({
                    "tasks": [{"album_id": "123", "status_class": "status-in-progress", "status_label": "下载中...", "message": "初始化下载...", "pdf_url": null}],
                    "total": 1,
                    "running": 1,
                    "auto_refresh": true,
                    "version": "test",
                }),
            )
            .unwrap();
        assert!(busy.contains("http-equiv=\"refresh\""));
        assert!(busy.contains("初始化下载..."));
        assert!(busy.contains("共 1 个任务，1 个正在下载"));
    }
}
