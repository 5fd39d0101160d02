//! 进度发布服务 - 业务能力层
//!
//! 每处理完一个号码，批次处理器把进度快照交给发布器：
//! - `LocalStatusPublisher` 写 `status.json` 和自动刷新的 `index.html`
//! - `S3StatusPublisher` 在此基础上把两者和结果 CSV 上传到存储桶
//!
//! 发布失败只由调用方记录日志，不影响批次。

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::models::ProgressSnapshot;

pub const STATUS_JSON: &str = "status.json";
pub const STATUS_HTML: &str = "index.html";
pub const RESULTS_CSV: &str = "results.csv";

const STATUS_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta http-equiv="refresh" content="15">
    <title>Monitor {{ title }}</title>
    <style>
        body { font-family: -apple-system, "Segoe UI", Roboto, Helvetica, Arial, sans-serif; background-color: #121212; color: #e0e0e0; margin: 20px; }
        .container { max-width: 800px; margin: auto; background: #1e1e1e; padding: 25px; border-radius: 12px; border: 1px solid #333; }
        h1 { color: #64b5f6; }
        .grid { display: grid; grid-template-columns: 150px 1fr; gap: 12px; margin-top: 25px; align-items: center; }
        .label { font-weight: bold; color: #82aaff; }
        .value { background: #2a2a2a; padding: 8px 12px; border-radius: 6px; }
        .bar-container { background: #333; border-radius: 8px; overflow: hidden; margin: 25px 0; }
        .bar { height: 24px; background: #009688; width: {{ progress }}%; color: white; text-align: center; line-height: 24px; font-weight: bold; }
        a { color: #64b5f6; text-decoration: none; font-weight: bold; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Monitor {{ title }}</h1>
        <p>Última actualización: {{ updated_at }}</p>
        <div class="bar-container">
            <div class="bar">{{ progress }}%</div>
        </div>
        <div class="grid">
            <div class="label">Estado:</div><div class="value">{{ status }}</div>
            <div class="label">Asunto:</div><div class="value">{{ email_subject | default(value="N/A") }}</div>
            <div class="label">Total:</div><div class="value">{{ total_numbers }}</div>
            <div class="label">Procesados:</div><div class="value">{{ processed_count }}</div>
            <div class="label">Descargar:</div><div class="value"><a href="results.csv" download>results.csv</a></div>
        </div>
    </div>
</body>
</html>
"#;

/// 进度发布能力
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    /// 发布一次快照，`results_csv` 是当前的结果文件
    async fn publish(&self, snapshot: &ProgressSnapshot, results_csv: &Path) -> Result<()>;
}

/// 渲染状态页
pub fn render_status_page(title: &str, snapshot: &ProgressSnapshot) -> Result<String> {
    let mut context = tera::Context::from_serialize(snapshot).context("无法序列化进度快照")?;
    context.insert("title", title);
    tera::Tera::one_off(STATUS_TEMPLATE, &context, true).context("无法渲染状态页")
}

/// 写本地 `status.json` 和 `index.html`
#[derive(Debug, Clone)]
pub struct LocalStatusPublisher {
    dir: PathBuf,
    title: String,
}

impl LocalStatusPublisher {
    pub fn new(dir: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            title: title.into(),
        }
    }

    pub fn json_path(&self) -> PathBuf {
        self.dir.join(STATUS_JSON)
    }

    pub fn html_path(&self) -> PathBuf {
        self.dir.join(STATUS_HTML)
    }

    async fn write(&self, snapshot: &ProgressSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("无法创建状态目录: {}", self.dir.display()))?;

        let json = serde_json::to_vec_pretty(snapshot)?;
        fs::write(self.json_path(), json)
            .await
            .with_context(|| format!("无法写入 {}", self.json_path().display()))?;

        let html = render_status_page(&self.title, snapshot)?;
        fs::write(self.html_path(), html)
            .await
            .with_context(|| format!("无法写入 {}", self.html_path().display()))?;

        debug!(
            "状态已写入 {} ({}/{})",
            self.dir.display(),
            snapshot.processed_count,
            snapshot.total_numbers
        );
        Ok(())
    }
}

#[async_trait]
impl StatusPublisher for LocalStatusPublisher {
    async fn publish(&self, snapshot: &ProgressSnapshot, _results_csv: &Path) -> Result<()> {
        self.write(snapshot).await
    }
}

/// 本地写入后上传到 S3 存储桶
pub struct S3StatusPublisher {
    local: LocalStatusPublisher,
    client: Client,
    bucket: String,
}

impl S3StatusPublisher {
    /// 使用环境中的 AWS 凭证创建
    pub async fn new(local: LocalStatusPublisher, bucket: impl Into<String>) -> Self {
        let aws_config = aws_config::load_from_env().await;
        let bucket = bucket.into();
        info!("☁️ 状态将上传到存储桶: {}", bucket);
        Self {
            local,
            client: Client::new(&aws_config),
            bucket,
        }
    }

    async fn upload(&self, path: &Path, key: &str, content_type: &str) -> Result<()> {
        let body = fs::read(path)
            .await
            .with_context(|| format!("无法读取 {}", path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body.into())
            .content_type(content_type)
            .cache_control("no-cache")
            .send()
            .await
            .with_context(|| format!("上传 {} 到 {} 失败", key, self.bucket))?;
        Ok(())
    }
}

#[async_trait]
impl StatusPublisher for S3StatusPublisher {
    async fn publish(&self, snapshot: &ProgressSnapshot, results_csv: &Path) -> Result<()> {
        self.local.write(snapshot).await?;

        self.upload(&self.local.json_path(), STATUS_JSON, "application/json")
            .await?;
        self.upload(&self.local.html_path(), STATUS_HTML, "text/html")
            .await?;
        if fs::try_exists(results_csv).await.unwrap_or(false) {
            self.upload(results_csv, RESULTS_CSV, "text/csv").await?;
        }

        debug!("状态已上传到存储桶: {}", self.bucket);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchStatus;

    fn snapshot() -> ProgressSnapshot {
        ProgressSnapshot {
            status: BatchStatus::Running,
            total_numbers: 4,
            processed_count: 1,
            progress: 25,
            last_processed_number: Some("5512345678".into()),
            last_status: Some("SUCCESS".into()),
            email_from: "ops@example.com".into(),
            email_subject: "telcel <lote 7>".into(),
            updated_at: "2026-10-18 10:00:00 -0600".into(),
        }
    }

    #[test]
    fn page_shows_progress_and_escapes_subject() {
        let html = render_status_page("Telcel", &snapshot()).unwrap();
        assert!(html.contains(r#"content="15""#));
        assert!(html.contains("width: 25%"));
        assert!(html.contains("RUNNING"));
        assert!(html.contains("telcel &lt;lote 7&gt;"));
        assert!(html.contains(r#"href="results.csv""#));
    }

    #[tokio::test]
    async fn local_publisher_writes_json_and_html() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = LocalStatusPublisher::new(dir.path().join("status"), "IFT");
        publisher
            .publish(&snapshot(), &dir.path().join("results.csv"))
            .await
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(publisher.json_path()).unwrap()).unwrap();
        assert_eq!(json["status"], "RUNNING");
        assert_eq!(json["total_numbers"], 4);
        assert_eq!(json["processed_count"], 1);
        assert_eq!(json["progress"], 25);
        assert_eq!(json["last_processed_number"], "5512345678");
        assert_eq!(json["email_from"], "ops@example.com");
        assert!(publisher.html_path().exists());
    }
}
