//! 应用入口 - 编排层
//!
//! 加载门户配置，按是否提供输入文件选择"导航检查"或"批量处理"，
//! 并把结果映射为进程退出状态。

use std::future::Future;
use std::path::Path;

use tracing::{error, info, warn};

use crate::browser::LaunchOptions;
use crate::config::Config;
use crate::error::{AppError, AppResult, RunExit};
use crate::infrastructure::{ChromeMode, ChromeSessionFactory, SessionFactory};
use crate::models::{builtin_profile, load_profile_file, read_numbers, Item, PortalProfile};
use crate::orchestrator::batch_processor::{ctrl_c_interrupt, BatchRunner};
use crate::portals::{create_portal, Portal};
use crate::services::{
    CsvResultLog, ElementWaiter, LocalStatusPublisher, S3StatusPublisher, StatusPublisher,
};
use crate::utils::logging::{log_items_loaded, log_startup};
use crate::workflow::{ItemFlow, RetryPolicy};

/// 应用主结构
pub struct App {
    config: Config,
    profile: PortalProfile,
}

impl App {
    /// 初始化应用：加载门户配置
    pub async fn initialize(config: Config) -> AppResult<Self> {
        let profile = match &config.profile_path {
            Some(path) => load_profile_file(path).await,
            None => builtin_profile(&config.portal),
        }
        .map_err(|e| AppError::Config(format!("{:#}", e)))?;

        if profile.name != config.portal {
            warn!(
                "配置文件中的门户 {} 与 --portal {} 不一致，以配置文件为准",
                profile.name, config.portal
            );
        }

        log_startup(&config, &profile.display_name);
        Ok(Self { config, profile })
    }

    pub fn profile(&self) -> &PortalProfile {
        &self.profile
    }

    /// 运行应用主逻辑，返回退出状态
    pub async fn run(self) -> AppResult<RunExit> {
        let factory = self.session_factory();
        match self.config.input_csv.clone() {
            None => self.check_navigation(&factory, ctrl_c_interrupt()).await,
            Some(path) => {
                let items = load_items(&path).await?;
                self.run_batch(&path, items, &factory).await
            }
        }
    }

    fn session_factory(&self) -> ChromeSessionFactory {
        let mode = match self.config.browser_debug_port {
            Some(port) => ChromeMode::Attach { port },
            None => ChromeMode::Launch(LaunchOptions {
                headless: self.config.headless,
                chrome_executable: self.config.chrome_executable.clone(),
                user_agent: self.profile.setting("user_agent").map(str::to_string),
            }),
        };
        ChromeSessionFactory::new(mode)
    }

    fn portal(&self) -> AppResult<Box<dyn Portal>> {
        let waiter = ElementWaiter::new(self.config.step_timeout, self.config.step_poll);
        create_portal(self.profile.clone(), waiter, &self.config.log_dir)
            .map_err(|e| AppError::Config(format!("{:#}", e)))
    }

    /// 没有输入文件：只检查门户首页的导航，`interrupt` 完成时中断
    async fn check_navigation<F>(&self, factory: &dyn SessionFactory, interrupt: F) -> AppResult<RunExit>
    where
        F: Future<Output = ()>,
    {
        info!("🔍 未提供输入文件，执行导航检查");
        let portal = self.portal()?;
        let session = factory
            .create()
            .await
            .map_err(|e| AppError::SessionCreation(format!("{:#}", e)))?;

        let checked = tokio::select! {
            result = portal.check_navigation(session.as_ref()) => Some(result),
            _ = interrupt => None,
        };
        if checked.is_some() {
            if let Ok(title) = session.title().await {
                info!("页面标题: {}", title);
            }
        }
        let teardown = session.close().await;

        let Some(checked) = checked else {
            warn!("⛔ 收到中断信号，导航检查已停止");
            if let Err(e) = teardown {
                error!("关闭浏览器会话失败: {}", e);
            }
            return Ok(RunExit::Interrupted);
        };
        checked.map_err(|e| AppError::NavigationSetup(e.to_string()))?;
        teardown.map_err(|e| AppError::SessionTeardown(e.to_string()))?;
        info!("✓ 导航检查完成");
        Ok(RunExit::Success)
    }

    async fn run_batch(
        &self,
        source: &Path,
        items: Vec<Item>,
        factory: &dyn SessionFactory,
    ) -> AppResult<RunExit> {
        log_items_loaded(items.len(), source, &self.config.output_csv);
        if items.is_empty() {
            warn!("⚠️ 输入文件中没有号码");
        }

        let policy = RetryPolicy {
            max_attempts: 2,
            settle: self.config.settle.unwrap_or_else(|| self.profile.reset_settle()),
            result_timeout: self.config.result_timeout,
            result_poll: self.config.result_poll,
        };
        let flow = ItemFlow::new(self.portal()?, policy);

        let mut runner = BatchRunner::new(
            flow,
            CsvResultLog::new(&self.config.output_csv),
            self.config.run.clone(),
        )
        .with_publisher(self.publisher().await)
        .with_publish_timeout(self.config.publish_timeout)
        .with_log_file(self.config.log_file());

        let summary = runner.run(items, factory).await?;
        Ok(summary.exit())
    }

    async fn publisher(&self) -> Box<dyn StatusPublisher> {
        let local = LocalStatusPublisher::new(&self.config.status_dir, self.profile.display_name.clone());
        match &self.config.run.bucket {
            Some(bucket) => Box::new(S3StatusPublisher::new(local, bucket.clone()).await),
            None => Box::new(local),
        }
    }
}

/// 读取输入文件，区分"不存在"和"无法读取"
pub async fn load_items(path: &Path) -> AppResult<Vec<Item>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(AppError::InputMissing {
            path: path.display().to_string(),
        });
    }
    read_numbers(path)
        .await
        .map_err(|e| AppError::InputUnreadable {
            path: path.display().to_string(),
            reason: format!("{:#}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    use crate::infrastructure::scripted::ScriptedSession;

    #[tokio::test]
    async fn missing_input_maps_to_exit_4() {
        let dir = tempfile::tempdir().unwrap();
        let err = assert_err!(load_items(&dir.path().join("numeros.csv")).await);
        assert!(matches!(err, AppError::InputMissing { .. }));
        assert_eq!(err.exit_status().code(), 4);
    }

    #[tokio::test]
    async fn unreadable_input_maps_to_exit_5() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("numeros.csv");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x41]).unwrap();
        let err = assert_err!(load_items(&path).await);
        assert!(matches!(err, AppError::InputUnreadable { .. }));
        assert_eq!(err.exit_status().code(), 5);
    }

    #[tokio::test]
    async fn unknown_portal_is_config_error() {
        let config = Config {
            portal: "movistar".into(),
            ..Config::default()
        };
        let err = App::initialize(config).await.err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn builtin_profile_is_selected_by_name() {
        let config = Config {
            portal: "ift".into(),
            ..Config::default()
        };
        let app = assert_ok!(App::initialize(config).await);
        assert_eq!(app.profile().name, "ift");
        assert_ok!(app.portal());
    }

    struct OneSession(Arc<ScriptedSession>);

    #[async_trait::async_trait]
    impl SessionFactory for OneSession {
        async fn create(&self) -> anyhow::Result<Box<dyn crate::infrastructure::Session>> {
            Ok(Box::new(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn interrupted_navigation_check_closes_session() {
        let config = Config {
            step_timeout: Duration::from_secs(60),
            ..Config::default()
        };
        let app = assert_ok!(App::initialize(config).await);
        let session = Arc::new(ScriptedSession::new("about:blank"));

        let exit = app
            .check_navigation(&OneSession(session.clone()), async {})
            .await;

        assert_eq!(assert_ok!(exit), RunExit::Interrupted);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn failed_navigation_check_maps_to_exit_3() {
        let config = Config {
            step_timeout: Duration::from_millis(20),
            step_poll: Duration::from_millis(5),
            ..Config::default()
        };
        let app = assert_ok!(App::initialize(config).await);
        let session = Arc::new(ScriptedSession::new("about:blank"));

        let err = assert_err!(
            app.check_navigation(&OneSession(session.clone()), std::future::pending())
                .await
        );
        assert_eq!(err.exit_status().code(), 3);
        assert!(session.is_closed());
    }
}
