use std::path::PathBuf;
use std::time::Duration;

/// 运行上下文（发件人、主题、存储桶）
///
/// 由外部的邮件监听程序传入，只在入口读取一次。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunContext {
    pub email_from: String,
    pub email_subject: String,
    pub bucket: Option<String>,
}

impl RunContext {
    pub fn from_env() -> Self {
        Self {
            email_from: std::env::var("EMAIL_FROM").unwrap_or_else(|_| "N/A".to_string()),
            email_subject: std::env::var("EMAIL_SUBJECT").unwrap_or_else(|_| "N/A".to_string()),
            bucket: std::env::var("S3_BUCKET_NAME").ok().filter(|b| !b.trim().is_empty()),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 门户名称（telcel / ift）
    pub portal: String,
    /// 门户配置文件，不设置时使用内置配置
    pub profile_path: Option<PathBuf>,
    /// 是否无头模式启动浏览器
    pub headless: bool,
    /// Chrome 可执行文件路径
    pub chrome_executable: Option<String>,
    /// 连接已启动浏览器的调试端口，设置后不再启动新浏览器
    pub browser_debug_port: Option<u16>,
    /// 单步等待超时
    pub step_timeout: Duration,
    /// 元素轮询间隔
    pub step_poll: Duration,
    /// 识别结果的总超时
    pub result_timeout: Duration,
    /// 识别结果的轮询间隔
    pub result_poll: Duration,
    /// 重置后的等待时间，不设置时使用门户配置
    pub settle: Option<Duration>,
    /// 单次进度发布的超时
    pub publish_timeout: Duration,
    /// 输入号码 CSV
    pub input_csv: Option<PathBuf>,
    /// 结果 CSV
    pub output_csv: PathBuf,
    /// status.json / index.html 所在目录
    pub status_dir: PathBuf,
    /// 日志目录
    pub log_dir: PathBuf,
    /// 日志详细程度（0 = warn, 1 = info, 2+ = debug）
    pub verbosity: u8,
    pub run: RunContext,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal: "telcel".to_string(),
            profile_path: None,
            headless: true,
            chrome_executable: None,
            browser_debug_port: None,
            step_timeout: Duration::from_secs(20),
            step_poll: Duration::from_millis(500),
            result_timeout: Duration::from_secs(20),
            result_poll: Duration::from_millis(500),
            settle: None,
            publish_timeout: Duration::from_secs(30),
            input_csv: None,
            output_csv: PathBuf::from("results.csv"),
            status_dir: PathBuf::from("status"),
            log_dir: PathBuf::from("logs"),
            verbosity: 1,
            run: RunContext::default(),
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    let raw = std::env::var(name).ok()?;
    let parsed = raw
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    if parsed.is_none() {
        tracing::warn!("环境变量 {} 不是有效的秒数: {}，忽略", name, raw);
    }
    parsed
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            portal: std::env::var("PORTAL").unwrap_or(default.portal),
            profile_path: std::env::var("PORTAL_PROFILE").ok().map(PathBuf::from),
            headless: std::env::var("HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.headless),
            chrome_executable: std::env::var("CHROME_PATH").ok(),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()),
            step_timeout: env_secs("STEP_TIMEOUT_SECS").unwrap_or(default.step_timeout),
            step_poll: env_secs("STEP_POLL_SECS").unwrap_or(default.step_poll),
            result_timeout: env_secs("RESULT_TIMEOUT_SECS").unwrap_or(default.result_timeout),
            result_poll: env_secs("RESULT_POLL_SECS").unwrap_or(default.result_poll),
            settle: env_secs("RESET_SETTLE_SECS"),
            publish_timeout: env_secs("PUBLISH_TIMEOUT_SECS").unwrap_or(default.publish_timeout),
            input_csv: None,
            output_csv: std::env::var("RESULTS_CSV").map(PathBuf::from).unwrap_or(default.output_csv),
            status_dir: std::env::var("STATUS_DIR").map(PathBuf::from).unwrap_or(default.status_dir),
            log_dir: std::env::var("LOG_DIR").map(PathBuf::from).unwrap_or(default.log_dir),
            verbosity: default.verbosity,
            run: RunContext::from_env(),
        }
    }

    /// 日志文件路径
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("scraper.log")
    }
}
