//! # Logging モジュール
//!
//! フリートシミュレーションのログ出力を設定します。
//!
//! 標準出力はイベントストリーム（1行1件のJSON）専用のため、コンソールへのログは
//! 標準エラー出力へ書き出します。ファイル出力はtracing-appenderによる非同期書き込みで、
//! 日次ローテーションのJSON形式です。
//!
//! ## 設定可能な出力先
//!
//! - `Console`: 標準エラー出力のみ
//! - `File`: ファイルのみ（logs/sarfleet.log.YYYY-MM-DD）
//! - `Both`: 標準エラー出力とファイルの両方

use std::str::FromStr;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// ログ出力先の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogOutput {
    /// 標準エラー出力のみ
    Console,
    /// ファイルのみ
    File,
    /// 標準エラー出力とファイルの両方
    Both,
}

impl LogOutput {
    fn writes_console(&self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn writes_file(&self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stderr" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(format!("無効な出力先: {}. 利用可能: console, file, both", s)),
        }
    }
}

/// ログ設定
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub output: LogOutput,
    /// ログファイルのディレクトリ（File または Both の場合）
    pub log_dir: String,
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            log_dir: "logs".to_string(),
            file_prefix: "sarfleet.log".to_string(),
        }
    }
}

impl LogConfig {
    /// コマンドライン引数からログ設定を作成
    ///
    /// `--log-level` が指定されていればそれを使い、無ければ `-v` の回数から決めます。
    ///
    /// # 引数
    ///
    /// * `level` - `--log-level` の値
    /// * `output` - `--log-output` の値
    /// * `verbose_level` - `-v` の指定回数
    pub fn from_cli(
        level: Option<&str>,
        output: Option<&str>,
        verbose_level: u8,
    ) -> Result<Self, String> {
        let level = match level {
            Some(level) => parse_log_level(level),
            None => level_for_verbosity(verbose_level),
        };
        let output = match output {
            Some(output) => LogOutput::from_str(output)?,
            None => LogOutput::Console,
        };
        Ok(Self {
            level,
            output,
            ..Self::default()
        })
    }
}

/// ログシステムを初期化
///
/// 環境変数 `RUST_LOG` が設定されている場合はそちらを優先します。
///
/// # 戻り値
///
/// ファイル出力を行う場合は非同期書き込みのガード。
/// ガードが破棄されるとバッファがフラッシュされるため、プロセス終了まで保持してください。
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = config.output.writes_console().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .compact()
    });

    let (file_layer, guard) = if config.output.writes_file() {
        ensure_log_directory(&config.log_dir)?;
        let file_appender = rolling::daily(&config.log_dir, &config.file_prefix);
        let (writer, guard) = non_blocking(file_appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .json();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// ログレベルを文字列から解析（無効な場合はINFO）
pub fn parse_log_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!("警告: 無効なログレベル '{}'. INFOを使用します", level_str);
            Level::INFO
        }
    }
}

/// `-v` の回数に対応するログレベル
pub fn level_for_verbosity(verbose_level: u8) -> Level {
    match verbose_level {
        0 | 1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn ensure_log_directory(log_dir: &str) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(log_dir)
}
