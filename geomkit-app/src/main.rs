use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use geomkit_config::{AppConfig, ConfigError};
use geomkit_engine::command::CommandBus;
use geomkit_engine::session::Session;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut script: Option<PathBuf> = None;
    let mut json = false;
    let mut sample = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "--script" => {
                let Some(path) = args.next() else {
                    eprintln!("`--script` 需要提供脚本路径");
                    std::process::exit(1);
                };
                script = Some(PathBuf::from(path));
            }
            "--json" => json = true,
            "--sample" => sample = true,
            "--help" | "-h" => {
                println!("用法: geomkit [--config PATH] [--script PATH] [--json] [--sample]");
                return;
            }
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }

    let (config, fallback) = load_configuration(config_override.as_deref());
    init_logging(&config);
    if let Some(err) = &fallback {
        report_config_fallback(err);
    }
    info!("启动 geomkit");

    let mut session = Session::with_config(&config);
    if sample {
        if let Err(err) = session.populate_sample() {
            error!(error = %err, "载入示例数据失败");
            std::process::exit(1);
        }
    }

    let bus = CommandBus::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = match &script {
        Some(path) => match File::open(path) {
            Ok(file) => cli::run_script(BufReader::new(file), &mut out, &bus, &mut session),
            Err(err) => {
                error!(path = %path.display(), error = %err, "无法打开脚本");
                std::process::exit(1);
            }
        },
        None => cli::run_script(io::stdin().lock(), &mut out, &bus, &mut session),
    };
    let stats = match result {
        Ok(stats) => stats,
        Err(err) => {
            error!(error = %err, "执行脚本失败");
            std::process::exit(1);
        }
    };
    drop(out);
    info!(executed = stats.executed, failed = stats.failed, "脚本执行完毕");

    if let Err(err) = print_report(&session, json) {
        error!(error = %err, "生成分析报告失败");
        std::process::exit(1);
    }
    if stats.failed > 0 {
        std::process::exit(2);
    }
}

fn print_report(session: &Session, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let relations = session.analyze()?;
    if json {
        let report = serde_json::json!({
            "summary": session.summary(),
            "points": session.store().points().collect::<Vec<_>>(),
            "segments": session.store().segments().collect::<Vec<_>>(),
            "circles": session.store().circles().collect::<Vec<_>>(),
            "displayed_vectors": session.store().displayed_vectors(),
            "relations": relations,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{relations}");
    }
    Ok(())
}

/// 加载配置，失败时回退到内建默认值。错误随结果返回，等日志初始化之后再报告。
fn load_configuration(override_path: Option<&Path>) -> (AppConfig, Option<ConfigError>) {
    let loaded = match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    }
}

fn report_config_fallback(err: &ConfigError) {
    match err {
        ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
            warn!(path = %path.display(), error = %err, "加载配置失败，使用内建默认值");
        }
        ConfigError::Context { .. } | ConfigError::Invalid(_) => {
            warn!(error = %err, "加载配置失败，使用内建默认值");
        }
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    // 日志写到 stderr，stdout 留给命令输出与报告
    let subscriber = fmt().with_env_filter(filter).with_writer(io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn broken_config_falls_back_and_keeps_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[analysis\ntolerance = ").unwrap();

        let (config, fallback) = load_configuration(Some(&path));
        assert_eq!(config.analysis.tolerance, AppConfig::default().analysis.tolerance);
        assert!(matches!(fallback, Some(ConfigError::Parse { .. })));

        let missing = dir.path().join("missing.toml");
        let (_, fallback) = load_configuration(Some(&missing));
        assert!(matches!(fallback, Some(ConfigError::Io { path, .. }) if path == missing));
    }

    #[test]
    fn valid_config_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geomkit.toml");
        fs::write(&path, "[analysis]\ntolerance = 0.001\n").unwrap();

        let (config, fallback) = load_configuration(Some(&path));
        assert!(fallback.is_none());
        assert_eq!(config.analysis.tolerance, 0.001);
    }
}
