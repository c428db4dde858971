use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub calculator: CalculatorConfig,
}

impl AppConfig {
    /// 从显式路径加载配置，并校验数值范围。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `GEOMKIT_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("GEOMKIT_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tolerance = self.analysis.tolerance;
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "analysis.tolerance 必须为正的有限数，当前为 {tolerance}"
            )));
        }
        if self.analysis.ratio_decimals > AnalysisConfig::MAX_RATIO_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "analysis.ratio_decimals 不能超过 {}，当前为 {}",
                AnalysisConfig::MAX_RATIO_DECIMALS,
                self.analysis.ratio_decimals
            )));
        }
        let scale = self.calculator.scalar_marker_scale;
        if !scale.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "calculator.scalar_marker_scale 必须为有限数，当前为 {scale}"
            )));
        }
        if self.naming.temp_prefix.is_empty() || self.naming.result_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "naming.temp_prefix 与 naming.result_prefix 不能为空".to_string(),
            ));
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 关系分析参数：数值比较容差与长度比的保留位数。
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "AnalysisConfig::default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "AnalysisConfig::default_ratio_decimals")]
    pub ratio_decimals: u32,
}

impl AnalysisConfig {
    pub const MAX_RATIO_DECIMALS: u32 = 12;

    fn default_tolerance() -> f64 {
        1e-6
    }

    fn default_ratio_decimals() -> u32 {
        2
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tolerance: Self::default_tolerance(),
            ratio_decimals: Self::default_ratio_decimals(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamingConfig {
    #[serde(default)]
    pub segment_separator: String,
    #[serde(default = "NamingConfig::default_temp_prefix")]
    pub temp_prefix: String,
    #[serde(default = "NamingConfig::default_result_prefix")]
    pub result_prefix: String,
}

impl NamingConfig {
    fn default_temp_prefix() -> String {
        "temp_".to_string()
    }

    fn default_result_prefix() -> String {
        "result_".to_string()
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            segment_separator: String::new(),
            temp_prefix: Self::default_temp_prefix(),
            result_prefix: Self::default_result_prefix(),
        }
    }
}

/// 向量计算器参数：结果向量的起点名称，以及标量结果在坐标轴上的放置比例。
#[derive(Debug, Clone, Deserialize)]
pub struct CalculatorConfig {
    #[serde(default = "CalculatorConfig::default_origin")]
    pub origin: String,
    #[serde(default = "CalculatorConfig::default_scalar_marker_scale")]
    pub scalar_marker_scale: f64,
}

impl CalculatorConfig {
    fn default_origin() -> String {
        "O".to_string()
    }

    fn default_scalar_marker_scale() -> f64 {
        0.8
    }
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            origin: Self::default_origin(),
            scalar_marker_scale: Self::default_scalar_marker_scale(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("配置无效: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_behaviour() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert!((cfg.analysis.tolerance - 1e-6).abs() < f64::EPSILON);
        assert_eq!(cfg.analysis.ratio_decimals, 2);
        assert_eq!(cfg.naming.segment_separator, "");
        assert_eq!(cfg.naming.temp_prefix, "temp_");
        assert_eq!(cfg.naming.result_prefix, "result_");
        assert_eq!(cfg.calculator.origin, "O");
        assert!((cfg.calculator.scalar_marker_scale - 0.8).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [analysis]
            tolerance = 1e-9
            ratio_decimals = 4

            [naming]
            segment_separator = "_"

            [calculator]
            origin = "ORIGIN"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert!((cfg.analysis.tolerance - 1e-9).abs() < f64::EPSILON);
        assert_eq!(cfg.analysis.ratio_decimals, 4);
        assert_eq!(cfg.naming.segment_separator, "_");
        assert_eq!(cfg.naming.temp_prefix, "temp_");
        assert_eq!(cfg.calculator.origin, "ORIGIN");
        assert!((cfg.calculator.scalar_marker_scale - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_tolerance_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [analysis]
            tolerance = -1.0
            "#
        )
        .unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[analysis\ntolerance = ").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = AppConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
