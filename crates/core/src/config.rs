use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub classifier: ClassifierConfig,
    pub analytics: AnalyticsConfig,
    pub recommendations: RecommendationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    pub artifact_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierConfig {
    pub min_training_rows: usize,
    pub test_fraction: f64,
    pub split_seed: u64,
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2_penalty: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalyticsConfig {
    /// Absolute difference between half-window mean conversion rates that counts as a trend.
    pub trend_epsilon: f64,
    pub top_n: usize,
    pub default_window_days: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecommendationConfig {
    /// Fixed shuffle seed; `None` draws from entropy on every filter call.
    pub shuffle_seed: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub artifact_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub split_seed: Option<u64>,
    pub shuffle_seed: Option<u64>,
    pub trend_epsilon: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["orderlens.toml", "config/orderlens.toml"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig { artifact_dir: PathBuf::from(".orderlens") },
            classifier: ClassifierConfig {
                min_training_rows: 10,
                test_fraction: 0.2,
                split_seed: 3,
                learning_rate: 0.5,
                epochs: 500,
                l2_penalty: 0.01,
            },
            analytics: AnalyticsConfig { trend_epsilon: 0.01, top_n: 10, default_window_days: 30 },
            recommendations: RecommendationConfig { shuffle_seed: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(storage) = patch.storage {
            if let Some(artifact_dir) = storage.artifact_dir {
                self.storage.artifact_dir = artifact_dir;
            }
        }

        if let Some(classifier) = patch.classifier {
            if let Some(min_training_rows) = classifier.min_training_rows {
                self.classifier.min_training_rows = min_training_rows;
            }
            if let Some(test_fraction) = classifier.test_fraction {
                self.classifier.test_fraction = test_fraction;
            }
            if let Some(split_seed) = classifier.split_seed {
                self.classifier.split_seed = split_seed;
            }
            if let Some(learning_rate) = classifier.learning_rate {
                self.classifier.learning_rate = learning_rate;
            }
            if let Some(epochs) = classifier.epochs {
                self.classifier.epochs = epochs;
            }
            if let Some(l2_penalty) = classifier.l2_penalty {
                self.classifier.l2_penalty = l2_penalty;
            }
        }

        if let Some(analytics) = patch.analytics {
            if let Some(trend_epsilon) = analytics.trend_epsilon {
                self.analytics.trend_epsilon = trend_epsilon;
            }
            if let Some(top_n) = analytics.top_n {
                self.analytics.top_n = top_n;
            }
            if let Some(default_window_days) = analytics.default_window_days {
                self.analytics.default_window_days = default_window_days;
            }
        }

        if let Some(recommendations) = patch.recommendations {
            if let Some(shuffle_seed) = recommendations.shuffle_seed {
                self.recommendations.shuffle_seed = Some(shuffle_seed);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ORDERLENS_STORAGE_ARTIFACT_DIR") {
            self.storage.artifact_dir = PathBuf::from(value);
        }

        if let Some(value) = read_env("ORDERLENS_CLASSIFIER_MIN_TRAINING_ROWS") {
            self.classifier.min_training_rows =
                parse_env("ORDERLENS_CLASSIFIER_MIN_TRAINING_ROWS", &value)?;
        }
        if let Some(value) = read_env("ORDERLENS_CLASSIFIER_TEST_FRACTION") {
            self.classifier.test_fraction = parse_env("ORDERLENS_CLASSIFIER_TEST_FRACTION", &value)?;
        }
        if let Some(value) = read_env("ORDERLENS_CLASSIFIER_SPLIT_SEED") {
            self.classifier.split_seed = parse_env("ORDERLENS_CLASSIFIER_SPLIT_SEED", &value)?;
        }
        if let Some(value) = read_env("ORDERLENS_CLASSIFIER_LEARNING_RATE") {
            self.classifier.learning_rate = parse_env("ORDERLENS_CLASSIFIER_LEARNING_RATE", &value)?;
        }
        if let Some(value) = read_env("ORDERLENS_CLASSIFIER_EPOCHS") {
            self.classifier.epochs = parse_env("ORDERLENS_CLASSIFIER_EPOCHS", &value)?;
        }
        if let Some(value) = read_env("ORDERLENS_CLASSIFIER_L2_PENALTY") {
            self.classifier.l2_penalty = parse_env("ORDERLENS_CLASSIFIER_L2_PENALTY", &value)?;
        }

        if let Some(value) = read_env("ORDERLENS_ANALYTICS_TREND_EPSILON") {
            self.analytics.trend_epsilon = parse_env("ORDERLENS_ANALYTICS_TREND_EPSILON", &value)?;
        }
        if let Some(value) = read_env("ORDERLENS_ANALYTICS_TOP_N") {
            self.analytics.top_n = parse_env("ORDERLENS_ANALYTICS_TOP_N", &value)?;
        }
        if let Some(value) = read_env("ORDERLENS_ANALYTICS_DEFAULT_WINDOW_DAYS") {
            self.analytics.default_window_days =
                parse_env("ORDERLENS_ANALYTICS_DEFAULT_WINDOW_DAYS", &value)?;
        }

        if let Some(value) = read_env("ORDERLENS_RECOMMENDATIONS_SHUFFLE_SEED") {
            self.recommendations.shuffle_seed =
                Some(parse_env("ORDERLENS_RECOMMENDATIONS_SHUFFLE_SEED", &value)?);
        }

        let log_level =
            read_env("ORDERLENS_LOGGING_LEVEL").or_else(|| read_env("ORDERLENS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ORDERLENS_LOGGING_FORMAT").or_else(|| read_env("ORDERLENS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(artifact_dir) = overrides.artifact_dir {
            self.storage.artifact_dir = artifact_dir;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(split_seed) = overrides.split_seed {
            self.classifier.split_seed = split_seed;
        }
        if let Some(shuffle_seed) = overrides.shuffle_seed {
            self.recommendations.shuffle_seed = Some(shuffle_seed);
        }
        if let Some(trend_epsilon) = overrides.trend_epsilon {
            self.analytics.trend_epsilon = trend_epsilon;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_storage(&self.storage)?;
        validate_classifier(&self.classifier)?;
        validate_analytics(&self.analytics)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.artifact_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("storage.artifact_dir must not be empty".to_string()));
    }
    Ok(())
}

fn validate_classifier(classifier: &ClassifierConfig) -> Result<(), ConfigError> {
    if classifier.min_training_rows < 2 {
        return Err(ConfigError::Validation(
            "classifier.min_training_rows must be at least 2".to_string(),
        ));
    }

    if !(classifier.test_fraction > 0.0 && classifier.test_fraction < 1.0) {
        return Err(ConfigError::Validation(
            "classifier.test_fraction must be in the open range (0, 1)".to_string(),
        ));
    }

    if !(classifier.learning_rate.is_finite() && classifier.learning_rate > 0.0) {
        return Err(ConfigError::Validation(
            "classifier.learning_rate must be a positive number".to_string(),
        ));
    }

    if classifier.epochs == 0 || classifier.epochs > 100_000 {
        return Err(ConfigError::Validation(
            "classifier.epochs must be in range 1..=100000".to_string(),
        ));
    }

    if !(classifier.l2_penalty.is_finite() && classifier.l2_penalty >= 0.0) {
        return Err(ConfigError::Validation(
            "classifier.l2_penalty must be zero or positive".to_string(),
        ));
    }

    Ok(())
}

fn validate_analytics(analytics: &AnalyticsConfig) -> Result<(), ConfigError> {
    if !(analytics.trend_epsilon.is_finite() && analytics.trend_epsilon >= 0.0) {
        return Err(ConfigError::Validation(
            "analytics.trend_epsilon must be zero or positive".to_string(),
        ));
    }

    if analytics.top_n == 0 {
        return Err(ConfigError::Validation(
            "analytics.top_n must be greater than zero".to_string(),
        ));
    }

    if analytics.default_window_days == 0 {
        return Err(ConfigError::Validation(
            "analytics.default_window_days must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    storage: Option<StoragePatch>,
    classifier: Option<ClassifierPatch>,
    analytics: Option<AnalyticsPatch>,
    recommendations: Option<RecommendationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    artifact_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    min_training_rows: Option<usize>,
    test_fraction: Option<f64>,
    split_seed: Option<u64>,
    learning_rate: Option<f64>,
    epochs: Option<usize>,
    l2_penalty: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyticsPatch {
    trend_epsilon: Option<f64>,
    top_n: Option<usize>,
    default_window_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationPatch {
    shuffle_seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_without_any_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.classifier.min_training_rows == 10, "minimum rows should default to 10")?;
        ensure(config.classifier.split_seed == 3, "split seed should default to 3")?;
        ensure(config.analytics.top_n == 10, "top-n should default to 10")?;
        ensure(config.recommendations.shuffle_seed.is_none(), "shuffle should use entropy")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_ORDERLENS_ARTIFACTS", "/tmp/orderlens-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("orderlens.toml");
            fs::write(
                &path,
                r#"
[storage]
artifact_dir = "${TEST_ORDERLENS_ARTIFACTS}"

[analytics]
trend_epsilon = 0.05
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.storage.artifact_dir == PathBuf::from("/tmp/orderlens-from-env"),
                "artifact dir should be interpolated from environment",
            )?;
            ensure(
                (config.analytics.trend_epsilon - 0.05).abs() < f64::EPSILON,
                "trend epsilon should come from file",
            )
        })();

        clear_vars(&["TEST_ORDERLENS_ARTIFACTS"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ORDERLENS_LOG_LEVEL", "warn");
        env::set_var("ORDERLENS_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )
        })();

        clear_vars(&["ORDERLENS_LOG_LEVEL", "ORDERLENS_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ORDERLENS_CLASSIFIER_SPLIT_SEED", "11");
        env::set_var("ORDERLENS_ANALYTICS_TOP_N", "5");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("orderlens.toml");
            fs::write(
                &path,
                r#"
[classifier]
split_seed = 7
epochs = 200

[analytics]
top_n = 3

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    split_seed: Some(42),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.classifier.split_seed == 42, "override split seed should win")?;
            ensure(config.classifier.epochs == 200, "file epochs should win over default")?;
            ensure(config.analytics.top_n == 5, "env top-n should win over file")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")
        })();

        clear_vars(&["ORDERLENS_CLASSIFIER_SPLIT_SEED", "ORDERLENS_ANALYTICS_TOP_N"]);
        result
    }

    #[test]
    fn invalid_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ORDERLENS_CLASSIFIER_EPOCHS", "many");

        let result = (|| -> Result<(), String> {
            match AppConfig::load(LoadOptions::default()) {
                Ok(_) => Err("expected env override failure".to_string()),
                Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                    key == "ORDERLENS_CLASSIFIER_EPOCHS",
                    "error should name the offending variable",
                ),
                Err(other) => Err(format!("unexpected error: {other}")),
            }
        })();

        clear_vars(&["ORDERLENS_CLASSIFIER_EPOCHS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ORDERLENS_CLASSIFIER_TEST_FRACTION", "1.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("classifier.test_fraction")
            );
            ensure(has_message, "validation failure should mention classifier.test_fraction")
        })();

        clear_vars(&["ORDERLENS_CLASSIFIER_TEST_FRACTION"]);
        result
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("absent.toml");
        let result = AppConfig::load(LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(ref missing)) if *missing == path),
            "missing file should be reported by path",
        )
    }
}
