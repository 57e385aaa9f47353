use std::env;
use std::fs;
use std::path::PathBuf;

use orderlens_core::config::{resolve_config_path, AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let context = SourceContext::detect(options);
    let overrides = &options.overrides;
    let artifact_flag = overrides.artifact_dir.as_ref().map(|_| "--artifact-dir");
    let log_level_flag = overrides.log_level.as_ref().map(|_| "--log-level");
    let split_seed_flag = overrides.split_seed.map(|_| "--split-seed");

    let entries = vec![
        context.entry(
            "storage.artifact_dir",
            config.storage.artifact_dir.display().to_string(),
            &["ORDERLENS_STORAGE_ARTIFACT_DIR"],
            artifact_flag,
        ),
        context.entry(
            "classifier.min_training_rows",
            config.classifier.min_training_rows.to_string(),
            &["ORDERLENS_CLASSIFIER_MIN_TRAINING_ROWS"],
            None,
        ),
        context.entry(
            "classifier.test_fraction",
            config.classifier.test_fraction.to_string(),
            &["ORDERLENS_CLASSIFIER_TEST_FRACTION"],
            None,
        ),
        context.entry(
            "classifier.split_seed",
            config.classifier.split_seed.to_string(),
            &["ORDERLENS_CLASSIFIER_SPLIT_SEED"],
            split_seed_flag,
        ),
        context.entry(
            "classifier.learning_rate",
            config.classifier.learning_rate.to_string(),
            &["ORDERLENS_CLASSIFIER_LEARNING_RATE"],
            None,
        ),
        context.entry(
            "classifier.epochs",
            config.classifier.epochs.to_string(),
            &["ORDERLENS_CLASSIFIER_EPOCHS"],
            None,
        ),
        context.entry(
            "classifier.l2_penalty",
            config.classifier.l2_penalty.to_string(),
            &["ORDERLENS_CLASSIFIER_L2_PENALTY"],
            None,
        ),
        context.entry(
            "analytics.trend_epsilon",
            config.analytics.trend_epsilon.to_string(),
            &["ORDERLENS_ANALYTICS_TREND_EPSILON"],
            None,
        ),
        context.entry(
            "analytics.top_n",
            config.analytics.top_n.to_string(),
            &["ORDERLENS_ANALYTICS_TOP_N"],
            None,
        ),
        context.entry(
            "analytics.default_window_days",
            config.analytics.default_window_days.to_string(),
            &["ORDERLENS_ANALYTICS_DEFAULT_WINDOW_DAYS"],
            None,
        ),
        context.entry(
            "recommendations.shuffle_seed",
            config
                .recommendations
                .shuffle_seed
                .map(|seed| seed.to_string())
                .unwrap_or_else(|| "<entropy>".to_string()),
            &["ORDERLENS_RECOMMENDATIONS_SHUFFLE_SEED"],
            None,
        ),
        context.entry(
            "logging.level",
            config.logging.level.clone(),
            &["ORDERLENS_LOGGING_LEVEL", "ORDERLENS_LOG_LEVEL"],
            log_level_flag,
        ),
        context.entry(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["ORDERLENS_LOGGING_FORMAT", "ORDERLENS_LOG_FORMAT"],
            None,
        ),
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    lines.extend(entries.iter().map(render_line));

    CommandResult::success_with("config", lines.join("\n"), entries)
}

struct SourceContext {
    file_path: Option<PathBuf>,
    file_doc: Option<Value>,
}

impl SourceContext {
    fn detect(options: &LoadOptions) -> Self {
        let file_path = resolve_config_path(options.config_path.as_deref());
        let file_doc = file_path
            .as_deref()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|raw| raw.parse::<Value>().ok());
        Self { file_path, file_doc }
    }

    fn entry(
        &self,
        key: &'static str,
        value: String,
        env_keys: &[&str],
        flag: Option<&str>,
    ) -> ConfigEntry {
        ConfigEntry { key, value, source: self.source(key, env_keys, flag) }
    }

    fn source(&self, key_path: &str, env_keys: &[&str], flag: Option<&str>) -> String {
        if let Some(flag) = flag {
            return format!("flag ({flag})");
        }

        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(entry: &ConfigEntry) -> String {
    format!("- {} = {} (source: {})", entry.key, entry.value, entry.source)
}
