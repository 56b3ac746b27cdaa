use std::fs;
use std::path::Path;

use pizzabot_core::config::{discover_config_path, AppConfig, ConfigField, LoadOptions, FIELDS};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let path = discover_config_path();
    let file = path.as_deref().and_then(read_toml);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in FIELDS {
        let source = source_of(field, file.as_ref(), path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.path, field.render(&config)));
    }
    lines.join("\n")
}

fn read_toml(path: &Path) -> Option<Value> {
    fs::read_to_string(path).ok()?.parse::<Value>().ok()
}

fn source_of(field: &ConfigField, file: Option<&Value>, path: Option<&Path>) -> String {
    if let Some(key) = field.env_source() {
        return format!("env ({key})");
    }

    let in_file = file.is_some_and(|root| {
        field.path.split('.').try_fold(root, |table, key| table.get(key)).is_some()
    });
    match (in_file, path) {
        (true, Some(path)) => format!("file ({})", path.display()),
        _ => "default".to_string(),
    }
}
