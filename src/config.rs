//! Configuration management for the epubcfi tool

use std::env;

use crate::cfi::{ParseOptions, ResolveOptions};

const DEFAULT_LOG_FILTER: &str = "epubcfi=info";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub parse: ParseOptions,
    pub resolve: ResolveOptions,
    /// `tracing_subscriber::EnvFilter` directive
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            parse: ParseOptions::default(),
            resolve: ResolveOptions::default(),
            log: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Read options from `EPUBCFI_*` variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let flag = |key: &str, default: bool| match lookup(key) {
            Some(value) => parse_bool(&value).unwrap_or_else(|| {
                tracing::warn!(key, value = %value, "Invalid boolean, using default {}", default);
                default
            }),
            None => default,
        };

        Config {
            parse: ParseOptions {
                flatten_range: flag("EPUBCFI_FLATTEN_RANGE", defaults.parse.flatten_range),
                stricter: flag("EPUBCFI_STRICTER", defaults.parse.stricter),
            },
            resolve: ResolveOptions {
                ignore_ids: flag("EPUBCFI_IGNORE_IDS", defaults.resolve.ignore_ids),
                range: defaults.resolve.range,
            },
            log: lookup("EPUBCFI_LOG").unwrap_or(defaults.log),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_variables() {
        assert_eq!(config_from(&[]), Config::default());
    }

    #[test]
    fn test_reads_flags() {
        let config = config_from(&[
            ("EPUBCFI_FLATTEN_RANGE", "true"),
            ("EPUBCFI_STRICTER", "0"),
            ("EPUBCFI_IGNORE_IDS", "yes"),
            ("EPUBCFI_LOG", "epubcfi=debug"),
        ]);
        assert!(config.parse.flatten_range);
        assert!(!config.parse.stricter);
        assert!(config.resolve.ignore_ids);
        assert_eq!(config.log, "epubcfi=debug");
    }

    #[test]
    fn test_invalid_boolean_keeps_default() {
        let config = config_from(&[("EPUBCFI_STRICTER", "maybe")]);
        assert!(config.parse.stricter);
    }
}
