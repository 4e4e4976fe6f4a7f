use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::canonical::Grammar;
use crate::report::Format;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub hash: HashConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub rebuild: Option<RebuildConfig>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub format: Format,
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: Format::default(),
            cache_file: default_cache_file(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("serial-ids.json")
}

fn default_cache_file() -> PathBuf {
    PathBuf::from(".svuid-cache.json")
}

#[derive(Debug, Deserialize, Default)]
pub struct HashConfig {
    #[serde(default)]
    pub grammar: Grammar,
}

/// Regexes over dotted binary names.
#[derive(Debug, Deserialize, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Directory { path: PathBuf },
    File { path: PathBuf },
    Files { paths: Vec<PathBuf> },
    Glob { pattern: String },
    /// JSON array of prebuilt class descriptors.
    Descriptors { path: PathBuf },
}

#[derive(Debug, Deserialize)]
pub struct RebuildConfig {
    pub command: Vec<String>,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Compiled form of [`FilterConfig`].
#[derive(Debug, Default)]
pub struct ClassFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl ClassFilter {
    pub fn new(config: &FilterConfig) -> anyhow::Result<Self> {
        let compile = |patterns: &[String]| -> anyhow::Result<Vec<Regex>> {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(p)
                        .map_err(|e| anyhow::anyhow!("Invalid filter pattern '{}': {}", p, e))
                })
                .collect()
        };
        Ok(Self {
            include: compile(&config.include)?,
            exclude: compile(&config.exclude)?,
        })
    }

    pub fn accepts(&self, binary_name: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|r| r.is_match(binary_name));
        included && !self.exclude.iter().any(|r| r.is_match(binary_name))
    }
}
