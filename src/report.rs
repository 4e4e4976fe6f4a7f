//! Output side: how computed ids are handed to whoever inserts them into source.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::canonical::Grammar;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    /// `binary.Name <id>` per line
    Text,
    /// `binary.Name: private static final long serialVersionUID = <id>L;` per line
    Java,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::Text => write!(f, "text"),
            Format::Java => write!(f, "java"),
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "text" => Ok(Format::Text),
            "java" => Ok(Format::Java),
            other => Err(format!(
                "unknown format '{}', expected 'json', 'text' or 'java'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub binary_name: String,
    pub source: String,
    pub uid: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Report {
    pub version: String,
    pub grammar: Grammar,
    pub classes: Vec<ReportEntry>,
}

impl Report {
    pub fn new(grammar: Grammar, mut classes: Vec<ReportEntry>) -> Self {
        classes.sort_by(|a, b| a.binary_name.cmp(&b.binary_name));
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            grammar,
            classes,
        }
    }

    pub fn render(&self, format: Format) -> anyhow::Result<String> {
        let rendered = match format {
            Format::Json => {
                let mut json = serde_json::to_string_pretty(self)?;
                json.push('\n');
                json
            }
            Format::Text => self
                .classes
                .iter()
                .map(|c| format!("{} {}\n", c.binary_name, c.uid))
                .collect(),
            Format::Java => self
                .classes
                .iter()
                .map(|c| format!("{}: {}\n", c.binary_name, declaration(c.uid)))
                .collect(),
        };
        Ok(rendered)
    }
}

/// Java `long` literal for an id.
pub fn java_literal(uid: i64) -> String {
    format!("{}L", uid)
}

pub fn declaration(uid: i64) -> String {
    format!(
        "private static final long serialVersionUID = {};",
        java_literal(uid)
    )
}

/// Write `content` unless the file already holds exactly that. Returns whether it wrote.
pub fn write_if_changed(path: &Path, content: &str) -> anyhow::Result<bool> {
    if path.exists() {
        let existing = std::fs::read_to_string(path)?;
        if existing == content {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(true)
}
