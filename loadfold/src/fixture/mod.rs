//! Reader for line-oriented test fixtures
//!
//! A fixture holds one or more sources, optional settings and the expected
//! output:
//!
//! ```text
//! ==== Source: a ====
//! { let k := 0 }
//! ==== ExternalSource: shared.yul ====
//! // ====
//! // expectedExecutionsPerDeployment: 200
//! // ----
//! // { let k := 0 }
//! ```
//!
//! Without a `==== Source: ... ====` header the whole source part is a
//! single source with an empty name. The last source read is the main one.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

const SOURCE_START: &str = "==== Source:";
const EXTERNAL_SOURCE_START: &str = "==== ExternalSource:";
const SOURCE_END: &str = "====";
const SETTINGS_DELIMITER: &str = "// ====";
const EXPECTATIONS_DELIMITER: &str = "// ----";
const COMMENT: &str = "// ";

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("multiple definitions of test source `{name}`")]
    DuplicateSource { name: String },

    #[error("external source `{path}` not found")]
    MissingExternalSource { path: String },

    #[error("line {line}: expected `:` inside setting")]
    MalformedSetting { line: usize },

    #[error("line {line}: expected `//` or `// ----` to terminate settings and source")]
    UnterminatedSettings { line: usize },

    #[error("invalid boolean value `{value}` for setting `{name}`")]
    InvalidBool { name: String, value: String },

    #[error("invalid integer value `{value}` for setting `{name}`")]
    InvalidInteger { name: String, value: String },

    #[error("expected a single source definition, found {count}")]
    MultipleSources { count: usize },

    #[error("unknown setting(s): {}", names.join(", "))]
    UnknownSettings { names: Vec<String> },

    #[error("line {line}: test expectations must start with `// `")]
    MalformedExpectation { line: usize },
}

pub type FixtureResult<T> = std::result::Result<T, FixtureError>;

/// Parsed fixture with settings bookkeeping
#[derive(Debug)]
pub struct TestCaseReader {
    sources: BTreeMap<String, String>,
    main_source_name: String,
    settings: BTreeMap<String, String>,
    unread_settings: BTreeSet<String>,
    /// Lines after the expectations delimiter
    expectation_lines: Vec<String>,
    /// One-based line number of the first expectation line
    line_number: usize,
}

impl TestCaseReader {
    pub fn from_path(path: impl AsRef<Path>) -> FixtureResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path.parent())
    }

    /// `base` is the directory external sources are resolved against
    fn parse(text: &str, base: Option<&Path>) -> FixtureResult<Self> {
        let mut sources = BTreeMap::new();
        let mut settings = BTreeMap::new();
        let mut current_name = String::new();
        let mut current_source = String::new();
        let mut line_number = 1;
        let mut in_sources = true;
        let mut lines = text.lines();

        for line in lines.by_ref() {
            line_number += 1;

            if line.starts_with(EXPECTATIONS_DELIMITER) {
                break;
            } else if line.starts_with(SETTINGS_DELIMITER) {
                in_sources = false;
            } else if in_sources {
                if let Some(name) = delimited(line, SOURCE_START) {
                    if !(current_name.is_empty() && current_source.is_empty()) {
                        sources.insert(
                            std::mem::take(&mut current_name),
                            std::mem::take(&mut current_source),
                        );
                    }
                    current_name = name.to_string();
                    if sources.contains_key(&current_name) {
                        return Err(FixtureError::DuplicateSource { name: current_name });
                    }
                } else if let Some(header) = delimited(line, EXTERNAL_SOURCE_START) {
                    let (name, path) = match header.split_once('=') {
                        Some((name, path)) => (name.trim(), path.trim()),
                        None => (header, header),
                    };
                    if !name.is_empty() && (sources.contains_key(name) || name == current_name) {
                        return Err(FixtureError::DuplicateSource { name: name.to_string() });
                    }
                    let full_path = match base {
                        Some(base) => base.join(path),
                        None => PathBuf::from(path),
                    };
                    if !full_path.exists() {
                        return Err(FixtureError::MissingExternalSource { path: path.to_string() });
                    }
                    let content = std::fs::read_to_string(&full_path).map_err(|source| FixtureError::Io {
                        path: full_path.clone(),
                        source,
                    })?;
                    if !name.is_empty() {
                        sources.insert(name.to_string(), content);
                    }
                } else {
                    current_source.push_str(line);
                    current_source.push('\n');
                }
            } else if let Some(setting) = line.strip_prefix(COMMENT) {
                let Some((key, value)) = setting.split_once(':') else {
                    return Err(FixtureError::MalformedSetting { line: line_number - 1 });
                };
                settings.insert(key.trim().to_string(), value.trim().to_string());
            } else {
                return Err(FixtureError::UnterminatedSettings { line: line_number - 1 });
            }
        }

        // The last source read is the main one
        sources.insert(current_name.clone(), current_source);

        Ok(Self {
            sources,
            main_source_name: current_name,
            unread_settings: settings.keys().cloned().collect(),
            settings,
            expectation_lines: lines.map(str::to_string).collect(),
            line_number,
        })
    }

    pub fn sources(&self) -> &BTreeMap<String, String> {
        &self.sources
    }

    pub fn main_source_name(&self) -> &str {
        &self.main_source_name
    }

    /// The only source of the fixture
    pub fn source(&self) -> FixtureResult<&str> {
        if self.sources.len() != 1 {
            return Err(FixtureError::MultipleSources {
                count: self.sources.len(),
            });
        }
        Ok(self.sources[&self.main_source_name].as_str())
    }

    /// One-based line number where the expectations start
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn has_setting(&self, name: &str) -> bool {
        self.settings.contains_key(name)
    }

    fn read_setting(&mut self, name: &str) -> Option<&str> {
        let value = self.settings.get(name)?;
        self.unread_settings.remove(name);
        Some(value.as_str())
    }

    pub fn bool_setting(&mut self, name: &str, default: bool) -> FixtureResult<bool> {
        match self.read_setting(name) {
            None => Ok(default),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(value) => Err(FixtureError::InvalidBool {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn usize_setting(&mut self, name: &str, default: usize) -> FixtureResult<usize> {
        match self.read_setting(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| FixtureError::InvalidInteger {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn string_setting(&mut self, name: &str, default: &str) -> String {
        self.read_setting(name).unwrap_or(default).to_string()
    }

    /// Error naming every setting no accessor has asked for
    pub fn ensure_all_settings_read(&self) -> FixtureResult<()> {
        if self.unread_settings.is_empty() {
            return Ok(());
        }
        Err(FixtureError::UnknownSettings {
            names: self.unread_settings.iter().cloned().collect(),
        })
    }

    /// Expectation text with the comment markers removed
    pub fn simple_expectations(&self) -> FixtureResult<String> {
        let mut result = String::new();
        for (offset, line) in self.expectation_lines.iter().enumerate() {
            if let Some(content) = line.strip_prefix(COMMENT) {
                result.push_str(content);
            } else if line != "//" {
                return Err(FixtureError::MalformedExpectation {
                    line: self.line_number + offset,
                });
            }
            result.push('\n');
        }
        Ok(result)
    }
}

impl FromStr for TestCaseReader {
    type Err = FixtureError;

    fn from_str(text: &str) -> FixtureResult<Self> {
        Self::parse(text, None)
    }
}

/// Text between `start` and the closing `====` of a header line
fn delimited<'l>(line: &'l str, start: &str) -> Option<&'l str> {
    let inner = line.strip_prefix(start)?.strip_suffix(SOURCE_END)?;
    Some(inner.trim())
}
