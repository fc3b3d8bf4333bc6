use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{Rule, RuleAttributes, RuleId};

use super::sources::PolicySources;

/// Errors that can occur while loading policy sources or seed rules.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    rules: Vec<RuleAttributes>,
}

/// Load seed rules from a YAML file.
///
/// Every rule is validated up front so a bad file seeds nothing.
pub fn load_seed_rules(path: impl AsRef<Path>) -> Result<Vec<RuleAttributes>, PolicyError> {
    let content = fs::read_to_string(path)?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    for (idx, attrs) in seed.rules.iter().enumerate() {
        let probe = Rule::new(RuleId::new(), attrs.clone());
        if let Some(field) = probe.missing_field() {
            return Err(PolicyError::Validation(format!(
                "seed rule #{}: {} must be set",
                idx + 1,
                field
            )));
        }
    }

    Ok(seed.rules)
}

/// Load every regular file in a directory as a static policy module.
pub fn load_sources_dir(dir: impl AsRef<Path>) -> Result<PolicySources, PolicyError> {
    let mut sources = PolicySources::new();

    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let source = fs::read_to_string(entry.path())?;
        sources.insert(name, source);
    }

    if sources.is_empty() {
        return Err(PolicyError::Validation(format!(
            "no policy modules found in {}",
            dir.as_ref().display()
        )));
    }

    Ok(sources)
}

/// Resolves static sources and seed rules from the configured locations.
pub struct PolicyLoader {
    static_dir: Option<PathBuf>,
    seed_path: Option<PathBuf>,
}

impl PolicyLoader {
    pub fn new(static_dir: Option<PathBuf>, seed_path: Option<PathBuf>) -> Self {
        PolicyLoader {
            static_dir,
            seed_path,
        }
    }

    /// Static sources from the configured directory, or the embedded modules.
    pub fn load_sources(&self) -> Result<PolicySources, PolicyError> {
        match &self.static_dir {
            Some(dir) => load_sources_dir(dir),
            None => Ok(PolicySources::embedded()),
        }
    }

    /// Seed rules from the configured file, or none.
    pub fn load_seed_rules(&self) -> Result<Vec<RuleAttributes>, PolicyError> {
        match &self.seed_path {
            Some(path) => load_seed_rules(path),
            None => Ok(Vec::new()),
        }
    }
}
