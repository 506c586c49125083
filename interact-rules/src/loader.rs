use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use interact_store::{EntityStore, Rule, StoreError};

/// Errors raised while seeding rule definitions from disk.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("rules path does not exist: {0}")]
    MissingPath(String),
    #[error("failed to read rules from {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rules from {path}: {message}")]
    Parse { path: String, message: String },
    #[error("duplicate rule identifier detected: {id}")]
    DuplicateRule { id: String },
    #[error("failed to store seeded rule: {0}")]
    Store(#[from] StoreError),
}

impl SeedError {
    fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SeedError::Io {
            path: path.into().display().to_string(),
            source,
        }
    }

    fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        SeedError::Parse {
            path: path.into().display().to_string(),
            message: message.into(),
        }
    }
}

/// Loads rule definitions from a YAML/JSON file or a directory of them.
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<Rule>, SeedError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SeedError::MissingPath(path.display().to_string()));
    }

    let mut rules = if path.is_dir() {
        load_from_directory(path)?
    } else {
        load_from_file(path)?
    };

    deduplicate(&rules)?;
    rules.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(rules)
}

/// Loads rules from `path` and upserts them into the store. Returns how
/// many rules were seeded.
pub async fn seed_store(
    store: &dyn EntityStore,
    path: impl AsRef<Path>,
) -> Result<usize, SeedError> {
    let rules = load_rules(path)?;
    let count = rules.len();
    for rule in rules {
        info!(rule_id = %rule.id, rule_name = %rule.name, "seeding rule");
        store.upsert_rule(rule).await?;
    }
    Ok(count)
}

fn load_from_directory(path: &Path) -> Result<Vec<Rule>, SeedError> {
    let mut rules = Vec::new();
    for entry in fs::read_dir(path).map_err(|err| SeedError::from_io(path, err))? {
        let entry = entry.map_err(|err| SeedError::from_io(path, err))?;
        let file_type = entry
            .file_type()
            .map_err(|err| SeedError::from_io(entry.path(), err))?;
        if file_type.is_dir() {
            continue;
        }

        if let Some(ext) = entry.path().extension().and_then(|value| value.to_str()) {
            if matches!(ext, "json" | "yaml" | "yml") {
                let mut file_rules = load_from_file(&entry.path())?;
                rules.append(&mut file_rules);
            }
        }
    }

    Ok(rules)
}

fn load_from_file(path: &Path) -> Result<Vec<Rule>, SeedError> {
    let raw = fs::read_to_string(path).map_err(|err| SeedError::from_io(path, err))?;
    parse_rules(&raw, path)
}

fn parse_rules(raw: &str, path: &Path) -> Result<Vec<Rule>, SeedError> {
    let mut attempts = Vec::new();

    if let Ok(doc) = serde_yaml::from_str::<RuleDocument>(raw) {
        return Ok(doc.rules);
    }

    attempts.push("rules document".to_string());

    if let Ok(list) = serde_yaml::from_str::<Vec<Rule>>(raw) {
        return Ok(list);
    }

    attempts.push("list".to_string());

    if let Ok(rule) = serde_yaml::from_str::<Rule>(raw) {
        return Ok(vec![rule]);
    }

    attempts.push("single".to_string());

    let message = format!("unable to parse rules file using {:?} formats", attempts);
    Err(SeedError::parse_error(path.to_path_buf(), message))
}

fn deduplicate(rules: &[Rule]) -> Result<(), SeedError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.id.clone()) {
            return Err(SeedError::DuplicateRule {
                id: rule.id.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    rules: Vec<Rule>,
}
