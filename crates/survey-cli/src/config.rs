//! Run configuration.
//!
//! Values come from an optional TOML file, then environment variables, then
//! command-line flags; each layer overrides the previous one.
//!
//! ```toml
//! [survey]
//! id = "employee-survey"
//! poll_id = 123
//! language = "de"
//!
//! [source]
//! dir = "mockdata"
//!
//! [store]
//! dir = "store"
//! commit_attempts = 3
//!
//! [naming]
//! suggestions = "names.json"
//! ```

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use survey_ingest::{DEFAULT_LANGUAGE, ParseOptions};
use survey_store::{DEFAULT_COMMIT_ATTEMPTS, SurveyId};

pub const ENV_SURVEY_ID: &str = "SURVEY_ID";
pub const ENV_POLL_ID: &str = "POLL_ID";
pub const ENV_SOURCE_DIR: &str = "SOURCE_DIR";
pub const ENV_STORE_DIR: &str = "STORE_DIR";
pub const ENV_LANGUAGE: &str = "SURVEY_LANGUAGE";
pub const ENV_NAME_SUGGESTIONS: &str = "NAME_SUGGESTIONS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtlConfig {
    pub survey: SurveySection,
    pub source: SourceSection,
    pub store: StoreSection,
    pub naming: NamingSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurveySection {
    pub id: Option<String>,
    pub poll_id: Option<u64>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSection {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub dir: Option<PathBuf>,
    pub commit_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingSection {
    /// JSON suggestion table consulted before slug naming.
    pub suggestions: Option<PathBuf>,
}

/// Values given on the command line; `None` keeps the lower layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub survey_id: Option<String>,
    pub poll_id: Option<u64>,
    pub language: Option<String>,
    pub source_dir: Option<PathBuf>,
    pub store_dir: Option<PathBuf>,
    pub suggestions: Option<PathBuf>,
    pub commit_attempts: Option<u32>,
}

impl EtlConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parse configuration")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read configuration {}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("in {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// File (if given), then process environment, then `overrides`.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    /// Apply variables from `lookup`; blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(id) = get(ENV_SURVEY_ID) {
            self.survey.id = Some(id);
        }
        if let Some(poll) = get(ENV_POLL_ID) {
            let poll_id = poll
                .trim()
                .parse()
                .with_context(|| format!("{ENV_POLL_ID}='{poll}' is not a poll id"))?;
            self.survey.poll_id = Some(poll_id);
        }
        if let Some(language) = get(ENV_LANGUAGE) {
            self.survey.language = Some(language);
        }
        if let Some(dir) = get(ENV_SOURCE_DIR) {
            self.source.dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get(ENV_STORE_DIR) {
            self.store.dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = get(ENV_NAME_SUGGESTIONS) {
            self.naming.suggestions = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        let ConfigOverrides {
            survey_id,
            poll_id,
            language,
            source_dir,
            store_dir,
            suggestions,
            commit_attempts,
        } = overrides.clone();
        self.survey.id = survey_id.or(self.survey.id.take());
        self.survey.poll_id = poll_id.or(self.survey.poll_id);
        self.survey.language = language.or(self.survey.language.take());
        self.source.dir = source_dir.or(self.source.dir.take());
        self.store.dir = store_dir.or(self.store.dir.take());
        self.naming.suggestions = suggestions.or(self.naming.suggestions.take());
        self.store.commit_attempts = commit_attempts.or(self.store.commit_attempts);
    }

    pub fn survey_id(&self) -> Result<SurveyId> {
        let id = self.survey.id.as_deref().ok_or_else(|| {
            anyhow!("no survey id; pass --survey-id, set {ENV_SURVEY_ID} or [survey] id")
        })?;
        Ok(SurveyId::new(id)?)
    }

    pub fn poll_id(&self) -> Result<u64> {
        match self.survey.poll_id {
            None => bail!("no poll id; pass --poll-id, set {ENV_POLL_ID} or [survey] poll_id"),
            Some(0) => bail!("poll id must be positive"),
            Some(poll_id) => Ok(poll_id),
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions::with_language(
            self.survey
                .language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        )
    }

    pub fn source_dir(&self) -> Result<&Path> {
        existing_dir(self.source.dir.as_deref(), "source", ENV_SOURCE_DIR)
    }

    /// Created on first commit, so it need not exist yet.
    pub fn store_dir(&self) -> Result<&Path> {
        self.store.dir.as_deref().ok_or_else(|| {
            anyhow!("no store directory; pass --store-dir, set {ENV_STORE_DIR} or [store] dir")
        })
    }

    pub fn suggestions(&self) -> Option<&Path> {
        self.naming.suggestions.as_deref()
    }

    pub fn commit_attempts(&self) -> u32 {
        self.store
            .commit_attempts
            .unwrap_or(DEFAULT_COMMIT_ATTEMPTS)
            .max(1)
    }
}

fn existing_dir<'a>(dir: Option<&'a Path>, section: &str, env: &str) -> Result<&'a Path> {
    let dir = dir.ok_or_else(|| {
        anyhow!("no {section} directory; pass --{section}-dir, set {env} or [{section}] dir")
    })?;
    if !dir.is_dir() {
        bail!("{section} directory {} does not exist", dir.display());
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_every_section() {
        let config = EtlConfig::from_toml_str(
            r#"
            [survey]
            id = "employee-survey"
            poll_id = 123
            language = "en"

            [source]
            dir = "mockdata"

            [store]
            dir = "store"
            commit_attempts = 5

            [naming]
            suggestions = "names.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.survey_id().unwrap().as_str(), "employee-survey");
        assert_eq!(config.poll_id().unwrap(), 123);
        assert_eq!(config.parse_options().language, "en");
        assert_eq!(config.commit_attempts(), 5);
        assert_eq!(config.suggestions(), Some(Path::new("names.json")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(EtlConfig::from_toml_str("[survey]\nname = \"x\"").is_err());
    }

    #[test]
    fn layers_override_in_order() {
        let mut config =
            EtlConfig::from_toml_str("[survey]\nid = \"from-file\"\npoll_id = 1").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SURVEY_ID, "from-env"),
            (ENV_POLL_ID, " 7 "),
            (ENV_LANGUAGE, ""),
        ]);
        config
            .apply_env(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.survey.id.as_deref(), Some("from-env"));
        assert_eq!(config.survey.poll_id, Some(7));
        assert_eq!(config.survey.language, None);

        config.apply_overrides(&ConfigOverrides {
            survey_id: Some("from-flag".to_string()),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.survey.id.as_deref(), Some("from-flag"));
        assert_eq!(config.survey.poll_id, Some(7));
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut config = EtlConfig::default();
        assert!(config.survey_id().is_err());
        assert!(config.poll_id().is_err());
        assert!(config.source_dir().is_err());
        assert_eq!(config.parse_options().language, DEFAULT_LANGUAGE);
        assert_eq!(config.commit_attempts(), DEFAULT_COMMIT_ATTEMPTS);

        config.survey.id = Some("bad id".to_string());
        config.survey.poll_id = Some(0);
        config.source.dir = Some(PathBuf::from("/definitely/not/here"));
        assert!(config.survey_id().is_err());
        assert!(config.poll_id().is_err());
        assert!(config.source_dir().is_err());
        assert!(config.store_dir().is_err());

        let bad_poll = config.apply_env(|key| (key == ENV_POLL_ID).then(|| "abc".to_string()));
        assert!(bad_poll.is_err());
    }
}
