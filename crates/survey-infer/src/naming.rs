//! Variable naming.
//!
//! Multi-variable questions name each variable `Q<pos>_<suffix>`. The suffix
//! comes from the naming collaborator when it offers a usable one, otherwise
//! from the slugified label, otherwise from the variable's 1-based index.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use survey_model::Schema;

use crate::error::{InferenceError, NamingError};

/// Proposes readable variable suffixes.
///
/// Implementations may call out to slow or unreliable services; every
/// failure is recovered by the caller.
pub trait VariableNamer {
    fn suggest_name(
        &self,
        question_text: &str,
        label_text: &str,
    ) -> Result<Option<String>, NamingError>;
}

/// Never suggests anything; every name is the deterministic fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNamer;

impl VariableNamer for NoopNamer {
    fn suggest_name(&self, _: &str, _: &str) -> Result<Option<String>, NamingError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SuggestionEntry {
    #[serde(default)]
    question: Option<String>,
    label: String,
    name: String,
}

/// Suggestions read from a JSON file.
///
/// The file is a list of `{"question": .., "label": .., "name": ..}` entries.
/// `question` is optional; an entry without it applies to the label in every
/// question. Question-specific entries win.
#[derive(Debug, Clone, Default)]
pub struct SuggestionTable {
    by_question: BTreeMap<(String, String), String>,
    by_label: BTreeMap<String, String>,
}

impl SuggestionTable {
    pub fn from_path(path: &Path) -> Result<Self, NamingError> {
        let text = std::fs::read_to_string(path).map_err(|source| NamingError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<SuggestionEntry> =
            serde_json::from_str(&text).map_err(|source| NamingError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        let mut table = Self::default();
        for entry in entries {
            match entry.question {
                Some(question) => table.insert_for_question(question, entry.label, entry.name),
                None => table.insert(entry.label, entry.name),
            }
        }
        Ok(table)
    }

    pub fn insert(&mut self, label: impl Into<String>, name: impl Into<String>) {
        self.by_label.insert(label.into(), name.into());
    }

    pub fn insert_for_question(
        &mut self,
        question: impl Into<String>,
        label: impl Into<String>,
        name: impl Into<String>,
    ) {
        self.by_question
            .insert((question.into(), label.into()), name.into());
    }

    pub fn len(&self) -> usize {
        self.by_question.len() + self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VariableNamer for SuggestionTable {
    fn suggest_name(
        &self,
        question_text: &str,
        label_text: &str,
    ) -> Result<Option<String>, NamingError> {
        let key = (question_text.to_string(), label_text.to_string());
        Ok(self
            .by_question
            .get(&key)
            .or_else(|| self.by_label.get(label_text))
            .cloned())
    }
}

/// Memoises another namer per question and label for the lifetime of a run.
///
/// Failures are not cached.
#[derive(Debug, Default)]
pub struct CachedNamer<N> {
    inner: N,
    cache: Mutex<HashMap<(String, String), Option<String>>>,
}

impl<N: VariableNamer> CachedNamer<N> {
    pub fn new(inner: N) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }

    pub fn cached_entries(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<N: VariableNamer> VariableNamer for CachedNamer<N> {
    fn suggest_name(
        &self,
        question_text: &str,
        label_text: &str,
    ) -> Result<Option<String>, NamingError> {
        let key = (question_text.to_string(), label_text.to_string());
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(hit.clone());
        }
        let suggestion = self.inner.suggest_name(question_text, label_text)?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, suggestion.clone());
        Ok(suggestion)
    }
}

/// Names committed earlier, keyed by platform varname.
///
/// Pinning keeps names stable across waves when the naming collaborator is
/// not deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinnedNames {
    by_source: BTreeMap<String, String>,
}

impl PinnedNames {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_schema(schema: &Schema) -> Self {
        Self {
            by_source: schema
                .variables()
                .iter()
                .map(|variable| (variable.source.clone(), variable.name.clone()))
                .collect(),
        }
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.by_source.get(source).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}

/// Replace German umlauts and drop every remaining non-ASCII character.
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            'ä' | 'Ä' => out.push_str("ae"),
            'ö' | 'Ö' => out.push_str("oe"),
            'ü' | 'Ü' => out.push_str("ue"),
            'ß' => out.push_str("ss"),
            c if c.is_ascii() => out.push(c),
            _ => {}
        }
    }
    out
}

/// Clean a collaborator suggestion; only `^[a-z]+$` survives.
pub fn sanitize_suggestion(suggestion: &str) -> Option<String> {
    let cleaned = transliterate(suggestion.trim().trim_start_matches('_'));
    (!cleaned.is_empty() && cleaned.bytes().all(|b| b.is_ascii_lowercase())).then_some(cleaned)
}

/// Lowercase ASCII slug with `_` between words.
pub fn slugify(label: &str) -> String {
    let mut slug = String::new();
    let mut pending_separator = false;
    for c in transliterate(label).chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}

/// Per-run naming state: the collaborator, pinned names and every name
/// claimed so far.
pub struct NamingContext<'a> {
    namer: &'a dyn VariableNamer,
    pinned: &'a PinnedNames,
    used: BTreeSet<String>,
    occurrences: BTreeMap<String, usize>,
}

impl<'a> NamingContext<'a> {
    pub fn new(namer: &'a dyn VariableNamer, pinned: &'a PinnedNames) -> Self {
        Self {
            namer,
            pinned,
            used: BTreeSet::new(),
            occurrences: BTreeMap::new(),
        }
    }

    pub fn pinned(&self, source: &str) -> Option<&'a str> {
        self.pinned.get(source)
    }

    /// Suffix for one variable of a multi-variable question.
    pub fn suffix_for(&self, question_text: &str, label: Option<&str>, index: usize) -> String {
        let label = label.map(str::trim).unwrap_or_default();
        if !label.is_empty() {
            match self.namer.suggest_name(question_text, label) {
                Ok(Some(raw)) => match sanitize_suggestion(&raw) {
                    Some(suffix) => return suffix,
                    None => tracing::warn!(
                        suggestion = %raw,
                        label,
                        "discarding unusable name suggestion"
                    ),
                },
                Ok(None) => {}
                Err(error) => tracing::warn!(%error, label, "naming collaborator failed"),
            }
            let slug = slugify(label);
            if !slug.is_empty() {
                return slug;
            }
        }
        (index + 1).to_string()
    }

    /// Reserve `name`, appending `_2`, `_3`, .. on collision.
    ///
    /// Fails when the disambiguated name is itself taken.
    pub fn claim(&mut self, question_id: i64, name: String) -> Result<String, InferenceError> {
        let seen = self.occurrences.entry(name.clone()).or_insert(0);
        *seen += 1;
        let candidate = if *seen == 1 && !self.used.contains(&name) {
            name
        } else {
            let disambiguated = format!("{name}_{}", (*seen).max(2));
            tracing::debug!(%name, %disambiguated, "disambiguating variable name");
            disambiguated
        };
        if !self.used.insert(candidate.clone()) {
            return Err(InferenceError::DuplicateVariableName {
                question_id,
                name: candidate,
            });
        }
        Ok(candidate)
    }

    /// Reserve a pinned name exactly as committed.
    pub fn claim_exact(&mut self, question_id: i64, name: &str) -> Result<String, InferenceError> {
        *self.occurrences.entry(name.to_string()).or_insert(0) += 1;
        if !self.used.insert(name.to_string()) {
            return Err(InferenceError::DuplicateVariableName {
                question_id,
                name: name.to_string(),
            });
        }
        Ok(name.to_string())
    }
}
