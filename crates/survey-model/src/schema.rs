//! The survey schema and its equivalence relation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Result, SchemaError};
use crate::variable::{Variable, VariableSignature};

/// Ordered, immutable collection of variables for one survey identity.
///
/// Variable names are unique; construction fails otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Variable>", into = "Vec<Variable>")]
pub struct Schema {
    variables: Vec<Variable>,
}

impl Schema {
    pub fn new(variables: Vec<Variable>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for variable in &variables {
            if !seen.insert(variable.name.as_str()) {
                return Err(SchemaError::DuplicateName {
                    name: variable.name.clone(),
                });
            }
        }
        Ok(Self { variables })
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|variable| variable.name.as_str())
    }

    /// Signatures keyed by variable name.
    pub fn signatures(&self) -> BTreeMap<&str, VariableSignature> {
        self.variables
            .iter()
            .map(|variable| (variable.name.as_str(), variable.signature()))
            .collect()
    }

    /// Same names with the same kinds, ranges and domains, in any order.
    pub fn is_equivalent(&self, other: &Schema) -> bool {
        self.signatures() == other.signatures()
    }

    /// Variable-level differences going from `self` (stored) to `inferred`.
    pub fn diff(&self, inferred: &Schema) -> SchemaDiff {
        let stored = self.signatures();
        let fresh = inferred.signatures();
        let mut diff = SchemaDiff::default();
        for (name, signature) in &stored {
            match fresh.get(name) {
                None => diff.removed.push(signature.clone()),
                Some(new) if new != signature => diff.changed.push(VariableChange {
                    stored: signature.clone(),
                    inferred: new.clone(),
                }),
                Some(_) => {}
            }
        }
        for (name, signature) in &fresh {
            if !stored.contains_key(name) {
                diff.added.push(signature.clone());
            }
        }
        diff
    }

    /// Order-insensitive SHA-256 digest of the equivalence-relevant
    /// attributes. Equivalent schemas always share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for signature in self.signatures().values() {
            hasher.update(signature.name.as_bytes());
            hasher.update([0x1f]);
            hasher.update(signature.kind.as_str().as_bytes());
            hasher.update([0x1f]);
            match &signature.range {
                Some(range) => {
                    hasher.update([1]);
                    hasher.update(format!("{}:{}", range.min, range.max).as_bytes());
                }
                None => hasher.update([0]),
            }
            hasher.update([0x1f]);
            // Presence tag keeps an empty domain apart from no domain.
            hasher.update([u8::from(signature.domain.is_some())]);
            if let Some(domain) = &signature.domain {
                for choice in domain {
                    hasher.update(choice.code.as_bytes());
                    hasher.update([0x1d]);
                    hasher.update(choice.label.as_bytes());
                    hasher.update([0x1e]);
                }
            }
            hasher.update([0x0a]);
        }
        hex::encode(hasher.finalize())
    }
}

impl TryFrom<Vec<Variable>> for Schema {
    type Error = SchemaError;

    fn try_from(value: Vec<Variable>) -> Result<Self> {
        Schema::new(value)
    }
}

impl From<Schema> for Vec<Variable> {
    fn from(value: Schema) -> Self {
        value.variables
    }
}

/// A variable present on both sides whose signature differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableChange {
    pub stored: VariableSignature,
    pub inferred: VariableSignature,
}

/// Full variable-level difference between a stored and an inferred schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub added: Vec<VariableSignature>,
    pub removed: Vec<VariableSignature>,
    pub changed: Vec<VariableChange>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no differences");
        }
        for signature in &self.added {
            writeln!(f, "+ added    {signature}")?;
        }
        for signature in &self.removed {
            writeln!(f, "- removed  {signature}")?;
        }
        for change in &self.changed {
            writeln!(f, "~ retyped  {} -> {}", change.stored, change.inferred)?;
        }
        Ok(())
    }
}
