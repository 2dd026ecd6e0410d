//! Resolution of required field names against physically available names.

use std::borrow::Cow;

use arrow::datatypes::Schema;
use dsbridge_result::{Error, Result};
use dsbridge_types::fold_case;
use rustc_hash::FxHashMap;
use tracing::warn;

/// Outcome of matching one required name against a candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatch {
    None,
    Unique(usize),
    /// Every candidate index that folded to the required name, in candidate order.
    Ambiguous(Vec<usize>),
}

/// Match `required` against `candidates` without building an index.
///
/// Case-sensitive matching compares bytes and returns the first hit; it never
/// reports ambiguity. Case-insensitive matching compares folded names and
/// reports every hit when there is more than one.
pub fn match_field<S: AsRef<str>>(
    required: &str,
    candidates: &[S],
    case_sensitive: bool,
) -> FieldMatch {
    if case_sensitive {
        return candidates
            .iter()
            .position(|c| c.as_ref() == required)
            .map_or(FieldMatch::None, FieldMatch::Unique);
    }

    let key = fold_case(required);
    let hits: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| fold_case(c.as_ref()) == key)
        .map(|(idx, _)| idx)
        .collect();
    classify(hits)
}

fn classify(mut hits: Vec<usize>) -> FieldMatch {
    match hits.len() {
        0 => FieldMatch::None,
        1 => FieldMatch::Unique(hits[0]),
        _ => {
            hits.sort_unstable();
            FieldMatch::Ambiguous(hits)
        }
    }
}

/// Indexed matcher over a fixed candidate list.
///
/// Built once per schema and consulted for every required field of every
/// batch.
#[derive(Debug, Clone)]
pub struct FieldMatcher {
    case_sensitive: bool,
    names: Vec<String>,
    index: FxHashMap<String, Vec<usize>>,
}

impl FieldMatcher {
    pub fn new<I, S>(candidates: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = candidates.into_iter().map(Into::into).collect();
        let mut index: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (idx, name) in names.iter().enumerate() {
            let key = if case_sensitive {
                Cow::Borrowed(name.as_str())
            } else {
                fold_case(name)
            };
            index.entry(key.into_owned()).or_default().push(idx);
        }
        Self {
            case_sensitive,
            names,
            index,
        }
    }

    /// Matcher over the field names of `schema`.
    pub fn for_schema(schema: &Schema, case_sensitive: bool) -> Self {
        Self::new(
            schema.fields().iter().map(|f| f.name().as_str()),
            case_sensitive,
        )
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn lookup(&self, required: &str) -> FieldMatch {
        if self.case_sensitive {
            return self
                .index
                .get(required)
                .and_then(|hits| hits.first().copied())
                .map_or(FieldMatch::None, FieldMatch::Unique);
        }
        match self.index.get(&*fold_case(required)) {
            Some(hits) => classify(hits.clone()),
            None => FieldMatch::None,
        }
    }

    /// Resolve `required` to at most one candidate index.
    ///
    /// An ambiguous match is an [`Error::AmbiguousFieldMatch`] listing every
    /// matched candidate name.
    pub fn resolve(&self, required: &str) -> Result<Option<usize>> {
        match self.lookup(required) {
            FieldMatch::None => Ok(None),
            FieldMatch::Unique(idx) => Ok(Some(idx)),
            FieldMatch::Ambiguous(hits) => {
                let matched: Vec<String> = hits.iter().map(|&i| self.names[i].clone()).collect();
                warn!(required, ?matched, "ambiguous case-insensitive field match");
                Err(Error::AmbiguousFieldMatch {
                    required: required.to_string(),
                    matched,
                })
            }
        }
    }

    /// Resolve every field of `required` and fail on the first ambiguity.
    pub fn validate_all(&self, required: &Schema) -> Result<()> {
        for field in required.fields() {
            self.resolve(field.name())?;
        }
        Ok(())
    }
}
