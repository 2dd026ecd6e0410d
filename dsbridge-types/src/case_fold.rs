//! Locale-invariant case folding for field names.
//!
//! Folding follows Unicode default case folding via ICU4X, so the result never
//! depends on the process locale. ASCII input, which covers almost every column
//! name seen in practice, takes a fast path that skips ICU entirely.

use std::borrow::Cow;
use std::sync::OnceLock;

use icu_casemap::{CaseMapper, CaseMapperBorrowed};

fn case_mapper() -> &'static CaseMapperBorrowed<'static> {
    static CM: OnceLock<CaseMapperBorrowed<'static>> = OnceLock::new();
    CM.get_or_init(CaseMapper::new)
}

/// Fold `name` to its case-insensitive comparison key.
///
/// Returns the input unchanged (borrowed) when it is already folded ASCII.
#[inline]
pub fn fold_case(name: &str) -> Cow<'_, str> {
    if name.is_ascii() {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            return Cow::Owned(name.to_ascii_lowercase());
        }
        return Cow::Borrowed(name);
    }
    Cow::Owned(case_mapper().fold_string(name).into_owned())
}

/// Compare two names under default case folding.
#[inline]
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    fold_case(a) == fold_case(b)
}
