//! Field-level input validation.

use std::collections::HashSet;
use std::hash::Hash;

use crate::error::{AppError, AppResult, FieldErrors};

/// Collects one message per failing field.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record `message` for `key` unless the key already has one.
    pub fn add_error(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    /// `Ok` when nothing failed, otherwise [`AppError::FailedValidation`].
    pub fn finish(self) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::FailedValidation(self.errors))
        }
    }
}

pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v))
}

/// Address shape accepted by HTML5 `type=email` inputs.
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~-".contains(c));

    let domain_ok = !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });

    local_ok && domain_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_field_wins() {
        let mut v = Validator::new();
        v.check(false, "title", "must be provided");
        v.check(false, "title", "must not be too long");
        v.check(true, "year", "never recorded");

        match v.finish() {
            Err(AppError::FailedValidation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors["title"], "must be provided");
            }
            other => panic!("expected failed validation, got {other:?}"),
        }
    }

    #[test]
    fn uniqueness() {
        assert!(unique(&["drama", "comedy"]));
        assert!(!unique(&["drama", "drama"]));
        assert!(unique::<&str>(&[]));
    }

    #[test]
    fn email_shapes() {
        assert!(is_email("alice@example.com"));
        assert!(is_email("a.b+tag@sub.example.co"));
        assert!(is_email("root@localhost"));
        assert!(!is_email("alice"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("alice@"));
        assert!(!is_email("alice@-example.com"));
        assert!(!is_email("alice@exa..mple.com"));
        assert!(!is_email("a@b@c"));
    }
}
