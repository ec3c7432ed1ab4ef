//! Structural classification helpers.
//!
//! These inspect the concrete error type, never the rendered text: a foreign
//! error whose message happens to start with a prefix does not match it.

use std::error::Error;

use crate::StructuredError;

/// The first [`StructuredError`] in `err`'s source chain, `err` included.
pub fn find_structured<'a>(err: &'a (dyn Error + 'static)) -> Option<&'a StructuredError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(structured) = e.downcast_ref::<StructuredError>() {
            return Some(structured);
        }
        current = e.source();
    }
    None
}

/// True when `err` itself is a `StructuredError` carrying `prefix`.
pub fn prefix_matches(err: &(dyn Error + 'static), prefix: &str) -> bool {
    err.downcast_ref::<StructuredError>()
        .is_some_and(|e| e.prefix_matches(prefix))
}

/// Like [`prefix_matches`], but also looks through wrapping errors.
pub fn is_prefix_matches(err: &(dyn Error + 'static), prefix: &str) -> bool {
    find_structured(err).is_some_and(|e| e.prefix_matches(prefix))
}

/// True only for a `StructuredError` (directly or in the source chain)
/// built with the retryable flag.
pub fn is_retryable(err: &(dyn Error + 'static)) -> bool {
    find_structured(err).is_some_and(StructuredError::retryable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapper(StructuredError);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "wrapped: {}", self.0)
        }
    }

    impl Error for Wrapper {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn prefix_matches_structured() {
        let err = StructuredError::new(1, "t", "failed", None);
        assert!(prefix_matches(&err, "t"));
        assert!(!prefix_matches(&err, "t2"));
    }

    #[test]
    fn prefix_matches_ignores_foreign_text() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "t1: failed");
        assert!(!prefix_matches(&err, "t1"));
        assert!(!is_prefix_matches(&err, "t1"));
    }

    #[test]
    fn direct_match_does_not_unwrap() {
        let err = Wrapper(StructuredError::new(1, "T", "failed", None));
        assert!(!prefix_matches(&err, "T"));
        assert!(is_prefix_matches(&err, "T"));
    }

    #[test]
    fn retryable_through_chain() {
        let err = Wrapper(StructuredError::with_all_info(1, "T", "failed", None, true));
        assert!(is_retryable(&err));
    }

    #[test]
    fn non_retryable_and_foreign_errors() {
        let plain = StructuredError::new(1, "T", "failed", None);
        assert!(!is_retryable(&plain));

        let foreign = std::fmt::Error;
        assert!(!is_retryable(&foreign));
    }

    #[test]
    fn first_structured_error_in_chain_wins() {
        let inner = StructuredError::with_all_info(2, "inner", "retry me", None, true);
        let outer = StructuredError::internal_with_cause(inner, "outer", None, "x");
        assert!(!is_retryable(&outer));
        assert_eq!(find_structured(&outer).map(|e| e.prefix()), Some("internal_service.x"));
    }
}
