use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Every way a `load`/`loads` call can fail.
///
/// All variants carry enough context (source text + byte span, where
/// applicable) for `miette` to render a caret pointing at the offending text,
/// the way `lintel_validate::diagnostics::LintError` does for schema errors.
#[derive(Debug, Error, Diagnostic)]
pub enum XjsonError {
    /// Strict JSON parsing failed on the spliced buffer. Because the
    /// stripper (P1) and resolver (P3) preserve byte offsets and newlines,
    /// the reported line/column still match the *original* source.
    #[error("{message}")]
    #[diagnostic(code(xjson::json_parse))]
    JsonParse {
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: SourceSpan,
        message: String,
    },

    /// An include target could not be read, no default was supplied, and
    /// strict mode (`error_on_missing = true`) was requested.
    #[error("include not found: {target}")]
    #[diagnostic(code(xjson::include_not_found))]
    IncludeNotFound {
        #[source_code]
        src: NamedSource<String>,
        #[label("failed to resolve this include")]
        span: SourceSpan,
        target: String,
    },

    /// A document transitively includes itself.
    #[error("recursive include detected: {origin} is already being resolved")]
    #[diagnostic(code(xjson::include_recursion))]
    IncludeRecursion { origin: String },

    /// A checksum was supplied but the fetched body does not match it.
    #[error("checksum mismatch for {target}: expected {expected}, got {actual}")]
    #[diagnostic(code(xjson::checksum_mismatch))]
    ChecksumMismatch {
        target: String,
        expected: String,
        actual: String,
    },

    /// `#INCLUDE <path|default>` appeared where an object member is
    /// expected, but no `Name:` prefix was given.
    #[error("object-member include requires a property name")]
    #[diagnostic(code(xjson::missing_property_name))]
    MissingPropertyName {
        #[source_code]
        src: NamedSource<String>,
        #[label("missing `Name:` prefix")]
        span: SourceSpan,
    },

    /// A `Name:` prefix was given on an include that is not in object-member
    /// position.
    #[error("unexpected property name on a non-object-member include")]
    #[diagnostic(code(xjson::unexpected_property_name))]
    UnexpectedPropertyName {
        #[source_code]
        src: NamedSource<String>,
        #[label("unexpected `Name:` prefix here")]
        span: SourceSpan,
    },

    /// A malformed expression, an unknown function, or an invalid argument.
    #[error("{message}")]
    #[diagnostic(code(xjson::expression))]
    Expression { message: String },

    /// Reading a file (include target, or `file_checksum` argument) failed
    /// for a reason other than "not found" (e.g. permission denied).
    #[error("I/O error on {path}: {message}")]
    #[diagnostic(code(xjson::io))]
    Io { path: String, message: String },

    /// Fetching a URL include target failed for a reason other than "not
    /// found" (e.g. a network error, a non-2xx response).
    #[error("network error fetching {url}: {message}")]
    #[diagnostic(code(xjson::network))]
    Network { url: String, message: String },
}

pub type Result<T> = core::result::Result<T, XjsonError>;

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic;

    #[test]
    fn error_codes() {
        let cases: Vec<(XjsonError, &str)> = vec![
            (
                XjsonError::JsonParse {
                    src: NamedSource::new("f", String::new()),
                    span: 0.into(),
                    message: String::new(),
                },
                "xjson::json_parse",
            ),
            (
                XjsonError::IncludeRecursion {
                    origin: "a.json".to_string(),
                },
                "xjson::include_recursion",
            ),
            (
                XjsonError::ChecksumMismatch {
                    target: String::new(),
                    expected: String::new(),
                    actual: String::new(),
                },
                "xjson::checksum_mismatch",
            ),
            (
                XjsonError::Expression {
                    message: String::new(),
                },
                "xjson::expression",
            ),
        ];

        for (error, expected_code) in cases {
            assert_eq!(
                error.code().expect("missing diagnostic code").to_string(),
                expected_code
            );
        }
    }

    #[test]
    fn recursion_message_names_the_origin() {
        let err = XjsonError::IncludeRecursion {
            origin: "multi-level-include-recursive-first.json".to_string(),
        };
        assert!(
            err.to_string()
                .contains("multi-level-include-recursive-first.json")
        );
    }
}
