//! Phase 3: include resolution.
//!
//! Walks the include sites found by the scanner in textual order, fetches
//! each target, applies default/checksum/recursion rules, and splices the
//! resolved JSON text back into the parent buffer. Nested includes are
//! resolved by recursing through the stripper and scanner again on the
//! fetched body, so the whole document collapses to one flat, comment-free,
//! include-free buffer before it ever reaches the JSON parser.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use miette::{NamedSource, SourceSpan};

use crate::error::XjsonError;
use crate::fetch::{FetchError, FileReader, ReadError, UrlFetcher};
use crate::origin::Origin;
use crate::scanner::{self, IncludeDirective, IncludeTarget, ScanIssue, SiteContext};
use crate::stripper;

pub struct Deps<'a> {
    pub file_reader: &'a dyn FileReader,
    pub url_fetcher: &'a dyn UrlFetcher,
    pub includes_path: Option<&'a Path>,
    pub error_on_missing: bool,
}

/// Strip comments, scan for includes, and splice them all, recursing into
/// nested includes as needed. Returns flat JSON-ish text (expressions may
/// still be present; those are left for the evaluator after parsing).
#[tracing::instrument(skip(raw_text, deps, call_frame), fields(origin = %origin))]
pub fn resolve(
    raw_text: &str,
    origin: &Origin,
    deps: &Deps,
    call_frame: &mut Vec<Origin>,
) -> Result<String, XjsonError> {
    let cleaned = stripper::strip(raw_text);
    let directives = scanner::scan(&cleaned).map_err(|issue| scan_issue_to_error(issue, origin, &cleaned))?;

    let mut out = String::with_capacity(cleaned.len());
    let mut cursor = 0;

    for directive in &directives {
        let outcome = resolve_one(directive, origin, &cleaned, deps, call_frame)?;
        let (ext_start, ext_end, splice_text) = match outcome {
            Outcome::Text(body) => {
                let text = format_splice(directive, &body, &cleaned);
                (directive.span.start, directive.span.end, Some(text))
            }
            Outcome::Omit => compute_omission_span(&cleaned, directive.span.start, directive.span.end),
        };

        out.push_str(&cleaned[cursor..ext_start]);
        if let Some(text) = splice_text {
            out.push_str(&text);
        }
        cursor = ext_end;
    }
    out.push_str(&cleaned[cursor..]);

    Ok(out)
}

enum Outcome {
    Text(String),
    Omit,
}

fn resolve_one(
    directive: &IncludeDirective,
    origin: &Origin,
    cleaned: &str,
    deps: &Deps,
    call_frame: &mut Vec<Origin>,
) -> Result<Outcome, XjsonError> {
    let target_origin = target_origin(&directive.target, origin, deps);
    let fetched = fetch(&directive.target, &target_origin, deps);

    let bytes = match fetched {
        Ok(bytes) => bytes,
        Err(_) => {
            return match &directive.default_value {
                Some(default_text) => Ok(Outcome::Text(default_text.clone())),
                None if deps.error_on_missing => Err(XjsonError::IncludeNotFound {
                    src: NamedSource::new(origin.display_name(), cleaned.to_string()),
                    span: (directive.span.start, directive.span.end - directive.span.start).into(),
                    target: target_display(&directive.target),
                }),
                None => Ok(Outcome::Omit),
            };
        }
    };

    if let Some(expected) = &directive.checksum {
        let mut hasher = Md5::new();
        hasher.update(&bytes);
        let actual = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>();
        if &actual != expected {
            return Err(XjsonError::ChecksumMismatch {
                target: target_display(&directive.target),
                expected: expected.clone(),
                actual,
            });
        }
    }

    if call_frame.contains(&target_origin) {
        return Err(XjsonError::IncludeRecursion {
            origin: target_origin.display_name(),
        });
    }

    let body_text = String::from_utf8_lossy(&bytes).into_owned();
    call_frame.push(target_origin.clone());
    let spliced = resolve(&body_text, &target_origin, deps, call_frame)?;
    call_frame.pop();

    Ok(Outcome::Text(spliced))
}

fn target_origin(target: &IncludeTarget, origin: &Origin, deps: &Deps) -> Origin {
    match target {
        IncludeTarget::Url(url) => Origin::Url(url.clone()),
        IncludeTarget::FilePath(path) => Origin::File(resolve_path(path, origin, deps)),
    }
}

fn resolve_path(target_path: &str, origin: &Origin, deps: &Deps) -> PathBuf {
    let candidate = Path::new(target_path);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    if let Some(dir) = origin.directory() {
        return dir.join(candidate);
    }
    if let Some(includes_path) = deps.includes_path {
        return includes_path.join(candidate);
    }
    std::env::current_dir()
        .unwrap_or_default()
        .join(candidate)
}

fn fetch(target: &IncludeTarget, target_origin: &Origin, deps: &Deps) -> Result<Vec<u8>, ()> {
    match target {
        IncludeTarget::Url(url) => deps.url_fetcher.fetch_url(url).map_err(|e: FetchError| {
            tracing::debug!(%url, ?e, "include fetch failed");
        }),
        IncludeTarget::FilePath(_) => {
            let Origin::File(path) = target_origin else {
                unreachable!("file targets always resolve to a File origin")
            };
            deps.file_reader.read_file(path).map_err(|e: ReadError| {
                tracing::debug!(path = %path.display(), ?e, "include read failed");
            })
        }
    }
}

fn target_display(target: &IncludeTarget) -> String {
    match target {
        IncludeTarget::FilePath(p) => p.clone(),
        IncludeTarget::Url(u) => u.clone(),
    }
}

fn format_splice(directive: &IncludeDirective, body: &str, cleaned: &str) -> String {
    let body = body.trim();
    let comma = if needs_trailing_comma(cleaned, directive.span.end) {
        ","
    } else {
        ""
    };
    match directive.context {
        SiteContext::ObjectMember => {
            let name = directive.property_name.as_deref().unwrap_or_default();
            format!("\"{name}\": {body}{comma}")
        }
        SiteContext::ArrayElement | SiteContext::BareValue => format!("{body}{comma}"),
    }
}

fn needs_trailing_comma(cleaned: &str, directive_end: usize) -> bool {
    let after = cleaned[directive_end..].trim_start();
    !matches!(after.chars().next(), Some(',') | Some('}') | Some(']') | None)
}

/// When an include is silently omitted in non-strict mode, also swallow a
/// comma on whichever side would otherwise leave `,,` or a leading/trailing
/// stray comma behind.
fn compute_omission_span(cleaned: &str, start: usize, end: usize) -> (usize, usize, Option<String>) {
    let after = cleaned[end..].trim_start();
    if after.starts_with(',') {
        let ws_len = cleaned[end..].len() - after.len();
        return (start, end + ws_len + 1, None);
    }
    let before = &cleaned[..start];
    let trimmed = before.trim_end();
    if trimmed.ends_with(',') {
        return (trimmed.len() - 1, end, None);
    }
    (start, end, None)
}

fn scan_issue_to_error(issue: ScanIssue, origin: &Origin, cleaned: &str) -> XjsonError {
    match issue {
        ScanIssue::MissingPropertyName { span } => XjsonError::MissingPropertyName {
            src: NamedSource::new(origin.display_name(), cleaned.to_string()),
            span: span_to_source_span(span),
        },
        ScanIssue::UnexpectedPropertyName { span } => XjsonError::UnexpectedPropertyName {
            src: NamedSource::new(origin.display_name(), cleaned.to_string()),
            span: span_to_source_span(span),
        },
    }
}

fn span_to_source_span(span: crate::scanner::Span) -> SourceSpan {
    (span.start, span.end - span.start).into()
}
