//! Phase 2: include scanner.
//!
//! Finds bare `#INCLUDE <BODY>` occurrences left in the comment-stripped
//! text and classifies the syntactic position each one sits in, so the
//! resolver (P3) knows whether to splice `"name": value`, `value`, or a
//! bare `value`.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteContext {
    ObjectMember,
    ArrayElement,
    BareValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeTarget {
    FilePath(String),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub property_name: Option<String>,
    pub target: IncludeTarget,
    pub default_value: Option<String>,
    pub checksum: Option<String>,
    pub span: Span,
    pub context: SiteContext,
}

/// A scan-time error: site context and directive body disagree about
/// whether a property name is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanIssue {
    MissingPropertyName { span: Span },
    UnexpectedPropertyName { span: Span },
}

fn include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#INCLUDE\s*<([^>]*)>").expect("valid regex"))
}

/// Split a leading `NAME:` prefix off `head`, the way a `https://...` target
/// isn't mistaken for `name=https, target=//...`. `regex` (this crate's
/// dependency) has no look-around support, so this is a hand-written cursor
/// scan rather than a `(?!//)`-style pattern.
fn strip_name_prefix(head: &str) -> (Option<String>, &str) {
    let bytes = head.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    if i == 0 || bytes.get(i) != Some(&b':') {
        return (None, head);
    }
    if head[i + 1..].starts_with("//") {
        return (None, head);
    }
    (Some(head[..i].to_string()), &head[i + 1..])
}

pub fn scan(text: &str) -> Result<Vec<IncludeDirective>, ScanIssue> {
    let mut directives = Vec::new();
    for m in include_re().captures_iter(text) {
        let whole = m.get(0).expect("group 0 always present");
        let body = m.get(1).expect("capture group 1").as_str();
        let span = Span {
            start: whole.start(),
            end: whole.end(),
        };
        let context = classify_context(text, whole.start());
        let (property_name, target, default_value, checksum) = parse_body(body);

        match (context, property_name.is_some()) {
            (SiteContext::ObjectMember, false) => {
                return Err(ScanIssue::MissingPropertyName { span });
            }
            (SiteContext::ArrayElement, true) | (SiteContext::BareValue, true) => {
                return Err(ScanIssue::UnexpectedPropertyName { span });
            }
            _ => {}
        }

        directives.push(IncludeDirective {
            property_name,
            target,
            default_value,
            checksum,
            span,
            context,
        });
    }
    Ok(directives)
}

/// Split `body` on top-level `|` (outside JSON strings and balanced
/// braces/brackets) to recover `NAME:TARGET`, `DEFAULT`, and `CHECKSUM`.
fn parse_body(body: &str) -> (
    Option<String>,
    IncludeTarget,
    Option<String>,
    Option<String>,
) {
    let parts = split_top_level(body);
    let head = parts.first().copied().unwrap_or("").trim();
    let default_value = parts.get(1).map(|s| s.trim().to_string());
    let checksum = parts.get(2).map(|s| s.trim().to_lowercase());

    let (property_name, target_text) = match strip_name_prefix(head) {
        (Some(name), rest) => (Some(name), rest.trim().to_string()),
        (None, _) => (None, head.to_string()),
    };

    let target = if target_text.starts_with("http://") || target_text.starts_with("https://") {
        IncludeTarget::Url(target_text)
    } else {
        IncludeTarget::FilePath(target_text)
    };

    (property_name, target, default_value, checksum)
}

fn split_top_level(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape = false;
    let mut boundaries = Vec::new();

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth -= 1,
            b'|' if depth == 0 => boundaries.push(i),
            _ => {}
        }
        if boundaries.len() == 2 {
            break;
        }
    }

    let mut parts = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    for &b in &boundaries {
        parts.push(&body[start..b]);
        start = b + 1;
    }
    parts.push(&body[start..]);
    parts
}

/// Determine whether `pos` (the byte offset of `#INCLUDE`) sits in
/// object-member, array-element, or bare-value position, by tracking
/// bracket nesting and the nearest non-whitespace predecessor from the
/// start of the buffer.
fn classify_context(text: &str, pos: usize) -> SiteContext {
    let bytes = text.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    let mut predecessor: Option<u8> = None;

    for &b in &bytes[..pos] {
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            if !b.is_ascii_whitespace() {
                predecessor = Some(b);
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => stack.push(b),
            b'}' | b']' => {
                stack.pop();
            }
            _ => {}
        }
        if !b.is_ascii_whitespace() {
            predecessor = Some(b);
        }
    }

    match predecessor {
        Some(b'{') => SiteContext::ObjectMember,
        Some(b'[') => SiteContext::ArrayElement,
        Some(b',') => match stack.last() {
            Some(b'{') => SiteContext::ObjectMember,
            Some(b'[') => SiteContext::ArrayElement,
            _ => SiteContext::BareValue,
        },
        _ => SiteContext::BareValue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_member_requires_name() {
        let text = r#"{ /* #INCLUDE <other.json> */ }"#;
        let err = scan(text).unwrap_err();
        assert!(matches!(err, ScanIssue::MissingPropertyName { .. }));
    }

    #[test]
    fn array_element_rejects_name() {
        let text = r#"[ /* #INCLUDE <Name:other.json> */ ]"#;
        let err = scan(text).unwrap_err();
        assert!(matches!(err, ScanIssue::UnexpectedPropertyName { .. }));
    }

    #[test]
    fn object_member_parses_name_and_target() {
        let text = r#"{ /* #INCLUDE <Steps:missing.json|[]> */ }"#;
        let directives = scan(text).unwrap();
        assert_eq!(directives.len(), 1);
        let d = &directives[0];
        assert_eq!(d.property_name.as_deref(), Some("Steps"));
        assert_eq!(d.target, IncludeTarget::FilePath("missing.json".to_string()));
        assert_eq!(d.default_value.as_deref(), Some("[]"));
        assert_eq!(d.context, SiteContext::ObjectMember);
    }

    #[test]
    fn bare_value_after_colon() {
        let text = r#"{"a": /* #INCLUDE <b.json> */ }"#;
        let directives = scan(text).unwrap();
        assert_eq!(directives[0].context, SiteContext::BareValue);
        assert!(directives[0].property_name.is_none());
    }

    #[test]
    fn url_target_is_recognized() {
        let text = r#"{ /* #INCLUDE <Data:https://example.com/a.json> */ }"#;
        let directives = scan(text).unwrap();
        assert_eq!(
            directives[0].target,
            IncludeTarget::Url("https://example.com/a.json".to_string())
        );
    }

    #[test]
    fn default_with_pipe_inside_string_is_not_split_early() {
        let text = r#"{ /* #INCLUDE <Steps:missing.json|{"note":"a|b"}|deadbeef> */ }"#;
        let directives = scan(text).unwrap();
        let d = &directives[0];
        assert_eq!(d.default_value.as_deref(), Some(r#"{"note":"a|b"}"#));
        assert_eq!(d.checksum.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn array_element_after_comma() {
        let text = r#"["x", /* #INCLUDE <b.json> */]"#;
        let directives = scan(text).unwrap();
        assert_eq!(directives[0].context, SiteContext::ArrayElement);
    }
}
