//! Phase 5: expression evaluation.
//!
//! Walks the parsed document depth-first, left to right, evaluating
//! `$.func(...)` calls and `$root`/`$parent`/`$this` path references found
//! in string values (and in bare tokens that were pre-quoted by
//! [`prequote_bare_tokens`] before the strict JSON parse).

mod datetime;
mod functions;
mod grammar;
mod registry;

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::XjsonError;
use crate::fetch::FileReader;
use crate::sequence::SequenceRegistry;

use functions::{CallResult, FileChecksumCtx};
use grammar::{CallStep, Expr, PathSegment, Scope};

pub use grammar::Arg;
pub use registry::{register as register_custom_scripting_extension, CustomFn};

/// Marks a value that was a bare (unquoted) `$...` token in the original
/// source before [`prequote_bare_tokens`] wrapped it in a JSON string so
/// the strict parser would accept it. Evaluation unwraps this marker and,
/// for functions like `sequence()` whose bare form is typed, restores the
/// native JSON type.
const BARE_MARKER: &str = "\u{0}XJSON_BARE\u{0}";

/// Wrap bare `$...` expression tokens outside of JSON strings in quotes
/// (tagged with [`BARE_MARKER`]) so the strict JSON parser in P4 accepts
/// them as string values. Must run after include splicing and before
/// parsing.
pub fn prequote_bare_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape = false;
    let mut i = 0;

    while let Some(c) = text[i..].chars().next() {
        if in_string {
            out.push(c);
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            i += c.len_utf8();
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push('"');
            i += 1;
            continue;
        }
        if c == '$' {
            if let Some((_, end)) = grammar::parse_at(text, i) {
                out.push('"');
                out.push_str(BARE_MARKER);
                out.push_str(&text[i..end]);
                out.push('"');
                i = end;
                continue;
            }
        }
        out.push(c);
        i += c.len_utf8();
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seg {
    Key(String),
    Index(usize),
}

fn get_by_segs<'v>(root: &'v Value, path: &[Seg]) -> Option<&'v Value> {
    let mut cur = root;
    for seg in path {
        cur = match (cur, seg) {
            (Value::Object(map), Seg::Key(k)) => map.get(k)?,
            (Value::Array(arr), Seg::Index(i)) => arr.get(*i)?,
            _ => return None,
        };
    }
    Some(cur)
}

fn set_by_segs(root: &mut Value, path: &[Seg], value: Value) {
    let mut cur = root;
    for seg in path {
        cur = match (cur, seg) {
            (Value::Object(map), Seg::Key(k)) => map.get_mut(k).expect("path was just visited"),
            (Value::Array(arr), Seg::Index(i)) => arr.get_mut(*i).expect("path was just visited"),
            _ => unreachable!("path segments must match the tree shape they were built from"),
        };
    }
    *cur = value;
}

struct Ctx<'a> {
    published: Value,
    sequences: SequenceRegistry,
    this_stack: Vec<Vec<Seg>>,
    file_reader: &'a dyn FileReader,
    base_dir: PathBuf,
}

/// Evaluate every expression in `doc` in place.
#[tracing::instrument(skip(doc, file_reader, base_dir))]
pub fn run(doc: &mut Value, file_reader: &dyn FileReader, base_dir: &Path) -> Result<(), XjsonError> {
    let mut ctx = Ctx {
        published: doc.clone(),
        sequences: SequenceRegistry::new(),
        this_stack: Vec::new(),
        file_reader,
        base_dir: base_dir.to_path_buf(),
    };
    walk(doc, &mut ctx, &[])
}

fn walk(node: &mut Value, ctx: &mut Ctx<'_>, path: &[Seg]) -> Result<(), XjsonError> {
    match node {
        Value::Object(map) => {
            ctx.this_stack.push(path.to_vec());
            let keys: Vec<String> = map.keys().cloned().collect();
            for key in keys {
                let mut child_path = path.to_vec();
                child_path.push(Seg::Key(key.clone()));
                let child = map.get_mut(&key).expect("key was just listed");
                walk(child, ctx, &child_path)?;
            }
            ctx.this_stack.pop();
        }
        Value::Array(arr) => {
            for (i, child) in arr.iter_mut().enumerate() {
                let mut child_path = path.to_vec();
                child_path.push(Seg::Index(i));
                walk(child, ctx, &child_path)?;
            }
        }
        Value::String(s) => {
            let new_value = evaluate_string(s, ctx)?;
            set_by_segs(&mut ctx.published, path, new_value.clone());
            *node = new_value;
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

fn evaluate_string(s: &str, ctx: &mut Ctx<'_>) -> Result<Value, XjsonError> {
    if let Some(rest) = s.strip_prefix(BARE_MARKER) {
        return Ok(match grammar::parse_at(rest, 0) {
            Some((expr, _)) => evaluate_expr_whole(&expr, ctx, true)?,
            None => Value::String(s.to_string()),
        });
    }

    let occurrences = find_expressions(s);
    if occurrences.is_empty() {
        return Ok(Value::String(s.to_string()));
    }
    if occurrences.len() == 1 && occurrences[0].0 == 0 && occurrences[0].1 == s.len() {
        return evaluate_expr_whole(&occurrences[0].2, ctx, false);
    }

    let mut out = String::with_capacity(s.len());
    let mut cursor = 0;
    for (start, end, expr) in &occurrences {
        out.push_str(&s[cursor..*start]);
        match resolve_to_plain_string(expr, ctx)? {
            Some(rendered) => out.push_str(&rendered),
            None => out.push_str(&s[*start..*end]),
        }
        cursor = *end;
    }
    out.push_str(&s[cursor..]);
    Ok(Value::String(out))
}

/// Evaluate `expr` as the entirety of a value (as opposed to embedded in a
/// larger string). Path references keep their native JSON type; calls are
/// native only when they came from a bare (unquoted) token.
fn evaluate_expr_whole(expr: &Expr, ctx: &mut Ctx<'_>, bare: bool) -> Result<Value, XjsonError> {
    match expr {
        Expr::Path { scope, segments } => Ok(resolve_path(*scope, segments, ctx)
            .unwrap_or_else(|| Value::String(render_path_literal(*scope, segments)))),
        Expr::Call(steps) => {
            let result = evaluate_call_chain(steps, ctx)?;
            Ok(callresult_to_value(result, bare))
        }
    }
}

/// Resolve `expr` for embedding inside a larger string. Returns `None` when
/// a path reference cannot be resolved, signaling the caller to leave the
/// original literal text in place.
fn resolve_to_plain_string(expr: &Expr, ctx: &mut Ctx<'_>) -> Result<Option<String>, XjsonError> {
    match expr {
        Expr::Path { scope, segments } => Ok(resolve_path(*scope, segments, ctx).map(|v| value_to_plain_string(&v))),
        Expr::Call(steps) => {
            let result = evaluate_call_chain(steps, ctx)?;
            Ok(Some(callresult_to_plain_string(result)))
        }
    }
}

fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn render_path_literal(scope: Scope, segments: &[PathSegment]) -> String {
    let scope_name = match scope {
        Scope::Root => "root",
        Scope::Parent => "parent",
        Scope::This => "this",
    };
    let mut s = format!("${scope_name}");
    for seg in segments {
        s.push('.');
        s.push_str(&seg.name);
        if let Some(idx) = seg.index {
            s.push('[');
            s.push_str(&idx.to_string());
            s.push(']');
        }
    }
    s
}

fn resolve_path(scope: Scope, segments: &[PathSegment], ctx: &Ctx<'_>) -> Option<Value> {
    let anchor_path: Vec<Seg> = match scope {
        Scope::Root => Vec::new(),
        Scope::This => ctx.this_stack.last()?.clone(),
        Scope::Parent => {
            let len = ctx.this_stack.len();
            if len < 2 {
                return None;
            }
            ctx.this_stack[len - 2].clone()
        }
    };
    let mut anchor = get_by_segs(&ctx.published, &anchor_path)?;
    for seg in segments {
        anchor = match anchor {
            Value::Object(map) => map.get(&seg.name)?,
            _ => return None,
        };
        if let Some(idx) = seg.index {
            anchor = match anchor {
                Value::Array(arr) => arr.get(idx as usize)?,
                _ => return None,
            };
        }
    }
    Some(anchor.clone())
}

fn find_expressions(s: &str) -> Vec<(usize, usize, Expr)> {
    let mut found = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            if let Some((expr, end)) = grammar::parse_at(s, i) {
                found.push((i, end, expr));
                i = end;
                continue;
            }
        }
        i += 1;
    }
    found
}

fn evaluate_call_chain(steps: &[CallStep], ctx: &mut Ctx<'_>) -> Result<CallResult, XjsonError> {
    let first = steps.first().expect("a call chain always has an initial step");
    let mut result = match registry::call(&first.name, &first.args) {
        Some(Ok(s)) => CallResult::Str(s),
        Some(Err(message)) => return Err(expr_err(message)),
        None => dispatch_builtin(&first.name, &first.args, ctx)?,
    };
    for step in &steps[1..] {
        result = apply_chain_step(result, step)?;
    }
    Ok(result)
}

fn dispatch_builtin(name: &str, args: &[Arg], ctx: &mut Ctx<'_>) -> Result<CallResult, XjsonError> {
    match name {
        "uuid" => Ok(CallResult::Str(functions::uuid_v4())),
        "md5" | "sha1" | "sha256" | "sha512" => {
            let input = match args.first() {
                Some(Arg::Str(s)) => s.clone(),
                None => functions::uuid_v4(),
                _ => return Err(expr_err(format!("{name}() expects a string argument"))),
            };
            Ok(CallResult::Str(functions::digest_hex(name, input.as_bytes())))
        }
        "now" => {
            let dt = functions::now();
            match args.first() {
                Some(Arg::Str(fmt)) => Ok(CallResult::Str(datetime::format_tokens(dt, fmt))),
                None => Ok(CallResult::DateTime(dt)),
                _ => Err(expr_err("now() expects a format string")),
            }
        }
        "file_checksum" => {
            let path = match args.first() {
                Some(Arg::Str(s)) => s.clone(),
                _ => return Err(expr_err("file_checksum() requires a path argument")),
            };
            let algo = match args.get(1) {
                Some(Arg::Str(s)) => Some(s.as_str()),
                _ => None,
            };
            let fctx = FileChecksumCtx {
                reader: ctx.file_reader,
                base_dir: &ctx.base_dir,
            };
            Ok(CallResult::Str(functions::file_checksum(&fctx, &path, algo)?))
        }
        "sequence" => {
            let seq_name = match args.first() {
                Some(Arg::Str(s)) => s.clone(),
                _ => return Err(expr_err("sequence() requires a name argument")),
            };
            let fmt = match args.get(1) {
                Some(Arg::Str(s)) => Some(s.clone()),
                Some(Arg::Null) | None => None,
                _ => return Err(expr_err("sequence() format must be a string or null")),
            };
            let step = match args.get(2) {
                Some(Arg::Int(n)) => *n,
                Some(Arg::Null) | None => 1,
                _ => return Err(expr_err("sequence() step must be an integer")),
            };
            let value = functions::sequence_value(&mut ctx.sequences, &seq_name, step);
            match fmt {
                Some(f) => Ok(CallResult::Str(functions::format_sequence(value, &f))),
                None => Ok(CallResult::Int(value)),
            }
        }
        other => Err(expr_err(format!("unknown function `{other}`"))),
    }
}

fn apply_chain_step(prev: CallResult, step: &CallStep) -> Result<CallResult, XjsonError> {
    match step.name.as_str() {
        "utc" => match prev {
            CallResult::DateTime(dt) => Ok(CallResult::DateTime(datetime::to_utc(dt))),
            _ => Err(expr_err(".utc() requires a datetime result to its left")),
        },
        "add" => match prev {
            CallResult::DateTime(mut dt) => {
                let mut fmt: Option<String> = None;
                for arg in &step.args {
                    match arg {
                        Arg::KeyValue(key, amount) => {
                            let unit = datetime::DurationUnit::from_key(key)
                                .ok_or_else(|| expr_err(format!("unknown duration unit `{key}`")))?;
                            dt = datetime::add(dt, unit, *amount);
                        }
                        Arg::Str(s) => fmt = Some(s.clone()),
                        _ => return Err(expr_err(".add() arguments must be duration keywords or a format string")),
                    }
                }
                match fmt {
                    Some(f) => Ok(CallResult::Str(datetime::format_tokens(dt, &f))),
                    None => Ok(CallResult::DateTime(dt)),
                }
            }
            _ => Err(expr_err(".add() requires a datetime result to its left")),
        },
        other => Err(expr_err(format!("unknown chain method `{other}`"))),
    }
}

fn callresult_to_value(result: CallResult, bare: bool) -> Value {
    match result {
        CallResult::Str(s) => Value::String(s),
        CallResult::Int(n) if bare => Value::Number(n.into()),
        CallResult::Int(n) => Value::String(n.to_string()),
        CallResult::DateTime(dt) => Value::String(datetime::to_iso8601(dt)),
    }
}

fn callresult_to_plain_string(result: CallResult) -> String {
    match result {
        CallResult::Str(s) => s,
        CallResult::Int(n) => n.to_string(),
        CallResult::DateTime(dt) => datetime::to_iso8601(dt),
    }
}

fn expr_err(message: impl Into<String>) -> XjsonError {
    XjsonError::Expression { message: message.into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::DefaultFileReader;
    use serde_json::json;

    fn eval(mut doc: Value) -> Value {
        run(&mut doc, &DefaultFileReader, Path::new(".")).expect("evaluation should succeed");
        doc
    }

    #[test]
    fn md5_matches_known_vector() {
        let doc = eval(json!({"a": "$.md5('test string')"}));
        assert_eq!(doc, json!({"a": "6f8db599de986fab7a21625b7916589c"}));
    }

    #[test]
    fn root_path_embedded_in_string() {
        let doc = eval(json!({"prefix": "A", "x": "Z-$root.prefix"}));
        assert_eq!(doc, json!({"prefix": "A", "x": "Z-A"}));
    }

    #[test]
    fn bare_sequence_yields_native_ints() {
        let prequoted = prequote_bare_tokens(
            r#"{"first":[{"id":$.sequence('A')},{"id":$.sequence('A')},{"id":$.sequence('A')},{"id":$.sequence('A')}]}"#,
        );
        let mut doc: Value = serde_json::from_str(&prequoted).unwrap();
        run(&mut doc, &DefaultFileReader, Path::new(".")).unwrap();
        assert_eq!(
            doc,
            json!({"first": [{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}]})
        );
    }

    #[test]
    fn quoted_sequence_without_format_is_a_string() {
        let doc = eval(json!({"second": "$.sequence('B')"}));
        assert_eq!(doc, json!({"second": "1"}));
    }

    #[test]
    fn sequence_with_zero_pad_format() {
        let doc = eval(json!({
            "first": [
                {"id": "$.sequence('A','{0:0>4}')"},
                {"id": "$.sequence('A','{0:0>4}')"}
            ]
        }));
        assert_eq!(doc, json!({"first": [{"id": "0001"}, {"id": "0002"}]}));
    }

    #[test]
    fn unresolved_path_is_left_literal() {
        let doc = eval(json!({"x": "$root.missing"}));
        assert_eq!(doc, json!({"x": "$root.missing"}));
    }

    #[test]
    fn this_and_parent_scopes() {
        let doc = eval(json!({
            "test1X": "outer",
            "child": {
                "deep1": "inner",
                "viaThis": "$this.deep1",
                "viaParent": "$parent.test1X"
            }
        }));
        assert_eq!(doc["child"]["viaThis"], json!("inner"));
        assert_eq!(doc["child"]["viaParent"], json!("outer"));
    }
}
