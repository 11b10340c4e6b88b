//! Built-in expression functions: digests, `uuid()`, `now()`, `sequence()`,
//! and `file_checksum()`.

use std::path::Path;

use chrono::{DateTime, FixedOffset};
use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use uuid::Uuid;

use crate::error::XjsonError;
use crate::fetch::FileReader;
use crate::sequence::SequenceRegistry;

use super::datetime;

/// The value produced by a single call step, before any postfix chain
/// method (`.utc()`, `.add()`) or JSON-value coercion is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Str(String),
    Int(i64),
    DateTime(DateTime<FixedOffset>),
}

pub fn digest_hex(algo: &str, bytes: &[u8]) -> String {
    match algo {
        "sha1" => {
            let mut hasher = Sha1::new();
            hasher.update(bytes);
            hex(&hasher.finalize())
        }
        "sha256" => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            hex(&hasher.finalize())
        }
        "sha512" => {
            let mut hasher = Sha512::new();
            hasher.update(bytes);
            hex(&hasher.finalize())
        }
        _ => {
            let mut hasher = Md5::new();
            hasher.update(bytes);
            hex(&hasher.finalize())
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn uuid_v4() -> String {
    Uuid::new_v4().to_string()
}

/// Format a counter value using a Python `str.format`-style mini-grammar —
/// specifically the `{0:FILL>WIDTH}` padding form used throughout this
/// expression language (e.g. `{0:0>4}` zero-pads to width 4). Any other
/// pattern is returned unchanged aside from substituting the bare value.
pub fn format_sequence(value: i64, fmt: &str) -> String {
    let inner = fmt.trim().strip_prefix('{').and_then(|s| s.strip_suffix('}'));
    let Some(inner) = inner else {
        return value.to_string();
    };
    let Some((index, spec)) = inner.split_once(':') else {
        return value.to_string();
    };
    if index != "0" {
        return value.to_string();
    }
    let mut chars = spec.chars();
    let Some(fill) = chars.next() else {
        return value.to_string();
    };
    let Some(align) = chars.next() else {
        return value.to_string();
    };
    let width: usize = chars.as_str().parse().unwrap_or(0);
    let plain = value.to_string();
    if plain.len() >= width {
        return plain;
    }
    let pad: String = std::iter::repeat(fill).take(width - plain.len()).collect();
    match align {
        '>' => format!("{pad}{plain}"),
        '<' => format!("{plain}{pad}"),
        _ => plain,
    }
}

pub struct FileChecksumCtx<'a> {
    pub reader: &'a dyn FileReader,
    pub base_dir: &'a Path,
}

pub fn file_checksum(ctx: &FileChecksumCtx<'_>, path: &str, algo: Option<&str>) -> Result<String, XjsonError> {
    let full_path = Path::new(path);
    let full_path = if full_path.is_absolute() {
        full_path.to_path_buf()
    } else {
        ctx.base_dir.join(full_path)
    };
    let bytes = ctx.reader.read_file(&full_path).map_err(|e| XjsonError::Io {
        path: full_path.display().to_string(),
        message: format!("{e:?}"),
    })?;
    Ok(digest_hex(algo.unwrap_or("md5"), &bytes))
}

pub fn sequence_value(seq: &mut SequenceRegistry, name: &str, step: i64) -> i64 {
    seq.next(name, step)
}

pub fn now() -> DateTime<FixedOffset> {
    datetime::now_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_matches_known_vector() {
        assert_eq!(digest_hex("md5", b"test string"), "6f8db599de986fab7a21625b7916589c");
    }

    #[test]
    fn zero_pad_format() {
        assert_eq!(format_sequence(1, "{0:0>4}"), "0001");
        assert_eq!(format_sequence(42, "{0:0>4}"), "0042");
    }

    #[test]
    fn unrecognized_format_falls_back_to_plain() {
        assert_eq!(format_sequence(7, "not-a-format"), "7");
    }
}
