#![doc = include_str!("../README.md")]

mod error;
mod evaluator;
mod fetch;
mod origin;
mod resolver;
mod scanner;
mod sequence;
mod stripper;

use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::NamedSource;
use serde_json::Value;

pub use error::{Result, XjsonError};
pub use evaluator::{register_custom_scripting_extension, Arg, CustomFn};
pub use fetch::{DefaultFileReader, FetchError, FileReader, ReadError, ReqwestUrlFetcher, UrlFetcher};
pub use origin::Origin;

/// Tunables accepted by [`load`] and [`loads`]; mirrors the keyword
/// arguments the original loader exposed (`encoding`, `includes_path`,
/// `error_on_missing`).
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Only `"utf-8"` is currently supported; present so callers that pass
    /// an explicit encoding keep compiling if more are added later.
    pub encoding: String,
    /// Base directory used to resolve relative include paths when the
    /// including buffer's own origin has none (i.e. for [`loads`]).
    pub includes_path: Option<PathBuf>,
    /// When `true`, a missing include with no default raises
    /// [`XjsonError::IncludeNotFound`]; when `false`, it is silently
    /// substituted (key omitted / element omitted / `null`).
    pub error_on_missing: bool,
    /// Timeout applied to the default `reqwest`-based URL fetcher. Ignored
    /// when a custom [`UrlFetcher`] is supplied via [`load_with`]/[`loads_with`].
    pub http_timeout: Duration,
    /// Reserved for forward compatibility: checksums are always verified
    /// when an include site carries one, so this currently has no effect.
    pub checksum_enforced: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            encoding: "utf-8".to_string(),
            includes_path: None,
            error_on_missing: false,
            http_timeout: Duration::from_secs(30),
            checksum_enforced: true,
        }
    }
}

/// Read `path`, run the full comment/include/expression pipeline, and
/// return the resulting document.
pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Value> {
    let reader = DefaultFileReader;
    let fetcher = ReqwestUrlFetcher::with_timeout(options.http_timeout);
    load_with(path, options, &reader, &fetcher)
}

/// Same as [`load`] but with injected collaborators, for tests or callers
/// that want their own caching/fetching layer.
pub fn load_with(
    path: impl AsRef<Path>,
    options: &LoadOptions,
    file_reader: &dyn FileReader,
    url_fetcher: &dyn UrlFetcher,
) -> Result<Value> {
    let path = path.as_ref();
    let origin = Origin::File(path.to_path_buf());
    let bytes = file_reader.read_file(path).map_err(|e| XjsonError::Io {
        path: path.display().to_string(),
        message: format!("{e:?}"),
    })?;
    let text = decode(&bytes, &options.encoding, path)?;
    run_pipeline(&text, origin, options, file_reader, url_fetcher)
}

/// Run the pipeline over inline text. The buffer's [`Origin`] is
/// [`Origin::Inline`], so relative includes resolve against
/// `options.includes_path` (falling back to the current directory).
pub fn loads(text: &str, options: &LoadOptions) -> Result<Value> {
    let reader = DefaultFileReader;
    let fetcher = ReqwestUrlFetcher::with_timeout(options.http_timeout);
    loads_with(text, options, &reader, &fetcher)
}

pub fn loads_with(
    text: &str,
    options: &LoadOptions,
    file_reader: &dyn FileReader,
    url_fetcher: &dyn UrlFetcher,
) -> Result<Value> {
    run_pipeline(text, Origin::Inline, options, file_reader, url_fetcher)
}

fn decode(bytes: &[u8], encoding: &str, path: &Path) -> Result<String> {
    if !encoding.eq_ignore_ascii_case("utf-8") {
        return Err(XjsonError::Io {
            path: path.display().to_string(),
            message: format!("unsupported encoding `{encoding}`"),
        });
    }
    String::from_utf8(bytes.to_vec()).map_err(|e| XjsonError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn run_pipeline(
    text: &str,
    origin: Origin,
    options: &LoadOptions,
    file_reader: &dyn FileReader,
    url_fetcher: &dyn UrlFetcher,
) -> Result<Value> {
    tracing::debug!(origin = %origin, "starting load");

    let base_dir = origin
        .directory()
        .map(Path::to_path_buf)
        .or_else(|| options.includes_path.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let deps = resolver::Deps {
        file_reader,
        url_fetcher,
        includes_path: options.includes_path.as_deref(),
        error_on_missing: options.error_on_missing,
    };

    let mut call_frame = vec![origin.clone()];
    let spliced = resolver::resolve(text, &origin, &deps, &mut call_frame)?;
    let prequoted = evaluator::prequote_bare_tokens(&spliced);

    let mut document: Value = serde_json::from_str(&prequoted).map_err(|e| json_parse_error(&origin, &prequoted, e))?;

    evaluator::run(&mut document, file_reader, &base_dir)?;

    tracing::debug!(origin = %origin, "load complete");
    Ok(document)
}

fn json_parse_error(origin: &Origin, text: &str, err: serde_json::Error) -> XjsonError {
    let offset = byte_offset_of(text, err.line(), err.column());
    XjsonError::JsonParse {
        src: NamedSource::new(origin.display_name(), text.to_string()),
        span: (offset, 1).into(),
        message: err.to_string(),
    }
}

/// Convert `serde_json`'s 1-based (line, column) into a byte offset into
/// `text`, so `miette` can underline the original source.
fn byte_offset_of(text: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, l) in text.split('\n').enumerate() {
        if i + 1 == line {
            let col_byte = l
                .char_indices()
                .nth(column.saturating_sub(1))
                .map(|(b, _)| b)
                .unwrap_or(l.len());
            return offset + col_byte;
        }
        offset += l.len() + 1;
    }
    text.len()
}
