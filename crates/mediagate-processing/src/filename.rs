use std::path::Path;

use mediagate_core::AcceptedMediaType;

const OUTPUT_PREFIX: &str = "compressed_";
const MAX_FILENAME_LENGTH: usize = 255;

/// Name for a transcoded download: the original stem with anything outside
/// `[alnum - _]` replaced by `_`, prefixed and given the output type's extension.
pub fn suggest_output_filename(original: &str, output_type: AcceptedMediaType) -> String {
    let base = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(original);
    let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);

    let extension = output_type.canonical_extension();
    let budget = MAX_FILENAME_LENGTH - OUTPUT_PREFIX.len() - extension.len() - 1;
    let mut sanitized = String::with_capacity(stem.len());
    for c in stem.chars() {
        let c = if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' };
        if sanitized.len() + c.len_utf8() > budget {
            break;
        }
        sanitized.push(c);
    }

    if sanitized.trim_matches('_').is_empty() {
        sanitized = "file".to_string();
    }

    format!("{}{}.{}", OUTPUT_PREFIX, sanitized, extension)
}
