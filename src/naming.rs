//! Turning model output into a usable filename stem.
//!
//! Vision models answer with free text: it may be quoted, end in a full stop,
//! span several lines, or contain path separators. [`sanitize_filename`]
//! reduces that text to a stem that, with a counter suffix and extension,
//! stays inside the 255-byte name limit of common filesystems:
//!
//! - `"红色沙发。"` → `红色沙发`
//! - `  "Red: sofa?"  ` → `Red sofa`
//! - `a/b\c` → `abc`
//!
//! The result is a stem only. The caller appends the original extension.

/// Characters Windows refuses in file names. Removed everywhere, not just at
/// the ends.
const RESERVED: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Quote marks peeled off both ends of the suggestion.
const QUOTES: &[char] = &['"', '\'', '“', '”', '‘', '’'];

/// Punctuation dropped from the end of the suggestion (ASCII and CJK).
const TRAILING_PUNCTUATION: &[char] = &[
    '。', '？', '！', '，', '、', '；', '：', '“', '”', '‘', '’', '《', '》', '（', '）', '【', '】',
    '『', '』', '「', '」', '[', ']', '.', ',', ';', ':', '"', '\'', '?', '!', '(', ')', '{', '}',
    '<', '>',
];

/// Longest stem we keep, in UTF-8 bytes. Filesystems limit names by bytes,
/// and a CJK character takes three, so counting characters is not enough.
/// The remaining 55 bytes hold a `_N` suffix and the extension.
pub const MAX_STEM_BYTES: usize = 200;

/// Longest prefix of `text` that fits in `max` bytes, cut on a char boundary.
fn truncate_to_bytes(text: &str, max: usize) -> &str {
    let end = text
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= max)
        .last()
        .unwrap_or(0);
    &text[..end]
}

/// Sanitize model-returned text into a filename stem.
///
/// Total and idempotent: `sanitize_filename(&sanitize_filename(x)) ==
/// sanitize_filename(x)` for every `x`, and the output never contains a
/// [reserved](RESERVED) character. May return an empty string when nothing
/// usable is left.
pub fn sanitize_filename(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !RESERVED.contains(c) && !c.is_control())
        .collect();

    let mut current = truncate_to_bytes(&cleaned, MAX_STEM_BYTES);
    loop {
        let next = current
            .trim()
            .trim_matches(QUOTES)
            .trim_end_matches(TRAILING_PUNCTUATION);
        if next == current {
            break;
        }
        current = next;
    }
    current.to_string()
}
