//! Anchor-based splicing of code blobs.
//!
//! Both operations are stateless, single-pass transformations over strings.
//! Anchors are literal substrings located by first occurrence; they are
//! positional landmarks, not patterns. Idempotence is a caller concern: the
//! patch flow pre-checks a guard substring and skips the splice when the
//! content is already present.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpliceError {
    #[error("anchor not found: {anchor:?} (searched from offset {searched_from})")]
    AnchorNotFound { anchor: String, searched_from: usize },
}

/// Insert `insertion` immediately after the first occurrence of `anchor`.
pub fn insert_after(buffer: &str, anchor: &str, insertion: &str) -> Result<String, SpliceError> {
    let start = locate(buffer, anchor, 0)?;
    let anchor_end = start + anchor.len();
    let mut output = String::with_capacity(buffer.len() + insertion.len());
    output.push_str(&buffer[..anchor_end]);
    output.push_str(insertion);
    output.push_str(&buffer[anchor_end..]);
    Ok(output)
}

/// Replace everything from the start of `anchor` up to (not including) the
/// first occurrence of `terminator` after the anchor with `replacement`.
pub fn replace_to_terminator(
    buffer: &str,
    anchor: &str,
    terminator: &str,
    replacement: &str,
) -> Result<String, SpliceError> {
    let anchor_start = locate(buffer, anchor, 0)?;
    // Terminator search begins strictly after the anchor start so an anchor
    // that is a prefix of the terminator cannot match itself.
    let terminator_start = locate(buffer, terminator, after_start(buffer, anchor_start))?;

    let mut output = String::with_capacity(buffer.len() + replacement.len());
    output.push_str(&buffer[..anchor_start]);
    output.push_str(replacement);
    output.push_str(&buffer[terminator_start..]);
    Ok(output)
}

/// Try each anchor in order and return the offset and anchor that matched
/// first. The original deploy scripts carry a fallback anchor for blobs that
/// predate the primary section marker.
pub fn find_first<'a>(buffer: &str, anchors: &'a [String]) -> Option<(usize, &'a str)> {
    for anchor in anchors {
        if let Some(start) = buffer.find(anchor.as_str()) {
            return Some((start, anchor));
        }
    }
    None
}

/// Offset one character past `start`, staying on a char boundary.
pub(crate) fn after_start(buffer: &str, start: usize) -> usize {
    buffer[start..]
        .chars()
        .next()
        .map_or(start + 1, |ch| start + ch.len_utf8())
}

fn locate(buffer: &str, needle: &str, searched_from: usize) -> Result<usize, SpliceError> {
    if searched_from >= buffer.len() {
        return Err(SpliceError::AnchorNotFound {
            anchor: needle.to_string(),
            searched_from,
        });
    }
    buffer[searched_from..]
        .find(needle)
        .map(|offset| searched_from + offset)
        .ok_or_else(|| SpliceError::AnchorNotFound {
            anchor: needle.to_string(),
            searched_from,
        })
}
