//! Locates the single JSON object embedded in mixed CLI output.
//!
//! The `snc` CLI interleaves human-readable status lines (spinner glyphs,
//! "Request completed" banners) with exactly one JSON payload. The scan is
//! pure brace counting over raw bytes: quoting inside the payload is
//! irrelevant to the count, so no string-literal handling is needed for the
//! payloads this tool consumes.

use serde_json::Value;
use thiserror::Error;

/// Byte-offset span of a balanced `{`/`}` group inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancedRegion {
    pub start: usize,
    pub end: usize,
}

impl BalancedRegion {
    pub fn slice<'a>(&self, buffer: &'a str) -> &'a str {
        &buffer[self.start..self.end]
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no opening brace found in buffer ({len} bytes)")]
    NotFound { len: usize },
    #[error("unbalanced braces: scan from offset {start} ended at depth {depth}")]
    Truncated { start: usize, depth: usize },
    #[error("extracted region is not valid JSON ({snippet}): {source}")]
    Decode {
        snippet: String,
        source: serde_json::Error,
    },
}

/// Find the first balanced brace group: start at the first `{`, walk forward
/// incrementing on `{` and decrementing on `}`, and stop one past the brace
/// that returns the depth to zero.
pub fn find_balanced_region(buffer: &str) -> Result<BalancedRegion, ExtractError> {
    let start = buffer
        .find('{')
        .ok_or(ExtractError::NotFound { len: buffer.len() })?;

    let mut depth = 0usize;
    for (offset, &byte) in buffer.as_bytes()[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(BalancedRegion {
                        start,
                        end: start + offset + 1,
                    });
                }
            }
            _ => {}
        }
    }

    Err(ExtractError::Truncated { start, depth })
}

/// Carve the balanced region out of `buffer` and parse it as JSON.
pub fn extract_embedded_json(buffer: &str) -> Result<Value, ExtractError> {
    let region = find_balanced_region(buffer)?;
    let raw = region.slice(buffer);
    serde_json::from_str(raw).map_err(|source| ExtractError::Decode {
        snippet: snippet_of(raw),
        source,
    })
}

fn snippet_of(raw: &str) -> String {
    const MAX: usize = 80;
    if raw.len() <= MAX {
        return raw.to_string();
    }
    let mut cut = MAX;
    while !raw.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &raw[..cut])
}
