//! Extraction of structured payloads from free-form model responses.
//!
//! Model output usually wraps the useful part, a list of names or a
//! program, in a triple-backtick fenced block surrounded by prose.
//! These helpers slice out the first fenced block and normalize it.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// The error type for payload extraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractError {
    /// The response contains no triple-backtick fenced block.
    NoFencedBlock,
    /// A fenced block was opened but never closed.
    UnterminatedFence,
}

impl Display for ExtractError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::NoFencedBlock => write!(f, "no fenced block found"),
            ExtractError::UnterminatedFence => {
                write!(f, "fenced block is not terminated")
            }
        }
    }
}

impl Error for ExtractError {}

const FENCE: &str = "```";

/// Returns the contents of the first fenced block, verbatim.
///
/// The info string on the opening fence line (a language tag such as
/// ` ```python `) is discarded; the block contents start on the next
/// line and end right before the closing fence.
fn first_fenced_block(text: &str) -> Result<&str, ExtractError> {
    let open_idx = text.find(FENCE).ok_or(ExtractError::NoFencedBlock)?;
    let after_open = &text[open_idx + FENCE.len()..];
    let body_start = after_open
        .find('\n')
        .ok_or(ExtractError::UnterminatedFence)?
        + 1;
    let body = &after_open[body_start..];
    let close_idx = body.find(FENCE).ok_or(ExtractError::UnterminatedFence)?;
    Ok(&body[..close_idx])
}

const ANNOTATION_OPEN: &str = "<error>";
const ANNOTATION_CLOSE: &str = "</error>";

/// Extracts the first fenced code block from a raw model response.
///
/// The code-generation prompt asks the model to audit its own output
/// inside `<error>` tags, which may themselves contain a corrected
/// fenced block. Annotations in the surrounding prose are skipped,
/// fences inside them included; the first fenced block outside an
/// annotation is the payload and is returned verbatim, trailing
/// newline included. A literal `<error>` tag inside the payload is
/// part of the code and survives.
pub fn extract_code(raw: &str) -> Result<String, ExtractError> {
    let mut rest = raw;
    loop {
        match (rest.find(FENCE), rest.find(ANNOTATION_OPEN)) {
            (Some(fence_idx), Some(open_idx)) if open_idx < fence_idx => {
                let after_open = &rest[open_idx + ANNOTATION_OPEN.len()..];
                let Some(close_idx) = after_open.find(ANNOTATION_CLOSE)
                else {
                    // An unclosed annotation swallows everything after
                    // it, the fence included.
                    return Err(ExtractError::NoFencedBlock);
                };
                rest = &after_open[close_idx + ANNOTATION_CLOSE.len()..];
            }
            (Some(_), _) => {
                return first_fenced_block(rest).map(ToOwned::to_owned);
            }
            (None, _) => return Err(ExtractError::NoFencedBlock),
        }
    }
}

/// Extracts an ordered list of display names from a raw model response.
///
/// The first fenced block is split into lines and each line is
/// normalized, in order: a leading `"- "` bullet is dropped, the
/// substring after the last `". "` is taken (stripping numeric
/// prefixes such as `"12. "`), then the substring before the first
/// `": "` and before the first `" - "` (stripping trailing
/// annotations). Empty lines are kept as empty entries and duplicates
/// are not removed; downstream stages surface both explicitly.
pub fn extract_list(raw: &str) -> Result<Vec<String>, ExtractError> {
    let block = first_fenced_block(raw)?;
    Ok(block.lines().map(normalize_line).collect())
}

fn normalize_line(line: &str) -> String {
    let line = line.strip_prefix("- ").unwrap_or(line);
    let line = match line.rsplit_once(". ") {
        Some((_, rest)) => rest,
        None => line,
    };
    let line = match line.split_once(": ") {
        Some((name, _)) => name,
        None => line,
    };
    let line = match line.split_once(" - ") {
        Some((name, _)) => name,
        None => line,
    };
    line.to_owned()
}
