//! The chunker: splits a formatted output blob into an ordered list of
//! wire frames, each no larger than `MAX_PAYLOAD` bytes (spec §4.2).

use super::frame::{chunk_header, serialize_overflow};

/// Default wire-frame size bound, in bytes (spec §6).
pub const DEFAULT_MAX_PAYLOAD: usize = 200;

/// Splits `blob` into chunk frames addressed to command `id`, each at most
/// `max_payload` bytes.
///
/// Runs the fixed-point algorithm from spec §4.2: starting from a guess of
/// one chunk, lay out frames using headers sized for that guess, then
/// repeat with the actual chunk count produced until the count stabilizes.
/// Header length is non-decreasing in the chunk count, so each pass is
/// monotone and the loop converges in `O(log10 n)` passes.
///
/// An empty blob produces zero chunks — callers handle that as a distinct
/// "no output to chunk" case (spec §4.6 item 4) rather than a chunker
/// concern.
///
/// If `max_payload` is too small to fit even the first chunk's header, a
/// single overflow frame is returned instead.
#[must_use]
pub fn chunk_output(id: &str, blob: &str, max_payload: usize) -> Vec<String> {
    if blob.is_empty() {
        return Vec::new();
    }

    let mut guess = 1usize;
    loop {
        match lay_out(id, blob, max_payload, guess) {
            LayoutResult::Overflow => return vec![serialize_overflow(id)],
            LayoutResult::Chunks(chunks) if chunks.len() == guess => return chunks,
            LayoutResult::Chunks(chunks) => guess = chunks.len().max(1),
        }
    }
}

enum LayoutResult {
    Chunks(Vec<String>),
    Overflow,
}

/// Lays out `blob` assuming a total chunk count of `total`, returning the
/// frames actually produced (which may differ from `total` if the guess
/// was wrong — the caller re-lays-out with the corrected count).
fn lay_out(id: &str, blob: &str, max_payload: usize, total: usize) -> LayoutResult {
    let mut chunks = Vec::new();
    let mut pos = 0usize;
    let mut index = 0usize;

    while pos < blob.len() {
        let header = chunk_header(id, index, total);
        if header.len() >= max_payload {
            return LayoutResult::Overflow;
        }
        let available = max_payload - header.len();
        let mut end = (pos + available).min(blob.len());
        while end > pos && !blob.is_char_boundary(end) {
            end -= 1;
        }
        chunks.push(format!("{header}{}", &blob[pos..end]));
        pos = end;
        index += 1;
    }

    LayoutResult::Chunks(chunks)
}
