//! Content-aware splitting of crawled markdown into retrieval-sized chunks.
//!
//! The scan works on characters, not bytes, so multi-byte input never lands
//! on an invalid boundary. Split-point preference inside each window: fenced
//! code-block delimiter, blank line, sentence-terminating period, raw cut —
//! a candidate only counts when it falls past 30% of the window.

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

const FENCE: [char; 3] = ['`', '`', '`'];
const BLANK_LINE: [char; 2] = ['\n', '\n'];

/// Splits `text` into ordered chunks of roughly `target_size` characters.
///
/// Deterministic and total: every finite input yields a finite chunk list,
/// chunks never overlap, and their concatenation reproduces the input's
/// content in order (modulo whitespace trimmed at chunk edges). Empty
/// candidates are dropped.
pub fn segment(text: &str, target_size: usize) -> Vec<String> {
    let target = target_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total {
        let end = start.saturating_add(target);
        if end >= total {
            // Remaining tail is shorter than a full window; emit it whole.
            push_trimmed(&mut chunks, &chars[start..]);
            break;
        }

        let window = &chars[start..end];
        let end = start + split_point(window, target);

        push_trimmed(&mut chunks, &chars[start..end]);

        // Guarantees forward progress even when the chosen end collapses
        // onto the window start.
        start = (start + 1).max(end);
    }

    chunks
}

/// Index (relative to the window start) at which to cut the current window.
fn split_point(window: &[char], target: usize) -> usize {
    let threshold = target as f32 * 0.3;

    if let Some(idx) = rfind_sequence(window, &FENCE) {
        if idx as f32 > threshold {
            return idx;
        }
    }

    if let Some(idx) = rfind_sequence(window, &BLANK_LINE) {
        if idx as f32 > threshold {
            return idx;
        }
    }

    if let Some(idx) = window.iter().rposition(|&c| c == '.') {
        if idx as f32 > threshold {
            // One character past the period, so the period stays in the chunk.
            return idx + 1;
        }
    }

    window.len()
}

fn rfind_sequence(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&idx| haystack[idx..idx + needle.len()] == *needle)
}

fn push_trimmed(chunks: &mut Vec<String>, span: &[char]) {
    let candidate: String = span.iter().collect();
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_owned());
    }
}
