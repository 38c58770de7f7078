//! Layered redaction over a single text field.

use tracing::debug;

use crate::patterns;

/// Replacement marker written in place of anything scrubbed.
pub const REDACTED: &str = "[REDACTED]";

/// Minimum length before a bare token is considered for entropy analysis.
const ENTROPY_MIN_LEN: usize = 32;
/// Shannon entropy floor (bits per char) for the high-entropy layer.
const ENTROPY_FLOOR: f64 = 3.5;
/// A token needs this many digits before the entropy layer will touch it,
/// which keeps long identifiers and ordinary base64 text alive.
const ENTROPY_MIN_DIGITS: usize = 6;

/// Scrub one text field through all three layers. Pure and infallible;
/// the output for already-redacted input is unchanged.
///
/// Explicit `<redacted>` spans go first, so a label inside a span can
/// never swallow the closing tag before the span is replaced.
pub fn redact(text: &str) -> String {
    let after_spans = patterns::REDACTED_SPAN.replace_all(text, REDACTED).into_owned();
    let after_patterns = pattern_layer(&after_spans);
    let after_context = context_layer(&after_patterns);
    let result = base64_layer(&after_context);
    if result != text {
        debug!(original_len = text.len(), redacted_len = result.len(), "field redacted");
    }
    result
}

/// Scrub a batch of named fields, preserving names and order.
pub fn redact_fields(fields: Vec<(String, String)>) -> Vec<(String, String)> {
    fields
        .into_iter()
        .map(|(name, value)| {
            let clean = redact(&value);
            (name, clean)
        })
        .collect()
}

/// Layer 1: known credential shapes, bearer tokens, PEM blocks and
/// high-entropy tokens.
fn pattern_layer(text: &str) -> String {
    let mut out = patterns::PEM_BLOCK.replace_all(text, REDACTED).into_owned();
    for shape in patterns::CREDENTIAL_SHAPES.iter() {
        out = shape.replace_all(&out, REDACTED).into_owned();
    }
    out = patterns::BEARER
        .replace_all(&out, format!("$1 {REDACTED}"))
        .into_owned();
    entropy_pass(&out)
}

/// Layer 2: values that follow credential labels.
fn context_layer(text: &str) -> String {
    patterns::LABELED_VALUE
        .replace_all(text, format!("$1$2{REDACTED}"))
        .into_owned()
}

/// Layer 3, second half: base64 blobs in fields that also mention a
/// credential-like keyword.
fn base64_layer(text: &str) -> String {
    if patterns::CREDENTIAL_KEYWORD.is_match(text) {
        patterns::BASE64_BLOB.replace_all(text, REDACTED).into_owned()
    } else {
        text.to_string()
    }
}

/// Replace bare tokens that look machine-generated: long, digit-heavy
/// and high-entropy.
fn entropy_pass(text: &str) -> String {
    patterns::ENTROPY_CANDIDATE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let token = &caps[0];
            if looks_like_secret(token) {
                REDACTED.to_string()
            } else {
                token.to_string()
            }
        })
        .into_owned()
}

fn looks_like_secret(token: &str) -> bool {
    if token.len() < ENTROPY_MIN_LEN {
        return false;
    }
    let digits = token.chars().filter(|c| c.is_ascii_digit()).count();
    let has_alpha = token.chars().any(|c| c.is_ascii_alphabetic());
    digits >= ENTROPY_MIN_DIGITS && has_alpha && shannon_entropy(token) >= ENTROPY_FLOOR
}

fn shannon_entropy(token: &str) -> f64 {
    let mut counts = [0usize; 256];
    for b in token.bytes() {
        counts[b as usize] += 1;
    }
    let len = token.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}
