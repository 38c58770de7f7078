//! Compiled regex tables shared by the pipeline layers.

use std::sync::LazyLock;

use regex::Regex;

/// Known credential prefixes and shapes. Each match is replaced wholesale.
pub(crate) static CREDENTIAL_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Stripe secret keys
        r"\bsk_(?:live|test)_[A-Za-z0-9]{8,}\b",
        r"\brk_(?:live|test)_[A-Za-z0-9]{8,}\b",
        // OpenAI-style keys
        r"\bsk-[A-Za-z0-9_-]{20,}\b",
        // AWS access key ids
        r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b",
        // GitHub tokens (classic and fine-grained)
        r"\bgh[pousr]_[A-Za-z0-9]{20,}\b",
        r"\bgithub_pat_[A-Za-z0-9_]{20,}\b",
        // Slack tokens
        r"\bxox[baprs]-[A-Za-z0-9-]{10,}",
        // Google API keys
        r"\bAIza[0-9A-Za-z_-]{35}\b",
        // JWTs: three base64url segments
        r"\beyJ[A-Za-z0-9_-]{8,}\.[A-Za-z0-9_-]{8,}\.[A-Za-z0-9_-]{8,}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Bearer tokens keep the scheme word, only the token is replaced.
pub(crate) static BEARER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(bearer)\s+([A-Za-z0-9._~+/=-]{16,})").unwrap());

/// PEM private key blocks, including the delimiters.
pub(crate) static PEM_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-----BEGIN [A-Z ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z ]*PRIVATE KEY-----")
        .unwrap()
});

/// Candidate high-entropy tokens; the pipeline applies an entropy check
/// before replacement, so common long words pass through.
pub(crate) static ENTROPY_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9+/_-]{32,}={0,2}\b").unwrap());

/// Credential label followed by a separator and a value. The captured
/// label and separator survive, the value does not.
pub(crate) static LABELED_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(password|passwd|pwd|secret|token|api[_-]?key|apikey|access[_-]?key|private[_-]?key|auth|credentials?|client[_-]?secret)\b(\s*[:=]\s*)("[^"]*"|'[^']*'|\S+)"#,
    )
    .unwrap()
});

/// Explicit redaction spans left by the caller.
pub(crate) static REDACTED_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<redacted>.*?</redacted>").unwrap());

/// Long base64 runs. Only replaced when the surrounding field also
/// mentions a credential-like keyword.
pub(crate) static BASE64_BLOB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9+/]{40,}={0,2}\b").unwrap());

/// Keywords that make a nearby base64 blob suspicious.
pub(crate) static CREDENTIAL_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(key|secret|token|password|passwd|credentials?|cert|auth)\b").unwrap()
});
