//! Session file entry format: writer and its exact inverse.
//!
//! An entry is bracketed by `<!-- memory:begin <id> -->` and
//! `<!-- memory:end <id> -->` lines. Between them sits a Markdown block
//! for human readers and, last before the end marker, a
//! `<!-- memory:data <json> -->` line carrying the canonical record.
//! Only the data line is parsed back, so free-text fields can contain
//! anything, including text that looks like the markers themselves.
//!
//! Two escapes keep user text from forging structure. Inside the JSON
//! payload the comment terminator `-->` is rewritten as the equivalent
//! string escape `--\u003e`, which the JSON parser reverses for free.
//! In the human block any line that starts with `<!-- memory:` gets a
//! leading backslash, so it can never be mistaken for a real marker.

use std::ops::Range;

use echovault_types::Memory;

use crate::error::VaultError;

const BEGIN_PREFIX: &str = "<!-- memory:begin ";
const DATA_PREFIX: &str = "<!-- memory:data ";
const END_PREFIX: &str = "<!-- memory:end ";
const MARKER_SUFFIX: &str = " -->";

/// One parsed entry plus the exact byte range it occupies in the file,
/// including the trailing blank line the writer emits after it.
#[derive(Debug)]
pub struct ParsedEntry {
    pub memory: Memory,
    pub range: Range<usize>,
}

/// Render one memory as a complete session file entry, ending with a
/// newline. The caller adds the blank separator line.
pub fn render_entry(memory: &Memory) -> Result<String, VaultError> {
    let json = serde_json::to_string(memory)?.replace("-->", "--\\u003e");
    let mut out = String::new();
    out.push_str(BEGIN_PREFIX);
    out.push_str(&memory.id);
    out.push_str(MARKER_SUFFIX);
    out.push('\n');

    let mut human = String::new();
    human.push_str(&format!("## {}\n\n", memory.title));
    human.push_str(&format!("- **Category**: {}\n", memory.category));
    human.push_str(&format!("- **Project**: {}\n", memory.project));
    if !memory.tags.is_empty() {
        human.push_str(&format!("- **Tags**: {}\n", memory.tags.join(", ")));
    }
    if !memory.related_files.is_empty() {
        human.push_str(&format!(
            "- **Related files**: {}\n",
            memory.related_files.join(", ")
        ));
    }
    human.push_str(&format!("- **Source**: {}\n", memory.source));
    human.push_str(&format!("- **Saved**: {}\n\n", memory.created_at.to_rfc3339()));

    human.push_str(&format!("**What**: {}\n", memory.what));
    if !memory.why.is_empty() {
        human.push_str(&format!("**Why**: {}\n", memory.why));
    }
    if !memory.impact.is_empty() {
        human.push_str(&format!("**Impact**: {}\n", memory.impact));
    }
    if let Some(details) = &memory.details {
        human.push_str(&format!("\n### Details\n\n{details}\n"));
    }
    out.push_str(&defang(&human));

    out.push('\n');
    out.push_str(DATA_PREFIX);
    out.push_str(&json);
    out.push_str(MARKER_SUFFIX);
    out.push('\n');
    out.push_str(END_PREFIX);
    out.push_str(&memory.id);
    out.push_str(MARKER_SUFFIX);
    out.push('\n');
    Ok(out)
}

/// Parse a whole session file back into entries, in file order.
///
/// Marker lines inside an entry's human block are inert: a begin while
/// one is open is ignored, an end only closes the entry whose id it
/// names, and of several data lines the last before the end wins (the
/// writer always emits the real one last).
pub fn parse_entries(content: &str, file: &str) -> Result<Vec<ParsedEntry>, VaultError> {
    struct Open {
        id: String,
        start: usize,
        data: Option<String>,
    }

    let parse_err = |reason: String| VaultError::Parse {
        file: file.to_string(),
        reason,
    };

    let mut entries = Vec::new();
    let mut open: Option<Open> = None;
    let mut offset = 0usize;

    for raw_line in content.split_inclusive('\n') {
        let line = raw_line.trim_end_matches(['\n', '\r']);
        if let Some(id) = marker_id(line, BEGIN_PREFIX) {
            if open.is_none() {
                open = Some(Open {
                    id: id.to_string(),
                    start: offset,
                    data: None,
                });
            }
        } else if let Some(inner) = data_payload(line) {
            if let Some(o) = open.as_mut() {
                o.data = Some(inner.to_string());
            }
        } else if let Some(id) = marker_id(line, END_PREFIX) {
            if open.as_ref().is_some_and(|o| o.id == id) {
                let o = open.take().ok_or_else(|| parse_err("entry state lost".into()))?;
                let data = o
                    .data
                    .ok_or_else(|| parse_err(format!("entry {} has no data line", o.id)))?;
                let memory: Memory = serde_json::from_str(&data)
                    .map_err(|e| parse_err(format!("entry {}: {e}", o.id)))?;
                if memory.id != o.id {
                    return Err(parse_err(format!(
                        "entry markers say {} but payload says {}",
                        o.id, memory.id
                    )));
                }
                let mut end = offset + raw_line.len();
                // Swallow the writer's blank separator line
                if content[end..].starts_with("\r\n") {
                    end += 2;
                } else if content[end..].starts_with('\n') {
                    end += 1;
                }
                entries.push(ParsedEntry {
                    memory,
                    range: o.start..end,
                });
            }
        }
        offset += raw_line.len();
    }

    if let Some(o) = open {
        return Err(parse_err(format!("entry {} is not terminated", o.id)));
    }
    Ok(entries)
}

/// Markers are only recognized at column zero, so a leading backslash
/// (which Markdown renders away) keeps user text that happens to look
/// like a marker from opening or closing an entry. In particular a
/// field may contain the entry's own end marker once the id is known.
fn defang(human: &str) -> String {
    human
        .split_inclusive('\n')
        .map(|line| {
            if line.starts_with("<!-- memory:") {
                format!("\\{line}")
            } else {
                line.to_string()
            }
        })
        .collect()
}

fn marker_id<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let id = line.strip_prefix(prefix)?.strip_suffix(MARKER_SUFFIX)?;
    (!id.is_empty() && !id.contains(char::is_whitespace)).then_some(id)
}

fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX)?.strip_suffix(MARKER_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use echovault_types::{Category, Memory, MemoryDraft};

    fn sample(title: &str) -> Memory {
        Memory::from_draft(
            MemoryDraft::new(title, "what happened")
                .with_category(Category::Decision)
                .with_tags(vec!["auth".into(), "jwt".into()]),
            "p1",
        )
    }

    #[test]
    fn test_round_trip_single_entry() {
        let memory = sample("Switched to JWT auth");
        let rendered = render_entry(&memory).unwrap();
        let parsed = parse_entries(&rendered, "t.md").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].memory, memory);
    }

    #[test]
    fn test_round_trip_with_marker_like_content() {
        let mut memory = sample("weird fields");
        memory.what = "closing comment --> and <!-- memory:end fake --> inline".into();
        memory.details = Some("<!-- memory:data {\"id\":\"x\"} -->\nmulti\nline".into());
        let rendered = render_entry(&memory).unwrap();
        // Escaping keeps the data line inside a single HTML comment
        assert!(!rendered_data_line(&rendered).contains("-->"));
        let parsed = parse_entries(&rendered, "t.md").unwrap();
        assert_eq!(parsed[0].memory, memory);
    }

    #[test]
    fn test_round_trip_with_own_end_marker_in_fields() {
        // The id is known after the first save and a re-save appends
        // under the same id, so a field can quote the entry's real
        // markers. They must stay inert.
        let mut memory = sample("self-referential");
        let end = format!("<!-- memory:end {} -->", memory.id);
        let begin = format!("<!-- memory:begin {} -->", memory.id);
        memory.what = format!("quoting my own markers:\n{end}\n{begin}");
        memory.details = Some(format!("file contained:\n{end}\ntrailing prose"));
        let rendered = render_entry(&memory).unwrap();
        let parsed = parse_entries(&rendered, "t.md").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].memory, memory);
        assert_eq!(parsed[0].range, 0..rendered.len());
    }

    fn rendered_data_line(rendered: &str) -> String {
        let line = rendered
            .lines()
            .rev()
            .find(|l| l.starts_with(DATA_PREFIX))
            .unwrap();
        line.strip_prefix(DATA_PREFIX)
            .unwrap()
            .strip_suffix(MARKER_SUFFIX)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_parse_multiple_entries_in_order() {
        let a = sample("first");
        let b = sample("second");
        let mut file = String::from("# Memories\n\n");
        file.push_str(&render_entry(&a).unwrap());
        file.push('\n');
        file.push_str(&render_entry(&b).unwrap());
        file.push('\n');
        let parsed = parse_entries(&file, "t.md").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].memory.title, "first");
        assert_eq!(parsed[1].memory.title, "second");
    }

    #[test]
    fn test_range_removal_leaves_other_bytes_identical() {
        let a = sample("keep me");
        let b = sample("remove me");
        let header = "# Memories\n\n";
        let a_text = render_entry(&a).unwrap();
        let b_text = render_entry(&b).unwrap();
        let file = format!("{header}{a_text}\n{b_text}\n");

        let parsed = parse_entries(&file, "t.md").unwrap();
        let range = parsed[1].range.clone();
        let mut rewritten = String::new();
        rewritten.push_str(&file[..range.start]);
        rewritten.push_str(&file[range.end..]);
        assert_eq!(rewritten, format!("{header}{a_text}\n"));
    }

    #[test]
    fn test_unterminated_entry_is_an_error() {
        let memory = sample("broken");
        let rendered = render_entry(&memory).unwrap();
        let truncated = rendered.lines().take(3).collect::<Vec<_>>().join("\n");
        assert!(parse_entries(&truncated, "t.md").is_err());
    }

    #[test]
    fn test_missing_data_line_is_an_error() {
        let text = "<!-- memory:begin abc -->\nprose\n<!-- memory:end abc -->\n";
        let err = parse_entries(text, "t.md").unwrap_err();
        assert!(err.to_string().contains("no data line"));
    }
}
