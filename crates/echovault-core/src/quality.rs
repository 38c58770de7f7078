//! Save-quality feedback: non-fatal warnings and the details template.

use echovault_types::Category;

/// Details below this length draw a brevity warning.
const BRIEF_DETAILS_LEN: usize = 120;

/// Section skeleton offered by `save --details-template`.
pub const DETAILS_TEMPLATE: &str = "## Context\n\n## Options considered\n\n## Decision\n\n## Tradeoffs\n\n## Follow-up\n";

/// Sections a decision's details should cover.
const RECOMMENDED_SECTIONS: [&str; 5] = [
    "Context",
    "Options considered",
    "Decision",
    "Tradeoffs",
    "Follow-up",
];

/// Warnings for a save, returned alongside the receipt and printed by
/// the CLI. Never blocks the save.
pub fn save_warnings(category: Category, details: Option<&str>) -> Vec<String> {
    let mut warnings = Vec::new();
    match details {
        None => {
            if matches!(category, Category::Decision | Category::Bug) {
                warnings.push(format!(
                    "A {category} memory should include details; re-save with --details or --details-template."
                ));
            }
        }
        Some(details) => {
            let len = details.chars().count();
            if len < BRIEF_DETAILS_LEN {
                warnings.push(format!(
                    "Details are brief ({len} chars); consider capturing more context."
                ));
            }
            if category == Category::Decision {
                let lower = details.to_lowercase();
                let missing: Vec<&str> = RECOMMENDED_SECTIONS
                    .iter()
                    .filter(|s| !lower.contains(&s.to_lowercase()))
                    .copied()
                    .collect();
                if !missing.is_empty() {
                    warnings.push(format!(
                        "Decision details are missing recommended sections: {}.",
                        missing.join(", ")
                    ));
                }
            }
        }
    }
    warnings
}
