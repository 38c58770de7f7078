//! Hybrid result merging: lexical and semantic result sets become one
//! ranking.
//!
//! Each set is min-max normalized to [0, 1] on its own (a constant or
//! single-element set normalizes to 1.0, since it carries no spread
//! information). A memory present in both sets takes the higher of its
//! two normalized scores plus a fixed agreement bonus; a memory in only
//! one set keeps that set's score. Ties break by recency.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Reward for appearing in both the lexical and the semantic set.
pub const AGREEMENT_BONUS: f64 = 0.15;

/// Merge two internally ranked `(id, raw_score)` sets into one ranking,
/// truncated to `limit`. `created_at` supplies the recency tie-break.
pub fn merge_ranked(
    lexical: &[(String, f64)],
    semantic: &[(String, f64)],
    created_at: &HashMap<String, DateTime<Utc>>,
    limit: usize,
) -> Vec<(String, f64)> {
    let lex = normalize(lexical);
    let sem = normalize(semantic);

    let mut combined: HashMap<&str, (Option<f64>, Option<f64>)> = HashMap::new();
    for (id, score) in &lex {
        combined.entry(id).or_default().0 = Some(*score);
    }
    for (id, score) in &sem {
        combined.entry(id).or_default().1 = Some(*score);
    }

    let mut ranked: Vec<(String, f64)> = combined
        .into_iter()
        .map(|(id, scores)| {
            let score = match scores {
                (Some(l), Some(s)) => l.max(s) + AGREEMENT_BONUS,
                (Some(l), None) => l,
                (None, Some(s)) => s,
                (None, None) => 0.0,
            };
            (id.to_string(), score)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ta = created_at.get(&a.0);
                let tb = created_at.get(&b.0);
                tb.cmp(&ta)
            })
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(limit);
    ranked
}

/// Min-max normalize raw scores to [0, 1] within the set.
fn normalize(scores: &[(String, f64)]) -> Vec<(String, f64)> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let max = scores
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    scores
        .iter()
        .map(|(id, s)| {
            let norm = if span > 0.0 { (s - min) / span } else { 1.0 };
            (id.clone(), norm)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ids(ranked: &[(String, f64)]) -> Vec<&str> {
        ranked.iter().map(|(id, _)| id.as_str()).collect()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn test_agreement_scores_at_least_either_set() {
        let lex = vec![("a".to_string(), 3.0), ("b".to_string(), 1.0)];
        let sem = vec![("a".to_string(), 0.9), ("c".to_string(), 0.2)];
        let times = HashMap::new();
        let merged = merge_ranked(&lex, &sem, &times, 10);

        let a = merged.iter().find(|(id, _)| id == "a").unwrap().1;
        // "a" tops both normalized sets (score 1.0 each), so merged is 1.15
        assert!((a - (1.0 + AGREEMENT_BONUS)).abs() < 1e-9);
        assert!(a >= 1.0);
        assert_eq!(ids(&merged)[0], "a");
    }

    #[test]
    fn test_single_element_set_normalizes_to_one() {
        let lex = vec![("only".to_string(), -7.3)];
        let merged = merge_ranked(&lex, &[], &HashMap::new(), 10);
        assert_eq!(merged, vec![("only".to_string(), 1.0)]);
    }

    #[test]
    fn test_constant_set_normalizes_to_one() {
        let lex = vec![("a".to_string(), 2.0), ("b".to_string(), 2.0)];
        let merged = merge_ranked(&lex, &[], &HashMap::new(), 10);
        assert!(merged.iter().all(|(_, s)| (*s - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_tie_breaks_by_recency() {
        let lex = vec![("old".to_string(), 2.0), ("new".to_string(), 2.0)];
        let mut times = HashMap::new();
        times.insert("old".to_string(), at(100));
        times.insert("new".to_string(), at(200));
        let merged = merge_ranked(&lex, &[], &times, 10);
        assert_eq!(ids(&merged), vec!["new", "old"]);
    }

    #[test]
    fn test_limit_truncates_after_merge() {
        let lex: Vec<_> = (0..5).map(|i| (format!("m{i}"), i as f64)).collect();
        let merged = merge_ranked(&lex, &[], &HashMap::new(), 2);
        assert_eq!(merged.len(), 2);
        assert_eq!(ids(&merged), vec!["m4", "m3"]);
    }

    #[test]
    fn test_one_sided_memory_keeps_its_set_score() {
        let lex = vec![("a".to_string(), 4.0), ("b".to_string(), 0.0)];
        let sem = vec![("c".to_string(), 0.5), ("d".to_string(), 0.1)];
        let merged = merge_ranked(&lex, &sem, &HashMap::new(), 10);
        let b = merged.iter().find(|(id, _)| id == "b").unwrap().1;
        assert_eq!(b, 0.0);
        let c = merged.iter().find(|(id, _)| id == "c").unwrap().1;
        assert!((c - 1.0).abs() < 1e-9);
    }
}
