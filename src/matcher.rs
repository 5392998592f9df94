//! Fuzzy ranking of indexed tests against a typed query.
//!
//! Similarity comes from a character diff (`similar`); the ordering on top of
//! it is fixed: exact title, then substring containment, then similarity.

use std::cmp::Ordering;

use similar::{ChangeTag, TextDiff};

use crate::state::{MatchResult, TestRecord};

pub const DEFAULT_THRESHOLD: f64 = 0.4;

struct Scored {
    result: MatchResult,
    lower: String,
    contains: bool,
    ratio: f32,
}

pub fn rank(records: &[TestRecord], query: &str, threshold: f64) -> Vec<MatchResult> {
    let query = query.trim().to_lowercase();
    if query.is_empty() || records.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<Scored> = records
        .iter()
        .filter_map(|record| score(record, &query, threshold))
        .collect();

    scored.sort_by(compare);
    mark_prefix_collisions(&mut scored);

    scored.into_iter().map(|s| s.result).collect()
}

fn score(record: &TestRecord, query: &str, threshold: f64) -> Option<Scored> {
    let lower = record.description.to_lowercase();
    let exact = lower == query;
    let contains = lower.contains(query);

    let diff = TextDiff::from_chars(query, lower.as_str());
    let matched = diff
        .iter_all_changes()
        .filter(|c| c.tag() == ChangeTag::Equal)
        .count();
    let coverage = matched as f64 / query.chars().count().max(1) as f64;
    let fuzzy = 1.0 - coverage;

    if !exact && !contains && fuzzy > threshold {
        return None;
    }

    Some(Scored {
        ratio: diff.ratio(),
        result: MatchResult {
            record: record.clone(),
            score: fuzzy,
            is_exact_match: exact,
            has_prefix_collision: false,
        },
        lower,
        contains,
    })
}

fn compare(a: &Scored, b: &Scored) -> Ordering {
    b.result
        .is_exact_match
        .cmp(&a.result.is_exact_match)
        .then(b.contains.cmp(&a.contains))
        .then(a.result.score.total_cmp(&b.result.score))
        .then(b.ratio.total_cmp(&a.ratio))
        .then_with(|| a.result.record.file.cmp(&b.result.record.file))
        .then(a.result.record.line_number.cmp(&b.result.record.line_number))
}

fn mark_prefix_collisions(scored: &mut [Scored]) {
    let flags: Vec<bool> = scored
        .iter()
        .enumerate()
        .map(|(i, s)| {
            s.result.is_exact_match
                && scored
                    .iter()
                    .enumerate()
                    .any(|(j, other)| j != i && other.lower.starts_with(&s.lower))
        })
        .collect();

    for (s, flag) in scored.iter_mut().zip(flags) {
        s.result.has_prefix_collision = flag;
    }
}

/// The single unambiguous exact match, if there is one.
pub fn direct_match(matches: &[MatchResult]) -> Option<&MatchResult> {
    let mut exact = matches.iter().filter(|m| m.is_exact_match);
    let first = exact.next()?;
    if exact.next().is_some() || first.has_prefix_collision {
        return None;
    }
    Some(first)
}

/// Narrowing predicate handed to the choice UI.
pub fn title_filter(title: &str, input: &str) -> bool {
    title.to_lowercase().contains(&input.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ModuleFormat, QuoteStyle};
    use std::path::PathBuf;

    fn rec(desc: &str, line: usize) -> TestRecord {
        TestRecord {
            file: PathBuf::from("a.test.js"),
            description: desc.to_string(),
            quote_style: QuoteStyle::Single,
            line_number: line,
            module_format: ModuleFormat::Script,
        }
    }

    fn titles(matches: &[MatchResult]) -> Vec<&str> {
        matches.iter().map(|m| m.record.description.as_str()).collect()
    }

    #[test]
    fn empty_inputs_give_nothing() {
        assert!(rank(&[], "x", 1.0).is_empty());
        assert!(rank(&[rec("a", 1)], "   ", 1.0).is_empty());
    }

    #[test]
    fn containment_beats_plain_similarity() {
        let records = vec![rec("logout works", 1), rec("login works", 2), rec("user login", 3)];
        let got = rank(&records, "login", 1.0);
        let order = titles(&got);

        let logout = order.iter().position(|t| *t == "logout works").unwrap();
        assert!(order.iter().position(|t| *t == "user login").unwrap() < logout);
        assert!(order.iter().position(|t| *t == "login works").unwrap() < logout);
    }

    #[test]
    fn exact_title_ranks_first() {
        let records = vec![rec("user login works", 1), rec("login works extra", 2), rec("Login Works", 3)];
        let got = rank(&records, "login works", DEFAULT_THRESHOLD);
        assert_eq!(got[0].record.description, "Login Works");
        assert!(got[0].is_exact_match);
        assert!(!got[1].is_exact_match);
    }

    #[test]
    fn unrelated_titles_are_dropped() {
        let records = vec![rec("parses numbers", 1), rec("renders html", 2)];
        assert!(rank(&records, "zzzzzz", DEFAULT_THRESHOLD).is_empty());
    }

    #[test]
    fn small_typos_still_match() {
        let records = vec![rec("test two", 1), rec("something else", 2)];
        let got = rank(&records, "tst two", DEFAULT_THRESHOLD);
        assert_eq!(titles(&got)[0], "test two");
    }

    #[test]
    fn direct_match_requires_no_longer_sibling() {
        let records = vec![rec("login", 1), rec("login twice", 2)];
        let got = rank(&records, "login", DEFAULT_THRESHOLD);
        assert!(got[0].is_exact_match);
        assert!(got[0].has_prefix_collision);
        assert!(direct_match(&got).is_none());

        let got = rank(&[rec("login", 1), rec("logout", 2)], "login", DEFAULT_THRESHOLD);
        assert_eq!(direct_match(&got).unwrap().record.line_number, 1);
    }

    #[test]
    fn two_exact_matches_are_ambiguous() {
        let mut other = rec("same title", 4);
        other.file = PathBuf::from("b.test.js");
        let got = rank(&[rec("same title", 1), other], "same title", DEFAULT_THRESHOLD);
        assert_eq!(got.len(), 2);
        assert!(direct_match(&got).is_none());
    }

    #[test]
    fn ties_fall_back_to_file_then_line() {
        let got = rank(&[rec("alpha", 9), rec("alpha", 2)], "alp", DEFAULT_THRESHOLD);
        assert_eq!(got[0].record.line_number, 2);
    }

    #[test]
    fn title_filter_is_case_insensitive_substring() {
        assert!(title_filter("Login works  a.test.js:3", "LOGIN"));
        assert!(!title_filter("logout", "login"));
    }
}
