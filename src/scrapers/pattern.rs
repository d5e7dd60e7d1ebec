//! Pattern selection: pick the structural signature most candidates share.
//!
//! A real front page repeats the same markup for every story, so the
//! signature with the most candidates is taken to be the headline pattern.

use super::candidates::{Candidate, Heuristic, Signature};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Candidates sharing one [`Signature`], in order of first appearance.
#[derive(Debug, Clone)]
pub struct PatternGroup<'a> {
    pub signature: Signature,
    pub members: Vec<Candidate<'a>>,
}

impl PatternGroup<'_> {
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.members.len()
    }
}

/// Partition candidates by signature, keeping group and member order.
///
/// Every candidate ends up in exactly one group.
pub fn group_by_signature(candidates: Vec<Candidate<'_>>) -> Vec<PatternGroup<'_>> {
    let mut groups: Vec<PatternGroup<'_>> = Vec::new();
    let mut index: HashMap<Signature, usize> = HashMap::new();

    for candidate in candidates {
        match index.get(&candidate.signature) {
            Some(&i) => groups[i].members.push(candidate),
            None => {
                index.insert(candidate.signature.clone(), groups.len());
                groups.push(PatternGroup {
                    signature: candidate.signature.clone(),
                    members: vec![candidate],
                });
            }
        }
    }
    groups
}

/// Select the dominant pattern among `candidates`.
///
/// # Returns
///
/// The largest group, with ties going to the signature seen first, or `None`
/// when there are no candidates at all.
#[instrument(level = "debug", skip_all, fields(candidates = candidates.len()))]
pub fn select_pattern(candidates: Vec<Candidate<'_>>) -> Option<PatternGroup<'_>> {
    let mut winner: Option<PatternGroup<'_>> = None;
    for group in group_by_signature(candidates) {
        if winner.as_ref().is_none_or(|best| group.len() > best.len()) {
            winner = Some(group);
        }
    }

    if let Some(group) = &winner {
        let from_headings = group
            .members
            .iter()
            .filter(|c| c.heuristic == Heuristic::Heading)
            .count();
        info!(
            signature = %group.signature,
            matches = group.len(),
            from_headings,
            sample = %group.members[0].text,
            "Identified likely headline pattern"
        );
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::candidates::scan_candidates;
    use scraper::Html;

    fn headline(n: usize) -> String {
        format!("Headline number {n} about something notable")
    }

    #[test]
    fn test_three_h2_nodes_win() {
        let html = format!(
            "<body><h2>{}</h2><h2>{}</h2><h2>{}</h2></body>",
            headline(1),
            headline(2),
            headline(3)
        );
        let document = Html::parse_document(&html);
        let group = select_pattern(scan_candidates(&document)).expect("pattern");

        assert_eq!(group.signature.tag, "h2");
        assert!(group.signature.classes.is_empty());
        assert_eq!(group.len(), 3);
    }

    #[test]
    fn test_empty_candidates_yield_none() {
        let document = Html::parse_document("<body><p>nothing here</p></body>");
        assert!(select_pattern(scan_candidates(&document)).is_none());
    }

    #[test]
    fn test_largest_group_wins() {
        let html = format!(
            r#"<body>
                <h2>{}</h2>
                <a href="/a" class="story">{}</a>
                <a href="/b" class="story">{}</a>
            </body>"#,
            headline(1),
            headline(2),
            headline(3)
        );
        let document = Html::parse_document(&html);
        let group = select_pattern(scan_candidates(&document)).expect("pattern");

        assert_eq!(group.signature.to_string(), "a:[story]");
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn test_tie_goes_to_first_signature() {
        let html = format!(
            r#"<body>
                <h3 class="x">{}</h3>
                <h2>{}</h2>
                <h3 class="x">{}</h3>
                <h2>{}</h2>
            </body>"#,
            headline(1),
            headline(2),
            headline(3),
            headline(4)
        );
        let document = Html::parse_document(&html);
        let group = select_pattern(scan_candidates(&document)).expect("pattern");

        // Heading pass runs in document order, so h3.x is seen first.
        assert_eq!(group.signature.to_string(), "h3:[x]");
        let texts: Vec<_> = group.members.iter().map(|c| c.text.clone()).collect();
        assert_eq!(texts, vec![headline(1), headline(3)]);
    }

    #[test]
    fn test_groups_partition_candidates() {
        let html = format!(
            r#"<body>
                <h2 class="headline">{}</h2>
                <h2>{}</h2>
                <a href="/c">{}</a>
                <span class="promo">{}</span>
            </body>"#,
            headline(1),
            headline(2),
            headline(3),
            headline(4)
        );
        let document = Html::parse_document(&html);
        let candidates = scan_candidates(&document);
        let total = candidates.len();
        let groups = group_by_signature(candidates);

        assert_eq!(groups.iter().map(PatternGroup::len).sum::<usize>(), total);
        let mut signatures: Vec<_> = groups.iter().map(|g| g.signature.to_string()).collect();
        let before = signatures.len();
        signatures.sort();
        signatures.dedup();
        assert_eq!(signatures.len(), before);
    }

    #[test]
    fn test_winner_is_never_smaller_than_other_groups() {
        let html = format!(
            r#"<body>
                <h1>{}</h1>
                <a class="l">{}</a><a class="l">{}</a>
                <p class="title">{}</p><p class="title">{}</p><p class="title">{}</p>
            </body>"#,
            headline(1),
            headline(2),
            headline(3),
            headline(4),
            headline(5),
            headline(6)
        );
        let document = Html::parse_document(&html);
        let sizes: Vec<_> = group_by_signature(scan_candidates(&document))
            .iter()
            .map(PatternGroup::len)
            .collect();
        let winner = select_pattern(scan_candidates(&document)).expect("pattern");

        assert!(sizes.iter().all(|&s| winner.len() >= s));
        assert_eq!(winner.signature.to_string(), "p:[title]");
    }
}
