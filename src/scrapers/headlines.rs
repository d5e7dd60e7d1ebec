//! Headline extraction from a selected pattern.
//!
//! Once a dominant [`PatternGroup`] is known, the whole document is queried
//! again for elements carrying that signature, since the heuristic passes
//! may have missed siblings that share the markup. Fallbacks, in order:
//!
//! 1. Re-query by signature (tag plus any class token, or tag alone with the
//!    length window when the signature has no classes)
//! 2. The winning group's own candidates, if the re-query found nothing
//! 3. A bare `h1, h2, h3` scan, if there was no pattern at all
//!
//! The result is deduplicated on exact text and cut to the requested size.

use super::candidates::{
    HEADING_SELECTOR, Signature, element_text, scan_candidates, selector, within_length_window,
};
use super::pattern::{PatternGroup, select_pattern};
use itertools::Itertools;
use scraper::{ElementRef, Html};
use tracing::{debug, info, instrument, warn};

/// Default number of headlines kept per run.
pub const DEFAULT_MAX_HEADLINES: usize = 15;

fn has_any_class_token(element: &ElementRef<'_>, signature: &Signature) -> bool {
    element.value().attr("class").is_some_and(|class| {
        signature
            .classes
            .iter()
            .any(|token| class.contains(token.as_str()))
    })
}

/// Texts of every element in `document` matching `signature`.
fn requery(document: &Html, signature: &Signature) -> Vec<String> {
    let all = selector("*");
    let same_tag = document
        .select(&all)
        .filter(|element| element.value().name() == signature.tag);

    if signature.classes.is_empty() {
        same_tag
            .map(|element| element_text(&element))
            .filter(|text| within_length_window(text))
            .collect()
    } else {
        same_tag
            .filter(|element| has_any_class_token(element, signature))
            .map(|element| element_text(&element))
            .collect()
    }
}

fn heading_fallback(document: &Html) -> Vec<String> {
    document
        .select(&selector(HEADING_SELECTOR))
        .map(|element| element_text(&element))
        .filter(|text| within_length_window(text))
        .collect()
}

/// Extract up to `max` unique headlines from `document`.
///
/// # Arguments
///
/// * `document` - The parsed front page
/// * `pattern` - The dominant pattern, or `None` when no candidates were found
/// * `max` - Maximum number of headlines to return
///
/// # Returns
///
/// Distinct, non-empty headline texts in document order. An empty list is
/// logged as a warning but is not an error.
#[instrument(level = "debug", skip_all, fields(max))]
pub fn extract_headlines(
    document: &Html,
    pattern: Option<&PatternGroup<'_>>,
    max: usize,
) -> Vec<String> {
    let texts = match pattern {
        Some(group) => {
            let found = requery(document, &group.signature);
            if found.is_empty() {
                debug!(signature = %group.signature, "Re-query matched nothing; using pattern candidates");
                group
                    .members
                    .iter()
                    .map(|c| element_text(&c.element))
                    .collect()
            } else {
                debug!(signature = %group.signature, matches = found.len(), "Re-queried document by pattern");
                found
            }
        }
        None => {
            debug!("No pattern found; falling back to heading scan");
            heading_fallback(document)
        }
    };

    let headlines: Vec<String> = texts
        .into_iter()
        .filter(|text| !text.is_empty())
        .unique()
        .take(max)
        .collect();

    if headlines.is_empty() {
        warn!("No headlines found. The website structure may be significantly different.");
    }
    headlines
}

/// Parse `html` and run scan, selection and extraction over it.
#[instrument(level = "info", skip_all, fields(bytes = html.len(), max))]
pub fn analyze_document(html: &str, max: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let candidates = scan_candidates(&document);
    let pattern = select_pattern(candidates);
    let headlines = extract_headlines(&document, pattern.as_ref(), max);
    info!(count = headlines.len(), "Extracted headlines");
    headlines
}
