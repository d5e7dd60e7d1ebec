//! Candidate scanning: find every node that could plausibly be a headline.
//!
//! Front pages are unknown and unversioned, so no fixed selector is used.
//! Instead three independent heuristics each contribute [`Candidate`]s to one
//! ordered list:
//!
//! | Pass | Selects | Extra filter |
//! |------|---------|--------------|
//! | [`Heuristic::Heading`] | `h1`, `h2`, `h3` | none |
//! | [`Heuristic::Anchor`] | `a` | navigation terms rejected |
//! | [`Heuristic::ClassHint`] | any element with a class attribute | class mentions headline/title/heading/promo |
//!
//! Every pass keeps only elements whose trimmed text is strictly between
//! [`MIN_HEADLINE_CHARS`] and [`MAX_HEADLINE_CHARS`] characters long. The same
//! element may be reported by more than one pass.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use tracing::{debug, instrument};

/// Texts must be longer than this many characters.
pub const MIN_HEADLINE_CHARS: usize = 20;
/// Texts must be shorter than this many characters.
pub const MAX_HEADLINE_CHARS: usize = 150;

/// Menu and chrome link texts that are never headlines. Case-sensitive.
pub const NAVIGATION_TERMS: [&str; 9] = [
    "BBC", "Home", "News", "Sport", "Weather", "iPlayer", "Sounds", "Account", "Search",
];

pub(crate) const HEADING_SELECTOR: &str = "h1, h2, h3";

static CLASS_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)headline|title|heading|promo").expect("class hint regex"));

/// Which heuristic produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    Heading,
    Anchor,
    ClassHint,
}

/// Structural signature of an element: its tag name and class tokens.
///
/// Class tokens are read straight from the element's `class` attribute in
/// document order with repeats removed. Two signatures are equal only when
/// both the tag and the full token list are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub tag: String,
    pub classes: Vec<String>,
}

impl Signature {
    /// Build the signature of a live element.
    pub fn of(element: &ElementRef<'_>) -> Self {
        let mut classes: Vec<String> = Vec::new();
        if let Some(attr) = element.value().attr("class") {
            for token in attr.split_whitespace() {
                if !classes.iter().any(|c| c == token) {
                    classes.push(token.to_string());
                }
            }
        }
        Self {
            tag: element.value().name().to_string(),
            classes,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{}]", self.tag, self.classes.join(", "))
    }
}

/// A node provisionally considered a headline.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// The element inside the parsed document.
    pub element: ElementRef<'a>,
    /// Trimmed text content of the element.
    pub text: String,
    /// The pass that found it.
    pub heuristic: Heuristic,
    pub signature: Signature,
}

impl<'a> Candidate<'a> {
    fn new(element: ElementRef<'a>, text: String, heuristic: Heuristic) -> Self {
        Self {
            signature: Signature::of(&element),
            element,
            text,
            heuristic,
        }
    }
}

/// Elements whose text content is code, not prose.
const NON_PROSE_TAGS: [&str; 2] = ["script", "style"];

/// Concatenated, trimmed text of an element and all its descendants,
/// leaving out anything inside `script` or `style`.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element
        .descendants()
        .filter(|node| {
            !node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|ancestor| NON_PROSE_TAGS.contains(&ancestor.value().name()))
        })
        .filter_map(|node| node.value().as_text().map(|text| &**text))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Whether `text` has a plausible headline length.
pub(crate) fn within_length_window(text: &str) -> bool {
    let n = text.chars().count();
    n > MIN_HEADLINE_CHARS && n < MAX_HEADLINE_CHARS
}

fn is_navigation(text: &str) -> bool {
    NAVIGATION_TERMS.iter().any(|term| text.contains(term))
}

pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

/// Run all three heuristic passes over `document`.
///
/// # Returns
///
/// Candidates in pass order (headings, anchors, class hints), each pass in
/// document order. An empty list is a valid result.
#[instrument(level = "debug", skip_all)]
pub fn scan_candidates(document: &Html) -> Vec<Candidate<'_>> {
    let mut candidates = Vec::new();

    for element in document.select(&selector(HEADING_SELECTOR)) {
        let text = element_text(&element);
        if within_length_window(&text) {
            candidates.push(Candidate::new(element, text, Heuristic::Heading));
        }
    }
    let headings = candidates.len();

    for element in document.select(&selector("a")) {
        let text = element_text(&element);
        if within_length_window(&text) && !is_navigation(&text) {
            candidates.push(Candidate::new(element, text, Heuristic::Anchor));
        }
    }
    let anchors = candidates.len() - headings;

    for element in document.select(&selector("[class]")) {
        let hinted = element
            .value()
            .attr("class")
            .is_some_and(|class| CLASS_HINT.is_match(class));
        if !hinted {
            continue;
        }
        let text = element_text(&element);
        if within_length_window(&text) {
            candidates.push(Candidate::new(element, text, Heuristic::ClassHint));
        }
    }
    let class_hints = candidates.len() - headings - anchors;

    debug!(
        headings,
        anchors,
        class_hints,
        total = candidates.len(),
        "Scanned headline candidates"
    );
    candidates
}
