//! Data models shared across the pipeline.
//!
//! This module defines the values that flow between stages once headlines
//! have left the HTML document:
//! - [`Label`]: The binary mood assigned to a headline by the model
//! - [`Classification`]: A headline together with its label and the cleaned model response
//! - [`ReportPartition`]: The two ordered lists that feed the PDF report
//!
//! The HTML-bound types (candidates, signatures, pattern groups) live in
//! [`crate::scrapers`] because they borrow from the parsed document.

use std::fmt;

/// The mood of a headline as judged by the model.
///
/// This is a closed set: anything the model says that is not recognised as
/// depressing resolves to [`Label::Ok`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Nothing in the model response marked the headline as depressing.
    Ok,
    /// The model response contained the word "depressing".
    Depressing,
}

impl Label {
    /// Derive a label from a cleaned (trimmed, lowercased) model response.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// assert_eq!(Label::from_response("depressing news."), Label::Depressing);
    /// assert_eq!(Label::from_response("i think it's fine"), Label::Ok);
    /// ```
    pub fn from_response(cleaned: &str) -> Self {
        if cleaned.contains("depressing") {
            Label::Depressing
        } else {
            Label::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Ok => "ok",
            Label::Depressing => "depressing",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified headline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The headline text as extracted from the page.
    pub headline: String,
    /// The label derived from the model response.
    pub label: Label,
    /// The cleaned model response the label was derived from.
    pub response: String,
}

/// Headlines split by label, each list in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportPartition {
    /// Headlines labelled [`Label::Ok`].
    pub ok: Vec<String>,
    /// Headlines labelled [`Label::Depressing`].
    pub depressing: Vec<String>,
}

impl ReportPartition {
    /// Total number of headlines across both sections.
    pub fn len(&self) -> usize {
        self.ok.len() + self.depressing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
