//! Splitting classified headlines into the two report sections.

use crate::models::{Label, ReportPartition};

/// Sort `(headline, label)` pairs into ok and depressing lists.
///
/// Each headline lands in exactly one list and keeps its position relative
/// to the other headlines with the same label.
pub fn partition<I>(classified: I) -> ReportPartition
where
    I: IntoIterator<Item = (String, Label)>,
{
    let mut report = ReportPartition::default();
    for (headline, label) in classified {
        match label {
            Label::Ok => report.ok.push(headline),
            Label::Depressing => report.depressing.push(headline),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_keeps_relative_order() {
        let headlines = ["one", "two", "three", "four", "five"];
        let labels = [
            Label::Ok,
            Label::Depressing,
            Label::Ok,
            Label::Ok,
            Label::Depressing,
        ];
        let report = partition(
            headlines
                .iter()
                .map(|h| h.to_string())
                .zip(labels.iter().copied()),
        );

        assert_eq!(report.ok, vec!["one", "three", "four"]);
        assert_eq!(report.depressing, vec!["two", "five"]);
    }

    #[test]
    fn test_partition_is_complete() {
        let input: Vec<(String, Label)> = (0..40)
            .map(|i| {
                let label = if i % 3 == 0 { Label::Depressing } else { Label::Ok };
                (format!("headline {i}"), label)
            })
            .collect();
        let report = partition(input.clone());

        assert_eq!(report.len(), input.len());
        for (headline, label) in &input {
            let (home, other) = match label {
                Label::Ok => (&report.ok, &report.depressing),
                Label::Depressing => (&report.depressing, &report.ok),
            };
            assert_eq!(home.iter().filter(|h| *h == headline).count(), 1);
            assert!(!other.contains(headline));
        }
    }

    #[test]
    fn test_partition_empty() {
        let report = partition(Vec::new());
        assert!(report.ok.is_empty());
        assert!(report.depressing.is_empty());
    }
}
