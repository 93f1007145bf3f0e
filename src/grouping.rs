use std::collections::{BTreeMap, BTreeSet};

use crate::models::{FeedbackRecord, GroupKey, LobSelection, ReportGroup};

/// The lines of business a run covers and the report units inside them.
#[derive(Debug, Clone)]
pub struct GroupPlan<'a> {
    pub lobs: Vec<String>,
    pub groups: Vec<ReportGroup<'a>>,
}

impl GroupPlan<'_> {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// A single selection is taken as given; `All` expands to every distinct
/// non-empty line of business in the data, sorted.
pub fn select_lobs(records: &[FeedbackRecord], selection: &LobSelection) -> Vec<String> {
    match selection {
        LobSelection::Single(lob) => vec![lob.to_uppercase()],
        LobSelection::All => records
            .iter()
            .map(|record| record.line_of_business.as_str())
            .filter(|lob| !lob.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

/// Partitions the records of each selected line of business by
/// (course, facilitator, session date, line of business). Groups come out in
/// LOB order, then key order; records keep their input order.
pub fn build_groups<'a>(records: &'a [FeedbackRecord], selection: &LobSelection) -> GroupPlan<'a> {
    let lobs = select_lobs(records, selection);
    let mut groups = Vec::new();

    for lob in &lobs {
        let mut partition: BTreeMap<GroupKey, Vec<&'a FeedbackRecord>> = BTreeMap::new();
        for record in records.iter().filter(|record| &record.line_of_business == lob) {
            let key = GroupKey {
                course: record.course.clone(),
                facilitator: record.facilitator.clone(),
                session_date: record.session_date.clone(),
                line_of_business: record.line_of_business.clone(),
            };
            partition.entry(key).or_default().push(record);
        }

        groups.extend(
            partition
                .into_iter()
                .map(|(key, records)| ReportGroup { key, records }),
        );
    }

    GroupPlan { lobs, groups }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(course: &str, facilitator: &str, date: &str, lob: &str, best: &str) -> FeedbackRecord {
        FeedbackRecord {
            serial: String::new(),
            session_date: date.to_string(),
            best_part: best.to_string(),
            rating: None,
            improvement: String::new(),
            facilitator: facilitator.to_string(),
            course: course.to_string(),
            topic: String::new(),
            line_of_business: lob.to_string(),
        }
    }

    fn sample() -> Vec<FeedbackRecord> {
        vec![
            record("Python", "Ravi", "05 March 2025", "TECH CERTS", "labs"),
            record("Cloud", "Asha", "05 March 2025", "SEPO", "demos"),
            record("Cloud", "Asha", "05 March 2025", "SEPO", "Q&A"),
            record("Cloud", "Asha", "06 March 2025", "SEPO", "pace"),
            record("Orphan", "Nobody", "", "", "no lob"),
            record("Agile", "Meera", "05 March 2025", "SEPO", "games"),
        ]
    }

    #[test]
    fn all_selection_lists_distinct_lobs_sorted() {
        let records = sample();
        assert_eq!(select_lobs(&records, &LobSelection::All), vec!["SEPO", "TECH CERTS"]);
        assert_eq!(
            select_lobs(&records, &LobSelection::Single("sepo".into())),
            vec!["SEPO"]
        );
    }

    #[test]
    fn groups_keep_input_order_within_a_key() {
        let records = sample();
        let plan = build_groups(&records, &LobSelection::Single("SEPO".into()));
        let cloud = plan
            .groups
            .iter()
            .find(|group| group.key.course == "Cloud" && group.key.session_date == "05 March 2025")
            .expect("cloud group");
        let best: Vec<&str> = cloud.records.iter().map(|r| r.best_part.as_str()).collect();
        assert_eq!(best, vec!["demos", "Q&A"]);
    }

    #[test]
    fn groups_are_ordered_by_key() {
        let records = sample();
        let plan = build_groups(&records, &LobSelection::All);
        let keys: Vec<(&str, &str, &str)> = plan
            .groups
            .iter()
            .map(|g| {
                (
                    g.key.line_of_business.as_str(),
                    g.key.course.as_str(),
                    g.key.session_date.as_str(),
                )
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                ("SEPO", "Agile", "05 March 2025"),
                ("SEPO", "Cloud", "05 March 2025"),
                ("SEPO", "Cloud", "06 March 2025"),
                ("TECH CERTS", "Python", "05 March 2025"),
            ]
        );
    }

    #[test]
    fn grouping_partitions_the_selected_records() {
        let records = sample();
        for selection in [LobSelection::All, LobSelection::Single("SEPO".into())] {
            let plan = build_groups(&records, &selection);
            let mut grouped: Vec<*const FeedbackRecord> = plan
                .groups
                .iter()
                .flat_map(|g| g.records.iter().map(|r| *r as *const FeedbackRecord))
                .collect();
            let mut expected: Vec<*const FeedbackRecord> = records
                .iter()
                .filter(|r| plan.lobs.contains(&r.line_of_business))
                .map(|r| r as *const FeedbackRecord)
                .collect();
            grouped.sort();
            expected.sort();
            assert_eq!(grouped, expected);
        }
    }

    #[test]
    fn unmatched_selection_yields_empty_plan() {
        let records = sample();
        let plan = build_groups(&records, &LobSelection::Single("OC,DD,BC".into()));
        assert!(plan.is_empty());
        assert_eq!(plan.lobs, vec!["OC,DD,BC"]);
    }
}
