//! Page numbering over arbitrary page id layouts.

use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::{Value, json};
use survey_ingest::{ParseOptions, parse_metadata};

fn payload(page_ids: &[Option<i64>]) -> Value {
    Value::Array(
        page_ids
            .iter()
            .enumerate()
            .map(|(index, page_id)| {
                json!({
                    "id": index + 1,
                    "type": "INPUT",
                    "question": {"de": format!("Frage {}", index + 1)},
                    "pageId": page_id,
                    "groups": [{"varnames": [format!("V{}", index + 1)]}]
                })
            })
            .collect(),
    )
}

proptest! {
    #[test]
    fn page_numbers_are_a_dense_rank(
        page_ids in prop::collection::vec(prop::option::of(-3i64..6), 1..12)
    ) {
        let input = payload(&page_ids);
        let metadata = parse_metadata(&input, &ParseOptions::default()).expect("parse");
        let pages: Vec<usize> = metadata.questions.iter().map(|q| q.page_number).collect();

        let distinct = page_ids.iter().collect::<BTreeSet<_>>().len();
        let numbers: BTreeSet<usize> = pages.iter().copied().collect();
        prop_assert_eq!(numbers, (1..=distinct).collect::<BTreeSet<_>>());

        // Missing ids sort first, then ascending page id.
        for (i, left) in page_ids.iter().enumerate() {
            for (j, right) in page_ids.iter().enumerate() {
                prop_assert_eq!(left.cmp(right), pages[i].cmp(&pages[j]));
            }
        }

        let again = parse_metadata(&input, &ParseOptions::default()).expect("parse");
        prop_assert_eq!(again, metadata);
    }
}
