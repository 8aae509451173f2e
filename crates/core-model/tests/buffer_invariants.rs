//! Randomized edit sequences against a plain `Vec<u8>` reference model.
//!
//! After every operation the piece table must agree with the reference
//! bytes, and the line index must equal a rescan.

use core_model::Buffer;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Insert { at: usize, text: String },
    Delete { at: usize, len: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), "[a-z\\n]{0,8}")
            .prop_map(|(at, text)| Op::Insert { at, text }),
        (any::<usize>(), 0usize..16).prop_map(|(at, len)| Op::Delete { at, len }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn buffer_matches_reference_model(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let mut buf = Buffer::new();
        let mut model: Vec<u8> = Vec::new();

        for op in ops {
            match op {
                Op::Insert { at, text } => {
                    let at = at % (model.len() + 1);
                    buf.insert(at, text.as_bytes()).unwrap();
                    model.splice(at..at, text.bytes());
                }
                Op::Delete { at, len } => {
                    let at = at % (model.len() + 1);
                    let removed = buf.delete(at, len);
                    let end = (at + len).min(model.len());
                    let expected = end.saturating_sub(at.min(end));
                    prop_assert_eq!(removed, expected);
                    if at < model.len() {
                        model.drain(at..end);
                    }
                }
            }
            prop_assert_eq!(buf.len(), model.len());
            prop_assert_eq!(buf.range(0, buf.len()), model.clone());
            prop_assert!(buf.check_line_index());
            let newlines = model.iter().filter(|&&b| b == b'\n').count();
            prop_assert_eq!(buf.line_count(), 1 + newlines);
        }
    }

    #[test]
    fn line_spans_never_contain_newlines(
        text in "[a-z\\n]{0,64}",
        edits in proptest::collection::vec((any::<usize>(), "[a-z\\n]{0,6}"), 0..8),
    ) {
        let mut buf = Buffer::from_str(&text);
        for (at, insert) in edits {
            let at = at % (buf.len() + 1);
            buf.insert(at, insert.as_bytes()).unwrap();
        }
        for line in 0..buf.line_count() {
            let span = buf.line_range(line).unwrap();
            let bytes = buf.range(span.start, span.len());
            prop_assert!(!bytes.contains(&b'\n'));
        }
        prop_assert!(buf.line_range(buf.line_count()).is_none());
    }
}

#[test]
fn out_of_bounds_insert_is_rejected() {
    let mut buf = Buffer::from_str("abc");
    assert!(buf.insert(4, b"x").is_err());
    assert_eq!(buf.text(), "abc");
}
