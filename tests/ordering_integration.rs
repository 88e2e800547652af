//! Integration tests for output order
//!
//! These tests validate that concurrency never changes results:
//! - Concurrent map and flatten match their sequential versions
//! - Errors keep their position through concurrent stages
//! - Grouping reproduces the input order
//! - Unordered mode emits the same elements

mod common;

use common::builders::{CorruptRecord, SourceBuilder};
use common::collect_values;
use proptest::prelude::*;
use std::time::Duration;
use streamable_rs::{CatchSpec, Concurrency, Stream};

const WORKER_COUNTS: [usize; 4] = [1, 2, 4, 8];

fn jitter(x: i64) -> Duration {
    Duration::from_micros((x.unsigned_abs() % 7) * 150)
}

#[test]
fn test_par_map_matches_map_for_all_worker_counts() {
    let input: Vec<i64> = (0..200).map(|i| (i * 37) % 101 - 50).collect();
    let expected = collect_values(&Stream::new(input.clone()).map(|x| x * x - 3));

    for workers in WORKER_COUNTS {
        let stream = Stream::new(input.clone())
            .par_map(workers, |x| {
                std::thread::sleep(jitter(x));
                x * x - 3
            })
            .unwrap();
        assert_eq!(collect_values(&stream), expected, "workers = {}", workers);
    }
}

#[test]
fn test_map_async_matches_map_for_all_worker_counts() {
    let input: Vec<i64> = (0..100).collect();
    let expected = collect_values(&Stream::new(input.clone()).map(|x| x + 1000));

    for workers in WORKER_COUNTS {
        let stream = Stream::new(input.clone())
            .map_async(workers, |x| async move {
                tokio::time::sleep(jitter(x)).await;
                x + 1000
            })
            .unwrap();
        assert_eq!(collect_values(&stream), expected, "workers = {}", workers);
    }
}

#[test]
fn test_errors_keep_their_position() {
    for workers in WORKER_COUNTS {
        let stream = SourceBuilder::new(12)
            .failing_at(&[3, 7])
            .build()
            .par_map(workers, |x| x * 2)
            .unwrap()
            .catch_with(CatchSpec::kind::<CorruptRecord>().replacement(usize::MAX));

        let out = collect_values(&stream);
        let expected: Vec<usize> = (0..12)
            .map(|i| if i == 3 || i == 7 { usize::MAX } else { i * 2 })
            .collect();
        assert_eq!(out, expected, "workers = {}", workers);
    }
}

#[test]
fn test_stacked_concurrent_stages_keep_order() {
    let stream = Stream::new(0..300u64)
        .par_map(8, |x| {
            std::thread::sleep(Duration::from_micros((300 - x) * 10));
            x + 1
        })
        .unwrap()
        .filter(|x| x % 3 != 0)
        .map_async(4, |x| async move { x * 10 })
        .unwrap()
        .par_map(2, |x| x - 1)
        .unwrap();

    let expected: Vec<u64> = (1..=300).filter(|x| x % 3 != 0).map(|x| x * 10 - 1).collect();
    assert_eq!(collect_values(&stream), expected);
}

#[test]
fn test_unordered_emits_same_elements() {
    let stream = Stream::new(0..64i64)
        .par_map(Concurrency::new(8).unordered(), |x| {
            std::thread::sleep(jitter(x));
            x
        })
        .unwrap();
    let mut out = collect_values(&stream);
    out.sort_unstable();
    assert_eq!(out, (0..64).collect::<Vec<_>>());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_concurrency_never_changes_results(
        input in prop::collection::vec(-1000i64..1000, 0..80),
        workers in prop::sample::select(WORKER_COUNTS.to_vec())
    ) {
        let sequential = collect_values(&Stream::new(input.clone()).map(|x| x / 3 + 1));
        let concurrent = collect_values(
            &Stream::new(input).par_map(workers, |x| x / 3 + 1).unwrap()
        );
        prop_assert_eq!(sequential, concurrent);
    }

    #[test]
    fn test_par_flatten_matches_flatten(
        nested in prop::collection::vec(prop::collection::vec(0u32..100, 0..6), 0..30),
        workers in prop::sample::select(WORKER_COUNTS.to_vec())
    ) {
        let sequential = collect_values(&Stream::new(nested.clone()).flatten());
        let concurrent = collect_values(&Stream::new(nested.clone()).par_flatten(workers).unwrap());
        prop_assert_eq!(&sequential, &concurrent);
        prop_assert_eq!(sequential, nested.concat());
    }

    #[test]
    fn test_group_by_size_concatenates_to_input(
        input in prop::collection::vec(any::<u16>(), 0..100),
        size in 1usize..10
    ) {
        let batches = collect_values(&Stream::new(input.clone()).group_by_size(size).unwrap());

        prop_assert_eq!(batches.concat(), input);
        if let Some((last, full)) = batches.split_last() {
            prop_assert!(!last.is_empty() && last.len() <= size);
            for batch in full {
                prop_assert_eq!(batch.len(), size);
            }
        }
    }

    #[test]
    fn test_group_by_key_splits_at_key_changes(
        input in prop::collection::vec(0u8..4, 0..60)
    ) {
        let batches = collect_values(&Stream::new(input.clone()).group_by_key(|x| *x));

        prop_assert_eq!(batches.concat(), input);
        for batch in &batches {
            prop_assert!(batch.iter().all(|x| *x == batch[0]));
        }
        for pair in batches.windows(2) {
            prop_assert_ne!(pair[0][0], pair[1][0]);
        }
    }
}
