mod common;
use common::{from_pattern, timeline};
use psg_timeline::{AnnotationSet, MaskPredicate};
use std::collections::BTreeSet;

fn mask(tl: &mut psg_timeline::Timeline, p: &str) {
    tl.apply_mask(&MaskPredicate::File(from_pattern(p)), &AnnotationSet::new())
        .unwrap();
}

#[test]
fn display_numbers_ignore_the_mask() {
    let mut tl = timeline(6, 1.0);
    let before: Vec<_> = (0..6).map(|e| tl.display_epoch(e)).collect();
    mask(&mut tl, "011010");
    let after: Vec<_> = (0..6).map(|e| tl.display_epoch(e)).collect();
    assert_eq!(before, after);
    assert_eq!(tl.display_epoch(0), Some(1));
    assert_eq!(tl.original_epoch(6), Some(5));
    assert_eq!(tl.original_epoch(7), None);
}

#[test]
fn iteration_skips_or_keeps_masked() {
    let mut tl = timeline(5, 1.0);
    mask(&mut tl, "01100");
    tl.first_epoch();
    let mut seen = vec![];
    while let Some(e) = tl.next_epoch() {
        seen.push(e);
    }
    assert_eq!(seen, vec![0, 3, 4]);

    tl.first_epoch();
    let mut all = 0;
    while tl.next_epoch_ignoring_mask().is_some() {
        all += 1;
    }
    assert_eq!(all, 5);
}

#[test]
fn current_numbers_survive_further_masking() {
    let mut tl = timeline(5, 1.0);
    let initial: Vec<_> = (0..5).map(|e| tl.current_epoch_index(e)).collect();
    assert_eq!(initial, vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);

    mask(&mut tl, "01000");
    assert_eq!(tl.current_epoch_index(1), None);
    assert_eq!(tl.current_epoch_index(4), Some(4), "unchanged for still-included epochs");
    assert_eq!(tl.original_of_current(2), Some(2));
}

#[test]
fn restructure_carries_display_numbers() {
    let mut tl = timeline(10, 2.0);
    mask(&mut tl, "01000");
    let kept = tl.restructure();
    assert_eq!(kept, 8);
    assert!(!tl.records().is_continuous());
    // Records 0,1 | 4..=9 re-epoch to [0,2) | [4,6) [6,8) [8,10).
    let starts: Vec<u64> = tl.epochs().iter().map(|e| e.start).collect();
    assert_eq!(starts, vec![0, 4000, 6000, 8000]);
    let display: Vec<_> = (0..tl.n_epochs()).filter_map(|e| tl.display_epoch(e)).collect();
    assert_eq!(display, vec![1, 3, 4, 5]);
    assert_eq!(tl.n_unmasked(), 4, "regenerated epochs start unmasked");
    assert_eq!(tl.records().original(2), Some(4));
}

#[test]
fn restructure_without_mask_is_a_no_op() {
    let mut tl = timeline(6, 2.0);
    assert_eq!(tl.restructure(), 6);
    assert_eq!(tl.n_epochs(), 3);
    assert!(tl.records().is_continuous());
}

#[test]
fn restructure_to_empty_timeline() {
    let mut tl = timeline(4, 2.0);
    tl.mask_all();
    assert_eq!(tl.restructure(), 0);
    assert_eq!(tl.n_epochs(), 0);
    assert_eq!(tl.next_epoch(), None);
}

#[test]
fn explicit_keep_set_with_new_epochs_numbered_after_the_max() {
    let mut tl = timeline(6, 2.0);
    // Keep records 1..=4: epochs [1,3) and [3,5) are new intervals.
    tl.restructure_records(&BTreeSet::from([1, 2, 3, 4]));
    let starts: Vec<u64> = tl.epochs().iter().map(|e| e.start).collect();
    assert_eq!(starts, vec![1000, 3000]);
    assert_eq!(tl.display_epoch(0), Some(4));
    assert_eq!(tl.display_epoch(1), Some(5));
}
