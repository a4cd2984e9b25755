mod common;
use common::{bits, from_pattern, timeline};
use psg_timeline::{AnnotationSet, MaskMode, MaskPredicate};

fn chans(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn two_of_three_channels_masks_the_epoch() {
    let u = chans(&["C3", "C4", "O1"]);
    let mut tl = timeline(4, 1.0);
    tl.mask_channel(1, "C3");
    tl.mask_channel(1, "C4");
    tl.mask_channel(2, "O1");
    let s = tl.collapse_chep_to_epochs(&u, 2, 1.0);
    assert_eq!(bits(&tl), from_pattern("0100"));
    assert_eq!(s.newly_masked, 1);
    assert!(tl.chep().is_masked(1, "O1"), "remaining channel masked too");
    assert_eq!(tl.chep().channels_unmasked(2, &u).len(), 2);
}

#[test]
fn every_masked_epoch_is_fully_channel_masked() {
    let u = chans(&["C3", "C4", "O1", "O2"]);
    let mut tl = timeline(6, 1.0);
    tl.apply_mask(&MaskPredicate::File(from_pattern("100001")), &AnnotationSet::new())
        .unwrap();
    tl.mask_channel(3, "O2");
    tl.mask_channel(3, "O1");
    tl.mask_channel(4, "C3");
    tl.collapse_chep_to_epochs(&u, 0, 0.4);
    assert_eq!(bits(&tl), from_pattern("100101"));
    for e in 0..tl.n_epochs() {
        if tl.is_masked(e) {
            assert_eq!(tl.chep().channels_masked(e, &u).len(), u.len(), "epoch {e}");
        }
    }
    assert!(!tl.is_masked(4), "1 of 4 channels is not above 0.4");
}

#[test]
fn unmask_mode_does_not_mask_from_chep() {
    let u = chans(&["C3", "C4"]);
    let mut tl = timeline(3, 1.0);
    tl.set_mask_mode(MaskMode::Unmask);
    tl.mask_channel(0, "C3");
    tl.mask_channel(0, "C4");
    let s = tl.collapse_chep_to_epochs(&u, 1, 1.0);
    assert_eq!(s.matched, 1);
    assert_eq!(tl.n_unmasked(), 3);
}

#[test]
fn bad_channel_rollup_counts_unmasked_epochs_only() {
    let u = chans(&["C3", "C4"]);
    let mut tl = timeline(4, 1.0);
    tl.mask_channel(0, "C3");
    tl.mask_channel(1, "C3");
    tl.mask_channel(3, "C4");
    tl.set_epoch_mask(3, true);
    // C3 bad in 2 of 3 unmasked epochs; C4 only in the masked one.
    let v = tl.collapse_chep_to_channels(&u, 0, 0.5, true, true);
    assert_eq!(v.bad, chans(&["C3"]));
    assert_eq!(v.good, chans(&["C4"]));
    for e in 0..4 {
        assert!(tl.chep().is_masked(e, "C3"), "epoch {e}");
        assert!(!tl.chep().is_masked(e, "C4"), "epoch {e}");
    }
}

#[test]
fn count_threshold_for_channels() {
    let u = chans(&["C3", "C4"]);
    let mut tl = timeline(10, 1.0);
    tl.mask_channel(0, "C4");
    tl.mask_channel(5, "C4");
    let v = tl.collapse_chep_to_channels(&u, 2, 1.0, false, false);
    assert_eq!(v.bad, chans(&["C4"]));
    assert!(!tl.chep().is_masked(1, "C4"), "no propagation requested");
}
