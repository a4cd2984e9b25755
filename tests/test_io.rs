mod common;
use common::{bits, from_pattern, timeline};
use psg_timeline::io::{self, EpochState};
use psg_timeline::{AnnotationSet, MaskPredicate, TimelineError};

#[test]
fn mask_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mask.txt");
    let mut tl = timeline(6, 1.0);
    tl.apply_mask(&MaskPredicate::File(from_pattern("100110")), &AnnotationSet::new())
        .unwrap();
    io::write_mask_file(&path, &tl).unwrap();

    let loaded = io::read_mask_file(&path).unwrap();
    assert_eq!(loaded, bits(&tl));

    let mut other = timeline(6, 1.0);
    other.apply_mask(&MaskPredicate::File(loaded), &AnnotationSet::new()).unwrap();
    assert_eq!(bits(&other), bits(&tl));
}

#[test]
fn chep_file_replace_and_merge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chep.txt");
    let mut tl = timeline(5, 1.0);
    tl.mask_channel(0, "C3");
    tl.mask_channel(3, "O1");
    tl.mask_channel(3, "C4");
    io::write_chep(&path, &tl).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "1\tC3\n4\tC4\n4\tO1\n", "display numbers, sorted channels");

    let mut other = timeline(5, 1.0);
    other.mask_channel(2, "F3");
    assert_eq!(io::load_chep(&path, &mut other, true).unwrap(), 3);
    assert_eq!(other.chep().n_pairs(), 4);
    io::load_chep(&path, &mut other, false).unwrap();
    assert_eq!(other.chep(), tl.chep());
}

#[test]
fn chep_with_unknown_epoch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chep.txt");
    std::fs::write(&path, "9\tC3\n").unwrap();
    let mut tl = timeline(3, 1.0);
    let err = io::load_chep(&path, &mut tl, true).unwrap_err();
    assert!(matches!(err.downcast_ref::<TimelineError>(), Some(TimelineError::UnknownEpoch(9))));
    assert!(tl.chep().is_empty());
}

#[test]
fn masked_runs_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("masked.annot");
    let mut tl = timeline(6, 1.0);
    tl.apply_mask(&MaskPredicate::File(from_pattern("011001")), &AnnotationSet::new())
        .unwrap();
    let n = io::write_masked_annotations(&path, &tl, "excluded").unwrap();
    assert_eq!(n, 2);
    let lines: Vec<Vec<String>> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|l| l.split('\t').map(String::from).collect())
        .collect();
    assert_eq!(lines[0], vec!["excluded", "1", "3"]);
    let stop: f64 = lines[1][2].parse().unwrap();
    approx::assert_abs_diff_eq!(stop, 6.0);
}

#[test]
fn epoch_state_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.safetensors");
    let mut tl = timeline(8, 2.0);
    tl.apply_mask(&MaskPredicate::File(from_pattern("0101")), &AnnotationSet::new())
        .unwrap();
    let state = EpochState::from_timeline(&tl);
    state.save(&path).unwrap();

    let loaded = EpochState::load(&path).unwrap();
    assert_eq!(loaded, state);
    assert_eq!(loaded.start, vec![0, 2000, 4000, 6000]);
    assert_eq!(loaded.display, vec![1, 2, 3, 4]);

    let mut fresh = timeline(8, 2.0);
    loaded.apply(&mut fresh).unwrap();
    assert_eq!(bits(&fresh), bits(&tl));

    let mut other = timeline(8, 4.0);
    assert!(loaded.apply(&mut other).is_err(), "different epoch table");
}
