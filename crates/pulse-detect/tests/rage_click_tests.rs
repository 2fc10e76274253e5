//! Integration tests for rage-click thresholds and window pruning.

use pulse_detect::RageClickDetector;

#[test]
fn rage_click_tests_burst_fires_exactly_once_with_click_count() {
    let mut detector = RageClickDetector::new(3, 1_000).expect("detector should build");
    let fired: Vec<usize> = [0_u64, 100, 200, 250]
        .iter()
        .map(|at| detector.on_click(50.0, 50.0, *at))
        .filter(|outcome| outcome.fired)
        .map(|outcome| outcome.burst_size)
        .collect();

    assert_eq!(fired, vec![3]);
}

#[test]
fn rage_click_tests_clicks_outside_window_never_combine() {
    let mut detector = RageClickDetector::new(2, 1_000).expect("detector should build");
    assert!(!detector.on_click(50.0, 50.0, 0).fired);
    let outcome = detector.on_click(50.0, 50.0, 1_500);
    assert!(!outcome.fired);
    assert_eq!(outcome.burst_size, 1);
}

#[test]
fn rage_click_tests_distinct_coordinates_count_separately() {
    let mut detector = RageClickDetector::new(3, 1_000).expect("detector should build");
    detector.on_click(10.0, 10.0, 0);
    detector.on_click(200.0, 10.0, 10);
    detector.on_click(10.0, 10.0, 20);
    assert!(!detector.on_click(200.0, 10.0, 30).fired);
    assert!(detector.on_click(10.2, 9.8, 40).fired);
}
