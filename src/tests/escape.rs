use crate::escape::EscapeDetector;
use fugit::TimerInstantU32;

fn at_ms(milliseconds: u32) -> TimerInstantU32<1_000_000> {
    TimerInstantU32::from_ticks(milliseconds * 1000)
}

#[test]
fn triggers_after_guard_time() {
    let mut detector = EscapeDetector::<1_000_000>::new();
    for _ in 0..3 {
        detector.observe(b'+', at_ms(0));
    }

    assert!(!detector.triggered(at_ms(999)));
    assert!(detector.triggered(at_ms(1000)));
}

#[test]
fn two_pluses_are_not_enough() {
    let mut detector = EscapeDetector::<1_000_000>::new();
    detector.observe(b'+', at_ms(0));
    detector.observe(b'+', at_ms(1));

    assert!(!detector.triggered(at_ms(5000)));
}

#[test]
fn other_bytes_reset_the_run() {
    let mut detector = EscapeDetector::<1_000_000>::new();
    detector.observe(b'+', at_ms(0));
    detector.observe(b'+', at_ms(1));
    detector.observe(b'x', at_ms(2));
    detector.observe(b'+', at_ms(3));

    assert!(!detector.triggered(at_ms(5000)));
}

#[test]
fn data_after_triple_disarms() {
    let mut detector = EscapeDetector::<1_000_000>::new();
    for _ in 0..3 {
        detector.observe(b'+', at_ms(0));
    }
    detector.observe(b'A', at_ms(500));

    assert!(!detector.triggered(at_ms(5000)));
}

#[test]
fn extra_plus_restarts_the_window() {
    let mut detector = EscapeDetector::<1_000_000>::new();
    for _ in 0..3 {
        detector.observe(b'+', at_ms(0));
    }
    detector.observe(b'+', at_ms(900));

    assert!(!detector.triggered(at_ms(1500)));
    assert!(detector.triggered(at_ms(1900)));
}

#[test]
fn firing_resets_the_detector() {
    let mut detector = EscapeDetector::<1_000_000>::new();
    for _ in 0..3 {
        detector.observe(b'+', at_ms(0));
    }

    assert!(detector.triggered(at_ms(1500)));
    assert!(!detector.triggered(at_ms(9000)));
}

#[test]
fn reset_forgets_partial_sequences() {
    let mut detector = EscapeDetector::<1_000_000>::new();
    for _ in 0..3 {
        detector.observe(b'+', at_ms(0));
    }
    detector.reset();

    assert!(!detector.triggered(at_ms(5000)));
}
