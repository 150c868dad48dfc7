//! Time window and frame index resolution tests.

use reclip::{
    ExportRange, ReclipError, TieBreak, TimeWindow, closest_index, exact_window, find_closest,
    resolve_export_range,
};

fn window(start: f64, end: f64) -> TimeWindow {
    TimeWindow::new(start, end).unwrap()
}

// ── TimeWindow ───────────────────────────────────────────────────

#[test]
fn window_rejects_reversed_and_non_finite_bounds() {
    assert!(matches!(
        TimeWindow::new(2.0, 1.0),
        Err(ReclipError::InvalidWindow { .. })
    ));
    assert!(TimeWindow::new(f64::NAN, 1.0).is_err());
    assert!(TimeWindow::new(0.0, f64::INFINITY).is_err());
    assert!(TimeWindow::new(1.0, 1.0).is_ok());
}

#[test]
fn window_bounds_are_inclusive() {
    let window = window(1.0, 2.5);
    assert!(window.contains(1.0));
    assert!(window.contains(2.5));
    assert!(!window.contains(2.6));
    assert_eq!(window.duration(), 1.5);
}

// ── exact_window ─────────────────────────────────────────────────

#[test]
fn exact_window_keeps_samples_inside() {
    let samples = [0.0, 1.0, 2.0, 3.0, 4.0];
    assert_eq!(exact_window(&samples, window(1.0, 3.0)), &[1.0, 2.0, 3.0]);
    assert_eq!(exact_window(&samples, window(-1.0, 10.0)), &samples);
    assert!(exact_window(&samples, window(1.5, 1.7)).is_empty());
    assert!(exact_window(&[], window(0.0, 1.0)).is_empty());
}

// ── closest_index ────────────────────────────────────────────────

#[test]
fn closest_index_breaks_ties_by_direction() {
    let samples = [0.0, 1.0, 2.0];
    assert_eq!(closest_index(&samples, 0.5, TieBreak::Earlier), Some(0));
    assert_eq!(closest_index(&samples, 0.5, TieBreak::Later), Some(1));
    assert_eq!(closest_index(&samples, 1.2, TieBreak::Later), Some(1));
    assert_eq!(closest_index(&samples, 1.8, TieBreak::Earlier), Some(2));
}

#[test]
fn closest_index_picks_edge_of_duplicate_run() {
    let samples = [0.0, 1.0, 1.0, 1.0, 2.0];
    assert_eq!(closest_index(&samples, 1.0, TieBreak::Earlier), Some(1));
    assert_eq!(closest_index(&samples, 1.0, TieBreak::Later), Some(3));

    let samples = [0.0, 1.0, 1.0, 3.0];
    assert_eq!(closest_index(&samples, 2.0, TieBreak::Earlier), Some(1));
    assert_eq!(closest_index(&samples, 2.0, TieBreak::Later), Some(3));
}

#[test]
fn closest_index_clamps_outside_targets() {
    let samples = [0.0, 1.0, 2.0, 3.0];
    for tie in [TieBreak::Earlier, TieBreak::Later] {
        assert_eq!(closest_index(&samples, -5.0, tie), Some(0));
        assert_eq!(closest_index(&samples, 10.0, tie), Some(3));
    }
    assert_eq!(closest_index(&[], 1.0, TieBreak::Earlier), None);
}

#[test]
fn find_closest_maps_every_target() {
    let samples = [0.0, 1.0, 2.0];
    assert_eq!(
        find_closest(&samples, &[0.4, 1.6, 9.0], TieBreak::Earlier),
        vec![0, 2, 2]
    );
    assert!(find_closest(&[], &[1.0], TieBreak::Later).is_empty());
}

// ── resolve_export_range ─────────────────────────────────────────

#[test]
fn resolves_against_independent_sequences() {
    let global = [0.9, 1.0, 1.25, 1.5, 1.75, 2.0, 2.1];
    let source = [0.95, 1.00, 1.50, 2.00, 2.05];
    assert_eq!(
        resolve_export_range(&global, &source, window(1.0, 2.0)),
        Some(ExportRange { start: 1, end: 3 })
    );
}

#[test]
fn empty_or_disjoint_windows_resolve_to_nothing() {
    let global: Vec<f64> = (0..10).map(f64::from).collect();
    let source = [5.0, 5.5, 6.0, 6.5, 7.0];
    assert_eq!(resolve_export_range(&global, &source, window(0.2, 0.8)), None);
    assert_eq!(resolve_export_range(&global, &source, window(0.0, 4.0)), None);
    assert_eq!(resolve_export_range(&global, &source, window(8.0, 9.0)), None);
    assert_eq!(resolve_export_range(&global, &[], window(0.0, 9.0)), None);
}

#[test]
fn window_touching_source_start_selects_first_frame() {
    let global: Vec<f64> = (0..10).map(f64::from).collect();
    let source = [5.0, 5.5, 6.0, 6.5, 7.0];
    assert_eq!(
        resolve_export_range(&global, &source, window(0.0, 5.0)),
        Some(ExportRange { start: 0, end: 0 })
    );
}

#[test]
fn resolved_ranges_stay_within_source() {
    let global: Vec<f64> = (0..600).map(|i| i as f64 / 60.0).collect();
    let source: Vec<f64> = (0..300).map(|i| 0.004 + i as f64 / 30.0).collect();

    for start in 0..40 {
        for length in 0..12 {
            let start = start as f64 * 0.27;
            let window = window(start, start + length as f64 * 0.33);
            if let Some(range) = resolve_export_range(&global, &source, window) {
                assert!(range.start <= range.end, "{window} -> {range}");
                assert!(range.end < source.len(), "{window} -> {range}");
                assert_eq!(range.frame_count(), range.end - range.start + 1);
            }
        }
    }
}
