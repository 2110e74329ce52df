use approx::assert_relative_eq;
use rower_core::cyclic_filter::CyclicErrorFilter;
use rower_core::types::Precision;

/// Slot-based synthetic pattern helper.
fn slot_value(index: u64, slot_values: &[Precision]) -> Precision {
    slot_values[(index as usize) % slot_values.len()]
}

#[test]
fn applies_identity_before_any_learning() {
    let mut filter = CyclicErrorFilter::new(4, 10, 1.0, 50);

    for (i, value) in [100.0, 200.0, 300.0, 400.0, 150.0, 250.0, 350.0, 450.0]
        .into_iter()
        .enumerate()
    {
        filter.apply_filter(i as u64, value);
    }

    let clean = filter.clean_series();
    for (i, value) in [100.0, 200.0, 300.0, 400.0, 150.0, 250.0, 350.0, 450.0]
        .into_iter()
        .enumerate()
    {
        assert_relative_eq!(clean[i], value, max_relative = 1e-5);
    }
}

#[test]
fn zero_aggressiveness_disables_learning_entirely() {
    let mut filter = CyclicErrorFilter::new(4, 10, 0.0, 10);
    filter.update_regression_coefficients(0.0, 100.0, 0.99);

    for i in 0..10u64 {
        let raw = if i % 4 == 0 { 150.0 } else { 100.0 };
        filter.record_raw_datapoint(i, i as Precision, raw);
    }
    for _ in 0..10 {
        filter.process_next_raw_datapoint();
    }
    assert!(!filter.is_stabilized());

    filter.apply_filter(0, 150.0);
    filter.apply_filter(1, 100.0);
    filter.apply_filter(2, 200.0);

    let raw = filter.raw_series();
    let clean = filter.clean_series();
    for i in 0..3 {
        assert_eq!(clean[i], raw[i], "pass-through must be bitwise at index {i}");
    }
}

#[test]
fn same_slot_receives_same_correction_ratio() {
    let mut filter = CyclicErrorFilter::new(4, 5, 1.0, 50);

    filter.apply_filter(0, 100.0);
    filter.apply_filter(4, 200.0);

    let clean = filter.clean_series();
    let raw = filter.raw_series();
    assert_relative_eq!(clean[0] / raw[0], clean[1] / raw[1], max_relative = 1e-5);
}

#[test]
fn different_slots_receive_their_own_corrections() {
    let mut filter = CyclicErrorFilter::new(3, 10, 1.0, 50);

    for (i, value) in [100.0, 200.0, 300.0, 150.0, 250.0, 350.0].into_iter().enumerate() {
        filter.apply_filter(i as u64, value);
    }

    let clean = filter.clean_series();
    let raw = filter.raw_series();
    for slot in 0..3 {
        assert_relative_eq!(
            clean[slot] / raw[slot],
            clean[slot + 3] / raw[slot + 3],
            max_relative = 1e-5
        );
    }
}

#[test]
fn recording_requires_nonzero_aggressiveness() {
    let mut learning = CyclicErrorFilter::new(4, 5, 1.0, 5);
    let mut disabled = CyclicErrorFilter::new(4, 5, 0.0, 5);
    learning.update_regression_coefficients(0.0, 100.0, 0.99);
    disabled.update_regression_coefficients(0.0, 100.0, 0.99);

    for i in 0..5u64 {
        learning.record_raw_datapoint(i, i as Precision, 100.0);
        disabled.record_raw_datapoint(i, i as Precision, 100.0);
    }
    for _ in 0..5 {
        learning.process_next_raw_datapoint();
        disabled.process_next_raw_datapoint();
    }

    assert!(learning.is_stabilized());
    assert!(!disabled.is_stabilized());
}

#[test]
fn processing_an_empty_buffer_is_a_no_op() {
    let mut filter = CyclicErrorFilter::new(4, 5, 1.0, 10);
    for _ in 0..10 {
        filter.process_next_raw_datapoint();
    }
    assert!(!filter.is_stabilized());
}

#[test]
fn regression_coefficients_steer_the_correction_direction() {
    let mut filter_up = CyclicErrorFilter::new(4, 5, 1.0, 5);
    let mut filter_down = CyclicErrorFilter::new(4, 5, 1.0, 5);

    filter_up.update_regression_coefficients(0.0, 100.0, 0.99);
    filter_down.update_regression_coefficients(0.0, 50.0, 0.99);

    filter_up.record_raw_datapoint(0, 0.0, 75.0);
    filter_down.record_raw_datapoint(0, 0.0, 75.0);
    filter_up.process_next_raw_datapoint();
    filter_down.process_next_raw_datapoint();

    filter_up.apply_filter(0, 75.0);
    filter_down.apply_filter(0, 75.0);

    // perfect/raw = 100/75 corrects up; 50/75 corrects down.
    assert_relative_eq!(filter_up.clean_series().back(), 75.07427, max_relative = 1e-5);
    assert_relative_eq!(filter_down.clean_series().back(), 74.92567, max_relative = 1e-5);
}

#[test]
fn learns_systematic_error_pattern_over_time() {
    let mut filter = CyclicErrorFilter::new(4, 5, 1.0, 20);
    filter.update_regression_coefficients(0.0, 100.0, 0.99);

    for i in 0..20u64 {
        let raw = if i % 4 == 0 { 110.0 } else { 100.0 };
        filter.record_raw_datapoint(i, i as Precision, raw);
    }
    for _ in 0..20 {
        filter.process_next_raw_datapoint();
    }
    assert!(filter.is_stabilized());

    filter.apply_filter(0, 110.0);
    let corrected_slot0 = filter.clean_series().back();
    filter.apply_filter(1, 100.0);
    let corrected_slot1 = filter.clean_series().back();

    assert_relative_eq!(corrected_slot0, 109.33187, max_relative = 1e-5);
    assert_relative_eq!(corrected_slot1, 100.20246, max_relative = 1e-5);
}

#[test]
fn aggressiveness_scales_the_applied_correction() {
    let mut filter_low = CyclicErrorFilter::new(4, 5, 0.1, 20);
    let mut filter_high = CyclicErrorFilter::new(4, 5, 1.0, 20);
    filter_low.update_regression_coefficients(0.0, 100.0, 0.99);
    filter_high.update_regression_coefficients(0.0, 100.0, 0.99);

    for i in 0..20u64 {
        let raw = if i % 4 == 0 { 120.0 } else { 100.0 };
        filter_low.record_raw_datapoint(i, i as Precision, raw);
        filter_high.record_raw_datapoint(i, i as Precision, raw);
    }
    for _ in 0..20 {
        filter_low.process_next_raw_datapoint();
        filter_high.process_next_raw_datapoint();
    }

    filter_low.apply_filter(0, 120.0);
    filter_high.apply_filter(0, 120.0);

    let corrected_low = filter_low.clean_series().back();
    let corrected_high = filter_high.clean_series().back();
    assert!(corrected_high < corrected_low);
}

mod restart_and_reset {
    use super::*;

    fn trained_filter() -> CyclicErrorFilter {
        let mut filter = CyclicErrorFilter::new(4, 10, 1.0, 10);
        filter.update_regression_coefficients(0.0, 100.0, 0.99);
        for i in 0..10u64 {
            let raw = if i % 4 == 0 { 110.0 } else { 100.0 };
            filter.record_raw_datapoint(i, i as Precision, raw);
        }
        for _ in 0..10 {
            filter.process_next_raw_datapoint();
        }
        filter
    }

    #[test]
    fn restart_clears_recorded_datapoints() {
        let mut filter = CyclicErrorFilter::new(4, 5, 1.0, 10);
        filter.update_regression_coefficients(0.0, 100.0, 0.99);
        for i in 0..5u64 {
            filter.record_raw_datapoint(i, i as Precision, 100.0);
        }

        filter.restart();

        for _ in 0..10 {
            filter.process_next_raw_datapoint();
        }
        assert!(!filter.is_stabilized());
    }

    #[test]
    fn restart_preserves_stabilization() {
        let mut filter = trained_filter();
        assert!(filter.is_stabilized());
        filter.restart();
        assert!(filter.is_stabilized());
    }

    #[test]
    fn restart_preserves_learned_corrections() {
        let mut filter = trained_filter();

        filter.apply_filter(0, 110.0);
        let before_restart = filter.clean_series().back();

        filter.restart();

        filter.apply_filter(0, 110.0);
        let after_restart = filter.clean_series().back();

        assert_relative_eq!(after_restart, before_restart, max_relative = 1e-5);
        assert_relative_eq!(after_restart, 109.67299, max_relative = 1e-5);
    }

    #[test]
    fn reset_clears_stabilization_and_corrections() {
        let mut filter = trained_filter();
        assert!(filter.is_stabilized());

        filter.reset();

        assert!(!filter.is_stabilized());
        filter.apply_filter(0, 110.0);
        assert_relative_eq!(filter.clean_series().back(), 110.0, max_relative = 1e-5);
    }

    #[test]
    fn reset_restores_weight_correction() {
        let mut filter = trained_filter();
        filter.reset();
        filter.apply_filter(0, 123.456);
        assert_relative_eq!(filter.clean_series().back(), 123.456, max_relative = 1e-5);
    }

    #[test]
    fn repeated_reset_is_idempotent() {
        let mut filter = trained_filter();
        filter.reset();
        filter.apply_filter(0, 110.0);
        let once = filter.clean_series().back();
        filter.reset();
        filter.apply_filter(0, 110.0);
        let twice = filter.clean_series().back();
        assert_eq!(once, twice);
        assert!(!filter.is_stabilized());
    }
}

mod boost {
    use super::*;

    #[test]
    fn persistent_one_signed_bias_converges_faster() {
        let mut with_fit = CyclicErrorFilter::new(4, 10, 1.0, 30);
        let mut without_fit = CyclicErrorFilter::new(4, 10, 1.0, 30);
        with_fit.update_regression_coefficients(0.0, 100.0, 0.99);
        // Zero goodness of fit keeps every update weightless.
        without_fit.update_regression_coefficients(0.0, 100.0, 0.0);

        for i in 0..30u64 {
            let raw = if i % 4 == 0 { 115.0 } else { 100.0 };
            with_fit.record_raw_datapoint(i, i as Precision, raw);
            without_fit.record_raw_datapoint(i, i as Precision, raw);
        }
        for _ in 0..30 {
            with_fit.process_next_raw_datapoint();
            without_fit.process_next_raw_datapoint();
        }

        with_fit.apply_filter(0, 115.0);
        without_fit.apply_filter(0, 115.0);

        let corrected = with_fit.clean_series().back();
        let uncorrected = without_fit.clean_series().back();
        assert!(corrected < uncorrected);
        assert_relative_eq!(corrected, 113.90047, max_relative = 1e-5);
        assert_relative_eq!(uncorrected, 115.0, max_relative = 1e-5);
    }

    #[test]
    fn alternating_sign_noise_keeps_boost_at_one() {
        let mut alternating = CyclicErrorFilter::new(4, 10, 1.0, 30);
        let mut consistent = CyclicErrorFilter::new(4, 10, 1.0, 30);
        alternating.update_regression_coefficients(0.0, 100.0, 0.99);
        consistent.update_regression_coefficients(0.0, 100.0, 0.99);

        for i in 0..30u64 {
            let iteration = i / 4;
            let raw_alternating = if i % 4 == 0 {
                if iteration % 2 == 0 { 115.0 } else { 85.0 }
            } else {
                100.0
            };
            let raw_consistent = if i % 4 == 0 { 115.0 } else { 100.0 };
            alternating.record_raw_datapoint(i, i as Precision, raw_alternating);
            consistent.record_raw_datapoint(i, i as Precision, raw_consistent);
        }
        for _ in 0..30 {
            alternating.process_next_raw_datapoint();
            consistent.process_next_raw_datapoint();
        }

        alternating.apply_filter(0, 115.0);
        consistent.apply_filter(0, 115.0);

        let corrected_alternating = alternating.clean_series().back();
        let corrected_consistent = consistent.clean_series().back();
        assert!(corrected_consistent < corrected_alternating);
        assert_relative_eq!(corrected_alternating, 114.99991, max_relative = 1e-5);
        assert_relative_eq!(corrected_consistent, 113.90047, max_relative = 1e-5);
    }

    #[test]
    fn boost_levels_follow_each_slots_bias_pattern() {
        let mut filter = CyclicErrorFilter::new(4, 10, 1.0, 40);
        filter.update_regression_coefficients(0.0, 100.0, 0.99);

        for i in 0..40u64 {
            let raw = match i % 4 {
                0 => 110.0,
                2 => 90.0,
                _ => 100.0,
            };
            filter.record_raw_datapoint(i, i as Precision, raw);
        }
        for _ in 0..40 {
            filter.process_next_raw_datapoint();
        }

        filter.apply_filter(0, 100.0);
        let slot0 = filter.clean_series().back();
        filter.apply_filter(1, 100.0);
        let slot1 = filter.clean_series().back();
        filter.apply_filter(2, 100.0);
        let slot2 = filter.clean_series().back();

        assert_relative_eq!(slot0, 98.67390, max_relative = 1e-5);
        assert_relative_eq!(slot1, 99.99614, max_relative = 1e-5);
        assert_relative_eq!(slot2, 101.3338, max_relative = 1e-5);
    }
}

mod misalignment {
    use super::*;

    #[test]
    fn not_reported_before_stabilization() {
        let mut filter = CyclicErrorFilter::new(4, 10, 1.0, 50);
        filter.update_regression_coefficients(0.0, 100.0, 0.99);
        for i in 0..10u64 {
            filter.record_raw_datapoint(i, i as Precision, 100.0);
        }
        for _ in 0..10 {
            filter.process_next_raw_datapoint();
        }
        assert!(!filter.is_stabilized());
        assert!(!filter.is_potentially_misaligned());
    }

    #[test]
    fn not_reported_for_a_stable_pattern() {
        let mut filter = CyclicErrorFilter::new(4, 10, 1.0, 20);
        filter.update_regression_coefficients(0.0, 100.0, 0.99);
        for i in 0..20u64 {
            let raw = if i % 4 == 0 { 110.0 } else { 100.0 };
            filter.record_raw_datapoint(i, i as Precision, raw);
        }
        for _ in 0..20 {
            filter.process_next_raw_datapoint();
        }
        assert!(filter.is_stabilized());

        for i in 20..40u64 {
            let raw = if i % 4 == 0 { 110.0 } else { 100.0 };
            filter.record_raw_datapoint(i, i as Precision, raw);
        }
        assert!(!filter.is_potentially_misaligned());
    }

    #[test]
    fn reported_when_the_magnet_pattern_shifts() {
        let trained = [100.0, 50.0, 150.0, 60.0, 180.0, 100.0];
        let swapped = [100.0, 150.0, 50.0, 20.0, 200.0, 100.0];

        let mut filter = CyclicErrorFilter::new(6, 10, 1.0, 12);
        filter.update_regression_coefficients(0.0, 100.0, 0.99);

        // Train on the asymmetric pattern.
        for i in 0..30u64 {
            filter.record_raw_datapoint(i, i as Precision, slot_value(i, &trained));
            filter.process_next_raw_datapoint();
        }
        assert!(filter.is_stabilized());

        // Build a matching fit-quality baseline.
        for i in 12..36u64 {
            filter.record_raw_datapoint(i, i as Precision, slot_value(i, &trained));
            filter.process_next_raw_datapoint();
        }
        assert!(!filter.is_potentially_misaligned());

        // Inject the swapped pattern; slot 5 additionally alternates.
        for i in 36..60u64 {
            let mut raw = slot_value(i, &swapped);
            if i % 6 == 5 {
                raw = if (i / 6) % 2 == 0 { 170.0 } else { 40.0 };
            }
            filter.record_raw_datapoint(i, i as Precision, raw);
            filter.process_next_raw_datapoint();
        }

        assert!(filter.is_potentially_misaligned());
    }

    #[test]
    fn detection_decays_corrections_toward_identity() {
        let trained = [100.0, 50.0, 150.0, 60.0, 180.0, 100.0];
        let swapped = [100.0, 150.0, 50.0, 20.0, 200.0, 100.0];

        let mut filter = CyclicErrorFilter::new(6, 10, 1.0, 12);
        filter.update_regression_coefficients(0.0, 100.0, 0.99);
        for i in 0..36u64 {
            filter.record_raw_datapoint(i, i as Precision, slot_value(i, &trained));
            filter.process_next_raw_datapoint();
        }
        filter.apply_filter(1, 100.0);
        let correction_before = (filter.clean_series().back() / 100.0 - 1.0).abs();

        for i in 36..60u64 {
            let mut raw = slot_value(i, &swapped);
            if i % 6 == 5 {
                raw = if (i / 6) % 2 == 0 { 170.0 } else { 40.0 };
            }
            filter.record_raw_datapoint(i, i as Precision, raw);
            filter.process_next_raw_datapoint();
        }
        assert!(filter.is_potentially_misaligned());

        // The decay shrinks each slot's accumulated confidence, so the next
        // samples dominate: a uniform pattern now pulls the corrections
        // toward identity far faster than the trained state would allow.
        for i in 60..90u64 {
            filter.record_raw_datapoint(i, i as Precision, 100.0);
            filter.process_next_raw_datapoint();
        }

        filter.apply_filter(1, 100.0);
        let correction_after = (filter.clean_series().back() / 100.0 - 1.0).abs();
        assert!(
            correction_after < correction_before,
            "decay must let corrections shrink: before={correction_before} after={correction_after}"
        );
    }
}

mod stabilization_cycles {
    use super::*;

    #[test]
    fn relearning_after_restart_converges_further() {
        let mut filter = CyclicErrorFilter::new(4, 10, 1.0, 10);
        filter.update_regression_coefficients(0.0, 100.0, 0.99);

        for i in 0..10u64 {
            let raw = if i % 4 == 0 { 110.0 } else { 100.0 };
            filter.record_raw_datapoint(i, i as Precision, raw);
        }
        for _ in 0..10 {
            filter.process_next_raw_datapoint();
        }
        assert!(filter.is_stabilized());

        filter.apply_filter(0, 110.0);
        let first_cycle = filter.clean_series().back();

        filter.restart();

        for i in 0..10u64 {
            let raw = if i % 4 == 0 { 110.0 } else { 100.0 };
            filter.record_raw_datapoint(i, i as Precision, raw);
        }
        for _ in 0..10 {
            filter.process_next_raw_datapoint();
        }

        filter.apply_filter(0, 110.0);
        let second_cycle = filter.clean_series().back();

        assert_relative_eq!(first_cycle, 109.67299, max_relative = 1e-5);
        assert_relative_eq!(second_cycle, 108.77302, max_relative = 1e-5);
    }

    #[test]
    fn opposing_slot_biases_balance_around_identity() {
        let mut filter = CyclicErrorFilter::new(4, 10, 1.0, 20);
        filter.update_regression_coefficients(0.0, 100.0, 0.99);

        for i in 0..20u64 {
            let raw = match i % 4 {
                0 | 1 => 110.0,
                _ => 90.0,
            };
            filter.record_raw_datapoint(i, i as Precision, raw);
        }
        for _ in 0..20 {
            filter.process_next_raw_datapoint();
        }

        filter.apply_filter(0, 100.0);
        let slot0 = filter.clean_series().back();
        filter.apply_filter(2, 100.0);
        let slot2 = filter.clean_series().back();

        assert_relative_eq!(slot0, 99.18957, max_relative = 1e-5);
        assert_relative_eq!(slot2, 100.81042, max_relative = 1e-5);
    }
}
