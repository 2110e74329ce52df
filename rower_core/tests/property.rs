use proptest::prelude::*;
use rower_core::cyclic_filter::CyclicErrorFilter;
use rower_core::types::Precision;
use rower_core::MonitorBuilder;

prop_compose! {
    /// Bounded, strictly increasing edge timestamps: 20–150 edges with
    /// gaps between 9 ms and 150 ms (the spinning-flywheel regime; the
    /// phase dwell minima then keep strokes slower than revolutions).
    fn edge_stream()(gaps in prop::collection::vec(9_000u64..150_000, 20..150)) -> Vec<u64> {
        let mut t = 0u64;
        let mut edges = Vec::with_capacity(gaps.len());
        for gap in gaps {
            t += gap;
            edges.push(t);
        }
        edges
    }
}

proptest! {
    /// Counters are monotonically non-decreasing and strokes never outrun
    /// revolutions, for any impulse stream whatsoever.
    #[test]
    fn counts_are_monotonic_and_strokes_bounded_by_revs(edges in edge_stream()) {
        let (mut conditioner, mut monitor) = MonitorBuilder::new().build().unwrap();

        let mut last_rev = 0u32;
        let mut last_stroke = 0u16;
        let mut last_distance = 0.0;
        for t in edges {
            conditioner.on_edge(t);
            monitor.update(t);

            let rev = monitor.rev_count();
            let stroke = monitor.stroke_count();
            let distance = monitor.distance_m();
            prop_assert!(rev >= last_rev);
            prop_assert!(stroke >= last_stroke);
            prop_assert!(distance >= last_distance);
            prop_assert!(u32::from(stroke) <= rev.max(1));
            last_rev = rev;
            last_stroke = stroke;
            last_distance = distance;
        }
    }

    /// With zero aggressiveness the cyclic filter is a bitwise identity
    /// pass-through, whatever it has been fed.
    #[test]
    fn zero_aggressiveness_filter_is_identity(
        values in prop::collection::vec(1_000.0..200_000.0_f64, 1..60)
    ) {
        let mut filter = CyclicErrorFilter::new(4, 10, 0.0, 20);
        filter.update_regression_coefficients(0.5, 100_000.0, 0.95);

        for (i, value) in values.iter().enumerate() {
            let value = *value as Precision;
            filter.record_raw_datapoint(i as u64, i as Precision, value);
            filter.process_next_raw_datapoint();
            filter.apply_filter(i as u64, value);
        }

        let len = filter.raw_series().len();
        for i in 0..len {
            prop_assert_eq!(filter.raw_series()[i], filter.clean_series()[i]);
        }
    }

    /// Equal positions modulo the slot count always see the same
    /// correction ratio, whatever state the filter has learned.
    #[test]
    fn same_slot_same_ratio(
        training in prop::collection::vec(50_000.0..150_000.0_f64, 24..48),
        probe in 50_000.0..150_000.0_f64,
        offset in 0u64..4,
    ) {
        let mut filter = CyclicErrorFilter::new(4, 10, 1.0, 12);
        filter.update_regression_coefficients(0.0, 100_000.0, 0.9);
        for (i, value) in training.iter().enumerate() {
            filter.record_raw_datapoint(i as u64, i as Precision, *value as Precision);
            filter.process_next_raw_datapoint();
        }

        let probe = probe as Precision;
        filter.apply_filter(offset, probe);
        let first = filter.clean_series().back() / probe;
        filter.apply_filter(offset + 8, probe);
        let second = filter.clean_series().back() / probe;
        prop_assert!((first - second).abs() <= first.abs() * 1e-12);
    }

    /// The rolling average of a uniform input is that input.
    #[test]
    fn series_average_of_uniform_input_is_the_input(
        value in -1.0e6..1.0e6_f64,
        len in 1usize..200,
    ) {
        let mut series = rower_core::series::Series::new(0);
        let value = value as Precision;
        for _ in 0..len {
            series.push(value);
        }
        let tolerance = value.abs() * 1e-9 + 1e-9;
        prop_assert!((series.average() - value).abs() <= tolerance);
    }

    /// The handle-force vector never exceeds its configured capacity.
    #[test]
    fn handle_forces_respect_capacity(edges in edge_stream()) {
        let mut settings = rower_core::Settings::default();
        settings.stroke.drive_handle_forces_max_capacity = 16;
        settings.stroke.minimum_powered_torque = 0.05;
        let (mut conditioner, mut monitor) = MonitorBuilder::new()
            .with_settings(settings)
            .build()
            .unwrap();

        for t in edges {
            conditioner.on_edge(t);
            monitor.update(t);
            prop_assert!(monitor.snapshot().handle_forces.len() <= 16);
        }
    }
}
