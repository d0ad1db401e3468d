use ldindex::{PairCoordinate, WindowError, WindowSpec, invert_index, pack_index};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

struct KnownCase {
    window: u64,
    step: u64,
    expected: &'static [(u64, u64, u64)],
}

const KNOWN_CASES: [KnownCase; 4] = [
    // Window one past the step.
    KnownCase {
        window: 4,
        step: 3,
        expected: &[
            (0, 1, 0),
            (0, 2, 0),
            (0, 3, 0),
            (0, 4, 0),
            (1, 2, 0),
            (1, 3, 0),
            (1, 4, 0),
            (2, 3, 0),
            (2, 4, 0),
            (0, 1, 1),
        ],
    },
    // Window much larger than the step.
    KnownCase {
        window: 5,
        step: 1,
        expected: &[
            (0, 1, 0),
            (0, 2, 0),
            (0, 3, 0),
            (0, 4, 0),
            (0, 5, 0),
            (0, 1, 1),
        ],
    },
    // Window equal to the step.
    KnownCase {
        window: 3,
        step: 3,
        expected: &[
            (0, 1, 0),
            (0, 2, 0),
            (0, 3, 0),
            (1, 2, 0),
            (1, 3, 0),
            (2, 3, 0),
            (0, 1, 1),
        ],
    },
    KnownCase {
        window: 1,
        step: 1,
        expected: &[(0, 1, 0), (0, 1, 1)],
    },
];

const PERIOD_SHIFTS: [u64; 4] = [1, 2, 20_000, 1_000_000_000_000];

#[test]
fn known_cases_invert_to_expected_pairs() {
    for case in &KNOWN_CASES {
        for (flat, &expected) in case.expected.iter().enumerate() {
            let actual = invert_index(flat as u64, case.window, case.step).unwrap();
            assert_eq!(
                actual, expected,
                "window={} step={} index={flat}",
                case.window, case.step
            );
        }
    }
}

#[test]
fn known_cases_are_periodic_beyond_32_bits() {
    for case in &KNOWN_CASES {
        let block = (case.expected.len() - 1) as u64;
        assert_eq!(
            WindowSpec::new(case.window, case.step).unwrap().block_size(),
            block
        );

        for (flat, &(i, j, period)) in case.expected.iter().enumerate() {
            for shift in PERIOD_SHIFTS {
                let shifted = flat as u64 + shift * block;
                assert!(shift < 1_000_000 || shifted > u64::from(u32::MAX));
                let actual = invert_index(shifted, case.window, case.step).unwrap();
                assert_eq!(
                    actual,
                    (i, j, period + shift),
                    "window={} step={} index={shifted}",
                    case.window,
                    case.step
                );
                assert_eq!(
                    pack_index(i, j, period + shift, case.window, case.step).unwrap(),
                    shifted
                );
            }
        }
    }
}

#[test]
fn random_specs_round_trip_and_stay_periodic() {
    let mut rng = StdRng::seed_from_u64(0x1D_0001);
    for _ in 0..200 {
        let window = rng.gen_range(1..=300u64);
        let step = rng.gen_range(1..=window);
        let spec = WindowSpec::new(window, step).unwrap();
        let block = spec.block_size();

        for _ in 0..50 {
            let flat = rng.gen_range(0..1u64 << 40);
            let coord = spec.invert(flat);

            assert!(coord.i < coord.j && coord.j <= window);
            assert!(coord.i < step.min(window));
            assert_eq!(spec.pack(coord).unwrap(), flat);

            for shift in PERIOD_SHIFTS {
                let shifted = spec.invert(flat + shift * block);
                assert_eq!(
                    shifted,
                    PairCoordinate {
                        period: coord.period + shift,
                        ..coord
                    }
                );
            }
        }
    }
}

#[test]
fn every_emittable_coordinate_packs_back() {
    let mut rng = StdRng::seed_from_u64(0x9AC4);
    for _ in 0..500 {
        let window = rng.gen_range(1..=10_000u64);
        let step = rng.gen_range(1..=window);
        let spec = WindowSpec::new(window, step).unwrap();

        let i = rng.gen_range(0..spec.rows_per_period());
        let j = rng.gen_range(i + 1..=window);
        let period = rng.gen_range(0..1u64 << 30);
        let coord = PairCoordinate { i, j, period };

        let flat = spec.pack(coord).unwrap();
        assert_eq!(spec.invert(flat), coord, "{spec}");
    }
}

#[test]
fn each_block_is_exactly_the_deferred_triangle() {
    for window in 1..=25u64 {
        for step in 1..=window {
            let spec = WindowSpec::new(window, step).unwrap();
            let m = step.min(window);
            assert_eq!(spec.block_size(), m * window - m * (m - 1) / 2);

            for period in [0u64, 7] {
                let range = spec.period_range(period).unwrap();
                let mut seen = HashSet::new();
                for flat in range {
                    let coord = spec.invert(flat);
                    assert_eq!(coord.period, period);
                    assert!(seen.insert((coord.i, coord.j)), "duplicate {coord}");
                }

                let expected: HashSet<(u64, u64)> = (0..m)
                    .flat_map(|i| (i + 1..=window).map(move |j| (i, j)))
                    .collect();
                assert_eq!(seen, expected, "window={window} step={step}");
            }
        }
    }
}

#[test]
fn block_pairs_follow_flat_order() {
    let spec = WindowSpec::new(9, 4).unwrap();
    let range = spec.period_range(3).unwrap();
    let from_flat: Vec<_> = range.map(|flat| spec.invert(flat)).collect();
    let from_block: Vec<_> = spec.block_pairs(3).collect();
    assert_eq!(from_flat, from_block);
}

#[test]
fn overlapping_periods_never_repeat_an_absolute_pair() {
    let spec = WindowSpec::new(6, 2).unwrap();
    let mut seen = HashSet::new();
    for flat in 0..spec.block_size() * 50 {
        let pair = spec.invert(flat).absolute(&spec).unwrap();
        assert!(seen.insert(pair), "{pair:?} emitted twice");
    }
}

#[test]
fn largest_flat_index_inverts_without_wrapping() {
    let spec = WindowSpec::new(1_000, 10).unwrap();
    let coord = spec.invert(u64::MAX);
    assert_eq!(coord.period, u64::MAX / spec.block_size());
    assert_eq!(spec.pack(coord).unwrap(), u64::MAX);

    let next_period = PairCoordinate {
        period: coord.period + 1,
        ..coord
    };
    assert_eq!(
        spec.pack(next_period),
        Err(WindowError::Overflow("flat index"))
    );
}
