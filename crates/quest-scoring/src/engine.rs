//! The scoring function.
//!
//! ```text
//! time  = clamp(round(5 * ln(1 + minutes) / ln(1 + 180)), 0, 5)
//! base  = 3*time + 6*skill + 3*physical + 8*stakes + 2*unpleasant + 10*rarity
//! score = clamp(base [+ signed terms], floor, ceiling)
//! ```
//!
//! No I/O and no state: identical factors and profile always give the same
//! score.

use quest_types::scoring::Factors;

use crate::profile::{ScoringProfile, MAX_TIME_SCORE};

/// Effort minutes accepted by the engine.
pub const MINUTES_RANGE: (u32, u32) = (1, 600);

/// Upper bound for the effort/importance dimensions.
pub const MAX_DIMENSION: u8 = 5;

/// Range of `virtue`.
pub const VIRTUE_RANGE: (i8, i8) = (-5, 5);

/// Upper bound for `strike`.
pub const MAX_STRIKE: u8 = 3;

/// Clamp every factor into its valid range.
pub fn clamp_factors(factors: &Factors) -> Factors {
    Factors {
        minutes: factors.minutes.clamp(MINUTES_RANGE.0, MINUTES_RANGE.1),
        skill: factors.skill.min(MAX_DIMENSION),
        physical: factors.physical.min(MAX_DIMENSION),
        stakes: factors.stakes.min(MAX_DIMENSION),
        unpleasant: factors.unpleasant.min(MAX_DIMENSION),
        rarity: factors.rarity.min(MAX_DIMENSION),
        virtue: factors.virtue.clamp(VIRTUE_RANGE.0, VIRTUE_RANGE.1),
        strike: factors.strike.min(MAX_STRIKE),
        is_joke: factors.is_joke,
    }
}

/// Logarithmic time score in `[0, 5]`.
///
/// Saturates around the reference duration; effort does not scale linearly
/// with time spent.
pub fn time_score(minutes: u32, reference_minutes: u32) -> i32 {
    let minutes = f64::from(minutes.clamp(MINUTES_RANGE.0, MINUTES_RANGE.1));
    let reference = f64::from(reference_minutes.max(1));
    let raw = (5.0 * (1.0 + minutes).ln() / (1.0 + reference).ln()).round();
    (raw as i32).clamp(0, MAX_TIME_SCORE)
}

/// Weighted sum of the clamped dimensions, before signed terms and clamping.
pub fn base_score(factors: &Factors, profile: &ScoringProfile) -> i32 {
    let f = clamp_factors(factors);
    let w = &profile.weights;
    w.time * time_score(f.minutes, profile.time_reference_minutes)
        + w.skill * i32::from(f.skill)
        + w.physical * i32::from(f.physical)
        + w.stakes * i32::from(f.stakes)
        + w.unpleasant * i32::from(f.unpleasant)
        + w.rarity * i32::from(f.rarity)
}

/// Score `factors` under `profile`. Always within `[profile.floor, profile.ceiling]`.
pub fn score(factors: &Factors, profile: &ScoringProfile) -> i32 {
    let f = clamp_factors(factors);
    let base = base_score(&f, profile);
    let mut total = base;

    if let Some(rules) = profile.signed {
        total += rules.virtue_weight * i32::from(f.virtue);
        total -= rules.strike_penalty * i32::from(f.strike);
        if f.is_joke && base < rules.joke_threshold {
            total = total.min(rules.joke_ceiling);
        }
    }

    total.clamp(profile.floor, profile.ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(minutes: u32, skill: u8, physical: u8, stakes: u8, unpleasant: u8, rarity: u8) -> Factors {
        Factors {
            minutes,
            skill,
            physical,
            stakes,
            unpleasant,
            rarity,
            ..Default::default()
        }
    }

    #[test]
    fn test_trivial_task_small_positive() {
        let xp = score(&factors(3, 0, 0, 0, 0, 0), &ScoringProfile::non_negative());
        assert!((1..=3).contains(&xp), "got {xp}");
    }

    #[test]
    fn test_stakes_and_rarity_dominate() {
        let xp = score(&factors(120, 3, 0, 4, 1, 2), &ScoringProfile::non_negative());
        assert!((70..=90).contains(&xp), "got {xp}");
        assert_eq!(xp, 87);
    }

    #[test]
    fn test_time_curve_monotonic_and_saturating() {
        let mut previous = 0;
        for minutes in 1..=600 {
            let t = time_score(minutes, 180);
            assert!(t >= previous, "time score dropped at {minutes} minutes");
            previous = t;
        }
        assert_eq!(time_score(180, 180), 5);
        assert_eq!(time_score(600, 180), time_score(10_000, 180));

        let profile = ScoringProfile::non_negative();
        assert_eq!(
            score(&factors(600, 2, 1, 1, 0, 0), &profile),
            score(&factors(10_000, 2, 1, 1, 0, 0), &profile)
        );
    }

    #[test]
    fn test_out_of_range_dimensions_clamped() {
        let profile = ScoringProfile::non_negative();
        assert_eq!(
            score(&factors(60, 9, 200, 7, 6, 5), &profile),
            score(&factors(60, 5, 5, 5, 5, 5), &profile)
        );
    }

    #[test]
    fn test_non_negative_never_below_one() {
        let profile = ScoringProfile::non_negative();
        assert!(score(&Factors::default(), &profile) >= 1);
        let mut joke = factors(1, 0, 0, 0, 0, 0);
        joke.is_joke = true;
        joke.strike = 3;
        joke.virtue = -5;
        assert!(score(&joke, &profile) >= 1);
    }

    #[test]
    fn test_non_negative_ceiling() {
        assert_eq!(
            score(&factors(600, 5, 5, 5, 5, 5), &ScoringProfile::non_negative()),
            100
        );
    }

    #[test]
    fn test_signed_virtue_and_strike() {
        let profile = ScoringProfile::signed();
        let plain = factors(60, 2, 0, 2, 0, 0);
        let base = score(&plain, &profile);

        let virtuous = Factors { virtue: 3, ..plain.clone() };
        assert_eq!(score(&virtuous, &profile), base + 12);

        let struck = Factors { strike: 2, ..plain };
        assert_eq!(score(&struck, &profile), base - 30);
    }

    #[test]
    fn test_signed_low_effort_joke_is_negative() {
        let profile = ScoringProfile::signed();
        let joke = Factors {
            minutes: 5,
            virtue: 5,
            is_joke: true,
            ..Default::default()
        };
        assert!(base_score(&joke, &profile) < 20);
        assert!(score(&joke, &profile) <= -10);
    }

    #[test]
    fn test_signed_substantial_joke_keeps_score() {
        let profile = ScoringProfile::signed();
        let joke = Factors {
            is_joke: true,
            ..factors(120, 3, 0, 4, 1, 2)
        };
        assert_eq!(score(&joke, &profile), 87);
    }

    #[test]
    fn test_signed_conservative_floor() {
        let worst = Factors {
            minutes: 1,
            virtue: -5,
            strike: 3,
            is_joke: true,
            ..Default::default()
        };
        assert_eq!(score(&worst, &ScoringProfile::signed()), -62);
        assert_eq!(score(&worst, &ScoringProfile::signed_conservative()), -50);
    }

    #[test]
    fn test_always_within_range() {
        let profiles = [
            ScoringProfile::non_negative(),
            ScoringProfile::signed(),
            ScoringProfile::signed_conservative(),
        ];
        for profile in &profiles {
            for minutes in [0, 1, 30, 600, u32::MAX] {
                for dim in [0u8, 3, 5, u8::MAX] {
                    for virtue in [i8::MIN, -5, 0, 5, i8::MAX] {
                        for strike in [0u8, 3, u8::MAX] {
                            for is_joke in [false, true] {
                                let f = Factors {
                                    minutes,
                                    skill: dim,
                                    physical: dim,
                                    stakes: dim,
                                    unpleasant: dim,
                                    rarity: dim,
                                    virtue,
                                    strike,
                                    is_joke,
                                };
                                let xp = score(&f, profile);
                                assert!(
                                    (profile.floor..=profile.ceiling).contains(&xp),
                                    "{xp} outside [{}, {}] for {f:?}",
                                    profile.floor,
                                    profile.ceiling
                                );
                                assert_eq!(xp, score(&f, profile));
                            }
                        }
                    }
                }
            }
        }
    }
}
