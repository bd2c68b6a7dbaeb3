//! Scoring profiles.
//!
//! Both rubrics are configurations of the same engine:
//!
//! - **Non-negative**: result clamped to `[1, 100]`.
//! - **Signed**: adds `4 * virtue` and `-15 * strike`; a joke whose base
//!   score is under 20 is forced to at most `-10`. Clamped to `[-100, 100]`,
//!   or `[-50, 100]` in the conservative preset.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Result, ScoringError};

/// Minutes at which the logarithmic time curve reaches its top score.
pub const TIME_REFERENCE_MINUTES: u32 = 180;

/// Highest time score the curve may produce.
pub const MAX_TIME_SCORE: i32 = 5;

/// Per-dimension weights of the base score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub time: i32,
    pub skill: i32,
    pub physical: i32,
    pub stakes: i32,
    pub unpleasant: i32,
    pub rarity: i32,
}

/// Default weights: stakes and rarity dominate, time is compressed.
pub const DEFAULT_WEIGHTS: FactorWeights = FactorWeights {
    time: 3,
    skill: 6,
    physical: 3,
    stakes: 8,
    unpleasant: 2,
    rarity: 10,
};

/// Additive terms and the joke rule applied by signed profiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRules {
    /// Points per unit of `virtue`.
    pub virtue_weight: i32,
    /// Points subtracted per `strike` tier.
    pub strike_penalty: i32,
    /// Base scores below this make a joke net negative.
    pub joke_threshold: i32,
    /// Highest score a low-effort joke may receive.
    pub joke_ceiling: i32,
}

pub const DEFAULT_SIGNED_RULES: SignedRules = SignedRules {
    virtue_weight: 4,
    strike_penalty: 15,
    joke_threshold: 20,
    joke_ceiling: -10,
};

/// Named presets selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    #[default]
    NonNegative,
    Signed,
    SignedConservative,
}

impl ProfileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NonNegative => "non_negative",
            Self::Signed => "signed",
            Self::SignedConservative => "signed_conservative",
        }
    }

    /// The profile this preset names.
    pub fn profile(self) -> ScoringProfile {
        match self {
            Self::NonNegative => ScoringProfile::non_negative(),
            Self::Signed => ScoringProfile::signed(),
            Self::SignedConservative => ScoringProfile::signed_conservative(),
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "non_negative" => Ok(Self::NonNegative),
            "signed" => Ok(Self::Signed),
            "signed_conservative" => Ok(Self::SignedConservative),
            other => Err(ScoringError::InvalidProfile(format!(
                "unknown profile '{other}'"
            ))),
        }
    }
}

/// Complete configuration of the scoring engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringProfile {
    pub weights: FactorWeights,
    pub time_reference_minutes: u32,
    /// Lowest score the profile may return.
    pub floor: i32,
    /// Highest score the profile may return.
    pub ceiling: i32,
    /// `None` for non-negative profiles.
    pub signed: Option<SignedRules>,
}

impl ScoringProfile {
    pub fn non_negative() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            time_reference_minutes: TIME_REFERENCE_MINUTES,
            floor: 1,
            ceiling: 100,
            signed: None,
        }
    }

    pub fn signed() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            time_reference_minutes: TIME_REFERENCE_MINUTES,
            floor: -100,
            ceiling: 100,
            signed: Some(DEFAULT_SIGNED_RULES),
        }
    }

    pub fn signed_conservative() -> Self {
        Self {
            floor: -50,
            ..Self::signed()
        }
    }

    /// Check that the clamp range is usable and the joke rule fits inside it.
    ///
    /// # Errors
    ///
    /// - [`ScoringError::InvalidProfile`] if `floor > ceiling`, the reference
    ///   time is zero, a non-negative profile has a floor below 1, or a signed
    ///   profile's joke ceiling falls outside its range
    pub fn validate(&self) -> Result<()> {
        if self.floor > self.ceiling {
            return Err(ScoringError::InvalidProfile(format!(
                "floor {} exceeds ceiling {}",
                self.floor, self.ceiling
            )));
        }
        if self.time_reference_minutes == 0 {
            return Err(ScoringError::InvalidProfile(
                "time reference must be positive".to_string(),
            ));
        }
        match self.signed {
            None if self.floor < 1 => Err(ScoringError::InvalidProfile(format!(
                "non-negative profile floor {} is below 1",
                self.floor
            ))),
            Some(rules) if rules.joke_ceiling < self.floor || rules.joke_ceiling >= 0 => {
                Err(ScoringError::InvalidProfile(format!(
                    "joke ceiling {} must be negative and within [{}, {}]",
                    rules.joke_ceiling, self.floor, self.ceiling
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for ScoringProfile {
    fn default() -> Self {
        ProfileKind::default().profile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for kind in [
            ProfileKind::NonNegative,
            ProfileKind::Signed,
            ProfileKind::SignedConservative,
        ] {
            kind.profile().validate().expect("preset should be valid");
        }
    }

    #[test]
    fn test_conservative_only_raises_floor() {
        let signed = ScoringProfile::signed();
        let conservative = ScoringProfile::signed_conservative();
        assert_eq!(conservative.floor, -50);
        assert_eq!(conservative.ceiling, signed.ceiling);
        assert_eq!(conservative.signed, signed.signed);
    }

    #[test]
    fn test_invalid_profiles_rejected() {
        let inverted = ScoringProfile {
            floor: 10,
            ceiling: 5,
            ..ScoringProfile::non_negative()
        };
        assert!(inverted.validate().is_err());

        let zero_floor = ScoringProfile {
            floor: 0,
            ..ScoringProfile::non_negative()
        };
        assert!(zero_floor.validate().is_err());

        let joke_below_floor = ScoringProfile {
            floor: -5,
            ..ScoringProfile::signed()
        };
        assert!(joke_below_floor.validate().is_err());
    }

    #[test]
    fn test_profile_kind_labels() {
        assert_eq!(
            "signed_conservative".parse::<ProfileKind>().expect("parse"),
            ProfileKind::SignedConservative
        );
        assert_eq!(ProfileKind::default(), ProfileKind::NonNegative);
        assert!(matches!(
            "harsh".parse::<ProfileKind>(),
            Err(ScoringError::InvalidProfile(_))
        ));
    }
}
