//! Conversions between the theta scale and human-facing numbers.

use serde::{Deserialize, Serialize};

use super::irt::{check_theta, THETA_MAX, THETA_MIN};
use crate::error::{Result, StudyError};

/// Linear map of [THETA_MIN, THETA_MAX] onto [0, 100].
pub fn theta_to_percentage(theta: f64) -> Result<f64> {
    let theta = check_theta(theta)?;
    Ok((theta - THETA_MIN) / (THETA_MAX - THETA_MIN) * 100.0)
}

/// Inverse of [`theta_to_percentage`].
pub fn percentage_to_theta(percentage: f64) -> Result<f64> {
    if !(0.0..=100.0).contains(&percentage) {
        return Err(StudyError::InvalidPercentage(percentage));
    }
    Ok(THETA_MIN + percentage / 100.0 * (THETA_MAX - THETA_MIN))
}

/// Population percentile of `theta` under a standard normal ability
/// distribution.
pub fn theta_to_percentile(theta: f64) -> Result<f64> {
    let theta = check_theta(theta)?;
    Ok(50.0 * (1.0 + erf(theta / std::f64::consts::SQRT_2)))
}

/// Abramowitz & Stegun 7.1.26, max absolute error 1.5e-7.
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// One labelled ability band, covering `[lower_bound, next band's bound)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityBand {
    pub level: String,
    pub description: String,
    pub lower_bound: f64,
}

impl AbilityBand {
    pub fn new(level: impl Into<String>, description: impl Into<String>, lower_bound: f64) -> Self {
        Self {
            level: level.into(),
            description: description.into(),
            lower_bound,
        }
    }
}

/// Ordered, gap-free partition of the theta scale into bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityBands(Vec<AbilityBand>);

impl Default for AbilityBands {
    fn default() -> Self {
        Self(vec![
            AbilityBand::new("Beginner", "Foundation building needed", THETA_MIN),
            AbilityBand::new("Developing", "Making progress", -2.0),
            AbilityBand::new("Competent", "Approaching average", -1.0),
            AbilityBand::new("Proficient", "Above average", 0.0),
            AbilityBand::new("Advanced", "Strong performance", 1.0),
            AbilityBand::new("Expert", "Exceptional ability", 2.0),
        ])
    }
}

impl AbilityBands {
    pub fn new(bands: Vec<AbilityBand>) -> Result<Self> {
        let bands = Self(bands);
        bands.validate()?;
        Ok(bands)
    }

    /// Every theta in range must land in exactly one band.
    pub fn validate(&self) -> Result<()> {
        let first = self
            .0
            .first()
            .ok_or_else(|| StudyError::InvalidConfig("ability bands are empty".to_string()))?;
        if !(first.lower_bound <= THETA_MIN) {
            return Err(StudyError::InvalidConfig(format!(
                "first ability band starts at {} above {}",
                first.lower_bound, THETA_MIN
            )));
        }
        for pair in self.0.windows(2) {
            if !(pair[1].lower_bound > pair[0].lower_bound) {
                return Err(StudyError::InvalidConfig(format!(
                    "ability band '{}' does not start above '{}'",
                    pair[1].level, pair[0].level
                )));
            }
        }
        Ok(())
    }

    pub fn bands(&self) -> &[AbilityBand] {
        &self.0
    }
}

/// The band `theta` falls in.
pub fn get_ability_level(theta: f64, bands: &AbilityBands) -> Result<&AbilityBand> {
    let theta = check_theta(theta)?;
    bands
        .0
        .iter()
        .rev()
        .find(|band| band.lower_bound <= theta)
        .ok_or_else(|| StudyError::InvalidConfig(format!("no ability band covers theta {}", theta)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_round_trips() {
        let mut theta = THETA_MIN;
        while theta <= THETA_MAX {
            let back = percentage_to_theta(theta_to_percentage(theta).unwrap()).unwrap();
            assert!((back - theta).abs() < 1e-9);
            theta += 0.1;
        }
    }

    #[test]
    fn percentage_endpoints() {
        assert_eq!(theta_to_percentage(THETA_MIN).unwrap(), 0.0);
        assert_eq!(theta_to_percentage(0.0).unwrap(), 50.0);
        assert_eq!(theta_to_percentage(THETA_MAX).unwrap(), 100.0);
        assert!(matches!(
            percentage_to_theta(101.0),
            Err(StudyError::InvalidPercentage(_))
        ));
    }

    #[test]
    fn percentile_is_monotonic_and_centred() {
        assert!((theta_to_percentile(0.0).unwrap() - 50.0).abs() < 1e-6);
        assert!((theta_to_percentile(1.0).unwrap() - 84.13).abs() < 0.01);
        let mut previous = theta_to_percentile(THETA_MIN).unwrap();
        let mut theta = THETA_MIN + 0.25;
        while theta <= THETA_MAX {
            let current = theta_to_percentile(theta).unwrap();
            assert!(current > previous);
            previous = current;
            theta += 0.25;
        }
    }

    #[test]
    fn default_bands_cover_every_theta() {
        let bands = AbilityBands::default();
        assert!(bands.validate().is_ok());
        assert_eq!(get_ability_level(THETA_MIN, &bands).unwrap().level, "Beginner");
        assert_eq!(get_ability_level(-0.5, &bands).unwrap().level, "Competent");
        assert_eq!(get_ability_level(0.0, &bands).unwrap().level, "Proficient");
        assert_eq!(get_ability_level(THETA_MAX, &bands).unwrap().level, "Expert");
    }

    #[test]
    fn custom_bands_must_be_ordered_and_total() {
        let gap = AbilityBands::new(vec![AbilityBand::new("Average", "", -1.0)]);
        assert!(gap.is_err());

        let unordered = AbilityBands::new(vec![
            AbilityBand::new("Needs Work", "", THETA_MIN),
            AbilityBand::new("Excellent", "", 1.0),
            AbilityBand::new("Average", "", 0.0),
        ]);
        assert!(unordered.is_err());

        let bands = AbilityBands::new(vec![
            AbilityBand::new("Needs Work", "", THETA_MIN),
            AbilityBand::new("Average", "", -1.0),
            AbilityBand::new("Excellent", "", 1.5),
        ])
        .unwrap();
        assert_eq!(get_ability_level(1.49, &bands).unwrap().level, "Average");
        assert_eq!(get_ability_level(1.5, &bands).unwrap().level, "Excellent");
    }

    #[test]
    fn bands_deserialize_from_plain_list() {
        let bands: AbilityBands = serde_json::from_str(
            r#"[{"level":"Low","description":"","lower_bound":-4.0},
                {"level":"High","description":"","lower_bound":0.0}]"#,
        )
        .unwrap();
        assert_eq!(bands.bands().len(), 2);
        assert!(bands.validate().is_ok());
    }
}
