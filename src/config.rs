use serde::{Deserialize, Serialize};

/// Number of distinct courses a student needs before an annual average is
/// computed.
pub const DEFAULT_REQUIRED_COURSES: usize = 10;

/// How a qualification captured without a rating enters the daily average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingRatingPolicy {
    /// A missing rating counts as a 0.
    #[default]
    Zero,
    /// A missing rating is left out of the mean.
    Exclude,
}

impl MissingRatingPolicy {
    pub fn normalize(self, rating: Option<f64>) -> Option<f64> {
        match self {
            MissingRatingPolicy::Zero => Some(rating.unwrap_or(0.0)),
            MissingRatingPolicy::Exclude => rating,
        }
    }
}

/// Business settings read from Rocket's figment (`Rocket.toml` or
/// `ROCKET_REQUIRED_COURSES` / `ROCKET_MISSING_RATING_POLICY`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicConfig {
    #[serde(default = "default_required_courses")]
    pub required_courses: usize,
    #[serde(default)]
    pub missing_rating_policy: MissingRatingPolicy,
}

fn default_required_courses() -> usize {
    DEFAULT_REQUIRED_COURSES
}

impl Default for AcademicConfig {
    fn default() -> Self {
        Self {
            required_courses: DEFAULT_REQUIRED_COURSES,
            missing_rating_policy: MissingRatingPolicy::default(),
        }
    }
}
