//! Criterion scores and the overall score of a single evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// A single criterion rating, always within `MIN_SCORE..=MAX_SCORE`.
///
/// Out-of-range values cannot be constructed, so the scorer never sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub fn new(value: i64) -> Option<Self> {
        if (i64::from(MIN_SCORE)..=i64::from(MAX_SCORE)).contains(&value) {
            Some(Score(value as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Score::new(i64::from(value)).ok_or_else(|| {
            format!(
                "score {} is outside {}..={}",
                value, MIN_SCORE, MAX_SCORE
            )
        })
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed evaluation criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Criterion {
    Relevance,
    Quality,
    Innovation,
    Impact,
    Feasibility,
}

impl Criterion {
    pub const ALL: [Criterion; 5] = [
        Criterion::Relevance,
        Criterion::Quality,
        Criterion::Innovation,
        Criterion::Impact,
        Criterion::Feasibility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Relevance => "relevance",
            Criterion::Quality => "quality",
            Criterion::Innovation => "innovation",
            Criterion::Impact => "impact",
            Criterion::Feasibility => "feasibility",
        }
    }
}

/// One score per criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionScores {
    pub relevance: Score,
    pub quality: Score,
    pub innovation: Score,
    pub impact: Score,
    pub feasibility: Score,
}

impl CriterionScores {
    /// Build from raw values given in `Criterion::ALL` order.
    pub fn from_values(values: [i64; 5]) -> Option<Self> {
        Some(Self {
            relevance: Score::new(values[0])?,
            quality: Score::new(values[1])?,
            innovation: Score::new(values[2])?,
            impact: Score::new(values[3])?,
            feasibility: Score::new(values[4])?,
        })
    }

    pub fn get(&self, criterion: Criterion) -> Score {
        match criterion {
            Criterion::Relevance => self.relevance,
            Criterion::Quality => self.quality,
            Criterion::Innovation => self.innovation,
            Criterion::Impact => self.impact,
            Criterion::Feasibility => self.feasibility,
        }
    }

    /// Iterate as a criterion -> score mapping.
    pub fn iter(&self) -> impl Iterator<Item = (Criterion, Score)> + '_ {
        Criterion::ALL.into_iter().map(|c| (c, self.get(c)))
    }
}

/// Mean of the criterion scores, rounded half-up to the nearest integer.
///
/// 3.4 becomes 3 and 3.6 becomes 4. A mean of exactly .5 rounds up, which
/// cannot happen with five criteria but holds for any criteria count.
pub fn compute_overall_score(scores: &CriterionScores) -> Score {
    let (sum, count) = scores.iter().fold((0u32, 0u32), |(sum, count), (_, score)| {
        (sum + u32::from(score.get()), count + 1)
    });
    assert!(count > 0, "at least one criterion is required");

    // floor(sum / count + 1/2) without floating point
    let rounded = (2 * sum + count) / (2 * count);
    assert!(
        (u32::from(MIN_SCORE)..=u32::from(MAX_SCORE)).contains(&rounded),
        "overall score {} out of range",
        rounded
    );

    Score(rounded as u8)
}
