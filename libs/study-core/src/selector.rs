//! Maximum-information question selection.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::algorithm::irt::{check_theta, fisher_information};
use crate::error::{Result, StudyError};
use crate::settings::{ReusePolicy, SelectorSettings};
use crate::types::Question;

/// Topics that must be visited before the remaining slots run out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageRequirement {
    pub required_topics: Vec<String>,
    /// Questions left in the sitting; `None` means always prefer unvisited
    /// required topics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_slots: Option<u32>,
}

impl CoverageRequirement {
    pub fn new(required_topics: Vec<String>, remaining_slots: Option<u32>) -> Self {
        Self {
            required_topics,
            remaining_slots,
        }
    }
}

struct Candidate<'a> {
    question: &'a Question,
    information: f64,
    exposure: u32,
}

/// Picks the next question for one learner.
#[derive(Debug, Clone, Default)]
pub struct QuestionSelector {
    settings: SelectorSettings,
    exposures: HashMap<String, u32>,
}

impl QuestionSelector {
    pub fn new(settings: SelectorSettings) -> Self {
        Self::with_exposures(settings, HashMap::new())
    }

    /// Resume with exposure counts from an earlier sitting.
    pub fn with_exposures(settings: SelectorSettings, exposures: HashMap<String, u32>) -> Self {
        Self { settings, exposures }
    }

    pub fn record_exposure(&mut self, question_id: &str) {
        *self.exposures.entry(question_id.to_string()).or_insert(0) += 1;
    }

    pub fn exposure_count(&self, question_id: &str) -> u32 {
        self.exposures.get(question_id).copied().unwrap_or(0)
    }

    pub fn exposures(&self) -> &HashMap<String, u32> {
        &self.exposures
    }

    /// Most informative eligible question at `theta`.
    ///
    /// Ties go to the least exposed question, then the smallest id.
    pub fn select_optimal_question<'a, I>(
        &self,
        theta: f64,
        pool: I,
        already_used: &HashSet<String>,
        coverage: Option<&CoverageRequirement>,
    ) -> Result<&'a Question>
    where
        I: IntoIterator<Item = &'a Question>,
    {
        let pool: Vec<&'a Question> = pool.into_iter().collect();
        let mut candidates = self.candidates(theta, &pool, already_used)?;

        if let Some(coverage) = coverage {
            let unvisited = unvisited_topics(&pool, already_used, coverage);
            let slots_tight = coverage
                .remaining_slots
                .map_or(true, |slots| slots as usize <= unvisited.len());
            if !unvisited.is_empty() && slots_tight {
                let covers = |c: &Candidate<'a>| unvisited.contains(c.question.topic_id.as_str());
                if candidates.iter().any(covers) {
                    candidates.retain(covers);
                } else {
                    tracing::warn!(
                        unvisited = unvisited.len(),
                        "no candidate covers a required topic, ignoring coverage"
                    );
                }
            }
        }

        candidates
            .into_iter()
            .min_by(|a, b| self.rank(a, b))
            .map(|c| c.question)
            .ok_or(StudyError::QuestionPoolExhausted { pool_size: pool.len() })
    }

    /// The `count` most informative eligible questions, best first.
    pub fn select_top_questions<'a, I>(
        &self,
        theta: f64,
        pool: I,
        already_used: &HashSet<String>,
        count: usize,
    ) -> Result<Vec<&'a Question>>
    where
        I: IntoIterator<Item = &'a Question>,
    {
        let pool: Vec<&'a Question> = pool.into_iter().collect();
        let mut candidates = self.candidates(theta, &pool, already_used)?;
        candidates.sort_by(|a, b| self.rank(a, b));
        Ok(candidates.into_iter().take(count).map(|c| c.question).collect())
    }

    fn candidates<'a>(
        &self,
        theta: f64,
        pool: &[&'a Question],
        already_used: &HashSet<String>,
    ) -> Result<Vec<Candidate<'a>>> {
        check_theta(theta)?;
        if pool.is_empty() {
            return Err(StudyError::EmptyCandidatePool);
        }

        let mut eligible: Vec<&'a Question> = pool
            .iter()
            .copied()
            .filter(|q| !already_used.contains(&q.id))
            .collect();
        if eligible.is_empty() {
            match self.settings.reuse_policy {
                ReusePolicy::Never => {
                    return Err(StudyError::QuestionPoolExhausted { pool_size: pool.len() });
                }
                ReusePolicy::AfterExhaustion => {
                    tracing::debug!(pool_size = pool.len(), "pool exhausted, reusing questions");
                    eligible = pool.to_vec();
                }
            }
        }

        eligible
            .into_iter()
            .map(|question| {
                Ok(Candidate {
                    question,
                    information: fisher_information(theta, &question.calibration)?,
                    exposure: self.exposure_count(&question.id),
                })
            })
            .collect()
    }

    fn rank(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
        b.information
            .total_cmp(&a.information)
            .then_with(|| a.exposure.cmp(&b.exposure))
            .then_with(|| a.question.id.cmp(&b.question.id))
    }
}

/// Required topics with no already-used question in the pool.
fn unvisited_topics<'c>(
    pool: &[&Question],
    already_used: &HashSet<String>,
    coverage: &'c CoverageRequirement,
) -> HashSet<&'c str> {
    let visited: HashSet<&str> = pool
        .iter()
        .filter(|q| already_used.contains(&q.id))
        .map(|q| q.topic_id.as_str())
        .collect();
    coverage
        .required_topics
        .iter()
        .map(String::as_str)
        .filter(|topic| !visited.contains(topic))
        .collect()
}
