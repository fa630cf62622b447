//! Majority-vote aggregation of internal model predictions

use crate::types::ModelRun;
use std::collections::{HashMap, HashSet};

/// Ensemble decision for one sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsembleVote {
    pub id: String,
    /// Number of internal models that predicted AMP
    pub vote_sum: u32,
    /// 1 iff more than half of the voting models predicted AMP
    pub prediction: u8,
}

/// Combines internal model runs into one decision per sequence.
///
/// External runs are ignored. The majority threshold is taken over the number
/// of internal runs supplied, so a requested model that failed entirely does
/// not count. A run without a row for some ID simply didn't vote on it, and
/// a repeated ID within one run votes once, with its first row.
#[derive(Debug, Default)]
pub struct EnsembleAggregator;

impl EnsembleAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Votes for every ID seen in any internal run, in first-seen order
    pub fn aggregate<'a, I>(&self, runs: I) -> Vec<EnsembleVote>
    where
        I: IntoIterator<Item = &'a ModelRun>,
    {
        let mut order: Vec<&'a str> = Vec::new();
        let mut sums: HashMap<&'a str, u32> = HashMap::new();
        let mut voters = 0usize;

        for run in runs.into_iter().filter(|r| r.key.is_internal()) {
            voters += 1;
            let mut voted: HashSet<&'a str> = HashSet::with_capacity(run.results.len());
            for result in &run.results {
                if !voted.insert(result.id.as_str()) {
                    continue;
                }
                let sum = sums.entry(result.id.as_str()).or_insert_with(|| {
                    order.push(result.id.as_str());
                    0
                });
                *sum += u32::from(result.prediction);
            }
        }

        order
            .into_iter()
            .map(|id| {
                let vote_sum = sums[id];
                EnsembleVote {
                    id: id.to_string(),
                    vote_sum,
                    prediction: Self::majority(vote_sum, voters),
                }
            })
            .collect()
    }

    /// Strict majority; an exact half resolves to non-AMP
    pub fn majority(vote_sum: u32, voters: usize) -> u8 {
        u8::from(2 * vote_sum as usize > voters)
    }

    /// Number of runs that take part in the vote
    pub fn voter_count<'a, I>(runs: I) -> usize
    where
        I: IntoIterator<Item = &'a ModelRun>,
    {
        runs.into_iter().filter(|r| r.key.is_internal()).count()
    }
}
