//! Grid search over a single parameter.
//!
//! Each candidate value is scored by re-running the strategy on a historical
//! window (the caller supplies that as a closure). The best finite score wins;
//! equal scores resolve to the earliest grid value, so results are identical
//! whether candidates run sequentially or on the rayon pool.

use crate::domain::error::WalkForwardError;
use crate::domain::parameter::ParameterSet;
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizationResult {
    pub value: f64,
    pub fitness: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationOutcome {
    pub parameter: String,
    pub previous: f64,
    pub selected: f64,
    /// Candidate scores in grid order.
    pub results: Vec<OptimizationResult>,
}

impl OptimizationOutcome {
    pub fn best_fitness(&self) -> Option<f64> {
        select_best(&self.results).map(|r| r.fitness)
    }
}

/// Highest finite fitness, first in grid order on ties. Falls back to the first
/// candidate when no score is finite, and to `None` for an empty slice.
pub fn select_best(results: &[OptimizationResult]) -> Option<&OptimizationResult> {
    let mut best: Option<&OptimizationResult> = None;
    for result in results.iter().filter(|r| r.fitness.is_finite()) {
        match best {
            Some(current) if current.fitness >= result.fitness => {}
            _ => best = Some(result),
        }
    }
    best.or_else(|| results.first())
}

/// Results sorted by descending fitness, non-finite last, grid order kept on ties.
pub fn rank(results: &[OptimizationResult]) -> Vec<OptimizationResult> {
    let mut ranked = results.to_vec();
    ranked.sort_by(|a, b| match (a.fitness.is_finite(), b.fitness.is_finite()) {
        (true, true) => b.fitness.total_cmp(&a.fitness),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    });
    ranked
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridOptimizer {
    pub parallel: bool,
}

impl GridOptimizer {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    /// Searches `name`'s grid and commits the winner as its operating value.
    ///
    /// Returns `Ok(None)` without touching anything when `name` is already
    /// enabled, i.e. when this call comes from inside a search of that same
    /// parameter. An empty grid keeps the previous value.
    pub fn optimize<F>(
        &self,
        params: &mut ParameterSet,
        name: &str,
        evaluate: F,
    ) -> Result<Option<OptimizationOutcome>, WalkForwardError>
    where
        F: Fn(&ParameterSet) -> f64 + Sync,
    {
        let spec = params
            .get(name)
            .ok_or_else(|| WalkForwardError::UnknownParameter {
                name: name.to_string(),
            })?;
        if spec.enabled {
            debug!(parameter = name, "already under optimization, skipping nested pass");
            return Ok(None);
        }
        let previous = spec.value;
        let grid = spec.grid();

        let mut scope = params.isolate(name)?;
        let results = self.evaluate_grid(&scope, name, &grid, &evaluate);
        let selected = select_best(&results).map_or(previous, |r| r.value);
        scope.set_value(name, selected)?;
        drop(scope);

        let outcome = OptimizationOutcome {
            parameter: name.to_string(),
            previous,
            selected,
            results,
        };
        info!(
            parameter = name,
            candidates = grid.len(),
            previous,
            selected,
            fitness = outcome.best_fitness().unwrap_or(f64::NAN),
            "optimization pass complete"
        );
        Ok(Some(outcome))
    }

    /// Scores every candidate of `name` without committing anything to `params`.
    pub fn scan<F>(
        &self,
        params: &ParameterSet,
        name: &str,
        evaluate: F,
    ) -> Result<Vec<OptimizationResult>, WalkForwardError>
    where
        F: Fn(&ParameterSet) -> f64 + Sync,
    {
        let mut scratch = params.clone();
        let scope = scratch.isolate(name)?;
        let grid = scope.get(name).map(|s| s.grid()).unwrap_or_default();
        Ok(self.evaluate_grid(&scope, name, &grid, &evaluate))
    }

    fn evaluate_grid<F>(
        &self,
        base: &ParameterSet,
        name: &str,
        grid: &[f64],
        evaluate: &F,
    ) -> Vec<OptimizationResult>
    where
        F: Fn(&ParameterSet) -> f64 + Sync,
    {
        let run = |&value: &f64| {
            let candidate = base.with_value(name, value);
            let fitness = evaluate(&candidate);
            debug!(parameter = name, value, fitness, "candidate scored");
            OptimizationResult { value, fitness }
        };
        if self.parallel {
            grid.par_iter().map(run).collect()
        } else {
            grid.iter().map(run).collect()
        }
    }
}
