//! Optimizable strategy parameters and their candidate grids.
//!
//! A [`ParameterSet`] is passed explicitly into the optimizer. The enabled flag
//! of a [`ParameterSpec`] marks the one parameter whose grid is being searched;
//! [`ParameterSet::isolate`] hands out a guard that restores every flag when it
//! goes out of scope.

use crate::domain::error::WalkForwardError;
use std::ops::{Deref, DerefMut};

/// Slack applied when counting grid steps so that `max` survives rounding.
const GRID_TOLERANCE: f64 = 1e-9;

/// Largest grid a single parameter may describe.
pub const MAX_GRID_POINTS: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub enabled: bool,
    /// Operating value used by forward simulation.
    pub value: f64,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, min: f64, max: f64, step: f64, value: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            step,
            enabled: false,
            value,
        }
    }

    /// Number of grid points, or `None` when the bounds or step cannot describe
    /// a finite grid of at most [`MAX_GRID_POINTS`] values.
    pub fn candidate_count(&self) -> Option<usize> {
        let valid = self.min.is_finite()
            && self.max.is_finite()
            && self.step.is_finite()
            && self.step > 0.0
            && self.min <= self.max;
        if !valid {
            return None;
        }
        let steps = ((self.max - self.min) / self.step + GRID_TOLERANCE).floor();
        (steps < MAX_GRID_POINTS as f64).then(|| steps as usize + 1)
    }

    /// `min, min + step, ...` up to and including `max`. Empty when
    /// [`candidate_count`](Self::candidate_count) is `None`.
    pub fn grid(&self) -> Vec<f64> {
        let Some(count) = self.candidate_count() else {
            return Vec::new();
        };
        (0..count)
            .map(|k| self.min + k as f64 * self.step)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    specs: Vec<ParameterSpec>,
}

impl ParameterSet {
    pub fn new(specs: Vec<ParameterSpec>) -> Self {
        Self { specs }
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).map(|s| s.value)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some_and(|s| s.enabled)
    }

    pub fn enabled_count(&self) -> usize {
        self.specs.iter().filter(|s| s.enabled).count()
    }

    pub fn set_value(&mut self, name: &str, value: f64) -> Result<(), WalkForwardError> {
        let idx = self.position(name)?;
        self.specs[idx].value = value;
        Ok(())
    }

    /// A copy of this set with `name` fixed at `value`.
    pub fn with_value(&self, name: &str, value: f64) -> Self {
        let mut copy = self.clone();
        if let Some(spec) = copy.specs.iter_mut().find(|s| s.name == name) {
            spec.value = value;
        }
        copy
    }

    /// Disables every spec except `name` until the returned scope is dropped.
    pub fn isolate(&mut self, name: &str) -> Result<IsolatedScope<'_>, WalkForwardError> {
        let target = self.position(name)?;
        let saved = self.specs.iter().map(|s| s.enabled).collect();
        for (i, spec) in self.specs.iter_mut().enumerate() {
            spec.enabled = i == target;
        }
        Ok(IsolatedScope { set: self, saved })
    }

    fn position(&self, name: &str) -> Result<usize, WalkForwardError> {
        self.specs
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| WalkForwardError::UnknownParameter {
                name: name.to_string(),
            })
    }
}

/// Exclusive access to a [`ParameterSet`] with exactly one spec enabled.
/// Dropping it restores the flags captured by [`ParameterSet::isolate`].
#[derive(Debug)]
pub struct IsolatedScope<'p> {
    set: &'p mut ParameterSet,
    saved: Vec<bool>,
}

impl Deref for IsolatedScope<'_> {
    type Target = ParameterSet;

    fn deref(&self) -> &ParameterSet {
        &*self.set
    }
}

impl DerefMut for IsolatedScope<'_> {
    fn deref_mut(&mut self) -> &mut ParameterSet {
        &mut *self.set
    }
}

impl Drop for IsolatedScope<'_> {
    fn drop(&mut self) {
        for (spec, &enabled) in self.set.specs.iter_mut().zip(&self.saved) {
            spec.enabled = enabled;
        }
    }
}
