//! Dependency leveling.
//!
//! A plan is compiled into levels: level N holds every step whose
//! dependencies all live in levels before N. Levels execute strictly in
//! order; steps within a level have no ordering guarantee.

use super::registry::ProcessorRegistry;
use super::spec::{PlanSpec, StepSpec};
use crate::errors::{CascadeError, CycleDetectedError};
use crate::processor::Processor;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A step bound to its processor.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    /// The step specification.
    pub spec: StepSpec,
    /// The processor that will execute it.
    pub processor: Arc<dyn Processor>,
}

/// A validated, leveled, processor-resolved plan ready for execution.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    name: String,
    levels: Vec<Vec<ResolvedStep>>,
}

impl ExecutionPlan {
    /// Builds an execution plan from a specification.
    ///
    /// Validates the spec, resolves every step kind against the registry,
    /// and levels the dependency graph. Unknown kinds and cycles are
    /// rejected here, before anything runs.
    pub fn build(spec: &PlanSpec, registry: &ProcessorRegistry) -> Result<Self, CascadeError> {
        spec.validate()?;

        let mut resolved: HashMap<String, ResolvedStep> = HashMap::new();
        for step in &spec.steps {
            let processor = registry.get(step.kind).ok_or_else(|| {
                CascadeError::MissingProcessor {
                    kind: step.kind.to_string(),
                    step: step.name.clone(),
                }
            })?;
            resolved.insert(
                step.name.clone(),
                ResolvedStep {
                    spec: step.clone(),
                    processor,
                },
            );
        }

        let levels = level_steps(spec)?;
        let levels = levels
            .into_iter()
            .map(|names| {
                names
                    .into_iter()
                    .filter_map(|name| resolved.get(&name).cloned())
                    .collect()
            })
            .collect();

        Ok(Self {
            name: spec.name.clone(),
            levels,
        })
    }

    /// Returns the plan name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the levels in execution order.
    #[must_use]
    pub fn levels(&self) -> &[Vec<ResolvedStep>] {
        &self.levels
    }

    /// Returns the total number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}

/// Levels the dependency graph with Kahn's algorithm.
///
/// Within a level, steps keep their declaration order so leveling is
/// deterministic.
fn level_steps(spec: &PlanSpec) -> Result<Vec<Vec<String>>, CascadeError> {
    let mut in_degree: HashMap<&str, usize> = spec
        .steps
        .iter()
        .map(|s| (s.name.as_str(), s.depends_on.len()))
        .collect();

    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for step in &spec.steps {
        for dep in &step.depends_on {
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(step.name.as_str());
        }
    }

    let mut levels: Vec<Vec<String>> = Vec::new();
    let mut placed: HashSet<&str> = HashSet::new();

    while placed.len() < spec.steps.len() {
        let ready: Vec<&str> = spec
            .steps
            .iter()
            .map(|s| s.name.as_str())
            .filter(|name| !placed.contains(name) && in_degree[name] == 0)
            .collect();

        if ready.is_empty() {
            let remaining: Vec<&str> = spec
                .steps
                .iter()
                .map(|s| s.name.as_str())
                .filter(|name| !placed.contains(name))
                .collect();
            return Err(find_cycle(spec, &remaining).into());
        }

        for name in &ready {
            placed.insert(*name);
            if let Some(children) = dependents.get(*name) {
                for child in children {
                    if let Some(count) = in_degree.get_mut(child) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }

        levels.push(ready.into_iter().map(String::from).collect());
    }

    Ok(levels)
}

/// Walks the remaining nodes to produce a concrete cycle path.
fn find_cycle(spec: &PlanSpec, remaining: &[&str]) -> CycleDetectedError {
    let deps: HashMap<&str, &HashSet<String>> = spec
        .steps
        .iter()
        .map(|s| (s.name.as_str(), &s.depends_on))
        .collect();
    let remaining_set: HashSet<&str> = remaining.iter().copied().collect();

    // Follow dependency edges from any remaining node until a node repeats.
    let Some(start) = remaining.first() else {
        return CycleDetectedError::new(Vec::new());
    };

    let mut path: Vec<&str> = vec![*start];
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(*start);

    let mut current = *start;
    loop {
        let next = deps
            .get(current)
            .and_then(|d| d.iter().find(|dep| remaining_set.contains(dep.as_str())));

        let Some(next) = next else {
            return CycleDetectedError::new(path.iter().map(|s| (*s).to_string()).collect());
        };

        if seen.contains(next.as_str()) {
            // Trim the lead-in so the path starts at the repeated node.
            let pos = path.iter().position(|n| *n == next.as_str()).unwrap_or(0);
            let mut cycle: Vec<String> = path[pos..].iter().map(|s| (*s).to_string()).collect();
            cycle.push(next.clone());
            return CycleDetectedError::new(cycle);
        }

        path.push(next.as_str());
        seen.insert(next.as_str());
        current = next.as_str();
    }
}
