//! Dependency-ordered spawn-wave helper (SPEC_FULL.md "Dependency-ordered
//! spawn waves"). Purely additive: spec.md does not define inter-agent
//! dependencies within a pool, and no required pool operation depends on
//! this module. Adapted from
//! `toka-orchestration::dependency::DependencyResolver::resolve_waves`,
//! simplified to a plain name/dependency graph over whatever identifiers a
//! caller's (excluded) configuration layer declares.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

/// Errors surfaced while resolving a spawn order.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpawnOrderError {
    /// The dependency graph contains a cycle; lists the stuck node names.
    #[error("circular dependency detected among: {0:?}")]
    Circular(Vec<String>),
    /// A node declared a dependency that isn't itself a node in the graph.
    #[error("'{0}' depends on unknown node '{1}'")]
    UnknownDependency(String, String),
}

/// Resolve `nodes` (name → its declared dependency names) into waves, where
/// every node in a wave has all its dependencies satisfied by an earlier
/// wave. Nodes with no dependencies form the first wave.
pub fn resolve_waves(
    nodes: &HashMap<String, HashSet<String>>,
) -> Result<Vec<Vec<String>>, SpawnOrderError> {
    for (name, deps) in nodes {
        for dep in deps {
            if !nodes.contains_key(dep) {
                return Err(SpawnOrderError::UnknownDependency(name.clone(), dep.clone()));
            }
        }
    }

    let mut waves = Vec::new();
    let mut completed: HashSet<String> = HashSet::new();
    let mut remaining: HashSet<String> = nodes.keys().cloned().collect();

    while !remaining.is_empty() {
        let mut wave: Vec<String> = remaining
            .iter()
            .filter(|name| nodes[*name].iter().all(|d| completed.contains(d)))
            .cloned()
            .collect();
        if wave.is_empty() {
            let mut stuck: Vec<String> = remaining.into_iter().collect();
            stuck.sort();
            return Err(SpawnOrderError::Circular(stuck));
        }
        wave.sort();
        for name in &wave {
            remaining.remove(name);
            completed.insert(name.clone());
        }
        waves.push(wave);
    }
    Ok(waves)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(pairs: &[(&str, &[&str])]) -> HashMap<String, HashSet<String>> {
        pairs
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn independent_nodes_form_one_wave() {
        let g = graph(&[("a", &[]), ("b", &[]), ("c", &[])]);
        let waves = resolve_waves(&g).unwrap();
        assert_eq!(waves.len(), 1);
        assert_eq!(waves[0].len(), 3);
    }

    #[test]
    fn chain_forms_one_wave_per_link() {
        let g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);
        let waves = resolve_waves(&g).unwrap();
        assert_eq!(waves, vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn diamond_parallelizes_middle_wave() {
        let g = graph(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("d", &["b", "c"]),
        ]);
        let waves = resolve_waves(&g).unwrap();
        assert_eq!(waves[0], vec!["a"]);
        assert_eq!(waves[1], vec!["b", "c"]);
        assert_eq!(waves[2], vec!["d"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let g = graph(&[("a", &["b"]), ("b", &["a"])]);
        assert!(matches!(resolve_waves(&g), Err(SpawnOrderError::Circular(_))));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let g = graph(&[("a", &["ghost"])]);
        assert!(matches!(
            resolve_waves(&g),
            Err(SpawnOrderError::UnknownDependency(_, _))
        ));
    }
}
