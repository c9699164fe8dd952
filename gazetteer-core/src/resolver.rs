//! Install ordering for sources whose views read other sources.
//!
//! A source depends on every other source named in its view's select items
//! or joins. [`resolve_order`] returns a topological order so each
//! dependency is installed before its dependants, breaking ties by name so
//! the order is reproducible.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::model::SourceConfig;

/// Errors raised while ordering sources.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolveError {
    /// Some sources depend on each other, directly or transitively.
    #[error("circular dependency detected among sources: {}", sources.join(", "))]
    CircularDependency {
        /// Names left unresolved, sorted.
        sources: Vec<String>,
    },
    /// A view references a source outside the input set.
    #[error("source {source_name:?} depends on unknown source {dependency:?}")]
    UnknownDependency {
        source_name: String,
        dependency: String,
    },
}

/// Order `sources` so that every source follows the sources its view reads.
///
/// Sources that become ready at the same time are emitted in ascending name
/// order.
///
/// # Errors
/// Returns [`ResolveError::UnknownDependency`] when a view references a name
/// that is not in `sources`, and [`ResolveError::CircularDependency`] naming
/// every source caught in or behind a cycle.
///
/// # Examples
/// ```
/// use gazetteer_core::{GazetteerConfig, resolve_order};
///
/// let config = GazetteerConfig::from_yaml_str(
///     r#"
/// name: demo
/// sources:
///   - name: cities
///     path: cities.tsv
///     file: cities.tsv
///     type: tabular
///     separator: "\t"
///     attributes:
///       original:
///         - { name: id, type: INTEGER }
///         - { name: country, type: TEXT }
///     view:
///       select:
///         - { source: cities, column: id }
///         - { source: countries, column: name }
///       join:
///         - { type: JOIN, source: countries, condition: cities.country = countries.iso }
///   - name: countries
///     path: countries.tsv
///     file: countries.tsv
///     type: tabular
///     separator: "\t"
///     attributes:
///       original:
///         - { name: iso, type: TEXT }
///         - { name: name, type: TEXT }
/// "#,
/// )
/// .expect("valid configuration");
/// let order: Vec<_> = resolve_order(config.sources())
///     .expect("acyclic")
///     .into_iter()
///     .map(|source| source.name())
///     .collect();
/// assert_eq!(order, ["countries", "cities"]);
/// ```
pub fn resolve_order(sources: &[SourceConfig]) -> Result<Vec<&SourceConfig>, ResolveError> {
    let by_name: BTreeMap<&str, &SourceConfig> = sources
        .iter()
        .map(|source| (source.name(), source))
        .collect();

    let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependants: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for source in sources {
        let dependencies = source.dependencies();
        for dependency in &dependencies {
            if !by_name.contains_key(dependency) {
                return Err(ResolveError::UnknownDependency {
                    source_name: source.name().to_owned(),
                    dependency: (*dependency).to_owned(),
                });
            }
            dependants.entry(*dependency).or_default().push(source.name());
        }
        pending.insert(source.name(), dependencies.len());
    }

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(sources.len());

    while let Some(name) = ready.pop_first() {
        if let Some(source) = by_name.get(name) {
            order.push(*source);
        }
        pending.remove(name);
        for dependant in dependants.get(name).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependant) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.insert(*dependant);
                }
            }
        }
    }

    if pending.is_empty() {
        log::debug!(
            "resolved install order: {}",
            order
                .iter()
                .map(|source| source.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(order)
    } else {
        Err(ResolveError::CircularDependency {
            sources: pending.into_keys().map(str::to_owned).collect(),
        })
    }
}
