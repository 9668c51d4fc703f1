//! Resource Initializer: builds a set of named resources from declarative
//! definitions plus a dependency graph (spec.md §4.9).

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A built resource instance, type-erased so the initializer can hold
/// heterogeneous resources (embedders, stores, rerankers, ...) in one map.
/// Callers downcast via [`Any::downcast_ref`].
pub type Resource = Arc<dyn Any + Send + Sync>;

/// One entry of `{resource_id: {type, name, config}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Key into the builder registry (e.g. `"embedder"`, `"reranker"`).
    pub r#type: String,
    /// Human-facing name passed through to the builder (e.g. a model name).
    pub name: String,
    /// Builder-specific configuration.
    pub config: serde_json::Value,
}

/// Builds one resource type from its `name`/`config` and its already-built
/// dependencies.
pub trait Builder: Send + Sync {
    /// IDs of other resources this resource depends on, given its `name`
    /// and `config`. Referenced IDs must resolve to another definition in
    /// the same initializer call, or to a pre-populated cache entry.
    fn dependency_ids(&self, name: &str, config: &serde_json::Value) -> HashSet<String>;

    /// Build the resource, given its already-built `injections` keyed by
    /// dependency ID.
    fn build(
        &self,
        name: &str,
        config: &serde_json::Value,
        injections: &HashMap<String, Resource>,
    ) -> Result<Resource>;
}

/// Builds resources from declarative definitions and a registry mapping
/// each definition's `type` to the [`Builder`] that knows how to construct
/// it.
pub struct ResourceInitializer {
    builders: HashMap<String, Box<dyn Builder>>,
}

impl ResourceInitializer {
    /// Construct an initializer over a builder registry keyed by resource
    /// `type` string.
    #[must_use]
    pub fn new(builders: HashMap<String, Box<dyn Builder>>) -> Self {
        Self { builders }
    }

    fn builder_for(&self, definition: &ResourceDefinition) -> Result<&dyn Builder> {
        self.builders
            .get(&definition.r#type)
            .map(Box::as_ref)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown resource type: {}", definition.r#type)))
    }

    /// Build every resource in `resource_definitions`, in dependency order,
    /// seeding already-built resources from `resource_cache`. Returns only
    /// the newly built resources (not copies of `resource_cache`).
    pub fn initialize(
        &self,
        resource_definitions: &HashMap<String, ResourceDefinition>,
        resource_cache: &HashMap<String, Resource>,
    ) -> Result<HashMap<String, Resource>> {
        let mut dependency_graph = HashMap::with_capacity(resource_definitions.len());
        for (resource_id, definition) in resource_definitions {
            let builder = self.builder_for(definition)?;
            dependency_graph.insert(
                resource_id.clone(),
                builder.dependency_ids(&definition.name, &definition.config),
            );
        }

        let ordered = order_resources(&dependency_graph, resource_cache)?;

        let mut initialized: HashMap<String, Resource> = HashMap::new();
        for resource_id in ordered {
            if resource_cache.contains_key(&resource_id) {
                continue;
            }
            let definition = &resource_definitions[&resource_id];
            let builder = self.builder_for(definition)?;

            let mut injections: HashMap<String, Resource> = resource_cache.clone();
            injections.extend(initialized.clone());

            let built = builder.build(&definition.name, &definition.config, &injections)?;
            initialized.insert(resource_id, built);
        }

        Ok(initialized)
    }
}

/// Kahn's algorithm over `dependency_graph`, validating that every
/// dependency resolves to either another definition or a `resource_cache`
/// entry.
fn order_resources(
    dependency_graph: &HashMap<String, HashSet<String>>,
    resource_cache: &HashMap<String, Resource>,
) -> Result<Vec<String>> {
    let mut dependency_counts: HashMap<&str, usize> =
        dependency_graph.keys().map(|id| (id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, HashSet<&str>> =
        dependency_graph.keys().map(|id| (id.as_str(), HashSet::new())).collect();

    for (resource_id, dependency_ids) in dependency_graph {
        for dependency_id in dependency_ids {
            if !dependency_graph.contains_key(dependency_id)
                && !resource_cache.contains_key(dependency_id)
            {
                return Err(Error::UnresolvedDependency(format!(
                    "dependency {dependency_id} for resource {resource_id} found in neither resource definitions nor resource cache"
                )));
            }
            if dependency_graph.contains_key(dependency_id) {
                *dependency_counts.get_mut(resource_id.as_str()).unwrap() += 1;
                dependents
                    .get_mut(dependency_id.as_str())
                    .unwrap()
                    .insert(resource_id.as_str());
            }
        }
    }

    let mut queue: VecDeque<&str> = dependency_counts
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&id, _)| id)
        .collect();
    // Deterministic order among the initial zero-dependency set.
    let mut queue_sorted: Vec<&str> = queue.drain(..).collect();
    queue_sorted.sort_unstable();
    let mut queue: VecDeque<&str> = queue_sorted.into();

    let mut ordered = Vec::with_capacity(dependency_graph.len());
    while let Some(resource_id) = queue.pop_front() {
        ordered.push(resource_id.to_string());

        let mut newly_ready: Vec<&str> = Vec::new();
        for &dependent_id in &dependents[resource_id] {
            let count = dependency_counts.get_mut(dependent_id).unwrap();
            *count -= 1;
            if *count == 0 {
                newly_ready.push(dependent_id);
            }
        }
        newly_ready.sort_unstable();
        queue.extend(newly_ready);
    }

    if ordered.len() != dependency_graph.len() {
        let mut cyclic: Vec<String> = dependency_graph
            .keys()
            .filter(|id| !ordered.contains(id))
            .cloned()
            .collect();
        cyclic.sort();
        return Err(Error::CyclicDependency(cyclic));
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StringBuilder;

    impl Builder for StringBuilder {
        fn dependency_ids(&self, _name: &str, config: &serde_json::Value) -> HashSet<String> {
            config
                .get("depends_on")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default()
        }

        fn build(
            &self,
            name: &str,
            _config: &serde_json::Value,
            _injections: &HashMap<String, Resource>,
        ) -> Result<Resource> {
            Ok(Arc::new(name.to_string()))
        }
    }

    fn registry() -> HashMap<String, Box<dyn Builder>> {
        let mut map: HashMap<String, Box<dyn Builder>> = HashMap::new();
        map.insert("string".to_string(), Box::new(StringBuilder));
        map
    }

    fn definition(depends_on: &[&str]) -> ResourceDefinition {
        ResourceDefinition {
            r#type: "string".to_string(),
            name: "x".to_string(),
            config: serde_json::json!({ "depends_on": depends_on }),
        }
    }

    #[test]
    fn builds_in_dependency_order() {
        let mut defs = HashMap::new();
        defs.insert("a".to_string(), definition(&[]));
        defs.insert("b".to_string(), definition(&["a"]));
        defs.insert("c".to_string(), definition(&["b"]));

        let initializer = ResourceInitializer::new(registry());
        let built = initializer.initialize(&defs, &HashMap::new()).unwrap();
        assert_eq!(built.len(), 3);
        assert!(built.contains_key("c"));
    }

    #[test]
    fn unresolved_dependency_errors() {
        let mut defs = HashMap::new();
        defs.insert("a".to_string(), definition(&["missing"]));

        let initializer = ResourceInitializer::new(registry());
        let err = initializer.initialize(&defs, &HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedDependency(_)));
    }

    #[test]
    fn cyclic_dependency_errors() {
        let mut defs = HashMap::new();
        defs.insert("a".to_string(), definition(&["b"]));
        defs.insert("b".to_string(), definition(&["a"]));

        let initializer = ResourceInitializer::new(registry());
        let err = initializer.initialize(&defs, &HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency(_)));
    }

    #[test]
    fn resolves_against_pre_populated_cache() {
        let mut defs = HashMap::new();
        defs.insert("b".to_string(), definition(&["a"]));

        let mut cache: HashMap<String, Resource> = HashMap::new();
        cache.insert("a".to_string(), Arc::new("cached".to_string()));

        let initializer = ResourceInitializer::new(registry());
        let built = initializer.initialize(&defs, &cache).unwrap();
        assert_eq!(built.len(), 1);
        assert!(built.contains_key("b"));
    }
}
