// src/recipe/graph.rs

//! Recipe set and build ordering
//!
//! A [`RecipeGraph`] holds several recipes (for example libde265, x265 and
//! libheif) and orders them so every recipe is cooked after the recipes it
//! depends on. Only dependencies that are themselves in the set become edges;
//! everything else is left to the kitchen's dependency probe.
//!
//! Recipes with no path between them land in the same *wave* and may be
//! cooked concurrently.
//!
//! ```ignore
//! let mut graph = RecipeGraph::new();
//! graph.insert(libheif)?;
//! graph.insert(libde265)?;
//! let waves = graph.waves()?;
//! // [["libde265"], ["libheif"]]
//! ```

use crate::error::{Error, Result};
use crate::recipe::format::DependencyScope;
use crate::recipe::model::Recipe;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A set of recipes keyed by package name
#[derive(Debug, Default, Clone)]
pub struct RecipeGraph {
    recipes: BTreeMap<String, Recipe>,
}

impl RecipeGraph {
    /// Create a new empty recipe graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipe; a second recipe with the same name is rejected
    pub fn insert(&mut self, recipe: Recipe) -> Result<()> {
        if self.recipes.contains_key(recipe.name()) {
            return Err(Error::DuplicateRecipe(recipe.name().to_string()));
        }
        self.recipes.insert(recipe.name().to_string(), recipe);
        Ok(())
    }

    /// Number of recipes in the graph
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Look up a recipe by name
    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.recipes.get(name)
    }

    /// Names of the in-set recipes `name` depends on (any scope)
    pub fn dependencies(&self, name: &str) -> BTreeSet<&str> {
        self.recipes
            .get(name)
            .map(|recipe| {
                recipe
                    .dependencies()
                    .iter()
                    .map(|d| d.name.as_str())
                    .filter(|dep| self.recipes.contains_key(*dep) && *dep != name)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Recipes grouped into waves; each wave only depends on earlier waves
    pub fn waves(&self) -> Result<Vec<Vec<&Recipe>>> {
        let mut remaining: BTreeMap<&str, BTreeSet<&str>> = self
            .recipes
            .keys()
            .map(|name| (name.as_str(), self.dependencies(name)))
            .collect();

        let mut waves = Vec::new();
        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(name, _)| *name)
                .collect();

            if ready.is_empty() {
                return Err(Error::DependencyCycle(self.find_cycle(&remaining)));
            }

            for name in &ready {
                remaining.remove(name);
            }
            for deps in remaining.values_mut() {
                for name in &ready {
                    deps.remove(name);
                }
            }

            waves.push(ready.iter().map(|name| &self.recipes[*name]).collect());
        }

        Ok(waves)
    }

    /// Recipes in build order (dependencies before dependents)
    pub fn topological_order(&self) -> Result<Vec<&Recipe>> {
        Ok(self.waves()?.into_iter().flatten().collect())
    }

    /// Transitive runtime dependencies of `name`
    ///
    /// Build-only edges are not followed. Dependencies outside the set are
    /// included by name but cannot be expanded further.
    pub fn runtime_closure(&self, name: &str) -> BTreeSet<String> {
        let mut closure = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([name]);

        while let Some(current) = queue.pop_front() {
            let Some(recipe) = self.recipes.get(current) else {
                continue;
            };
            for dep in recipe.dependencies() {
                if dep.scope != DependencyScope::Runtime || dep.name == name {
                    continue;
                }
                if closure.insert(dep.name.clone()) {
                    queue.push_back(dep.name.as_str());
                }
            }
        }

        closure
    }

    /// Walk the stuck subgraph until a node repeats
    fn find_cycle(&self, stuck: &BTreeMap<&str, BTreeSet<&str>>) -> Vec<String> {
        let Some(start) = stuck.keys().next() else {
            return Vec::new();
        };

        let mut path: Vec<&str> = vec![start];
        let mut current = *start;
        loop {
            let Some(next) = stuck.get(current).and_then(|deps| deps.iter().next()) else {
                return path.iter().map(|s| s.to_string()).collect();
            };
            if let Some(pos) = path.iter().position(|n| n == next) {
                let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
                cycle.push(next.to_string());
                return cycle;
            }
            path.push(next);
            current = next;
        }
    }
}
