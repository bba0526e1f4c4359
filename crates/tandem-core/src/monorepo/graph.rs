//! Dependency graph for monorepo packages
//!
//! The graph is an arena of [`PackageNode`]s addressed by name or by
//! declaration index. Edges `A -> B` mean "A depends on B" and only ever
//! connect packages present in the arena.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::error::{Result, ValidationError};
use crate::types::GraphType;

use super::manifest::DependencyKind;
use super::package::{LocalDependency, LocalSpec, PackageNode};
use super::specifier::{normalize_path, range_matches, Specifier};

/// Dependency graph for workspace packages
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Nodes in declaration order
    nodes: Vec<PackageNode>,
    /// Name to arena index
    index: HashMap<String, usize>,
    /// `dependencies[a]` holds every `b` with an edge `a -> b`
    dependencies: Vec<Vec<usize>>,
    /// Reverse edges
    dependents: Vec<Vec<usize>>,
    /// Which dependency fields produced edges
    graph_type: GraphType,
}

impl DependencyGraph {
    /// Build a graph from package nodes, resolving sibling links
    pub fn build(nodes: Vec<PackageNode>, graph_type: GraphType) -> Result<Self> {
        let mut index = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.name().to_string(), i).is_some() {
                return Err(ValidationError::DuplicatePackage(node.name().to_string()).into());
            }
        }

        let mut graph = Self {
            dependencies: vec![Vec::new(); nodes.len()],
            dependents: vec![Vec::new(); nodes.len()],
            nodes,
            index,
            graph_type,
        };

        for i in 0..graph.nodes.len() {
            let locals = graph.resolve_local_dependencies(i);
            for dep in &locals {
                if !graph.creates_edge(dep.kind) {
                    continue;
                }
                let Some(&target) = graph.index.get(&dep.name) else {
                    continue;
                };
                if !graph.dependencies[i].contains(&target) {
                    graph.dependencies[i].push(target);
                    graph.dependents[target].push(i);
                }
            }
            graph.nodes[i].set_local_dependencies(locals);
        }

        debug!(
            packages = graph.nodes.len(),
            edges = graph.dependencies.iter().map(Vec::len).sum::<usize>(),
            "dependency graph built"
        );
        Ok(graph)
    }

    fn creates_edge(&self, kind: DependencyKind) -> bool {
        match kind {
            DependencyKind::Regular | DependencyKind::Optional => true,
            DependencyKind::Dev => self.graph_type == GraphType::All,
            DependencyKind::Peer => false,
        }
    }

    fn resolve_local_dependencies(&self, i: usize) -> Vec<LocalDependency> {
        let node = &self.nodes[i];
        let mut locals = Vec::new();

        for kind in DependencyKind::ALL {
            for (name, raw) in node.manifest().dependencies(kind) {
                if name == node.name() {
                    continue;
                }
                let Some(&target) = self.index.get(&name) else {
                    continue;
                };
                let sibling = &self.nodes[target];

                let spec = match Specifier::parse(&raw) {
                    Specifier::Directory(path) => {
                        let resolved = normalize_path(&node.location().join(path));
                        if resolved != normalize_path(sibling.location()) {
                            debug!(
                                package = node.name(),
                                dependency = %name,
                                spec = %raw,
                                "relative specifier does not point at the sibling, keeping as-is"
                            );
                            continue;
                        }
                        LocalSpec::Directory
                    }
                    Specifier::Workspace(range) => LocalSpec::Workspace(range),
                    Specifier::Range(range) => match sibling.version() {
                        Some(version) if range_matches(&range, version) => LocalSpec::Range,
                        _ => {
                            warn!(
                                package = node.name(),
                                dependency = %name,
                                spec = %raw,
                                "range does not satisfy the local version, treating as external"
                            );
                            continue;
                        }
                    },
                    Specifier::Other(_) => continue,
                };

                locals.push(LocalDependency {
                    name,
                    kind,
                    raw,
                    spec,
                });
            }
        }

        locals
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no packages
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edge selection used to build this graph
    pub fn graph_type(&self) -> GraphType {
        self.graph_type
    }

    /// Packages in declaration order
    pub fn packages(&self) -> impl Iterator<Item = &PackageNode> {
        self.nodes.iter()
    }

    /// Check if a package exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declaration index of a package
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Look up a package
    pub fn get(&self, name: &str) -> Option<&PackageNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Mutable access to a package; mutations go through its setters
    pub fn get_mut(&mut self, name: &str) -> Option<&mut PackageNode> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.nodes[i]),
            None => None,
        }
    }

    /// Direct dependencies of a package that are in the graph
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.index_of(name)
            .map(|i| {
                self.dependencies[i]
                    .iter()
                    .map(|&d| self.nodes[d].name())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Direct dependents of a package
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.index_of(name)
            .map(|i| {
                self.dependents[i]
                    .iter()
                    .map(|&d| self.nodes[d].name())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The given packages plus everything that transitively depends on them,
    /// in declaration order
    pub fn with_dependents(&self, names: &[String]) -> Vec<String> {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut queue: VecDeque<usize> = names.iter().filter_map(|n| self.index_of(n)).collect();

        while let Some(i) = queue.pop_front() {
            if seen.insert(i) {
                queue.extend(self.dependents[i].iter().copied());
            }
        }

        let mut affected: Vec<usize> = seen.into_iter().collect();
        affected.sort_unstable();
        affected
            .into_iter()
            .map(|i| self.nodes[i].name().to_string())
            .collect()
    }

    /// Edges restricted to `names`, as `(name, dependencies)` pairs in the
    /// order `names` were given
    pub fn induced_edges(&self, names: &[String]) -> Vec<(String, Vec<String>)> {
        let selected: HashSet<usize> = names.iter().filter_map(|n| self.index_of(n)).collect();
        names
            .iter()
            .filter_map(|name| {
                let i = self.index_of(name)?;
                let deps = self.dependencies[i]
                    .iter()
                    .filter(|d| selected.contains(d))
                    .map(|&d| self.nodes[d].name().to_string())
                    .collect();
                Some((name.clone(), deps))
            })
            .collect()
    }

    /// All package names, dependencies before dependents.
    ///
    /// Uses Kahn's algorithm with a queue seeded in declaration order.
    /// When only cycles remain, one member of a cycle that waits on
    /// nothing outside itself is released, then sorting resumes.
    pub fn topological_order(&self) -> Vec<String> {
        let count = self.nodes.len();
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut queued = vec![false; count];
        let mut placed = vec![false; count];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for i in 0..count {
            if in_degree[i] == 0 {
                queued[i] = true;
                queue.push_back(i);
            }
        }
        let components = component_ids(&self.dependencies);
        let mut sorted = Vec::with_capacity(count);

        while sorted.len() < count {
            let Some(i) = queue.pop_front() else {
                match cycle_release(&self.dependencies, &components, &queued) {
                    Some(i) => {
                        queued[i] = true;
                        queue.push_back(i);
                        continue;
                    }
                    None => break,
                }
            };
            sorted.push(i);
            placed[i] = true;
            for &dependent in &self.dependents[i] {
                in_degree[dependent] = in_degree[dependent].saturating_sub(1);
                if in_degree[dependent] == 0 && !queued[dependent] {
                    queued[dependent] = true;
                    queue.push_back(dependent);
                }
            }
        }

        sorted.extend((0..count).filter(|&i| !placed[i]));
        sorted
            .into_iter()
            .map(|i| self.nodes[i].name().to_string())
            .collect()
    }

    /// Dependency cycles, each as its members in declaration order
    pub fn cycles(&self) -> Vec<Vec<String>> {
        strongly_connected(&self.dependencies)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                component
                    .into_iter()
                    .map(|i| self.nodes[i].name().to_string())
                    .collect()
            })
            .collect()
    }

    /// Check if the graph has any cycles
    pub fn has_cycles(&self) -> bool {
        !self.cycles().is_empty()
    }
}

/// Strongly connected components of an adjacency list (Tarjan).
///
/// Each component is sorted by index; components are ordered by their
/// smallest member.
pub fn strongly_connected(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    struct State<'a> {
        adjacency: &'a [Vec<usize>],
        counter: usize,
        index: Vec<Option<usize>>,
        lowlink: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        components: Vec<Vec<usize>>,
    }

    fn visit(state: &mut State<'_>, v: usize) {
        state.index[v] = Some(state.counter);
        state.lowlink[v] = state.counter;
        state.counter += 1;
        state.stack.push(v);
        state.on_stack[v] = true;

        for &w in &state.adjacency[v] {
            match state.index[w] {
                None => {
                    visit(state, w);
                    state.lowlink[v] = state.lowlink[v].min(state.lowlink[w]);
                }
                Some(w_index) if state.on_stack[w] => {
                    state.lowlink[v] = state.lowlink[v].min(w_index);
                }
                Some(_) => {}
            }
        }

        if Some(state.lowlink[v]) == state.index[v] {
            let mut component = Vec::new();
            while let Some(w) = state.stack.pop() {
                state.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            component.sort_unstable();
            state.components.push(component);
        }
    }

    let n = adjacency.len();
    let mut state = State {
        adjacency,
        counter: 0,
        index: vec![None; n],
        lowlink: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        components: Vec::new(),
    };
    for v in 0..n {
        if state.index[v].is_none() {
            visit(&mut state, v);
        }
    }

    let mut components = state.components;
    components.sort_by_key(|c| c[0]);
    components
}

/// Component id of every node, from [`strongly_connected`]
pub fn component_ids(adjacency: &[Vec<usize>]) -> Vec<usize> {
    let mut ids = vec![0; adjacency.len()];
    for (id, component) in strongly_connected(adjacency).into_iter().enumerate() {
        for v in component {
            ids[v] = id;
        }
    }
    ids
}

/// Node to start when every unstarted node waits on something.
///
/// Picks, in declaration order, the first unstarted node whose unstarted
/// dependencies all sit in its own cycle, so nothing outside the cycle is
/// overtaken. `started[i]` marks nodes already queued or run.
pub fn cycle_release(dependencies: &[Vec<usize>], components: &[usize], started: &[bool]) -> Option<usize> {
    let waiting = |i: usize| !started[i];
    (0..dependencies.len())
        .filter(|&i| waiting(i))
        .find(|&i| {
            dependencies[i]
                .iter()
                .all(|&d| !waiting(d) || components[d] == components[i])
        })
        .or_else(|| (0..dependencies.len()).find(|&i| waiting(i)))
}
