//! Deterministic evaluation ordering.
//!
//! Nodes are dense indices in discovery order and each node lists its
//! dependencies in source declaration order. Strongly connected components
//! are found with Tarjan's algorithm; the condensation is then walked
//! depth-first from the roots so every component follows the components it
//! depends on. Members of a cyclic component are ordered by a depth-first
//! post-order that starts at the member the walk entered first, which is the
//! order an ECMAScript loader evaluates them in.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// Strongly connected components of the graph.
#[derive(Debug, Clone)]
pub struct Components {
    component_of: Vec<usize>,
    members: Vec<Vec<usize>>,
    self_loops: Vec<bool>,
}

impl Components {
    pub fn compute(edges: &[Vec<usize>]) -> Self {
        let node_count = edges.len();
        let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(node_count, 0);
        for _ in 0..node_count {
            graph.add_node(());
        }
        let mut self_loops = vec![false; node_count];
        for (from, deps) in edges.iter().enumerate() {
            for &to in deps {
                if from == to {
                    self_loops[from] = true;
                }
                graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), ());
            }
        }

        let mut component_of = vec![0; node_count];
        let mut members: Vec<Vec<usize>> = tarjan_scc(&graph)
            .into_iter()
            .map(|component| {
                let mut nodes: Vec<usize> = component.iter().map(|n| n.index()).collect();
                nodes.sort_unstable();
                nodes
            })
            .collect();
        members.sort_by_key(|nodes| nodes[0]);
        for (index, nodes) in members.iter().enumerate() {
            for &node in nodes {
                component_of[node] = index;
            }
        }

        Self {
            component_of,
            members,
            self_loops,
        }
    }

    pub fn component_of(&self, node: usize) -> usize {
        self.component_of[node]
    }

    pub fn members(&self, component: usize) -> &[usize] {
        &self.members[component]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Components with more than one member or a self-import, ordered by
    /// their first-discovered member.
    pub fn cycles(&self) -> Vec<Vec<usize>> {
        self.members
            .iter()
            .filter(|nodes| nodes.len() > 1 || self.self_loops[nodes[0]])
            .cloned()
            .collect()
    }
}

/// Nodes that could not be placed in a valid order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unordered(pub Vec<usize>);

/// Evaluation order of every node reachable from `roots`.
///
/// Dependencies come before dependents except along cycle edges. The result
/// is verified before it is returned; a violation yields the offending nodes.
pub fn evaluation_order(edges: &[Vec<usize>], roots: &[usize]) -> Result<Vec<usize>, Unordered> {
    let components = Components::compute(edges);
    let order = condensation_order(edges, roots, &components);
    verify(edges, roots, &components, &order)?;
    Ok(order)
}

struct Frame {
    /// Members in evaluation order, emitted once every dependency is done.
    members: Vec<usize>,
    /// Nodes in other components, in the order the members import them.
    external: Vec<usize>,
    next: usize,
}

fn condensation_order(edges: &[Vec<usize>], roots: &[usize], components: &Components) -> Vec<usize> {
    let mut order = Vec::with_capacity(edges.len());
    let mut entered = vec![false; components.len()];
    let mut stack: Vec<Frame> = Vec::new();

    for &root in roots {
        if entered[components.component_of(root)] {
            continue;
        }
        entered[components.component_of(root)] = true;
        stack.push(enter_component(edges, components, root));

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.external.len() {
                let node = frame.external[frame.next];
                frame.next += 1;
                let component = components.component_of(node);
                if !entered[component] {
                    entered[component] = true;
                    stack.push(enter_component(edges, components, node));
                }
                continue;
            }
            if let Some(done) = stack.pop() {
                order.extend(done.members);
            }
        }
    }
    order
}

/// Post-order of a component's members starting at `entry`, plus the
/// out-of-component dependencies met on the way.
fn enter_component(edges: &[Vec<usize>], components: &Components, entry: usize) -> Frame {
    let component = components.component_of(entry);
    let mut visited = vec![entry];
    let mut members = Vec::new();
    let mut external = Vec::new();
    let mut stack: Vec<(usize, usize)> = vec![(entry, 0)];

    while let Some((node, edge)) = stack.last_mut() {
        let node = *node;
        match edges[node].get(*edge) {
            Some(&dep) => {
                *edge += 1;
                if components.component_of(dep) != component {
                    external.push(dep);
                } else if !visited.contains(&dep) {
                    visited.push(dep);
                    stack.push((dep, 0));
                }
            }
            None => {
                stack.pop();
                members.push(node);
            }
        }
    }

    Frame {
        members,
        external,
        next: 0,
    }
}

fn verify(
    edges: &[Vec<usize>],
    roots: &[usize],
    components: &Components,
    order: &[usize],
) -> Result<(), Unordered> {
    let mut position = vec![usize::MAX; edges.len()];
    for (index, &node) in order.iter().enumerate() {
        if position[node] != usize::MAX {
            return Err(Unordered(vec![node]));
        }
        position[node] = index;
    }

    let mut reachable = vec![false; edges.len()];
    let mut pending: Vec<usize> = roots.to_vec();
    while let Some(node) = pending.pop() {
        if std::mem::replace(&mut reachable[node], true) {
            continue;
        }
        pending.extend(edges[node].iter().copied());
    }

    let mut offenders: Vec<usize> = Vec::new();
    for (node, deps) in edges.iter().enumerate() {
        if reachable[node] != (position[node] != usize::MAX) {
            offenders.push(node);
            continue;
        }
        if !reachable[node] {
            continue;
        }
        for &dep in deps {
            let same_component = components.component_of(dep) == components.component_of(node);
            if !same_component && position[dep] > position[node] {
                offenders.push(node);
            }
        }
    }

    if offenders.is_empty() {
        Ok(())
    } else {
        offenders.sort_unstable();
        offenders.dedup();
        Err(Unordered(offenders))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_linear_chain() {
        // 0 -> 1 -> 2
        let edges = vec![vec![1], vec![2], vec![]];
        assert_eq!(evaluation_order(&edges, &[0]), Ok(vec![2, 1, 0]));
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        // 0 imports 2 before 1
        let edges = vec![vec![2, 1], vec![], vec![]];
        assert_eq!(evaluation_order(&edges, &[0]), Ok(vec![2, 1, 0]));
    }

    #[test]
    fn test_cycle_follows_loader_order() {
        // 0 -> 1 -> 2 -> 1, and 2 -> 3
        let edges = vec![vec![1], vec![2], vec![1, 3], vec![]];
        let order = evaluation_order(&edges, &[0]).unwrap();
        assert_eq!(order, vec![3, 2, 1, 0]);

        let components = Components::compute(&edges);
        assert_eq!(components.cycles(), vec![vec![1, 2]]);
    }

    #[test]
    fn test_cycle_entered_from_other_member() {
        // 0 -> 2, 2 <-> 1: entered at 2, so 1 finishes first
        let edges = vec![vec![2], vec![2], vec![1]];
        assert_eq!(evaluation_order(&edges, &[0]), Ok(vec![1, 2, 0]));
    }

    #[test]
    fn test_self_import_is_a_cycle() {
        let edges = vec![vec![0, 1], vec![]];
        assert_eq!(evaluation_order(&edges, &[0]), Ok(vec![1, 0]));
        assert_eq!(Components::compute(&edges).cycles(), vec![vec![0]]);
    }

    #[test]
    fn test_unreachable_nodes_are_left_out() {
        let edges = vec![vec![], vec![0]];
        assert_eq!(evaluation_order(&edges, &[0]), Ok(vec![0]));
    }

    #[test]
    fn test_multiple_roots() {
        let edges = vec![vec![2], vec![2], vec![]];
        assert_eq!(evaluation_order(&edges, &[0, 1]), Ok(vec![2, 0, 1]));
    }

    #[test]
    fn test_verify_rejects_bad_order() {
        let edges = vec![vec![1], vec![]];
        let components = Components::compute(&edges);
        assert_eq!(
            verify(&edges, &[0], &components, &[0, 1]),
            Err(Unordered(vec![0]))
        );
        assert!(verify(&edges, &[0], &components, &[1]).is_err());
    }

    /// Acyclic graphs: every edge points from a higher to a lower index.
    fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
        (1usize..24).prop_flat_map(|n| {
            prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..4), n)
                .prop_map(|picks| {
                    picks
                        .into_iter()
                        .enumerate()
                        .map(|(node, deps)| {
                            let mut out: Vec<usize> = Vec::new();
                            if node > 0 {
                                for pick in deps {
                                    let dep = pick.index(node);
                                    if !out.contains(&dep) {
                                        out.push(dep);
                                    }
                                }
                            }
                            out
                        })
                        .collect()
                })
        })
    }

    /// Arbitrary graphs, cycles included.
    fn graph_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
        (1usize..16).prop_flat_map(|n| {
            prop::collection::vec(prop::collection::vec(0..n, 0..4), n)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Property: in acyclic graphs every module follows all of its dependencies
        #[test]
        fn prop_dependencies_first(edges in dag_strategy()) {
            let root = edges.len() - 1;
            let order = evaluation_order(&edges, &[root]).unwrap();

            let mut position = vec![None; edges.len()];
            for (index, &node) in order.iter().enumerate() {
                prop_assert!(position[node].is_none(), "node {} emitted twice", node);
                position[node] = Some(index);
            }
            for &node in &order {
                for &dep in &edges[node] {
                    prop_assert!(position[dep] < position[node]);
                }
            }
        }

        /// Property: ordering always succeeds and is deterministic, cycles or not
        #[test]
        fn prop_total_and_deterministic(edges in graph_strategy()) {
            let first = evaluation_order(&edges, &[0]);
            prop_assert!(first.is_ok());
            prop_assert_eq!(first, evaluation_order(&edges, &[0]));
        }
    }
}
