use crate::gossip::gossip::GossipNode;
use crate::gossip::NodeId;
use std::collections::{BTreeMap, HashSet};

/// A snapshot of the peer graph of a simulation.
///
/// Keeps the directed peer edges as they were declared, for drawing, and an
/// undirected adjacency list without duplicates, for analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerGraph {
    edges: Vec<(NodeId, NodeId)>,
    adjacency: BTreeMap<NodeId, Vec<NodeId>>,
}

impl PeerGraph {
    /// Creates a graph with the given nodes and no edges.
    pub fn new(node_ids: impl IntoIterator<Item = NodeId>) -> PeerGraph {
        PeerGraph {
            edges: Vec::new(),
            adjacency: node_ids.into_iter().map(|id| (id, Vec::new())).collect(),
        }
    }

    /// Snapshots the peer lists of `nodes`. Each node's state is copied under
    /// its own read lock; peers that map to no node of the slice are skipped.
    pub fn from_nodes(nodes: &[GossipNode]) -> PeerGraph {
        let mut graph = PeerGraph::new(nodes.iter().map(|node| node.id()));
        for node in nodes {
            let config = node.config();
            for peer in node.peers() {
                if let Some(peer_id) = config.node_id(&peer) {
                    graph.add_edge(node.id(), peer_id);
                }
            }
        }
        graph
    }

    /// Adds the directed edge `from -> to`. Edges touching unknown nodes and
    /// self loops are ignored.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        if from == to || !self.adjacency.contains_key(&from) || !self.adjacency.contains_key(&to) {
            return;
        }
        self.edges.push((from, to));
        for (a, b) in [(from, to), (to, from)] {
            if let Some(neighbors) = self.adjacency.get_mut(&a) {
                if !neighbors.contains(&b) {
                    neighbors.push(b);
                }
            }
        }
    }

    /// Node ids in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.adjacency.keys().copied().collect()
    }

    /// The directed edges in declaration order.
    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    /// Undirected neighbors of `id`.
    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Partitions the nodes into connected components, treating every edge
    /// as undirected.
    ///
    /// A depth-first search starts from every unvisited id in ascending
    /// order, so the same graph always yields the same components in the
    /// same order, each listed in visiting order. A node without edges is a
    /// component of its own.
    pub fn connected_components(&self) -> Vec<Vec<NodeId>> {
        let mut visited = HashSet::new();
        let mut components = Vec::new();
        for &start in self.adjacency.keys() {
            if visited.contains(&start) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(id) = stack.pop() {
                if !visited.insert(id) {
                    continue;
                }
                component.push(id);
                // Reversed so neighbors are visited in list order.
                stack.extend(self.neighbors(id).iter().rev().filter(|n| !visited.contains(*n)));
            }
            components.push(component);
        }
        components
    }
}

/// Index of the component with the most members. Ties go to the first.
pub fn largest_component(components: &[Vec<NodeId>]) -> Option<usize> {
    let mut largest: Option<usize> = None;
    for (idx, component) in components.iter().enumerate() {
        match largest {
            Some(best) if components[best].len() >= component.len() => {}
            _ => largest = Some(idx),
        }
    }
    largest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(n: usize, edges: &[(NodeId, NodeId)]) -> PeerGraph {
        let mut graph = PeerGraph::new(0..n);
        edges.iter().for_each(|&(a, b)| graph.add_edge(a, b));
        graph
    }

    #[test]
    fn directed_edges_join_components() {
        let g = graph(6, &[(0, 1), (2, 1), (4, 3)]);
        assert_eq!(g.connected_components(), vec![vec![0, 1, 2], vec![3, 4], vec![5]]);
        assert_eq!(g.neighbors(1), &[0, 2]);
        assert_eq!(g.edges(), &[(0, 1), (2, 1), (4, 3)]);
    }

    #[test]
    fn components_partition_every_node() {
        let g = graph(10, &[(0, 9), (9, 3), (3, 0), (5, 6), (7, 7), (8, 42)]);
        let components = g.connected_components();
        let mut all: Vec<NodeId> = components.iter().flatten().copied().collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
        assert_eq!(components.iter().filter(|c| c.len() == 1).count(), 5);
        // Ordered by the smallest id each search started from.
        let firsts: Vec<NodeId> = components.iter().map(|c| c[0]).collect();
        assert_eq!(firsts, vec![0, 1, 2, 4, 5, 7, 8]);
    }

    #[test]
    fn duplicate_edges_collapse_in_adjacency() {
        let g = graph(2, &[(0, 1), (1, 0), (0, 1)]);
        assert_eq!(g.neighbors(0), &[1]);
        assert_eq!(g.edges().len(), 3);
    }

    #[test]
    fn same_graph_same_components() {
        let edges = [(3, 1), (1, 4), (5, 9), (2, 6), (6, 5), (8, 7)];
        assert_eq!(graph(10, &edges).connected_components(), graph(10, &edges).connected_components());
    }

    #[test]
    fn largest_prefers_first_on_ties() {
        assert_eq!(largest_component(&[vec![1], vec![2, 3], vec![4, 5]]), Some(1));
        assert_eq!(largest_component(&[]), None);
    }
}
