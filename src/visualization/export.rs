use crate::error::ExportError;
use crate::gossip::gossip::GossipNode;
use crate::gossip::trace::MessageTrace;
use crate::gossip::NodeId;
use crate::visualization::layout::{layout_whole, layout_with_islands, Position, Rect};
use crate::visualization::topology::{largest_component, PeerGraph};
use crate::visualization::{LayoutStrategy, VisualizationConfig};
use chrono::{DateTime, Utc};
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the file written by [`write_visualization`].
pub const EXPORT_FILE_NAME: &str = "network_visualization.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub id: NodeId,
    pub addr: String,
    pub x: i64,
    pub y: i64,
    pub cluster_id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeInfo {
    pub from: NodeId,
    pub to: NodeId,
}

/// One connected component of the peer graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub id: usize,
    pub node_ids: Vec<NodeId>,
    pub size: usize,
    pub center_x: i64,
    pub center_y: i64,
    /// False only for the largest component
    pub is_isolated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkTopology {
    pub nodes: Vec<NodeInfo>,
    pub edges: Vec<EdgeInfo>,
    pub clusters: Vec<ClusterInfo>,
}

/// The document written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationData {
    pub topology: NetworkTopology,
    pub traces: Vec<MessageTrace>,
    pub start_time: DateTime<Utc>,
}

/// Summarizes each component: its members, the truncated centroid of their
/// positions, and whether it is an island.
pub fn cluster_info(components: &[Vec<NodeId>], positions: &HashMap<NodeId, Position>) -> Vec<ClusterInfo> {
    let largest = largest_component(components);
    components
        .iter()
        .enumerate()
        .map(|(idx, members)| {
            let (sum_x, sum_y) = members
                .iter()
                .filter_map(|id| positions.get(id))
                .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
            let count = members.len().max(1) as f64;
            ClusterInfo {
                id: idx,
                node_ids: members.clone(),
                size: members.len(),
                center_x: (sum_x / count) as i64,
                center_y: (sum_y / count) as i64,
                is_isolated: Some(idx) != largest,
            }
        })
        .collect()
}

/// Snapshots the peer graph of `nodes` and lays it out on the configured
/// canvas.
///
/// # Arguments
///
/// * nodes - the nodes of the simulation
/// * config - canvas size and layout strategy
/// * rng - source of the initial layout positions
///
pub fn generate_topology<R: Rng + ?Sized>(
    nodes: &[GossipNode],
    config: &VisualizationConfig,
    rng: &mut R,
) -> NetworkTopology {
    let graph = PeerGraph::from_nodes(nodes);
    let components = graph.connected_components();
    let canvas = Rect::new(0.0, 0.0, config.width, config.height);
    let positions = match config.strategy {
        LayoutStrategy::Islands => layout_with_islands(&graph, &components, canvas, rng),
        LayoutStrategy::Whole => layout_whole(&graph, canvas, rng),
    };

    let cluster_of: HashMap<NodeId, usize> = components
        .iter()
        .enumerate()
        .flat_map(|(idx, members)| members.iter().map(move |id| (*id, idx)))
        .collect();

    let node_infos = nodes
        .iter()
        .map(|node| {
            let pos = positions.get(&node.id()).copied().unwrap_or_default();
            NodeInfo {
                id: node.id(),
                addr: node.address().to_string(),
                x: pos.x as i64,
                y: pos.y as i64,
                cluster_id: cluster_of.get(&node.id()).copied().unwrap_or_default(),
            }
        })
        .collect();

    NetworkTopology {
        nodes: node_infos,
        edges: graph.edges().iter().map(|&(from, to)| EdgeInfo { from, to }).collect(),
        clusters: cluster_info(&components, &positions),
    }
}

/// Writes `data` as indented JSON to `dir/network_visualization.json`,
/// creating `dir` if needed. Returns the path of the written file.
pub fn write_visualization(dir: &Path, data: &VisualizationData) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(EXPORT_FILE_NAME);
    let json = serde_json::to_vec_pretty(data)?;
    fs::write(&path, json).map_err(|source| ExportError::Write {
        path: path.clone(),
        source,
    })?;
    info!(
        "Exported {} nodes and {} traces to {:?}",
        data.topology.nodes.len(),
        data.traces.len(),
        path
    );
    Ok(path)
}
