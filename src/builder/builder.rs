use crate::builder::{DEFAULT_HOST, DEFAULT_SETTLE};
use crate::error::{BuildError, ExportError, GossipError};
use crate::gossip::gossip::{GossipConfig, GossipNode};
use crate::gossip::trace::{MessageTrace, TraceLog};
use crate::gossip::NodeId;
use crate::protocol::protocol::MessageKey;
use crate::transport::transport::{Address, Network};
use crate::visualization::export::{generate_topology, write_visualization, VisualizationData};
use crate::visualization::VisualizationConfig;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A configuration struct for the user to pass different
/// parameters into a network builder.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderConfig {
    // Host of every node
    pub host: String,
    // Pause after starting the nodes
    pub settle: Duration,
    // Seed for peer selection, starter choice and layout
    pub seed: Option<u64>,
    pub gossip: GossipConfig,
    pub visualization: VisualizationConfig,
}

impl BuilderConfig {
    /// Returns the config with a fixed random seed.
    pub fn with_seed(mut self, seed: u64) -> BuilderConfig {
        self.seed = Some(seed);
        self
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            host: DEFAULT_HOST.to_string(),
            settle: DEFAULT_SETTLE,
            seed: None,
            gossip: GossipConfig::default(),
            visualization: VisualizationConfig::default(),
        }
    }
}

/// Builds and drives a simulated gossip network: creates the nodes, wires a
/// random topology, starts a gossip and exports what happened.
pub struct NetworkBuilder {
    network: Arc<dyn Network>,
    nodes: Vec<GossipNode>,
    traces: TraceLog,
    start_time: DateTime<Utc>,
    rng: StdRng,
    config: BuilderConfig,
}

impl NetworkBuilder {
    pub fn new(network: Arc<dyn Network>) -> NetworkBuilder {
        NetworkBuilder::with_config(network, BuilderConfig::default())
    }

    pub fn with_config(network: Arc<dyn Network>, config: BuilderConfig) -> NetworkBuilder {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        NetworkBuilder {
            network,
            nodes: Vec::new(),
            traces: TraceLog::new(),
            start_time: Utc::now(),
            rng,
            config,
        }
    }

    /// Creates `n` nodes, node `i` listening on `base_port + i`.
    ///
    /// # Arguments
    ///
    /// * n - the number of nodes, at least 1
    ///
    pub fn create_nodes(&mut self, n: usize) -> Result<(), BuildError> {
        if n == 0 {
            return Err(BuildError::InvalidNodeCount);
        }
        let base = self.nodes.len();
        for index in base..base + n {
            let port = usize::from(self.config.gossip.base_port)
                .checked_add(index)
                .and_then(|port| u16::try_from(port).ok())
                .ok_or(BuildError::InvalidNodeCount)?;
            let address = Address::new(&self.config.host, port);
            let node = GossipNode::new(
                self.network.clone(),
                index,
                address,
                self.config.gossip.clone(),
                Some(self.traces.clone()),
            )
            .map_err(|source| BuildError::NodeCreation { index, source })?;
            self.nodes.push(node);
        }
        info!("Created {} nodes", n);
        Ok(())
    }

    /// Gives every node up to `k` distinct random peers.
    pub fn build_random_topology(&mut self, k: usize) {
        for idx in 0..self.nodes.len() {
            let peers = self.select_random_peers(idx, k);
            let node = &self.nodes[idx];
            for peer in peers {
                node.add_peer(self.nodes[peer].address().clone());
            }
            debug!("node {} has {} peers", idx, node.peers().len());
        }
        info!("Built random topology with up to {} peers per node", k);
    }

    /// Samples up to `k` distinct node indices other than `node_id`.
    /// Gives up after `3 * k` draws, so the result may be short.
    pub fn select_random_peers(&mut self, node_id: NodeId, k: usize) -> Vec<NodeId> {
        let mut selected = Vec::with_capacity(k);
        let total = self.nodes.len();
        if total == 0 {
            return selected;
        }
        for _ in 0..k.saturating_mul(3) {
            if selected.len() >= k {
                break;
            }
            let candidate = self.rng.gen_range(0..total);
            if candidate != node_id && !selected.contains(&candidate) {
                selected.push(candidate);
            }
        }
        selected
    }

    /// Starts every node, then waits for the settle interval.
    pub async fn start_all_nodes(&self) {
        self.nodes.iter().for_each(|node| node.start());
        info!("Started {} nodes", self.nodes.len());
        tokio::time::sleep(self.config.settle).await;
    }

    /// Has a uniformly chosen node gossip `content`. Returns the message id,
    /// or None when there are no nodes.
    pub fn initiate_gossip(&mut self, content: &str) -> Result<Option<MessageKey>, GossipError> {
        if self.nodes.is_empty() {
            return Ok(None);
        }
        let starter = self.rng.gen_range(0..self.nodes.len());
        info!("node {} initiates gossip", starter);
        self.nodes[starter].gossip(content).map(Some)
    }

    pub fn close_all_nodes(&self) {
        self.nodes.iter().for_each(|node| node.close());
        info!("Closed {} nodes", self.nodes.len());
    }

    pub fn nodes(&self) -> &[GossipNode] {
        &self.nodes
    }

    /// Returns a copy of the trace log.
    pub fn traces(&self) -> Vec<MessageTrace> {
        self.traces.snapshot()
    }

    /// When the builder was created.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Lays out the current topology and writes it, together with the
    /// traces, to `dir/network_visualization.json`.
    pub fn export_visualization(&mut self, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
        let topology = generate_topology(&self.nodes, &self.config.visualization, &mut self.rng);
        let data = VisualizationData {
            topology,
            traces: self.traces.snapshot(),
            start_time: self.start_time,
        };
        write_visualization(dir.as_ref(), &data)
    }
}
