use gossipnet::builder::builder::{BuilderConfig, NetworkBuilder};
use gossipnet::error::TransportError;
use gossipnet::gossip::gossip::{GossipConfig, GossipNode};
use gossipnet::gossip::trace::TraceLog;
use gossipnet::gossip::NodeId;
use gossipnet::transport::mock::MockNetwork;
use gossipnet::transport::transport::{Address, Envelope, Network};
use gossipnet::visualization::export::{VisualizationData, EXPORT_FILE_NAME};
use std::sync::Arc;
use std::time::Duration;

fn spawn_nodes(net: &Arc<dyn Network>, n: usize, traces: &TraceLog) -> Vec<GossipNode> {
    let config = GossipConfig::default();
    (0..n)
        .map(|i| {
            let addr = Address::localhost(config.base_port + i as u16);
            let node = GossipNode::new(net.clone(), i, addr, config.clone(), Some(traces.clone())).unwrap();
            node.start();
            node
        })
        .collect()
}

/// Polls `cond` until it holds or a second has passed.
async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

#[tokio::test]
async fn lone_node_gossips_into_the_void() {
    let net: Arc<dyn Network> = Arc::new(MockNetwork::new());
    let traces = TraceLog::new();
    let nodes = spawn_nodes(&net, 1, &traces);

    let id = nodes[0].gossip("alone").unwrap();
    settle().await;

    assert!(nodes[0].has_seen(&id));
    assert!(nodes[0].received_messages().is_empty());
    assert_eq!(nodes[0].stats().sent, 0);
    assert!(traces.is_empty());
}

#[tokio::test]
async fn direct_peer_receives_once() {
    let net: Arc<dyn Network> = Arc::new(MockNetwork::new());
    let traces = TraceLog::new();
    let nodes = spawn_nodes(&net, 2, &traces);
    nodes[0].add_peer(nodes[1].address().clone());
    nodes[1].add_peer(nodes[0].address().clone());

    let id = nodes[0].gossip("hi").unwrap();
    assert!(wait_until(|| traces.len() == 1).await);
    settle().await;

    let got = traces.snapshot();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].message_id, id);
    assert_eq!(got[0].original_sender, 0);
    assert_eq!(got[0].immediate_forwarder, 0);
    assert_eq!(got[0].receiver, 1);
    assert!(got[0].is_direct);
    assert_eq!(got[0].content, "hi");
    // B echoes the message back, A has already seen it.
    assert!(nodes[0].received_messages().is_empty());
    assert_eq!(nodes[1].received_messages().len(), 1);
}

#[tokio::test]
async fn partition_blocks_until_healed() {
    let mock = MockNetwork::new();
    let net: Arc<dyn Network> = Arc::new(mock.clone());
    let traces = TraceLog::new();
    let nodes = spawn_nodes(&net, 3, &traces);
    for a in &nodes {
        for b in &nodes {
            a.add_peer(b.address().clone());
        }
    }
    let all: Vec<Address> = nodes.iter().map(|n| n.address().clone()).collect();
    net.partition(&all[..1], &all[1..]);

    let probe = Envelope {
        from: all[0].clone(),
        to: all[1].clone(),
        tag: "gossip".to_string(),
        payload: b"gossip:{}".to_vec(),
    };
    assert!(matches!(net.dial(&all[1]).unwrap().send(probe), Err(TransportError::Partitioned)));

    nodes[0].gossip("cut off").unwrap();
    settle().await;
    assert!(traces.is_empty());
    assert_eq!(nodes[0].stats().sent, 0);

    net.heal();
    assert!(!mock.is_partitioned(&all[0]));
    nodes[0].gossip("back").unwrap();
    assert!(wait_until(|| traces.len() == 2).await);
    assert!(traces.snapshot().iter().all(|t| t.content == "back"));
}

#[tokio::test]
async fn ring_floods_every_node_once() {
    let net: Arc<dyn Network> = Arc::new(MockNetwork::new());
    let traces = TraceLog::new();
    let nodes = spawn_nodes(&net, 5, &traces);
    for i in 0..5 {
        nodes[i].add_peer(nodes[(i + 1) % 5].address().clone());
        nodes[i].add_peer(nodes[(i + 4) % 5].address().clone());
    }

    nodes[0].gossip("around").unwrap();
    assert!(wait_until(|| traces.len() == 4).await);
    settle().await;

    for node in &nodes[1..] {
        assert_eq!(node.received_messages().len(), 1, "node {}", node.id());
    }
    assert!(nodes[0].received_messages().is_empty());
    let sent: usize = nodes.iter().map(|n| n.stats().sent).sum();
    assert!(sent <= 10, "{} copies sent", sent);
    for node in &nodes {
        let inbound = node.stats().inbound;
        // Each node has two ring neighbours, each forwarding at most once.
        assert!(inbound <= 2, "node {} got {} copies", node.id(), inbound);
    }
    let inbound: usize = nodes.iter().map(|n| n.stats().inbound).sum();
    assert_eq!(inbound, sent);
    let mut receivers: Vec<NodeId> = traces.snapshot().iter().map(|t| t.receiver).collect();
    receivers.sort();
    assert_eq!(receivers, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn random_network_end_to_end() {
    let net: Arc<dyn Network> = Arc::new(MockNetwork::new());
    let mut builder = NetworkBuilder::with_config(net, BuilderConfig::default().with_seed(2024));
    builder.create_nodes(100).unwrap();
    builder.build_random_topology(5);
    builder.start_all_nodes().await;

    let id = builder.initiate_gossip("Hello, gossip network!").unwrap().unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_millis(350)).await;

    let traces = builder.traces();
    assert!(!traces.is_empty());
    for trace in &traces {
        assert_eq!(trace.message_id, id);
        assert_ne!(trace.receiver, trace.original_sender);
    }
    let mut receivers: Vec<NodeId> = traces.iter().map(|t| t.receiver).collect();
    receivers.sort();
    let unique = receivers.len();
    receivers.dedup();
    assert_eq!(receivers.len(), unique, "a node recorded the message twice");

    let dir = tempfile::tempdir().unwrap();
    let path = builder.export_visualization(dir.path()).unwrap();
    assert_eq!(path.file_name().unwrap(), EXPORT_FILE_NAME);
    let data: VisualizationData = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(data.topology.nodes.len(), 100);
    assert!(data.traces.len() >= traces.len());
    assert_eq!(data.start_time, builder.start_time());
    let clustered: usize = data.topology.clusters.iter().map(|c| c.size).sum();
    assert_eq!(clustered, 100);
    assert_eq!(data.topology.clusters.iter().filter(|c| !c.is_isolated).count(), 1);

    builder.close_all_nodes();
    let nodes = builder.nodes().to_vec();
    assert!(wait_until(|| nodes.iter().all(|n| !n.is_running())).await);
}
