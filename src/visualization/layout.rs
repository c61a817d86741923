use crate::gossip::NodeId;
use crate::visualization::topology::{largest_component, PeerGraph};
use rand::Rng;
use std::collections::HashMap;

/// Share of the canvas width given to the largest component.
pub const MAIN_WIDTH_RATIO: f64 = 0.6;
/// Gap between the island grid and the main region.
pub const ISLAND_GAP: f64 = 50.0;
/// Number of columns in the island grid.
pub const ISLAND_COLUMNS: usize = 4;
/// Inset of an island inside its grid cell.
pub const CELL_PADDING: f64 = 25.0;

/// A 2D position on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// An axis aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Creates a rectangle; negative sizes collapse to zero.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn center(&self) -> Position {
        Position {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Shrinks the rectangle by `pad` on every side, never past its centre.
    pub fn inset(&self, pad: f64) -> Rect {
        let px = pad.min(self.width / 2.0);
        let py = pad.min(self.height / 2.0);
        Rect::new(self.x + px, self.y + py, self.width - 2.0 * px, self.height - 2.0 * py)
    }

    /// Clamps `pos` to the rectangle shrunk by `margin`. A rectangle too
    /// small for the margin clamps to its centre line.
    pub fn clamp(&self, pos: Position, margin: f64) -> Position {
        let inner = self.inset(margin);
        Position {
            x: pos.x.clamp(inner.x, inner.right()),
            y: pos.y.clamp(inner.y, inner.bottom()),
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.x && pos.x <= self.right() && pos.y >= self.y && pos.y <= self.bottom()
    }
}

/// Constants of the spring embedder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceParams {
    pub iterations: usize,
    /// Strength of the inverse square push between every pair
    pub repulsion: f64,
    /// Distances below this count as this for repulsion
    pub min_distance: f64,
    /// Spring constant along edges
    pub attraction: f64,
    pub damping: f64,
    pub time_step: f64,
    /// Distance kept from the edges of the bounding rectangle
    pub margin: f64,
}

impl ForceParams {
    /// Used for the main component and every island.
    pub const CLUSTER: ForceParams = ForceParams {
        iterations: 200,
        repulsion: 500.0,
        min_distance: 1.0,
        attraction: 0.1,
        damping: 0.9,
        time_step: 0.01,
        margin: 10.0,
    };

    /// Used when every node is laid out in one simulation.
    pub const WHOLE: ForceParams = ForceParams {
        iterations: 300,
        repulsion: 5000.0,
        min_distance: 50.0,
        attraction: 0.1,
        damping: 0.9,
        time_step: 0.9,
        margin: 50.0,
    };
}

/// Runs a force directed simulation over `members` inside `bounds`.
///
/// Every pair of members pushes apart, every graph edge between two members
/// pulls its ends together, and after each step positions are clamped to
/// `bounds` shrunk by the margin.
///
/// # Arguments
///
/// * members - the nodes to place
/// * graph - the peer graph providing the edges
/// * bounds - the rectangle the nodes must stay in
/// * params - simulation constants
/// * rng - source of the initial positions
///
pub fn force_directed<R: Rng + ?Sized>(
    members: &[NodeId],
    graph: &PeerGraph,
    bounds: Rect,
    params: &ForceParams,
    rng: &mut R,
) -> HashMap<NodeId, Position> {
    let index: HashMap<NodeId, usize> = members.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let springs: Vec<(usize, usize)> = members
        .iter()
        .enumerate()
        .flat_map(|(i, id)| {
            graph
                .neighbors(*id)
                .iter()
                .filter_map(|n| index.get(n).map(|j| (i, *j)))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut positions: Vec<Position> = members
        .iter()
        .map(|_| Position {
            x: bounds.x + rng.gen::<f64>() * bounds.width,
            y: bounds.y + rng.gen::<f64>() * bounds.height,
        })
        .collect();
    let mut velocities = vec![Position::default(); members.len()];

    for _ in 0..params.iterations {
        let mut forces = vec![Position::default(); members.len()];

        for a in 0..members.len() {
            for b in a + 1..members.len() {
                let dx = positions[a].x - positions[b].x;
                let dy = positions[a].y - positions[b].y;
                let dist = (dx * dx + dy * dy).sqrt().max(params.min_distance);
                let push = params.repulsion / (dist * dist);
                let (fx, fy) = (dx / dist * push, dy / dist * push);
                forces[a].x += fx;
                forces[a].y += fy;
                forces[b].x -= fx;
                forces[b].y -= fy;
            }
        }

        // Each undirected edge appears once per endpoint, so both ends pull.
        for &(a, b) in &springs {
            let dx = positions[b].x - positions[a].x;
            let dy = positions[b].y - positions[a].y;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist > 0.0 {
                let pull = params.attraction * dist;
                forces[a].x += dx / dist * pull;
                forces[a].y += dy / dist * pull;
            }
        }

        for i in 0..members.len() {
            velocities[i].x = velocities[i].x * params.damping + forces[i].x * params.time_step;
            velocities[i].y = velocities[i].y * params.damping + forces[i].y * params.time_step;
            let moved = Position {
                x: positions[i].x + velocities[i].x,
                y: positions[i].y + velocities[i].y,
            };
            positions[i] = bounds.clamp(moved, params.margin);
        }
    }

    members.iter().copied().zip(positions).collect()
}

/// The region of the canvas holding the largest component.
pub fn main_region(canvas: Rect) -> Rect {
    let width = canvas.width * MAIN_WIDTH_RATIO;
    Rect::new(canvas.right() - width, canvas.y, width, canvas.height)
}

/// The grid cells of `count` islands, already inset by the cell padding.
/// Cells fill a grid of [`ISLAND_COLUMNS`] columns left of the main region.
pub fn island_cells(count: usize, canvas: Rect) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let area_width = (canvas.width - main_region(canvas).width - ISLAND_GAP).max(0.0);
    let rows = (count + ISLAND_COLUMNS - 1) / ISLAND_COLUMNS;
    let cell_width = area_width / ISLAND_COLUMNS as f64;
    let cell_height = canvas.height / rows as f64;
    (0..count)
        .map(|i| {
            let col = (i % ISLAND_COLUMNS) as f64;
            let row = (i / ISLAND_COLUMNS) as f64;
            Rect::new(
                canvas.x + col * cell_width,
                canvas.y + row * cell_height,
                cell_width,
                cell_height,
            )
            .inset(CELL_PADDING)
        })
        .collect()
}

/// Lays out the graph so that disconnected islands never overlap the main
/// component.
///
/// The largest component (the first one on ties) is simulated in the right
/// hand [`MAIN_WIDTH_RATIO`] of the canvas. Every other component gets its
/// own cell of [`island_cells`]: a single node sits at the centre of its
/// cell, larger islands run their own simulation inside it.
pub fn layout_with_islands<R: Rng + ?Sized>(
    graph: &PeerGraph,
    components: &[Vec<NodeId>],
    canvas: Rect,
    rng: &mut R,
) -> HashMap<NodeId, Position> {
    let mut positions = HashMap::new();
    let largest = match largest_component(components) {
        Some(largest) => largest,
        None => return positions,
    };

    positions.extend(force_directed(
        &components[largest],
        graph,
        main_region(canvas),
        &ForceParams::CLUSTER,
        rng,
    ));

    let islands: Vec<&Vec<NodeId>> = components
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != largest)
        .map(|(_, component)| component)
        .collect();
    for (island, cell) in islands.iter().zip(island_cells(islands.len(), canvas)) {
        if let [single] = island.as_slice() {
            positions.insert(*single, cell.center());
        } else {
            positions.extend(force_directed(island, graph, cell, &ForceParams::CLUSTER, rng));
        }
    }
    positions
}

/// Lays out every node of the graph in a single simulation on the whole
/// canvas, ignoring components.
pub fn layout_whole<R: Rng + ?Sized>(graph: &PeerGraph, canvas: Rect, rng: &mut R) -> HashMap<NodeId, Position> {
    force_directed(&graph.node_ids(), graph, canvas, &ForceParams::WHOLE, rng)
}
