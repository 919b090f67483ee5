use crate::store::{EcoGraph, NodeType};
use std::time::Instant;
use tracing::info;

/// Scoped stage timer.
///
/// Emits a `tracing` event when the stage starts and another with the elapsed
/// time when the guard drops. Where those events go is decided by whatever
/// subscriber the caller installed; nothing here depends on one existing.
pub struct StageTimer {
    stage: &'static str,
    started: Instant,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        info!(stage, "started");
        Self { stage, started: Instant::now() }
    }

    /// Records the size of the structure the stage is working on.
    pub fn sizes(&self, nodes: usize, edges: usize) {
        info!(stage = self.stage, nodes, edges, "size");
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        info!(stage = self.stage, elapsed_ms = elapsed.as_secs_f64() * 1e3, "completed");
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeCounts {
    /// production -> production
    pub technosphere: usize,
    /// extension <-> production
    pub biosphere: usize,
    /// characterization <-> extension
    pub characterization: usize,
    /// Anything else; a composed graph should have none.
    pub other: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphReport {
    pub production_nodes: usize,
    pub extension_nodes: usize,
    pub characterization_nodes: usize,
    pub edges: EdgeCounts,
    /// Share of the production x production matrix that carries a flow.
    pub technosphere_density: f64,
}

impl GraphReport {
    pub fn analyze(graph: &EcoGraph) -> Self {
        let mut edges = EdgeCounts::default();
        for edge in graph.edges() {
            let s = graph.node(edge.source).node_type;
            let t = graph.node(edge.target).node_type;
            match (s, t) {
                (NodeType::Production, NodeType::Production) => edges.technosphere += 1,
                (NodeType::Extension, NodeType::Production)
                | (NodeType::Production, NodeType::Extension) => edges.biosphere += 1,
                (NodeType::Characterization, NodeType::Extension)
                | (NodeType::Extension, NodeType::Characterization) => edges.characterization += 1,
                _ => edges.other += 1,
            }
        }

        let production_nodes = graph.count_of_type(NodeType::Production);
        let cells = (production_nodes * production_nodes) as f64;

        Self {
            production_nodes,
            extension_nodes: graph.count_of_type(NodeType::Extension),
            characterization_nodes: graph.count_of_type(NodeType::Characterization),
            technosphere_density: if cells > 0.0 { edges.technosphere as f64 / cells } else { 0.0 },
            edges,
        }
    }
}
