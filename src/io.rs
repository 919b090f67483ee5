//! JSON persistence of composed graphs.
use crate::analysis::telemetry::StageTimer;
use crate::error::GraphError;
use crate::store::EcoGraph;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub fn save_json(graph: &EcoGraph, path: impl AsRef<Path>) -> Result<(), GraphError> {
    let _timer = StageTimer::start("saving graph");
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, graph)?;
    writer.flush()?;
    Ok(())
}

/// Loads a graph written by [`save_json`] and rebuilds its lookup index.
pub fn load_json(path: impl AsRef<Path>) -> Result<EcoGraph, GraphError> {
    let _timer = StageTimer::start("loading graph");
    let reader = BufReader::new(File::open(path)?);
    let mut graph: EcoGraph = serde_json::from_reader(reader)?;
    graph.rebuild_index()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::matrix::{graph_from_matrices, BuildOptions, MatrixSystem};
    use crate::store::{AttrValue, Convention, NodeMetadata};
    use nalgebra::DMatrix;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let system = MatrixSystem {
            production: DMatrix::from_row_slice(2, 2, &[1.0, 0.3, 0.0, 1.0]),
            extension: DMatrix::from_row_slice(1, 2, &[0.5, 2.0]),
            production_metadata: vec![
                NodeMetadata::new("a", "kg").with("location", "CH"),
                NodeMetadata::new("b", "MJ").with("year", 2020i64),
            ],
            extension_metadata: vec![NodeMetadata::new("CO2", "kg")],
            ..Default::default()
        };
        let g = graph_from_matrices(system, &BuildOptions::new("x", Convention::A)).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.json");
        save_json(&g, &path).unwrap();
        let back = load_json(&path).unwrap();

        assert!(back.is_equivalent(&g));
        let (id, _) = back.find_by_attribute("year", &AttrValue::Int(2020)).next().unwrap();
        assert_eq!(back.node(id).unit, "MJ");
        assert_eq!(back.out_edges(id).count(), g.out_edges(g.handle(&back.node(id).uuid).unwrap()).count());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(load_json(dir.path().join("absent.json")), Err(GraphError::Io(_))));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"nodes\": 3}").unwrap();
        assert!(matches!(load_json(&path), Err(GraphError::Serialization(_))));
    }

    fn stored_node(uuid: &str) -> serde_json::Value {
        serde_json::json!({
            "uuid": uuid, "type": "production", "name": uuid, "unit": "kg",
            "system": "x", "production": 1.0, "index": 0,
        })
    }

    #[test]
    fn test_dangling_edges_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dangling.json");
        let graph = serde_json::json!({
            "nodes": [stored_node("a")],
            "edges": [
                {"source": 0, "target": 5, "flow": 1.0},
                {"source": 7, "target": 0, "flow": 1.0},
            ],
        });
        std::fs::write(&path, graph.to_string()).unwrap();
        assert!(matches!(load_json(&path), Err(GraphError::CorruptGraph(_))));
    }

    #[test]
    fn test_duplicate_uuids_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("duplicate.json");
        let graph = serde_json::json!({
            "nodes": [stored_node("a"), stored_node("a")],
            "edges": [],
        });
        std::fs::write(&path, graph.to_string()).unwrap();
        assert!(matches!(load_json(&path), Err(GraphError::CorruptGraph(ref m)) if m.contains("'a'")));
    }
}
