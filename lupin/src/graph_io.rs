use crate::common::*;
use crate::network::{NetworkEdge, NetworkGraph, NetworkNode};
use matrix_util::common_io::{mkdir, open_buf_reader, open_buf_writer};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Node list plus edge list, the interchange form of a network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
}

#[derive(Serialize)]
struct GraphDocumentRef<'a> {
    nodes: &'a [NetworkNode],
    edges: &'a [NetworkEdge],
}

/// Write the graph as JSON (gzipped if the name ends in `.gz`)
pub fn write_graph_json(graph: &NetworkGraph, file: &str) -> anyhow::Result<()> {
    mkdir(file)?;
    let mut buf = open_buf_writer(file)?;
    serde_json::to_writer_pretty(
        &mut buf,
        &GraphDocumentRef {
            nodes: graph.nodes(),
            edges: graph.edges(),
        },
    )?;
    writeln!(buf)?;
    buf.flush()?;
    info!(
        "wrote {} nodes and {} edges to {}",
        graph.num_nodes(),
        graph.num_edges(),
        file
    );
    Ok(())
}

/// Read a graph written by [`write_graph_json`]; the structure is
/// validated again on the way in
pub fn read_graph_json(file: &str) -> anyhow::Result<NetworkGraph> {
    let buf = open_buf_reader(file)?;
    let doc: GraphDocument =
        serde_json::from_reader(buf).map_err(|e| anyhow::anyhow!("{}: {}", file, e))?;
    info!(
        "read {} nodes and {} edges from {}",
        doc.nodes.len(),
        doc.edges.len(),
        file
    );
    NetworkGraph::from_parts(doc.nodes, doc.edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::*;
    use genomic_data::interval::{GenomicInterval, Strand};
    use matrix_util::common_io::create_temp_dir_file;

    fn annotated_graph() -> NetworkGraph {
        let mut c1 = NetworkNode::new(
            "c1".into(),
            Level::X,
            Some("1p36.33".into()),
            GenomicInterval::new(Some("chr1"), Some(10), Some(2_000), Some(Strand::Forward))
                .unwrap(),
        );
        c1.rank = Some(1);
        c1.mean_rank = Some(1.25);
        c1.sd_rank = Some(0.1 + 0.2);
        c1.num_cis = Some(1);
        c1.num_trans = Some(0);
        c1.num_potential_cis = Some(3);
        c1.cis_aliases = vec!["TP53".into()];
        c1.module = Some(0);

        let mut g1 = NetworkNode::new(
            "g1".into(),
            Level::Y,
            Some("TP53".into()),
            GenomicInterval::default(),
        );
        g1.functional_terms = vec!["GO:0007049".into()];
        let g2 = NetworkNode::new(
            "g2".into(),
            Level::Y,
            None,
            GenomicInterval::from_coords("2", 5, 5).unwrap(),
        );

        let edges = vec![
            NetworkEdge {
                source: "c1".into(),
                target: "g1".into(),
                level: EdgeLevel::XY,
                weight: -0.3,
                cis_trans: Some(CisTrans::Cis),
            },
            NetworkEdge {
                source: "g1".into(),
                target: "g2".into(),
                level: EdgeLevel::YY,
                weight: 1.0 / 3.0,
                cis_trans: None,
            },
        ];
        NetworkGraph::from_parts(vec![c1, g1, g2], edges).unwrap()
    }

    #[test]
    fn test_json_round_trip_preserves_attributes() -> anyhow::Result<()> {
        let g = annotated_graph();
        for suffix in [".json", ".json.gz"] {
            let file = create_temp_dir_file(suffix)?;
            let file = file.to_str().unwrap();
            write_graph_json(&g, file)?;
            let back = read_graph_json(file)?;
            assert_eq!(back.num_nodes(), g.num_nodes());
            assert_eq!(back.num_edges(), g.num_edges());
            assert_eq!(back.nodes(), g.nodes());
            assert_eq!(back.edges(), g.edges());
        }
        Ok(())
    }

    #[test]
    fn test_documented_field_names() -> anyhow::Result<()> {
        let g = annotated_graph();
        let value = serde_json::to_value(GraphDocumentRef {
            nodes: g.nodes(),
            edges: g.edges(),
        })?;
        let node = &value["nodes"][0];
        assert_eq!(node["level"], "x");
        assert_eq!(node["chromosome"], "chr1");
        assert_eq!(node["end"], 2_000);
        assert_eq!(node["strand"], "+");
        assert_eq!(value["edges"][0]["level"], "x-y");
        assert_eq!(value["edges"][0]["cis_trans"], "cis");
        Ok(())
    }
}
