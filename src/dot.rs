//! DOT rendering of elimination sequences.
//!
//! The precedence relation is materialised once into a [`daggy::Dag`] (nodes
//! are the schedule lines, edges run from producer to consumer) and rendered
//! with petgraph's DOT backend.

use std::io;
use std::path::Path;

use daggy::petgraph::dot::{Config, Dot};
use daggy::Dag;

use crate::seq::Sequence;

/// Builds the elimination DAG of `seq` with one node per operation; edges
/// carry the producer's FMA cost.
fn elimination_dag(seq: &Sequence) -> Dag<String, usize> {
    let mut dag = Dag::new();

    let nodes: Vec<_> = seq.iter().map(|op| dag.add_node(op.to_string())).collect();

    for (consumer_idx, consumer) in seq.iter().enumerate() {
        for (producer_idx, producer) in seq.iter().enumerate() {
            if consumer.depends_on(producer) {
                dag.add_edge(nodes[producer_idx], nodes[consumer_idx], producer.fma)
                    .expect("sequence precedence is acyclic");
            }
        }
    }

    dag
}

/// Renders `seq` as a DOT digraph.
pub fn render(seq: &Sequence) -> String {
    let dag = elimination_dag(seq);
    format!("{}", Dot::with_config(dag.graph(), &[Config::EdgeNoLabel]))
}

/// Writes the DOT digraph of `seq` to `<stem>.dot`.
pub fn write(seq: &Sequence, stem: &str) -> io::Result<()> {
    let path = Path::new(stem).with_extension("dot");
    std::fs::write(path, render(seq))
}
