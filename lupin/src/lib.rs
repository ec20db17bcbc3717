pub mod common; // shared imports and aliases
pub mod error; // validation and data integrity errors, statistical warnings
pub mod feature_matrix; // samples x features with genomic intervals

pub mod correlation_cluster; // collapse highly correlated predictors
pub mod network_builder; // adjacency matrices + attribute tables -> graph
pub mod network; // annotated bipartite graph

pub mod cis_trans; // cis/trans labels by genomic proximity
pub mod hub_rank; // degree ranks with bootstrap stability
pub mod modules; // community detection and modularity

pub mod enrichment; // module over-representation tests
pub mod functional_sets; // GMT functional sets
pub mod hub_neighborhood; // hub neighbourhood coherence vs. rewired nulls

pub mod graph_io; // JSON export
pub mod reports; // TSV tables
