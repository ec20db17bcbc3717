//! Tab-separated report tables.

use crate::cis_trans::CisTransSummary;
use crate::common::*;
use crate::correlation_cluster::ClusterMembershipRecord;
use crate::enrichment::EnrichmentRecord;
use crate::hub_neighborhood::{HubNeighborhoodRecord, HubNeighborhoodReport};
use crate::hub_rank::HubRecord;
use crate::modules::ModuleSummary;
use crate::network::NetworkGraph;
use matrix_util::common_io::{mkdir, write_lines};

/// A record that renders as one TSV line under a fixed header
pub trait TsvRecord {
    fn header() -> &'static str;
    fn line(&self) -> String;
}

fn opt<T: std::fmt::Display>(x: &Option<T>) -> String {
    x.as_ref().map(|v| v.to_string()).unwrap_or("NA".to_string())
}

fn list(xs: &[Box<str>]) -> String {
    if xs.is_empty() {
        "NA".to_string()
    } else {
        xs.join(",")
    }
}

pub fn write_tsv<T: TsvRecord>(records: &[T], file: &str) -> anyhow::Result<()> {
    mkdir(file)?;
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(T::header().to_string());
    lines.extend(records.iter().map(|r| r.line()));
    write_lines(&lines, file)?;
    info!("wrote {} records to {}", records.len(), file);
    Ok(())
}

impl TsvRecord for HubRecord {
    fn header() -> &'static str {
        "rank\tid\talias\tlevel\tdegree\tmean_rank\tsd_rank"
    }
    fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.rank,
            self.id,
            opt(&self.alias),
            self.level,
            self.degree,
            self.mean_rank,
            opt(&self.sd_rank)
        )
    }
}

impl TsvRecord for CisTransSummary {
    fn header() -> &'static str {
        "id\talias\tnum_cis\tnum_trans\tnum_unknown\tnum_potential_cis\tcis_aliases"
    }
    fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            opt(&self.alias),
            self.num_cis,
            self.num_trans,
            self.num_unknown,
            opt(&self.num_potential_cis),
            list(&self.cis_aliases)
        )
    }
}

impl TsvRecord for EnrichmentRecord {
    fn header() -> &'static str {
        "module\tset\tpopulation\tsuccesses\tdraws\tobserved\tpvalue\tpadj"
    }
    fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{:e}\t{:e}",
            self.module,
            self.set_name,
            self.population,
            self.successes,
            self.draws,
            self.observed,
            self.pvalue,
            self.padj
        )
    }
}

impl TsvRecord for HubNeighborhoodRecord {
    fn header() -> &'static str {
        "id\talias\tsize\tnum_pairs\tnum_shared\tproportion"
    }
    fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            opt(&self.alias),
            self.size,
            self.num_pairs,
            self.num_shared,
            opt(&self.proportion)
        )
    }
}

impl TsvRecord for ClusterMembershipRecord {
    fn header() -> &'static str {
        "feature\tcluster\tcollapsed"
    }
    fn line(&self) -> String {
        format!("{}\t{}\t{}", self.feature, self.cluster, self.collapsed)
    }
}

impl TsvRecord for StatisticalWarning {
    fn header() -> &'static str {
        "unit\treason"
    }
    fn line(&self) -> String {
        self.to_string()
    }
}

pub struct ModuleMembershipRecord {
    pub id: Box<str>,
    pub alias: Option<Box<str>>,
    pub level: crate::network::Level,
    pub module: usize,
    pub module_size: usize,
    pub reported: bool,
}

impl TsvRecord for ModuleMembershipRecord {
    fn header() -> &'static str {
        "id\talias\tlevel\tmodule\tmodule_size\treported"
    }
    fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            opt(&self.alias),
            self.level,
            self.module,
            self.module_size,
            self.reported
        )
    }
}

pub fn module_membership_records(
    graph: &NetworkGraph,
    summary: &ModuleSummary,
) -> Vec<ModuleMembershipRecord> {
    let reported: HashSet<usize> = summary.reported.iter().copied().collect();
    summary
        .membership
        .iter()
        .enumerate()
        .map(|(i, &k)| {
            let node = graph.node(i);
            ModuleMembershipRecord {
                id: node.id.clone(),
                alias: node.alias.clone(),
                level: node.level,
                module: k,
                module_size: summary.modules.get(&k).map(|v| v.len()).unwrap_or(0),
                reported: reported.contains(&k),
            }
        })
        .collect()
}

pub struct CrossModuleEdgeRecord {
    pub source: Box<str>,
    pub target: Box<str>,
    pub level: crate::network::EdgeLevel,
    pub weight: f32,
    pub source_module: usize,
    pub target_module: usize,
}

impl TsvRecord for CrossModuleEdgeRecord {
    fn header() -> &'static str {
        "source\ttarget\tlevel\tweight\tsource_module\ttarget_module"
    }
    fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.source,
            self.target,
            self.level,
            self.weight,
            self.source_module,
            self.target_module
        )
    }
}

pub fn cross_module_edge_records(
    graph: &NetworkGraph,
    summary: &ModuleSummary,
) -> Vec<CrossModuleEdgeRecord> {
    summary
        .cross_module_edges
        .iter()
        .map(|&e| {
            let (i, j) = graph.endpoints(e);
            let edge = graph.edge(e);
            CrossModuleEdgeRecord {
                source: edge.source.clone(),
                target: edge.target.clone(),
                level: edge.level,
                weight: edge.weight,
                source_module: summary.membership[i],
                target_module: summary.membership[j],
            }
        })
        .collect()
}

/// `statistic value` lines summarising the neighbourhood null
pub fn write_null_summary(report: &HubNeighborhoodReport, file: &str) -> anyhow::Result<()> {
    mkdir(file)?;
    let num_finished = report.null_means.iter().filter(|m| m.is_some()).count();
    let lines = vec![
        "statistic\tvalue".to_string(),
        format!("observed_mean\t{}", opt(&report.observed_mean)),
        format!("null_mean\t{}", opt(&report.null_mean)),
        format!("null_sd\t{}", opt(&report.null_sd)),
        format!("z_score\t{}", opt(&report.z_score)),
        format!("empirical_pvalue\t{}", opt(&report.empirical_pvalue)),
        format!("num_trials\t{}", num_finished),
        format!("seed\t{}", report.seed),
    ];
    write_lines(&lines, file)
}
