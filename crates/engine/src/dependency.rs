use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use crate::model::{JobStatus, ProductionJob};

// ---------------------------------------------------------------------------
// Dependency graph
// ---------------------------------------------------------------------------

/// Job dependency DAG. Edges point from prerequisite to dependent.
/// Dependencies on unknown ids are left out of the graph.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<usize, ()>,
    id_to_node: HashMap<String, NodeIndex>,
    ids: Vec<String>,
}

impl DependencyGraph {
    pub fn build(jobs: &[ProductionJob]) -> Self {
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(jobs.len(), jobs.len());
        let mut id_to_node: HashMap<String, NodeIndex> = HashMap::new();
        let mut ids: Vec<String> = Vec::with_capacity(jobs.len());

        for (i, job) in jobs.iter().enumerate() {
            // First occurrence wins; duplicates are a validation error.
            if id_to_node.contains_key(&job.id) {
                continue;
            }
            let node = graph.add_node(i);
            id_to_node.insert(job.id.clone(), node);
            ids.push(job.id.clone());
        }

        for job in jobs {
            let Some(&succ) = id_to_node.get(&job.id) else {
                continue;
            };
            for dep in &job.dependencies {
                if let Some(&pred) = id_to_node.get(dep) {
                    graph.update_edge(pred, succ, ());
                }
            }
        }

        Self {
            graph,
            id_to_node,
            ids,
        }
    }

    fn id_of(&self, node: NodeIndex) -> &str {
        // Node weights are input indices; ids are stored in insertion order,
        // which matches node index order.
        &self.ids[node.index()]
    }

    /// Every dependency cycle, each as a sorted list of the participating job
    /// ids. Cycles are sorted by their first id. Self-dependencies count.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || self.graph.find_edge(scc[0], scc[0]).is_some()
            })
            .map(|scc| {
                let mut ids: Vec<String> =
                    scc.iter().map(|&n| self.id_of(n).to_string()).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Number of jobs that directly or transitively depend on `job_id`.
    pub fn transitive_dependents(&self, job_id: &str) -> usize {
        let Some(&start) = self.id_to_node.get(job_id) else {
            return 0;
        };
        let mut dfs = Dfs::new(&self.graph, start);
        let mut reached = 0usize;
        while let Some(node) = dfs.next(&self.graph) {
            if node != start {
                reached += 1;
            }
        }
        reached
    }
}

// ---------------------------------------------------------------------------
// Readiness tracking
// ---------------------------------------------------------------------------

/// Whether a job's prerequisites allow it to be placed right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// All prerequisites finished; the job may start at or after this point.
    Ready { earliest_start: NaiveDateTime },
    /// Some prerequisites have not been resolved yet.
    Waiting { pending: Vec<String> },
    /// A prerequisite can never finish inside this run.
    Blocked { dependency: String },
}

/// Tracks which jobs have been placed (with their end times) or given up on
/// during a run.
#[derive(Debug)]
pub struct DependencyResolver {
    run_start: NaiveDateTime,
    input_status: HashMap<String, JobStatus>,
    finished: HashMap<String, NaiveDateTime>,
    failed: HashSet<String>,
}

impl DependencyResolver {
    pub fn new(jobs: &[ProductionJob], run_start: NaiveDateTime) -> Self {
        Self {
            run_start,
            input_status: jobs.iter().map(|j| (j.id.clone(), j.status)).collect(),
            finished: HashMap::new(),
            failed: HashSet::new(),
        }
    }

    pub fn mark_scheduled(&mut self, job_id: &str, end: NaiveDateTime) {
        self.finished.insert(job_id.to_string(), end);
    }

    pub fn mark_unscheduled(&mut self, job_id: &str) {
        self.failed.insert(job_id.to_string());
    }

    pub fn is_resolved(&self, job_id: &str) -> bool {
        self.finished.contains_key(job_id) || self.failed.contains(job_id)
    }

    /// Check every dependency of `job`. A single blocked dependency makes the
    /// whole job blocked, even if others are still waiting.
    pub fn check(&self, job: &ProductionJob) -> Readiness {
        let mut earliest = self.run_start;
        let mut pending: Vec<String> = Vec::new();

        for dep in &job.dependencies {
            if let Some(&end) = self.finished.get(dep) {
                earliest = earliest.max(end);
                continue;
            }
            if self.failed.contains(dep) {
                return Readiness::Blocked {
                    dependency: dep.clone(),
                };
            }
            match self.input_status.get(dep) {
                Some(JobStatus::Completed) => {}
                Some(JobStatus::Pending) => pending.push(dep.clone()),
                // Committed outside this run, or unknown: no end time to order against.
                Some(JobStatus::Scheduled) | Some(JobStatus::InProgress) | None => {
                    return Readiness::Blocked {
                        dependency: dep.clone(),
                    }
                }
            }
        }

        if pending.is_empty() {
            Readiness::Ready {
                earliest_start: earliest,
            }
        } else {
            Readiness::Waiting { pending }
        }
    }
}
