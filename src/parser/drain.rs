//! Drain backend: online template discovery over a fixed-depth prefix tree.
//!
//! Tokens of a preprocessed content line walk a tree whose first layer is
//! keyed by token count and whose inner layers are keyed by token value,
//! with `<*>` as the wildcard child. Leaves hold log clusters; a new line
//! joins the most similar cluster above the `st` threshold or starts a new
//! one, and the cluster template degrades positionwise toward `<*>` as
//! members disagree.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::rc::Rc;
use std::time::Instant;

use fancy_regex::Regex as FancyRegex;
use md5::{Digest, Md5};
use regex::Regex;
use tracing::{debug, info};

use crate::corpus;
use crate::error::{Error, Result};
use crate::extract::extract_records;
use crate::format::{compile_log_format, CompiledFormat};
use crate::matcher::MatchedRecord;

use super::{
    apply_preprocess, compile_preprocess, LogParser, ParseArtifacts, ParserConfig, CONTENT_FIELD,
};

const WILDCARD: &str = "<*>";

const DEFAULT_DEPTH: usize = 4;
const DEFAULT_ST: f64 = 0.4;
const DEFAULT_MAX_CHILD: usize = 100;

#[derive(Debug)]
struct LogCluster {
    template: Vec<String>,
    line_ids: Vec<usize>,
}

type ClusterRef = Rc<RefCell<LogCluster>>;
type NodeRef = Rc<RefCell<Node>>;

#[derive(Debug)]
enum NodeChild {
    Inner(HashMap<String, NodeRef>),
    Leaf(Vec<ClusterRef>),
}

#[derive(Debug)]
struct Node {
    child: NodeChild,
}

impl Node {
    fn inner() -> NodeRef {
        Rc::new(RefCell::new(Node {
            child: NodeChild::Inner(HashMap::new()),
        }))
    }
}

#[derive(Debug)]
pub struct DrainParser {
    config: ParserConfig,
    format: CompiledFormat,
    preprocess: Vec<FancyRegex>,
    /// Internal tree depth: configured depth minus the root and leaf layers.
    depth: usize,
    st: f64,
    max_child: usize,
}

impl DrainParser {
    pub fn new(config: ParserConfig, parameters: &BTreeMap<String, f64>) -> Result<DrainParser> {
        let mut depth = DEFAULT_DEPTH;
        let mut st = DEFAULT_ST;
        let mut max_child = DEFAULT_MAX_CHILD;
        for (name, value) in parameters {
            match name.as_str() {
                "depth" => depth = value.round() as usize,
                "st" => st = *value,
                "max_child" => max_child = value.round() as usize,
                other => {
                    return Err(Error::Config(format!(
                        "drain does not take a parameter named {other:?}"
                    )))
                }
            }
        }

        let format = compile_log_format(&config.log_format)?;
        if format.header_index(CONTENT_FIELD).is_none() {
            return Err(Error::Config(format!(
                "log format {:?} has no <{CONTENT_FIELD}> field",
                config.log_format
            )));
        }
        let preprocess = compile_preprocess(&config.preprocess)?;

        Ok(DrainParser {
            config,
            format,
            preprocess,
            depth: depth.saturating_sub(2),
            st,
            max_child,
        })
    }

    fn has_digits(token: &str) -> bool {
        token.chars().any(|c| c.is_ascii_digit())
    }

    /// Similarity between a cluster template and a token sequence of the
    /// same length: the fraction of positions with identical tokens, with
    /// wildcard positions excluded from the numerator and counted
    /// separately.
    fn seq_dist(template: &[String], seq: &[String]) -> (f64, usize) {
        let mut sim_tokens = 0usize;
        let mut wildcards = 0usize;
        for (t, s) in template.iter().zip(seq) {
            if t == WILDCARD {
                wildcards += 1;
            } else if t == s {
                sim_tokens += 1;
            }
        }
        (sim_tokens as f64 / template.len() as f64, wildcards)
    }

    /// Positionwise merge: agreeing tokens survive, disagreements become the
    /// wildcard.
    fn merge_template(template: &[String], seq: &[String]) -> Vec<String> {
        template
            .iter()
            .zip(seq)
            .map(|(t, s)| {
                if t == s {
                    t.clone()
                } else {
                    WILDCARD.to_string()
                }
            })
            .collect()
    }

    /// Most similar cluster at or above the `st` threshold; ties prefer the
    /// cluster with more wildcard positions.
    fn fast_match(&self, clusters: &[ClusterRef], seq: &[String]) -> Option<ClusterRef> {
        let mut best: Option<ClusterRef> = None;
        let mut best_sim = -1.0f64;
        let mut best_wildcards = 0usize;
        for cluster in clusters {
            let (sim, wildcards) = Self::seq_dist(&cluster.borrow().template, seq);
            if sim > best_sim || (sim == best_sim && wildcards > best_wildcards) {
                best_sim = sim;
                best_wildcards = wildcards;
                best = Some(Rc::clone(cluster));
            }
        }
        if best_sim >= self.st {
            best
        } else {
            None
        }
    }

    fn tree_search(&self, root: &NodeRef, seq: &[String]) -> Option<ClusterRef> {
        let len_key = seq.len().to_string();
        let mut node = match &root.borrow().child {
            NodeChild::Inner(children) => children.get(&len_key).cloned()?,
            NodeChild::Leaf(_) => return None,
        };

        let mut depth = 1;
        for token in seq {
            if depth >= self.depth || depth > seq.len() {
                break;
            }
            let next = match &node.borrow().child {
                NodeChild::Inner(children) => children
                    .get(token)
                    .or_else(|| children.get(WILDCARD))
                    .cloned(),
                NodeChild::Leaf(_) => break,
            };
            node = next?;
            depth += 1;
        }

        let found = match &node.borrow().child {
            NodeChild::Leaf(clusters) => self.fast_match(clusters, seq),
            NodeChild::Inner(_) => None,
        };
        found
    }

    /// A sequence with fewer tokens than the internal depth runs out of
    /// tokens before any leaf is created, so each such line keeps its own
    /// cluster. Identical short templates still collapse in the summary,
    /// which merges by event id.
    fn add_to_tree(&self, root: &NodeRef, cluster: &ClusterRef) {
        let seq = cluster.borrow().template.clone();
        let len_key = seq.len().to_string();

        let mut node = match &mut root.borrow_mut().child {
            NodeChild::Inner(children) => Rc::clone(
                children
                    .entry(len_key)
                    .or_insert_with(Node::inner),
            ),
            // the root is always an inner node
            NodeChild::Leaf(_) => return,
        };

        let mut depth = 1;
        for token in &seq {
            if depth >= self.depth || depth > seq.len() {
                let mut n = node.borrow_mut();
                match &mut n.child {
                    NodeChild::Leaf(clusters) => clusters.push(Rc::clone(cluster)),
                    NodeChild::Inner(_) => n.child = NodeChild::Leaf(vec![Rc::clone(cluster)]),
                }
                return;
            }

            let next = {
                let mut n = node.borrow_mut();
                match &mut n.child {
                    NodeChild::Inner(children) => {
                        if let Some(child) = children.get(token) {
                            Rc::clone(child)
                        } else if Self::has_digits(token) {
                            Rc::clone(children.entry(WILDCARD.to_string()).or_insert_with(Node::inner))
                        } else if children.contains_key(WILDCARD) {
                            if children.len() < self.max_child {
                                Rc::clone(
                                    children
                                        .entry(token.clone())
                                        .or_insert_with(Node::inner),
                                )
                            } else {
                                Rc::clone(&children[WILDCARD])
                            }
                        } else if children.len() + 1 < self.max_child {
                            Rc::clone(children.entry(token.clone()).or_insert_with(Node::inner))
                        } else {
                            // child cap reached without a wildcard yet
                            Rc::clone(children.entry(WILDCARD.to_string()).or_insert_with(Node::inner))
                        }
                    }
                    NodeChild::Leaf(clusters) => {
                        clusters.push(Rc::clone(cluster));
                        return;
                    }
                }
            };
            node = next;
            depth += 1;
        }
    }

    /// Re-derive a matching pattern from a discovered template and pull the
    /// wildcard positions out of the raw content.
    fn template_parameters(template: &str, content: &str) -> Vec<String> {
        if !template.contains(WILDCARD) {
            return Vec::new();
        }
        let mut pattern = String::with_capacity(template.len() * 2);
        for c in template.chars() {
            if c.is_ascii_alphanumeric() {
                pattern.push(c);
            } else {
                pattern.push('\\');
                pattern.push(c);
            }
        }
        let spaces = Regex::new(r"(\\ )+").expect("static pattern");
        let pattern = spaces.replace_all(&pattern, r"\s+").into_owned();
        let pattern = format!("^{}$", pattern.replace(r"\<\*\>", "(.*?)"));

        match Regex::new(&pattern) {
            Ok(re) => re
                .captures(content)
                .map(|caps| {
                    caps.iter()
                        .skip(1)
                        .flatten()
                        .map(|m| m.as_str().to_string())
                        .collect()
                })
                .unwrap_or_default(),
            // a template token containing regex metacharacters the escape
            // pass does not cover yields no parameters rather than an error
            Err(_) => Vec::new(),
        }
    }
}

impl LogParser for DrainParser {
    fn parse(&mut self, log_name: &str) -> Result<ParseArtifacts> {
        let log_path = self.config.log_path(log_name);
        info!(
            log = %log_path.display(),
            st = self.st,
            depth = self.depth + 2,
            "parsing with drain"
        );
        let started = Instant::now();

        let extraction = extract_records(&log_path, &self.format)?;
        let content_index = self
            .format
            .header_index(CONTENT_FIELD)
            .expect("checked in constructor");

        let root = Node::inner();
        let mut clusters: Vec<ClusterRef> = Vec::new();

        for (count, record) in extraction.records.iter().enumerate() {
            let content = apply_preprocess(&self.preprocess, record.value(content_index));
            let tokens: Vec<String> = content.split_whitespace().map(str::to_string).collect();

            match self.tree_search(&root, &tokens) {
                Some(cluster) => {
                    let merged = Self::merge_template(&cluster.borrow().template, &tokens);
                    let mut cluster = cluster.borrow_mut();
                    cluster.line_ids.push(record.line_id);
                    if merged != cluster.template {
                        cluster.template = merged;
                    }
                }
                None => {
                    let cluster = Rc::new(RefCell::new(LogCluster {
                        template: tokens,
                        line_ids: vec![record.line_id],
                    }));
                    self.add_to_tree(&root, &cluster);
                    clusters.push(cluster);
                }
            }

            if (count + 1) % 1000 == 0 || count + 1 == extraction.records.len() {
                debug!(
                    processed = count + 1,
                    total = extraction.records.len(),
                    clusters = clusters.len(),
                    "drain progress"
                );
            }
        }

        // line id -> (event id, template text)
        let mut assignments: HashMap<usize, (String, String)> = HashMap::new();
        for cluster in &clusters {
            let cluster = cluster.borrow();
            let template_str = cluster.template.join(" ");
            let event_id = format!("{:x}", Md5::digest(template_str.as_bytes()))[..8].to_string();
            for line_id in &cluster.line_ids {
                assignments.insert(*line_id, (event_id.clone(), template_str.clone()));
            }
        }

        let mut matched: Vec<MatchedRecord> = Vec::with_capacity(extraction.records.len());
        for record in extraction.records {
            let (event_id, template_str) = match assignments.get(&record.line_id) {
                Some(found) => found.clone(),
                None => continue,
            };
            let parameters = if self.config.keep_para {
                Self::template_parameters(&template_str, record.value(content_index))
            } else {
                Vec::new()
            };
            matched.push(MatchedRecord {
                record,
                template_id: event_id,
                template_text: template_str,
                parameters,
            });
        }

        let summary = corpus::build_summary(&matched);

        fs::create_dir_all(&self.config.outdir)
            .map_err(|e| Error::io(&self.config.outdir, e))?;
        let structured = self.config.outdir.join(format!("{log_name}_structured.csv"));
        let templates = self.config.outdir.join(format!("{log_name}_templates.csv"));
        corpus::write_structured(
            &structured,
            &self.format.headers,
            &matched,
            self.config.keep_para,
        )?;
        corpus::write_templates(&templates, &summary)?;

        info!(
            records = matched.len(),
            skipped = extraction.skipped_lines,
            events = summary.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "parsing done"
        );

        Ok(ParseArtifacts {
            structured,
            templates,
            unmatched: None,
        })
    }
}
