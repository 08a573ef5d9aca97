//! Duplicate-line detection across files.
//!
//! The reference map-reduce checker: the per-file pass only builds an
//! indexed [`LineSet`] of normalized lines and must emit nothing; the
//! cross-product comparison over all collected LineSets runs exactly once,
//! in the reduce phase, so parallel and sequential runs report identical
//! groups.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::checkers::{CheckContext, Checker, MapReduce};
use crate::core::config::SimilarityConfig;
use crate::core::errors::Result;
use crate::core::msgs::{Confidence, MessageDefinition, MessageScope};
use crate::lang::ParsedModule;

/// One normalized, non-empty line retained for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEntry {
    /// 1-based line number in the original file
    pub number: usize,
    /// Normalized text
    pub text: String,
}

/// Per-file ordered sequence of normalized lines. Built once per file,
/// immutable for the run; reduce phases merge collections of LineSets by
/// concatenation, never by re-reading files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSet {
    /// Module name of the source file
    pub module: String,
    /// Display path of the source file
    pub path: String,
    /// Normalized lines in source order, blanks dropped
    pub lines: Vec<LineEntry>,
}

impl LineSet {
    /// Build a LineSet from raw source, applying the configured stripping.
    pub fn from_source(
        module: &str,
        path: &str,
        source: &str,
        config: &SimilarityConfig,
    ) -> LineSet {
        let mut lines = Vec::new();
        let mut doc_delimiter: Option<&str> = None;

        for (idx, raw) in source.lines().enumerate() {
            let mut text = raw;

            if let Some(delim) = doc_delimiter {
                if text.contains(delim) {
                    doc_delimiter = None;
                }
                continue;
            }
            if config.ignore_docstrings {
                let trimmed = text.trim_start();
                for delim in ["\"\"\"", "'''"] {
                    if let Some(rest) = trimmed.strip_prefix(delim) {
                        if !rest.contains(delim) {
                            doc_delimiter = Some(delim);
                        }
                        text = "";
                        break;
                    }
                }
            }
            if config.ignore_comments {
                text = strip_comment(text);
            }
            let trimmed = text.trim();
            let skip = trimmed.is_empty()
                || (config.ignore_imports
                    && (trimmed.starts_with("import ") || trimmed.starts_with("from ")))
                || (config.ignore_signatures
                    && ["def ", "fn ", "class ", "block "]
                        .iter()
                        .any(|kw| trimmed.starts_with(kw)));
            if skip {
                continue;
            }
            lines.push(LineEntry {
                number: idx + 1,
                text: trimmed.to_string(),
            });
        }

        LineSet {
            module: module.to_string(),
            path: path.to_string(),
            lines,
        }
    }

    /// Index mapping normalized content to positions in `lines`.
    fn index(&self) -> AHashMap<&str, Vec<usize>> {
        let mut index: AHashMap<&str, Vec<usize>> = AHashMap::new();
        for (pos, entry) in self.lines.iter().enumerate() {
            index.entry(entry.text.as_str()).or_default().push(pos);
        }
        index
    }
}

/// Quote-aware trailing-comment strip.
fn strip_comment(line: &str) -> &str {
    let mut in_quote: Option<char> = None;
    for (idx, ch) in line.char_indices() {
        match in_quote {
            Some(q) if ch == q => in_quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => in_quote = Some(ch),
            None if ch == '#' => return &line[..idx],
            None => {}
        }
    }
    line
}

fn content_bearing(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// One matched span inside one file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Span {
    set: usize,
    start_pos: usize,
    entry_count: usize,
}

/// A raw pairwise match before grouping.
#[derive(Debug, Clone)]
struct RawRun {
    length: usize,
    spans: [Span; 2],
}

/// A consolidated group of overlapping runs, ready to report.
#[derive(Debug)]
struct DuplicateGroup {
    length: usize,
    /// (path, module, start line, end line), sorted by path then line
    occurrences: Vec<(String, String, usize, usize)>,
}

/// Find all pairwise runs of at least `min_lines` content-bearing matching
/// lines, then union every pair of runs that shares a `(file, line)`
/// coordinate into a single group.
fn find_duplicate_groups(sets: &[LineSet], min_lines: usize) -> Vec<DuplicateGroup> {
    let mut runs: Vec<RawRun> = Vec::new();

    for j in 1..sets.len() {
        let index_j = sets[j].index();
        for i in 0..j {
            let lines_i = &sets[i].lines;
            let lines_j = &sets[j].lines;
            for a in 0..lines_i.len() {
                let Some(candidates) = index_j.get(lines_i[a].text.as_str()) else {
                    continue;
                };
                for &b in candidates {
                    // A match that is the continuation of a longer one was
                    // already recorded from its true start.
                    if a > 0 && b > 0 && lines_i[a - 1].text == lines_j[b - 1].text {
                        continue;
                    }
                    let mut k = 0;
                    let mut content = 0;
                    while a + k < lines_i.len()
                        && b + k < lines_j.len()
                        && lines_i[a + k].text == lines_j[b + k].text
                    {
                        if content_bearing(&lines_i[a + k].text) {
                            content += 1;
                        }
                        k += 1;
                    }
                    if content >= min_lines {
                        runs.push(RawRun {
                            length: content,
                            spans: [
                                Span { set: i, start_pos: a, entry_count: k },
                                Span { set: j, start_pos: b, entry_count: k },
                            ],
                        });
                    }
                }
            }
        }
    }

    group_runs(sets, runs)
}

/// Union-by-shared-coordinate over raw runs: any two runs touching the same
/// `(file, line)` pair belong to one reported group.
fn group_runs(sets: &[LineSet], runs: Vec<RawRun>) -> Vec<DuplicateGroup> {
    let mut parent: Vec<usize> = (0..runs.len()).collect();

    fn find(parent: &mut Vec<usize>, x: usize) -> usize {
        if parent[x] != x {
            let root = find(parent, parent[x]);
            parent[x] = root;
        }
        parent[x]
    }

    let mut seen: AHashMap<(usize, usize), usize> = AHashMap::new();
    for (run_idx, run) in runs.iter().enumerate() {
        for span in &run.spans {
            for offset in 0..span.entry_count {
                let line = sets[span.set].lines[span.start_pos + offset].number;
                match seen.entry((span.set, line)) {
                    std::collections::hash_map::Entry::Occupied(entry) => {
                        let a = find(&mut parent, *entry.get());
                        let b = find(&mut parent, run_idx);
                        parent[a] = b;
                    }
                    std::collections::hash_map::Entry::Vacant(entry) => {
                        entry.insert(run_idx);
                    }
                }
            }
        }
    }

    let mut grouped: AHashMap<usize, Vec<usize>> = AHashMap::new();
    for run_idx in 0..runs.len() {
        let root = find(&mut parent, run_idx);
        grouped.entry(root).or_default().push(run_idx);
    }

    let mut groups = Vec::new();
    for members in grouped.into_values() {
        let length = members.iter().map(|&m| runs[m].length).max().unwrap_or(0);
        let mut occurrences: Vec<(String, String, usize, usize)> = Vec::new();
        for &m in &members {
            for span in &runs[m].spans {
                let set = &sets[span.set];
                let start = set.lines[span.start_pos].number;
                let end = set.lines[span.start_pos + span.entry_count - 1].number;
                let occ = (set.path.clone(), set.module.clone(), start, end);
                match occurrences.iter_mut().find(|o| o.0 == occ.0 && overlaps(o, &occ)) {
                    Some(existing) => {
                        existing.2 = existing.2.min(occ.2);
                        existing.3 = existing.3.max(occ.3);
                    }
                    None => occurrences.push(occ),
                }
            }
        }
        occurrences.sort();
        groups.push(DuplicateGroup { length, occurrences });
    }

    // Descending run length, then a total order on participating files.
    groups.sort_by(|a, b| {
        b.length
            .cmp(&a.length)
            .then_with(|| a.occurrences.cmp(&b.occurrences))
    });
    groups
}

fn overlaps(a: &(String, String, usize, usize), b: &(String, String, usize, usize)) -> bool {
    a.2 <= b.3 && b.2 <= a.3
}

/// Indexed near-duplicate finder; reports runs of at least
/// `min_similarity_lines` matching content lines shared by two or more
/// files.
pub struct DuplicateLineDetector {
    config: SimilarityConfig,
    collected: Vec<LineSet>,
}

impl DuplicateLineDetector {
    /// Create a detector with the given options.
    pub fn new(config: SimilarityConfig) -> Self {
        DuplicateLineDetector {
            config,
            collected: Vec::new(),
        }
    }
}

impl Checker for DuplicateLineDetector {
    fn name(&self) -> &'static str {
        "similarity"
    }

    fn messages(&self) -> Vec<MessageDefinition> {
        vec![MessageDefinition::new(
            "R0801",
            "duplicate-lines",
            "A run of similar lines appears in two or more files",
            MessageScope::Line,
        )
        .expect("static definition")]
    }

    fn process_tokens(&mut self, module: &ParsedModule, _ctx: &mut CheckContext<'_>) {
        // Map phase: index only, never compare, never emit.
        self.collected.push(LineSet::from_source(
            &module.module,
            &module.display_path,
            &module.source,
            &self.config,
        ));
    }

    fn as_map_reduce(&mut self) -> Option<&mut dyn MapReduce> {
        Some(self)
    }
}

impl MapReduce for DuplicateLineDetector {
    fn map_data(&mut self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(std::mem::take(&mut self.collected))?)
    }

    fn reduce(
        &mut self,
        fragments: Vec<serde_json::Value>,
        ctx: &mut CheckContext<'_>,
    ) -> Result<()> {
        let mut sets: Vec<LineSet> = Vec::new();
        for fragment in fragments {
            sets.extend(serde_json::from_value::<Vec<LineSet>>(fragment)?);
        }
        // Fragments arrive in completion order; sort so the comparison is
        // deterministic regardless of scheduling.
        sets.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(files = sets.len(), "reducing line sets");

        for group in find_duplicate_groups(&sets, self.config.min_similarity_lines) {
            let mut text = format!("Similar lines in {} occurrences", group.occurrences.len());
            for (path, _, start, end) in &group.occurrences {
                text.push_str(&format!("\n=={path}:[{start}:{end}]"));
            }
            let (path, module, line, _) = &group.occurrences[0];
            ctx.add_message_at(
                "duplicate-lines",
                module,
                path,
                *line,
                0,
                format!("{} similar lines. {text}", group.length),
                Confidence::High,
            );
        }
        Ok(())
    }
}
