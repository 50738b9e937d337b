//! Per-seed crawl bookkeeping and the on-disk checkpoint that lets a crawl
//! resume where it stopped.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use url::Url;

/// Crawl progress for one seed URL.
///
/// `visited` and `to_visit` never share a URL, and every relevant URL has
/// been visited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainState {
    visited: BTreeSet<String>,
    to_visit: VecDeque<String>,
    relevant: BTreeSet<String>,
}

impl DomainState {
    /// A frontier holding only the seed, in the same normalized form that
    /// extracted links take, so the seed page is not fetched twice.
    pub fn new(seed: &str) -> Self {
        let start = Url::parse(seed)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| seed.to_string());
        Self {
            to_visit: VecDeque::from([start]),
            ..Self::default()
        }
    }

    /// Rebuild a state from raw lists, dropping anything that would break the
    /// set invariants (a hand-edited or older checkpoint, for instance).
    pub fn from_parts(visited: Vec<String>, to_visit: Vec<String>, relevant: Vec<String>) -> Self {
        let visited: BTreeSet<String> = visited.into_iter().collect();
        let mut queue = VecDeque::new();
        for url in to_visit {
            if !visited.contains(&url) && !queue.contains(&url) {
                queue.push_back(url);
            }
        }
        let relevant = relevant.into_iter().filter(|url| visited.contains(url)).collect();
        Self {
            visited,
            to_visit: queue,
            relevant,
        }
    }

    /// Pop the oldest frontier entry (breadth-first order).
    pub fn next_url(&mut self) -> Option<String> {
        self.to_visit.pop_front()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn mark_visited(&mut self, url: &str) {
        self.to_visit.retain(|queued| queued != url);
        self.visited.insert(url.to_string());
    }

    /// Append to the frontier tail unless already visited or queued.
    pub fn enqueue(&mut self, url: String) -> bool {
        if self.visited.contains(&url) || self.to_visit.contains(&url) {
            return false;
        }
        self.to_visit.push_back(url);
        true
    }

    /// Returns true only the first time a URL is recorded as relevant.
    pub fn mark_relevant(&mut self, url: &str) -> bool {
        if !self.visited.contains(url) {
            self.visited.insert(url.to_string());
        }
        self.relevant.insert(url.to_string())
    }

    pub fn visited(&self) -> &BTreeSet<String> {
        &self.visited
    }

    pub fn frontier(&self) -> &VecDeque<String> {
        &self.to_visit
    }

    pub fn relevant(&self) -> &BTreeSet<String> {
        &self.relevant
    }

    pub fn is_finished(&self) -> bool {
        self.to_visit.is_empty()
    }
}

/// Serialized snapshot of every seed's state, keyed by seed URL:
/// `{"visited": {seed: [...]}, "to_visit": {seed: [...]}, "relevant_urls": {seed: [...]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlCheckpoint {
    #[serde(default)]
    pub visited: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub to_visit: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub relevant_urls: BTreeMap<String, Vec<String>>,
}

impl CrawlCheckpoint {
    pub fn fresh(seeds: &[String]) -> Self {
        let mut checkpoint = Self::default();
        for seed in seeds {
            checkpoint.store(seed, &DomainState::new(seed));
        }
        checkpoint
    }

    /// State for `seed`, or a fresh frontier holding only the seed when the
    /// checkpoint has never seen it.
    pub fn domain_state(&self, seed: &str) -> DomainState {
        match self.to_visit.get(seed) {
            Some(to_visit) => DomainState::from_parts(
                self.visited.get(seed).cloned().unwrap_or_default(),
                to_visit.clone(),
                self.relevant_urls.get(seed).cloned().unwrap_or_default(),
            ),
            None => DomainState::new(seed),
        }
    }

    pub fn store(&mut self, seed: &str, state: &DomainState) {
        self.visited
            .insert(seed.to_string(), state.visited.iter().cloned().collect());
        self.to_visit
            .insert(seed.to_string(), state.to_visit.iter().cloned().collect());
        self.relevant_urls
            .insert(seed.to_string(), state.relevant.iter().cloned().collect());
    }

    /// Relevant URLs across `seeds`, in seed order.
    pub fn relevant_for(&self, seeds: &[String]) -> Vec<String> {
        seeds
            .iter()
            .filter_map(|seed| self.relevant_urls.get(seed))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let checkpoint: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        info!(
            "Resumed from checkpoint: {} visited URLs, {} URLs to visit, and {} relevant URLs.",
            count(&checkpoint.visited),
            count(&checkpoint.to_visit),
            count(&checkpoint.relevant_urls)
        );
        Ok(Some(checkpoint))
    }

    /// Overwrite the checkpoint atomically: write a sibling temp file, then
    /// rename it over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(path);
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        info!(
            "Checkpoint saved with {} visited URLs, {} URLs to visit, and {} relevant URLs.",
            count(&self.visited),
            count(&self.to_visit),
            count(&self.relevant_urls)
        );
        Ok(())
    }
}

fn count(map: &BTreeMap<String, Vec<String>>) -> usize {
    map.values().map(Vec::len).sum()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn write_relevant_urls(path: &Path, urls: &[String]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut body = String::new();
    for url in urls {
        body.push_str(url);
        body.push('\n');
    }
    fs::write(path, body)?;
    info!("Saved total of {} relevant URLs to {}", urls.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "https://iso.mit.edu";

    #[test]
    fn test_new_state_holds_only_seed() {
        let state = DomainState::new(SEED);
        assert_eq!(state.frontier().len(), 1);
        assert!(state.visited().is_empty());
        assert!(!state.is_finished());
    }

    #[test]
    fn test_frontier_is_fifo_and_disjoint_from_visited() {
        let mut state = DomainState::new(SEED);
        let first = state.next_url().unwrap();
        state.mark_visited(&first);
        assert!(state.enqueue(format!("{SEED}/a")));
        assert!(state.enqueue(format!("{SEED}/b")));
        assert!(!state.enqueue(format!("{SEED}/a")));
        assert!(!state.enqueue(first.clone()));
        assert_eq!(state.next_url().unwrap(), format!("{SEED}/a"));
        assert!(state.visited().iter().all(|url| !state.frontier().contains(url)));
    }

    #[test]
    fn test_mark_relevant_is_idempotent_and_implies_visited() {
        let mut state = DomainState::new(SEED);
        let url = state.next_url().unwrap();
        state.mark_visited(&url);
        assert!(state.mark_relevant(&url));
        assert!(!state.mark_relevant(&url));
        assert_eq!(state.relevant().len(), 1);
        assert!(state.relevant().is_subset(state.visited()));
    }

    #[test]
    fn test_from_parts_restores_invariants() {
        let state = DomainState::from_parts(
            vec!["a".into(), "b".into()],
            vec!["b".into(), "c".into(), "c".into()],
            vec!["a".into(), "z".into()],
        );
        assert_eq!(state.frontier().iter().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(state.relevant().iter().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_checkpoint_save_and_load_preserves_sets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawler_state.json");
        let seeds = vec![SEED.to_string()];

        let mut state = DomainState::new(SEED);
        let url = state.next_url().unwrap();
        state.mark_visited(&url);
        state.mark_relevant(&url);
        state.enqueue(format!("{SEED}/opt"));

        let mut checkpoint = CrawlCheckpoint::fresh(&seeds);
        checkpoint.store(SEED, &state);
        checkpoint.save(&path).unwrap();
        assert!(!dir.path().join("crawler_state.json.tmp").exists());

        let loaded = CrawlCheckpoint::load(&path).unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
        assert_eq!(loaded.domain_state(SEED), state);
        assert_eq!(loaded.relevant_for(&seeds), vec![format!("{SEED}/")]);
    }

    #[test]
    fn test_checkpoint_json_layout() {
        let checkpoint = CrawlCheckpoint::fresh(&[SEED.to_string()]);
        let value = serde_json::to_value(&checkpoint).unwrap();
        assert_eq!(value["to_visit"][SEED][0], "https://iso.mit.edu/");
        assert!(value["visited"][SEED].as_array().unwrap().is_empty());
        assert!(value["relevant_urls"][SEED].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_seed_starts_fresh() {
        let checkpoint = CrawlCheckpoint::default();
        assert_eq!(checkpoint.domain_state(SEED), DomainState::new(SEED));
    }

    #[test]
    fn test_missing_checkpoint_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CrawlCheckpoint::load(&dir.path().join("none.json")).unwrap().is_none());
    }

    #[test]
    fn test_write_relevant_urls_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relevant_urls.txt");
        write_relevant_urls(&path, &["https://a/1".into(), "https://a/2".into()]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "https://a/1\nhttps://a/2\n");
    }
}
