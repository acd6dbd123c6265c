use std::collections::{HashSet, VecDeque};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct FrontierItem {
    pub url: Url,
    pub depth: usize,
}

/// Pending URLs plus everything ever admitted.
///
/// A URL is accepted by [`Frontier::push`] at most once per session, so it
/// can be fetched at most once.
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<FrontierItem>,
    seen: HashSet<String>,
    visited: HashSet<String>,
    origin_host: Option<String>,
    disallowed: Vec<String>,
    max_depth: Option<usize>,
}

impl Frontier {
    pub fn new(base: &Url, max_depth: Option<usize>) -> Self {
        Self {
            queue: VecDeque::new(),
            seen: HashSet::new(),
            visited: HashSet::new(),
            origin_host: base.host_str().map(str::to_string),
            disallowed: Vec::new(),
            max_depth,
        }
    }

    /// Path prefixes of the target origin that must not be crawled.
    pub fn disallow(&mut self, prefixes: impl IntoIterator<Item = String>) {
        for prefix in prefixes {
            if !prefix.is_empty() && !self.disallowed.contains(&prefix) {
                self.disallowed.push(prefix);
            }
        }
    }

    pub fn is_disallowed(&self, url: &Url) -> bool {
        if url.host_str().map(str::to_string) != self.origin_host {
            return false;
        }
        let path = url.path();
        self.disallowed.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('*');
            match prefix.strip_suffix('$') {
                Some(exact) => path == exact,
                None => path.starts_with(prefix),
            }
        })
    }

    pub fn push(&mut self, mut url: Url, depth: usize) -> bool {
        if self.max_depth.is_some_and(|max| depth > max) {
            return false;
        }
        url.set_fragment(None);
        if self.is_disallowed(&url) || !self.seen.insert(url.to_string()) {
            return false;
        }
        self.queue.push_back(FrontierItem { url, depth });
        true
    }

    /// Takes the next URL and marks it visited.
    pub fn pop(&mut self) -> Option<FrontierItem> {
        let item = self.queue.pop_front()?;
        self.visited.insert(item.url.to_string());
        Some(item)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Drops everything still queued.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
