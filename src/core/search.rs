use std::collections::HashMap;

/// A panel whose text matched a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit<'a> {
    pub panel: &'a str,
    pub text: &'a str,
}

/// Case-insensitive substring search over an index
pub struct SearchEngine<'a> {
    entries: &'a HashMap<String, String>,
}

impl<'a> SearchEngine<'a> {
    pub fn new(entries: &'a HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Every panel whose text contains `query`, ignoring case, sorted by panel.
    /// An empty query matches every panel.
    pub fn query(&self, query: &str) -> Vec<SearchHit<'a>> {
        let needle = query.to_lowercase();
        let mut hits: Vec<SearchHit<'a>> = self
            .entries
            .iter()
            .filter(|(_, text)| text.to_lowercase().contains(&needle))
            .map(|(panel, text)| SearchHit {
                panel: panel.as_str(),
                text: text.as_str(),
            })
            .collect();
        hits.sort_unstable_by(|a, b| a.panel.cmp(b.panel));
        hits
    }

    /// Just the panel identities of `query`
    pub fn panels(&self, query: &str) -> Vec<&'a str> {
        self.query(query).into_iter().map(|hit| hit.panel).collect()
    }
}
