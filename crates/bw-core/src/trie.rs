//! Anchor trie
//!
//! A byte-indexed prefix tree keyed by rule anchors. Nodes live in a single
//! arena and reference their children by index, so dropping the trie is a
//! flat deallocation no matter how deep it grows.
//!
//! Lookups walk the trie against a suffix of the input and report every rule
//! met along the way. A shorter anchor is therefore seen before a longer one
//! that extends it.

use crate::types::Rule;

type NodeId = u32;

const ROOT: NodeId = 0;

#[derive(Debug, Default)]
struct Node {
    /// Children sorted by byte value, no duplicates.
    children: Vec<(u8, NodeId)>,
    rule: Option<Rule>,
}

impl Node {
    #[inline]
    fn child(&self, byte: u8) -> Option<NodeId> {
        self.children
            .binary_search_by_key(&byte, |&(b, _)| b)
            .ok()
            .map(|idx| self.children[idx].1)
    }
}

/// Prefix tree of network rule anchors.
#[derive(Debug)]
pub struct MatchTrie {
    nodes: Vec<Node>,
    rule_count: usize,
}

impl Default for MatchTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchTrie {
    /// Create an empty trie holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            rule_count: 0,
        }
    }

    /// Insert a rule under its anchor.
    ///
    /// Anchors are matched ASCII case-insensitively, so the key is lowercased.
    /// A later rule with the same anchor replaces the earlier one. Empty
    /// anchors are refused (the root never carries a rule) and `false` is
    /// returned.
    pub fn insert(&mut self, rule: Rule) -> bool {
        if rule.anchor.is_empty() {
            return false;
        }

        let mut node = ROOT;
        for byte in rule.anchor.bytes() {
            let byte = byte.to_ascii_lowercase();
            node = match self.nodes[node as usize].child(byte) {
                Some(next) => next,
                None => self.add_child(node, byte),
            };
        }

        let slot = &mut self.nodes[node as usize].rule;
        if slot.is_none() {
            self.rule_count += 1;
        }
        *slot = Some(rule);
        true
    }

    fn add_child(&mut self, parent: NodeId, byte: u8) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node::default());

        let children = &mut self.nodes[parent as usize].children;
        let pos = children.partition_point(|&(b, _)| b < byte);
        children.insert(pos, (byte, id));
        id
    }

    /// Walk the trie against `text[start..]`.
    ///
    /// The iterator yields each rule found along the path together with the
    /// length of the matched prefix, shortest first. The walk ends at the
    /// first byte with no matching child.
    pub fn walk<'t, 's>(&'t self, text: &'s [u8], start: usize) -> TrieWalk<'t, 's> {
        TrieWalk {
            trie: self,
            text,
            pos: start.min(text.len()),
            start,
            node: ROOT,
        }
    }

    /// First rule found walking `text[start..]`, with its matched length.
    pub fn first_match(&self, text: &[u8], start: usize) -> Option<(&Rule, usize)> {
        self.walk(text, start).next()
    }

    /// Number of rules stored.
    pub fn len(&self) -> usize {
        self.rule_count
    }

    /// Whether the trie holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate over all stored rules.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.nodes.iter().filter_map(|node| node.rule.as_ref())
    }
}

/// Iterator over the rules met while walking one suffix.
pub struct TrieWalk<'t, 's> {
    trie: &'t MatchTrie,
    text: &'s [u8],
    start: usize,
    pos: usize,
    node: NodeId,
}

impl<'t, 's> Iterator for TrieWalk<'t, 's> {
    type Item = (&'t Rule, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let byte = self.text[self.pos].to_ascii_lowercase();
            let next = self.trie.nodes[self.node as usize].child(byte)?;
            self.node = next;
            self.pos += 1;

            if let Some(rule) = &self.trie.nodes[next as usize].rule {
                return Some((rule, self.pos - self.start));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie_with(anchors: &[&str]) -> MatchTrie {
        let mut trie = MatchTrie::new();
        for anchor in anchors {
            trie.insert(Rule::new(*anchor));
        }
        trie
    }

    #[test]
    fn test_insert_shares_prefixes() {
        let trie = trie_with(&["ads", "adserver", "track"]);
        assert_eq!(trie.len(), 3);
        // root + "adserver" (8) + "track" (5)
        assert_eq!(trie.node_count(), 14);
    }

    #[test]
    fn test_walk_reports_prefix_rules_in_order() {
        let trie = trie_with(&["ads", "adserver"]);
        let text = b"xadserver.com";
        let found: Vec<(&str, usize)> = trie
            .walk(text, 1)
            .map(|(rule, len)| (rule.anchor.as_str(), len))
            .collect();
        assert_eq!(found, vec![("ads", 3), ("adserver", 8)]);
        assert_eq!(trie.first_match(text, 1).map(|(r, _)| r.anchor.as_str()), Some("ads"));
    }

    #[test]
    fn test_walk_stops_on_mismatch() {
        let trie = trie_with(&["banner"]);
        assert!(trie.first_match(b"bann", 0).is_none());
        assert!(trie.first_match(b"bxnner", 0).is_none());
        assert!(trie.first_match(b"banner", 1).is_none());
        assert!(trie.first_match(b"banner", 10).is_none());
    }

    #[test]
    fn test_last_insert_wins() {
        let mut trie = MatchTrie::new();
        trie.insert(Rule::new("ads.example.com"));
        let mut exception = Rule::new("ads.example.com");
        exception.is_exception = true;
        trie.insert(exception);

        assert_eq!(trie.len(), 1);
        let (rule, _) = trie.first_match(b"ads.example.com", 0).unwrap();
        assert!(rule.is_exception);
    }

    #[test]
    fn test_case_insensitive_and_empty_anchor() {
        let mut trie = trie_with(&["AdFrame"]);
        assert!(trie.first_match(b"ADFRAME.js", 0).is_some());
        assert!(!trie.insert(Rule::new("")));
        assert_eq!(trie.len(), 1);
    }
}
