//! Protocol and field names parsed from the analysis tool's field listing.
//!
//! The listing has one tab-separated record per line. `P` records name a
//! protocol, `F` records name a field such as `tcp.flags.syn`. Names are
//! stored two levels deep: the protocol, then the rest of the field name.

use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldTrie {
    children: BTreeMap<String, FieldTrie>,
}

impl FieldTrie {
    pub const fn new() -> Self {
        Self {
            children: BTreeMap::new(),
        }
    }

    pub fn parse(listing: &str) -> Self {
        let mut top = FieldTrie::new();
        for line in listing.lines() {
            let mut record = line.split('\t');
            let (Some(tag), Some(_), Some(name)) = (record.next(), record.next(), record.next())
            else {
                continue;
            };
            match tag {
                "F" => {
                    if let Some((proto, rest)) = name.split_once('.') {
                        top.insert([proto, rest]);
                    }
                }
                "P" => top.insert([name]),
                _ => {}
            }
        }
        top
    }

    fn insert<'a>(&mut self, segments: impl IntoIterator<Item = &'a str>) {
        let mut cur = self;
        for segment in segments {
            cur = cur.children.entry(segment.to_string()).or_default();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Sorted full names completing the last word of `prefix`
    ///
    /// An empty prefix, or one ending in a space, lists every protocol.
    pub fn completions(&self, prefix: &str) -> Vec<String> {
        let word = if prefix.ends_with(' ') {
            ""
        } else {
            prefix.split_whitespace().last().unwrap_or("")
        };

        let (parent, node, partial) = match word.split_once('.') {
            Some((proto, rest)) => match self.children.get(proto) {
                Some(node) => (Some(proto), node, rest),
                None => return Vec::new(),
            },
            None => (None, self, word),
        };

        node.children
            .keys()
            .filter(|name| name.starts_with(partial))
            .map(|name| match parent {
                Some(proto) => format!("{proto}.{name}"),
                None => name.clone(),
            })
            .collect()
    }
}
