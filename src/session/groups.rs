use std::collections::BTreeMap;

use super::Session;

/// Group label used for sessions without a category
pub const UNCATEGORIZED: &str = "Uncategorized";

pub fn normalize_category(category: &str) -> &str {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        UNCATEGORIZED
    } else {
        trimmed
    }
}

/// Sessions grouped by category, each group sorted by friendly name
/// (case-insensitive). Built fresh from the live collection on every query.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex<'a> {
    groups: BTreeMap<String, Vec<&'a Session>>,
}

impl<'a> CategoryIndex<'a> {
    pub fn build(sessions: impl IntoIterator<Item = &'a Session>) -> Self {
        let mut groups: BTreeMap<String, Vec<&'a Session>> = BTreeMap::new();
        for session in sessions {
            groups
                .entry(normalize_category(&session.category).to_string())
                .or_default()
                .push(session);
        }

        // Stable sort: equal names keep insertion order.
        for members in groups.values_mut() {
            members.sort_by_cached_key(|s| s.friendlyname.to_lowercase());
        }

        Self { groups }
    }

    pub fn get(&self, category: &str) -> Option<&[&'a Session]> {
        self.groups.get(category).map(|v| v.as_slice())
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[&'a Session])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of categories
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
