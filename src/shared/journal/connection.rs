//! Entries Connection
//!
//! The paginated list of entries cached for one experience. Order is
//! newest-first and is significant: every splice below keeps the position
//! of the nodes it does not touch.

use serde::{Deserialize, Serialize};

use super::entry::Entry;

/// Ordered, paginated entries of one experience
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryConnection {
    pub edges: Vec<EntryEdge>,
    pub page_info: PageInfo,
}

/// One node of the connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryEdge {
    pub cursor: String,
    pub node: Entry,
}

/// Pagination state as last reported by the server
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_cursor: Option<String>,
}

impl EntryEdge {
    fn new(node: Entry) -> Self {
        Self {
            cursor: node.id.clone(),
            node,
        }
    }
}

impl EntryConnection {
    /// Build a single-page connection from entries already in display order
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut connection = Self {
            edges: entries.into_iter().map(EntryEdge::new).collect(),
            page_info: PageInfo::default(),
        };
        connection.refresh_cursors();
        connection
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Iterate the entries in display order
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.edges.iter().map(|edge| &edge.node)
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.edges.into_iter().map(|edge| edge.node).collect()
    }

    pub fn find(&self, entry_id: &str) -> Option<&Entry> {
        self.entries().find(|entry| entry.id == entry_id)
    }

    pub fn find_mut(&mut self, entry_id: &str) -> Option<&mut Entry> {
        self.edges
            .iter_mut()
            .map(|edge| &mut edge.node)
            .find(|entry| entry.id == entry_id)
    }

    /// Insert at the front (newest position)
    pub fn prepend(&mut self, entry: Entry) {
        self.edges.insert(0, EntryEdge::new(entry));
        self.refresh_cursors();
    }

    /// Replace the node whose id is `entry_id`, keeping its position.
    ///
    /// Returns `false` when no node matched.
    pub fn replace(&mut self, entry_id: &str, entry: Entry) -> bool {
        match self.edges.iter().position(|edge| edge.node.id == entry_id) {
            Some(index) => {
                self.edges[index] = EntryEdge::new(entry);
                self.refresh_cursors();
                true
            }
            None => false,
        }
    }

    /// Remove the node whose id is `entry_id`. Absent ids are a no-op.
    pub fn remove(&mut self, entry_id: &str) -> Option<Entry> {
        let index = self.edges.iter().position(|edge| edge.node.id == entry_id)?;
        let edge = self.edges.remove(index);
        self.refresh_cursors();
        Some(edge.node)
    }

    fn refresh_cursors(&mut self) {
        self.page_info.start_cursor = self.edges.first().map(|edge| edge.cursor.clone());
        self.page_info.end_cursor = self.edges.last().map(|edge| edge.cursor.clone());
    }
}
