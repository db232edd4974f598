//! Document model: the client's authoritative list of committed elements.
//!
//! The store is an ordered sequence; draw order is commit order, the same
//! order the room's log replays in. Ids are tracked alongside so a replayed
//! snapshot and a live relay of the same element never draw it twice.
//!
//! Every mutation goes through an explicit operation (`commit`,
//! `load_snapshot`, `clear`); the engine is the only owner.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashSet;

use frames::{Element, ElementId};

/// In-memory store of the room's committed elements.
#[derive(Debug, Default)]
pub struct DocStore {
    elements: Vec<Element>,
    ids: HashSet<ElementId>,
}

impl DocStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element. Returns `false` (and leaves the store unchanged)
    /// when an element with the same id is already present.
    pub fn commit(&mut self, element: Element) -> bool {
        if !self.ids.insert(element.id) {
            return false;
        }
        self.elements.push(element);
        true
    }

    /// Replace everything with a replayed log, keeping its order.
    pub fn load_snapshot(&mut self, elements: Vec<Element>) {
        self.clear();
        for element in elements {
            self.commit(element);
        }
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.ids.clear();
    }

    #[must_use]
    pub fn contains(&self, id: &ElementId) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        if !self.contains(id) {
            return None;
        }
        self.elements.iter().find(|el| el.id == *id)
    }

    /// Elements in draw order (oldest first).
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        self.elements.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<'a> IntoIterator for &'a DocStore {
    type Item = &'a Element;
    type IntoIter = std::slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}
