//! Active notification feed plus the history used to drop repeats.

use crate::{
    entry::Notification,
    error::{PlannerError, Result},
};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct NotificationStore {
    /// Newest first.
    active: VecDeque<Notification>,
    /// Every notification ever added. Never shrinks.
    history: HashSet<Notification>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this exact title/content pair has been added before.
    pub fn seen(&self, title: &str, content: &str) -> bool {
        self.history.contains(&Notification::new(title, content))
    }

    /// Inserts at the front unless the pair is already in history.
    pub fn add(&mut self, title: impl Into<String>, content: impl Into<String>) -> bool {
        let notif = Notification::new(title, content);
        if !self.history.insert(notif.clone()) {
            return false;
        }
        self.active.push_front(notif);
        true
    }

    /// Removes the active notification with this title. History is untouched.
    pub fn remove(&mut self, title: &str) -> Result<Notification> {
        let idx = self
            .active
            .iter()
            .position(|n| n.title == title)
            .ok_or_else(|| PlannerError::NotFound(title.to_string()))?;
        self.active
            .remove(idx)
            .ok_or_else(|| PlannerError::NotFound(title.to_string()))
    }

    pub fn contains_active(&self, title: &str) -> bool {
        self.active.iter().any(|n| n.title == title)
    }

    pub fn list_active(&self) -> Vec<Notification> {
        self.active.iter().cloned().collect()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_first_and_history_blocks_readd() {
        let mut store = NotificationStore::new();
        assert!(store.add("Nice", "Very Nice"));
        assert!(store.add("Hello", "World"));
        assert_eq!(
            store.list_active(),
            vec![
                Notification::new("Hello", "World"),
                Notification::new("Nice", "Very Nice"),
            ]
        );

        store.remove("Nice").unwrap();
        assert_eq!(store.list_active(), vec![Notification::new("Hello", "World")]);

        assert!(!store.add("Nice", "Very Nice"));
        assert!(!store.add("Hello", "World"));
        assert_eq!(store.list_active(), vec![Notification::new("Hello", "World")]);
        assert!(store.seen("Nice", "Very Nice"));
        assert!(!store.seen("Nice", "Nice"));
    }

    #[test]
    fn add_is_idempotent() {
        let mut store = NotificationStore::new();
        assert!(store.add("t", "c"));
        assert!(!store.add("t", "c"));
        assert_eq!(store.active_len(), 1);
    }

    #[test]
    fn same_title_new_content_is_a_new_notification() {
        let mut store = NotificationStore::new();
        store.add("cases", "10");
        store.add("cases", "11");
        assert_eq!(store.active_len(), 2);

        let removed = store.remove("cases").unwrap();
        assert_eq!(removed.content, "11");
        assert!(store.contains_active("cases"));
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let mut store = NotificationStore::new();
        store.add("a", "b");
        assert!(matches!(store.remove("x"), Err(PlannerError::NotFound(_))));
        assert_eq!(store.active_len(), 1);
    }
}
