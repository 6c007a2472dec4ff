//! Drive tree
//!
//! Drive items are persisted as a flat list with `parentId` links. Edits go
//! through [`DriveTree`], an arena keyed by id that keeps insertion order and
//! refuses any edit that would break the forest shape:
//! - every parent exists and is a folder
//! - no node is its own ancestor

use crate::error::DriveError;
use crate::types::{new_id, DriveItem, DriveItemKind};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Arena view over one month's drive items
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriveTree {
    nodes: IndexMap<String, DriveItem>,
}

impl DriveTree {
    /// Create empty tree
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build tree from the persisted item list
    ///
    /// # Errors
    /// - `DriveError::DuplicateId` if two items share an id
    /// - any invariant violation reported by [`DriveTree::validate`]
    pub fn from_items(items: Vec<DriveItem>) -> Result<Self, DriveError> {
        let mut nodes = IndexMap::with_capacity(items.len());
        for item in items {
            if nodes.contains_key(&item.id) {
                return Err(DriveError::DuplicateId(item.id));
            }
            nodes.insert(item.id.clone(), item);
        }

        let tree = Self { nodes };
        tree.validate()?;
        Ok(tree)
    }

    /// Check parent links and acyclicity
    ///
    /// # Errors
    /// The first violation found, in item order.
    pub fn validate(&self) -> Result<(), DriveError> {
        for item in self.nodes.values() {
            let Some(parent_id) = item.parent_id.as_deref() else {
                continue;
            };

            let parent = self
                .nodes
                .get(parent_id)
                .ok_or_else(|| DriveError::ParentNotFound {
                    id: item.id.clone(),
                    parent: parent_id.to_string(),
                })?;

            if !parent.is_folder() {
                return Err(DriveError::NotAFolder(parent_id.to_string()));
            }

            if self.is_within(parent_id, &item.id) {
                return Err(DriveError::CycleDetected {
                    id: item.id.clone(),
                    target: parent_id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up an item
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DriveItem> {
        self.nodes.get(id)
    }

    /// Iterate items in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &DriveItem> {
        self.nodes.values()
    }

    /// Items of one owner directly under `parent` (`None` = root)
    pub fn children<'a>(
        &'a self,
        parent: Option<&'a str>,
        owner_id: &'a str,
    ) -> impl Iterator<Item = &'a DriveItem> + 'a {
        self.nodes
            .values()
            .filter(move |item| item.parent_id.as_deref() == parent && item.owner_id == owner_id)
    }

    /// Path from the root down to `id`, inclusive
    ///
    /// # Errors
    /// `DriveError::NotFound` if `id` is unknown.
    pub fn breadcrumbs(&self, id: &str) -> Result<Vec<&DriveItem>, DriveError> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let item = self
                .nodes
                .get(current)
                .ok_or_else(|| DriveError::NotFound(current.to_string()))?;
            path.push(item);
            if path.len() > self.nodes.len() {
                return Err(DriveError::CycleDetected {
                    id: id.to_string(),
                    target: current.to_string(),
                });
            }
            cursor = item.parent_id.as_deref();
        }
        path.reverse();
        Ok(path)
    }

    /// Create a folder, returning its id
    ///
    /// # Errors
    /// See [`DriveTree::insert`].
    pub fn create_folder(
        &mut self,
        name: &str,
        parent: Option<&str>,
        owner_id: &str,
    ) -> Result<String, DriveError> {
        self.insert(DriveItemKind::Folder, name, parent, owner_id, None)
    }

    /// Create an empty file, returning its id
    ///
    /// # Errors
    /// See [`DriveTree::insert`].
    pub fn create_file(
        &mut self,
        name: &str,
        parent: Option<&str>,
        owner_id: &str,
    ) -> Result<String, DriveError> {
        self.insert(DriveItemKind::File, name, parent, owner_id, Some(String::new()))
    }

    /// Insert a new item under `parent`
    ///
    /// # Errors
    /// - `DriveError::EmptyName` for a blank name
    /// - `DriveError::ParentNotFound` / `DriveError::NotAFolder` for a bad parent
    pub fn insert(
        &mut self,
        kind: DriveItemKind,
        name: &str,
        parent: Option<&str>,
        owner_id: &str,
        content: Option<String>,
    ) -> Result<String, DriveError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DriveError::EmptyName);
        }

        let id = new_id();
        if let Some(parent_id) = parent {
            self.require_folder(&id, parent_id)?;
        }

        self.nodes.insert(
            id.clone(),
            DriveItem {
                id: id.clone(),
                name: name.to_string(),
                kind,
                parent_id: parent.map(str::to_string),
                owner_id: owner_id.to_string(),
                content,
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        Ok(id)
    }

    /// Rename an item
    ///
    /// # Errors
    /// `DriveError::NotFound` or `DriveError::EmptyName`.
    pub fn rename(&mut self, id: &str, name: &str) -> Result<(), DriveError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DriveError::EmptyName);
        }
        let item = self.get_mut(id)?;
        item.name = name.to_string();
        Ok(())
    }

    /// Replace a file's content
    ///
    /// # Errors
    /// `DriveError::NotFound` or `DriveError::NotAFile`.
    pub fn update_content(&mut self, id: &str, content: impl Into<String>) -> Result<(), DriveError> {
        let item = self.get_mut(id)?;
        if item.is_folder() {
            return Err(DriveError::NotAFile(id.to_string()));
        }
        item.content = Some(content.into());
        Ok(())
    }

    /// Delete an item and its whole subtree, returning the removed items
    ///
    /// # Errors
    /// `DriveError::NotFound` if `id` is unknown.
    pub fn delete(&mut self, id: &str) -> Result<Vec<DriveItem>, DriveError> {
        if !self.nodes.contains_key(id) {
            return Err(DriveError::NotFound(id.to_string()));
        }

        let mut doomed = HashSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if !doomed.insert(current.clone()) {
                continue;
            }
            stack.extend(
                self.nodes
                    .values()
                    .filter(|item| item.parent_id.as_deref() == Some(current.as_str()))
                    .map(|item| item.id.clone()),
            );
        }

        let mut removed = Vec::with_capacity(doomed.len());
        self.nodes.retain(|key, item| {
            if doomed.contains(key) {
                removed.push(item.clone());
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    /// Re-parent an item (`None` moves it to the root)
    ///
    /// The target must be an existing folder that is neither the item itself
    /// nor one of its descendants.
    ///
    /// # Errors
    /// - `DriveError::NotFound` if `id` is unknown
    /// - `DriveError::ParentNotFound` / `DriveError::NotAFolder` for a bad target
    /// - `DriveError::CycleDetected` if the target lies inside the moved subtree
    pub fn move_item(&mut self, id: &str, new_parent: Option<&str>) -> Result<(), DriveError> {
        if !self.nodes.contains_key(id) {
            return Err(DriveError::NotFound(id.to_string()));
        }

        if let Some(target) = new_parent {
            self.require_folder(id, target)?;
            if self.is_within(target, id) {
                return Err(DriveError::CycleDetected {
                    id: id.to_string(),
                    target: target.to_string(),
                });
            }
        }

        let item = self.get_mut(id)?;
        item.parent_id = new_parent.map(str::to_string);
        Ok(())
    }

    /// Whether `node` is `ancestor` or lies somewhere below it
    #[must_use]
    pub fn is_within(&self, node: &str, ancestor: &str) -> bool {
        let mut cursor = Some(node);
        let mut steps = 0usize;
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                // corrupt chain that loops without reaching `ancestor`
                return false;
            }
            cursor = self
                .nodes
                .get(current)
                .and_then(|item| item.parent_id.as_deref());
        }
        false
    }

    /// Flatten back into the persisted list
    #[must_use]
    pub fn into_items(self) -> Vec<DriveItem> {
        self.nodes.into_values().collect()
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut DriveItem, DriveError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| DriveError::NotFound(id.to_string()))
    }

    fn require_folder(&self, id: &str, parent_id: &str) -> Result<(), DriveError> {
        match self.nodes.get(parent_id) {
            None => Err(DriveError::ParentNotFound {
                id: id.to_string(),
                parent: parent_id.to_string(),
            }),
            Some(parent) if !parent.is_folder() => Err(DriveError::NotAFolder(parent_id.to_string())),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DriveTree, String, String, String) {
        let mut tree = DriveTree::new();
        let docs = tree.create_folder("Docs", None, "u1").unwrap();
        let reports = tree.create_folder("Reports", Some(&docs), "u1").unwrap();
        let file = tree.create_file("q1.txt", Some(&reports), "u1").unwrap();
        (tree, docs, reports, file)
    }

    #[test]
    fn move_into_descendant_is_rejected() {
        let (mut tree, docs, reports, _) = sample();
        let err = tree.move_item(&docs, Some(&reports)).unwrap_err();
        assert!(matches!(err, DriveError::CycleDetected { .. }));
        assert_eq!(tree.get(&docs).unwrap().parent_id, None);
    }

    #[test]
    fn move_into_itself_is_rejected() {
        let (mut tree, docs, _, _) = sample();
        assert!(matches!(
            tree.move_item(&docs, Some(&docs)),
            Err(DriveError::CycleDetected { .. })
        ));
    }

    #[test]
    fn move_into_file_is_rejected() {
        let (mut tree, docs, _, file) = sample();
        assert_eq!(
            tree.move_item(&docs, Some(&file)),
            Err(DriveError::NotAFolder(file))
        );
    }

    #[test]
    fn move_to_root_and_sideways() {
        let (mut tree, docs, reports, file) = sample();
        tree.move_item(&reports, None).unwrap();
        tree.move_item(&file, Some(&docs)).unwrap();
        assert!(tree.validate().is_ok());
        assert_eq!(tree.children(None, "u1").count(), 2);
    }

    #[test]
    fn delete_removes_subtree() {
        let (mut tree, docs, _, _) = sample();
        let other = tree.create_folder("Other", None, "u1").unwrap();
        let removed = tree.delete(&docs).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(tree.len(), 1);
        assert!(tree.get(&other).is_some());
    }

    #[test]
    fn breadcrumbs_run_root_first() {
        let (tree, _, _, file) = sample();
        let names: Vec<_> = tree
            .breadcrumbs(&file)
            .unwrap()
            .into_iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, ["Docs", "Reports", "q1.txt"]);
    }

    #[test]
    fn from_items_rejects_cycles() {
        let (tree, docs, reports, _) = sample();
        let mut items = tree.into_items();
        for item in &mut items {
            if item.id == docs {
                item.parent_id = Some(reports.clone());
            }
        }
        assert!(matches!(
            DriveTree::from_items(items),
            Err(DriveError::CycleDetected { .. })
        ));
    }

    #[test]
    fn content_edits_only_on_files() {
        let (mut tree, docs, _, file) = sample();
        tree.update_content(&file, "numbers").unwrap();
        assert_eq!(tree.get(&file).unwrap().content.as_deref(), Some("numbers"));
        assert_eq!(
            tree.update_content(&docs, "x"),
            Err(DriveError::NotAFile(docs))
        );
    }

    #[test]
    fn children_filter_by_owner() {
        let (mut tree, _, _, _) = sample();
        tree.create_folder("Mine", None, "u2").unwrap();
        assert_eq!(tree.children(None, "u2").count(), 1);
        assert_eq!(tree.children(None, "u1").count(), 1);
    }
}
