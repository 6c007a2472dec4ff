//! Monthly snapshots
//!
//! Every month is an independent record; switching the active month swaps
//! the whole visible dataset.

use crate::drive::DriveTree;
use crate::error::{DriveError, ModelError};
use crate::types::{
    new_id, Assignee, ChatMessage, Client, DriveItem, SalesGoal, StatusFlag, Task, TaskStatus,
    User, WikiItem,
};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Month key, e.g. `"March 2024"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthKey(String);

impl MonthKey {
    /// Wrap an existing key
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key of the month containing `date`
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format("%B %Y").to_string())
    }

    /// Key of the current local month
    #[must_use]
    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    /// The twelve month keys of `year`, January first
    #[must_use]
    pub fn months_of_year(year: i32) -> Vec<Self> {
        (1..=12)
            .filter_map(|month| NaiveDate::from_ymd_opt(year, month, 1))
            .map(Self::from_date)
            .collect()
    }

    /// Keys of the current local year
    #[must_use]
    pub fn current_year() -> Vec<Self> {
        Self::months_of_year(Local::now().year())
    }

    /// Key as stored
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MonthKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One month of operational data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub sales_goal: SalesGoal,
    #[serde(default)]
    pub chat_messages: Vec<ChatMessage>,
    #[serde(default)]
    pub drive: Vec<DriveItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki: Option<Vec<WikiItem>>,
    /// Fields written by other clients that this crate does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MonthRecord {
    /// Clients that are not paused
    pub fn active_clients(&self) -> impl Iterator<Item = &Client> {
        self.clients.iter().filter(|c| !c.is_paused)
    }

    /// Tasks visible to a member (assigned to them or to everyone)
    pub fn tasks_for<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks
            .iter()
            .filter(move |t| t.assigned_to.includes(user_id))
    }

    /// Add a pending task at the top of the list, returning its id
    pub fn add_task(&mut self, title: impl Into<String>, assigned_to: Assignee) -> String {
        let id = new_id();
        self.tasks.insert(
            0,
            Task {
                id: id.clone(),
                title: title.into(),
                description: None,
                assigned_to,
                status: TaskStatus::Pending,
                kind: None,
                extra: Map::new(),
            },
        );
        id
    }

    /// Flip a task between pending and completed
    ///
    /// # Errors
    /// `ModelError::TaskNotFound`
    pub fn toggle_task(&mut self, task_id: &str) -> Result<TaskStatus, ModelError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| ModelError::TaskNotFound(task_id.to_string()))?;
        task.status = task.status.toggled();
        Ok(task.status)
    }

    /// Remove a task
    ///
    /// # Errors
    /// `ModelError::TaskNotFound`
    pub fn remove_task(&mut self, task_id: &str) -> Result<Task, ModelError> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| ModelError::TaskNotFound(task_id.to_string()))?;
        Ok(self.tasks.remove(idx))
    }

    /// Look up a client
    #[must_use]
    pub fn client(&self, client_id: &str) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == client_id)
    }

    /// Hand a client to a manager (`None` unassigns)
    ///
    /// # Errors
    /// `ModelError::ClientNotFound`
    pub fn assign_manager(
        &mut self,
        client_id: &str,
        manager_id: Option<&str>,
    ) -> Result<(), ModelError> {
        self.client_mut(client_id)?.manager_id = manager_id.map(str::to_string);
        Ok(())
    }

    /// Pause or resume a client, returning the new paused flag
    ///
    /// # Errors
    /// `ModelError::ClientNotFound`
    pub fn toggle_paused(&mut self, client_id: &str) -> Result<bool, ModelError> {
        let client = self.client_mut(client_id)?;
        client.is_paused = !client.is_paused;
        Ok(client.is_paused)
    }

    /// Set the health flag
    ///
    /// # Errors
    /// `ModelError::ClientNotFound`
    pub fn set_status_flag(&mut self, client_id: &str, flag: StatusFlag) -> Result<(), ModelError> {
        self.client_mut(client_id)?.status_flag = flag;
        Ok(())
    }

    /// Remove a client for good
    ///
    /// # Errors
    /// `ModelError::ClientNotFound`
    pub fn remove_client(&mut self, client_id: &str) -> Result<Client, ModelError> {
        let idx = self
            .clients
            .iter()
            .position(|c| c.id == client_id)
            .ok_or_else(|| ModelError::ClientNotFound(client_id.to_string()))?;
        Ok(self.clients.remove(idx))
    }

    /// Append a chat message from `sender`
    ///
    /// # Errors
    /// `ModelError::EmptyMessage` for blank text
    pub fn post_message(&mut self, sender: &User, text: &str) -> Result<&ChatMessage, ModelError> {
        if text.trim().is_empty() {
            return Err(ModelError::EmptyMessage);
        }
        self.chat_messages.push(ChatMessage {
            id: new_id(),
            sender_id: sender.id.clone(),
            sender_name: sender.name.clone(),
            text: text.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
        Ok(&self.chat_messages[self.chat_messages.len() - 1])
    }

    /// Arena view of this month's drive
    ///
    /// # Errors
    /// Any invariant violation in the stored items.
    pub fn drive_tree(&self) -> Result<DriveTree, DriveError> {
        DriveTree::from_items(self.drive.clone())
    }

    /// Apply a drive edit; the stored items change only if the edit succeeds
    ///
    /// # Errors
    /// Whatever the stored tree or the edit reports.
    pub fn edit_drive<R>(
        &mut self,
        edit: impl FnOnce(&mut DriveTree) -> Result<R, DriveError>,
    ) -> Result<R, DriveError> {
        let mut tree = self.drive_tree()?;
        let out = edit(&mut tree)?;
        self.drive = tree.into_items();
        Ok(out)
    }

    fn client_mut(&mut self, client_id: &str) -> Result<&mut Client, ModelError> {
        self.clients
            .iter_mut()
            .find(|c| c.id == client_id)
            .ok_or_else(|| ModelError::ClientNotFound(client_id.to_string()))
    }
}
