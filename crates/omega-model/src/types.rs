//! Record types stored inside the application document
//!
//! Field names serialize in camelCase so documents written by the web
//! dashboard load unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Role name reserved for the company owner
pub const CEO_ROLE: &str = "CEO";

/// Task assignee sentinel meaning "everyone"
pub const ALL_ASSIGNEES: &str = "ALL";

/// Roles every new document starts with
pub const DEFAULT_ROLES: [&str; 3] = [CEO_ROLE, "MANAGER", "SALES"];

static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));

/// Generate a fresh record identifier
#[inline]
#[must_use]
pub fn new_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// Normalize an email for lookup: trimmed and case-folded
#[inline]
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Check that an email has the `local@domain.tld` shape
#[inline]
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email.trim())
}

/// Team role
///
/// Roles are free-form (the roster can grow new ones) but always stored
/// upper-case with underscores, e.g. `ACCOUNT_MANAGER`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Create role from a display name
    #[must_use]
    pub fn new(name: &str) -> Self {
        let normalized = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_uppercase();
        Self(normalized)
    }

    /// The CEO role
    #[inline]
    #[must_use]
    pub fn ceo() -> Self {
        Self(CEO_ROLE.to_string())
    }

    /// Check if this is the CEO role
    #[inline]
    #[must_use]
    pub fn is_ceo(&self) -> bool {
        self.0 == CEO_ROLE
    }

    /// Role name as stored
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_true() -> bool {
    true
}

/// Legacy documents use `""` for "no manager".
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Team member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique within the team
    pub id: String,
    /// Display name
    pub name: String,
    /// Login key, compared trimmed and case-folded
    #[serde(default)]
    pub email: String,
    /// Stored credential; `None` means first access is pending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Role name
    pub role: Role,
    /// Inactive members cannot sign in
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Accumulated sales
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_volume: Option<f64>,
    /// Personal monthly goal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_goal: Option<f64>,
    /// Stretch goal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_goal: Option<f64>,
    /// Fields written by other clients that this crate does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Create an active member with a fresh id and no credential
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            email: email.into(),
            password: None,
            role,
            is_active: true,
            sales_volume: None,
            personal_goal: None,
            super_goal: None,
            extra: Map::new(),
        }
    }

    /// With a fixed id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// With a stored credential
    #[inline]
    #[must_use]
    pub fn with_password(mut self, credential: impl Into<String>) -> Self {
        self.password = Some(credential.into());
        self
    }

    /// With active flag
    #[inline]
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Check if the member is the CEO
    #[inline]
    #[must_use]
    pub fn is_ceo(&self) -> bool {
        self.role.is_ceo()
    }

    /// Whether a credential has been set (an empty string counts as unset)
    #[inline]
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Case-insensitive, whitespace-tolerant email comparison
    #[must_use]
    pub fn matches_email(&self, email: &str) -> bool {
        let wanted = normalize_email(email);
        !wanted.is_empty() && normalize_email(&self.email) == wanted
    }
}

/// Account health flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusFlag {
    /// On track
    #[default]
    Green,
    /// Needs attention
    Yellow,
    /// At risk
    Red,
}

/// Free-text working folder attached to a client
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFolder {
    #[serde(default)]
    pub briefing: String,
    #[serde(default)]
    pub access_links: String,
    #[serde(default)]
    pub operational_history: String,
}

/// Client account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub health: String,
    /// Percentage, 0..=100
    #[serde(default)]
    pub progress: f64,
    /// Owning manager
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub manager_id: Option<String>,
    /// Salesperson who closed the deal
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub sales_id: Option<String>,
    #[serde(default)]
    pub contract_value: f64,
    #[serde(default)]
    pub status_flag: StatusFlag,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub folder: ClientFolder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_notes: Option<String>,
    /// Fields written by other clients that this crate does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Client {
    /// Create an unassigned, green, zero-progress client
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            industry: String::new(),
            health: String::new(),
            progress: 0.0,
            manager_id: None,
            sales_id: None,
            contract_value: 0.0,
            status_flag: StatusFlag::Green,
            is_paused: false,
            folder: ClientFolder::default(),
            notes: None,
            closing_notes: None,
            extra: Map::new(),
        }
    }
}

/// Checklist task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    /// The other status
    #[inline]
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }
}

/// Who a task is assigned to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Assignee {
    /// Every team member
    All,
    /// One member by id
    User(String),
}

impl Assignee {
    /// Whether a member sees this task
    #[inline]
    #[must_use]
    pub fn includes(&self, user_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::User(id) => id == user_id,
        }
    }
}

impl From<String> for Assignee {
    fn from(value: String) -> Self {
        if value == ALL_ASSIGNEES {
            Self::All
        } else {
            Self::User(value)
        }
    }
}

impl From<Assignee> for String {
    fn from(value: Assignee) -> Self {
        match value {
            Assignee::All => ALL_ASSIGNEES.to_string(),
            Assignee::User(id) => id,
        }
    }
}

/// Checklist task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub assigned_to: Assignee,
    #[serde(default)]
    pub status: TaskStatus,
    /// Free-form category such as `"DAILY"`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Fields written by other clients that this crate does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Monthly sales targets and progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesGoal {
    pub monthly_target: f64,
    pub monthly_super_target: f64,
    #[serde(default)]
    pub current_value: f64,
    #[serde(default)]
    pub total_sales: u64,
    #[serde(default)]
    pub contract_form_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_notes: Option<String>,
}

impl SalesGoal {
    /// Fraction of the monthly target reached
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.monthly_target > 0.0 {
            self.current_value / self.monthly_target
        } else {
            0.0
        }
    }
}

impl Default for SalesGoal {
    fn default() -> Self {
        Self {
            monthly_target: 100_000.0,
            monthly_super_target: 150_000.0,
            current_value: 0.0,
            total_sales: 0,
            contract_form_url: String::new(),
            sales_notes: None,
        }
    }
}

/// Team chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Kind of Drive node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriveItemKind {
    Folder,
    File,
}

/// Drive node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DriveItemKind,
    /// `None` is the root
    #[serde(default)]
    pub parent_id: Option<String>,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl DriveItem {
    /// Check if the node can hold children
    #[inline]
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == DriveItemKind::Folder
    }
}

/// Wiki page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WikiItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_are_normalized() {
        assert_eq!(Role::new("account  manager").as_str(), "ACCOUNT_MANAGER");
        assert!(Role::new("ceo").is_ceo());
    }

    #[test]
    fn email_matching_ignores_case_and_padding() {
        let user = User::new("Ana", "ana@omega.com", Role::new("MANAGER"));
        assert!(user.matches_email("  ANA@Omega.com "));
        assert!(!user.matches_email(""));
    }

    #[test]
    fn empty_password_counts_as_unset() {
        let user = User::new("Ana", "ana@omega.com", Role::new("MANAGER")).with_password("");
        assert!(!user.has_credential());
    }

    #[test]
    fn legacy_empty_manager_reads_as_none() {
        let json = r#"{"id":"c1","name":"Acme","managerId":"","statusFlag":"RED"}"#;
        let client: Client = serde_json::from_str(json).unwrap();
        assert_eq!(client.manager_id, None);
        assert_eq!(client.status_flag, StatusFlag::Red);
    }

    #[test]
    fn assignee_uses_all_sentinel() {
        let task: Task =
            serde_json::from_str(r#"{"id":"t1","assignedTo":"ALL","status":"COMPLETED"}"#).unwrap();
        assert_eq!(task.assigned_to, Assignee::All);
        assert!(task.assigned_to.includes("anyone"));

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["assignedTo"], "ALL");
    }

    #[test]
    fn drive_item_serializes_root_parent_as_null() {
        let item = DriveItem {
            id: "d1".into(),
            name: "Docs".into(),
            kind: DriveItemKind::Folder,
            parent_id: None,
            owner_id: "u1".into(),
            content: None,
            created_at: String::new(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json["parentId"].is_null());
        assert_eq!(json["type"], "FOLDER");
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ceo@x.com"));
        assert!(!is_valid_email("ceo@x"));
        assert!(!is_valid_email("not an email"));
    }
}
