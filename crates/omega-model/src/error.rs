//! Error types for the application document
//!
//! Two families:
//! - `DriveError` for tree-shaped Drive edits
//! - `ModelError` for everything else (team roster, months, invariants)

/// Drive tree errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriveError {
    /// No item with this id
    #[error("drive item not found: {0}")]
    NotFound(String),

    /// Item points at a parent that does not exist
    #[error("drive item {id} references missing parent {parent}")]
    ParentNotFound { id: String, parent: String },

    /// Target of a create/move is a file
    #[error("drive item {0} is not a folder")]
    NotAFolder(String),

    /// Content edits are only valid on files
    #[error("drive item {0} is not a file")]
    NotAFile(String),

    /// Move would make a node its own ancestor
    #[error("moving {id} under {target} would create a cycle")]
    CycleDetected { id: String, target: String },

    /// Two items share an id
    #[error("duplicate drive item id: {0}")]
    DuplicateId(String),

    /// Blank item name
    #[error("drive item name cannot be empty")]
    EmptyName,
}

/// Application document errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// No team member with this id
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// No client with this id in the month
    #[error("client not found: {0}")]
    ClientNotFound(String),

    /// No task with this id in the month
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// Email already used by another member
    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    /// Two members share an id
    #[error("duplicate user id: {0}")]
    DuplicateUserId(String),

    /// Email does not look like an address
    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),

    /// Blank member name
    #[error("member name cannot be empty")]
    EmptyName,

    /// Role is not in `availableRoles`
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// Attempted change to the CEO account
    #[error("the CEO account cannot be {0}")]
    CeoProtected(&'static str),

    /// Attempted to create a second CEO
    #[error("only one team member may hold the CEO role")]
    SecondCeo,

    /// Document does not have exactly one CEO
    #[error("expected exactly one CEO, found {0}")]
    CeoCount(usize),

    /// Blank chat message
    #[error("message text cannot be empty")]
    EmptyMessage,

    /// Sale amount not strictly positive
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    /// Drive of a stored month violates the tree invariants
    #[error("drive of {month} is invalid: {source}")]
    InvalidDrive {
        /// Month key
        month: String,
        /// Underlying violation
        #[source]
        source: DriveError,
    },

    /// Drive edit failed
    #[error(transparent)]
    Drive(#[from] DriveError),
}

impl ModelError {
    /// Whether the error came from a CEO invariant
    #[inline]
    #[must_use]
    pub fn is_ceo_violation(&self) -> bool {
        matches!(
            self,
            Self::CeoProtected(_) | Self::SecondCeo | Self::CeoCount(_)
        )
    }
}
