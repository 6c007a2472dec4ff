//! Omega Model - the application document
//!
//! Everything the dashboard persists lives in one [`AppState`]:
//! - The team roster with exactly one CEO
//! - The catalogue of assignable roles
//! - Per-month records: clients, tasks, sales goal, chat, drive, wiki
//!
//! The document is always persisted whole. Operations here are pure data
//! edits; persistence and sync live in `omega-store` and `omega-sync`.
//!
//! # Example
//!
//! ```rust
//! use omega_model::{AppState, MonthKey, SeedOptions};
//!
//! let seed = SeedOptions::new()
//!     .with_ceo("Board", "ceo@x.com")
//!     .with_month(MonthKey::new("March 2024"));
//! let mut state = AppState::seed(&seed);
//! let id = state.add_member("Ana", "ana@x.com", "MANAGER").unwrap().id.clone();
//! assert!(state.user(&id).unwrap().is_active);
//! assert!(state.validate().is_ok());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod drive;
pub mod error;
pub mod month;
pub mod state;
pub mod types;

pub use drive::DriveTree;
pub use error::{DriveError, ModelError};
pub use month::{MonthKey, MonthRecord};
pub use state::{AppState, MonthlyData, SeedOptions, SEED_CEO_ID};
pub use types::{
    is_valid_email, new_id, normalize_email, Assignee, ChatMessage, Client, ClientFolder,
    DriveItem, DriveItemKind, Role, SalesGoal, StatusFlag, Task, TaskStatus, User, WikiItem,
    ALL_ASSIGNEES, CEO_ROLE, DEFAULT_ROLES,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the application document
    pub use crate::{
        AppState, Client, DriveTree, ModelError, MonthKey, MonthRecord, Role, SeedOptions, Task,
        User,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
