//! The application document
//!
//! `AppState` is the single unit of persistence: the team roster, the role
//! catalogue and every month's data, always read and written as a whole.

use crate::error::ModelError;
use crate::month::{MonthKey, MonthRecord};
use crate::types::{
    is_valid_email, normalize_email, Client, Role, StatusFlag, User, DEFAULT_ROLES,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashSet;

/// Month key → month record
pub type MonthlyData = IndexMap<String, MonthRecord>;

/// Id given to the seeded CEO account
pub const SEED_CEO_ID: &str = "ceo-master";

/// How a fresh document is seeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedOptions {
    /// Display name of the seeded CEO
    pub ceo_name: String,
    /// Login email of the seeded CEO
    pub ceo_email: String,
    /// Month created empty
    pub month: MonthKey,
}

impl SeedOptions {
    /// Default seed for the current month
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With CEO identity
    #[inline]
    #[must_use]
    pub fn with_ceo(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.ceo_name = name.into();
        self.ceo_email = email.into();
        self
    }

    /// With month
    #[inline]
    #[must_use]
    pub fn with_month(mut self, month: MonthKey) -> Self {
        self.month = month;
        self
    }
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            ceo_name: "Omega Board".to_string(),
            ceo_email: "ceo@omega.local".to_string(),
            month: MonthKey::current(),
        }
    }
}

/// Whole application document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// Team roster
    pub team: Vec<User>,
    /// Role catalogue
    #[serde(default)]
    pub available_roles: Vec<String>,
    /// Per-month data
    #[serde(default)]
    pub db: MonthlyData,
    /// Fields written by other clients that this crate does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppState {
    /// Fresh document: one CEO without a credential, one empty month
    #[must_use]
    pub fn seed(options: &SeedOptions) -> Self {
        let ceo = User::new(&options.ceo_name, &options.ceo_email, Role::ceo()).with_id(SEED_CEO_ID);
        let mut db = MonthlyData::new();
        db.insert(options.month.as_str().to_string(), MonthRecord::default());

        Self {
            team: vec![ceo],
            available_roles: DEFAULT_ROLES.iter().map(|r| (*r).to_string()).collect(),
            db,
            extra: Map::new(),
        }
    }

    /// Check every document invariant
    ///
    /// # Errors
    /// The first violation found: CEO count, duplicate ids or emails, or a
    /// broken drive tree.
    pub fn validate(&self) -> Result<(), ModelError> {
        let ceo_count = self.team.iter().filter(|u| u.is_ceo()).count();
        if ceo_count != 1 {
            return Err(ModelError::CeoCount(ceo_count));
        }

        let mut ids = HashSet::new();
        let mut emails = HashSet::new();
        for user in &self.team {
            if !ids.insert(user.id.as_str()) {
                return Err(ModelError::DuplicateUserId(user.id.clone()));
            }
            let email = normalize_email(&user.email);
            // legacy rosters carry members without an email
            if !email.is_empty() && !emails.insert(email) {
                return Err(ModelError::DuplicateEmail(user.email.clone()));
            }
        }

        for (month, record) in &self.db {
            record
                .drive_tree()
                .map_err(|source| ModelError::InvalidDrive {
                    month: month.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    /// The CEO account
    #[must_use]
    pub fn ceo(&self) -> Option<&User> {
        self.team.iter().find(|u| u.is_ceo())
    }

    /// Look up a member by id
    #[must_use]
    pub fn user(&self, id: &str) -> Option<&User> {
        self.team.iter().find(|u| u.id == id)
    }

    /// Look up a member by email (trimmed, case-folded)
    #[must_use]
    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.team.iter().find(|u| u.matches_email(email))
    }

    /// Stored month, if any
    #[must_use]
    pub fn month(&self, key: &str) -> Option<&MonthRecord> {
        self.db.get(key)
    }

    /// Stored month, or an empty default record for unseen months
    #[must_use]
    pub fn month_or_default(&self, key: &str) -> Cow<'_, MonthRecord> {
        self.db
            .get(key)
            .map_or_else(|| Cow::Owned(MonthRecord::default()), Cow::Borrowed)
    }

    /// Mutable month, created empty on first touch
    pub fn month_mut(&mut self, key: &str) -> &mut MonthRecord {
        self.db.entry(key.to_string()).or_default()
    }

    /// Check if a role is in the catalogue
    #[must_use]
    pub fn has_role(&self, role: &Role) -> bool {
        self.available_roles.iter().any(|r| r == role.as_str())
    }

    /// Add a role to the catalogue; `false` if it already existed
    ///
    /// # Errors
    /// `ModelError::UnknownRole` for a blank name.
    pub fn add_role(&mut self, name: &str) -> Result<bool, ModelError> {
        let role = Role::new(name);
        if role.as_str().is_empty() {
            return Err(ModelError::UnknownRole(name.to_string()));
        }
        if self.has_role(&role) {
            return Ok(false);
        }
        self.available_roles.push(role.as_str().to_string());
        Ok(true)
    }

    /// Add an active member without a credential
    ///
    /// # Errors
    /// Blank name, malformed or duplicate email, unknown role, or a second CEO.
    pub fn add_member(&mut self, name: &str, email: &str, role: &str) -> Result<&User, ModelError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ModelError::EmptyName);
        }
        if !is_valid_email(email) {
            return Err(ModelError::InvalidEmail(email.to_string()));
        }
        if self.find_by_email(email).is_some() {
            return Err(ModelError::DuplicateEmail(email.trim().to_string()));
        }
        let role = self.catalogued_role(role)?;
        if role.is_ceo() {
            return Err(ModelError::SecondCeo);
        }

        self.team.push(User::new(name, email.trim(), role));
        Ok(&self.team[self.team.len() - 1])
    }

    /// Remove a member
    ///
    /// # Errors
    /// `ModelError::UserNotFound`, or `ModelError::CeoProtected` for the CEO.
    pub fn remove_member(&mut self, id: &str) -> Result<User, ModelError> {
        let idx = self.position(id)?;
        if self.team[idx].is_ceo() {
            return Err(ModelError::CeoProtected("removed"));
        }
        Ok(self.team.remove(idx))
    }

    /// Change a member's role
    ///
    /// # Errors
    /// Unknown member or role, changing the CEO, or promoting to CEO.
    pub fn set_role(&mut self, id: &str, role: &str) -> Result<(), ModelError> {
        let role = self.catalogued_role(role)?;
        let user = self.user_mut(id)?;
        if user.is_ceo() {
            return Err(ModelError::CeoProtected("re-roled"));
        }
        if role.is_ceo() {
            return Err(ModelError::SecondCeo);
        }
        user.role = role;
        Ok(())
    }

    /// Activate or deactivate a member
    ///
    /// # Errors
    /// Unknown member, or deactivating the CEO.
    pub fn set_active(&mut self, id: &str, active: bool) -> Result<(), ModelError> {
        let user = self.user_mut(id)?;
        if user.is_ceo() && !active {
            return Err(ModelError::CeoProtected("deactivated"));
        }
        user.is_active = active;
        Ok(())
    }

    /// Flip a member's active flag, returning the new value
    ///
    /// # Errors
    /// See [`AppState::set_active`].
    pub fn toggle_active(&mut self, id: &str) -> Result<bool, ModelError> {
        let active = !self
            .user(id)
            .ok_or_else(|| ModelError::UserNotFound(id.to_string()))?
            .is_active;
        self.set_active(id, active)?;
        Ok(active)
    }

    /// Set personal and stretch sales goals
    ///
    /// # Errors
    /// `ModelError::UserNotFound`
    pub fn set_personal_goals(
        &mut self,
        id: &str,
        personal: Option<f64>,
        stretch: Option<f64>,
    ) -> Result<(), ModelError> {
        let user = self.user_mut(id)?;
        user.personal_goal = personal;
        user.super_goal = stretch;
        Ok(())
    }

    /// Write back an updated member record (matched by id)
    ///
    /// # Errors
    /// Unknown member, an email clash with another member, or a change that
    /// would break the single-CEO invariant.
    pub fn replace_user(&mut self, updated: User) -> Result<(), ModelError> {
        let idx = self.position(&updated.id)?;
        let clash = self
            .team
            .iter()
            .any(|u| u.id != updated.id && !updated.email.trim().is_empty() && u.matches_email(&updated.email));
        if clash {
            return Err(ModelError::DuplicateEmail(updated.email));
        }

        let current = &self.team[idx];
        match (current.is_ceo(), updated.is_ceo()) {
            (true, false) => return Err(ModelError::CeoProtected("re-roled")),
            (false, true) => return Err(ModelError::SecondCeo),
            _ => {}
        }
        if updated.is_ceo() && !updated.is_active {
            return Err(ModelError::CeoProtected("deactivated"));
        }

        self.team[idx] = updated;
        Ok(())
    }

    /// Register a closed sale in `month`
    ///
    /// Adds to the seller's volume, bumps the month's sales goal, and opens a
    /// new unassigned client for the contract. Returns the client id.
    ///
    /// # Errors
    /// Non-positive amount, or unknown seller.
    pub fn record_sale(
        &mut self,
        month: &str,
        seller_id: &str,
        value: f64,
        client_name: &str,
    ) -> Result<String, ModelError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ModelError::InvalidAmount(value));
        }
        let seller = self.user_mut(seller_id)?;
        seller.sales_volume = Some(seller.sales_volume.unwrap_or(0.0) + value);

        let mut client = Client::new(client_name.trim());
        client.industry = "New Contract".to_string();
        client.health = "Stable".to_string();
        client.sales_id = Some(seller_id.to_string());
        client.contract_value = value;
        client.status_flag = StatusFlag::Green;
        let client_id = client.id.clone();

        let record = self.month_mut(month);
        record.sales_goal.current_value += value;
        record.sales_goal.total_sales += 1;
        record.clients.push(client);

        Ok(client_id)
    }

    fn position(&self, id: &str) -> Result<usize, ModelError> {
        self.team
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| ModelError::UserNotFound(id.to_string()))
    }

    fn user_mut(&mut self, id: &str) -> Result<&mut User, ModelError> {
        self.team
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| ModelError::UserNotFound(id.to_string()))
    }

    fn catalogued_role(&self, name: &str) -> Result<Role, ModelError> {
        let role = Role::new(name);
        if self.has_role(&role) {
            Ok(role)
        } else {
            Err(ModelError::UnknownRole(name.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn march() -> SeedOptions {
        SeedOptions::new()
            .with_ceo("Board", "ceo@x.com")
            .with_month(MonthKey::new("March 2024"))
    }

    #[test]
    fn seed_has_one_ceo_and_an_empty_month() {
        let state = AppState::seed(&march());
        assert_eq!(state.team.len(), 1);
        assert!(state.team[0].is_ceo());
        assert!(!state.team[0].has_credential());
        let month = state.month("March 2024").unwrap();
        assert!(month.clients.is_empty());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn seed_round_trips_through_json() {
        let state = AppState::seed(&march());
        let json = serde_json::to_string(&state).unwrap();
        let back: AppState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn ceo_cannot_be_removed_deactivated_or_reroled() {
        let mut state = AppState::seed(&march());
        assert_eq!(
            state.remove_member(SEED_CEO_ID).unwrap_err(),
            ModelError::CeoProtected("removed")
        );
        assert!(state.set_active(SEED_CEO_ID, false).unwrap_err().is_ceo_violation());
        assert!(state.set_role(SEED_CEO_ID, "MANAGER").unwrap_err().is_ceo_violation());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn no_second_ceo() {
        let mut state = AppState::seed(&march());
        assert_eq!(
            state.add_member("Eve", "eve@x.com", "CEO").unwrap_err(),
            ModelError::SecondCeo
        );
        let id = state.add_member("Ana", "ana@x.com", "manager").unwrap().id.clone();
        assert_eq!(state.set_role(&id, "CEO").unwrap_err(), ModelError::SecondCeo);
    }

    #[test]
    fn member_emails_are_unique_case_insensitively() {
        let mut state = AppState::seed(&march());
        state.add_member("Ana", "ana@x.com", "MANAGER").unwrap();
        assert!(matches!(
            state.add_member("Ana 2", " ANA@x.com ", "SALES"),
            Err(ModelError::DuplicateEmail(_))
        ));
        assert!(matches!(
            state.add_member("Bad", "ana-at-x", "SALES"),
            Err(ModelError::InvalidEmail(_))
        ));
    }

    #[test]
    fn add_role_normalizes_and_deduplicates() {
        let mut state = AppState::seed(&march());
        assert!(state.add_role("account manager").unwrap());
        assert!(!state.add_role("ACCOUNT_MANAGER").unwrap());
        state
            .add_member("Bo", "bo@x.com", "Account Manager")
            .unwrap();
    }

    #[test]
    fn toggle_active_round_trips() {
        let mut state = AppState::seed(&march());
        let id = state.add_member("Ana", "ana@x.com", "MANAGER").unwrap().id.clone();
        assert!(!state.toggle_active(&id).unwrap());
        assert!(state.toggle_active(&id).unwrap());
    }

    #[test]
    fn record_sale_updates_seller_goal_and_clients() {
        let mut state = AppState::seed(&march());
        let seller = state.add_member("Sam", "sam@x.com", "SALES").unwrap().id.clone();

        let client_id = state.record_sale("March 2024", &seller, 5_000.0, "Acme").unwrap();
        state.record_sale("March 2024", &seller, 2_500.0, "Initech").unwrap();

        let month = state.month("March 2024").unwrap();
        assert_eq!(month.sales_goal.current_value, 7_500.0);
        assert_eq!(month.sales_goal.total_sales, 2);
        assert_eq!(month.client(&client_id).unwrap().sales_id.as_deref(), Some(seller.as_str()));
        assert_eq!(state.user(&seller).unwrap().sales_volume, Some(7_500.0));
        assert!(state.record_sale("March 2024", &seller, 0.0, "Zero").is_err());
    }

    #[test]
    fn replace_user_keeps_single_ceo() {
        let mut state = AppState::seed(&march());
        let mut ceo = state.ceo().unwrap().clone();
        ceo.password = Some("secret".into());
        state.replace_user(ceo.clone()).unwrap();
        assert!(state.ceo().unwrap().has_credential());

        ceo.role = Role::new("MANAGER");
        assert!(state.replace_user(ceo).unwrap_err().is_ceo_violation());
    }

    #[test]
    fn unseen_month_reads_as_default() {
        let state = AppState::seed(&march());
        let april = state.month_or_default("April 2024");
        assert_eq!(april.sales_goal.monthly_target, 100_000.0);
        assert!(state.month("April 2024").is_none());
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let mut state = AppState::seed(&march());
        let twin = User::new("Twin", "twin@x.com", Role::new("SALES")).with_id(SEED_CEO_ID);
        state.team.push(twin);
        assert_eq!(
            state.validate().unwrap_err(),
            ModelError::DuplicateUserId(SEED_CEO_ID.to_string())
        );
    }
}
