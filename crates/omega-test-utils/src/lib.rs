//! Testing utilities for the Omega workspace
//!
//! Shared fixtures, fakes and scripted collaborators.

#![allow(missing_docs)]

use async_trait::async_trait;
use omega_model::{AppState, MonthKey, SeedOptions, User, SEED_CEO_ID};
use omega_store::{
    CacheError, ConnectivityProbe, ConnectivityReport, ConnectivityStatus, KeyValueBackend,
    MemoryBackend, MemoryRemoteStore, RemoteRecord,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SCENARIO_MONTH: &str = "March 2024";
pub const SCENARIO_CEO_EMAIL: &str = "ceo@x.com";

/// Seed of the first-run scenario: CEO `ceo@x.com`, month "March 2024"
pub fn scenario_seed() -> SeedOptions {
    SeedOptions::new()
        .with_ceo("Board", SCENARIO_CEO_EMAIL)
        .with_month(MonthKey::new(SCENARIO_MONTH))
}

pub fn scenario_state() -> AppState {
    AppState::seed(&scenario_seed())
}

/// Scenario state plus an active manager, an active seller and an inactive
/// seller; returns their ids in that order
pub fn staffed_state() -> (AppState, [String; 3]) {
    let mut state = scenario_state();
    let manager = state
        .add_member("Ana Manager", "ana@x.com", "MANAGER")
        .unwrap()
        .id
        .clone();
    let seller = state
        .add_member("Sam Seller", "sam@x.com", "SALES")
        .unwrap()
        .id
        .clone();
    let former = state
        .add_member("Fay Former", "fay@x.com", "SALES")
        .unwrap()
        .id
        .clone();
    state.set_active(&former, false).unwrap();
    (state, [manager, seller, former])
}

pub fn ceo(state: &AppState) -> User {
    state.user(SEED_CEO_ID).cloned().unwrap()
}

pub fn memory_backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new())
}

/// Remote store already holding `state` at `revision`
pub fn remote_with(state: AppState, revision: u64) -> Arc<MemoryRemoteStore> {
    Arc::new(MemoryRemoteStore::with_record(RemoteRecord::new(
        state, revision,
    )))
}

/// Probe that replays a script, repeating the last entry forever
#[derive(Debug)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<ConnectivityStatus>>,
    last: Mutex<ConnectivityStatus>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(script: impl IntoIterator<Item = ConnectivityStatus>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(ConnectivityStatus::Connected),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(status: ConnectivityStatus) -> Self {
        Self::new([status])
    }

    /// Replace the remaining script
    pub fn set(&self, script: impl IntoIterator<Item = ConnectivityStatus>) {
        *self.script.lock() = script.into_iter().collect();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectivityProbe for ScriptedProbe {
    async fn probe(&self) -> ConnectivityReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        let status = match next {
            Some(status) => {
                *self.last.lock() = status;
                status
            }
            None => *self.last.lock(),
        };
        ConnectivityReport::new(status)
    }
}

/// Backend whose writes always fail (full disk, private browsing quota)
#[derive(Debug, Default)]
pub struct FailingBackend {
    attempts: AtomicUsize,
}

impl FailingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl KeyValueBackend for FailingBackend {
    fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("storage quota exceeded".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}
