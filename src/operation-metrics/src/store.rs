// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Read access to cached operation objects.
//!
//! Collectors never talk to the API server. They list whatever a
//! [`SnapshotStore`] currently holds, and the store is kept fresh by someone
//! else (see [`kubernetes`]).

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::kind::OperationObject;

pub mod kubernetes;

/// Label equality requirements. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    match_labels: BTreeMap<String, String>,
}

impl Selector {
    /// A selector that matches every object.
    pub fn everything() -> Selector {
        Selector::default()
    }

    /// Adds the requirement that label `key` equals `value`.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Selector {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    pub fn is_everything(&self) -> bool {
        self.match_labels.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

/// An error listing objects from a [`SnapshotStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The cache has not yet applied its initial listing.
    #[error("{kind} cache has not completed its initial sync")]
    NotSynced { kind: &'static str },
    /// The cache is no longer being maintained.
    #[error("{kind} cache is unavailable: {reason}")]
    Unavailable { kind: &'static str, reason: String },
}

/// A concurrently readable cache of objects of one kind.
///
/// Implementations must tolerate concurrent `list` calls from several
/// collectors while their own refresh is writing.
pub trait SnapshotStore<T>: Send + Sync {
    /// Returns every cached object that matches `selector`, in no particular
    /// order.
    fn list(&self, selector: &Selector) -> Result<Vec<Arc<T>>, StoreError>;
}

/// A [`SnapshotStore`] whose contents are set directly.
#[derive(Debug)]
pub struct StaticSnapshotStore<T> {
    kind: &'static str,
    state: RwLock<Result<Vec<Arc<T>>, StoreError>>,
}

impl<T> StaticSnapshotStore<T> {
    /// Creates an empty store for objects of `kind`.
    pub fn new(kind: &'static str) -> StaticSnapshotStore<T> {
        StaticSnapshotStore {
            kind,
            state: RwLock::new(Ok(Vec::new())),
        }
    }

    /// Replaces the store's contents.
    pub fn replace(&self, objects: impl IntoIterator<Item = T>) {
        let objects = objects.into_iter().map(Arc::new).collect();
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = Ok(objects);
    }

    /// Makes every subsequent list fail until the next [`Self::replace`].
    pub fn fail(&self, reason: impl Into<String>) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = Err(StoreError::Unavailable {
            kind: self.kind,
            reason: reason.into(),
        });
    }
}

impl<T> SnapshotStore<T> for StaticSnapshotStore<T>
where
    T: OperationObject,
{
    fn list(&self, selector: &Selector) -> Result<Vec<Arc<T>>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let objects = state.as_ref().map_err(|e| e.clone())?;
        Ok(objects
            .iter()
            .filter(|o| selector.matches(o.selector_labels()))
            .map(Arc::clone)
            .collect())
    }
}
