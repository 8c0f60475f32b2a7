// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Snapshot stores backed by Kubernetes reflectors.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::runtime::reflector::{self, Store};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::store::{Selector, SnapshotStore, StoreError};

/// Where a reflector is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReflectorState {
    Syncing,
    Synced,
    Stopped(String),
}

/// A [`SnapshotStore`] mirroring every object of one resource type.
///
/// Lists fail with [`StoreError::NotSynced`] until the watcher has applied its
/// initial listing, and with [`StoreError::Unavailable`] if the watcher task
/// ever exits.
#[derive(Debug, Clone)]
pub struct ReflectorSnapshotStore<K>
where
    K: Resource<DynamicType = ()> + 'static,
{
    kind: &'static str,
    reader: Store<K>,
    state: watch::Receiver<ReflectorState>,
}

impl<K> ReflectorSnapshotStore<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    /// Starts watching `api` on the current tokio runtime.
    pub fn spawn(kind: &'static str, api: Api<K>) -> ReflectorSnapshotStore<K> {
        let (reader, writer) = reflector::store();
        let (state_tx, state_rx) = watch::channel(ReflectorState::Syncing);

        tokio::spawn(async move {
            let events = watcher(api, watcher::Config::default())
                .default_backoff()
                .reflect(writer);
            let mut events = std::pin::pin!(events);
            while let Some(event) = events.next().await {
                match event {
                    Ok(watcher::Event::InitDone) => {
                        info!("{kind} reflector synced");
                        state_tx.send_replace(ReflectorState::Synced);
                    }
                    Ok(_) => {}
                    Err(err) => warn!("{kind} watch error: {err}"),
                }
            }
            warn!("{kind} reflector stopped");
            state_tx.send_replace(ReflectorState::Stopped("watch stream ended".into()));
        });

        ReflectorSnapshotStore {
            kind,
            reader,
            state: state_rx,
        }
    }
}

impl<K> ReflectorSnapshotStore<K>
where
    K: Resource<DynamicType = ()> + 'static,
{
    /// Waits up to `timeout` for the initial listing. Returns whether the
    /// store is synced.
    pub async fn wait_until_synced(&self, timeout: Duration) -> bool {
        let mut state = self.state.clone();
        let synced = tokio::time::timeout(
            timeout,
            state.wait_for(|s| *s != ReflectorState::Syncing),
        )
        .await;
        match synced {
            Ok(Ok(s)) => *s == ReflectorState::Synced,
            Ok(Err(_)) | Err(_) => {
                debug!("{} reflector not synced after {timeout:?}", self.kind);
                false
            }
        }
    }
}

impl<K> SnapshotStore<K> for ReflectorSnapshotStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn list(&self, selector: &Selector) -> Result<Vec<Arc<K>>, StoreError> {
        match &*self.state.borrow() {
            ReflectorState::Syncing => return Err(StoreError::NotSynced { kind: self.kind }),
            ReflectorState::Stopped(reason) => {
                return Err(StoreError::Unavailable {
                    kind: self.kind,
                    reason: reason.clone(),
                });
            }
            ReflectorState::Synced => {}
        }
        let mut objects = self.reader.state();
        if !selector.is_everything() {
            objects.retain(|o| selector.matches(o.labels()));
        }
        Ok(objects)
    }
}
