// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! LocalVolumeMigrate custom resource, which asks the controller to move a
//! volume replica off a node.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::{OperationState, state_label};
use crate::kind::OperationObject;

pub mod v1alpha1 {
    use super::*;

    #[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
    #[serde(rename_all = "camelCase")]
    #[kube(
        group = "hwameistor.io",
        version = "v1alpha1",
        kind = "LocalVolumeMigrate",
        singular = "localvolumemigrate",
        plural = "localvolumemigrates",
        shortname = "lvmigrate",
        status = "LocalVolumeMigrateStatus",
        printcolumn = r#"{"name": "Volume", "type": "string", "jsonPath": ".spec.volumeName"}"#,
        printcolumn = r#"{"name": "Source", "type": "string", "jsonPath": ".spec.sourceNode"}"#,
        printcolumn = r#"{"name": "Target", "type": "string", "jsonPath": ".status.targetNode"}"#,
        printcolumn = r#"{"name": "State", "type": "string", "jsonPath": ".status.state"}"#
    )]
    pub struct LocalVolumeMigrateSpec {
        /// The volume to migrate.
        pub volume_name: String,
        /// The node the replica is moved away from.
        pub source_node: String,
        /// Candidate destinations. The controller picks one, or any
        /// schedulable node if this is empty.
        #[serde(default)]
        pub target_nodes_suggested: Vec<String>,
        /// Migrate every volume in the same volume group along with this one.
        #[serde(default)]
        pub migrate_all_vols: bool,
        #[serde(default)]
        pub abort: bool,
    }

    #[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct LocalVolumeMigrateStatus {
        /// The node chosen by the controller.
        pub target_node: Option<String>,
        pub original_replica_number: Option<i64>,
        pub state: Option<OperationState>,
        pub message: Option<String>,
    }
}

use v1alpha1::LocalVolumeMigrate;

impl LocalVolumeMigrate {
    pub fn source_node(&self) -> &str {
        &self.spec.source_node
    }

    /// The destination node, or the empty string until the controller has
    /// chosen one.
    pub fn target_node(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.target_node.as_deref())
            .unwrap_or_default()
    }
}

impl OperationObject for LocalVolumeMigrate {
    fn volume_name(&self) -> &str {
        &self.spec.volume_name
    }

    fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.metadata.creation_timestamp.as_ref().map(|t| t.0)
    }

    fn status(&self) -> String {
        state_label(self.status.as_ref().and_then(|s| s.state.as_ref()))
    }

    fn selector_labels(&self) -> &BTreeMap<String, String> {
        ResourceExt::labels(self)
    }
}
