// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! LocalVolumeExpand custom resource, which asks the controller to grow a
//! volume to a new capacity.

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
        kind = "LocalVolumeExpand",
        singular = "localvolumeexpand",
        plural = "localvolumeexpands",
        shortname = "lvexpand",
        status = "LocalVolumeExpandStatus",
        printcolumn = r#"{"name": "Volume", "type": "string", "jsonPath": ".spec.volumeName"}"#,
        printcolumn = r#"{"name": "RequiredCapacity", "type": "integer", "jsonPath": ".spec.requiredCapacityBytes"}"#,
        printcolumn = r#"{"name": "State", "type": "string", "jsonPath": ".status.state"}"#
    )]
    pub struct LocalVolumeExpandSpec {
        /// The volume to expand.
        pub volume_name: String,
        /// The capacity the volume should have once the expansion completes.
        #[serde(default)]
        pub required_capacity_bytes: i64,
        #[serde(default)]
        pub abort: bool,
    }

    #[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct LocalVolumeExpandStatus {
        /// The capacity actually allocated so far, across all replicas.
        pub allocated_capacity_bytes: Option<i64>,
        pub state: Option<OperationState>,
        pub message: Option<String>,
    }
}

use v1alpha1::LocalVolumeExpand;

impl OperationObject for LocalVolumeExpand {
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
