// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! LocalVolumeConvert custom resource, which asks the controller to convert a
//! non-replicated volume into a highly available one.

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
        kind = "LocalVolumeConvert",
        singular = "localvolumeconvert",
        plural = "localvolumeconverts",
        shortname = "lvconvert",
        status = "LocalVolumeConvertStatus",
        printcolumn = r#"{"name": "Volume", "type": "string", "jsonPath": ".spec.volumeName"}"#,
        printcolumn = r#"{"name": "State", "type": "string", "jsonPath": ".status.state"}"#
    )]
    pub struct LocalVolumeConvertSpec {
        /// The volume to convert.
        pub volume_name: String,
        /// Set once the volume's workload has been stopped and the new replica
        /// may be initialized.
        #[serde(default)]
        pub ready_to_initialize: bool,
        #[serde(default)]
        pub abort: bool,
    }

    #[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct LocalVolumeConvertStatus {
        pub state: Option<OperationState>,
        pub message: Option<String>,
    }
}

use v1alpha1::LocalVolumeConvert;

impl OperationObject for LocalVolumeConvert {
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
