// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Custom resources for volume maintenance operations, as reconciled by the
//! local storage controller.
//!
//! This crate only ever reads these objects. The shapes here mirror the
//! `hwameistor.io/v1alpha1` API closely enough to deserialize what the
//! controller writes, and no further.

use std::fmt;

use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::{Deserialize, Serialize};

pub mod local_volume_convert;
pub mod local_volume_expand;
pub mod local_volume_migrate;

/// The API group shared by all operation resources.
pub const API_GROUP: &str = "hwameistor.io";

/// The lifecycle state of an operation, as recorded in its status.
///
/// States the controller may add later deserialize as [`OperationState::Other`]
/// and keep their literal text.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum OperationState {
    /// Accepted by the controller but not yet started.
    Submitted,
    InProgress,
    Completed,
    /// An abort was requested and has not yet been acted on.
    ToBeAborted,
    Cancelled,
    Aborted,
    Failed,
    Unknown,
    Other(String),
}

impl OperationState {
    /// The literal state string used by the controller.
    pub fn as_str(&self) -> &str {
        match self {
            OperationState::Submitted => "Submitted",
            OperationState::InProgress => "InProgress",
            OperationState::Completed => "Completed",
            OperationState::ToBeAborted => "ToBeAborted",
            OperationState::Cancelled => "Cancelled",
            OperationState::Aborted => "Aborted",
            OperationState::Failed => "Failed",
            OperationState::Unknown => "Unknown",
            OperationState::Other(state) => state.as_str(),
        }
    }
}

impl From<String> for OperationState {
    fn from(state: String) -> OperationState {
        match state.as_str() {
            "Submitted" => OperationState::Submitted,
            "InProgress" => OperationState::InProgress,
            "Completed" => OperationState::Completed,
            "ToBeAborted" => OperationState::ToBeAborted,
            "Cancelled" => OperationState::Cancelled,
            "Aborted" => OperationState::Aborted,
            "Failed" => OperationState::Failed,
            "Unknown" => OperationState::Unknown,
            _ => OperationState::Other(state),
        }
    }
}

impl From<OperationState> for String {
    fn from(state: OperationState) -> String {
        match state {
            OperationState::Other(state) => state,
            known => known.as_str().to_string(),
        }
    }
}

impl JsonSchema for OperationState {
    fn schema_name() -> String {
        "OperationState".into()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        String::json_schema(generator)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders an optional state the way the controller does: an operation that
/// has not been given a state yet reports the empty string.
pub(crate) fn state_label(state: Option<&OperationState>) -> String {
    state.map(|s| s.as_str()).unwrap_or_default().to_string()
}
