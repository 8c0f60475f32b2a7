// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-kind adapters.
//!
//! The collection algorithm is the same for every kind of operation. What
//! differs is the metric names and which labels a duration sample carries,
//! and that is all an [`OperationKind`] describes.

use std::collections::BTreeMap;
use std::fmt::Debug;

use chrono::{DateTime, Utc};

use crate::crd::local_volume_convert::v1alpha1::LocalVolumeConvert;
use crate::crd::local_volume_expand::v1alpha1::LocalVolumeExpand;
use crate::crd::local_volume_migrate::v1alpha1::LocalVolumeMigrate;

/// Label carrying the volume an operation targets.
pub const VOLUME_NAME_LABEL: &str = "volumeName";
/// Label carrying the rendered creation time of an operation.
pub const START_TIME_LABEL: &str = "startTime";
/// Label carrying the status value of an aggregate sample.
pub const STATUS_LABEL: &str = "status";

/// The read-only view of an operation object that collection needs.
pub trait OperationObject: Debug + Send + Sync + 'static {
    fn volume_name(&self) -> &str;
    /// When the object was created. Objects that came from the API server
    /// always have one.
    fn creation_time(&self) -> Option<DateTime<Utc>>;
    /// The current status value, or the empty string if none is recorded.
    fn status(&self) -> String;
    /// The object's labels, matched against list selectors.
    fn selector_labels(&self) -> &BTreeMap<String, String>;
}

/// Describes one kind of operation to a [`KindCollector`].
///
/// [`KindCollector`]: crate::collector::KindCollector
pub trait OperationKind: Send + Sync + 'static {
    type Object: OperationObject;

    /// Lowercase resource kind, used in metric names and help text.
    const NAME: &'static str;

    /// Labels a duration sample carries in addition to the volume name and
    /// start time.
    const EXTRA_LABELS: &'static [&'static str] = &[];

    /// Values for [`Self::EXTRA_LABELS`], in the same order.
    fn extra_label_values(_object: &Self::Object) -> Vec<String> {
        Vec::new()
    }

    fn duration_metric_name() -> String {
        format!("hwameistor_{}_duration", Self::NAME)
    }

    fn duration_metric_help() -> String {
        format!("The duration of the {} operation.", Self::NAME)
    }

    fn status_metric_name() -> String {
        format!("hwameistor_{}_status_count", Self::NAME)
    }

    fn status_metric_help() -> String {
        format!("The status summary of the {} operation.", Self::NAME)
    }

    /// All label names of the duration metric, in declaration order.
    fn duration_label_names() -> Vec<&'static str> {
        let mut names = vec![VOLUME_NAME_LABEL, START_TIME_LABEL];
        names.extend_from_slice(Self::EXTRA_LABELS);
        names
    }

    /// Label values for the duration sample of `object`, matching
    /// [`Self::duration_label_names`].
    fn duration_label_values(object: &Self::Object, created: DateTime<Utc>) -> Vec<String> {
        let mut values = vec![
            object.volume_name().to_string(),
            render_start_time(created),
        ];
        values.extend(Self::extra_label_values(object));
        values
    }

    fn status(object: &Self::Object) -> String {
        object.status()
    }
}

/// Renders a creation time in the controller's native text form, e.g.
/// `2024-03-01 10:00:00 +0000 UTC`. A fractional second has its trailing
/// zeros trimmed, so 250ms renders as `.25`.
pub fn render_start_time(time: DateTime<Utc>) -> String {
    let mut rendered = time.format("%Y-%m-%d %H:%M:%S").to_string();
    let nanos = time.timestamp_subsec_nanos() % 1_000_000_000;
    if nanos != 0 {
        let fraction = format!("{nanos:09}");
        rendered.push('.');
        rendered.push_str(fraction.trim_end_matches('0'));
    }
    rendered.push_str(" +0000 UTC");
    rendered
}

/// Volume conversions.
#[derive(Debug, Clone, Copy)]
pub struct Convert;

impl OperationKind for Convert {
    type Object = LocalVolumeConvert;
    const NAME: &'static str = "localvolumeconvert";
}

/// Volume expansions.
#[derive(Debug, Clone, Copy)]
pub struct Expand;

impl OperationKind for Expand {
    type Object = LocalVolumeExpand;
    const NAME: &'static str = "localvolumeexpand";
}

/// Volume migrations. Duration samples also name the nodes involved.
#[derive(Debug, Clone, Copy)]
pub struct Migrate;

impl OperationKind for Migrate {
    type Object = LocalVolumeMigrate;
    const NAME: &'static str = "localvolumemigrate";
    const EXTRA_LABELS: &'static [&'static str] = &["from", "to"];

    fn extra_label_values(object: &LocalVolumeMigrate) -> Vec<String> {
        vec![
            object.source_node().to_string(),
            object.target_node().to_string(),
        ]
    }
}
