// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Prometheus metrics for local volume maintenance operations.
//!
//! The storage controller records every volume conversion, expansion and
//! migration as a custom resource. This crate turns a cached snapshot of those
//! resources into two gauge families per kind each time it is scraped:
//!
//! | Kind | Duration metric | Status-count metric |
//! |---|---|---|
//! | convert | `hwameistor_localvolumeconvert_duration` | `hwameistor_localvolumeconvert_status_count` |
//! | expand | `hwameistor_localvolumeexpand_duration` | `hwameistor_localvolumeexpand_status_count` |
//! | migrate | `hwameistor_localvolumemigrate_duration` | `hwameistor_localvolumemigrate_status_count` |
//!
//! Nothing is remembered between scrapes. A kind whose snapshot is empty, or
//! whose cache cannot be read, reports no samples at all.
//!
//! ```
//! # use std::sync::Arc;
//! # use hwameistor_operation_metrics::registry::{OperationMetrics, OperationStores};
//! # use hwameistor_operation_metrics::store::StaticSnapshotStore;
//! use hwameistor_operation_metrics::crd::local_volume_convert::v1alpha1::LocalVolumeConvert;
//! use hwameistor_operation_metrics::crd::local_volume_expand::v1alpha1::LocalVolumeExpand;
//! use hwameistor_operation_metrics::crd::local_volume_migrate::v1alpha1::LocalVolumeMigrate;
//!
//! let stores = OperationStores {
//!     convert: Arc::new(StaticSnapshotStore::<LocalVolumeConvert>::new("localvolumeconvert")),
//!     expand: Arc::new(StaticSnapshotStore::<LocalVolumeExpand>::new("localvolumeexpand")),
//!     migrate: Arc::new(StaticSnapshotStore::<LocalVolumeMigrate>::new("localvolumemigrate")),
//! };
//! let registry = prometheus::Registry::new();
//! OperationMetrics::new(stores)?.register_into(&registry)?;
//! assert!(registry.gather().is_empty());
//! # Ok::<(), prometheus::Error>(())
//! ```

pub mod collector;
pub mod crd;
pub mod kind;
pub mod registry;
pub mod store;
