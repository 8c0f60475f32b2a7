// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! One prometheus collector for every operation kind.

use std::sync::Arc;

use prometheus::Registry;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;

use crate::collector::{KindCollector, NowFn};
use crate::crd::local_volume_convert::v1alpha1::LocalVolumeConvert;
use crate::crd::local_volume_expand::v1alpha1::LocalVolumeExpand;
use crate::crd::local_volume_migrate::v1alpha1::LocalVolumeMigrate;
use crate::kind::{Convert, Expand, Migrate};
use crate::store::SnapshotStore;

/// The snapshot stores to collect from, one per kind.
#[derive(Clone)]
pub struct OperationStores {
    pub convert: Arc<dyn SnapshotStore<LocalVolumeConvert>>,
    pub expand: Arc<dyn SnapshotStore<LocalVolumeExpand>>,
    pub migrate: Arc<dyn SnapshotStore<LocalVolumeMigrate>>,
}

/// Convert, expand and migrate collectors behind a single
/// [`Collector`].
///
/// The kinds are collected independently; one kind's store failing has no
/// effect on the others.
#[derive(Debug)]
pub struct OperationMetrics {
    convert: KindCollector<Convert>,
    expand: KindCollector<Expand>,
    migrate: KindCollector<Migrate>,
}

impl OperationMetrics {
    pub fn new(stores: OperationStores) -> Result<OperationMetrics, prometheus::Error> {
        Ok(OperationMetrics {
            convert: KindCollector::new(stores.convert)?,
            expand: KindCollector::new(stores.expand)?,
            migrate: KindCollector::new(stores.migrate)?,
        })
    }

    /// Replaces the clock used by every kind.
    pub fn with_clock(self, now: NowFn) -> OperationMetrics {
        OperationMetrics {
            convert: self.convert.with_clock(Arc::clone(&now)),
            expand: self.expand.with_clock(Arc::clone(&now)),
            migrate: self.migrate.with_clock(now),
        }
    }

    /// Registers these collectors into `registry`.
    pub fn register_into(self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self))
    }
}

impl Collector for OperationMetrics {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.convert.desc();
        descs.extend(self.expand.desc());
        descs.extend(self.migrate.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut families = self.convert.collect();
        families.extend(self.expand.collect());
        families.extend(self.migrate.collect());
        families
    }
}
