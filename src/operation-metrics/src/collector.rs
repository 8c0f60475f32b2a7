// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Scrape-time collection of operation metrics.
//!
//! A [`KindCollector`] keeps no state between scrapes. Every call to
//! [`Collector::collect`] lists the current snapshot and derives two gauge
//! families from it:
//!
//! * `<prefix>_duration`: one sample per object, the seconds elapsed since the
//!   object was created;
//! * `<prefix>_status_count`: one sample per status value seen in this
//!   snapshot, counting the objects in that status.
//!
//! Status values that are not present in the snapshot produce no sample at
//! all, rather than a zero. Consumers must read an absent series as "not
//! observed".

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use prometheus::core::{Collector, Desc};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use tracing::debug;

use crate::kind::{OperationKind, OperationObject, STATUS_LABEL};
use crate::store::{Selector, SnapshotStore};

/// A source of wall-clock time.
pub type NowFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The system clock.
pub fn system_time() -> NowFn {
    Arc::new(Utc::now)
}

/// A duration sample before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationSample {
    /// Values for the kind's duration labels, in declaration order.
    pub label_values: Vec<String>,
    pub seconds: f64,
}

/// Everything derived from one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationSamples {
    pub durations: Vec<DurationSample>,
    /// Object count per status value observed in the snapshot.
    pub status_counts: BTreeMap<String, u64>,
}

/// Collects duration and status metrics for operations of kind `K`.
pub struct KindCollector<K: OperationKind> {
    store: Arc<dyn SnapshotStore<K::Object>>,
    now: NowFn,
    duration_desc: Desc,
    status_desc: Desc,
    kind: PhantomData<K>,
}

impl<K: OperationKind> fmt::Debug for KindCollector<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KindCollector")
            .field("kind", &K::NAME)
            .field("duration_desc", &self.duration_desc)
            .field("status_desc", &self.status_desc)
            .finish_non_exhaustive()
    }
}

impl<K: OperationKind> KindCollector<K> {
    /// Creates a collector reading from `store`, timed by the system clock.
    pub fn new(
        store: Arc<dyn SnapshotStore<K::Object>>,
    ) -> Result<KindCollector<K>, prometheus::Error> {
        let duration_desc = Desc::new(
            K::duration_metric_name(),
            K::duration_metric_help(),
            K::duration_label_names()
                .into_iter()
                .map(String::from)
                .collect(),
            HashMap::new(),
        )?;
        let status_desc = Desc::new(
            K::status_metric_name(),
            K::status_metric_help(),
            vec![STATUS_LABEL.to_string()],
            HashMap::new(),
        )?;
        Ok(KindCollector {
            store,
            now: system_time(),
            duration_desc,
            status_desc,
            kind: PhantomData,
        })
    }

    /// Replaces the clock used to compute durations.
    pub fn with_clock(mut self, now: NowFn) -> KindCollector<K> {
        self.now = now;
        self
    }

    /// Derives samples from the current snapshot.
    ///
    /// Returns `None` if the snapshot could not be read or holds no objects.
    /// The two cases are deliberately indistinguishable to callers.
    pub fn compute_samples(&self) -> Option<OperationSamples> {
        debug!("collecting metrics for {}", K::NAME);
        let objects = match self.store.list(&Selector::everything()) {
            Ok(objects) if !objects.is_empty() => objects,
            Ok(_) => {
                debug!("no {} objects found", K::NAME);
                return None;
            }
            Err(err) => {
                debug!("no {} objects found: {err}", K::NAME);
                return None;
            }
        };

        let now = (self.now)();
        let mut samples = OperationSamples::default();
        for object in &objects {
            *samples.status_counts.entry(K::status(object)).or_default() += 1;
            let Some(created) = object.creation_time() else {
                debug!(
                    "{} for volume {} has no creation time",
                    K::NAME,
                    object.volume_name()
                );
                continue;
            };
            samples.durations.push(DurationSample {
                label_values: K::duration_label_values(object, created),
                seconds: elapsed_seconds(now, created),
            });
        }
        Some(samples)
    }

    fn encode(&self, samples: OperationSamples) -> Vec<MetricFamily> {
        let mut durations = gauge_family(&self.duration_desc);
        for sample in samples.durations {
            durations.mut_metric().push(gauge_metric(
                &self.duration_desc,
                sample.label_values,
                sample.seconds,
            ));
        }

        let mut statuses = gauge_family(&self.status_desc);
        for (status, count) in samples.status_counts {
            statuses
                .mut_metric()
                .push(gauge_metric(&self.status_desc, vec![status], count as f64));
        }

        [durations, statuses]
            .into_iter()
            .filter(|family| !family.get_metric().is_empty())
            .collect()
    }
}

impl<K: OperationKind> Collector for KindCollector<K> {
    /// The duration and status descriptors. Never touches the store.
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.duration_desc, &self.status_desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        match self.compute_samples() {
            Some(samples) => self.encode(samples),
            None => Vec::new(),
        }
    }
}

fn elapsed_seconds(now: DateTime<Utc>, created: DateTime<Utc>) -> f64 {
    let elapsed = now - created;
    match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / 1e6,
        None => elapsed.num_milliseconds() as f64 / 1e3,
    }
}

fn gauge_family(desc: &Desc) -> MetricFamily {
    let mut family = MetricFamily::default();
    family.set_name(desc.fq_name.clone());
    family.set_help(desc.help.clone());
    family.set_field_type(MetricType::GAUGE);
    family
}

/// Builds a gauge sample, pairing `values` with the descriptor's variable
/// labels. Label pairs are sorted by name, as the prometheus registry expects.
fn gauge_metric(desc: &Desc, values: Vec<String>, value: f64) -> Metric {
    let mut pairs: Vec<LabelPair> = desc.const_label_pairs.clone();
    for (name, label_value) in desc.variable_labels.iter().zip(values) {
        let mut pair = LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(label_value);
        pairs.push(pair);
    }
    pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));

    let mut gauge = Gauge::default();
    gauge.set_value(value);
    let mut metric = Metric::default();
    metric.set_label(pairs);
    metric.set_gauge(gauge);
    metric
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{Duration, TimeZone};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    use crate::crd::OperationState;
    use crate::crd::local_volume_convert::v1alpha1::{
        LocalVolumeConvert, LocalVolumeConvertSpec, LocalVolumeConvertStatus,
    };
    use crate::crd::local_volume_expand::v1alpha1::{LocalVolumeExpand, LocalVolumeExpandSpec};
    use crate::crd::local_volume_migrate::v1alpha1::{
        LocalVolumeMigrate, LocalVolumeMigrateSpec, LocalVolumeMigrateStatus,
    };
    use crate::kind::{Convert, Expand, Migrate};
    use crate::store::StaticSnapshotStore;

    use super::*;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    /// A clock fixed at `epoch() + offset`, advanced by hand.
    fn manual_clock(offset: Duration) -> (NowFn, Arc<Mutex<DateTime<Utc>>>) {
        let time = Arc::new(Mutex::new(epoch() + offset));
        let handle = Arc::clone(&time);
        let now: NowFn = Arc::new(move || *time.lock().unwrap());
        (now, handle)
    }

    fn convert(
        volume: &str,
        state: Option<OperationState>,
        created: DateTime<Utc>,
    ) -> LocalVolumeConvert {
        let mut lvc = LocalVolumeConvert::new(
            &format!("{volume}-convert"),
            LocalVolumeConvertSpec {
                volume_name: volume.into(),
                ..Default::default()
            },
        );
        lvc.metadata.creation_timestamp = Some(Time(created));
        lvc.status = Some(LocalVolumeConvertStatus {
            state,
            message: None,
        });
        lvc
    }

    fn migrate(volume: &str, from: &str, to: Option<&str>) -> LocalVolumeMigrate {
        let mut lvm = LocalVolumeMigrate::new(
            &format!("{volume}-migrate"),
            LocalVolumeMigrateSpec {
                volume_name: volume.into(),
                source_node: from.into(),
                ..Default::default()
            },
        );
        lvm.metadata.creation_timestamp = Some(Time(epoch()));
        lvm.status = Some(LocalVolumeMigrateStatus {
            target_node: to.map(String::from),
            state: Some(OperationState::InProgress),
            ..Default::default()
        });
        lvm
    }

    fn convert_collector(
        objects: Vec<LocalVolumeConvert>,
        now: NowFn,
    ) -> (KindCollector<Convert>, Arc<StaticSnapshotStore<LocalVolumeConvert>>) {
        let store = Arc::new(StaticSnapshotStore::<LocalVolumeConvert>::new(Convert::NAME));
        store.replace(objects);
        let shared = Arc::<StaticSnapshotStore<_>>::clone(&store);
        let collector = KindCollector::<Convert>::new(shared)
            .unwrap()
            .with_clock(now);
        (collector, store)
    }

    fn labels(metric: &Metric) -> BTreeMap<&str, &str> {
        metric
            .get_label()
            .iter()
            .map(|l| (l.get_name(), l.get_value()))
            .collect()
    }

    fn family<'a>(families: &'a [MetricFamily], name: &str) -> Option<&'a MetricFamily> {
        families.iter().find(|f| f.get_name() == name)
    }

    #[test]
    fn test_empty_snapshot_emits_nothing() {
        let (collector, _store) = convert_collector(vec![], system_time());
        assert_eq!(collector.compute_samples(), None);
        assert!(collector.collect().is_empty());
    }

    #[test]
    fn test_store_failure_emits_nothing_until_recovery() {
        let (collector, store) = convert_collector(
            vec![convert("pvc-1", Some(OperationState::InProgress), epoch())],
            manual_clock(Duration::seconds(1)).0,
        );
        store.fail("cache unavailable");
        assert!(collector.collect().is_empty());

        store.replace([convert("pvc-1", Some(OperationState::InProgress), epoch())]);
        assert_eq!(collector.collect().len(), 2);
    }

    #[test]
    fn test_single_status_counts_every_object() {
        let objects = (0..4)
            .map(|i| convert(&format!("pvc-{i}"), Some(OperationState::Submitted), epoch()))
            .collect();
        let (collector, _store) = convert_collector(objects, manual_clock(Duration::seconds(10)).0);

        let families = collector.collect();
        let durations = family(&families, "hwameistor_localvolumeconvert_duration").unwrap();
        assert_eq!(durations.get_field_type(), MetricType::GAUGE);
        assert_eq!(durations.get_metric().len(), 4);

        let statuses = family(&families, "hwameistor_localvolumeconvert_status_count").unwrap();
        assert_eq!(statuses.get_metric().len(), 1);
        let sample = &statuses.get_metric()[0];
        assert_eq!(labels(sample), BTreeMap::from([("status", "Submitted")]));
        assert_eq!(sample.get_gauge().get_value(), 4.0);
    }

    #[test]
    fn test_status_counts_only_observed_values() {
        let objects = vec![
            convert("a", Some(OperationState::InProgress), epoch()),
            convert("b", Some(OperationState::Completed), epoch()),
            convert("c", Some(OperationState::InProgress), epoch()),
            convert("d", Some(OperationState::Completed), epoch()),
            convert("e", Some(OperationState::Completed), epoch()),
        ];
        let (collector, store) = convert_collector(objects, manual_clock(Duration::zero()).0);

        let samples = collector.compute_samples().unwrap();
        assert_eq!(
            samples.status_counts,
            BTreeMap::from([("Completed".to_string(), 3), ("InProgress".to_string(), 2)])
        );
        let families = collector.collect();
        let statuses = family(&families, "hwameistor_localvolumeconvert_status_count").unwrap();
        let values: BTreeMap<_, _> = statuses
            .get_metric()
            .iter()
            .map(|m| (labels(m)["status"].to_string(), m.get_gauge().get_value()))
            .collect();
        assert_eq!(
            values,
            BTreeMap::from([("Completed".to_string(), 3.0), ("InProgress".to_string(), 2.0)])
        );

        // A status that disappears from the snapshot is not reported as zero.
        store.replace([convert("b", Some(OperationState::Completed), epoch())]);
        let samples = collector.compute_samples().unwrap();
        assert_eq!(
            samples.status_counts,
            BTreeMap::from([("Completed".to_string(), 1)])
        );
    }

    #[test]
    fn test_missing_state_counts_as_empty_status() {
        let (collector, _store) =
            convert_collector(vec![convert("a", None, epoch())], manual_clock(Duration::zero()).0);
        let samples = collector.compute_samples().unwrap();
        assert_eq!(samples.status_counts, BTreeMap::from([(String::new(), 1)]));
    }

    #[test]
    fn test_duration_tracks_clock() {
        let (now, clock) = manual_clock(Duration::seconds(90));
        let (collector, _store) =
            convert_collector(vec![convert("a", Some(OperationState::InProgress), epoch())], now);

        let first = collector.compute_samples().unwrap();
        assert_eq!(first.durations.len(), 1);
        assert_eq!(first.durations[0].seconds, 90.0);

        *clock.lock().unwrap() += Duration::milliseconds(2500);
        let second = collector.compute_samples().unwrap();
        assert_eq!(second.durations[0].seconds - first.durations[0].seconds, 2.5);
    }

    #[test]
    fn test_duration_against_system_clock() {
        let created = Utc::now() - Duration::seconds(30);
        let (collector, _store) = convert_collector(
            vec![convert("a", Some(OperationState::InProgress), created)],
            system_time(),
        );
        let samples = collector.compute_samples().unwrap();
        assert!((samples.durations[0].seconds - 30.0).abs() <= 0.1);
    }

    #[test]
    fn test_duration_labels_without_nodes() {
        let (collector, _store) = convert_collector(
            vec![convert("pvc-1", Some(OperationState::InProgress), epoch())],
            manual_clock(Duration::seconds(5)).0,
        );
        let families = collector.collect();
        let durations = family(&families, "hwameistor_localvolumeconvert_duration").unwrap();
        let sample = &durations.get_metric()[0];
        assert_eq!(
            labels(sample),
            BTreeMap::from([
                ("startTime", "2024-03-01 10:00:00 +0000 UTC"),
                ("volumeName", "pvc-1"),
            ])
        );
        assert_eq!(sample.get_gauge().get_value(), 5.0);
        // The registry requires label pairs sorted by name.
        let names: Vec<_> = sample.get_label().iter().map(|l| l.get_name()).collect();
        assert_eq!(names, ["startTime", "volumeName"]);
    }

    #[test]
    fn test_expand_has_no_node_labels() {
        let store = Arc::new(StaticSnapshotStore::<LocalVolumeExpand>::new(Expand::NAME));
        let mut lve = LocalVolumeExpand::new(
            "pvc-1-expand",
            LocalVolumeExpandSpec {
                volume_name: "pvc-1".into(),
                ..Default::default()
            },
        );
        lve.metadata.creation_timestamp = Some(Time(epoch()));
        store.replace([lve]);
        let collector = KindCollector::<Expand>::new(store).unwrap();

        let families = collector.collect();
        let durations = family(&families, "hwameistor_localvolumeexpand_duration").unwrap();
        let sample_labels = labels(&durations.get_metric()[0]);
        assert!(!sample_labels.contains_key("from"));
        assert!(!sample_labels.contains_key("to"));
        let statuses = family(&families, "hwameistor_localvolumeexpand_status_count").unwrap();
        assert_eq!(labels(&statuses.get_metric()[0])["status"], "");
    }

    #[test]
    fn test_migrate_duration_labels_carry_nodes() {
        let store = Arc::new(StaticSnapshotStore::<LocalVolumeMigrate>::new(Migrate::NAME));
        store.replace([
            migrate("pvc-1", "node-a", Some("node-b")),
            migrate("pvc-2", "node-c", None),
        ]);
        let collector = KindCollector::<Migrate>::new(store)
            .unwrap()
            .with_clock(manual_clock(Duration::seconds(1)).0);

        let families = collector.collect();
        let durations = family(&families, "hwameistor_localvolumemigrate_duration").unwrap();
        let mut nodes: Vec<_> = durations
            .get_metric()
            .iter()
            .map(|m| {
                let l = labels(m);
                (l["volumeName"].to_string(), l["from"].to_string(), l["to"].to_string())
            })
            .collect();
        nodes.sort();
        assert_eq!(
            nodes,
            [
                ("pvc-1".to_string(), "node-a".to_string(), "node-b".to_string()),
                ("pvc-2".to_string(), "node-c".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_shared_volume_name_is_not_deduplicated() {
        let objects = vec![
            convert("pvc-1", Some(OperationState::Completed), epoch()),
            convert("pvc-1", Some(OperationState::InProgress), epoch() + Duration::seconds(60)),
        ];
        let (collector, _store) = convert_collector(objects, manual_clock(Duration::seconds(120)).0);
        let mut seconds: Vec<_> = collector
            .compute_samples()
            .unwrap()
            .durations
            .into_iter()
            .map(|d| d.seconds)
            .collect();
        seconds.sort_by(f64::total_cmp);
        assert_eq!(seconds, [60.0, 120.0]);
    }

    #[test]
    fn test_object_without_creation_time_is_still_counted() {
        let mut lvc = convert("pvc-1", Some(OperationState::Submitted), epoch());
        lvc.metadata.creation_timestamp = None;
        let (collector, _store) = convert_collector(vec![lvc], manual_clock(Duration::zero()).0);
        let samples = collector.compute_samples().unwrap();
        assert!(samples.durations.is_empty());
        assert_eq!(
            samples.status_counts,
            BTreeMap::from([("Submitted".to_string(), 1)])
        );
    }

    #[test]
    fn test_desc_ignores_store() {
        let (collector, store) = convert_collector(vec![], system_time());
        store.fail("cache unavailable");
        let descs = collector.desc();
        let names: Vec<_> = descs.iter().map(|d| d.fq_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "hwameistor_localvolumeconvert_duration",
                "hwameistor_localvolumeconvert_status_count",
            ]
        );
        assert_eq!(descs[0].variable_labels, ["volumeName", "startTime"]);
        assert_eq!(descs[1].variable_labels, ["status"]);
    }
}
