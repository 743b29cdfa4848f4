//! Dataset materialization.
//!
//! A [`RecordSource`] produces the raw record list; [`DetDataset`] layers
//! proposal merging, filtering, subsetting and optional serialization on top
//! of it, then serves records by index through [`IndexedRecords`].
//!
//! ```text
//! Uninitialized ──full_init──▶ Loaded ─▶ Filtered ─▶ (Indexed)
//! ```
//!
//! `full_init` commits all stages at once; on error the dataset stays
//! `Uninitialized` and may be retried.

mod arena;
mod json_index;
mod proposals;
mod record;
pub mod voc;

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::{DatasetConfig, DatasetFormat, FilterConfig, Indices};
use crate::error::DetError;
use crate::pipeline::{Results, Transform};
use crate::sampler::ImageShapes;

pub use arena::RecordArena;
pub use json_index::JsonIndexSource;
pub use proposals::{load_proposals, merge_proposals, proposal_key};
pub use record::{DataList, DatasetRecord, Instance, MetaInfo, Proposals};
pub use voc::XmlSource;

/// Produces the full, unfiltered record list of a dataset.
pub trait RecordSource {
    fn load_data_list(&self) -> Result<DataList, DetError>;
}

/// Index-based read access to materialized records.
pub trait IndexedRecords {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an owned copy of record `idx`.
    fn get(&self, idx: usize) -> Result<DatasetRecord, DetError>;
}

impl IndexedRecords for Vec<DatasetRecord> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, idx: usize) -> Result<DatasetRecord, DetError> {
        self.as_slice()
            .get(idx)
            .cloned()
            .ok_or(DetError::IndexOutOfRange {
                index: idx,
                len: Vec::len(self),
            })
    }
}

impl IndexedRecords for RecordArena {
    fn len(&self) -> usize {
        RecordArena::len(self)
    }

    fn get(&self, idx: usize) -> Result<DatasetRecord, DetError> {
        RecordArena::get(self, idx)
    }
}

/// Either source format, chosen by configuration.
#[derive(Clone, Debug)]
pub enum AnySource {
    Voc(XmlSource),
    Json(JsonIndexSource),
}

impl AnySource {
    pub fn from_config(config: &DatasetConfig) -> Result<Self, DetError> {
        Ok(match config.format {
            DatasetFormat::Voc => AnySource::Voc(XmlSource::from_config(config)),
            DatasetFormat::Json => AnySource::Json(JsonIndexSource::from_config(config)?),
        })
    }
}

impl RecordSource for AnySource {
    fn load_data_list(&self) -> Result<DataList, DetError> {
        match self {
            AnySource::Voc(source) => source.load_data_list(),
            AnySource::Json(source) => source.load_data_list(),
        }
    }
}

/// Lifecycle of a [`DetDataset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Uninitialized,
    Loaded,
    Filtered,
    /// Subset applied and/or records serialized into an arena.
    Indexed,
}

impl Stage {
    fn is_ready(self) -> bool {
        self >= Stage::Filtered
    }
}

/// Materialization options, usually taken from a [`DatasetConfig`].
#[derive(Clone, Debug, Default)]
pub struct DatasetOptions {
    pub filter: FilterConfig,
    pub test_mode: bool,
    pub indices: Option<Indices>,
    pub serialize_data: bool,
    pub lazy_init: bool,
    /// Absolute or already resolved against `data_root`.
    pub proposal_file: Option<PathBuf>,
    pub label_map: Option<BTreeMap<u16, u16>>,
}

impl DatasetOptions {
    pub fn from_config(config: &DatasetConfig) -> Self {
        Self {
            filter: config.filter.clone(),
            test_mode: config.test_mode,
            indices: config.indices.clone(),
            serialize_data: config.serialize_data,
            lazy_init: config.lazy_init,
            proposal_file: config.proposal_file.as_deref().map(|p| config.resolve_path(p)),
            label_map: config.label_map.clone(),
        }
    }
}

#[derive(Debug)]
enum Store {
    Empty,
    Plain(Vec<DatasetRecord>),
    Packed(RecordArena),
}

impl Store {
    fn records(&self) -> Option<&dyn IndexedRecords> {
        match self {
            Store::Empty => None,
            Store::Plain(records) => Some(records),
            Store::Packed(arena) => Some(arena),
        }
    }
}

/// A detection dataset over some [`RecordSource`].
#[derive(Debug)]
pub struct DetDataset<S> {
    source: S,
    options: DatasetOptions,
    metainfo: MetaInfo,
    store: Store,
    /// `(width, height)` per record, kept unpacked for the samplers.
    shapes: Vec<(u32, u32)>,
    stage: Stage,
}

impl DetDataset<AnySource> {
    /// Builds the dataset a config file describes.
    pub fn from_config(config: &DatasetConfig) -> Result<Self, DetError> {
        Self::new(
            AnySource::from_config(config)?,
            DatasetOptions::from_config(config),
        )
    }
}

impl<S: RecordSource> DetDataset<S> {
    /// Creates the dataset and, unless `lazy_init` is set, materializes it.
    pub fn new(source: S, options: DatasetOptions) -> Result<Self, DetError> {
        let lazy = options.lazy_init;
        let mut dataset = Self {
            source,
            options,
            metainfo: MetaInfo::default(),
            store: Store::Empty,
            shapes: Vec::new(),
            stage: Stage::Uninitialized,
        };
        if !lazy {
            dataset.full_init()?;
        }
        Ok(dataset)
    }

    /// Loads, filters, subsets and serializes records. A no-op once done.
    pub fn full_init(&mut self) -> Result<(), DetError> {
        if self.stage.is_ready() {
            return Ok(());
        }

        let DataList {
            metainfo,
            data_list: mut records,
        } = self.source.load_data_list()?;
        info!(records = records.len(), "loaded data list");
        let mut stage = Stage::Loaded;

        if let Some(path) = &self.options.proposal_file {
            merge_proposals(&mut records, load_proposals(path)?)?;
        }

        let before = records.len();
        records = self.filter_data(records);
        info!(kept = records.len(), dropped = before - records.len(), "filtered records");
        stage = stage.max(Stage::Filtered);

        if let Some(indices) = &self.options.indices {
            records = subset(records, indices)?;
            info!(records = records.len(), "applied subset");
            stage = Stage::Indexed;
        }

        let shapes = records.iter().map(|r| (r.width, r.height)).collect();
        let store = if self.options.serialize_data {
            let arena = RecordArena::build(&records)?;
            info!(
                records = arena.len(),
                bytes = arena.byte_len(),
                "serialized records"
            );
            stage = Stage::Indexed;
            Store::Packed(arena)
        } else {
            Store::Plain(records)
        };

        self.metainfo = metainfo;
        self.shapes = shapes;
        self.store = store;
        self.stage = stage;
        debug!(stage = ?self.stage, "dataset initialized");
        Ok(())
    }

    fn filter_data(&self, records: Vec<DatasetRecord>) -> Vec<DatasetRecord> {
        if self.options.test_mode {
            return records;
        }
        let FilterConfig {
            filter_empty_gt,
            min_size,
            ..
        } = self.options.filter;

        records
            .into_iter()
            .filter(|r| !(filter_empty_gt && r.instances.is_empty()))
            .filter(|r| r.width.min(r.height) >= min_size)
            .collect()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn metainfo(&self) -> &MetaInfo {
        &self.metainfo
    }

    /// Number of records. Zero before initialization.
    pub fn len(&self) -> usize {
        self.store.records().map_or(0, |records| records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The serialized store, when `serialize_data` is on.
    pub fn arena(&self) -> Option<&RecordArena> {
        match &self.store {
            Store::Packed(arena) => Some(arena),
            _ => None,
        }
    }

    fn records(&self) -> Result<&dyn IndexedRecords, DetError> {
        self.store.records().ok_or(DetError::NotInitialized)
    }

    /// An owned copy of record `idx`.
    pub fn get_data_info(&self, idx: usize) -> Result<DatasetRecord, DetError> {
        self.records()?.get(idx)
    }

    /// Class labels of every instance in record `idx`.
    pub fn get_cat_ids(&self, idx: usize) -> Result<Vec<i64>, DetError> {
        Ok(self
            .get_data_info(idx)?
            .instances
            .iter()
            .map(|instance| instance.bbox_label)
            .collect())
    }

    /// Runs `pipeline` on record `idx`. `None` means the pipeline dropped it.
    pub fn prepare<T: Transform + ?Sized>(
        &self,
        idx: usize,
        pipeline: &T,
    ) -> Result<Option<Results>, DetError> {
        let mut results = Results::from_record(self.get_data_info(idx)?);
        results.label_map = self.options.label_map.clone();
        pipeline.transform(results)
    }
}

impl<S: RecordSource> IndexedRecords for DetDataset<S> {
    fn len(&self) -> usize {
        DetDataset::len(self)
    }

    fn get(&self, idx: usize) -> Result<DatasetRecord, DetError> {
        self.get_data_info(idx)
    }
}

impl<S> ImageShapes for DetDataset<S> {
    fn image_shape(&self, idx: usize) -> Result<(u32, u32), DetError> {
        if !self.stage.is_ready() {
            return Err(DetError::NotInitialized);
        }
        self.shapes.as_slice().image_shape(idx)
    }
}

fn subset(records: Vec<DatasetRecord>, indices: &Indices) -> Result<Vec<DatasetRecord>, DetError> {
    match *indices {
        Indices::Count(n) if n >= 0 => {
            let n = (n as usize).min(records.len());
            Ok(records.into_iter().take(n).collect())
        }
        Indices::Count(n) => {
            let n = (n.unsigned_abs() as usize).min(records.len());
            let skip = records.len() - n;
            Ok(records.into_iter().skip(skip).collect())
        }
        Indices::List(ref list) => list
            .iter()
            .map(|&idx| {
                records
                    .as_slice()
                    .get(idx)
                    .cloned()
                    .ok_or(DetError::IndexOutOfRange {
                        index: idx,
                        len: records.len(),
                    })
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<DatasetRecord>);

    impl RecordSource for Fixed {
        fn load_data_list(&self) -> Result<DataList, DetError> {
            Ok(DataList {
                metainfo: MetaInfo::new(vec!["a".into(), "b".into()]),
                data_list: self.0.clone(),
            })
        }
    }

    fn record(id: &str, width: u32, height: u32, labels: &[i64]) -> DatasetRecord {
        DatasetRecord {
            img_id: id.to_string(),
            img_path: PathBuf::from(format!("JPEGImages/{id}.jpg")),
            width,
            height,
            instances: labels
                .iter()
                .map(|&label| Instance {
                    bbox: [0.0, 0.0, 1.0, 1.0],
                    bbox_label: label,
                    ignore_flag: false,
                    mask: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn source() -> Fixed {
        Fixed(vec![
            record("0", 100, 50, &[0, 1]),
            record("1", 100, 50, &[]),
            record("2", 10, 50, &[1]),
            record("3", 40, 80, &[0]),
        ])
    }

    #[test]
    fn lazy_dataset_refuses_access_until_initialized() {
        let options = DatasetOptions {
            lazy_init: true,
            ..Default::default()
        };
        let mut dataset = DetDataset::new(source(), options).expect("new");
        assert_eq!(dataset.stage(), Stage::Uninitialized);
        assert_eq!(dataset.len(), 0);
        assert!(matches!(dataset.get_data_info(0), Err(DetError::NotInitialized)));

        dataset.full_init().expect("init");
        assert_eq!(dataset.stage(), Stage::Filtered);
        assert_eq!(dataset.len(), 4);
    }

    #[test]
    fn filtering_rules() {
        let options = DatasetOptions {
            filter: FilterConfig {
                filter_empty_gt: true,
                min_size: 20,
                bbox_min_size: None,
            },
            ..Default::default()
        };
        let dataset = DetDataset::new(source(), options).expect("new");
        let ids: Vec<String> = (0..dataset.len())
            .map(|i| dataset.get_data_info(i).expect("record").img_id)
            .collect();
        assert_eq!(ids, vec!["0", "3"]);
    }

    #[test]
    fn test_mode_skips_filtering() {
        let options = DatasetOptions {
            filter: FilterConfig {
                filter_empty_gt: true,
                min_size: 1000,
                bbox_min_size: None,
            },
            test_mode: true,
            ..Default::default()
        };
        assert_eq!(DetDataset::new(source(), options).expect("new").len(), 4);
    }

    #[test]
    fn subset_preserves_requested_order() {
        let options = DatasetOptions {
            indices: Some(Indices::List(vec![3, 0])),
            ..Default::default()
        };
        let dataset = DetDataset::new(source(), options).expect("new");
        assert_eq!(dataset.stage(), Stage::Indexed);
        assert_eq!(dataset.get_data_info(0).expect("0").img_id, "3");
        assert_eq!(dataset.get_data_info(1).expect("1").img_id, "0");
    }

    #[test]
    fn negative_count_takes_the_tail() {
        let tail = subset(source().0, &Indices::Count(-2)).expect("subset");
        assert_eq!(tail[0].img_id, "2");
        assert_eq!(subset(source().0, &Indices::Count(10)).expect("subset").len(), 4);
        assert!(matches!(
            subset(source().0, &Indices::List(vec![9])),
            Err(DetError::IndexOutOfRange { index: 9, len: 4 })
        ));
    }

    #[test]
    fn serialized_store_serves_same_records() {
        let options = DatasetOptions {
            serialize_data: true,
            ..Default::default()
        };
        let mut dataset = DetDataset::new(source(), options).expect("new");
        assert!(dataset.arena().is_some());
        assert_eq!(dataset.get_cat_ids(0).expect("cats"), vec![0, 1]);
        assert_eq!(dataset.image_shape(3).expect("shape"), (40, 80));

        let bytes = dataset.arena().map(RecordArena::byte_len);
        dataset.full_init().expect("second init is a no-op");
        assert_eq!(dataset.arena().map(RecordArena::byte_len), bytes);
    }
}
