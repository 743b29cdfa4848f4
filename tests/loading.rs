mod common;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use common::{obj, write_file, write_gray_png, write_voc, CLASSES};
use detset::boxes::{BoxField, BoxTypeRegistry, HorizontalBoxes};
use detset::config::{DatasetConfig, DatasetFormat, LoadAnnotationsConfig};
use detset::dataset::DetDataset;
use detset::mask::Masks;
use detset::pipeline::{from_fn, Compose, LoadAnnotations, Results};
use detset::DetError;

// 4 x 2 label image, row-major.
const SEG_PIXELS: [u8; 8] = [0, 1, 2, 255, 3, 0, 1, 2];

fn seg_dataset(root: &Path, label_map: Option<BTreeMap<u16, u16>>) -> DatasetConfig {
    write_voc(root, &[("a", Some((4, 2)), vec![obj("cat", [1, 1, 3, 2])])]);
    write_gray_png(&root.join("SegmentationClass/a.png"), 4, 2, &SEG_PIXELS);
    DatasetConfig {
        data_root: root.to_path_buf(),
        ann_file: Some(PathBuf::from("ImageSets/Main/train.txt")),
        classes: CLASSES.iter().map(|c| c.to_string()).collect(),
        seg_subdir: Some("SegmentationClass".to_string()),
        label_map,
        ..Default::default()
    }
}

fn loader(config: LoadAnnotationsConfig) -> LoadAnnotations {
    LoadAnnotations::from_config(&config, &BoxTypeRegistry::with_defaults()).expect("loader")
}

fn prepare(config: &DatasetConfig, loader: &LoadAnnotations) -> Results {
    let dataset = DetDataset::from_config(config).expect("dataset");
    dataset
        .prepare(0, loader)
        .expect("prepare")
        .expect("kept")
}

#[test]
fn seg_map_is_loaded_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = seg_dataset(dir.path(), None);
    let results = prepare(
        &config,
        &loader(LoadAnnotationsConfig {
            with_seg: true,
            ..Default::default()
        }),
    );

    let seg = results.gt_seg_map.expect("seg map");
    assert_eq!((seg.height, seg.width), (2, 4));
    assert_eq!(seg.data, SEG_PIXELS.map(u16::from).to_vec());
    assert_eq!(results.ignore_index, Some(255));
}

#[test]
fn reduce_zero_label_then_label_map() {
    let dir = tempfile::tempdir().expect("tempdir");
    let label_map = BTreeMap::from([(0, 5), (1, 0)]);
    let config = seg_dataset(dir.path(), Some(label_map));
    let results = prepare(
        &config,
        &loader(LoadAnnotationsConfig {
            with_seg: true,
            reduce_zero_label: true,
            ..Default::default()
        }),
    );

    // After reduction: [255, 0, 1, 255, 2, 255, 0, 1]. The map reads the
    // reduced values and does not chain 1 -> 0 -> 5.
    let seg = results.gt_seg_map.expect("seg map");
    assert_eq!(seg.data, vec![255, 5, 0, 255, 2, 255, 5, 0]);
}

#[test]
fn unreadable_seg_map_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = seg_dataset(dir.path(), None);
    write_file(&dir.path().join("SegmentationClass/a.png"), "not a png");

    let dataset = DetDataset::from_config(&config).expect("dataset");
    let err = dataset
        .prepare(
            0,
            &loader(LoadAnnotationsConfig {
                with_seg: true,
                ..Default::default()
            }),
        )
        .expect_err("decode failure");
    assert!(matches!(err, DetError::ImageDecode { .. }));
}

fn mask_index(root: &Path) -> DatasetConfig {
    write_file(
        &root.join("index.json"),
        r#"{
            "metainfo": {"classes": ["cat", "dog"]},
            "data_list": [{
                "img_id": "m",
                "img_path": "m.jpg",
                "width": 8,
                "height": 6,
                "instances": [
                    {"bbox": [0, 0, 4, 4], "bbox_label": 0,
                     "mask": [[0, 0, 4, 0, 4, 4, 0, 4]]},
                    {"bbox": [0, 0, 8, 6], "bbox_label": 1,
                     "mask": {"counts": [6, 6, 36], "size": [6, 8]}},
                    {"bbox": [1, 1, 2, 2], "bbox_label": 1,
                     "mask": [[1, 1, 2]]},
                    {"bbox": [1, 1, 2, 2], "bbox_label": 0},
                    {"bbox": [1, 1, 2, 2], "bbox_label": 0, "ignore_flag": true,
                     "mask": {"counts": [1, 2], "size": [6, 8]}}
                ]
            }]
        }"#,
    );
    DatasetConfig {
        format: DatasetFormat::Json,
        data_root: root.to_path_buf(),
        ann_file: Some(PathBuf::from("index.json")),
        ..Default::default()
    }
}

#[test]
fn masks_and_flags_stay_aligned_with_instances() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = mask_index(dir.path());
    let results = prepare(
        &config,
        &loader(LoadAnnotationsConfig {
            with_mask: true,
            ..Default::default()
        }),
    );

    let flags = results.gt_ignore_flags.expect("flags");
    assert_eq!(flags, vec![false, false, true, true, true]);
    assert_eq!(results.gt_bboxes_labels, Some(vec![0, 1, 1, 0, 0]));

    let Some(Masks::Bitmap(masks)) = results.gt_masks else {
        panic!("expected bitmap masks");
    };
    assert_eq!((masks.height, masks.width), (6, 8));
    assert_eq!(masks.len(), 5);
    let areas = masks.areas();
    assert_eq!(areas[0], 16.0);
    assert_eq!(areas[1], 6.0);
    assert_eq!(&areas[2..], &[0.0, 0.0, 0.0]);
}

#[test]
fn polygon_mode_degrades_rle_payloads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = mask_index(dir.path());
    let results = prepare(
        &config,
        &loader(LoadAnnotationsConfig {
            with_mask: true,
            poly2mask: false,
            ..Default::default()
        }),
    );

    assert_eq!(
        results.gt_ignore_flags,
        Some(vec![false, true, true, true, true])
    );
    let Some(Masks::Polygon(masks)) = results.gt_masks else {
        panic!("expected polygon masks");
    };
    assert_eq!(masks.areas()[0], 16.0);
    assert_eq!(masks.len(), 5);
}

#[test]
fn typed_boxes_by_default_raw_when_null() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = mask_index(dir.path());

    let typed = prepare(&config, &loader(LoadAnnotationsConfig::default()));
    let boxes = typed
        .gt_bboxes
        .as_ref()
        .and_then(BoxField::downcast_ref::<HorizontalBoxes>)
        .expect("hbox");
    assert_eq!(boxes.get(1), [0.0, 0.0, 8.0, 6.0]);

    let raw = prepare(
        &config,
        &loader(LoadAnnotationsConfig {
            box_type: None,
            ..Default::default()
        }),
    );
    assert!(matches!(raw.gt_bboxes, Some(BoxField::Raw(_))));
}

#[test]
fn unknown_box_type_fails_at_construction() {
    let config = LoadAnnotationsConfig {
        box_type: Some(serde_json::json!("quad")),
        ..Default::default()
    };
    assert!(matches!(
        LoadAnnotations::from_config(&config, &BoxTypeRegistry::with_defaults()),
        Err(DetError::NotRegistered(name)) if name == "quad"
    ));
}

#[test]
fn compose_stops_when_a_step_drops_the_sample() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = mask_index(dir.path());
    let dataset = DetDataset::from_config(&config).expect("dataset");

    let pipeline = Compose::new()
        .with(loader(LoadAnnotationsConfig::default()))
        .with(from_fn(|results: Results| {
            let keep = results
                .gt_ignore_flags
                .as_ref()
                .is_some_and(|flags| flags.iter().all(|&f| !f));
            Ok(keep.then_some(results))
        }))
        .with(from_fn(|_: Results| -> Result<Option<Results>, DetError> {
            panic!("must not run after a drop")
        }));

    assert!(dataset.prepare(0, &pipeline).expect("prepare").is_none());
}
