#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};

pub const CLASSES: [&str; 3] = ["cat", "dog", "person"];

/// One `<object>` entry: class name, difficult flag, 1-based box.
pub struct Obj {
    pub name: &'static str,
    pub difficult: bool,
    pub bbox: [u32; 4],
}

pub fn obj(name: &'static str, bbox: [u32; 4]) -> Obj {
    Obj {
        name,
        difficult: false,
        bbox,
    }
}

pub fn difficult(name: &'static str, bbox: [u32; 4]) -> Obj {
    Obj {
        name,
        difficult: true,
        bbox,
    }
}

pub fn voc_xml(size: Option<(u32, u32)>, objects: &[Obj]) -> String {
    let mut xml = String::from("<annotation>\n  <folder>VOC2007</folder>\n");
    if let Some((width, height)) = size {
        xml.push_str(&format!(
            "  <size><width>{width}</width><height>{height}</height><depth>3</depth></size>\n"
        ));
    }
    for object in objects {
        let [xmin, ymin, xmax, ymax] = object.bbox;
        xml.push_str(&format!(
            "  <object>\n    <name>{}</name>\n    <difficult>{}</difficult>\n    \
             <bndbox><xmin>{xmin}</xmin><ymin>{ymin}</ymin><xmax>{xmax}</xmax><ymax>{ymax}</ymax></bndbox>\n  </object>\n",
            object.name,
            u8::from(object.difficult)
        ));
    }
    xml.push_str("</annotation>\n");
    xml
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, contents).expect("write file");
}

/// Writes `Annotations/<id>.xml` for each entry plus `ImageSets/Main/train.txt`.
pub fn write_voc(root: &Path, entries: &[(&str, Option<(u32, u32)>, Vec<Obj>)]) -> PathBuf {
    let mut ids = String::new();
    for (id, size, objects) in entries {
        write_file(
            &root.join("Annotations").join(format!("{id}.xml")),
            &voc_xml(*size, objects),
        );
        ids.push_str(id);
        ids.push('\n');
    }
    let list = root.join("ImageSets/Main/train.txt");
    write_file(&list, &ids);
    list
}

/// The dataset used by most tests: two landscape images, one portrait, one
/// without objects, one tiny.
pub fn write_standard_voc(root: &Path) -> PathBuf {
    write_voc(
        root,
        &[
            (
                "000001",
                Some((500, 375)),
                vec![obj("dog", [48, 240, 195, 371]), obj("person", [8, 12, 352, 498])],
            ),
            ("000002", Some((335, 500)), vec![obj("cat", [139, 200, 207, 301])]),
            ("000003", Some((500, 333)), vec![]),
            (
                "000004",
                Some((500, 406)),
                vec![difficult("dog", [69, 172, 270, 330]), obj("horse", [1, 1, 50, 50])],
            ),
            ("000005", Some((12, 8)), vec![obj("cat", [2, 2, 4, 4])]),
        ],
    )
}

/// Writes an 8-bit grayscale PNG from row-major pixel values.
pub fn write_gray_png(path: &Path, width: u32, height: u32, pixels: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    let image = GrayImage::from_fn(width, height, |x, y| {
        Luma([pixels[(y * width + x) as usize]])
    });
    image.save(path).expect("write png");
}

/// A YAML config pointing at a VOC dataset under `root`.
pub fn voc_config_yaml(root: &Path, extra_dataset: &str, sampler: &str) -> String {
    let mut yaml = format!(
        "dataset:\n  format: voc\n  data_root: {}\n  ann_file: ImageSets/Main/train.txt\n  \
         classes: [cat, dog, person]\n{extra_dataset}",
        root.display()
    );
    if !sampler.is_empty() {
        yaml.push_str(&format!("\nsampler:\n{sampler}"));
    }
    yaml.push('\n');
    yaml
}
