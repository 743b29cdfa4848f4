use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::info;

use super::{DatasetRecord, Proposals};
use crate::error::DetError;

/// Reads a proposals file: a JSON object mapping `"<parent dir>/<file name>"`
/// keys to `{bboxes, scores}` payloads.
pub fn load_proposals(path: &Path) -> Result<HashMap<String, Proposals>, DetError> {
    let text = fs::read_to_string(path).map_err(|source| DetError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| DetError::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// The lookup key of an image: its parent directory name and file name.
///
/// `data/VOC2007/JPEGImages/000001.jpg` becomes `JPEGImages/000001.jpg`.
pub fn proposal_key(img_path: &Path) -> String {
    let file_name = img_path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let parent = img_path
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy());

    match parent {
        Some(parent) => format!("{parent}/{file_name}"),
        None => file_name.into_owned(),
    }
}

/// Attaches proposals to every record.
///
/// Fails when the collection size differs from the record count, when a
/// record has no entry, or when an entry's scores do not match its boxes.
pub fn merge_proposals(
    records: &mut [DatasetRecord],
    mut proposals: HashMap<String, Proposals>,
) -> Result<(), DetError> {
    if proposals.len() != records.len() {
        return Err(DetError::LengthMismatch {
            what: "proposals",
            expected: records.len(),
            actual: proposals.len(),
        });
    }

    for record in records.iter_mut() {
        let key = proposal_key(&record.img_path);
        let entry = proposals
            .remove(&key)
            .ok_or(DetError::MissingProposal { key })?;
        if !entry.scores.is_empty() && entry.scores.len() != entry.bboxes.len() {
            return Err(DetError::LengthMismatch {
                what: "proposal scores",
                expected: entry.bboxes.len(),
                actual: entry.scores.len(),
            });
        }
        record.proposals = Some(entry);
    }

    info!(records = records.len(), "merged proposals");
    Ok(())
}
