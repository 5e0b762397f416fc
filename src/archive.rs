use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const INNER_ARCHIVE: &str = "scratch.sb3";
const PROJECT_JSON: &str = "project.json";

/// Reads the `project.json` manifest out of a `.lms` file.
pub fn read_lms(input: &Path) -> Result<Value> {
    let bytes =
        fs::read(input).with_context(|| format!("Failed to open '{}'.", input.display()))?;
    read_lms_bytes(&bytes).with_context(|| format!("Invalid .lms file '{}'.", input.display()))
}

/// `.lms` is a zip holding `scratch.sb3`, itself a zip holding `project.json`.
/// A bare `.sb3` (project.json at the top) is accepted as well.
pub fn read_lms_bytes(bytes: &[u8]) -> Result<Value> {
    let mut outer =
        ZipArchive::new(Cursor::new(bytes)).context("Outer archive is not a valid zip file.")?;

    if outer.index_for_name(PROJECT_JSON).is_some() {
        log::debug!("archive has a top-level {}, treating it as .sb3", PROJECT_JSON);
        return read_project_json(&mut outer);
    }

    let mut sb3_bytes = Vec::new();
    {
        let mut entry = outer
            .by_name(INNER_ARCHIVE)
            .map_err(|_| anyhow!("{} not found in archive.", INNER_ARCHIVE))?;
        entry.read_to_end(&mut sb3_bytes)?;
    }
    let mut inner = ZipArchive::new(Cursor::new(sb3_bytes))
        .with_context(|| format!("{} is not a valid zip file.", INNER_ARCHIVE))?;
    read_project_json(&mut inner)
}

fn read_project_json<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<Value> {
    let mut project_json_str = String::new();
    zip.by_name(PROJECT_JSON)
        .map_err(|_| anyhow!("{} not found in {}.", PROJECT_JSON, INNER_ARCHIVE))?
        .read_to_string(&mut project_json_str)?;
    serde_json::from_str(&project_json_str)
        .with_context(|| format!("Invalid {}.", PROJECT_JSON))
}
