//! I/O helpers for training images and JSON artifacts.
//!
//! - `load_grayscale_unit`: read a PNG/JPEG/etc. into an `ImageF32` in [0, 1].
//! - `write_json_file`: pretty-print a serializable value to disk.
//! - `read_json_file`: parse a deserializable value from disk.
use super::ImageF32;
use crate::error::TrainError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load an image and average its RGB channels into intensities in [0, 1].
pub fn load_grayscale_unit(path: &Path) -> Result<ImageF32, TrainError> {
    let img = image::open(path)
        .map_err(|source| TrainError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .into_rgb8();
    let w = img.width() as usize;
    let h = img.height() as usize;
    let data = img
        .pixels()
        .map(|p| (p[0] as f32 + p[1] as f32 + p[2] as f32) / (3.0 * 255.0))
        .collect();
    Ok(ImageF32 { w, h, data })
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), TrainError> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|source| TrainError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| TrainError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, TrainError> {
    let data = fs::read_to_string(path).map_err(|source| TrainError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| TrainError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent_dir(path: &Path) -> Result<(), TrainError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| TrainError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}
