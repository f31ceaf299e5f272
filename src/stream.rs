//! Image streams feeding the harvester.
//!
//! A [`StreamSpec`] names where the images come from; [`resolve_stream`]
//! turns it into a concrete, ordered list of paths. The harvester consumes
//! any [`ImageStream`], which lets tests feed preloaded images.
use crate::error::TrainError;
use crate::image::io::load_grayscale_unit;
use crate::image::ImageF32;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "pnm", "ppm", "pgm", "webp",
];

/// Where training images come from.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamSpec {
    /// Every image file directly inside a directory, sorted by path.
    Directory(PathBuf),
    /// A text file with one image path per line.
    ListFile(PathBuf),
    /// Explicit paths, used as given.
    Paths(Vec<PathBuf>),
}

/// Resolve a stream specification into a non-empty list of image paths.
pub fn resolve_stream(spec: &StreamSpec) -> Result<Vec<PathBuf>, TrainError> {
    let paths = match spec {
        StreamSpec::Directory(dir) => list_directory(dir)?,
        StreamSpec::ListFile(path) => read_list_file(path)?,
        StreamSpec::Paths(paths) => paths.clone(),
    };
    if paths.is_empty() {
        return Err(TrainError::EmptyStream);
    }
    Ok(paths)
}

fn list_directory(dir: &Path) -> Result<Vec<PathBuf>, TrainError> {
    let io_err = |source| TrainError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && has_image_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn read_list_file(path: &Path) -> Result<Vec<PathBuf>, TrainError> {
    let contents = fs::read_to_string(path).map_err(|source| TrainError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let p = PathBuf::from(line);
            if p.is_absolute() {
                p
            } else {
                base.join(p)
            }
        })
        .collect())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Ordered, re-readable sequence of grayscale images.
pub trait ImageStream {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifier of image `index`, recorded as provenance.
    fn name(&self, index: usize) -> String;

    /// Load image `index` as intensities in [0, 1].
    fn load(&self, index: usize) -> Result<ImageF32, TrainError>;
}

/// Images decoded from disk on every visit.
#[derive(Clone, Debug)]
pub struct FileStream {
    paths: Vec<PathBuf>,
}

impl FileStream {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn from_spec(spec: &StreamSpec) -> Result<Self, TrainError> {
        resolve_stream(spec).map(Self::new)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl ImageStream for FileStream {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn name(&self, index: usize) -> String {
        self.paths[index].display().to_string()
    }

    fn load(&self, index: usize) -> Result<ImageF32, TrainError> {
        load_grayscale_unit(&self.paths[index])
    }
}

/// Preloaded images with arbitrary names.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStream {
    images: Vec<(String, ImageF32)>,
}

impl InMemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, image: ImageF32) {
        self.images.push((name.into(), image));
    }

    pub fn with_image(mut self, name: impl Into<String>, image: ImageF32) -> Self {
        self.push(name, image);
        self
    }
}

impl ImageStream for InMemoryStream {
    fn len(&self) -> usize {
        self.images.len()
    }

    fn name(&self, index: usize) -> String {
        self.images[index].0.clone()
    }

    fn load(&self, index: usize) -> Result<ImageF32, TrainError> {
        Ok(self.images[index].1.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hog_pairdict_stream_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn directory_lists_sorted_images_only() {
        let dir = scratch_dir("dir");
        for name in ["b.png", "a.JPG", "notes.txt", "c.jpeg"] {
            fs::write(dir.join(name), b"x").unwrap();
        }
        fs::create_dir_all(dir.join("nested.png")).unwrap();
        let paths = resolve_stream(&StreamSpec::Directory(dir.clone())).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.jpeg"]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn list_file_resolves_relative_entries() {
        let dir = scratch_dir("list");
        let list = dir.join("images.txt");
        fs::write(&list, "# training set\nfirst.png\n\n/abs/second.png\n").unwrap();
        let paths = resolve_stream(&StreamSpec::ListFile(list)).unwrap();
        assert_eq!(
            paths,
            vec![dir.join("first.png"), PathBuf::from("/abs/second.png")]
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_stream_is_rejected() {
        assert!(matches!(
            resolve_stream(&StreamSpec::Paths(Vec::new())),
            Err(TrainError::EmptyStream)
        ));
    }

    #[test]
    fn stream_spec_parses_from_json() {
        let spec: StreamSpec = serde_json::from_str(r#"{"directory": "data/images"}"#).unwrap();
        assert_eq!(spec, StreamSpec::Directory(PathBuf::from("data/images")));
    }
}
