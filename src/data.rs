use crate::error::{MapError, Result};
use crate::types::{Dataset, Record, CATEGORY_COLUMN, IMAGE_COLUMN, LAT_COLUMN, LNG_COLUMN};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

pub fn load_dataset(path: &Path, delimiter: u8) -> Result<Dataset> {
    info!(path = %path.display(), "Loading defect reports");

    let file = File::open(path).map_err(|e| MapError::load(path, e))?;
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(file);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| MapError::load(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(MapError::load(path, "file has no header row"));
    }

    let columns = ColumnIndex::new(&headers);
    let mut records = Vec::new();

    for result in rdr.records() {
        let row = result.map_err(|e| MapError::load(path, e))?;
        records.push(columns.record(&headers, &row));
    }

    info!(records = records.len(), columns = headers.len(), "Loaded defect reports");

    Ok(Dataset { headers, records })
}

// Positions of the modeled columns; everything else is passthrough.
struct ColumnIndex {
    lat: Option<usize>,
    lng: Option<usize>,
    category: Option<usize>,
    image: Option<usize>,
}

impl ColumnIndex {
    fn new(headers: &[String]) -> Self {
        let col_indices: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();

        Self {
            lat: col_indices.get(LAT_COLUMN).copied(),
            lng: col_indices.get(LNG_COLUMN).copied(),
            category: col_indices.get(CATEGORY_COLUMN).copied(),
            image: col_indices.get(IMAGE_COLUMN).copied(),
        }
    }

    fn is_modeled(&self, idx: usize) -> bool {
        [self.lat, self.lng, self.category, self.image].contains(&Some(idx))
    }

    fn record(&self, headers: &[String], row: &StringRecord) -> Record {
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i));

        let extra = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.is_modeled(*i))
            .filter_map(|(i, h)| row.get(i).map(|v| (h.clone(), v.to_string())))
            .collect();

        Record {
            latitude: cell(self.lat).and_then(parse_coordinate),
            longitude: cell(self.lng).and_then(parse_coordinate),
            category: cell(self.category).and_then(non_empty),
            image_url: cell(self.image).and_then(non_empty),
            extra,
        }
    }
}

/// Empty, non-numeric and non-finite cells all count as missing.
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn non_empty(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Identifies one version of a source file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    fn of(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path).map_err(|e| MapError::load(path, e))?;
        Ok(Self { modified: meta.modified().ok(), len: meta.len() })
    }
}

struct CacheEntry {
    fingerprint: Fingerprint,
    dataset: Arc<Dataset>,
}

/// Path-keyed dataset cache. An entry is reused until the file's
/// modification time or length changes.
pub struct DatasetCache {
    delimiter: u8,
    entries: HashMap<PathBuf, CacheEntry>,
}

impl DatasetCache {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter, entries: HashMap::new() }
    }

    pub fn get(&mut self, path: &Path) -> Result<Arc<Dataset>> {
        let fingerprint = Fingerprint::of(path)?;

        if let Some(entry) = self.entries.get(path) {
            if entry.fingerprint == fingerprint {
                debug!(path = %path.display(), "Dataset cache hit");
                return Ok(Arc::clone(&entry.dataset));
            }
            info!(path = %path.display(), "Source changed, reloading dataset");
        }

        let dataset = Arc::new(load_dataset(path, self.delimiter)?);
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry { fingerprint, dataset: Arc::clone(&dataset) },
        );
        Ok(dataset)
    }

    pub fn invalidate(&mut self, path: &Path) {
        self.entries.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_typed_columns() {
        let file = csv_file(
            "lat;lng;tipo;foto_url;fecha\n\
             -33.51;-70.75;Hoyo;http://img/1.jpg;2024-01-01\n\
             ;-70.76;Grieta;;2024-01-02\n",
        );
        let dataset = load_dataset(file.path(), b';').unwrap();

        assert_eq!(dataset.headers, vec!["lat", "lng", "tipo", "foto_url", "fecha"]);
        assert_eq!(dataset.len(), 2);

        let first = &dataset.records[0];
        assert_eq!(first.latitude, Some(-33.51));
        assert_eq!(first.longitude, Some(-70.75));
        assert_eq!(first.category.as_deref(), Some("Hoyo"));
        assert_eq!(first.image_url.as_deref(), Some("http://img/1.jpg"));
        assert_eq!(first.extra, vec![("fecha".to_string(), "2024-01-01".to_string())]);

        let second = &dataset.records[1];
        assert_eq!(second.latitude, None);
        assert_eq!(second.image_url, None);
    }

    #[test]
    fn test_non_numeric_coordinates_are_missing() {
        assert_eq!(parse_coordinate("abc"), None);
        assert_eq!(parse_coordinate(""), None);
        assert_eq!(parse_coordinate("NaN"), None);
        assert_eq!(parse_coordinate(" -70.7577 "), Some(-70.7577));
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let file = csv_file("lat;lng;tipo\n-33.5;-70.7\n");
        let dataset = load_dataset(file.path(), b';').unwrap();
        assert_eq!(dataset.records[0].category, None);
        assert!(dataset.records[0].is_geolocated());
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dataset(&dir.path().join("missing.csv"), b';').unwrap_err();
        assert!(matches!(err, MapError::Load { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invalid_utf8_is_load_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"lat;lng;tipo\n-33.5;-70.7;\xff\xfe\n").unwrap();
        file.flush().unwrap();
        let err = load_dataset(file.path(), b';').unwrap_err();
        assert!(matches!(err, MapError::Load { .. }));
    }

    #[test]
    fn test_empty_file_is_load_error() {
        let file = csv_file("");
        assert!(matches!(load_dataset(file.path(), b';'), Err(MapError::Load { .. })));
    }

    #[test]
    fn test_cache_returns_same_dataset_until_source_changes() {
        let file = csv_file("lat;lng;tipo\n-33.5;-70.7;Hoyo\n");
        let mut cache = DatasetCache::new(b';');

        let first = cache.get(file.path()).unwrap();
        let second = cache.get(file.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // Length change alone is enough to invalidate
        std::fs::write(file.path(), "lat;lng;tipo\n-33.5;-70.7;Hoyo\n-33.6;-70.8;Grieta\n").unwrap();
        let third = cache.get(file.path()).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.len(), 2);
    }

    #[test]
    fn test_cache_invalidate_forces_reload() {
        let file = csv_file("lat;lng;tipo\n-33.5;-70.7;Hoyo\n");
        let mut cache = DatasetCache::new(b';');

        let first = cache.get(file.path()).unwrap();
        cache.invalidate(file.path());
        let second = cache.get(file.path()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
