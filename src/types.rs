use geo::Point;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;

use crate::popup::PopupContent;

pub const LAT_COLUMN: &str = "lat";
pub const LNG_COLUMN: &str = "lng";
pub const CATEGORY_COLUMN: &str = "tipo";
pub const IMAGE_COLUMN: &str = "foto_url";

/// One reported defect, as read from a CSV row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    // Unmodeled columns, header -> raw cell, in file order
    pub extra: Vec<(String, String)>,
}

impl Record {
    pub fn position(&self) -> Option<Point<f64>> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Point::new(lng, lat)),
            _ => None,
        }
    }

    pub fn is_geolocated(&self) -> bool {
        self.position().is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    /// Sorted, de-duplicated category labels. Rows without a category are ignored.
    pub fn distinct_categories(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.category.as_deref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn missing_coordinate_columns(&self) -> Vec<String> {
        [LAT_COLUMN, LNG_COLUMN]
            .into_iter()
            .filter(|col| !self.headers.iter().any(|h| h == *col))
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MarkerDescriptor {
    pub position: Point<f64>,
    pub color: String,
    pub popup: PopupContent,
}

impl MarkerDescriptor {
    pub fn lat(&self) -> f64 {
        self.position.y()
    }

    pub fn lng(&self) -> f64 {
        self.position.x()
    }
}

// The map widget expects flat `{lat, lng, color, popupHtml}` objects.
impl Serialize for MarkerDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("MarkerDescriptor", 4)?;
        s.serialize_field("lat", &self.lat())?;
        s.serialize_field("lng", &self.lng())?;
        s.serialize_field("color", &self.color)?;
        s.serialize_field("popupHtml", &self.popup.to_html())?;
        s.end()
    }
}
