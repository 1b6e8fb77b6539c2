use crate::config::CategoryConfig;
use crate::error::{MapError, Result};
use crate::popup::format_popup;
use crate::types::{MarkerDescriptor, Record};
use tracing::debug;

pub const FALLBACK_COLOR: &str = "gray";

const DEFAULT_COLORS: [(&str, &str); 3] = [
    ("Hoyo", "#dd4231"),
    ("Grieta", "#17b85a"),
    ("Levantamiento de Suelo", "#2441e9"),
];

/// Fixed category -> color table, in legend order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPalette {
    colors: Vec<(String, String)>,
}

impl Default for CategoryPalette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_COLORS
                .iter()
                .map(|(name, color)| (name.to_string(), color.to_string()))
                .collect(),
        }
    }
}

impl CategoryPalette {
    /// An empty category list from config means the built-in table.
    pub fn from_config(categories: &[CategoryConfig]) -> Self {
        if categories.is_empty() {
            return Self::default();
        }
        Self {
            colors: categories.iter().map(|c| (c.name.clone(), c.color.clone())).collect(),
        }
    }

    pub fn color_for(&self, category: Option<&str>) -> &str {
        category
            .and_then(|c| self.colors.iter().find(|(name, _)| name == c))
            .map(|(_, color)| color.as_str())
            .unwrap_or(FALLBACK_COLOR)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.colors.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkerBatch {
    pub markers: Vec<MarkerDescriptor>,
    /// Records dropped for lacking a usable latitude or longitude.
    pub skipped: usize,
}

impl MarkerBatch {
    pub fn require_markers(self) -> Result<Self> {
        if self.markers.is_empty() {
            return Err(MapError::NoValidData { skipped: self.skipped });
        }
        Ok(self)
    }
}

pub fn build_markers<'a, I>(records: I, palette: &CategoryPalette) -> MarkerBatch
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut batch = MarkerBatch::default();

    for record in records {
        let Some(position) = record.position() else {
            batch.skipped += 1;
            continue;
        };

        batch.markers.push(MarkerDescriptor {
            position,
            color: palette.color_for(record.category.as_deref()).to_string(),
            popup: format_popup(record),
        });
    }

    debug!(markers = batch.markers.len(), skipped = batch.skipped, "Built markers");
    batch
}
