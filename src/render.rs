use crate::config::MapConfig;
use crate::error::{MapError, Result};
use crate::filter::{filter_records, CategorySelection};
use crate::markers::{build_markers, CategoryPalette};
use crate::types::{Dataset, MarkerDescriptor};
use tracing::info;

const LEAFLET_VERSION: &str = "1.9.4";
const MARKERCLUSTER_VERSION: &str = "1.5.3";
const TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Anything that can turn marker descriptors into an interactive map fragment.
pub trait MapView {
    /// Markup to place in the document `<head>` (scripts, stylesheets).
    fn head(&self) -> String {
        String::new()
    }

    fn render(&self, markers: &[MarkerDescriptor]) -> Result<String>;
}

/// Clustered circle markers on an OpenStreetMap base layer, drawn by
/// Leaflet and Leaflet.markercluster in the browser.
#[derive(Debug, Clone)]
pub struct LeafletMap {
    pub center: [f64; 2],
    pub zoom: u8,
    pub height_px: u32,
    pub marker_radius: u32,
    pub fill_opacity: f64,
    pub popup_max_width: u32,
}

impl Default for LeafletMap {
    fn default() -> Self {
        Self::from_config(&MapConfig::default())
    }
}

impl LeafletMap {
    pub fn from_config(config: &MapConfig) -> Self {
        Self {
            center: config.center,
            zoom: config.zoom,
            height_px: config.height_px,
            marker_radius: 8,
            fill_opacity: 0.7,
            popup_max_width: 300,
        }
    }
}

impl MapView for LeafletMap {
    fn head(&self) -> String {
        let leaflet = format!("https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist");
        let cluster = format!("https://unpkg.com/leaflet.markercluster@{MARKERCLUSTER_VERSION}/dist");
        format!(
            r#"<link rel="stylesheet" href="{leaflet}/leaflet.css">
<link rel="stylesheet" href="{cluster}/MarkerCluster.css">
<link rel="stylesheet" href="{cluster}/MarkerCluster.Default.css">
<script src="{leaflet}/leaflet.js"></script>
<script src="{cluster}/leaflet.markercluster.js"></script>"#
        )
    }

    fn render(&self, markers: &[MarkerDescriptor]) -> Result<String> {
        // "</" would let popup markup close the surrounding <script> early
        let markers_json = serde_json::to_string(markers)?.replace("</", "<\\/");
        let center = serde_json::to_string(&self.center)?;

        Ok(format!(
            r#"<div id="map" style="width: 100%; height: {height}px;"></div>
<script>
(function () {{
  var map = L.map("map").setView({center}, {zoom});
  L.tileLayer("{tiles}", {{
    maxZoom: 19,
    attribution: "&copy; OpenStreetMap contributors"
  }}).addTo(map);
  var cluster = L.markerClusterGroup().addTo(map);
  var markers = {markers_json};
  markers.forEach(function (m) {{
    L.circleMarker([m.lat, m.lng], {{
      radius: {radius},
      color: m.color,
      fill: true,
      fillOpacity: {opacity}
    }}).bindPopup(m.popupHtml, {{ maxWidth: {popup_width} }}).addTo(cluster);
  }});
}})();
</script>"#,
            height = self.height_px,
            zoom = self.zoom,
            tiles = TILE_URL,
            radius = self.marker_radius,
            opacity = self.fill_opacity,
            popup_width = self.popup_max_width,
        ))
    }
}

/// One recompute: schema check, filter, marker build, map render.
///
/// Every failure comes back as a typed error so the page can show the
/// matching notice; none of them poison the next pass.
pub fn render_pass(
    dataset: &Dataset,
    selection: &CategorySelection,
    palette: &CategoryPalette,
    view: &dyn MapView,
) -> Result<String> {
    let missing = dataset.missing_coordinate_columns();
    if !missing.is_empty() {
        return Err(MapError::Schema(missing));
    }

    let records = filter_records(dataset, selection);
    let batch = build_markers(records, palette).require_markers()?;

    info!(markers = batch.markers.len(), skipped = batch.skipped, "Rendering map");
    view.render(&batch.markers)
}
