//! Popup content for a single defect marker.
//!
//! Content is assembled as an ordered list of typed blocks and only turned
//! into markup by [`PopupContent::to_html`], which escapes every value.

use crate::types::Record;

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/?api=1&query=";
const PREVIEW_HEIGHT_PX: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum PopupBlock {
    /// Bold label followed by a value.
    Field { label: &'static str, value: String },
    /// External link opened in a new tab.
    Link { href: String, text: &'static str },
    /// Clickable preview; the same URL is the link target and image source.
    Image { url: String, caption: &'static str },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopupContent {
    pub blocks: Vec<PopupBlock>,
}

pub fn format_popup(record: &Record) -> PopupContent {
    let mut blocks = Vec::new();

    if let Some(category) = &record.category {
        blocks.push(PopupBlock::Field { label: "Tipo", value: category.clone() });
    }

    if let (Some(lat), Some(lng)) = (record.latitude, record.longitude) {
        blocks.push(PopupBlock::Field { label: "Latitud", value: format_coordinate(lat) });
        blocks.push(PopupBlock::Field { label: "Longitud", value: format_coordinate(lng) });
        blocks.push(PopupBlock::Link {
            href: maps_search_url(lat, lng),
            text: "\u{bb} Abrir en Google Maps",
        });
    }

    if let Some(url) = record.image_url.as_deref().filter(|u| !u.trim().is_empty()) {
        blocks.push(PopupBlock::Image { url: url.to_string(), caption: "Haz click para ampliar" });
    }

    PopupContent { blocks }
}

/// Shortest text that parses back to the same value. Whole numbers keep a
/// trailing `.0` (`-33.0`, not `-33`).
pub fn format_coordinate(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

pub fn maps_search_url(lat: f64, lng: f64) -> String {
    format!("{MAPS_SEARCH_URL}{},{}", format_coordinate(lat), format_coordinate(lng))
}

pub fn parse_maps_query(url: &str) -> Option<(f64, f64)> {
    let query = url.split_once("query=")?.1;
    let query = query.split('&').next()?;
    let (lat, lng) = query.split_once(',')?;
    Some((lat.parse().ok()?, lng.parse().ok()?))
}

impl PopupContent {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for block in &self.blocks {
            let part = match block {
                PopupBlock::Field { label, value } => {
                    format!("<b>{}:</b> {}<br>", escape_html(label), escape_html(value))
                }
                PopupBlock::Link { href, text } => format!(
                    r#"<a href="{}" target="_blank" rel="noopener" style="font-size: 12px; color: #3366cc; text-decoration: none;">{}</a><br>"#,
                    escape_html(href),
                    escape_html(text),
                ),
                PopupBlock::Image { url, caption } => {
                    let url = escape_html(url);
                    format!(
                        r#"<a href="{url}" target="_blank" rel="noopener"><img src="{url}" height="{PREVIEW_HEIGHT_PX}" style="margin-top:5px;"></a><br><small style="font-size: 12px;"><b>{}</b></small>"#,
                        escape_html(caption),
                    )
                }
            };
            html.push_str(&part);
        }
        html
    }
}

/// Escapes text for use in element content and quoted attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> Record {
        Record {
            latitude: Some(-33.51),
            longitude: Some(-70.75),
            category: Some("Hoyo".into()),
            image_url: Some("https://img.example/1.jpg".into()),
            extra: vec![],
        }
    }

    #[test]
    fn test_blocks_in_fixed_order() {
        let popup = format_popup(&full_record());
        assert_eq!(
            popup.blocks,
            vec![
                PopupBlock::Field { label: "Tipo", value: "Hoyo".into() },
                PopupBlock::Field { label: "Latitud", value: "-33.51".into() },
                PopupBlock::Field { label: "Longitud", value: "-70.75".into() },
                PopupBlock::Link {
                    href: "https://www.google.com/maps/search/?api=1&query=-33.51,-70.75".into(),
                    text: "\u{bb} Abrir en Google Maps",
                },
                PopupBlock::Image {
                    url: "https://img.example/1.jpg".into(),
                    caption: "Haz click para ampliar",
                },
            ]
        );
    }

    #[test]
    fn test_missing_coordinate_omits_position_and_link() {
        let record = Record { latitude: None, ..full_record() };
        let popup = format_popup(&record);
        assert!(!popup.blocks.iter().any(|b| matches!(b, PopupBlock::Link { .. })));
        assert!(!popup.to_html().contains("google.com/maps"));
        assert!(!popup.to_html().contains("Latitud"));
    }

    #[test]
    fn test_no_image_block_without_url() {
        for image_url in [None, Some(String::new()), Some("   ".to_string())] {
            let record = Record { image_url, ..full_record() };
            let html = format_popup(&record).to_html();
            assert!(!html.contains("<img"));
        }
    }

    #[test]
    fn test_image_url_is_link_and_preview() {
        let html = format_popup(&full_record()).to_html();
        assert!(html.contains(r#"<a href="https://img.example/1.jpg" target="_blank""#));
        assert!(html.contains(r#"<img src="https://img.example/1.jpg" height="100""#));
    }

    #[test]
    fn test_empty_record_yields_empty_content() {
        let popup = format_popup(&Record::default());
        assert!(popup.is_empty());
        assert_eq!(popup.to_html(), "");
    }

    #[test]
    fn test_maps_link_round_trip() {
        for (lat, lng) in [(-33.51, -70.75), (-33.510123456789, -70.7577), (0.1 + 0.2, -70.0)] {
            let url = maps_search_url(lat, lng);
            assert_eq!(parse_maps_query(&url), Some((lat, lng)));
            let expected = format!("query={},{}", format_coordinate(lat), format_coordinate(lng));
            assert!(url.ends_with(&expected));
        }
    }

    #[test]
    fn test_whole_number_coordinates_keep_decimal_point() {
        assert_eq!(format_coordinate(-33.0), "-33.0");
        assert_eq!(format_coordinate(-70.7577), "-70.7577");
        assert_eq!(format_coordinate(0.0), "0.0");

        let record = Record { latitude: Some(-33.0), longitude: Some(-70.0), ..Default::default() };
        let popup = format_popup(&record);
        assert!(popup.blocks.contains(&PopupBlock::Field { label: "Latitud", value: "-33.0".into() }));
        let url = maps_search_url(-33.0, -70.0);
        assert!(url.ends_with("query=-33.0,-70.0"));
        assert_eq!(parse_maps_query(&url), Some((-33.0, -70.0)));
    }

    #[test]
    fn test_field_values_are_escaped() {
        let record = Record {
            category: Some("<script>alert(1)</script>".into()),
            image_url: Some(r#"x" onerror="alert(1)"#.into()),
            ..Default::default()
        };
        let html = format_popup(&record).to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("x&quot; onerror=&quot;alert(1)"));
    }

    #[test]
    fn test_link_ampersand_is_escaped_in_markup() {
        let html = format_popup(&full_record()).to_html();
        assert!(html.contains("?api=1&amp;query=-33.51,-70.75"));
    }
}
