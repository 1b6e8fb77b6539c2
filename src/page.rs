//! Page chrome around the map: sidebar filters, legend and notices.

use crate::error::MapError;
use crate::filter::CategorySelection;
use crate::markers::CategoryPalette;
use crate::popup::escape_html;
use crate::render::MapView;

const TITLE: &str = "Baches en Maipú";
const SUBHEADER: &str = "🗺️ Mapa de Baches en Maipú";
const CAPTION: &str =
    "Esta es una recopilación de baches (hoyos, grietas y levantamientos de suelo) que hay en Maipú.";
const COORDINATE_NOTE: &str = "<i>Nota:</i> Puede existir una pequeña diferencia en las coordenadas con Google Maps, puedes visitar las coordenadas exactas al clickear en un punto.";

const STYLE: &str = r#"<style>
body { margin: 0; font-family: sans-serif; display: flex; }
aside { width: 260px; padding: 1rem; background: #f0f2f6; min-height: 100vh; box-sizing: border-box; }
main { flex: 1; padding: 1rem 2rem; }
.notice { padding: 0.75rem 1rem; border-radius: 4px; margin: 1rem 0; }
.notice.warning { background: #fffce7; color: #926c05; }
.notice.error { background: #ffecec; color: #7d353b; }
.legend-dot { display: inline-block; border-radius: 50%; width: 10px; height: 10px; margin-right: 5px; vertical-align: middle; }
form.filter { margin: 0.25rem 0; }
</style>"#;

/// How the filter checkboxes talk back to the core.
#[derive(Debug, Clone, Copy)]
pub enum FilterControls<'a> {
    /// Each change submits `?category=<name>&enabled=<new state>` to this path.
    Submit { action: &'a str },
    /// Standalone export; checkboxes only show the selection used.
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl From<&MapError> for Notice {
    fn from(err: &MapError) -> Self {
        match err {
            MapError::Load { reason, .. } => Notice {
                level: NoticeLevel::Error,
                message: format!("No se pudieron cargar los datos de baches: {reason}"),
            },
            MapError::Schema(_) => Notice {
                level: NoticeLevel::Warning,
                message: "Faltan columnas 'lat' o 'lng' para crear el mapa".to_string(),
            },
            MapError::NoValidData { .. } => Notice {
                level: NoticeLevel::Error,
                message: "No hay datos con coordenadas geográficas válidas para mostrar en el mapa."
                    .to_string(),
            },
            MapError::Render(reason) => Notice {
                level: NoticeLevel::Error,
                message: format!("Ocurrió un error al generar el mapa: {reason}"),
            },
        }
    }
}

impl Notice {
    fn to_html(&self) -> String {
        let class = match self.level {
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        format!(r#"<div class="notice {class}">{}</div>"#, escape_html(&self.message))
    }
}

/// Full page for one render pass result.
pub fn render_page(
    selection: &CategorySelection,
    palette: &CategoryPalette,
    view: &dyn MapView,
    controls: FilterControls<'_>,
    map: &Result<String, MapError>,
) -> String {
    let map_section = match map {
        Ok(html) => html.clone(),
        Err(err) => Notice::from(err).to_html(),
    };

    let main = format!(
        "<h2>{SUBHEADER}</h2>\n<p>{COORDINATE_NOTE}</p>\n{legend}\n{map_section}",
        legend = legend_html(palette),
    );

    document(&view.head(), &sidebar_html(selection, controls), &main)
}

/// Blocking page shown when the dataset cannot be loaded at all.
pub fn error_page(err: &MapError) -> String {
    let main = format!("<h2>{SUBHEADER}</h2>\n{}", Notice::from(err).to_html());
    document("", "", &main)
}

fn document(head: &str, sidebar: &str, main: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{TITLE}</title>
{head}
{STYLE}
</head>
<body>
<aside>{sidebar}</aside>
<main>{main}</main>
</body>
</html>
"#
    )
}

fn sidebar_html(selection: &CategorySelection, controls: FilterControls<'_>) -> String {
    let mut html = format!("<h1>Hola ✌️!</h1>\n<p><small>{CAPTION}</small></p>\n<h3>Filtros</h3>\n");

    for (category, enabled) in selection.entries() {
        let name = escape_html(category);
        let checked = if enabled { " checked" } else { "" };
        let control = match controls {
            // The hidden field carries the state the box will have after the click
            FilterControls::Submit { action } => format!(
                r#"<form class="filter" method="get" action="{}"><input type="hidden" name="category" value="{name}"><input type="hidden" name="enabled" value="{}"><label><input type="checkbox" onchange="this.form.submit()"{checked}> {name}</label></form>"#,
                escape_html(action),
                !enabled,
            ),
            FilterControls::ReadOnly => format!(
                r#"<div class="filter"><label><input type="checkbox" disabled{checked}> {name}</label></div>"#,
            ),
        };
        html.push_str(&control);
        html.push('\n');
    }

    html
}

fn legend_html(palette: &CategoryPalette) -> String {
    let items: Vec<String> = palette
        .entries()
        .map(|(name, color)| {
            format!(
                r#"<span class="legend-dot" style="background-color:{};"></span>{}"#,
                escape_html(color),
                escape_html(name),
            )
        })
        .collect();
    format!("<p><b>Leyenda:</b><br>{}</p>", items.join(" "))
}
