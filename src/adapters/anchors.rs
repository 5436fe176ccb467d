use crate::domain::model::{Anchor, Coordinate};
use crate::utils::error::{GeoError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct AnchorRow {
    #[serde(default)]
    name: Option<String>,
    vw_lat: f64,
    vw_lng: f64,
}

/// 讀取錨點 CSV（欄位 `vw_lat`, `vw_lng`，`name` 可省略）
pub fn load_anchor_csv(path: impl AsRef<Path>) -> Result<Vec<Anchor>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;

    let mut anchors = Vec::new();
    for (index, row) in reader.deserialize::<AnchorRow>().enumerate() {
        let row = row?;
        let name = row
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("anchor-{}", index + 1));
        anchors.push(Anchor::new(name, Coordinate::new(row.vw_lat, row.vw_lng)?));
    }

    if anchors.is_empty() {
        return Err(GeoError::EmptyInput {
            what: format!("anchor file {}", path.display()),
        });
    }

    tracing::info!("📌 Loaded {} anchors from {}", anchors.len(), path.display());
    Ok(anchors)
}
