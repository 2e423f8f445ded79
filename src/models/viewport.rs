use serde::{Deserialize, Serialize};

use crate::geo::GeoRect;

/// Camera state of the map screen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub visible_rect: GeoRect,
    pub scale: f64,
    /// True once the user has moved the camera by gesture.
    pub positioned_by_user: bool,
}

/// One camera-change event as reported by the map widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraChange {
    pub rect: GeoRect,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}
