use serde::Serialize;

use crate::geo::LngLat;
use crate::models::{Activity, Event};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ClusterKind {
    /// All activities at one place.
    Place {
        #[serde(rename = "placeId")]
        place_id: String,
    },
    /// An event pin, plus any activities at its place.
    Event {
        #[serde(rename = "eventId")]
        event_id: String,
        #[serde(rename = "placeId")]
        place_id: String,
    },
    /// Several nearby places merged by the proximity pass.
    Area { cell: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: String,
    pub kind: ClusterKind,
    pub centroid: LngLat,
    /// Distance in projected meters from the centroid to the farthest member place.
    pub radius: f64,
    pub members: Vec<Activity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
}

impl Cluster {
    /// A single activity passed through without grouping.
    pub fn is_solo(&self) -> bool {
        matches!(self.kind, ClusterKind::Place { .. }) && self.members.len() == 1
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// What the rendering layer draws for one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    pub clusters: Vec<Cluster>,
    pub event_clusters: Vec<Cluster>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty() && self.event_clusters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clusters.len() + self.event_clusters.len()
    }
}
