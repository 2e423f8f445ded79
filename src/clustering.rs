//! Groups visible activities into map annotations.
//!
//! Activities at the same place always share a cluster. Events absorb the
//! bucket of their place. An optional proximity pass then merges plain place
//! clusters that fall in the same geohash cell.

use geohash::{encode, Coord};
use indexmap::IndexMap;

use crate::constants::DEFAULT_ANNOTATION_LIMIT;
use crate::geo::LngLat;
use crate::models::{Activity, Annotations, Cluster, ClusterKind, Event};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterOptions {
    /// Maximum number of plain clusters kept, by prefix of insertion order.
    pub limit: usize,
    /// Geohash precision for the proximity pass. `None` keeps identity grouping only.
    pub proximity_precision: Option<usize>,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_ANNOTATION_LIMIT,
            proximity_precision: None,
        }
    }
}

/// Geohash precision for a viewport `width_m` projected meters wide.
pub fn precision_for_span(width_m: f64) -> usize {
    let km = width_m / 1000.0;
    match km {
        k if k >= 20_000.0 => 1,
        k if k >= 5_000.0 => 2,
        k if k >= 600.0 => 3,
        k if k >= 150.0 => 4,
        k if k >= 20.0 => 5,
        k if k >= 5.0 => 6,
        k if k >= 0.6 => 7,
        _ => 8,
    }
}

pub fn cluster_activities(
    activities: Vec<Activity>,
    events: &[Event],
    options: &ClusterOptions,
) -> Annotations {
    let mut buckets: IndexMap<String, Vec<Activity>> = IndexMap::new();
    for activity in activities {
        buckets
            .entry(activity.place_id.clone())
            .or_default()
            .push(activity);
    }

    let event_clusters: Vec<Cluster> = events
        .iter()
        .map(|event| {
            let members = buckets.shift_remove(&event.place_id).unwrap_or_default();
            Cluster {
                id: format!("event:{}", event.id),
                kind: ClusterKind::Event {
                    event_id: event.id.clone(),
                    place_id: event.place_id.clone(),
                },
                centroid: event.coordinates,
                radius: farthest(event.coordinates, members.iter().map(|a| a.coordinates)),
                members,
                event: Some(event.clone()),
            }
        })
        .collect();

    let mut clusters: Vec<Cluster> = buckets
        .into_iter()
        .filter_map(|(place_id, members)| {
            let location = members.first()?.coordinates;
            Some(Cluster {
                id: format!("place:{}", place_id),
                kind: ClusterKind::Place { place_id },
                centroid: location,
                radius: 0.0,
                members,
                event: None,
            })
        })
        .collect();

    if let Some(precision) = options.proximity_precision {
        clusters = merge_nearby(clusters, precision);
    }
    clusters.truncate(options.limit);

    Annotations {
        clusters,
        event_clusters,
    }
}

fn merge_nearby(clusters: Vec<Cluster>, precision: usize) -> Vec<Cluster> {
    let mut cells: IndexMap<String, Vec<Cluster>> = IndexMap::new();
    for cluster in clusters {
        let point = Coord {
            x: cluster.centroid.lng(),
            y: cluster.centroid.lat(),
        };
        // Unencodable points keep their own group.
        let key = encode(point, precision).unwrap_or_else(|_| cluster.id.clone());
        cells.entry(key).or_default().push(cluster);
    }

    cells
        .into_iter()
        .map(|(cell, mut group)| {
            if group.len() == 1 {
                group.remove(0)
            } else {
                merge_group(cell, group)
            }
        })
        .collect()
}

fn merge_group(cell: String, group: Vec<Cluster>) -> Cluster {
    let mut total = 0.0;
    let (mut sum_x, mut sum_y) = (0.0, 0.0);
    for cluster in &group {
        let weight = cluster.members.len() as f64;
        let (x, y) = cluster.centroid.to_mercator();
        sum_x += x * weight;
        sum_y += y * weight;
        total += weight;
    }
    let centroid = LngLat::from_mercator(sum_x / total, sum_y / total);
    let radius = farthest(centroid, group.iter().map(|c| c.centroid));

    Cluster {
        id: format!("geo:{}", cell),
        kind: ClusterKind::Area { cell },
        centroid,
        radius,
        members: group.into_iter().flat_map(|c| c.members).collect(),
        event: None,
    }
}

/// Largest projected distance from `center` to any of `points`.
fn farthest(center: LngLat, points: impl Iterator<Item = LngLat>) -> f64 {
    let (cx, cy) = center.to_mercator();
    points
        .map(|p| {
            let (x, y) = p.to_mercator();
            (x - cx).hypot(y - cy)
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_activity;

    fn event(id: &str, place_id: &str, lng: f64, lat: f64) -> Event {
        Event {
            id: id.to_string(),
            place_id: place_id.to_string(),
            title: Some(format!("Event {}", id)),
            coordinates: LngLat::new(lng, lat),
        }
    }

    fn member_ids(cluster: &Cluster) -> Vec<&str> {
        cluster.members.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_same_place_groups_regardless_of_order() {
        let activities = vec![
            make_activity("a1", "p1", 139.70, 35.68),
            make_activity("b1", "p2", -0.12, 51.50),
            make_activity("a2", "p1", 139.70, 35.68),
        ];
        let mut reversed = activities.clone();
        reversed.reverse();

        for input in [activities, reversed] {
            let result = cluster_activities(input, &[], &ClusterOptions::default());
            assert_eq!(result.clusters.len(), 2);
            let p1 = result
                .clusters
                .iter()
                .find(|c| c.kind == ClusterKind::Place { place_id: "p1".into() })
                .unwrap();
            let mut ids = member_ids(p1);
            ids.sort();
            assert_eq!(ids, vec!["a1", "a2"]);
            assert_eq!(p1.centroid, LngLat::new(139.70, 35.68));
        }
    }

    #[test]
    fn test_event_absorbs_place_bucket() {
        let activities = vec![
            make_activity("a1", "p1", 139.70, 35.68),
            make_activity("a2", "p1", 139.70, 35.68),
            make_activity("b1", "p2", 139.80, 35.70),
        ];
        let events = vec![event("e1", "p1", 139.70, 35.68)];

        let result = cluster_activities(activities, &events, &ClusterOptions::default());
        assert_eq!(result.event_clusters.len(), 1);
        assert_eq!(member_ids(&result.event_clusters[0]), vec!["a1", "a2"]);
        assert_eq!(result.event_clusters[0].id, "event:e1");

        assert_eq!(result.clusters.len(), 1);
        assert_eq!(member_ids(&result.clusters[0]), vec!["b1"]);
        assert!(result.clusters[0].is_solo());
    }

    #[test]
    fn test_event_without_bucket_has_no_members() {
        let events = vec![event("e1", "p9", 10.0, 10.0)];
        let result = cluster_activities(vec![], &events, &ClusterOptions::default());

        assert!(result.clusters.is_empty());
        assert_eq!(result.event_clusters.len(), 1);
        assert_eq!(result.event_clusters[0].member_count(), 0);
        assert_eq!(result.event_clusters[0].radius, 0.0);
    }

    #[test]
    fn test_empty_input() {
        let result = cluster_activities(vec![], &[], &ClusterOptions::default());
        assert!(result.is_empty());
    }

    #[test]
    fn test_truncates_by_insertion_order() {
        let activities: Vec<Activity> = (0..40)
            .map(|i| make_activity(&format!("a{}", i), &format!("p{}", i), i as f64, 0.0))
            .collect();
        let options = ClusterOptions {
            limit: 30,
            proximity_precision: None,
        };

        let result = cluster_activities(activities, &[], &options);
        assert_eq!(result.clusters.len(), 30);
        assert_eq!(result.clusters[0].id, "place:p0");
        assert_eq!(result.clusters[29].id, "place:p29");
    }

    #[test]
    fn test_proximity_merges_nearby_places() {
        let activities = vec![
            make_activity("a1", "p1", 139.7000, 35.6800),
            make_activity("a2", "p1", 139.7000, 35.6800),
            make_activity("b1", "p2", 139.7001, 35.6801),
            make_activity("c1", "p3", -0.12, 51.50),
        ];
        let events = vec![event("e1", "p4", 139.7001, 35.6800)];
        let options = ClusterOptions {
            limit: 30,
            proximity_precision: Some(5),
        };

        let result = cluster_activities(activities, &events, &options);
        assert_eq!(result.clusters.len(), 2);

        let merged = &result.clusters[0];
        assert!(matches!(merged.kind, ClusterKind::Area { .. }));
        assert!(merged.id.starts_with("geo:"));
        assert_eq!(member_ids(merged), vec!["a1", "a2", "b1"]);
        assert!(merged.radius > 0.0);
        // Weighted toward p1, which has two members.
        assert!(merged.centroid.lng() < 139.70005);

        assert_eq!(result.clusters[1].id, "place:p3");
        assert_eq!(result.event_clusters.len(), 1);
    }

    #[test]
    fn test_precision_for_span() {
        assert_eq!(precision_for_span(40_000_000.0), 1);
        assert_eq!(precision_for_span(1_000_000.0), 3);
        assert_eq!(precision_for_span(10_000.0), 6);
        assert_eq!(precision_for_span(100.0), 8);
    }
}
