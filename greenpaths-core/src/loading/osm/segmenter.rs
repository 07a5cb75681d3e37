//! Splitting of raw ways into atomic segments at shared nodes

use geo::{Coord, LineString};
use hashbrown::HashSet;
use log::{debug, info};

use crate::Error;
use crate::model::{
    NodeRef, PARENT_WAY_TAG, RawNetwork, RawWay, Segment, SegmentId, SegmentedNetwork,
};

/// Cuts every way of `network` at nodes referenced more than once across the
/// whole network. Ways without such internal nodes are kept as they are,
/// split pieces get ids `-(id_base + n)` with `n` counting up from 1.
///
/// # Errors
///
/// Returns [`Error::Segmentation`] if a way has no nodes or references a node
/// without coordinates. Nothing is returned in that case.
pub fn segment_network(network: &RawNetwork, id_base: i64) -> Result<SegmentedNetwork, Error> {
    if id_base <= 0 {
        return Err(Error::Segmentation(format!(
            "Synthetic id base must be positive, got {id_base}"
        )));
    }

    let intersections = find_intersection_nodes(&network.ways)?;
    debug!(
        "Found {} intersection nodes in {} ways",
        intersections.len(),
        network.ways.len()
    );

    let mut ids = SyntheticIds::new(id_base);
    let mut segments = Vec::with_capacity(network.ways.len());

    for way in &network.ways {
        let pieces = cut_way(&way.nodes, &intersections);
        let unchanged = pieces.len() == 1 && pieces[0].len() == way.nodes.len();

        for nodes in pieces {
            let geometry = build_geometry(network, way, &nodes)?;
            let segment = if unchanged {
                Segment {
                    segment_id: way.id,
                    parent_way_id: way.id,
                    nodes,
                    geometry,
                    tags: way.tags.clone(),
                }
            } else {
                let mut tags = way.tags.clone();
                tags.insert(PARENT_WAY_TAG.to_string(), way.id.to_string());
                Segment {
                    segment_id: ids.next_id()?,
                    parent_way_id: way.id,
                    nodes,
                    geometry,
                    tags,
                }
            };
            segments.push(segment);
        }
    }

    info!(
        "Segmented {} ways into {} segments ({} synthetic)",
        network.ways.len(),
        segments.len(),
        ids.issued()
    );

    Ok(SegmentedNetwork { segments })
}

/// Nodes seen again after their first occurrence, in any way (including the same one)
pub(crate) fn find_intersection_nodes(ways: &[RawWay]) -> Result<HashSet<NodeRef>, Error> {
    let mut seen = HashSet::new();
    let mut intersections = HashSet::new();

    for way in ways {
        if way.nodes.is_empty() {
            return Err(Error::Segmentation(format!(
                "Way {} has no node list",
                way.id
            )));
        }
        for &node in &way.nodes {
            if !seen.insert(node) {
                intersections.insert(node);
            }
        }
    }

    Ok(intersections)
}

/// Splits one node list at intersection nodes. Each piece has at least two
/// nodes and shares its cutting node with the next piece.
pub(crate) fn cut_way(nodes: &[NodeRef], intersections: &HashSet<NodeRef>) -> Vec<Vec<NodeRef>> {
    let mut pieces = Vec::new();
    let mut current: Vec<NodeRef> = Vec::new();

    for &node in nodes {
        current.push(node);
        if current.len() >= 2 && intersections.contains(&node) {
            pieces.push(std::mem::replace(&mut current, vec![node]));
        }
    }

    if current.len() >= 2 {
        pieces.push(current);
    }

    pieces
}

fn build_geometry(
    network: &RawNetwork,
    way: &RawWay,
    nodes: &[NodeRef],
) -> Result<LineString<f64>, Error> {
    nodes
        .iter()
        .map(|node| {
            network.node_coords.get(node).copied().ok_or_else(|| {
                Error::Segmentation(format!(
                    "Way {} references node {node} without coordinates",
                    way.id
                ))
            })
        })
        .collect::<Result<Vec<Coord<f64>>, _>>()
        .map(LineString::new)
}

struct SyntheticIds {
    base: i64,
    counter: i64,
}

impl SyntheticIds {
    fn new(base: i64) -> Self {
        Self { base, counter: 0 }
    }

    fn next_id(&mut self) -> Result<SegmentId, Error> {
        self.counter += 1;
        self.base
            .checked_add(self.counter)
            .map(|id| -id)
            .ok_or_else(|| Error::Segmentation("Synthetic segment id overflow".to_string()))
    }

    fn issued(&self) -> i64 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::DEFAULT_SEGMENT_ID_BASE;

    fn way(id: i64, nodes: &[NodeRef]) -> RawWay {
        RawWay {
            id,
            nodes: nodes.to_vec(),
            tags: BTreeMap::from([("highway".to_string(), "residential".to_string())]),
        }
    }

    fn network(ways: Vec<RawWay>) -> RawNetwork {
        let mut network = RawNetwork {
            ways,
            ..Default::default()
        };
        for way in &network.ways {
            for &node in &way.nodes {
                network
                    .node_coords
                    .insert(node, Coord { x: node as f64, y: 0.0 });
            }
        }
        network
    }

    #[test]
    fn test_way_without_intersections_is_unchanged() {
        let raw = network(vec![way(7, &[1, 2, 3, 4]), way(8, &[10, 11])]);
        let result = segment_network(&raw, DEFAULT_SEGMENT_ID_BASE).unwrap();

        assert_eq!(result.len(), 2);
        let first = &result.segments[0];
        assert_eq!(first.segment_id, 7);
        assert_eq!(first.nodes, vec![1, 2, 3, 4]);
        assert!(!first.is_synthetic());
        assert!(!first.tags.contains_key(PARENT_WAY_TAG));
        assert!((first.length() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_cut_at_shared_node() {
        // Way 2 crosses way 1 at node 3
        let raw = network(vec![way(1, &[1, 2, 3, 4, 5]), way(2, &[20, 3, 21])]);
        let result = segment_network(&raw, DEFAULT_SEGMENT_ID_BASE).unwrap();

        let node_lists: Vec<_> = result.iter().map(|s| s.nodes.clone()).collect();
        assert_eq!(
            node_lists,
            vec![vec![1, 2, 3], vec![3, 4, 5], vec![20, 3], vec![3, 21]]
        );

        for segment in result.iter() {
            assert!(segment.is_synthetic());
            assert!(segment.segment_id < -DEFAULT_SEGMENT_ID_BASE);
            assert_eq!(
                segment.tags.get(PARENT_WAY_TAG),
                Some(&segment.parent_way_id.to_string())
            );
            assert_eq!(segment.tags.get("highway").map(String::as_str), Some("residential"));
        }
    }

    #[test]
    fn test_synthetic_ids_are_unique_and_negative() {
        let raw = network(vec![
            way(1, &[1, 2, 3, 4, 5, 6]),
            way(2, &[2, 30, 4]),
            way(3, &[5, 31, 6, 32]),
        ]);
        let result = segment_network(&raw, 1000).unwrap();

        let ids: HashSet<SegmentId> = result.iter().map(|s| s.segment_id).collect();
        assert_eq!(ids.len(), result.len());

        // Way 2 only touches intersections at its ends and stays whole
        let synthetic: Vec<_> = result.iter().filter(|s| s.is_synthetic()).collect();
        assert_eq!(synthetic.len(), result.len() - 1);
        assert!(synthetic.iter().all(|s| s.segment_id < -1000));
        assert!(result.iter().any(|s| s.segment_id == 2));
    }

    #[test]
    fn test_endpoints_shared_keep_ways_whole() {
        // Two ways meeting only at their endpoints have no internal intersection
        let raw = network(vec![way(1, &[1, 2, 3]), way(2, &[3, 4, 5])]);
        let result = segment_network(&raw, DEFAULT_SEGMENT_ID_BASE).unwrap();

        let ids: Vec<_> = result.iter().map(|s| s.segment_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_consecutive_intersections_need_two_nodes() {
        let intersections: HashSet<NodeRef> = [1, 2, 3].into_iter().collect();
        let pieces = cut_way(&[1, 2, 3], &intersections);
        assert_eq!(pieces, vec![vec![1, 2], vec![2, 3]]);

        let pieces = cut_way(&[1], &intersections);
        assert!(pieces.is_empty());
    }

    #[test]
    fn test_self_loop_node_is_an_intersection() {
        let ways = vec![way(1, &[1, 2, 3, 2, 4])];
        let intersections = find_intersection_nodes(&ways).unwrap();
        assert_eq!(intersections, [2].into_iter().collect());
        assert_eq!(
            cut_way(&ways[0].nodes, &intersections),
            vec![vec![1, 2], vec![2, 3, 2], vec![2, 4]]
        );
    }

    #[test]
    fn test_missing_node_list_is_fatal() {
        let raw = network(vec![way(1, &[1, 2]), way(2, &[])]);
        assert!(matches!(
            segment_network(&raw, DEFAULT_SEGMENT_ID_BASE),
            Err(Error::Segmentation(_))
        ));
    }

    #[test]
    fn test_missing_coordinates_are_fatal() {
        let mut raw = network(vec![way(1, &[1, 2, 3])]);
        raw.node_coords.remove(&2);
        assert!(matches!(
            segment_network(&raw, DEFAULT_SEGMENT_ID_BASE),
            Err(Error::Segmentation(_))
        ));
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let raw = network(vec![way(1, &[1, 2, 3, 4]), way(2, &[9, 3, 8])]);
        let first = segment_network(&raw, DEFAULT_SEGMENT_ID_BASE).unwrap();
        let second = segment_network(&raw, DEFAULT_SEGMENT_ID_BASE).unwrap();
        assert_eq!(first.segments, second.segments);
    }
}
