// ── Topology layout ──
//
// Parallel links between the same two nodes are fanned out as quadratic
// curves. Links are grouped by their unordered node pair; within a group of
// `k`, the link at input position `i` gets offset `(i - (k-1)/2) * step`,
// so the group sits symmetrically about the straight segment.
// The force simulation that positions nodes is driven by `ForceParams`.

use std::collections::HashMap;
use std::path::Path;

use ndtviz_api::{TopologyGraph, TopologyLink};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const DEFAULT_OFFSET_STEP: f64 = 25.0;

// ── Force simulation parameters ──────────────────────────────────────

/// Tunables for the force-directed node placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceParams {
    /// Pairwise node charge; negative repels.
    pub charge: f64,
    /// Rest length of every link.
    pub link_distance: f64,
    /// Minimum separation radius per node.
    pub collision_radius: f64,
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            charge: -300.0,
            link_distance: 90.0,
            collision_radius: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Spacing between adjacent parallel links.
    pub offset_step: f64,
    pub force: ForceParams,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            offset_step: DEFAULT_OFFSET_STEP,
            force: ForceParams::default(),
        }
    }
}

// ── Edge offsets ─────────────────────────────────────────────────────

/// Anything with two endpoint node ids.
pub trait Endpoints {
    fn source(&self) -> &str;
    fn target(&self) -> &str;
}

impl Endpoints for TopologyLink {
    fn source(&self) -> &str {
        &self.source
    }

    fn target(&self) -> &str {
        &self.target
    }
}

impl<S: AsRef<str>> Endpoints for (S, S) {
    fn source(&self) -> &str {
        self.0.as_ref()
    }

    fn target(&self) -> &str {
        self.1.as_ref()
    }
}

/// Placement of one link within its parallel group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeOffset {
    /// Position within the group, by input order.
    pub offset_index: usize,
    pub group_size: usize,
    /// Signed perpendicular displacement of the curve's control point.
    pub offset: f64,
    /// The link runs against its group's canonical node order.
    pub reversed: bool,
}

/// Offset formula for position `index` of `group_size` parallel links.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn offset_for(index: usize, group_size: usize, step: f64) -> f64 {
    if group_size <= 1 {
        return 0.0;
    }
    (index as f64 - (group_size as f64 - 1.0) / 2.0) * step
}

/// Group `edges` by unordered node pair and assign each its offset.
///
/// The result is parallel to `edges`. Ties within a group break by input
/// position; nothing is re-sorted.
pub fn resolve_offsets<E: Endpoints>(edges: &[E], step: f64) -> Vec<EdgeOffset> {
    let mut groups: HashMap<(&str, &str), Vec<usize>> = HashMap::new();
    for (pos, edge) in edges.iter().enumerate() {
        groups.entry(pair_key(edge)).or_default().push(pos);
    }

    let mut out = vec![
        EdgeOffset {
            offset_index: 0,
            group_size: 1,
            offset: 0.0,
            reversed: false,
        };
        edges.len()
    ];
    for members in groups.values() {
        let k = members.len();
        for (i, &pos) in members.iter().enumerate() {
            let (Some(slot), Some(edge)) = (out.get_mut(pos), edges.get(pos)) else {
                continue;
            };
            *slot = EdgeOffset {
                offset_index: i,
                group_size: k,
                offset: offset_for(i, k, step),
                reversed: edge.source() > edge.target(),
            };
        }
    }
    out
}

fn pair_key<E: Endpoints>(edge: &E) -> (&str, &str) {
    let (a, b) = (edge.source(), edge.target());
    if a <= b { (a, b) } else { (b, a) }
}

impl EdgeOffset {
    /// Control point of the quadratic curve from `from` to `to`.
    ///
    /// The perpendicular is taken against the group's canonical direction,
    /// so links drawn in either direction fan out consistently. Coincident
    /// endpoints yield the midpoint.
    pub fn control_point(&self, from: (f64, f64), to: (f64, f64)) -> (f64, f64) {
        let mid = ((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0);
        let (dx, dy) = if self.reversed {
            (from.0 - to.0, from.1 - to.1)
        } else {
            (to.0 - from.0, to.1 - from.1)
        };
        let len = dx.hypot(dy);
        if len == 0.0 || self.offset == 0.0 {
            return mid;
        }
        let (nx, ny) = (-dy / len, dx / len);
        (mid.0 + nx * self.offset, mid.1 + ny * self.offset)
    }
}

// ── TopologyLayout ───────────────────────────────────────────────────

/// A fetched graph with per-link offsets resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyLayout {
    pub graph: TopologyGraph,
    /// Parallel to `graph.links`.
    pub offsets: Vec<EdgeOffset>,
    pub force: ForceParams,
}

impl TopologyLayout {
    pub fn resolve(graph: TopologyGraph, config: &LayoutConfig) -> Self {
        let offsets = resolve_offsets(&graph.links, config.offset_step);
        Self {
            graph,
            offsets,
            force: config.force,
        }
    }

    /// Resolve the graph described by a containerlab topology file.
    pub fn from_lab_file(path: &Path, config: &LayoutConfig) -> Result<Self, CoreError> {
        let lab = ndtviz_api::clab::load(path)?;
        tracing::debug!(lab = lab.name.as_deref().unwrap_or("-"), nodes = lab.graph.nodes.len(), "loaded lab file");
        Ok(Self::resolve(lab.graph, config))
    }

    /// Links with their offsets, in input order.
    pub fn links(&self) -> impl Iterator<Item = (&TopologyLink, &EdgeOffset)> {
        self.graph.links.iter().zip(self.offsets.iter())
    }

    /// Number of distinct node pairs that carry more than one link.
    pub fn parallel_groups(&self) -> usize {
        self.offsets
            .iter()
            .filter(|o| o.group_size > 1 && o.offset_index == 0)
            .count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const S: f64 = DEFAULT_OFFSET_STEP;

    fn offsets(edges: &[(&str, &str)]) -> Vec<f64> {
        resolve_offsets(edges, S).iter().map(|o| o.offset).collect()
    }

    #[test]
    fn single_link_is_straight() {
        assert_eq!(offsets(&[("a", "b")]), [0.0]);
    }

    #[test]
    fn two_links_split_evenly() {
        assert_eq!(offsets(&[("a", "b"), ("a", "b")]), [-S / 2.0, S / 2.0]);
    }

    #[test]
    fn four_links_in_input_order_regardless_of_direction() {
        let got = offsets(&[("A", "B"), ("B", "A"), ("A", "B"), ("B", "A")]);
        assert_eq!(got, [-1.5 * S, -0.5 * S, 0.5 * S, 1.5 * S]);
    }

    #[test]
    fn groups_are_independent_and_symmetric() {
        let edges = [("a", "b"), ("b", "c"), ("b", "a"), ("c", "b"), ("a", "b"), ("a", "c")];
        let res = resolve_offsets(&edges, S);

        assert_eq!(res[0].group_size, 3);
        assert_eq!(res[1].group_size, 2);
        assert_eq!(res[5].group_size, 1);
        assert_eq!(res[5].offset, 0.0);

        let ab: Vec<f64> = [0, 2, 4].iter().map(|&i| res[i].offset).collect();
        assert_eq!(ab, [-S, 0.0, S]);
        assert_eq!(ab.iter().sum::<f64>(), 0.0);

        let idx: Vec<usize> = [0, 2, 4].iter().map(|&i| res[i].offset_index).collect();
        assert_eq!(idx, [0, 1, 2]);
    }

    #[test]
    fn offsets_distinct_within_group() {
        for k in 1..=7 {
            let edges = vec![("x", "y"); k];
            let mut got = offsets(&edges);
            got.dedup();
            assert_eq!(got.len(), k);
            let sum: f64 = got.iter().sum();
            assert!(sum.abs() < 1e-9, "k={k} sum={sum}");
        }
    }

    #[test]
    fn control_point_is_perpendicular() {
        let off = EdgeOffset {
            offset_index: 0,
            group_size: 2,
            offset: 10.0,
            reversed: false,
        };
        let cp = off.control_point((0.0, 0.0), (100.0, 0.0));
        assert_eq!(cp, (50.0, 10.0));

        // Reversed link, drawn the other way, lands on the same side.
        let rev = EdgeOffset { reversed: true, ..off };
        assert_eq!(rev.control_point((100.0, 0.0), (0.0, 0.0)), (50.0, 10.0));

        let straight = EdgeOffset { offset: 0.0, ..off };
        assert_eq!(straight.control_point((0.0, 0.0), (10.0, 10.0)), (5.0, 5.0));
        assert_eq!(off.control_point((3.0, 3.0), (3.0, 3.0)), (3.0, 3.0));
    }

    #[test]
    fn force_defaults() {
        let p = ForceParams::default();
        assert_eq!((p.charge, p.link_distance, p.collision_radius), (-300.0, 90.0, 30.0));
    }

    #[test]
    fn layout_from_graph() {
        let link = |s: &str, t: &str| TopologyLink {
            source: s.into(),
            target: t.into(),
            source_interface: "e1".into(),
            target_interface: "e1".into(),
        };
        let graph = TopologyGraph {
            nodes: Vec::new(),
            links: vec![link("a", "b"), link("b", "a"), link("b", "c")],
        };
        let layout = TopologyLayout::resolve(graph, &LayoutConfig::default());
        assert_eq!(layout.offsets.len(), 3);
        assert_eq!(layout.parallel_groups(), 1);
        let (first, off) = layout.links().next().unwrap();
        assert_eq!(first.source, "a");
        assert_eq!(off.offset, -S / 2.0);
        assert!(layout.offsets[1].reversed);
    }
}
