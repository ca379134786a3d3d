//! Force-directed node placement for the topology canvas.
//!
//! A small velocity-Verlet simulation with four forces: pairwise charge
//! (repulsion for negative values), spring links pulling toward the rest
//! length, collision separation, and centring. `alpha` cools every tick and
//! the simulation stops once it falls below [`ALPHA_MIN`].

use std::collections::HashMap;
use std::f64::consts::PI;

use ndtviz_core::{ForceParams, TopologyGraph};

pub const ALPHA_MIN: f64 = 0.001;
/// Cools from 1.0 to `ALPHA_MIN` in roughly 300 ticks.
const ALPHA_DECAY: f64 = 0.0228;
const VELOCITY_DECAY: f64 = 0.4;
const COLLISION_STRENGTH: f64 = 0.7;
/// Squared distance floor for the charge force.
const MIN_DISTANCE_SQ: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Body {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

#[derive(Debug, Clone)]
pub struct ForceLayout {
    index: HashMap<String, usize>,
    bodies: Vec<Body>,
    links: Vec<(usize, usize)>,
    degree: Vec<usize>,
    params: ForceParams,
    alpha: f64,
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn phyllotaxis(i: usize, radius: f64) -> (f64, f64) {
    let golden = PI * (3.0 - 5.0_f64.sqrt());
    let r = radius * (0.5 + i as f64).sqrt();
    let theta = i as f64 * golden;
    (r * theta.cos(), r * theta.sin())
}

impl ForceLayout {
    pub fn new(graph: &TopologyGraph, params: ForceParams) -> Self {
        let n = graph.nodes.len();
        let index: HashMap<String, usize> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();

        let seed_radius = params.collision_radius.max(1.0) / 2.0;
        let bodies = (0..n)
            .map(|i| {
                let (x, y) = phyllotaxis(i, seed_radius);
                Body {
                    x,
                    y,
                    ..Body::default()
                }
            })
            .collect();

        // Links to unknown nodes and self-loops exert no force.
        let links: Vec<(usize, usize)> = graph
            .links
            .iter()
            .filter_map(|l| Some((*index.get(&l.source)?, *index.get(&l.target)?)))
            .filter(|(s, t)| s != t)
            .collect();
        let mut degree = vec![0; n];
        for &(s, t) in &links {
            degree[s] += 1;
            degree[t] += 1;
        }

        Self {
            index,
            bodies,
            links,
            degree,
            params,
            alpha: 1.0,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.alpha < ALPHA_MIN
    }

    /// Restart cooling, e.g. after the operator nudges the layout.
    pub fn reheat(&mut self) {
        self.alpha = 1.0;
    }

    /// Advance one step. Returns `false` once settled.
    pub fn tick(&mut self) -> bool {
        if self.is_settled() || self.bodies.is_empty() {
            return false;
        }
        self.alpha += (0.0 - self.alpha) * ALPHA_DECAY;

        self.apply_links();
        self.apply_charge();
        self.apply_collisions();

        for b in &mut self.bodies {
            b.vx *= 1.0 - VELOCITY_DECAY;
            b.vy *= 1.0 - VELOCITY_DECAY;
            b.x += b.vx;
            b.y += b.vy;
        }
        self.recenter();
        true
    }

    /// Run until settled or `max_ticks` have elapsed.
    pub fn settle(&mut self, max_ticks: usize) {
        for _ in 0..max_ticks {
            if !self.tick() {
                break;
            }
        }
    }

    pub fn position(&self, id: &str) -> Option<(f64, f64)> {
        let b = self.bodies.get(*self.index.get(id)?)?;
        Some((b.x, b.y))
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)`, padded by the
    /// collision radius. `None` for an empty graph.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let pad = self.params.collision_radius;
        self.bodies.iter().fold(None, |acc, b| {
            let (x0, y0, x1, y1) = acc.unwrap_or((b.x, b.y, b.x, b.y));
            Some((x0.min(b.x), y0.min(b.y), x1.max(b.x), y1.max(b.y)))
        })
        .map(|(x0, y0, x1, y1)| (x0 - pad, y0 - pad, x1 + pad, y1 + pad))
    }

    // ── Forces ───────────────────────────────────────────────────────

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn apply_links(&mut self) {
        for &(s, t) in &self.links {
            let (a, b) = (self.bodies[s], self.bodies[t]);
            let mut dx = (b.x + b.vx) - (a.x + a.vx);
            let mut dy = (b.y + b.vy) - (a.y + a.vy);
            if dx == 0.0 && dy == 0.0 {
                dx = 1e-6;
                dy = 1e-6;
            }
            let len = dx.hypot(dy);
            let strength = 1.0 / self.degree[s].min(self.degree[t]).max(1) as f64;
            let k = (len - self.params.link_distance) / len * self.alpha * strength;
            let bias = self.degree[s] as f64 / (self.degree[s] + self.degree[t]) as f64;
            let (fx, fy) = (dx * k, dy * k);
            self.bodies[t].vx -= fx * bias;
            self.bodies[t].vy -= fy * bias;
            self.bodies[s].vx += fx * (1.0 - bias);
            self.bodies[s].vy += fy * (1.0 - bias);
        }
    }

    fn apply_charge(&mut self) {
        let n = self.bodies.len();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let (a, b) = (self.bodies[i], self.bodies[j]);
                let (dx, dy) = (b.x - a.x, b.y - a.y);
                let dist_sq = (dx * dx + dy * dy).max(MIN_DISTANCE_SQ);
                let w = self.params.charge * self.alpha / dist_sq;
                self.bodies[i].vx += dx * w;
                self.bodies[i].vy += dy * w;
            }
        }
    }

    fn apply_collisions(&mut self) {
        let min_sep = self.params.collision_radius * 2.0;
        let n = self.bodies.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (self.bodies[i], self.bodies[j]);
                let mut dx = (b.x + b.vx) - (a.x + a.vx);
                let dy = (b.y + b.vy) - (a.y + a.vy);
                if dx == 0.0 && dy == 0.0 {
                    dx = 1e-6;
                }
                let dist = dx.hypot(dy);
                if dist >= min_sep {
                    continue;
                }
                let push = (min_sep - dist) / dist * COLLISION_STRENGTH * 0.5;
                self.bodies[i].vx -= dx * push;
                self.bodies[i].vy -= dy * push;
                self.bodies[j].vx += dx * push;
                self.bodies[j].vy += dy * push;
            }
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn recenter(&mut self) {
        let n = self.bodies.len() as f64;
        let (sx, sy) = self
            .bodies
            .iter()
            .fold((0.0, 0.0), |(sx, sy), b| (sx + b.x, sy + b.y));
        let (cx, cy) = (sx / n, sy / n);
        for b in &mut self.bodies {
            b.x -= cx;
            b.y -= cy;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ndtviz_core::{TopologyLink, TopologyNode};

    fn node(id: &str) -> TopologyNode {
        TopologyNode {
            id: id.into(),
            group: None,
            image: None,
            kind: None,
            extra: Default::default(),
        }
    }

    fn link(a: &str, b: &str) -> TopologyLink {
        TopologyLink {
            source: a.into(),
            target: b.into(),
            ..TopologyLink::default()
        }
    }

    fn distance(layout: &ForceLayout, a: &str, b: &str) -> f64 {
        let (ax, ay) = layout.position(a).unwrap();
        let (bx, by) = layout.position(b).unwrap();
        (bx - ax).hypot(by - ay)
    }

    #[test]
    fn empty_graph_is_inert() {
        let mut layout = ForceLayout::new(&TopologyGraph::default(), ForceParams::default());
        assert!(!layout.tick());
        assert_eq!(layout.bounds(), None);
    }

    #[test]
    fn cooling_terminates() {
        let graph = TopologyGraph {
            nodes: vec![node("a"), node("b")],
            links: vec![link("a", "b")],
        };
        let mut layout = ForceLayout::new(&graph, ForceParams::default());
        layout.settle(10_000);
        assert!(layout.is_settled());
        assert!(!layout.tick());

        layout.reheat();
        assert!(layout.tick());
    }

    #[test]
    fn linked_pair_settles_near_rest_length() {
        let graph = TopologyGraph {
            nodes: vec![node("a"), node("b")],
            links: vec![link("a", "b")],
        };
        let params = ForceParams::default();
        let mut layout = ForceLayout::new(&graph, params);
        layout.settle(1_000);

        let d = distance(&layout, "a", "b");
        assert!(
            d > params.link_distance * 0.5 && d < params.link_distance * 3.0,
            "distance {d}"
        );
    }

    #[test]
    fn unlinked_nodes_keep_collision_distance() {
        let graph = TopologyGraph {
            nodes: vec![node("a"), node("b"), node("c")],
            links: vec![],
        };
        let params = ForceParams::default();
        let mut layout = ForceLayout::new(&graph, params);
        layout.settle(1_000);

        for (a, b) in [("a", "b"), ("a", "c"), ("b", "c")] {
            assert!(
                distance(&layout, a, b) >= params.collision_radius,
                "{a}-{b} too close"
            );
        }
    }

    #[test]
    fn layout_is_centred() {
        let graph = TopologyGraph {
            nodes: vec![node("a"), node("b"), node("c")],
            links: vec![link("a", "b"), link("b", "c")],
        };
        let mut layout = ForceLayout::new(&graph, ForceParams::default());
        layout.settle(300);
        let (sx, sy) = ["a", "b", "c"]
            .iter()
            .filter_map(|id| layout.position(id))
            .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
        assert!(sx.abs() < 1e-6 && sy.abs() < 1e-6);
    }

    #[test]
    fn dangling_links_are_ignored() {
        let graph = TopologyGraph {
            nodes: vec![node("a")],
            links: vec![link("a", "ghost"), link("a", "a")],
        };
        let mut layout = ForceLayout::new(&graph, ForceParams::default());
        layout.settle(50);
        assert!(layout.position("a").is_some());
        assert!(layout.position("ghost").is_none());
    }
}
