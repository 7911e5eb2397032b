//! Bubble chart planning: sizing, cluster seeding, relaxation and hulls.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    clamp_strength,
    color::ColorMap,
    force::{Body, ForceRelaxation, Forces},
    hull::{category_hull, CategoryHull},
    Category, IndexedFinding,
};

/// Geometry and force parameters for the bubble chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub baseline_width: f64,
    pub base_radius: f64,
    pub radius_per_strength: f64,
    pub height: f64,
    pub iterations: usize,
    pub collision_buffer: f64,
    pub center_strength: f64,
    pub cluster_strength: f64,
    pub cluster_jitter: f64,
    pub hull_padding: f64,
    pub hull_samples: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            baseline_width: 500.0,
            base_radius: 2.0,
            radius_per_strength: 6.0,
            height: 400.0,
            iterations: 300,
            collision_buffer: 2.0,
            center_strength: 0.02,
            cluster_strength: 0.12,
            cluster_jitter: 30.0,
            hull_padding: 10.0,
            hull_samples: 16,
        }
    }
}

impl LayoutConfig {
    /// Shrinks bubbles in containers narrower than the baseline width. An
    /// unknown (zero) width leaves them unscaled.
    pub fn scale_factor(&self, container_width: f64) -> f64 {
        if container_width <= 0.0 || self.baseline_width <= 0.0 {
            return 1.0;
        }
        (container_width / self.baseline_width).min(1.0)
    }

    pub fn radius(&self, strength: u8, container_width: f64) -> f64 {
        self.base_radius
            + f64::from(strength) * self.radius_per_strength * self.scale_factor(container_width)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleNode {
    pub id: String,
    pub display_index: usize,
    pub name: String,
    pub strength: u8,
    pub category: Category,
    pub color: String,
    pub radius: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BubbleLayout {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<BubbleNode>,
    pub hulls: Vec<CategoryHull>,
}

impl BubbleLayout {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Sized but unpositioned nodes, one per display index. Strengths outside
/// 1-10 are clamped first.
pub fn size_nodes(
    findings: &[IndexedFinding],
    colors: &ColorMap,
    container_width: f64,
    config: &LayoutConfig,
) -> Vec<BubbleNode> {
    let mut nodes: Vec<BubbleNode> = Vec::new();
    for finding in findings {
        if nodes.iter().any(|n| n.display_index == finding.display_index) {
            continue;
        }
        let color = colors
            .get(&finding.pattern_name)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "hsl(0, 0%, 60%)".to_string());
        let strength = clamp_strength(finding.strength);
        nodes.push(BubbleNode {
            id: format!("finding-{}", finding.display_index),
            display_index: finding.display_index,
            name: finding.display_name.clone(),
            strength,
            category: finding.category,
            color,
            radius: config.radius(strength, container_width),
            x: 0.0,
            y: 0.0,
        });
    }
    nodes
}

/// Groups items by key, keeping first-occurrence order of keys.
fn group_by<K: PartialEq + Clone>(keys: impl Iterator<Item = K>) -> Vec<(K, Vec<usize>)> {
    let mut groups: Vec<(K, Vec<usize>)> = Vec::new();
    for (idx, key) in keys.enumerate() {
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(idx),
            None => groups.push((key, vec![idx])),
        }
    }
    groups
}

/// Plans the full bubble layout for a container `container_width` wide.
///
/// Returns an empty layout when there is nothing to draw or the width is not
/// known yet.
pub fn plan_layout<R, F>(
    findings: &[IndexedFinding],
    colors: &ColorMap,
    container_width: f64,
    config: &LayoutConfig,
    relaxation: &F,
    rng: &mut R,
) -> BubbleLayout
where
    R: Rng,
    F: ForceRelaxation + ?Sized,
{
    if findings.is_empty() || container_width <= 0.0 {
        tracing::debug!(
            findings = findings.len(),
            container_width,
            "bubble layout skipped"
        );
        return BubbleLayout::default();
    }

    let width = container_width;
    let height = config.height;
    let mut nodes = size_nodes(findings, colors, width, config);

    let categories = group_by(nodes.iter().map(|n| n.category));
    let mut bodies: Vec<Option<Body>> = vec![None; nodes.len()];
    let slots = categories.len() as f64 + 1.0;
    for (slot, (_, members)) in categories.iter().enumerate() {
        let anchor_x = width * (slot as f64 + 1.0) / slots;
        let anchor_y = height / 2.0;
        let names = group_by(members.iter().map(|&m| nodes[m].name.clone()));
        for (_, name_members) in names {
            let jitter = config.cluster_jitter.abs();
            let (jx, jy) = if jitter > 0.0 {
                (
                    rng.random_range(-jitter..=jitter),
                    rng.random_range(-jitter..=jitter),
                )
            } else {
                (0.0, 0.0)
            };
            let anchor = (anchor_x + jx, anchor_y + jy);
            for local in name_members {
                let node = &nodes[members[local]];
                let spread = node.radius.max(1.0);
                let x = anchor.0 + rng.random_range(-spread..=spread);
                let y = anchor.1 + rng.random_range(-spread..=spread);
                bodies[members[local]] = Some(Body::new(x, y, node.radius, anchor));
            }
        }
    }
    let mut bodies: Vec<Body> = bodies.into_iter().flatten().collect();

    let forces = Forces {
        center: (width / 2.0, height / 2.0),
        center_strength: config.center_strength,
        anchor_strength: config.cluster_strength,
        collision_buffer: config.collision_buffer,
        collision_strength: 1.0,
    };
    relaxation.relax(&mut bodies, &forces, config.iterations);

    for (node, body) in nodes.iter_mut().zip(&bodies) {
        node.x = body.x;
        node.y = body.y;
    }

    let hulls = categories
        .iter()
        .filter_map(|(category, members)| {
            let circles: Vec<(f64, f64, f64)> = members
                .iter()
                .map(|&m| (nodes[m].x, nodes[m].y, nodes[m].radius))
                .collect();
            category_hull(
                *category,
                &circles,
                config.hull_padding,
                config.hull_samples,
            )
        })
        .collect();

    tracing::debug!(
        nodes = nodes.len(),
        categories = categories.len(),
        "bubble layout planned"
    );
    BubbleLayout {
        width,
        height,
        nodes,
        hulls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{color::assign_colors, color::Palette, force::ForceSimulation, Finding};
    use rand::{rngs::StdRng, SeedableRng};

    fn indexed(
        name: &str,
        strength: u8,
        category: Category,
        display_index: usize,
    ) -> IndexedFinding {
        IndexedFinding {
            finding: Finding {
                pattern_name: name.into(),
                display_name: name.into(),
                specific_quote: format!("quote {display_index}"),
                explanation: String::new(),
                strength,
                category,
            },
            display_index,
        }
    }

    #[test]
    fn radius_scales_with_container_width() {
        let cfg = LayoutConfig::default();
        assert_eq!(cfg.radius(10, 500.0), 62.0);
        assert_eq!(cfg.radius(10, 250.0), 32.0);
        assert_eq!(cfg.radius(10, 1200.0), 62.0);
        assert_eq!(cfg.radius(10, 0.0), 62.0);
        assert_eq!(cfg.radius(0, 100.0), 2.0);
    }

    #[test]
    fn repeated_display_index_yields_one_node() {
        let findings = vec![
            indexed("Fear", 4, Category::EmotionalManipulation, 0),
            indexed("Fear", 4, Category::EmotionalManipulation, 0),
            indexed("Guilt", 6, Category::EmotionalManipulation, 1),
        ];
        let nodes = size_nodes(
            &findings,
            &ColorMap::default(),
            500.0,
            &LayoutConfig::default(),
        );
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "finding-0");
        assert_eq!(nodes[1].radius, 38.0);
        assert_eq!(nodes[0].color, "hsl(0, 0%, 60%)");
    }

    #[test]
    fn sizing_clamps_strength_into_range() {
        let findings = vec![
            indexed("Fear", 200, Category::EmotionalManipulation, 0),
            indexed("Guilt", 0, Category::EmotionalManipulation, 1),
        ];
        let nodes = size_nodes(
            &findings,
            &ColorMap::default(),
            500.0,
            &LayoutConfig::default(),
        );
        assert_eq!((nodes[0].strength, nodes[0].radius), (10, 62.0));
        assert_eq!((nodes[1].strength, nodes[1].radius), (1, 8.0));
    }

    #[test]
    fn zero_width_or_no_findings_skip_layout() {
        let sim = ForceSimulation::default();
        let mut rng = StdRng::seed_from_u64(1);
        let cfg = LayoutConfig::default();
        let colors = ColorMap::default();
        let findings = vec![indexed("Fear", 4, Category::EmotionalManipulation, 0)];
        assert!(plan_layout(&findings, &colors, 0.0, &cfg, &sim, &mut rng).is_empty());
        assert!(plan_layout(&[], &colors, 800.0, &cfg, &sim, &mut rng).is_empty());
    }

    #[test]
    fn single_member_category_gets_circle_hull() {
        let findings = vec![
            indexed("Fear", 5, Category::EmotionalManipulation, 0),
            indexed("Straw Man", 5, Category::LogicalFallacy, 1),
            indexed("Slippery Slope", 5, Category::LogicalFallacy, 2),
        ];
        let names: Vec<String> = findings.iter().map(|f| f.pattern_name.clone()).collect();
        let colors = assign_colors(&names, &Palette::default());
        let mut rng = StdRng::seed_from_u64(9);
        let layout = plan_layout(
            &findings,
            &colors,
            800.0,
            &LayoutConfig::default(),
            &ForceSimulation::default(),
            &mut rng,
        );
        assert_eq!(layout.hulls.len(), 2);
        match &layout.hulls[0] {
            CategoryHull::Circle {
                category,
                cx,
                cy,
                r,
            } => {
                assert_eq!(*category, Category::EmotionalManipulation);
                assert_eq!(*cx, layout.nodes[0].x);
                assert_eq!(*cy, layout.nodes[0].y);
                assert_eq!(*r, layout.nodes[0].radius + 10.0);
            }
            other => panic!("expected circle hull, got {other:?}"),
        }
        assert!(matches!(layout.hulls[1], CategoryHull::Polygon { .. }));
        assert_eq!(layout.nodes[1].color, "hsl(137.5, 70%, 60%)");
    }
}
