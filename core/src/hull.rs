//! Per-category enclosures drawn behind bubble groups.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::Category;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Enclosure of one category's bubbles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "kebab-case")]
pub enum CategoryHull {
    /// A lone bubble: its padded circle.
    Circle {
        category: Category,
        cx: f64,
        cy: f64,
        r: f64,
    },
    /// Convex hull of points sampled around every padded circle,
    /// counter-clockwise in y-up coordinates.
    Polygon {
        category: Category,
        points: Vec<Point>,
    },
}

impl CategoryHull {
    pub fn category(&self) -> Category {
        match self {
            CategoryHull::Circle { category, .. } | CategoryHull::Polygon { category, .. } => {
                *category
            }
        }
    }

    /// SVG path data for the enclosure.
    pub fn svg_path(&self) -> String {
        match self {
            CategoryHull::Circle { cx, cy, r, .. } => format!(
                "M {:.2} {:.2} a {r:.2} {r:.2} 0 1 0 {:.2} 0 a {r:.2} {r:.2} 0 1 0 {:.2} 0 Z",
                cx - r,
                cy,
                2.0 * r,
                -2.0 * r,
            ),
            CategoryHull::Polygon { points, .. } => {
                let mut path = String::new();
                for (idx, p) in points.iter().enumerate() {
                    let cmd = if idx == 0 { "M" } else { " L" };
                    path.push_str(&format!("{cmd} {:.2} {:.2}", p.x, p.y));
                }
                if !points.is_empty() {
                    path.push_str(" Z");
                }
                path
            }
        }
    }
}

/// `samples` evenly spaced points on a circle.
pub fn sample_circle(cx: f64, cy: f64, r: f64, samples: usize) -> Vec<Point> {
    (0..samples)
        .map(|i| {
            let theta = TAU * i as f64 / samples as f64;
            Point {
                x: cx + r * theta.cos(),
                y: cy + r * theta.sin(),
            }
        })
        .collect()
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Andrew's monotone chain. Collinear points are dropped; fewer than three
/// distinct points come back unchanged (deduplicated).
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Hull around circles `(cx, cy, r)` belonging to one category.
pub fn category_hull(
    category: Category,
    circles: &[(f64, f64, f64)],
    padding: f64,
    samples: usize,
) -> Option<CategoryHull> {
    match circles {
        [] => None,
        [(cx, cy, r)] => Some(CategoryHull::Circle {
            category,
            cx: *cx,
            cy: *cy,
            r: r + padding,
        }),
        _ => {
            let cloud: Vec<Point> = circles
                .iter()
                .flat_map(|(cx, cy, r)| sample_circle(*cx, *cy, r + padding, samples.max(3)))
                .collect();
            Some(CategoryHull::Polygon {
                category,
                points: convex_hull(&cloud),
            })
        }
    }
}
