//! Minimal force-directed relaxation for bubble layouts.
//!
//! Three forces act on every body: a weak pull toward the container centre, a
//! weak pull toward the body's own anchor, and a strong collision force that
//! keeps padded circles apart. Alpha cools geometrically over the configured
//! number of ticks, velocities are damped each tick, and a final projection
//! sweep separates any circles still overlapping.

/// A simulated circle.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub radius: f64,
    pub anchor: (f64, f64),
}

impl Body {
    pub fn new(x: f64, y: f64, radius: f64, anchor: (f64, f64)) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            radius,
            anchor,
        }
    }
}

/// Force parameters for one relaxation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Forces {
    pub center: (f64, f64),
    pub center_strength: f64,
    pub anchor_strength: f64,
    pub collision_buffer: f64,
    pub collision_strength: f64,
}

/// Moves bodies toward a relaxed, non-overlapping arrangement.
pub trait ForceRelaxation {
    fn relax(&self, bodies: &mut [Body], forces: &Forces, iterations: usize);
}

/// Alpha-cooled velocity simulation followed by positional settling.
#[derive(Debug, Clone)]
pub struct ForceSimulation {
    pub alpha_min: f64,
    pub velocity_decay: f64,
    pub collision_passes: usize,
    pub settle_passes: usize,
}

impl Default for ForceSimulation {
    fn default() -> Self {
        Self {
            alpha_min: 0.001,
            velocity_decay: 0.4,
            collision_passes: 1,
            settle_passes: 200,
        }
    }
}

impl ForceSimulation {
    fn tick(&self, bodies: &mut [Body], forces: &Forces, alpha: f64) {
        for body in bodies.iter_mut() {
            body.vx += (forces.center.0 - body.x) * forces.center_strength * alpha;
            body.vy += (forces.center.1 - body.y) * forces.center_strength * alpha;
            body.vx += (body.anchor.0 - body.x) * forces.anchor_strength * alpha;
            body.vy += (body.anchor.1 - body.y) * forces.anchor_strength * alpha;
        }

        for _ in 0..self.collision_passes {
            collide(bodies, forces);
        }

        let keep = 1.0 - self.velocity_decay;
        for body in bodies.iter_mut() {
            body.vx *= keep;
            body.vy *= keep;
            body.x += body.vx;
            body.y += body.vy;
        }
    }
}

impl ForceRelaxation for ForceSimulation {
    fn relax(&self, bodies: &mut [Body], forces: &Forces, iterations: usize) {
        if bodies.is_empty() {
            return;
        }
        if iterations > 0 {
            let alpha_decay = 1.0 - self.alpha_min.powf(1.0 / iterations as f64);
            let mut alpha = 1.0;
            for _ in 0..iterations {
                alpha += (0.0 - alpha) * alpha_decay;
                self.tick(bodies, forces, alpha);
            }
        }

        let mut passes = 0;
        while passes < self.settle_passes && separate(bodies, forces.collision_buffer) {
            passes += 1;
        }
        tracing::trace!(
            bodies = bodies.len(),
            settle_passes = passes,
            "force relaxation finished"
        );
    }
}

/// Pushes overlapping padded circles apart through their velocities,
/// splitting the correction by relative area.
fn collide(bodies: &mut [Body], forces: &Forces) {
    let n = bodies.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let ri = bodies[i].radius + forces.collision_buffer;
            let rj = bodies[j].radius + forces.collision_buffer;
            let min_dist = ri + rj;
            let mut dx = (bodies[j].x + bodies[j].vx) - (bodies[i].x + bodies[i].vx);
            let mut dy = (bodies[j].y + bodies[j].vy) - (bodies[i].y + bodies[i].vy);
            let mut dist2 = dx * dx + dy * dy;
            if dist2 >= min_dist * min_dist {
                continue;
            }
            if dist2 == 0.0 {
                (dx, dy) = nudge(i, j);
                dist2 = dx * dx + dy * dy;
            }
            let dist = dist2.sqrt();
            let push = (min_dist - dist) / dist * forces.collision_strength;
            let wi = rj * rj / (ri * ri + rj * rj);
            let wj = 1.0 - wi;
            bodies[i].vx -= dx * push * wi;
            bodies[i].vy -= dy * push * wi;
            bodies[j].vx += dx * push * wj;
            bodies[j].vy += dy * push * wj;
        }
    }
}

/// One positional pass resolving remaining overlaps between bare circles
/// plus the buffer. Returns whether anything moved.
fn separate(bodies: &mut [Body], buffer: f64) -> bool {
    let mut moved = false;
    let n = bodies.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let min_dist = bodies[i].radius + bodies[j].radius + buffer;
            let mut dx = bodies[j].x - bodies[i].x;
            let mut dy = bodies[j].y - bodies[i].y;
            let mut dist2 = dx * dx + dy * dy;
            if dist2 >= min_dist * min_dist {
                continue;
            }
            if dist2 == 0.0 {
                (dx, dy) = nudge(i, j);
                dist2 = dx * dx + dy * dy;
            }
            let dist = dist2.sqrt();
            let half = (min_dist - dist) / dist * 0.5 + 1e-9;
            bodies[i].x -= dx * half;
            bodies[i].y -= dy * half;
            bodies[j].x += dx * half;
            bodies[j].y += dy * half;
            moved = true;
        }
    }
    moved
}

/// Deterministic tiny offset for coincident bodies, in a direction that
/// differs per pair.
fn nudge(a: usize, b: usize) -> (f64, f64) {
    let angle = (a * 7 + b * 13) as f64;
    (angle.cos() * 1e-6, angle.sin() * 1e-6)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forces() -> Forces {
        Forces {
            center: (200.0, 200.0),
            center_strength: 0.02,
            anchor_strength: 0.12,
            collision_buffer: 2.0,
            collision_strength: 1.0,
        }
    }

    fn assert_separated(bodies: &[Body]) {
        for (i, a) in bodies.iter().enumerate() {
            for (j, b) in bodies.iter().enumerate().skip(i + 1) {
                let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
                assert!(d + 1e-6 >= a.radius + b.radius, "overlap {i}/{j}: {d}");
            }
        }
    }

    #[test]
    fn coincident_bodies_are_separated() {
        let mut bodies = vec![
            Body::new(200.0, 200.0, 20.0, (200.0, 200.0)),
            Body::new(200.0, 200.0, 20.0, (200.0, 200.0)),
            Body::new(200.0, 200.0, 10.0, (200.0, 200.0)),
        ];
        ForceSimulation::default().relax(&mut bodies, &forces(), 300);
        assert_separated(&bodies);
    }

    #[test]
    fn zero_iterations_still_settles_overlaps() {
        let mut bodies: Vec<Body> = (0..10)
            .map(|i| {
                let angle = i as f64;
                let (x, y) = (200.0 + angle.cos(), 200.0 + angle.sin());
                Body::new(x, y, 62.0, (200.0, 200.0))
            })
            .collect();
        ForceSimulation::default().relax(&mut bodies, &forces(), 0);
        assert_separated(&bodies);
    }

    #[test]
    fn lone_body_drifts_between_anchor_and_center() {
        let mut bodies = vec![Body::new(0.0, 200.0, 5.0, (100.0, 200.0))];
        ForceSimulation::default().relax(&mut bodies, &forces(), 300);
        assert!(bodies[0].x > 0.0 && bodies[0].x < 200.0);
    }

    #[test]
    fn zero_iterations_leaves_lone_body_untouched() {
        let mut bodies = vec![Body::new(1.0, 2.0, 5.0, (50.0, 50.0))];
        ForceSimulation::default().relax(&mut bodies, &forces(), 0);
        assert_eq!(bodies[0].x, 1.0);
        assert_eq!(bodies[0].y, 2.0);
    }
}
