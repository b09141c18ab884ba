// ==============================================================================
// surface.rs — RAY QUERIES AGAINST THE PHYSICAL WORLD
// ------------------------------------------------------------------------------
// Wheels (suspension rays) and the obstacle scanner only ever ask one question:
// "does a ray from here, this way, hit something within this distance?"
//
// - RapierSurface: answers through the rapier QueryPipeline, excluding the
//   querying chassis (and optionally the pursued body, which is never an
//   obstacle).
// - FlatGround: analytic horizontal plane, used for tests and headless tools.
// ==============================================================================

use rapier3d::prelude::*;

/// Result of a ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: Real,
    pub point: Point<Real>,
}

pub trait SurfaceQuery {
    /// `dir` must be unit length. Returns the closest hit within `max_distance`.
    fn cast_ray(&self, origin: &Point<Real>, dir: &Vector<Real>, max_distance: Real) -> Option<RayHit>;
}

/// Infinite horizontal plane at `height`, solid from above.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatGround {
    pub height: Real,
}

impl FlatGround {
    pub fn at(height: Real) -> Self {
        Self { height }
    }
}

impl SurfaceQuery for FlatGround {
    fn cast_ray(&self, origin: &Point<Real>, dir: &Vector<Real>, max_distance: Real) -> Option<RayHit> {
        let above = origin.y - self.height;
        if above < 0.0 || dir.y >= -1e-6 {
            return None;
        }
        let distance = above / -dir.y;
        (distance <= max_distance).then(|| RayHit { distance, point: origin + dir * distance })
    }
}

/// No surfaces at all: every ray misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySpace;

impl SurfaceQuery for EmptySpace {
    fn cast_ray(&self, _: &Point<Real>, _: &Vector<Real>, _: Real) -> Option<RayHit> {
        None
    }
}

/// Rapier-backed query for one vehicle's point of view.
pub struct RapierSurface<'a> {
    pipeline: &'a QueryPipeline,
    bodies: &'a RigidBodySet,
    colliders: &'a ColliderSet,
    own_body: RigidBodyHandle,
    ignored_body: Option<RigidBodyHandle>,
}

impl<'a> RapierSurface<'a> {
    pub fn new(
        pipeline: &'a QueryPipeline,
        bodies: &'a RigidBodySet,
        colliders: &'a ColliderSet,
        own_body: RigidBodyHandle,
    ) -> Self {
        Self { pipeline, bodies, colliders, own_body, ignored_body: None }
    }

    /// Also ignore `body` (e.g. the pursuit target).
    pub fn ignoring(mut self, body: Option<RigidBodyHandle>) -> Self {
        self.ignored_body = body;
        self
    }
}

impl SurfaceQuery for RapierSurface<'_> {
    fn cast_ray(&self, origin: &Point<Real>, dir: &Vector<Real>, max_distance: Real) -> Option<RayHit> {
        let ray = Ray::new(*origin, *dir);
        let ignored = self.ignored_body;
        let not_ignored = move |_: ColliderHandle, c: &Collider| ignored.is_none() || c.parent() != ignored;
        let filter = QueryFilter::default()
            .exclude_rigid_body(self.own_body)
            .predicate(&not_ignored);

        let (_collider, toi) = self
            .pipeline
            .cast_ray(self.bodies, self.colliders, &ray, max_distance, true, filter)?;

        Some(RayHit { distance: toi, point: ray.point_at(toi) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn flat_ground_hits_straight_down() {
        let g = FlatGround::at(0.0);
        let hit = g.cast_ray(&point![1.0, 2.0, 3.0], &vector![0.0, -1.0, 0.0], 5.0).unwrap();
        assert_relative_eq!(hit.distance, 2.0);
        assert_relative_eq!(hit.point.y, 0.0);
    }

    #[test]
    fn flat_ground_respects_range_and_direction() {
        let g = FlatGround::at(0.0);
        assert!(g.cast_ray(&point![0.0, 2.0, 0.0], &vector![0.0, -1.0, 0.0], 1.0).is_none());
        assert!(g.cast_ray(&point![0.0, 2.0, 0.0], &vector![0.0, 0.0, 1.0], 10.0).is_none());
        assert!(g.cast_ray(&point![0.0, -1.0, 0.0], &vector![0.0, -1.0, 0.0], 10.0).is_none());
    }

    #[test]
    fn slanted_ray_travels_further() {
        let g = FlatGround::at(0.0);
        let dir = vector![1.0, -1.0, 0.0].normalize();
        let hit = g.cast_ray(&point![0.0, 1.0, 0.0], &dir, 5.0).unwrap();
        assert_relative_eq!(hit.distance, 2.0_f32.sqrt(), epsilon = 1e-5);
    }
}
