// ==============================================================================
// planner.rs — WHERE TO DRIVE: PREDICTION + COARSE PATH CORNERS
// ------------------------------------------------------------------------------
// - predict_target: straight-line extrapolation of the pursued body
// - PursuitPlanner: rate-limited path requests, generation-stamped so a reply
//   that arrives after a newer request (or after the agent is gone) is dropped
// - steering_target: first path corner outside the reach radius, otherwise the
//   predicted point itself. Never fails.
//
// Path search itself is an external collaborator behind NavPlanner; the world
// owns the queue and serves it with a per-tick budget.
// ==============================================================================

use rapier3d::prelude::*;
use tracing::trace;

use crate::world::VehicleId;

#[inline]
pub fn predict_target(position: &Point<Real>, velocity: &Vector<Real>, horizon: Real) -> Point<Real> {
    position + velocity * horizon
}

/// Navigable-surface path search. Returns corner points from start to goal,
/// or `None` when no path exists.
pub trait NavPlanner: Send {
    fn find_path(&self, start: &Point<Real>, goal: &Point<Real>) -> Option<Vec<Point<Real>>>;
}

/// Runs `nav` and keeps only paths usable for steering (two or more corners).
pub fn plan_path(nav: Option<&dyn NavPlanner>, start: &Point<Real>, goal: &Point<Real>) -> Option<Vec<Point<Real>>> {
    nav?.find_path(start, goal).filter(|corners| corners.len() >= 2)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathRequest {
    pub vehicle: VehicleId,
    pub generation: u64,
    pub start: Point<Real>,
    pub goal: Point<Real>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathReply {
    pub vehicle: VehicleId,
    pub generation: u64,
    pub corners: Option<Vec<Point<Real>>>,
}

impl PathRequest {
    pub fn serve(&self, nav: Option<&dyn NavPlanner>) -> PathReply {
        PathReply {
            vehicle: self.vehicle,
            generation: self.generation,
            corners: plan_path(nav, &self.start, &self.goal),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PursuitPlanner {
    replan_interval: Real,
    corner_reach_radius: Real,
    replan_timer: Real,     // counts down to the next request
    generation: u64,
    pending: Option<u64>,
    corners: Vec<Point<Real>>,
}

impl PursuitPlanner {
    pub fn new(replan_interval: Real, corner_reach_radius: Real) -> Self {
        Self {
            replan_interval,
            corner_reach_radius,
            replan_timer: 0.0,
            generation: 0,
            pending: None,
            corners: Vec::new(),
        }
    }

    /// Advances the replan clock. Returns a new request when one is due; it
    /// supersedes any request still in flight.
    pub fn tick(&mut self, vehicle: VehicleId, start: Point<Real>, goal: Point<Real>, dt: Real) -> Option<PathRequest> {
        self.replan_timer -= dt;
        if self.replan_timer > 0.0 {
            return None;
        }
        self.replan_timer = self.replan_interval;
        self.generation += 1;
        self.pending = Some(self.generation);
        Some(PathRequest { vehicle, generation: self.generation, start, goal })
    }

    /// Installs a reply if it answers the latest request. Stale replies are
    /// ignored and the previous path is kept.
    pub fn accept(&mut self, reply: PathReply) -> bool {
        if self.pending != Some(reply.generation) {
            trace!(vehicle = %reply.vehicle, generation = reply.generation, "stale path reply");
            return false;
        }
        self.pending = None;
        self.corners = reply.corners.unwrap_or_default();
        true
    }

    pub fn corners(&self) -> &[Point<Real>] {
        &self.corners
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn steering_target(&self, position: &Point<Real>, predicted: &Point<Real>) -> Point<Real> {
        if self.corners.len() < 2 {
            return *predicted;
        }
        let reach = self.corner_reach_radius;
        // corner 0 is where the path started
        self.corners
            .iter()
            .skip(1)
            .find(|c| horizontal_distance(c, position) > reach)
            .copied()
            .unwrap_or(*predicted)
    }
}

#[inline]
fn horizontal_distance(a: &Point<Real>, b: &Point<Real>) -> Real {
    let d = a - b;
    (d.x * d.x + d.z * d.z).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Detour;

    impl NavPlanner for Detour {
        fn find_path(&self, start: &Point<Real>, goal: &Point<Real>) -> Option<Vec<Point<Real>>> {
            Some(vec![*start, point![start.x + 10.0, 0.0, start.z], *goal])
        }
    }

    struct NoPath;

    impl NavPlanner for NoPath {
        fn find_path(&self, _: &Point<Real>, _: &Point<Real>) -> Option<Vec<Point<Real>>> {
            None
        }
    }

    #[test]
    fn prediction_extrapolates_velocity() {
        let p = predict_target(&point![1.0, 0.0, 2.0], &vector![4.0, 0.0, -2.0], 0.5);
        assert_relative_eq!(p, point![3.0, 0.0, 1.0]);
    }

    #[test]
    fn requests_are_rate_limited() {
        let mut planner = PursuitPlanner::new(0.5, 2.0);
        let id = VehicleId(3);
        let o = Point::origin();
        assert!(planner.tick(id, o, o, 0.25).is_some());
        assert!(planner.tick(id, o, o, 0.25).is_none());
        let second = planner.tick(id, o, o, 0.25).expect("interval elapsed");
        assert_eq!(second.generation, 2);
    }

    #[test]
    fn stale_reply_is_ignored() {
        let mut planner = PursuitPlanner::new(0.1, 2.0);
        let id = VehicleId(1);
        let o = Point::origin();
        let first = planner.tick(id, o, point![0.0, 0.0, 30.0], 0.1).unwrap();
        let second = planner.tick(id, o, point![0.0, 0.0, 30.0], 0.1).unwrap();

        assert!(!planner.accept(first.serve(Some(&Detour))));
        assert!(planner.corners().is_empty());
        assert!(planner.accept(second.serve(Some(&Detour))));
        assert_eq!(planner.corners().len(), 3);
    }

    #[test]
    fn steering_target_skips_reached_corners() {
        let mut planner = PursuitPlanner::new(0.1, 2.0);
        let start = point![0.0, 0.0, 0.0];
        let goal = point![0.0, 0.0, 30.0];
        let req = planner.tick(VehicleId(1), start, goal, 0.1).unwrap();
        planner.accept(req.serve(Some(&Detour)));

        // detour corner first
        assert_relative_eq!(planner.steering_target(&start, &goal), point![10.0, 0.0, 0.0]);
        // standing on the detour corner -> next one
        assert_relative_eq!(planner.steering_target(&point![10.0, 0.0, 0.5], &goal), goal);
    }

    #[test]
    fn no_path_falls_back_to_prediction() {
        let mut planner = PursuitPlanner::new(0.1, 2.0);
        let goal = point![5.0, 0.0, 5.0];
        let req = planner.tick(VehicleId(1), Point::origin(), goal, 0.1).unwrap();
        assert!(planner.accept(req.serve(Some(&NoPath))));
        assert_relative_eq!(planner.steering_target(&Point::origin(), &goal), goal);

        let req = planner.tick(VehicleId(1), Point::origin(), goal, 0.1).unwrap();
        assert!(planner.accept(req.serve(None)));
        assert_relative_eq!(planner.steering_target(&Point::origin(), &goal), goal);
    }
}
