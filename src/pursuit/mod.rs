// src/pursuit/mod.rs
//
// AI pursuit: target prediction and path corners, flock separation, a
// three-ray obstacle scan and the chase/reverse/stuck/avoid decision machine.

pub mod agent;
pub mod decision;
pub mod planner;
pub mod scanner;
pub mod separation;

pub use agent::{AgentOutput, PursuitAgent};
pub use decision::{AvoidSide, DecisionState, DriveCommand, FsmState, Sensors, transition};
pub use planner::{NavPlanner, PathReply, PathRequest, PursuitPlanner, plan_path, predict_target};
pub use scanner::{ScanResult, scan};
pub use separation::compute_separation;
