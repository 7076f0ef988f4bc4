// locus_sim/src/simulation/world/mod.rs

//! Ground truth for a run: where the body really is, and where the estimator's
//! drifting local frame sits in the global map.

use nalgebra::{Translation3, UnitQuaternion, Vector3};

use locus_core::types::Pose;

use crate::simulation::config::structs::{Drift, Trajectory};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundTruth {
    trajectory: Trajectory,
    drift: Drift,
}

impl GroundTruth {
    pub fn new(trajectory: Trajectory, drift: Drift) -> Self {
        Self { trajectory, drift }
    }

    /// Body pose in the global frame. The body faces along the circle's tangent.
    pub fn t_g_b(&self, t_s: f64) -> Pose {
        let Trajectory {
            radius_m,
            angular_speed_rad_s,
            height_m,
        } = self.trajectory;
        let phase = angular_speed_rad_s * t_s;
        let position = Vector3::new(radius_m * phase.cos(), radius_m * phase.sin(), height_m);
        let heading = phase + angular_speed_rad_s.signum() * std::f64::consts::FRAC_PI_2;
        Pose::from_parts(
            Translation3::from(position),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), heading),
        )
    }

    /// The estimator frame's pose in the global frame.
    pub fn t_g_m(&self, t_s: f64) -> Pose {
        let offset = Vector3::from(self.drift.initial_offset_m) + Vector3::from(self.drift.offset_rate_m_s) * t_s;
        let yaw = (self.drift.initial_yaw_deg + self.drift.yaw_rate_deg_s * t_s).to_radians();
        Pose::from_parts(
            Translation3::from(offset),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
        )
    }

    /// What the estimator reports: the body pose in its own local frame.
    pub fn t_m_i(&self, t_s: f64) -> Pose {
        self.t_g_m(t_s).inverse() * self.t_g_b(t_s)
    }
}
