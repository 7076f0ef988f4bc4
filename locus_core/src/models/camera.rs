// locus_core/src/models/camera.rs

use dyn_clone::DynClone;
use nalgebra::{Point2, Point3};
use std::fmt::Debug;

use crate::error::ConfigError;
use crate::types::{Pose, SensorIndex};

/// Points closer than this to the image plane count as behind the camera.
const MIN_DEPTH_M: f64 = 1e-6;

/// The outcome of projecting a camera-frame point into the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Valid(Point2<f64>),
    BehindCamera,
    /// In front of the camera but outside the image (or numerically unusable).
    Invalid,
}

impl Projection {
    pub fn keypoint(&self) -> Option<Point2<f64>> {
        match self {
            Projection::Valid(p) => Some(*p),
            _ => None,
        }
    }
}

/// The contract for any camera projection model used to score localization matches.
pub trait CameraModel: DynClone + Debug + Send + Sync {
    /// Projects a point given in the CAMERA frame onto the image plane.
    fn project(&self, p_c: &Point3<f64>) -> Projection;
}

// Make the trait object cloneable.
dyn_clone::clone_trait_object!(CameraModel);

/// An undistorted pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeCamera {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
}

impl PinholeCamera {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    fn in_image(&self, p: &Point2<f64>) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x < self.width as f64 && p.y < self.height as f64
    }
}

impl CameraModel for PinholeCamera {
    fn project(&self, p_c: &Point3<f64>) -> Projection {
        if p_c.z <= MIN_DEPTH_M {
            return Projection::BehindCamera;
        }
        let keypoint = Point2::new(
            self.fx * p_c.x / p_c.z + self.cx,
            self.fy * p_c.y / p_c.z + self.cy,
        );
        if keypoint.x.is_finite() && keypoint.y.is_finite() && self.in_image(&keypoint) {
            Projection::Valid(keypoint)
        } else {
            Projection::Invalid
        }
    }
}

/// One camera of the rig: its projection model and where it sits on the body.
#[derive(Debug, Clone)]
pub struct CameraSensor {
    pub model: Box<dyn CameraModel>,
    /// Body to camera.
    pub t_c_b: Pose,
}

impl CameraSensor {
    pub fn new(model: Box<dyn CameraModel>, t_c_b: Pose) -> Self {
        Self { model, t_c_b }
    }

    /// Camera pose in the global frame given the body pose in the global frame.
    pub fn t_g_c(&self, t_g_b: &Pose) -> Pose {
        t_g_b * self.t_c_b.inverse()
    }

    /// Projects a global landmark as seen from a camera at `t_g_c`.
    pub fn project_global(&self, t_g_c: &Pose, landmark_g: &Point3<f64>) -> Projection {
        self.model.project(&t_g_c.inverse_transform_point(landmark_g))
    }
}

/// The localization-side camera calibration, indexed by localization sensor index.
#[derive(Debug, Clone, Default)]
pub struct CameraRig {
    cameras: Vec<CameraSensor>,
}

impl CameraRig {
    pub fn new(cameras: Vec<CameraSensor>) -> Self {
        Self { cameras }
    }

    pub fn get(&self, index: SensorIndex) -> Option<&CameraSensor> {
        self.cameras.get(index)
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Every listed sensor must have a camera.
    pub fn ensure_covers<I>(&self, sensors: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = SensorIndex>,
    {
        match sensors.into_iter().find(|&s| s >= self.cameras.len()) {
            Some(missing) => Err(ConfigError::MissingCamera(missing)),
            None => Ok(()),
        }
    }
}
