// locus_sim/src/simulation/sensors/localizer.rs

use nalgebra::{Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError, Uniform};

use locus_core::messages::{Correspondence, LocalizationObservation, SensorCorrespondences};
use locus_core::models::camera::{CameraRig, CameraSensor, PinholeCamera};
use locus_core::types::{Pose, Timestamp};

use crate::simulation::config::structs::{Camera, Localizer};

/// Body-to-camera rotation of a forward-looking camera:
/// camera z along body x, camera x along body -y, camera y along body -z.
fn forward_looking_rotation() -> UnitQuaternion<f64> {
    let r_b_c = Rotation3::from_matrix_unchecked(Matrix3::new(
        0.0, 0.0, 1.0, //
        -1.0, 0.0, 0.0, //
        0.0, -1.0, 0.0,
    ));
    UnitQuaternion::from_rotation_matrix(&r_b_c)
}

/// The camera described by the scenario, mounted on the body.
pub fn camera_sensor(camera: &Camera) -> CameraSensor {
    let t_b_c = Pose::from_parts(
        Translation3::from(Vector3::from(camera.mount_offset_m)),
        forward_looking_rotation(),
    );
    CameraSensor::new(
        Box::new(PinholeCamera::new(
            camera.fx,
            camera.fy,
            camera.cx,
            camera.cy,
            camera.width,
            camera.height,
        )),
        t_b_c.inverse(),
    )
}

/// A rig with the scenario camera at every index up to and including `sensor`.
pub fn camera_rig(camera: &Camera, sensor: usize) -> CameraRig {
    CameraRig::new((0..=sensor).map(|_| camera_sensor(camera)).collect())
}

/// Produces noisy, occasionally wrong localizations of the true body pose,
/// together with the 2D-3D matches a place-recognition pipeline would return.
#[derive(Debug)]
pub struct SyntheticLocalizer {
    config: Localizer,
    camera: CameraSensor,
    position_noise: Normal<f64>,
    yaw_noise: Normal<f64>,
    tilt_noise: Normal<f64>,
    keypoint_noise: Normal<f64>,
    depth: Uniform<f64>,
    spread: Uniform<f64>,
    outlier_offset: Uniform<f64>,
}

impl SyntheticLocalizer {
    pub fn new(config: Localizer, camera: &Camera) -> Result<Self, NormalError> {
        let [near, far] = config.landmark_depth_m;
        Ok(Self {
            position_noise: Normal::new(0.0, config.position_noise_m)?,
            yaw_noise: Normal::new(0.0, config.yaw_noise_deg.to_radians())?,
            tilt_noise: Normal::new(0.0, config.tilt_noise_deg.to_radians())?,
            keypoint_noise: Normal::new(0.0, config.keypoint_noise_px)?,
            depth: Uniform::new_inclusive(near.min(far), near.max(far)),
            spread: Uniform::new_inclusive(-config.landmark_spread_m, config.landmark_spread_m),
            outlier_offset: Uniform::new_inclusive(-config.outlier_offset_m, config.outlier_offset_m),
            camera: camera_sensor(camera),
            config,
        })
    }

    pub fn config(&self) -> &Localizer {
        &self.config
    }

    /// A localization of the body at `true_t_g_b`, stamped `timestamp_ns`.
    pub fn localize<R: Rng + ?Sized>(
        &self,
        timestamp_ns: Timestamp,
        true_t_g_b: &Pose,
        rng: &mut R,
    ) -> LocalizationObservation {
        let reported = if rng.gen_bool(self.config.outlier_probability.clamp(0.0, 1.0)) {
            self.outlier(true_t_g_b, rng)
        } else {
            self.perturb(true_t_g_b, rng)
        };
        let matches = self.matches(true_t_g_b, rng);
        LocalizationObservation::from_pose(timestamp_ns, reported)
            .with_correspondences(vec![SensorCorrespondences::new(self.config.sensor, matches)])
    }

    fn perturb<R: Rng + ?Sized>(&self, t_g_b: &Pose, rng: &mut R) -> Pose {
        let translation = Vector3::from_fn(|_, _| self.position_noise.sample(rng));
        let rotation = Vector3::new(
            self.tilt_noise.sample(rng),
            self.tilt_noise.sample(rng),
            self.yaw_noise.sample(rng),
        );
        Pose::new(translation, Vector3::zeros()) * t_g_b * Pose::rotation(rotation)
    }

    fn outlier<R: Rng + ?Sized>(&self, t_g_b: &Pose, rng: &mut R) -> Pose {
        let offset = Vector3::new(self.outlier_offset.sample(rng), self.outlier_offset.sample(rng), 0.0);
        let yaw = rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);
        Pose::new(offset, Vector3::zeros()) * t_g_b * Pose::rotation(Vector3::z() * yaw)
    }

    /// Landmarks scattered in front of the camera, observed from the true pose.
    fn matches<R: Rng + ?Sized>(&self, true_t_g_b: &Pose, rng: &mut R) -> Vec<Correspondence> {
        let t_g_c = self.camera.t_g_c(true_t_g_b);
        (0..self.config.landmarks_per_frame)
            .filter_map(|_| {
                let p_c = Point3::new(self.spread.sample(rng), self.spread.sample(rng), self.depth.sample(rng));
                let landmark_g = t_g_c * p_c;
                let keypoint = self.camera.project_global(&t_g_c, &landmark_g).keypoint()?;
                let noise = Point2::new(self.keypoint_noise.sample(rng), self.keypoint_noise.sample(rng));
                Some(Correspondence {
                    keypoint: keypoint + noise.coords,
                    landmark_g,
                })
            })
            .collect()
    }
}
