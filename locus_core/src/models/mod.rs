// locus_core/src/models/mod.rs

pub mod camera;

pub use camera::{CameraModel, CameraRig, CameraSensor, PinholeCamera, Projection};
