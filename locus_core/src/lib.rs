// locus_core/src/lib.rs

pub mod adapter;
pub mod baseframe;
pub mod clock;
pub mod config;
pub mod error;
pub mod estimation;
pub mod handler;
pub mod messages;
pub mod models;
pub mod pose_buffer;
pub mod prelude;
pub mod reprojection;
pub mod state;
pub mod transforms;
pub mod types;
