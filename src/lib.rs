pub mod avatar;
pub mod calibration;
pub mod config;
pub mod device;
pub mod events;
pub mod logger;
pub mod pose;
pub mod system;
pub mod tracker;
