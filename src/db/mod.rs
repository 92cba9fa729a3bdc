mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{Alert, AlertStatus, DataFile, FrameView, PressureFrame};

#[cfg(test)]
mod tests;
