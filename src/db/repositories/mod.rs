pub mod alerts;
pub mod data_files;
pub mod frames;
