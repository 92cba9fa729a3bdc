pub mod alert;
pub mod data_file;
pub mod pressure_frame;

pub use alert::{Alert, AlertStatus};
pub use data_file::DataFile;
pub use pressure_frame::{FrameView, PressureFrame};
