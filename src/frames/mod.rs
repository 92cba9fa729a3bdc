pub mod matrix;
pub mod parser;

pub use matrix::PressureMatrix;
pub use parser::{load_session_text, Frame, SessionReader};
