pub mod color;
pub mod length;

pub use color::Color;
pub use length::{format_number, Length, LengthUnit, PX_PER_CM};
