mod batch;
mod entity;
mod image;
mod report;

pub use batch::*;
pub use entity::*;
pub use image::*;
pub use report::*;
