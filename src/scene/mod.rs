pub mod matrix;
pub mod cpu;
pub mod loader;

pub use matrix::HalaMatrix;
