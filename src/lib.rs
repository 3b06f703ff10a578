pub mod dither;
pub mod graphics;
pub mod math;
pub mod quantize;
pub mod utils;

pub mod prelude;
