pub mod bitmap;
pub mod color;
pub mod palette;

pub use bitmap::{Bitmap, BitmapError, PixelBuffer};
pub use color::*;
pub use palette::{NearestColorMetric, Palette, PaletteError, PaletteHandle};

/// Marker bound for the two pixel representations this crate works with: `u8` palette indices
/// ([`bitmap::indexed::IndexedBitmap`]) and packed `u32` 0xAARRGGBB true-colour pixels
/// ([`bitmap::rgb::RgbaBitmap`]).
pub trait Pixel: Copy + Clone + Default + PartialEq + Eq + 'static {}

impl Pixel for u8 {}
impl Pixel for u32 {}
