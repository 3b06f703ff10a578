pub use crate::dither::*;
pub use crate::graphics::bitmap::indexed::IndexedBitmap;
pub use crate::graphics::bitmap::rgb::{RgbaBitmap, RgbaPixelFormat};
pub use crate::graphics::*;
pub use crate::math::rect::Rect;
pub use crate::math::{nearly_equal, NearlyEqual};
pub use crate::quantize::*;
