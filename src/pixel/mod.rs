pub mod buffer;
pub mod convert;
pub mod error;
pub mod format;
pub mod surface;

pub use buffer::{BaseAddressGuard, BufferAttributes, PixelBuffer, MAX_DIMENSION};
pub use convert::{to_pixel_buffer, ConversionOptions, ToPixelBuffer};
pub use error::ConversionError;
pub use format::{AlphaInfo, BitmapInfo, ByteOrder, PixelFormat};
pub use surface::{AffineTransform, ColorSpace, DrawingSurface, Rect};
