pub mod block_device;
pub mod codec;
pub mod image;
pub mod types;

pub use block_device::BlockDevice;
pub use image::DiskImage;
pub use types::{Geometry, Sector, SECTOR_SIZE};
