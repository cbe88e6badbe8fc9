use crate::{
    disk::{codec::ChecksumKind, types::Sector},
    fs::error::Result,
};

pub trait BlockDevice {
    fn sector_count(&self) -> u32;
    fn read_sector(&self, index: u32) -> Result<Sector>;
    /// 写入一个扇区，并登记它遵循的校验和约定，供最终序列化前检查。
    fn write_sector(&mut self, index: u32, buf: &Sector, checksum: ChecksumKind) -> Result<()>;
}
