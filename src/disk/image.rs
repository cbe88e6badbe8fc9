use std::{fs, io::ErrorKind, path::Path};

use tracing::debug;

use crate::{
    disk::{
        block_device::BlockDevice,
        codec::{verify_checksum, ChecksumKind},
        types::{Geometry, Sector, SECTOR_SIZE},
    },
    fs::error::{AdfError, Result},
};

/// 整张软盘镜像，扁平化存放在内存中。
#[derive(Debug, Clone)]
pub struct DiskImage {
    bytes: Vec<u8>,
    geometry: Geometry,
    dirty: Vec<Option<ChecksumKind>>, // 每个扇区是否被修改，以及它的校验和约定
}

impl DiskImage {
    pub fn blank(geometry: Geometry) -> Self {
        Self {
            bytes: vec![0u8; geometry.byte_len()],
            geometry,
            dirty: vec![None; geometry.total_sectors() as usize],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let geometry = Geometry::from_image_len(bytes.len()).ok_or_else(|| {
            AdfError::InvalidFormat(format!("unexpected image size of {} bytes", bytes.len()))
        })?;
        Ok(Self {
            dirty: vec![None; geometry.total_sectors() as usize],
            bytes,
            geometry,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AdfError::TemplateNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), len = bytes.len(), "loaded disk image");
        Self::from_bytes(bytes)
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// 加载后写过、但校验和已经对不上的扇区。
    pub fn stale_sectors(&self) -> Vec<u32> {
        self.dirty
            .iter()
            .enumerate()
            .filter_map(|(index, kind)| {
                let kind = (*kind)?;
                let start = index * SECTOR_SIZE;
                let mut sector = [0u8; SECTOR_SIZE];
                sector.copy_from_slice(&self.bytes[start..start + SECTOR_SIZE]);
                (!verify_checksum(&sector, kind)).then_some(index as u32)
            })
            .collect()
    }

    fn check_range(&self, index: u32) -> Result<usize> {
        let total = self.geometry.total_sectors();
        if index >= total {
            return Err(AdfError::OutOfRange { index, total });
        }
        Ok(index as usize * SECTOR_SIZE)
    }
}

impl BlockDevice for DiskImage {
    fn sector_count(&self) -> u32 {
        self.geometry.total_sectors()
    }

    fn read_sector(&self, index: u32) -> Result<Sector> {
        let start = self.check_range(index)?;
        let mut buf = [0u8; SECTOR_SIZE];
        buf.copy_from_slice(&self.bytes[start..start + SECTOR_SIZE]);
        Ok(buf)
    }

    fn write_sector(&mut self, index: u32, buf: &Sector, checksum: ChecksumKind) -> Result<()> {
        let start = self.check_range(index)?;
        self.bytes[start..start + SECTOR_SIZE].copy_from_slice(buf);
        self.dirty[index as usize] = Some(checksum);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::codec::{recompute_checksum, write_u32};

    #[test]
    fn out_of_range_sector_is_rejected() {
        let mut disk = DiskImage::blank(Geometry::DD);
        assert!(matches!(
            disk.read_sector(1760),
            Err(AdfError::OutOfRange { index: 1760, total: 1760 })
        ));
        let buf = [0u8; SECTOR_SIZE];
        assert!(disk.write_sector(5000, &buf, ChecksumKind::None).is_err());
        assert!(disk.read_sector(1759).is_ok());
    }

    #[test]
    fn writes_land_at_sector_offsets() {
        let mut disk = DiskImage::blank(Geometry::DD);
        let mut buf = [0u8; SECTOR_SIZE];
        buf[0] = 0x42;
        disk.write_sector(3, &buf, ChecksumKind::None).unwrap();
        assert_eq!(disk.as_bytes()[3 * SECTOR_SIZE], 0x42);
        assert_eq!(disk.as_bytes().len(), Geometry::DD.byte_len());
    }

    #[test]
    fn stale_checksums_are_reported() {
        let mut disk = DiskImage::blank(Geometry::DD);
        let mut buf = [0u8; SECTOR_SIZE];
        write_u32(&mut buf, 0, 2);
        disk.write_sector(10, &buf, ChecksumKind::Block).unwrap();
        assert_eq!(disk.stale_sectors(), vec![10]);

        recompute_checksum(&mut buf, ChecksumKind::Block);
        disk.write_sector(10, &buf, ChecksumKind::Block).unwrap();
        assert!(disk.stale_sectors().is_empty());
    }

    #[test]
    fn odd_sized_images_are_invalid() {
        assert!(matches!(
            DiskImage::from_bytes(vec![0u8; 1234]),
            Err(AdfError::InvalidFormat(_))
        ));
    }

    #[test]
    fn missing_file_is_template_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.adf");
        assert!(matches!(
            DiskImage::load(&path),
            Err(AdfError::TemplateNotFound(p)) if p == path
        ));
    }
}
