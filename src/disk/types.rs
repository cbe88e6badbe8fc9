/// 每个扇区（Sector）的大小：512 字节
/// Amiga 软盘以扇区为最小读写单位。
pub const SECTOR_SIZE: usize = 512;

/// 启动块占用的扇区数（0 和 1），它们不在位图的管理范围内。
pub const RESERVED_SECTORS: u32 = 2;

/// 定义一个扇区类型（每扇区 512 字节）
/// 所有镜像读写都以 Sector 为单位进行。
pub type Sector = [u8; SECTOR_SIZE];

/// 软盘镜像的物理布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub tracks: u32,
    pub heads: u32,
    pub sectors_per_track: u32,
}

impl Geometry {
    /// 标准 880 KB 双密度软盘
    pub const DD: Geometry = Geometry {
        tracks: 80,
        heads: 2,
        sectors_per_track: 11,
    };

    /// 1.76 MB 高密度软盘
    pub const HD: Geometry = Geometry {
        tracks: 80,
        heads: 2,
        sectors_per_track: 22,
    };

    /// 根据镜像长度推算布局（假定 80 磁道、2 磁头）
    pub fn from_image_len(len: usize) -> Option<Geometry> {
        let cylinder_bytes = (80 * 2 * SECTOR_SIZE) as usize;
        if len == 0 || len % cylinder_bytes != 0 {
            return None;
        }
        let sectors_per_track = (len / cylinder_bytes) as u32;
        if sectors_per_track > 44 {
            return None;
        }
        Some(Geometry {
            tracks: 80,
            heads: 2,
            sectors_per_track,
        })
    }

    pub fn total_sectors(&self) -> u32 {
        self.tracks * self.heads * self.sectors_per_track
    }

    pub fn byte_len(&self) -> usize {
        self.total_sectors() as usize * SECTOR_SIZE
    }

    /// 根块位于磁盘中央：880（DD）或 1760（HD）。
    pub fn root_sector(&self) -> u32 {
        self.total_sectors() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dd_geometry_is_880k() {
        assert_eq!(Geometry::DD.total_sectors(), 1760);
        assert_eq!(Geometry::DD.byte_len(), 901_120);
        assert_eq!(Geometry::DD.root_sector(), 880);
    }

    #[test]
    fn geometry_from_len() {
        assert_eq!(Geometry::from_image_len(901_120), Some(Geometry::DD));
        assert_eq!(Geometry::from_image_len(1_802_240), Some(Geometry::HD));
        assert_eq!(Geometry::from_image_len(1000), None);
        assert_eq!(Geometry::from_image_len(0), None);
    }
}
