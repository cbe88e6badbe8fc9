use bitflags::bitflags;
use tracing::debug;

use crate::{
    disk::{
        codec::{self, read_u32, write_u32, ChecksumKind},
        BlockDevice, Sector, SECTOR_SIZE,
    },
    fs::{
        config::*,
        error::{AdfError, Result},
    },
    utils::AmigaDate,
};

bitflags! {
    /// 启动块第 3 字节（`DOS\x`）中的文件系统标志位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DosFlags: u8 {
        const FFS = 0x01;
        const INTL = 0x02;
        const DIRCACHE = 0x04;
    }
}

impl DosFlags {
    pub fn bytes_per_data_block(self) -> usize {
        if self.contains(DosFlags::FFS) {
            FFS_BYTES_PER_BLOCK
        } else {
            OFS_BYTES_PER_BLOCK
        }
    }

    /// 国际模式下哈希和比较名称时也要转换 Latin-1 字母。
    pub fn international(self) -> bool {
        self.intersects(DosFlags::INTL | DosFlags::DIRCACHE)
    }
}

/// 读取启动块中的 DOS 类型，只接受 OFS/FFS（可带 INTL）。
pub fn read_dos_flags(disk: &impl BlockDevice) -> Result<DosFlags> {
    let boot = disk.read_sector(0)?;
    if &boot[0..3] != b"DOS" {
        return Err(AdfError::InvalidFormat(format!(
            "boot block tag {:02X?} is not DOS",
            &boot[0..4]
        )));
    }
    let flags = DosFlags::from_bits(boot[3])
        .ok_or_else(|| AdfError::InvalidFormat(format!("unknown DOS type DOS\\{}", boot[3])))?;
    if flags.contains(DosFlags::DIRCACHE) {
        return Err(AdfError::InvalidFormat(
            "directory cache volumes are not supported".to_string(),
        ));
    }
    Ok(flags)
}

/// 根块的摘要信息：位置、文件系统类型、位图所在扇区。
#[derive(Debug, Clone)]
pub struct RootBlock {
    pub sector: u32,
    pub dos_flags: DosFlags,
    pub bitmap_pages: Vec<u32>,
}

impl RootBlock {
    pub fn load(disk: &impl BlockDevice, sector: u32) -> Result<Self> {
        let dos_flags = read_dos_flags(disk)?;
        let root = disk.read_sector(sector)?;

        if read_u32(&root, OFF_TYPE) != T_HEADER || read_u32(&root, OFF_SEC_TYPE) != ST_ROOT {
            return Err(AdfError::InvalidFormat(format!(
                "sector {} is not a root block",
                sector
            )));
        }
        if !codec::verify_checksum(&root, ChecksumKind::Block) {
            return Err(AdfError::InvalidFormat(format!(
                "root block {} has a bad checksum",
                sector
            )));
        }
        if read_u32(&root, OFF_HT_SIZE) as usize != HASH_TABLE_SIZE {
            return Err(AdfError::InvalidFormat(format!(
                "unexpected hash table size {}",
                read_u32(&root, OFF_HT_SIZE)
            )));
        }
        if read_u32(&root, OFF_BM_FLAG) != BM_VALID {
            return Err(AdfError::InvalidFormat(
                "bitmap is flagged invalid".to_string(),
            ));
        }
        if read_u32(&root, OFF_BM_EXT) != 0 {
            return Err(AdfError::InvalidFormat(
                "bitmap extension blocks are not supported".to_string(),
            ));
        }

        let bitmap_pages: Vec<u32> = (0..BM_PAGES_IN_ROOT)
            .map(|i| read_u32(&root, OFF_BM_PAGES + i * 4))
            .take_while(|&page| page != 0)
            .collect();
        if bitmap_pages.is_empty() {
            return Err(AdfError::InvalidFormat(
                "root block has no bitmap pages".to_string(),
            ));
        }

        debug!(sector, ?dos_flags, pages = ?bitmap_pages, "root block loaded");
        Ok(Self {
            sector,
            dos_flags,
            bitmap_pages,
        })
    }

    /// 构造一个空根块（格式化时使用）。
    pub fn fresh_sector(bitmap_pages: &[u32], name: &[u8], date: AmigaDate) -> Sector {
        let mut root = [0u8; SECTOR_SIZE];
        write_u32(&mut root, OFF_TYPE, T_HEADER);
        write_u32(&mut root, OFF_HT_SIZE, HASH_TABLE_SIZE as u32);
        write_u32(&mut root, OFF_BM_FLAG, BM_VALID);
        for (i, page) in bitmap_pages.iter().take(BM_PAGES_IN_ROOT).enumerate() {
            write_u32(&mut root, OFF_BM_PAGES + i * 4, *page);
        }
        date.write(&mut root, OFF_DATE);
        date.write(&mut root, OFF_DISK_DATE);
        date.write(&mut root, OFF_CREATION_DATE);
        codec::write_bcpl(&mut root, OFF_NAME, name);
        write_u32(&mut root, OFF_SEC_TYPE, ST_ROOT);
        codec::recompute_checksum(&mut root, ChecksumKind::Block);
        root
    }

    pub fn name(&self, disk: &impl BlockDevice) -> Result<String> {
        let root = disk.read_sector(self.sector)?;
        Ok(codec::decode_name(&codec::read_bcpl(&root, OFF_NAME)))
    }

    /// 改卷名，同时更新卷的最后修改时间（第 472 字节）。
    pub fn set_name(&self, disk: &mut impl BlockDevice, name: &str, date: AmigaDate) -> Result<()> {
        let encoded = codec::encode_name(name)?;
        let mut root = disk.read_sector(self.sector)?;
        codec::write_bcpl(&mut root, OFF_NAME, &encoded);
        date.write(&mut root, OFF_DISK_DATE);
        codec::recompute_checksum(&mut root, ChecksumKind::Block);
        disk.write_sector(self.sector, &root, ChecksumKind::Block)
    }
}
