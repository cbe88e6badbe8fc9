use tracing::info;

use crate::{
    disk::{
        codec::{boot_checksum, encode_name, ChecksumKind},
        BlockDevice, DiskImage, Geometry, SECTOR_SIZE,
    },
    fs::{bitmap::BlockBitmap, error::Result, root_block::DosFlags, root_block::RootBlock},
    utils::AmigaDate,
};

/// Kickstart 1.3 的标准引导代码：找到 dos.library 并把初始化入口交给它。
const BOOT_CODE: [u8; 38] = [
    0x43, 0xFA, 0x00, 0x18, // lea     dosname(pc),a1
    0x4E, 0xAE, 0xFF, 0xA0, // jsr     FindResident(a6)
    0x4A, 0x80, //             tst.l   d0
    0x67, 0x0A, //             beq.s   fail
    0x20, 0x40, //             movea.l d0,a0
    0x20, 0x68, 0x00, 0x16, // movea.l 22(a0),a0
    0x70, 0x00, //             moveq   #0,d0
    0x4E, 0x75, //             rts
    0x70, 0xFF, // fail:       moveq   #-1,d0
    0x60, 0xFA, //             bra.s   -6
    b'd', b'o', b's', b'.', b'l', b'i', b'b', b'r', b'a', b'r', b'y', 0x00,
];

#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub geometry: Geometry,
    pub dos_flags: DosFlags,
    pub volume_name: String,
    pub bootable: bool,
    pub date: AmigaDate,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            geometry: Geometry::DD,
            dos_flags: DosFlags::empty(),
            volume_name: "Empty".to_string(),
            bootable: false,
            date: AmigaDate::now(),
        }
    }
}

fn boot_block(flags: DosFlags, root: u32, bootable: bool) -> [u8; 2 * SECTOR_SIZE] {
    let mut boot = [0u8; 2 * SECTOR_SIZE];
    boot[..3].copy_from_slice(b"DOS");
    boot[3] = flags.bits();
    if bootable {
        boot[8..12].copy_from_slice(&root.to_be_bytes());
        boot[12..12 + BOOT_CODE.len()].copy_from_slice(&BOOT_CODE);
        let checksum = boot_checksum(&boot);
        boot[4..8].copy_from_slice(&checksum.to_be_bytes());
    }
    boot
}

/// 格式化一张空白 DOS 软盘：启动块、根块和位图。
pub fn format(options: &FormatOptions) -> Result<DiskImage> {
    let name = encode_name(&options.volume_name)?;
    let geometry = options.geometry;
    let total = geometry.total_sectors();
    let root = geometry.root_sector();
    let mut disk = DiskImage::blank(geometry);

    let boot = boot_block(options.dos_flags, root, options.bootable);
    for (i, half) in boot.chunks_exact(SECTOR_SIZE).enumerate() {
        let mut sector = [0u8; SECTOR_SIZE];
        sector.copy_from_slice(half);
        disk.write_sector(i as u32, &sector, ChecksumKind::None)?;
    }

    let pages: Vec<u32> = (0..BlockBitmap::pages_needed(total))
        .map(|i| root + 1 + i)
        .collect();
    let mut bitmap = BlockBitmap::new(total, pages.clone());
    bitmap.mark_used(root);
    for &page in &pages {
        bitmap.mark_used(page);
    }

    let root_sector = RootBlock::fresh_sector(&pages, &name, options.date);
    disk.write_sector(root, &root_sector, ChecksumKind::Block)?;
    bitmap.sync(&mut disk)?;

    info!(
        volume = %options.volume_name,
        sectors = total,
        ffs = options.dos_flags.contains(DosFlags::FFS),
        bootable = options.bootable,
        "formatted disk"
    );
    Ok(disk)
}
