// 块类型（第 0 字节）
pub const T_HEADER: u32 = 2;
pub const T_DATA: u32 = 8;
pub const T_LIST: u32 = 16;

// 次类型（第 508 字节）
pub const ST_ROOT: u32 = 1;
pub const ST_USERDIR: u32 = 2;
pub const ST_FILE: u32 = (-3i32) as u32;

// 所有头块共用的字段偏移
pub const OFF_TYPE: usize = 0;
pub const OFF_HEADER_KEY: usize = 4;
pub const OFF_HIGH_SEQ: usize = 8;
pub const OFF_HT_SIZE: usize = 12; // 根块
pub const OFF_FIRST_DATA: usize = 16;
pub const OFF_CHECKSUM: usize = 20;
pub const OFF_TABLE: usize = 24; // 哈希表或数据块表
pub const OFF_PROTECT: usize = 320;
pub const OFF_BYTE_SIZE: usize = 324;
pub const OFF_DATE: usize = 420; // 最后修改时间（根块：最后一次改动根目录）
pub const OFF_NAME: usize = 432;
pub const OFF_HASH_CHAIN: usize = 496;
pub const OFF_PARENT: usize = 500;
pub const OFF_EXTENSION: usize = 504;
pub const OFF_SEC_TYPE: usize = 508;

// 根块独有字段
pub const OFF_BM_FLAG: usize = 312;
pub const OFF_BM_PAGES: usize = 316;
pub const OFF_BM_EXT: usize = 416;
pub const OFF_DISK_DATE: usize = 472;
pub const OFF_CREATION_DATE: usize = 484;

// OFS 数据块字段
pub const OFF_DATA_SEQ: usize = 8;
pub const OFF_DATA_SIZE: usize = 12;
pub const OFF_NEXT_DATA: usize = 16;
pub const OFS_DATA_OFFSET: usize = 24;

/// 每个目录的哈希桶数量，也是每个文件头/扩展块可存放的数据块指针数。
pub const HASH_TABLE_SIZE: usize = 72;
pub const BM_PAGES_IN_ROOT: usize = 25;
/// 每个位图块可描述的块数（127 个 32 位字）
pub const BLOCKS_PER_BITMAP_PAGE: u32 = 127 * 32;
pub const BM_VALID: u32 = 0xFFFF_FFFF;

pub const OFS_BYTES_PER_BLOCK: usize = 488;
pub const FFS_BYTES_PER_BLOCK: usize = 512;
