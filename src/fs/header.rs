use crate::{
    disk::{
        codec::{read_u32, recompute_checksum, write_bcpl, write_u32, ChecksumKind},
        Sector, SECTOR_SIZE,
    },
    fs::config::*,
    utils::AmigaDate,
};

/// 头块的次类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Root,
    Directory,
    File,
}

impl HeaderKind {
    pub fn of(sector: &Sector) -> Option<HeaderKind> {
        if read_u32(sector, OFF_TYPE) != T_HEADER {
            return None;
        }
        match read_u32(sector, OFF_SEC_TYPE) {
            ST_ROOT => Some(HeaderKind::Root),
            ST_USERDIR => Some(HeaderKind::Directory),
            ST_FILE => Some(HeaderKind::File),
            _ => None,
        }
    }

    pub fn is_directory(self) -> bool {
        matches!(self, HeaderKind::Root | HeaderKind::Directory)
    }
}

/// 文件头和目录头共有的字段
#[derive(Debug, Clone, Copy)]
pub struct HeaderFields<'a> {
    pub own: u32,
    pub parent: u32,
    pub name: &'a [u8],
    pub hash_chain: u32,
    pub date: AmigaDate,
}

impl HeaderFields<'_> {
    fn write_common(&self, sector: &mut Sector, sec_type: u32) {
        write_u32(sector, OFF_TYPE, T_HEADER);
        write_u32(sector, OFF_HEADER_KEY, self.own);
        self.date.write(sector, OFF_DATE);
        write_bcpl(sector, OFF_NAME, self.name);
        write_u32(sector, OFF_HASH_CHAIN, self.hash_chain);
        write_u32(sector, OFF_PARENT, self.parent);
        write_u32(sector, OFF_SEC_TYPE, sec_type);
    }
}

pub fn directory_header(fields: &HeaderFields) -> Sector {
    let mut sector = [0u8; SECTOR_SIZE];
    fields.write_common(&mut sector, ST_USERDIR);
    recompute_checksum(&mut sector, ChecksumKind::Block);
    sector
}

/// 文件头：最多 72 个数据块指针，其余放在扩展块链中。
pub fn file_header(fields: &HeaderFields, byte_size: u32, data: &[u32], extension: u32) -> Sector {
    let mut sector = [0u8; SECTOR_SIZE];
    fields.write_common(&mut sector, ST_FILE);
    write_data_table(&mut sector, data);
    write_u32(&mut sector, OFF_FIRST_DATA, data.first().copied().unwrap_or(0));
    write_u32(&mut sector, OFF_BYTE_SIZE, byte_size);
    write_u32(&mut sector, OFF_EXTENSION, extension);
    recompute_checksum(&mut sector, ChecksumKind::Block);
    sector
}

pub fn extension_block(own: u32, file_header: u32, data: &[u32], next: u32) -> Sector {
    let mut sector = [0u8; SECTOR_SIZE];
    write_u32(&mut sector, OFF_TYPE, T_LIST);
    write_u32(&mut sector, OFF_HEADER_KEY, own);
    write_data_table(&mut sector, data);
    write_u32(&mut sector, OFF_PARENT, file_header);
    write_u32(&mut sector, OFF_EXTENSION, next);
    write_u32(&mut sector, OFF_SEC_TYPE, ST_FILE);
    recompute_checksum(&mut sector, ChecksumKind::Block);
    sector
}

// 数据块表从表尾向前存放：第一个数据块在最后一个槽位
fn table_offset(index: usize) -> usize {
    OFF_TABLE + (HASH_TABLE_SIZE - 1 - index) * 4
}

fn write_data_table(sector: &mut Sector, data: &[u32]) {
    let count = data.len().min(HASH_TABLE_SIZE);
    write_u32(sector, OFF_HIGH_SEQ, count as u32);
    for (i, block) in data.iter().take(count).enumerate() {
        write_u32(sector, table_offset(i), *block);
    }
}

pub fn read_data_table(sector: &Sector) -> Vec<u32> {
    let count = (read_u32(sector, OFF_HIGH_SEQ) as usize).min(HASH_TABLE_SIZE);
    (0..count).map(|i| read_u32(sector, table_offset(i))).collect()
}

pub fn hash_slot(sector: &Sector, bucket: usize) -> u32 {
    read_u32(sector, OFF_TABLE + bucket * 4)
}

pub fn set_hash_slot(sector: &mut Sector, bucket: usize, value: u32) {
    write_u32(sector, OFF_TABLE + bucket * 4, value);
}
