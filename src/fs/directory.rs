use std::cmp::Ordering;

use crate::fs::config::HASH_TABLE_SIZE;

// 目录项类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File { size: u32 },
    Directory,
}

// 一个目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub sector: u32,
    pub kind: EntryKind,
}

/// 按名称遍历哈希桶的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    pub sector: u32,
    /// 在桶链上访问了几个头块（桶头为 1）
    pub steps: usize,
}

/// AmigaDOS 的大写转换；国际模式下包括 Latin-1 字母（247 除外）。
pub fn to_upper(c: u8, international: bool) -> u8 {
    match c {
        b'a'..=b'z' => c - 32,
        224..=254 if international && c != 247 => c - 32,
        _ => c,
    }
}

/// 标准 AmigaDOS 目录哈希，必须与 DOS 自身一致，其他工具才能找到条目。
pub fn hash_name(name: &[u8], international: bool) -> usize {
    let mut hash = name.len() as u32;
    for &c in name {
        hash = hash.wrapping_mul(13).wrapping_add(to_upper(c, international) as u32) & 0x7FF;
    }
    (hash % HASH_TABLE_SIZE as u32) as usize
}

pub fn names_equal(a: &[u8], b: &[u8], international: bool) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(&x, &y)| to_upper(x, international) == to_upper(y, international))
}

/// 目录在前、文件在后，同类按名称排序
pub fn sort_entries(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| match (&a.kind, &b.kind) {
        (EntryKind::Directory, EntryKind::File { .. }) => Ordering::Less,
        (EntryKind::File { .. }, EntryKind::Directory) => Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });
}
