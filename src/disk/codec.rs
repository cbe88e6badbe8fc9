use crate::{
    disk::types::{Sector, SECTOR_SIZE},
    fs::error::{AdfError, Result},
};

/// AmigaDOS 文件名/卷名的最大长度（字节）
pub const MAX_NAME_LEN: usize = 30;

/// 扇区使用哪种校验和约定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// FFS 数据块：没有校验和
    None,
    /// 根块、头块、OFS 数据块、扩展块：校验和位于第 20 字节
    Block,
    /// 位图块：校验和位于第 0 字节
    Bitmap,
}

impl ChecksumKind {
    pub fn offset(self) -> Option<usize> {
        match self {
            ChecksumKind::None => None,
            ChecksumKind::Block => Some(20),
            ChecksumKind::Bitmap => Some(0),
        }
    }
}

pub fn read_u32(sector: &Sector, offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&sector[offset..offset + 4]);
    u32::from_be_bytes(word)
}

pub fn write_u32(sector: &mut Sector, offset: usize, value: u32) {
    sector[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// 计算校验和：所有 32 位字（校验字段视为 0）之和取负。
pub fn compute_checksum(sector: &Sector, checksum_offset: usize) -> u32 {
    let mut sum: u32 = 0;
    for offset in (0..SECTOR_SIZE).step_by(4) {
        if offset != checksum_offset {
            sum = sum.wrapping_add(read_u32(sector, offset));
        }
    }
    sum.wrapping_neg()
}

pub fn recompute_checksum(sector: &mut Sector, kind: ChecksumKind) {
    if let Some(offset) = kind.offset() {
        let checksum = compute_checksum(sector, offset);
        write_u32(sector, offset, checksum);
    }
}

pub fn verify_checksum(sector: &Sector, kind: ChecksumKind) -> bool {
    match kind.offset() {
        Some(offset) => compute_checksum(sector, offset) == read_u32(sector, offset),
        None => true,
    }
}

/// 启动块校验和：两个扇区按字带进位累加，最后取反。
pub fn boot_checksum(boot: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    for (i, chunk) in boot.chunks_exact(4).enumerate() {
        if i == 1 {
            continue;
        }
        let word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let (next, carry) = sum.overflowing_add(word);
        sum = if carry { next.wrapping_add(1) } else { next };
    }
    !sum
}

/// 把名称编码成 AmigaDOS 可以保存的 Latin-1 字节。
pub fn encode_name(name: &str) -> Result<Vec<u8>> {
    if name.is_empty() {
        return Err(AdfError::InvalidName(name.to_string()));
    }
    let mut bytes = Vec::with_capacity(name.len());
    for c in name.chars() {
        let code = c as u32;
        if code > 0xFF || code < 0x20 || c == '/' || c == ':' {
            return Err(AdfError::InvalidName(name.to_string()));
        }
        bytes.push(code as u8);
    }
    if bytes.len() > MAX_NAME_LEN {
        return Err(AdfError::InvalidName(name.to_string()));
    }
    Ok(bytes)
}

pub fn decode_name(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// 写入 BCPL 字符串：1 字节长度 + 内容，剩余部分清零。
pub fn write_bcpl(sector: &mut Sector, offset: usize, bytes: &[u8]) {
    let len = bytes.len().min(MAX_NAME_LEN);
    sector[offset] = len as u8;
    sector[offset + 1..offset + 1 + len].copy_from_slice(&bytes[..len]);
    sector[offset + 1 + len..offset + 1 + MAX_NAME_LEN].fill(0);
}

pub fn read_bcpl(sector: &Sector, offset: usize) -> Vec<u8> {
    let len = (sector[offset] as usize).min(MAX_NAME_LEN);
    sector[offset + 1..offset + 1 + len].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_makes_sector_sum_zero() {
        let mut sector = [0u8; SECTOR_SIZE];
        write_u32(&mut sector, 0, 2);
        write_u32(&mut sector, 4, 880);
        write_u32(&mut sector, 508, 0xFFFF_FFFD);
        recompute_checksum(&mut sector, ChecksumKind::Block);

        let total = (0..SECTOR_SIZE)
            .step_by(4)
            .fold(0u32, |acc, off| acc.wrapping_add(read_u32(&sector, off)));
        assert_eq!(total, 0);
        assert!(verify_checksum(&sector, ChecksumKind::Block));

        sector[100] ^= 1;
        assert!(!verify_checksum(&sector, ChecksumKind::Block));
    }

    #[test]
    fn bitmap_checksum_lives_at_offset_zero() {
        let mut sector = [0xFFu8; SECTOR_SIZE];
        recompute_checksum(&mut sector, ChecksumKind::Bitmap);
        assert!(verify_checksum(&sector, ChecksumKind::Bitmap));
        // 127 words of 0xFFFFFFFF sum to -127
        assert_eq!(read_u32(&sector, 0), 127);
    }

    #[test]
    fn names_are_latin1_and_bounded() {
        assert_eq!(encode_name("foo.library").unwrap(), b"foo.library".to_vec());
        assert_eq!(encode_name("Grüße").unwrap(), vec![b'G', b'r', 0xFC, 0xDF, b'e']);
        assert!(matches!(encode_name(""), Err(AdfError::InvalidName(_))));
        assert!(matches!(encode_name("a/b"), Err(AdfError::InvalidName(_))));
        assert!(matches!(encode_name("DF0:x"), Err(AdfError::InvalidName(_))));
        assert!(matches!(encode_name("日本"), Err(AdfError::InvalidName(_))));
        assert!(encode_name(&"x".repeat(30)).is_ok());
        assert!(encode_name(&"x".repeat(31)).is_err());
    }

    #[test]
    fn bcpl_round_trip_clears_tail() {
        let mut sector = [0xAAu8; SECTOR_SIZE];
        write_bcpl(&mut sector, 432, b"Workbench");
        assert_eq!(sector[432], 9);
        assert_eq!(read_bcpl(&sector, 432), b"Workbench".to_vec());
        assert!(sector[442..463].iter().all(|&b| b == 0));
        assert_eq!(sector[463], 0xAA);
    }
}
