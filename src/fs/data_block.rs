use crate::{
    disk::{
        codec::{read_u32, recompute_checksum, write_u32, ChecksumKind},
        Sector, SECTOR_SIZE,
    },
    fs::config::*,
};

/// OFS 数据块：24 字节块头 + 488 字节数据，块与块之间通过 next_data 串成链。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfsDataHeader {
    pub header_key: u32,
    pub seq: u32,
    pub size: u32,
    pub next: u32,
}

impl OfsDataHeader {
    pub fn parse(sector: &Sector) -> Option<Self> {
        if read_u32(sector, OFF_TYPE) != T_DATA {
            return None;
        }
        let size = read_u32(sector, OFF_DATA_SIZE);
        if size as usize > OFS_BYTES_PER_BLOCK {
            return None;
        }
        Some(Self {
            header_key: read_u32(sector, OFF_HEADER_KEY),
            seq: read_u32(sector, OFF_DATA_SEQ),
            size,
            next: read_u32(sector, OFF_NEXT_DATA),
        })
    }

    pub fn payload<'a>(&self, sector: &'a Sector) -> &'a [u8] {
        &sector[OFS_DATA_OFFSET..OFS_DATA_OFFSET + self.size as usize]
    }
}

pub fn ofs_data_block(header_key: u32, seq: u32, payload: &[u8], next: u32) -> Sector {
    let mut sector = [0u8; SECTOR_SIZE];
    let len = payload.len().min(OFS_BYTES_PER_BLOCK);
    write_u32(&mut sector, OFF_TYPE, T_DATA);
    write_u32(&mut sector, OFF_HEADER_KEY, header_key);
    write_u32(&mut sector, OFF_DATA_SEQ, seq);
    write_u32(&mut sector, OFF_DATA_SIZE, len as u32);
    write_u32(&mut sector, OFF_NEXT_DATA, next);
    sector[OFS_DATA_OFFSET..OFS_DATA_OFFSET + len].copy_from_slice(&payload[..len]);
    recompute_checksum(&mut sector, ChecksumKind::Block);
    sector
}

/// FFS 数据块只存放原始数据，不足部分补零
pub fn ffs_data_block(payload: &[u8]) -> Sector {
    let mut sector = [0u8; SECTOR_SIZE];
    let len = payload.len().min(FFS_BYTES_PER_BLOCK);
    sector[..len].copy_from_slice(&payload[..len]);
    sector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::codec::verify_checksum;

    #[test]
    fn ofs_block_carries_bookkeeping() {
        let sector = ofs_data_block(900, 1, b"Hi", 0);
        let header = OfsDataHeader::parse(&sector).unwrap();
        assert_eq!(
            header,
            OfsDataHeader { header_key: 900, seq: 1, size: 2, next: 0 }
        );
        assert_eq!(header.payload(&sector), b"Hi");
        assert!(verify_checksum(&sector, ChecksumKind::Block));
    }

    #[test]
    fn ffs_block_is_raw() {
        let payload = vec![0xABu8; 100];
        let sector = ffs_data_block(&payload);
        assert_eq!(&sector[..100], &payload[..]);
        assert!(sector[100..].iter().all(|&b| b == 0));
        assert!(OfsDataHeader::parse(&sector).is_none());
    }
}
