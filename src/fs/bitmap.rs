use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    disk::{
        codec::{read_u32, recompute_checksum, verify_checksum, write_u32, ChecksumKind},
        types::RESERVED_SECTORS,
        BlockDevice,
    },
    fs::{
        config::BLOCKS_PER_BITMAP_PAGE,
        error::{AdfError, Result},
    },
};

const WORDS_PER_PAGE: usize = 127;

/// 空闲块位图。沿用 AmigaDOS 的约定：每个 bit 对应一个块（从第 2 块开始），1 表示空闲。
#[derive(Debug, Clone)]
pub struct BlockBitmap {
    words: Vec<u32>,   // 位图数据，按 32 位字存放
    total_blocks: u32, // 磁盘块总数（含两个启动块）
    free_blocks: u32,  // 当前空闲块数
    pages: Vec<u32>,   // 位图块在磁盘中的扇区号
}

impl BlockBitmap {
    /// 创建一个全部空闲的位图（格式化时使用）
    pub fn new(total_blocks: u32, pages: Vec<u32>) -> Self {
        let bits = total_blocks.saturating_sub(RESERVED_SECTORS);
        let mut words = vec![0u32; bits.div_ceil(32) as usize];
        for index in 0..bits {
            words[(index / 32) as usize] |= 1 << (index % 32);
        }
        Self {
            words,
            total_blocks,
            free_blocks: bits,
            pages,
        }
    }

    /// 需要多少个位图块才能覆盖整张磁盘
    pub fn pages_needed(total_blocks: u32) -> u32 {
        total_blocks
            .saturating_sub(RESERVED_SECTORS)
            .div_ceil(BLOCKS_PER_BITMAP_PAGE)
    }

    // 从磁盘加载位图
    pub fn load(disk: &impl BlockDevice, pages: &[u32], total_blocks: u32) -> Result<Self> {
        let bits = total_blocks.saturating_sub(RESERVED_SECTORS);
        let word_len = bits.div_ceil(32) as usize;
        if pages.len() < Self::pages_needed(total_blocks) as usize {
            return Err(AdfError::InvalidFormat(format!(
                "{} bitmap pages cannot cover {} blocks",
                pages.len(),
                total_blocks
            )));
        }

        let mut words = Vec::with_capacity(word_len);
        for &page in pages {
            let buf = disk.read_sector(page)?;
            if !verify_checksum(&buf, ChecksumKind::Bitmap) {
                return Err(AdfError::InvalidFormat(format!(
                    "bitmap block {} has a bad checksum",
                    page
                )));
            }
            for i in 0..WORDS_PER_PAGE {
                if words.len() == word_len {
                    break;
                }
                words.push(read_u32(&buf, 4 + i * 4));
            }
        }

        let mut bitmap = Self {
            words,
            total_blocks,
            free_blocks: 0,
            pages: pages.to_vec(),
        };
        bitmap.free_blocks = (RESERVED_SECTORS..total_blocks)
            .filter(|&block| !bitmap.is_used(block))
            .count() as u32;
        Ok(bitmap)
    }

    fn position(block: u32) -> (usize, u32) {
        let index = block - RESERVED_SECTORS;
        ((index / 32) as usize, 1 << (index % 32))
    }

    /// 启动块永远视为已占用；越界的块也视为已占用。
    pub fn is_used(&self, block: u32) -> bool {
        if block < RESERVED_SECTORS || block >= self.total_blocks {
            return true;
        }
        let (word, mask) = Self::position(block);
        self.words[word] & mask == 0
    }

    pub fn mark_used(&mut self, block: u32) {
        if !self.is_used(block) {
            let (word, mask) = Self::position(block);
            self.words[word] &= !mask;
            self.free_blocks -= 1;
        }
    }

    // 分配编号最小的空闲块
    pub fn alloc(&mut self) -> Option<u32> {
        let (word_index, word) = self
            .words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != 0)?;
        let block = RESERVED_SECTORS + word_index as u32 * 32 + word.trailing_zeros();
        if block >= self.total_blocks {
            return None;
        }
        self.mark_used(block);
        Some(block)
    }

    /// 一次性预留 `count` 个块；空间不足时不做任何修改。
    pub fn alloc_many(&mut self, count: u64) -> Result<Vec<u32>> {
        if count > self.free_blocks as u64 {
            return Err(AdfError::DiskFull {
                needed: count,
                free: self.free_blocks,
            });
        }
        let mut blocks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            // free_blocks 已经保证足够
            let block = self.alloc().ok_or_else(|| {
                AdfError::Corrupted("bitmap free count out of sync".to_string())
            })?;
            blocks.push(block);
        }
        debug!(count, first = blocks.first().copied(), "allocated blocks");
        Ok(blocks)
    }

    pub fn free_blocks(&self) -> u32 {
        self.free_blocks
    }

    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    pub fn allocated(&self) -> BTreeSet<u32> {
        (RESERVED_SECTORS..self.total_blocks)
            .filter(|&block| self.is_used(block))
            .collect()
    }

    // 将位图写回磁盘，保留位图块中有效范围之外的字节
    pub fn sync(&self, disk: &mut impl BlockDevice) -> Result<()> {
        for (page_index, &page) in self.pages.iter().enumerate() {
            let start = page_index * WORDS_PER_PAGE;
            if start >= self.words.len() {
                break;
            }
            let end = (start + WORDS_PER_PAGE).min(self.words.len());

            let mut buf = disk.read_sector(page)?;
            for (i, word) in self.words[start..end].iter().enumerate() {
                write_u32(&mut buf, 4 + i * 4, *word);
            }
            recompute_checksum(&mut buf, ChecksumKind::Bitmap);
            disk.write_sector(page, &buf, ChecksumKind::Bitmap)?;
        }
        Ok(())
    }
}
