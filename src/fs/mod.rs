use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    disk::{
        codec::{self, read_u32, recompute_checksum, ChecksumKind},
        BlockDevice, DiskImage, Sector,
    },
    fs::{
        bitmap::BlockBitmap,
        config::*,
        data_block::{ffs_data_block, ofs_data_block, OfsDataHeader},
        directory::{hash_name, names_equal, sort_entries, DirEntry, EntryKind, Lookup},
        error::{AdfError, Result},
        header::{
            directory_header, extension_block, file_header, hash_slot, read_data_table,
            set_hash_slot, HeaderFields, HeaderKind,
        },
        root_block::{DosFlags, RootBlock},
    },
    utils::AmigaDate,
};

pub mod bitmap;
pub mod config;
pub mod data_block;
pub mod directory;
pub mod error;
pub mod format;
pub mod header;
pub mod root_block;

/// 挂载在内存镜像上的 OFS/FFS 文件系统。
///
/// 所有块之间的关系都以扇区号表示，镜像本身是唯一的存储。
#[derive(Debug)]
pub struct FileSystem {
    disk: DiskImage,      // 底层镜像
    root: RootBlock,      // 根块信息
    bitmap: BlockBitmap,  // 块分配信息
    date: AmigaDate,      // 新建条目使用的时间戳
}

impl FileSystem {
    pub fn mount(disk: DiskImage) -> Result<Self> {
        let root = RootBlock::load(&disk, disk.geometry().root_sector())?;
        let bitmap = BlockBitmap::load(&disk, &root.bitmap_pages, disk.sector_count())?;
        debug!(free = bitmap.free_blocks(), "mounted volume");
        Ok(Self {
            disk,
            root,
            bitmap,
            date: AmigaDate::now(),
        })
    }

    pub fn set_date(&mut self, date: AmigaDate) {
        self.date = date;
    }

    pub fn root_sector(&self) -> u32 {
        self.root.sector
    }

    pub fn dos_flags(&self) -> DosFlags {
        self.root.dos_flags
    }

    pub fn disk(&self) -> &DiskImage {
        &self.disk
    }

    pub fn free_blocks(&self) -> u32 {
        self.bitmap.free_blocks()
    }

    pub fn volume_name(&self) -> Result<String> {
        self.root.name(&self.disk)
    }

    pub fn set_volume_name(&mut self, name: &str) -> Result<()> {
        self.root.set_name(&mut self.disk, name, self.date)
    }

    fn international(&self) -> bool {
        self.root.dos_flags.international()
    }

    pub fn is_directory(&self, sector: u32) -> Result<bool> {
        let block = self.disk.read_sector(sector)?;
        Ok(HeaderKind::of(&block).is_some_and(HeaderKind::is_directory))
    }

    fn read_directory(&self, sector: u32) -> Result<Sector> {
        let block = self.disk.read_sector(sector)?;
        match HeaderKind::of(&block) {
            Some(kind) if kind.is_directory() => Ok(block),
            _ => Err(AdfError::NotADirectory(sector)),
        }
    }

    /// 把新条目挂到父目录哈希桶的桶头（新条目的 hash_chain 已指向旧桶头）。
    fn link(&mut self, parent: u32, mut parent_block: Sector, bucket: usize, child: u32) -> Result<()> {
        set_hash_slot(&mut parent_block, bucket, child);
        self.date.write(&mut parent_block, OFF_DATE);
        if parent == self.root.sector {
            self.date.write(&mut parent_block, OFF_DISK_DATE);
        }
        recompute_checksum(&mut parent_block, ChecksumKind::Block);
        self.disk.write_sector(parent, &parent_block, ChecksumKind::Block)?;
        debug!(parent, bucket, child, "linked entry");
        Ok(())
    }

    pub fn create_folder(&mut self, name: &str, parent: u32) -> Result<u32> {
        let encoded = codec::encode_name(name)?;
        let parent_block = self.read_directory(parent)?;
        let sector = self.bitmap.alloc_many(1)?[0];

        let bucket = hash_name(&encoded, self.international());
        let fields = HeaderFields {
            own: sector,
            parent,
            name: &encoded,
            hash_chain: hash_slot(&parent_block, bucket),
            date: self.date,
        };
        self.disk
            .write_sector(sector, &directory_header(&fields), ChecksumKind::Block)?;
        self.link(parent, parent_block, bucket, sector)?;
        self.bitmap.sync(&mut self.disk)?;
        Ok(sector)
    }

    /// 写入一个文件。所有块在链接之前一次性预留，空间不足时镜像保持原样。
    pub fn write_file(&mut self, name: &str, content: &[u8], parent: u32) -> Result<u32> {
        let encoded = codec::encode_name(name)?;
        let parent_block = self.read_directory(parent)?;

        let ffs = self.root.dos_flags.contains(DosFlags::FFS);
        let per_block = self.root.dos_flags.bytes_per_data_block();
        let data_count = content.len().div_ceil(per_block);
        let ext_count = data_count
            .saturating_sub(HASH_TABLE_SIZE)
            .div_ceil(HASH_TABLE_SIZE);

        let blocks = self
            .bitmap
            .alloc_many((1 + data_count + ext_count) as u64)?;
        let header = blocks[0];
        let data = &blocks[1..1 + data_count];
        let extensions = &blocks[1 + data_count..];

        for (i, (chunk, &block)) in content.chunks(per_block).zip(data).enumerate() {
            if ffs {
                self.disk
                    .write_sector(block, &ffs_data_block(chunk), ChecksumKind::None)?;
            } else {
                let next = data.get(i + 1).copied().unwrap_or(0);
                let sector = ofs_data_block(header, i as u32 + 1, chunk, next);
                self.disk.write_sector(block, &sector, ChecksumKind::Block)?;
            }
        }

        let mut tables = data.chunks(HASH_TABLE_SIZE);
        let first_table = tables.next().unwrap_or(&[]);
        for (i, (table, &ext)) in tables.zip(extensions).enumerate() {
            let next = extensions.get(i + 1).copied().unwrap_or(0);
            self.disk.write_sector(
                ext,
                &extension_block(ext, header, table, next),
                ChecksumKind::Block,
            )?;
        }

        let bucket = hash_name(&encoded, self.international());
        let fields = HeaderFields {
            own: header,
            parent,
            name: &encoded,
            hash_chain: hash_slot(&parent_block, bucket),
            date: self.date,
        };
        let sector = file_header(
            &fields,
            content.len() as u32,
            first_table,
            extensions.first().copied().unwrap_or(0),
        );
        self.disk.write_sector(header, &sector, ChecksumKind::Block)?;
        self.link(parent, parent_block, bucket, header)?;
        self.bitmap.sync(&mut self.disk)?;

        debug!(name, header, data_blocks = data_count, extensions = ext_count, "wrote file");
        Ok(header)
    }

    /// 在目录中按名称（不区分大小写）查找条目。
    pub fn lookup(&self, dir: u32, name: &str) -> Result<Option<Lookup>> {
        let encoded = codec::encode_name(name)?;
        let block = self.read_directory(dir)?;
        let intl = self.international();

        let mut next = hash_slot(&block, hash_name(&encoded, intl));
        let mut steps = 0;
        while next != 0 {
            steps += 1;
            if steps > self.disk.sector_count() as usize {
                return Err(AdfError::Corrupted(format!("hash chain loop in {}", dir)));
            }
            let entry = self.disk.read_sector(next)?;
            if names_equal(&codec::read_bcpl(&entry, OFF_NAME), &encoded, intl) {
                return Ok(Some(Lookup { sector: next, steps }));
            }
            next = read_u32(&entry, OFF_HASH_CHAIN);
        }
        Ok(None)
    }

    /// 从根目录开始解析以 `/` 分隔的路径。
    pub fn resolve(&self, path: &str) -> Result<Option<u32>> {
        let mut current = self.root.sector;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            match self.lookup(current, part)? {
                Some(found) => current = found.sector,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn list_dir(&self, dir: u32) -> Result<Vec<DirEntry>> {
        let block = self.read_directory(dir)?;
        let mut entries = Vec::new();
        for bucket in 0..HASH_TABLE_SIZE {
            let mut next = hash_slot(&block, bucket);
            while next != 0 {
                if entries.len() > self.disk.sector_count() as usize {
                    return Err(AdfError::Corrupted(format!("hash chain loop in {}", dir)));
                }
                let entry = self.disk.read_sector(next)?;
                let kind = match HeaderKind::of(&entry) {
                    Some(HeaderKind::Directory) => EntryKind::Directory,
                    Some(HeaderKind::File) => EntryKind::File {
                        size: read_u32(&entry, OFF_BYTE_SIZE),
                    },
                    _ => {
                        return Err(AdfError::Corrupted(format!(
                            "sector {} in directory {} is not an entry header",
                            next, dir
                        )))
                    }
                };
                entries.push(DirEntry {
                    name: codec::decode_name(&codec::read_bcpl(&entry, OFF_NAME)),
                    sector: next,
                    kind,
                });
                next = read_u32(&entry, OFF_HASH_CHAIN);
            }
        }
        sort_entries(&mut entries);
        Ok(entries)
    }

    /// 文件占用的数据块（按内容顺序）和扩展块。
    pub fn file_blocks(&self, header: u32) -> Result<(Vec<u32>, Vec<u32>)> {
        let block = self.disk.read_sector(header)?;
        if HeaderKind::of(&block) != Some(HeaderKind::File) {
            return Err(AdfError::NotAFile(header));
        }
        let mut data = read_data_table(&block);
        let mut extensions = Vec::new();
        let mut next = read_u32(&block, OFF_EXTENSION);
        while next != 0 {
            if extensions.len() > self.disk.sector_count() as usize {
                return Err(AdfError::Corrupted(format!("extension loop in {}", header)));
            }
            let ext = self.disk.read_sector(next)?;
            if read_u32(&ext, OFF_TYPE) != T_LIST || read_u32(&ext, OFF_PARENT) != header {
                return Err(AdfError::Corrupted(format!(
                    "sector {} is not an extension of {}",
                    next, header
                )));
            }
            extensions.push(next);
            data.extend(read_data_table(&ext));
            next = read_u32(&ext, OFF_EXTENSION);
        }
        Ok((data, extensions))
    }

    /// 读回文件内容：OFS 沿 next_data 链，FFS 沿数据块表。
    pub fn read_file(&self, header: u32) -> Result<Vec<u8>> {
        let block = self.disk.read_sector(header)?;
        if HeaderKind::of(&block) != Some(HeaderKind::File) {
            return Err(AdfError::NotAFile(header));
        }
        let size = read_u32(&block, OFF_BYTE_SIZE) as usize;
        let mut content = Vec::with_capacity(size);

        if self.root.dos_flags.contains(DosFlags::FFS) {
            let (data, _) = self.file_blocks(header)?;
            for block in data {
                let sector = self.disk.read_sector(block)?;
                let take = (size - content.len()).min(FFS_BYTES_PER_BLOCK);
                content.extend_from_slice(&sector[..take]);
            }
        } else {
            let mut next = read_u32(&block, OFF_FIRST_DATA);
            let mut seq = 1;
            while next != 0 {
                let sector = self.disk.read_sector(next)?;
                let data = OfsDataHeader::parse(&sector)
                    .filter(|d| d.header_key == header && d.seq == seq)
                    .ok_or_else(|| {
                        AdfError::Corrupted(format!("bad data block {} in file {}", next, header))
                    })?;
                content.extend_from_slice(data.payload(&sector));
                if content.len() > size {
                    break;
                }
                next = data.next;
                seq += 1;
            }
        }

        if content.len() != size {
            return Err(AdfError::Corrupted(format!(
                "file {} holds {} bytes, header says {}",
                header,
                content.len(),
                size
            )));
        }
        Ok(content)
    }

    /// 从根块出发可以到达的所有块（包括位图块）。同一块被引用两次视为损坏。
    pub fn reachable_blocks(&self) -> Result<BTreeSet<u32>> {
        let mut seen = BTreeSet::new();
        seen.insert(self.root.sector);
        seen.extend(self.bitmap.pages().iter().copied());

        let claim = |block: u32, seen: &mut BTreeSet<u32>| {
            if seen.insert(block) {
                Ok(())
            } else {
                Err(AdfError::Corrupted(format!("block {} referenced twice", block)))
            }
        };

        let mut pending = vec![self.root.sector];
        while let Some(dir) = pending.pop() {
            for entry in self.list_dir(dir)? {
                claim(entry.sector, &mut seen)?;
                match entry.kind {
                    EntryKind::Directory => pending.push(entry.sector),
                    EntryKind::File { .. } => {
                        let (data, extensions) = self.file_blocks(entry.sector)?;
                        for block in data.into_iter().chain(extensions) {
                            claim(block, &mut seen)?;
                        }
                    }
                }
            }
        }
        Ok(seen)
    }

    pub fn allocated_blocks(&self) -> BTreeSet<u32> {
        self.bitmap.allocated()
    }
}
