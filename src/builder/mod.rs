use std::path::Path;

use tracing::{info, warn};

use crate::{
    disk::DiskImage,
    fs::{
        error::{AdfError, Result},
        FileSystem,
    },
    utils::AmigaDate,
};

pub mod upload;

/// 正在组装的一张软盘，只属于一次构建。
#[derive(Debug)]
pub struct AdfBuilder {
    fs: FileSystem,
    skipped: Vec<AdfError>, // 被跳过的条目（缺失的源文件、无法保存的名称）
}

impl AdfBuilder {
    pub fn load_template(path: &Path) -> Result<Self> {
        let builder = Self::from_image(DiskImage::load(path)?)?;
        info!(template = %path.display(), "template loaded");
        Ok(builder)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_image(DiskImage::from_bytes(bytes)?)
    }

    pub fn from_image(disk: DiskImage) -> Result<Self> {
        Ok(Self {
            fs: FileSystem::mount(disk)?,
            skipped: Vec::new(),
        })
    }

    pub fn with_date(mut self, date: AmigaDate) -> Self {
        self.fs.set_date(date);
        self
    }

    pub fn set_disk_name(&mut self, name: &str) -> Result<()> {
        self.fs.set_volume_name(name)
    }

    pub fn root_sector(&self) -> u32 {
        self.fs.root_sector()
    }

    pub fn create_folder(&mut self, name: &str, parent: u32) -> Result<u32> {
        self.fs.create_folder(name, parent)
    }

    pub fn write_file(&mut self, name: &str, content: &[u8], parent: u32) -> Result<u32> {
        self.fs.write_file(name, content, parent)
    }

    pub fn filesystem(&self) -> &FileSystem {
        &self.fs
    }

    pub fn skipped(&self) -> &[AdfError] {
        &self.skipped
    }

    /// 可恢复的错误记录下来并跳过该条目，其余错误向上传递。
    pub(crate) fn skip_or_fail<T>(&mut self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_recoverable() => {
                warn!("{}, skipped", e);
                self.skipped.push(e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// 返回最终镜像；构建中写过的扇区只要有一个校验和不对就报错。
    pub fn get_disk(&self) -> Result<&[u8]> {
        if let Some(&sector) = self.fs.disk().stale_sectors().first() {
            return Err(AdfError::ChecksumMismatch(sector));
        }
        Ok(self.fs.disk().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::format::{format, FormatOptions};

    fn template() -> Vec<u8> {
        format(&FormatOptions::default()).unwrap().into_bytes()
    }

    #[test]
    fn untouched_template_round_trips() {
        let bytes = template();
        let builder = AdfBuilder::from_bytes(bytes.clone()).unwrap();
        assert_eq!(builder.get_disk().unwrap(), &bytes[..]);
    }

    #[test]
    fn load_template_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.adf");
        std::fs::write(&path, template()).unwrap();
        let builder = AdfBuilder::load_template(&path).unwrap();
        assert_eq!(builder.root_sector(), 880);

        assert!(matches!(
            AdfBuilder::load_template(&dir.path().join("boot.adf")),
            Err(AdfError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn non_dos_template_is_invalid() {
        let mut bytes = template();
        bytes[..4].copy_from_slice(b"PFS\x01");
        assert!(matches!(
            AdfBuilder::from_bytes(bytes),
            Err(AdfError::InvalidFormat(_))
        ));
    }

    #[test]
    fn set_disk_name_updates_root() {
        let mut builder = AdfBuilder::from_bytes(template()).unwrap();
        builder.set_disk_name("MyGame").unwrap();
        assert_eq!(builder.filesystem().volume_name().unwrap(), "MyGame");
        assert!(builder.get_disk().is_ok());
    }

    #[test]
    fn skip_or_fail_separates_recoverable_errors() {
        let mut builder = AdfBuilder::from_bytes(template()).unwrap();
        let skipped: Result<Option<u32>> =
            builder.skip_or_fail(Err(AdfError::InvalidName("x:y".into())));
        assert!(matches!(skipped, Ok(None)));
        assert_eq!(builder.skipped().len(), 1);

        let failed: Result<Option<u32>> =
            builder.skip_or_fail(Err(AdfError::DiskFull { needed: 2, free: 0 }));
        assert!(failed.is_err());
        assert_eq!(builder.skipped().len(), 1);
    }
}
