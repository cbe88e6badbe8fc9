use std::{
    fs,
    io::{self, ErrorKind},
    path::{Component, Path},
};

use tracing::debug;

use crate::{
    builder::AdfBuilder,
    fs::error::{AdfError, Result},
};

/// 宿主系统生成的元数据文件，不放进镜像
const OS_METADATA: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

pub fn is_os_metadata(name: &str) -> bool {
    OS_METADATA.contains(&name) || name.starts_with("._")
}

fn entry_name(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .ok_or_else(|| AdfError::InvalidName(path.display().to_string()))?;
    name.to_str()
        .map(str::to_string)
        .ok_or_else(|| AdfError::InvalidName(name.to_string_lossy().into_owned()))
}

fn read_source(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(AdfError::SourceFileMissing(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

impl AdfBuilder {
    /// 把一个本地文件复制到 `parent` 目录下，使用原文件名。
    pub fn upload_file(&mut self, src: &Path, parent: u32) -> Result<Option<u32>> {
        let result = entry_name(src).and_then(|name| {
            let content = read_source(src)?;
            self.fs.write_file(&name, &content, parent)
        });
        self.skip_or_fail(result)
    }

    /// 把 `base/folder` 整棵目录树按原样复制到 `parent` 下。
    ///
    /// `folder` 可以包含多级路径，中间各级目录存在时复用，不存在时创建。
    pub fn upload_folder(&mut self, base: &Path, folder: &str, parent: u32) -> Result<Option<u32>> {
        let src = base.join(folder);
        if !src.is_dir() {
            return self.skip_or_fail(Err(AdfError::SourceFileMissing(src)));
        }

        let parts: Vec<String> = Path::new(folder)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let Some((last, intermediate)) = parts.split_last() else {
            return self.skip_or_fail(Err(AdfError::InvalidName(folder.to_string())));
        };

        let mut dir = parent;
        for part in intermediate {
            let result = self.intermediate_folder(part, dir);
            match self.skip_or_fail(result)? {
                Some(sector) => dir = sector,
                None => return Ok(None),
            }
        }

        let result = self.fs.create_folder(last, dir);
        let Some(folder_sector) = self.skip_or_fail(result)? else {
            return Ok(None);
        };
        self.upload_tree(&src, folder_sector)?;
        Ok(Some(folder_sector))
    }

    // 中间目录已存在时复用；同名的是文件时新建目录挂在桶头，按“后写覆盖”处理
    fn intermediate_folder(&mut self, name: &str, parent: u32) -> Result<u32> {
        if let Some(found) = self.fs.lookup(parent, name)? {
            if self.fs.is_directory(found.sector)? {
                return Ok(found.sector);
            }
            debug!(name, file = found.sector, "file shadows folder path, creating directory");
        }
        self.fs.create_folder(name, parent)
    }

    // 深度优先，按名称排序以保证镜像可复现
    fn upload_tree(&mut self, src: &Path, dir: u32) -> Result<()> {
        let mut entries = fs::read_dir(src)?.collect::<io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_os_metadata(&name) {
                debug!(path = %path.display(), "skipping OS metadata");
                continue;
            }

            if path.is_dir() {
                let result = entry_name(&path).and_then(|name| self.fs.create_folder(&name, dir));
                if let Some(sub) = self.skip_or_fail(result)? {
                    self.upload_tree(&path, sub)?;
                }
            } else {
                self.upload_file(&path, dir)?;
            }
        }
        Ok(())
    }
}
