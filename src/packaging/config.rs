use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::fs::error::Result;

/// 一个项目的打包描述（packaging.json）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagingConfig {
    // 目标列表，也接受 `targets`
    #[serde(default, alias = "targets")]
    pub supports: Vec<SupportConfig>,
}

/// 一个输出介质
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportConfig {
    // 介质类型，只构建 adf
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    // 目标名，同时作为卷名
    pub support_name: String,
    // 输出文件名，默认 `<supportName>.adf`
    #[serde(default)]
    pub output_name: Option<String>,
    // 使用可引导模板
    #[serde(default)]
    pub boot: bool,
    #[serde(default)]
    pub files_to_include_on_root: Vec<String>,
    #[serde(default)]
    pub folders_to_include: Vec<String>,
    // 由 S/startup-sequence 启动的程序
    #[serde(default)]
    pub exe_to_launch: Option<String>,
    #[serde(default)]
    pub include_disk_font_library: bool,
    #[serde(default)]
    pub include_math_trans_library: bool,
}

fn default_kind() -> String {
    "adf".to_string()
}

impl SupportConfig {
    pub fn is_adf(&self) -> bool {
        self.kind.eq_ignore_ascii_case("adf")
    }

    pub fn output_file_name(&self) -> String {
        self.output_name
            .clone()
            .unwrap_or_else(|| format!("{}.adf", self.support_name))
    }

    pub fn libraries(&self) -> Vec<SystemLibrary> {
        let mut libs = Vec::new();
        if self.include_disk_font_library {
            libs.push(SystemLibrary::DiskFont);
        }
        if self.include_math_trans_library {
            libs.push(SystemLibrary::MathTrans);
        }
        libs
    }
}

impl PackagingConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn adf_targets(&self) -> impl Iterator<Item = &SupportConfig> {
        self.supports.iter().filter(|s| s.is_adf())
    }
}

/// 可以放进 `Libs` 的系统库
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemLibrary {
    DiskFont,
    MathTrans,
}

impl SystemLibrary {
    pub fn file_name(self) -> &'static str {
        match self {
            SystemLibrary::DiskFont => "diskfont.library",
            SystemLibrary::MathTrans => "mathtrans.library",
        }
    }
}

/// 资源目录：模板镜像、启动脚本模板和系统库
#[derive(Debug, Clone)]
pub struct Resources {
    pub dir: PathBuf,
}

impl Resources {
    pub const ENV_VAR: &'static str = "ADFPACK_RESOURCES";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 查找顺序：`--resources`、`ADFPACK_RESOURCES`、用户数据目录。
    pub fn locate(explicit: Option<PathBuf>) -> Self {
        let dir = explicit
            .or_else(|| std::env::var_os(Self::ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("adfpack")
                    .join("resources")
            });
        Self { dir }
    }

    pub fn template(&self, boot: bool) -> PathBuf {
        self.dir.join(if boot { "boot.adf" } else { "blank.adf" })
    }

    pub fn startup_sequence(&self) -> PathBuf {
        self.dir.join("startup-sequence")
    }

    pub fn library(&self, library: SystemLibrary) -> PathBuf {
        self.dir.join(library.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::error::AdfError;

    #[test]
    fn parses_packaging_json() {
        let config = PackagingConfig::from_json(
            r#"{
                "supports": [
                    {
                        "type": "adf",
                        "supportName": "Disk1",
                        "boot": true,
                        "filesToIncludeOnRoot": ["game"],
                        "foldersToInclude": ["data"],
                        "exeToLaunch": "game",
                        "includeDiskFontLibrary": true
                    },
                    { "type": "zip", "supportName": "Archive" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.supports.len(), 2);
        let targets: Vec<_> = config.adf_targets().collect();
        assert_eq!(targets.len(), 1);
        let disk = targets[0];
        assert!(disk.boot);
        assert_eq!(disk.output_file_name(), "Disk1.adf");
        assert_eq!(disk.exe_to_launch.as_deref(), Some("game"));
        assert_eq!(disk.libraries(), vec![SystemLibrary::DiskFont]);
    }

    #[test]
    fn targets_alias_and_defaults() {
        let config = PackagingConfig::from_json(
            r#"{ "targets": [ { "supportName": "X", "outputName": "x.adf" } ] }"#,
        )
        .unwrap();
        let target = &config.supports[0];
        assert!(target.is_adf());
        assert!(!target.boot);
        assert!(target.files_to_include_on_root.is_empty());
        assert_eq!(target.output_file_name(), "x.adf");
        assert!(target.libraries().is_empty());
    }

    #[test]
    fn malformed_json_is_config_error() {
        assert!(matches!(
            PackagingConfig::from_json("{ \"supports\": [ { } ] }"),
            Err(AdfError::Config(_))
        ));
    }

    #[test]
    fn resource_paths() {
        let resources = Resources::new("/res");
        assert_eq!(resources.template(true), PathBuf::from("/res/boot.adf"));
        assert_eq!(resources.template(false), PathBuf::from("/res/blank.adf"));
        assert_eq!(
            resources.library(SystemLibrary::MathTrans),
            PathBuf::from("/res/mathtrans.library")
        );
        let explicit = Resources::locate(Some(PathBuf::from("/opt/res")));
        assert_eq!(explicit.dir, PathBuf::from("/opt/res"));
    }
}
