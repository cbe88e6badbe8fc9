use std::{fs, io::ErrorKind};

use tracing::debug;

use crate::{
    builder::AdfBuilder,
    fs::error::{AdfError, Result},
    packaging::config::{Resources, SystemLibrary},
};

/// 启动脚本模板中代表“要启动的可执行文件”的占位符
pub const EXE_TOKEN: &str = "%exe%";
pub const STARTUP_FOLDER: &str = "S";
pub const STARTUP_FILE: &str = "startup-sequence";
pub const LIBS_FOLDER: &str = "Libs";

pub fn render_startup(template: &str, exe: &str) -> String {
    template.replacen(EXE_TOKEN, exe, 1)
}

/// 在卷根目录创建 `S`；配置了可执行文件时写入 `S/startup-sequence`。
pub fn inject_startup(builder: &mut AdfBuilder, resources: &Resources, exe: Option<&str>) -> Result<()> {
    let root = builder.root_sector();
    let folder = builder.create_folder(STARTUP_FOLDER, root)?;

    let Some(exe) = exe else {
        debug!("no executable configured, S/startup-sequence not written");
        return Ok(());
    };
    let path = resources.startup_sequence();
    let template = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(AdfError::TemplateNotFound(path)),
        Err(e) => return Err(e.into()),
    };
    let script = render_startup(&template, exe);
    builder.write_file(STARTUP_FILE, script.as_bytes(), folder)?;
    Ok(())
}

/// 在卷根目录创建 `Libs` 并复制所选的系统库。
pub fn inject_libraries(
    builder: &mut AdfBuilder,
    resources: &Resources,
    libraries: &[SystemLibrary],
) -> Result<()> {
    let root = builder.root_sector();
    let folder = builder.create_folder(LIBS_FOLDER, root)?;
    for &library in libraries {
        builder.upload_file(&resources.library(library), folder)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::format::{format, FormatOptions};

    fn builder() -> AdfBuilder {
        AdfBuilder::from_image(format(&FormatOptions::default()).unwrap()).unwrap()
    }

    #[test]
    fn replaces_first_token_only() {
        assert_eq!(render_startup("run %exe%\n", "Game"), "run Game\n");
        assert_eq!(render_startup("%exe% %exe%", "a"), "a %exe%");
        assert_eq!(render_startup("echo hi", "a"), "echo hi");
    }

    #[test]
    fn writes_startup_sequence() {
        let res = tempfile::tempdir().unwrap();
        fs::write(res.path().join(STARTUP_FILE), "cd SYS:\n%exe%\n").unwrap();
        let resources = Resources::new(res.path());

        let mut builder = builder();
        inject_startup(&mut builder, &resources, Some("MyGame")).unwrap();

        let fs_view = builder.filesystem();
        let script = fs_view.resolve("S/startup-sequence").unwrap().unwrap();
        assert_eq!(fs_view.read_file(script).unwrap(), b"cd SYS:\nMyGame\n");
    }

    #[test]
    fn missing_startup_template_aborts() {
        let res = tempfile::tempdir().unwrap();
        let mut builder = builder();
        assert!(matches!(
            inject_startup(&mut builder, &Resources::new(res.path()), Some("x")),
            Err(AdfError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn no_executable_leaves_s_empty() {
        let res = tempfile::tempdir().unwrap();
        let mut builder = builder();
        inject_startup(&mut builder, &Resources::new(res.path()), None).unwrap();
        let s = builder.filesystem().resolve("S").unwrap().unwrap();
        assert!(builder.filesystem().list_dir(s).unwrap().is_empty());
    }

    #[test]
    fn copies_libraries_and_skips_missing_ones() {
        let res = tempfile::tempdir().unwrap();
        fs::write(res.path().join("diskfont.library"), vec![0x42u8; 1500]).unwrap();
        let resources = Resources::new(res.path());

        let mut builder = builder();
        inject_libraries(
            &mut builder,
            &resources,
            &[SystemLibrary::DiskFont, SystemLibrary::MathTrans],
        )
        .unwrap();

        let fs_view = builder.filesystem();
        let lib = fs_view.resolve("Libs/diskfont.library").unwrap().unwrap();
        assert_eq!(fs_view.read_file(lib).unwrap(), vec![0x42u8; 1500]);
        assert!(fs_view.resolve("Libs/mathtrans.library").unwrap().is_none());
        assert_eq!(builder.skipped().len(), 1);
    }
}
