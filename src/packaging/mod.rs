pub mod config;
pub mod progress;
pub mod startup;

use std::{
    collections::HashSet,
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    sync::mpsc::Sender,
    thread,
};

use tracing::{debug, error, info, warn};

use crate::{
    builder::AdfBuilder,
    disk::codec::MAX_NAME_LEN,
    fs::error::{AdfError, Result},
    packaging::{
        config::{PackagingConfig, Resources, SupportConfig},
        progress::BuildProgress,
    },
    utils::{generate_uuid, AmigaDate},
};

/// 一个目标构建完成后的结果
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub output: PathBuf,
    pub skipped: Vec<String>,
    pub free_blocks: u32,
}

#[derive(Debug)]
pub struct TargetOutcome {
    pub target: String,
    pub result: Result<TargetReport>,
}

/// 一次打包任务：项目目录、输出目录、资源目录和配置。
#[derive(Debug, Clone)]
pub struct PackagingJob {
    pub project_dir: PathBuf,
    pub build_dir: PathBuf,
    pub resources: Resources,
    pub config: PackagingConfig,
}

impl PackagingJob {
    /// 读取配置文件；源文件路径和默认输出目录都相对于配置文件所在目录。
    pub fn load(config_path: &Path, build_dir: Option<PathBuf>, resources: Resources) -> Result<Self> {
        let config = PackagingConfig::load(config_path)?;
        let project_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            build_dir: build_dir.unwrap_or_else(|| project_dir.join("build")),
            project_dir,
            resources,
            config,
        })
    }

    /// 并行构建所有 ADF 目标；某个目标失败不会影响其他目标。
    pub fn run(&self, progress: &Sender<BuildProgress>) -> Vec<TargetOutcome> {
        for support in self.config.supports.iter().filter(|s| !s.is_adf()) {
            debug!(name = %support.support_name, kind = %support.kind, "ignoring non-ADF target");
        }
        let date = AmigaDate::now();

        thread::scope(|scope| {
            let mut claimed = HashSet::new();
            let pending: Vec<_> = self
                .config
                .adf_targets()
                .map(|support| {
                    // 输出文件名相同（不区分大小写）的后续目标直接失败
                    let output = support.output_file_name();
                    if !claimed.insert(output.to_lowercase()) {
                        warn!(name = %support.support_name, output = %output, "duplicate output file");
                        let error = AdfError::DuplicateOutput(output);
                        let _ = progress.send(BuildProgress::Finished {
                            target: support.support_name.clone(),
                            error: Some(error.to_string()),
                        });
                        return Err(TargetOutcome {
                            target: support.support_name.clone(),
                            result: Err(error),
                        });
                    }

                    let tx = progress.clone();
                    Ok(scope.spawn(move || {
                        let target = support.support_name.clone();
                        let _ = tx.send(BuildProgress::Started {
                            target: target.clone(),
                        });
                        let result = self.build_target(support, date, &tx);
                        if let Err(e) = &result {
                            error!(disk = %target, "build failed: {}", e);
                        }
                        let _ = tx.send(BuildProgress::Finished {
                            target: target.clone(),
                            error: result.as_ref().err().map(|e| e.to_string()),
                        });
                        TargetOutcome { target, result }
                    }))
                })
                .collect();

            pending
                .into_iter()
                .map(|entry| match entry {
                    Ok(handle) => handle.join().unwrap_or_else(|_| TargetOutcome {
                        target: String::from("<unknown>"),
                        result: Err(AdfError::Corrupted("build thread panicked".to_string())),
                    }),
                    Err(outcome) => outcome,
                })
                .collect()
        })
    }

    pub fn build_target(
        &self,
        support: &SupportConfig,
        date: AmigaDate,
        progress: &Sender<BuildProgress>,
    ) -> Result<TargetReport> {
        let target = support.support_name.as_str();
        let step = |message: &str| {
            let _ = progress.send(BuildProgress::Step {
                target: target.to_string(),
                message: message.to_string(),
            });
        };

        let output_name = support.output_file_name();
        if Path::new(&output_name).file_name() != Some(OsStr::new(&output_name)) {
            return Err(AdfError::InvalidName(output_name));
        }

        step("💾 loading template...");
        let template = self.resources.template(support.boot);
        let mut builder = AdfBuilder::load_template(&template)?.with_date(date);
        builder.set_disk_name(&volume_label(&support.support_name))?;
        let root = builder.root_sector();

        step("📁 copying files...");
        for file in &support.files_to_include_on_root {
            builder.upload_file(&self.project_dir.join(file), root)?;
        }
        for folder in &support.folders_to_include {
            builder.upload_folder(&self.project_dir, folder, root)?;
        }

        step("⚙️  writing startup-sequence...");
        startup::inject_startup(&mut builder, &self.resources, support.exe_to_launch.as_deref())?;
        startup::inject_libraries(&mut builder, &self.resources, &support.libraries())?;

        step("🪶 writing image...");
        let output = self.build_dir.join(&output_name);
        write_atomically(&output, builder.get_disk()?)?;

        let skipped: Vec<String> = builder.skipped().iter().map(|e| e.to_string()).collect();
        for reason in &skipped {
            let _ = progress.send(BuildProgress::Skipped {
                target: target.to_string(),
                reason: reason.clone(),
            });
        }
        let free_blocks = builder.filesystem().free_blocks();
        info!(disk = target, output = %output.display(), free_blocks, "ADF ready");
        Ok(TargetReport {
            output,
            skipped,
            free_blocks,
        })
    }
}

/// 卷名最多 30 个 Latin-1 字符，过长的目标名截断后使用。
fn volume_label(name: &str) -> String {
    if name.chars().count() <= MAX_NAME_LEN {
        return name.to_string();
    }
    let label: String = name.chars().take(MAX_NAME_LEN).collect();
    warn!(name, label = %label, "target name too long for a volume name, truncated");
    label
}

/// 先写到同目录下的临时文件再改名，失败时不会留下半个镜像。
fn write_atomically(output: &Path, bytes: &[u8]) -> Result<()> {
    let dir = output.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let file_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, generate_uuid()));

    let result = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, output));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("build").join("disk.adf");
        write_atomically(&out, b"first").unwrap();
        write_atomically(&out, b"second").unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"second");
        let leftovers: Vec<_> = fs::read_dir(out.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    fn write_blank_template(dir: &Path) {
        let disk = crate::fs::format::format(&Default::default()).unwrap();
        fs::write(dir.join("blank.adf"), disk.as_bytes()).unwrap();
    }

    #[test]
    fn targets_sharing_an_output_file_fail_after_the_first() {
        let dir = tempfile::tempdir().unwrap();
        write_blank_template(dir.path());
        fs::write(dir.path().join("one.txt"), "1").unwrap();
        fs::write(dir.path().join("two.txt"), "2").unwrap();
        let config = PackagingConfig::from_json(
            r#"{ "supports": [
                { "supportName": "Same", "filesToIncludeOnRoot": ["one.txt"] },
                { "supportName": "Other", "outputName": "same.ADF", "filesToIncludeOnRoot": ["two.txt"] }
            ] }"#,
        )
        .unwrap();
        let job = PackagingJob {
            project_dir: dir.path().to_path_buf(),
            build_dir: dir.path().join("build"),
            resources: Resources::new(dir.path()),
            config,
        };
        let (tx, _rx) = mpsc::channel();
        let outcomes = job.run(&tx);

        assert_eq!(outcomes.len(), 2);
        let first = outcomes[0].result.as_ref().unwrap();
        assert!(matches!(
            &outcomes[1].result,
            Err(AdfError::DuplicateOutput(name)) if name == "same.ADF"
        ));

        let bytes = fs::read(&first.output).unwrap();
        let fs_view = crate::fs::FileSystem::mount(
            crate::disk::DiskImage::from_bytes(bytes).unwrap(),
        )
        .unwrap();
        assert!(fs_view.resolve("one.txt").unwrap().is_some());
        assert!(fs_view.resolve("two.txt").unwrap().is_none());
    }

    #[test]
    fn long_target_name_is_truncated_for_the_volume() {
        let dir = tempfile::tempdir().unwrap();
        write_blank_template(dir.path());
        let config = PackagingConfig::from_json(
            r#"{ "supports": [ { "supportName": "My Really Long Game Title Disk One" } ] }"#,
        )
        .unwrap();
        let job = PackagingJob {
            project_dir: dir.path().to_path_buf(),
            build_dir: dir.path().join("build"),
            resources: Resources::new(dir.path()),
            config,
        };
        let (tx, _rx) = mpsc::channel();
        let outcomes = job.run(&tx);
        let report = outcomes[0].result.as_ref().unwrap();
        assert!(report
            .output
            .ends_with("My Really Long Game Title Disk One.adf"));

        let fs_view = crate::fs::FileSystem::mount(
            crate::disk::DiskImage::load(&report.output).unwrap(),
        )
        .unwrap();
        assert_eq!(fs_view.volume_name().unwrap(), "My Really Long Game Title Disk");
        assert_eq!(volume_label("Short"), "Short");
    }

    #[test]
    fn output_name_must_be_plain_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = PackagingConfig::from_json(
            r#"{ "supports": [ { "supportName": "X", "outputName": "../escape.adf" } ] }"#,
        )
        .unwrap();
        let job = PackagingJob {
            project_dir: dir.path().to_path_buf(),
            build_dir: dir.path().join("build"),
            resources: Resources::new(dir.path()),
            config,
        };
        let (tx, _rx) = mpsc::channel();
        let outcomes = job.run(&tx);
        assert!(matches!(
            outcomes[0].result,
            Err(AdfError::InvalidName(_))
        ));
    }
}
