use std::{collections::HashMap, sync::mpsc::Receiver, time::Duration};

use colored::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// 构建线程发给渲染线程的进度事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildProgress {
    Started { target: String },
    Step { target: String, message: String },
    Skipped { target: String, reason: String },
    Finished { target: String, error: Option<String> },
}

/// 在终端上为每个目标显示一个进度指示器，直到所有发送端关闭。
pub fn render(rx: Receiver<BuildProgress>) {
    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();

    for event in rx {
        match event {
            BuildProgress::Started { target } => {
                let pb = multi.add(ProgressBar::new_spinner());
                pb.set_style(style.clone());
                pb.set_prefix(target.clone());
                pb.set_message("🧠 starting...");
                pb.enable_steady_tick(Duration::from_millis(80));
                bars.insert(target, pb);
            }
            BuildProgress::Step { target, message } => {
                if let Some(pb) = bars.get(&target) {
                    pb.set_message(message);
                }
            }
            BuildProgress::Skipped { target, reason } => {
                let _ = multi.println(format!(
                    "{} {}: {}",
                    "⚠️  skipped".yellow(),
                    target.bold(),
                    reason
                ));
            }
            BuildProgress::Finished { target, error } => {
                if let Some(pb) = bars.remove(&target) {
                    match error {
                        None => pb.finish_with_message("✅ done".green().to_string()),
                        Some(e) => pb.finish_with_message(format!("{} {}", "❌".red(), e)),
                    }
                }
            }
        }
    }
}
