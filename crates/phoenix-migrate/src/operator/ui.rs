//! Console output for migration runs.

use console::{style, Style};
use std::path::Path;

use crate::importers::SetupGuide;
use crate::manifest::{Direction, ResultManifest, Stage};
use crate::pipeline::PipelineReport;

/// Console UI handler.
#[derive(Debug, Default)]
pub struct OperatorUi;

impl OperatorUi {
    /// Creates a new UI handler.
    pub fn new() -> Self {
        Self
    }

    /// Prints the run header.
    pub fn print_header(&self, title: &str) {
        let cyan = Style::new().cyan().bold();

        println!();
        println!("{}", cyan.apply_to("═".repeat(63)));
        println!("{}", cyan.apply_to(format!("  {title}")));
        println!("{}", cyan.apply_to("═".repeat(63)));
        println!();
    }

    /// Banner shown before asking whether imported traces are visible.
    pub fn print_ingestion_banner(&self) {
        let yellow = Style::new().yellow().bold();

        println!();
        println!("{}", yellow.apply_to("⏳ Waiting for trace ingestion"));
        println!("┌─────────────────────────────────────────────────────────────┐");
        println!("│ Evaluations attach to spans that must already be indexed.   │");
        println!("│ Open the project in Arize and check that every imported     │");
        println!("│ trace is visible before continuing.                         │");
        println!("└─────────────────────────────────────────────────────────────┘");
    }

    /// Banner shown before asking whether annotation configs exist.
    pub fn print_annotation_config_banner(&self) {
        let yellow = Style::new().yellow().bold();

        println!();
        println!("{}", yellow.apply_to("📝 Annotation configurations required"));
        println!("┌─────────────────────────────────────────────────────────────┐");
        println!("│ Create each annotation configuration listed above in the    │");
        println!("│ Arize UI. Annotations for unknown configs are rejected.     │");
        println!("└─────────────────────────────────────────────────────────────┘");
    }

    /// Prints the annotation configurations to create.
    pub fn print_setup_guide(&self, guide: &SetupGuide) {
        let bold = Style::new().bold();
        let dim = Style::new().dim();

        println!();
        if guide.is_empty() {
            println!("{} No exported annotations found.", style("ℹ").blue());
            return;
        }

        println!(
            "{} {} annotation configs ({} annotations)",
            bold.apply_to("Annotation setup:"),
            guide.configs.len(),
            guide.annotation_count
        );
        for config in &guide.configs {
            println!("   • {} ({})", bold.apply_to(&config.name), config.kind);
            if !config.example_labels.is_empty() {
                println!(
                    "     {} {}",
                    dim.apply_to("labels:  "),
                    config.example_labels.join(", ")
                );
            }
            println!(
                "     {} {}",
                dim.apply_to("projects:"),
                config.projects.join(", ")
            );
        }
    }

    /// Prints the succeeded/failed/skipped stages and the result files.
    pub fn print_summary(&self, report: &PipelineReport, direction: Direction, results_dir: &Path) {
        let green = Style::new().green().bold();
        let red = Style::new().red().bold();
        let bold = Style::new().bold();

        println!();
        if report.is_success() {
            println!("{}", green.apply_to("✅ Migration step complete"));
        } else {
            println!("{}", red.apply_to("❌ Migration step finished with failures"));
        }
        println!();

        if !report.succeeded.is_empty() {
            println!("   {} {}", bold.apply_to("Succeeded:"), report.succeeded.join(", "));
        }
        if !report.skipped.is_empty() {
            println!("   {} {}", style("Skipped:  ").yellow(), report.skipped.join(", "));
        }
        if !report.failed.is_empty() {
            println!("   {} {}", style("Failed:   ").red(), report.failed.join(", "));
        }

        self.print_result_files(direction, results_dir);
    }

    fn print_result_files(&self, direction: Direction, results_dir: &Path) {
        let files: Vec<_> = Stage::ALL
            .iter()
            .map(|stage| ResultManifest::path_in(results_dir, *stage, direction))
            .filter(|path| path.is_file())
            .collect();
        if files.is_empty() {
            return;
        }

        println!();
        println!("{}", Style::new().bold().apply_to("Result files:"));
        for path in files {
            println!("   {}", style(path.display()).dim());
        }
        println!();
    }
}
