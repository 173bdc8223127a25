//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use console::{Style, Term};
use kiln_ops::OperationResult;
use kiln_types::{BuildReport, ColorChoice, InstallReport};
use std::io;
use std::path::Path;

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format
    json_output: bool,
    color_choice: ColorChoice,
    term: Term,
}

impl OutputRenderer {
    pub fn new(json_output: bool, color_choice: ColorChoice) -> Self {
        Self {
            json_output,
            color_choice,
            term: Term::stdout(),
        }
    }

    /// Render operation result
    pub fn render_result(&self, result: &OperationResult) -> io::Result<()> {
        if self.json_output {
            let json = result.to_json().map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match result {
            OperationResult::BuildReport(report) => {
                self.render_build_report(report);
                Ok(())
            }
            OperationResult::InstallReport(report) => {
                self.render_install_report(report);
                Ok(())
            }
            OperationResult::ManifestUpdated {
                path,
                runtime,
                build,
            } => {
                self.render_manifest(path, runtime, build);
                Ok(())
            }
        }
    }

    fn render_build_report(&self, report: &BuildReport) {
        let artifact = &report.artifact;
        println!("Build Summary");
        println!();
        println!(
            "Package:  {} {}",
            self.style_package_name(&artifact.package.name),
            artifact.package.version
        );
        println!("Build:    {}", artifact.build);
        println!("Platform: {}", artifact.platform);
        println!("Backend:  {}", report.backend);
        println!("Output:   {}", artifact.path.display());
        println!("BLAKE3:   {}", artifact.hash);
        println!("Duration: {}ms", report.duration_ms);
    }

    fn render_install_report(&self, report: &InstallReport) {
        if report.is_noop() {
            println!(
                "Environment already up to date ({}).",
                report.env_root.display()
            );
            return;
        }

        println!("Installation Summary");
        println!();

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Package").add_attribute(Attribute::Bold),
                Cell::new("Version").add_attribute(Attribute::Bold),
                Cell::new("Build").add_attribute(Attribute::Bold),
                Cell::new("Files").add_attribute(Attribute::Bold),
                Cell::new("Status").add_attribute(Attribute::Bold),
            ]);

        for record in &report.records {
            let id = record.package_id();
            let status = if report.replaced.iter().any(|old| old.name == record.name) {
                "updated"
            } else if report.installed.contains(&id) {
                "installed"
            } else {
                "kept"
            };
            table.add_row(vec![
                Cell::new(self.style_package_name(&record.name)),
                Cell::new(record.version.to_string()),
                Cell::new(&record.build),
                Cell::new(record.files.len()),
                Cell::new(status),
            ]);
        }
        println!("{table}");
        println!();
        println!("Environment: {}", report.env_root.display());
        println!("Completed in {}ms", report.duration_ms);
    }

    fn render_manifest(&self, path: &Path, runtime: &[String], build: &[String]) {
        println!("Updated {}", path.display());
        if !runtime.is_empty() {
            println!();
            println!("Runtime dependencies:");
            for spec in runtime {
                println!("  • {}", self.style_package_name(spec));
            }
        }
        if !build.is_empty() {
            println!();
            println!("Build dependencies:");
            for spec in build {
                println!("  • {}", self.style_package_name(spec));
            }
        }
    }

    fn style_package_name(&self, name: &str) -> String {
        if self.supports_color() {
            Style::new().bold().apply_to(name).to_string()
        } else {
            name.to_string()
        }
    }

    fn supports_color(&self) -> bool {
        match self.color_choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.term.features().colors_supported(),
        }
    }
}
