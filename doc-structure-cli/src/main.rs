//! docstruct - Inspect the chapter structure recovered from a text document

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{DocstructConfig, OutputFormat};
use doc_structure::{
    DocumentStructure, ErrorHandlingStrategy, PatternStrategy, StructureEngine, ValidationReport,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docstruct")]
#[command(about = "Extract and score the chapter structure of a Markdown or plain-text document", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the document
    file: Option<PathBuf>,

    /// Config file (default: ~/.config/cli-programs/docstruct.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Fail on malformed markup instead of recovering
    #[arg(long)]
    strict: bool,

    /// Reject structures whose confidence is below this value (0.0-1.0)
    #[arg(long)]
    threshold: Option<f64>,

    /// Also treat standalone lines like "Chapter 3" as chapter starts
    #[arg(long)]
    patterns: bool,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write a config file with every default spelled out
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    if let Some(Commands::Config { action }) = &args.command {
        return handle_config_command(action, args.config.as_ref());
    }

    let path = args
        .file
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Document path is required. Run 'docstruct --help' for usage."))?;

    let mut config = load_config(args.config.as_ref())?;
    if args.strict {
        config.engine.parse.error_handling_strategy = ErrorHandlingStrategy::Strict;
    }
    if let Some(threshold) = args.threshold {
        config.engine.parse.confidence_threshold = threshold;
    }
    let format = args.format.unwrap_or(config.format);

    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    log::debug!("read {} bytes from {}", text.len(), path.display());

    let mut engine =
        StructureEngine::new(config.engine.clone()).context("Invalid engine configuration")?;
    if args.patterns {
        engine = engine.with_strategy(PatternStrategy::from_config(&config.engine.parse));
    }

    let structure = engine
        .parse(&text)
        .with_context(|| format!("Failed to extract structure from {}", path.display()))?;
    let report = engine.validate(&structure);

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "structure": &structure,
                "report": &report,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Summary => print!("{}", render_summary(&structure, &report)),
    }

    if !report.is_valid {
        anyhow::bail!(
            "Document structure is invalid ({} error(s))",
            report.errors.len()
        );
    }
    Ok(())
}

fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

fn load_config(explicit: Option<&PathBuf>) -> Result<DocstructConfig> {
    match explicit {
        Some(path) => DocstructConfig::load_from(path),
        None => DocstructConfig::load().context("Failed to load configuration"),
    }
}

fn handle_config_command(action: &ConfigAction, explicit: Option<&PathBuf>) -> Result<()> {
    let path = match explicit {
        Some(path) => path.clone(),
        None => DocstructConfig::config_path()?,
    };
    match action {
        ConfigAction::Show => {
            let config = load_config(explicit)?;
            println!("Configuration file: {:?}", path);
            if !path.exists() {
                println!("(file not found, showing defaults)");
            }
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {} (use --force to overwrite)",
                    path.display()
                );
            }
            DocstructConfig::default().save_to(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}

/// Render seconds as `h:mm:ss`, or `m:ss` under an hour.
fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

fn render_summary(doc: &DocumentStructure, report: &ValidationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Title: {}\n", doc.metadata.title));
    out.push_str(&format!(
        "Chapters: {}, Paragraphs: {}, Sentences: {}, Words: {}\n",
        doc.total_chapters, doc.total_paragraphs, doc.total_sentences, doc.metadata.word_count
    ));
    out.push_str(&format!(
        "Estimated narration: {}\n",
        format_duration(doc.estimated_total_duration)
    ));
    out.push_str(&format!("Confidence: {:.3}\n", doc.confidence));

    if !doc.chapters.is_empty() {
        out.push('\n');
    }
    for chapter in &doc.chapters {
        let title = if chapter.has_title() {
            chapter.title.as_str()
        } else {
            "(untitled)"
        };
        out.push_str(&format!(
            "{:>4}. {}{} ({} words, {} paragraphs, {})\n",
            chapter.position + 1,
            "  ".repeat(chapter.depth),
            title,
            chapter.word_count,
            chapter.paragraphs.len(),
            format_duration(chapter.estimated_duration)
        ));
    }

    let issues = &doc.processing_metrics.processing_errors;
    if !issues.is_empty() {
        out.push_str(&format!("\n{} processing issue(s):\n", issues.len()));
        for issue in issues {
            out.push_str(&format!("  - {}\n", issue.message));
        }
    }

    out.push_str(&format!(
        "\nValidation: {} (score {:.2}{})\n",
        if report.is_valid { "valid" } else { "INVALID" },
        report.score,
        if report.needs_manual_review {
            ", needs manual review"
        } else {
            ""
        }
    ));
    for error in &report.errors {
        out.push_str(&format!(
            "  error   {} at {}: {}\n",
            error.code, error.location, error.message
        ));
    }
    for warning in &report.warnings {
        out.push_str(&format!(
            "  warning {} at {}: {}\n",
            warning.code, warning.location, warning.message
        ));
    }
    if !report.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for recommendation in &report.recommendations {
            out.push_str(&format!("  - {}\n", recommendation));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_structure::EngineConfig;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "docstruct",
            "book.md",
            "--format",
            "json",
            "--strict",
            "--threshold",
            "0.4",
        ])
        .unwrap();
        assert_eq!(args.file, Some(PathBuf::from("book.md")));
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert!(args.strict);
        assert_eq!(args.threshold, Some(0.4));
        assert!(!args.patterns);
    }

    #[test]
    fn test_parse_config_subcommand() {
        let args = Args::try_parse_from(["docstruct", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::Config {
                action: ConfigAction::Init { force: true }
            })
        ));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(59.6), "1:00");
        assert_eq!(format_duration(754.0), "12:34");
        assert_eq!(format_duration(3725.0), "1:02:05");
    }

    #[test]
    fn test_render_summary() {
        let engine = StructureEngine::new(EngineConfig::default()).unwrap();
        let doc = engine
            .parse("# My Book\n\n## First\n\nHello world.\n\n##\n\nMore text here.")
            .unwrap();
        let report = engine.validate(&doc);
        let summary = render_summary(&doc, &report);

        assert!(summary.starts_with("Title: My Book\n"));
        assert!(summary.contains("Chapters: 2"));
        assert!(summary.contains("   1. First (2 words"));
        assert!(summary.contains("   2. (untitled)"));
        assert!(summary.contains("warning EMPTY_CHAPTER_TITLE at chapter 1"));
        assert!(summary.contains("Recommendations:"));
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docstruct.toml");

        handle_config_command(&ConfigAction::Init { force: false }, Some(&path)).unwrap();
        let loaded = DocstructConfig::load_from(&path).unwrap();
        assert_eq!(loaded, DocstructConfig::default());

        let err = handle_config_command(&ConfigAction::Init { force: false }, Some(&path));
        assert!(err.is_err());
        handle_config_command(&ConfigAction::Init { force: true }, Some(&path)).unwrap();
    }
}
