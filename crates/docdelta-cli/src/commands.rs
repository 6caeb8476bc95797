use std::fs;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use tracing::debug;

use docdelta_diff::{Diff, Differ, ListDiff, ListKey, ObjectDiff};
use docdelta_expr::{apply_operators, apply_pipeline};
use docdelta_types::{DiffConfig, Document};
use docdelta_update::UpdateGenerator;

use crate::cli::*;
use crate::config;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = config::load(cli.config.as_deref(), cli.identity_field.as_deref())?;
    debug!(identity_field = %config.identity_field, "loaded configuration");
    match cli.command {
        Command::Diff(args) => cmd_diff(&config, &cli.format, args),
        Command::Update(args) => cmd_update(&config, &cli.format, args),
        Command::Apply(args) => cmd_apply(&config, &cli.format, args),
    }
}

fn read_document(path: &Path) -> anyhow::Result<Document> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Document::from_json(json).with_context(|| format!("loading {}", path.display()))
}

fn read_snapshots(snapshots: &Snapshots) -> anyhow::Result<(Document, Document)> {
    Ok((read_document(&snapshots.old)?, read_document(&snapshots.new)?))
}

fn object_diff(config: &DiffConfig, old: &Document, new: &Document) -> ObjectDiff {
    match Differ::new(config.clone()).diff_documents(old, new) {
        Diff::Object(diff) => diff,
        _ => ObjectDiff::default(),
    }
}

fn print_json(format: &OutputFormat, json: &serde_json::Value) -> anyhow::Result<()> {
    let text = match format {
        OutputFormat::Text => serde_json::to_string_pretty(json)?,
        OutputFormat::Json => serde_json::to_string(json)?,
    };
    println!("{text}");
    Ok(())
}

fn cmd_diff(config: &DiffConfig, format: &OutputFormat, args: DiffArgs) -> anyhow::Result<()> {
    let (old, new) = read_snapshots(&args.snapshots)?;
    let diff = object_diff(config, &old, &new);

    if *format == OutputFormat::Json {
        return print_json(format, &serde_json::to_value(Diff::Object(diff))?);
    }
    if diff.is_empty() {
        println!("No changes.");
        return Ok(());
    }
    print_object(&diff, 0);
    println!(
        "\n{} change(s): {} added, {} changed, {} removed",
        diff.change_count().to_string().bold(),
        diff.additions().to_string().green(),
        diff.modifications().to_string().yellow(),
        diff.removals().to_string().red(),
    );
    Ok(())
}

fn cmd_update(config: &DiffConfig, format: &OutputFormat, args: UpdateArgs) -> anyhow::Result<()> {
    let (old, new) = read_snapshots(&args.snapshots)?;
    let diff = object_diff(config, &old, &new);
    let generator = UpdateGenerator::new(config.clone());

    let json = if args.operators {
        generator
            .generate_operator_update(&diff)
            .context("compiling operator update")?
            .to_json()
    } else {
        generator
            .generate_update_pipeline(&diff)
            .context("compiling update pipeline")?
            .to_json()
    };
    print_json(format, &json)
}

fn cmd_apply(config: &DiffConfig, format: &OutputFormat, args: ApplyArgs) -> anyhow::Result<()> {
    let (old, new) = read_snapshots(&args.snapshots)?;
    let current = match &args.current {
        Some(path) => read_document(path)?,
        None => old.clone(),
    };
    let diff = object_diff(config, &old, &new);
    let generator = UpdateGenerator::new(config.clone());

    let result = if args.operators {
        let update = generator
            .generate_operator_update(&diff)
            .context("compiling operator update")?;
        apply_operators(&update, &current).context("applying operator update")?
    } else {
        let pipeline = generator
            .generate_update_pipeline(&diff)
            .context("compiling update pipeline")?;
        apply_pipeline(&pipeline, &current).context("applying update pipeline")?
    };
    let matches = result == new.compacted();

    match format {
        OutputFormat::Json => print_json(
            format,
            &serde_json::json!({ "result": result, "matches_new": matches }),
        ),
        OutputFormat::Text => {
            print_json(format, &serde_json::to_value(&result)?)?;
            if matches {
                println!("{} Result matches NEW", "✓".green().bold());
            } else {
                println!("{} Result differs from NEW", "✗".yellow().bold());
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

fn print_object(diff: &ObjectDiff, depth: usize) {
    let indent = "  ".repeat(depth);
    for (key, value) in &diff.added {
        println!("{indent}{} {}: {}", "+".green(), key.bold(), value.to_string().green());
    }
    for key in &diff.removed {
        println!("{indent}{} {}", "-".red(), key.bold());
    }
    for (key, change) in &diff.changed {
        print_change(&key.bold().to_string(), change, depth);
    }
}

fn print_list(diff: &ListDiff, depth: usize) {
    let indent = "  ".repeat(depth);
    for (position, value) in &diff.added {
        println!("{indent}{} [{position}]: {}", "+".green(), value.to_string().green());
    }
    for key in &diff.removed {
        match key {
            ListKey::Position(position) => println!("{indent}{} [{position}]", "-".red()),
            ListKey::Conditional(conditional) => {
                println!("{indent}{} [id {}]", "-".red(), conditional.identifier.to_string().cyan())
            }
        }
    }
    for (position, change) in &diff.changed {
        print_change(&format!("[{position}]"), change, depth);
    }
}

fn print_change(label: &str, change: &Diff, depth: usize) {
    let indent = "  ".repeat(depth);
    match change {
        Diff::Empty => {}
        Diff::Value(value) => {
            println!("{indent}{} {label}: {}", "~".yellow(), value.to_string().yellow())
        }
        Diff::Object(object) => {
            println!("{indent}{} {label}", "~".yellow());
            print_object(object, depth + 1);
        }
        Diff::List(list) => {
            println!("{indent}{} {label}", "~".yellow());
            print_list(list, depth + 1);
        }
        Diff::Conditional(conditional) => {
            let label = format!("{label} (id {})", conditional.identifier.to_string().cyan());
            match conditional.diff.as_deref() {
                Some(inner) => print_change(&label, inner, depth),
                None => println!("{indent}{} {label}", "-".red()),
            }
        }
    }
}
