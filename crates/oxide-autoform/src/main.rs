//! oxide-autoform CLI
//!
//! Command-line tool for checking form schemas and replaying form input.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_autoform::prelude::*;

/// Schema-driven form engine.
#[derive(Parser)]
#[command(name = "oxide-autoform")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a schema and report every problem found.
    Check {
        /// Path to the JSON form schema.
        #[arg(env = "AUTOFORM_SCHEMA")]
        schema: PathBuf,
    },

    /// Print the fields visible for some form data.
    Visible {
        /// Path to the JSON form schema.
        #[arg(env = "AUTOFORM_SCHEMA")]
        schema: PathBuf,

        /// JSON file with initial form data.
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Apply values in order and print every emitted event as JSON.
    Run {
        /// Path to the JSON form schema.
        #[arg(env = "AUTOFORM_SCHEMA")]
        schema: PathBuf,

        /// JSON file with initial form data.
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Value to set, as NAME=VALUE. VALUE is read as JSON when it
        /// parses, otherwise as a plain string. Repeatable.
        #[arg(short, long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,

        /// Submit the form after applying all values.
        #[arg(long)]
        submit: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Check { schema } => {
            let loaded = ValidatedSchema::load(read_schema(&schema)?)?;
            let order: Vec<_> = loaded.graph().topological_order().collect();
            debug!("evaluation order: {}", order.join(", "));
            info!(
                "{}: schema is valid ({} fields)",
                schema.display(),
                loaded.fields().len()
            );
        }

        Commands::Visible { schema, data } => {
            for name in visible(&schema, data.as_deref())? {
                println!("{name}");
            }
        }

        Commands::Run {
            schema,
            data,
            set,
            submit,
        } => {
            for line in run(&schema, data.as_deref(), &set, submit)? {
                println!("{line}");
            }
        }
    }

    Ok(())
}

/// Names of the fields visible for the given data, in schema order.
fn visible(schema: &Path, data: Option<&Path>) -> anyhow::Result<Vec<String>> {
    let engine = create_engine(read_schema(schema)?, read_data(data)?)?;
    Ok(engine.visible_fields().to_vec())
}

/// Applies `assignments` in order, optionally submits, and returns every
/// emitted event as one JSON line.
fn run(
    schema: &Path,
    data: Option<&Path>,
    assignments: &[String],
    submit: bool,
) -> anyhow::Result<Vec<String>> {
    let loaded = Arc::new(ValidatedSchema::load(read_schema(schema)?)?);
    let mut engine = FormEngine::new(loaded, read_data(data)?);

    let emitted = Rc::new(RefCell::new(Vec::new()));
    let _subscriptions: Vec<Subscription> =
        [EventKind::Change, EventKind::Validation, EventKind::Submit]
            .into_iter()
            .map(|kind| {
                let sink = Rc::clone(&emitted);
                engine.on(kind, move |event| sink.borrow_mut().push(event.clone()))
            })
            .collect();

    for assignment in assignments {
        let (name, value) = parse_assignment(assignment)?;
        debug!("setting {name}");
        engine.set_value(&name, value)?;
    }

    if submit {
        let outcome = engine.submit()?;
        if !outcome.is_submitted() {
            info!("form is invalid; nothing submitted");
        }
    }

    let lines = emitted
        .borrow()
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<_, _>>()?;
    Ok(lines)
}

fn read_schema(path: &Path) -> anyhow::Result<FormSchema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    FormSchema::from_json(&text)
        .with_context(|| format!("failed to parse schema {}", path.display()))
}

fn read_data(path: Option<&Path>) -> anyhow::Result<Option<FormData>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read form data {}", path.display()))?;
    let data = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse form data {}", path.display()))?;
    Ok(Some(data))
}

fn parse_assignment(assignment: &str) -> anyhow::Result<(String, FieldValue)> {
    let (name, raw) = assignment
        .split_once('=')
        .with_context(|| format!("expected NAME=VALUE, got '{assignment}'"))?;
    if name.is_empty() {
        anyhow::bail!("missing field name in '{assignment}'");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| FieldValue::from(raw));
    Ok((name.to_string(), value))
}
