use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ironbase_regex::value_utils::set_nested_value;
use ironbase_regex::{log_error, log_info};
use ironbase_regex::{LogLevel, PatternCache, RegexConfig, RegexExpression};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ironregex")]
#[command(about = "IronBase regex CLI - evaluate $regexFind / $regexFindAll / $regexMatch")]
#[command(version)]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a regex expression against every document of a file
    Eval {
        /// Expression, e.g. '{"$regexFind": {"input": "$name", "regex": "^A"}}'
        #[arg(long)]
        expr: String,
        /// Documents: a JSON array or object, or JSON lines (.jsonl)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Field that receives the result
        #[arg(long = "as", default_value = "result")]
        output_field: String,
        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run $regexFind on literal text
    Find {
        /// Pattern, start options included
        #[arg(long)]
        regex: String,
        /// Flags (i, m, s, x)
        #[arg(long)]
        options: Option<String>,
        /// Text to search
        text: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    ironbase_regex::init_from_env();
    if let Some(level) = cli.log_level {
        ironbase_regex::set_log_level(level);
    }

    match cli.command {
        Commands::Eval {
            expr,
            file,
            output_field,
            config,
        } => eval_file(&expr, file.as_deref(), &output_field, config.as_deref()),
        Commands::Find {
            regex,
            options,
            text,
        } => find_text(&regex, options.as_deref(), &text),
    }
}

/// Evaluate `expr` against each document, printing one JSON line per document
fn eval_file(
    expr: &str,
    file: Option<&Path>,
    output_field: &str,
    config: Option<&Path>,
) -> Result<()> {
    let config = match config {
        Some(path) => RegexConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => RegexConfig::from_env().context("Invalid IRONBASE_REGEX_* environment")?,
    };
    let cache = Arc::new(PatternCache::new(config));

    let expr: Value = serde_json::from_str(expr).context("Expression is not valid JSON")?;
    let expression = RegexExpression::from_json_with_cache(&expr, Arc::clone(&cache))?;

    let documents = match file {
        Some(path) => load_documents(path)?,
        None => vec![json!({})],
    };

    let count = documents.len();
    for (i, mut doc) in documents.into_iter().enumerate() {
        let result = match expression.evaluate(&doc) {
            Ok(result) => result,
            Err(err) => {
                log_error!("{} failed on document {}: {}", expression.operator_name(), i, err);
                return Err(err).with_context(|| format!("Document {} failed", i));
            }
        };
        if !doc.is_object() {
            bail!("Document {} is not an object", i);
        }
        set_nested_value(&mut doc, output_field, result);
        println!("{}", serde_json::to_string(&doc)?);
    }

    let stats = cache.stats();
    log_info!(
        "evaluated {} documents ({} patterns compiled, {} cache hits)",
        count,
        stats.misses,
        stats.hits
    );
    Ok(())
}

/// Read a JSON array, a single JSON object, or JSON lines
fn load_documents(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let is_lines = path.extension().map_or(false, |ext| ext == "jsonl");
    if is_lines {
        return content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Invalid JSON on line {} of {}", n + 1, path.display()))
            })
            .collect();
    }

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in file: {}", path.display()))?;
    match value {
        Value::Array(docs) => Ok(docs),
        doc @ Value::Object(_) => Ok(vec![doc]),
        _ => bail!("{} must hold an object or an array of objects", path.display()),
    }
}

fn find_text(regex: &str, options: Option<&str>, text: &str) -> Result<()> {
    let mut spec = json!({"input": text, "regex": regex});
    if let Some(options) = options {
        spec["options"] = json!(options);
    }
    let result = RegexExpression::parse("$regexFind", &spec)?.evaluate(&Value::Null)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
