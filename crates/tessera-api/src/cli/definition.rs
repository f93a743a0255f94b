//! Definition commands: render, describe, check.

use anyhow::{Context, Result};
use console::style;
use tokio::io::AsyncReadExt;

use tessera_core::definition::{
    DefinitionInput, SourceRef, extract_description, to_script_text, to_xml_text,
};
use tessera_types::tree::Node;

use super::OutputFormat;
use crate::state::AppState;

/// Source argument meaning "read the definition from stdin".
const STDIN_SOURCE: &str = "-";

async fn load(state: &AppState, source: &str) -> Result<Node> {
    let source_ref = if source == STDIN_SOURCE {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read definition from stdin")?;
        SourceRef::Input(DefinitionInput::Text(text))
    } else {
        SourceRef::Uri(source.to_string())
    };

    state
        .parser
        .resolve_source(source_ref)
        .await
        .with_context(|| format!("Failed to load definition '{source}'"))
}

/// Render a definition in the requested syntax.
pub async fn render(state: &AppState, source: &str, to: OutputFormat, indent: i32) -> Result<()> {
    let tree = load(state, source).await?;
    let output = render_tree(&tree, to, indent)?;
    println!("{output}");
    Ok(())
}

fn render_tree(tree: &Node, to: OutputFormat, indent: i32) -> Result<String> {
    let output = match to {
        OutputFormat::Json => serde_json::to_string_pretty(tree)?,
        OutputFormat::Yaml => serde_yaml_ng::to_string(tree)?,
        OutputFormat::Script => to_script_text(tree, usize::try_from(indent).unwrap_or(0)),
        OutputFormat::Xml => to_xml_text(tree, indent)?,
    };
    Ok(output)
}

/// Print a summary of a definition.
pub async fn describe(state: &AppState, source: &str, json: bool) -> Result<()> {
    let tree = load(state, source).await?;
    let description = extract_description(&tree);
    let expressions: Vec<&str> = tree
        .child_nodes()
        .filter(|child| child.name != "description")
        .map(|child| child.name.as_str())
        .collect();

    if json {
        let summary = serde_json::json!({
            "root": tree.name,
            "attributes": tree.attributes,
            "description": description,
            "expressions": expressions,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Definition").bold(), style(&tree.name).cyan());
    for (key, value) in &tree.attributes {
        let value = value.as_str().map_or_else(|| value.to_string(), str::to_string);
        println!("  {:<12} {}", style(key).dim(), value);
    }
    if let Some(description) = description {
        println!();
        println!("  {description}");
    }
    println!();
    println!("  {}", style("── Expressions ──").dim());
    if expressions.is_empty() {
        println!("  {}", style("(none)").dim());
    }
    for name in expressions {
        println!("  {name}");
    }
    println!();
    Ok(())
}

/// Parse every source and report which ones fail.
pub async fn check(state: &AppState, sources: &[String], json: bool) -> Result<()> {
    let mut results = Vec::with_capacity(sources.len());
    for source in sources {
        let outcome = state
            .parser
            .resolve_source(SourceRef::Uri(source.clone()))
            .await;
        if let Err(err) = &outcome {
            tracing::debug!(source = %source, error = %err, "definition check failed");
        }
        results.push((source.as_str(), outcome.map_err(|err| err.to_string())));
    }

    let failures = results.iter().filter(|(_, outcome)| outcome.is_err()).count();

    if json {
        let report: Vec<serde_json::Value> = results
            .iter()
            .map(|(source, outcome)| match outcome {
                Ok(tree) => serde_json::json!({"source": source, "ok": true, "root": tree.name}),
                Err(err) => serde_json::json!({"source": source, "ok": false, "error": err}),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (source, outcome) in &results {
            match outcome {
                Ok(_) => println!("  {} {source}", style("✓").green()),
                Err(err) => println!("  {} {source}: {err}", style("✗").red()),
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} definitions failed to parse", results.len());
    }
    Ok(())
}
