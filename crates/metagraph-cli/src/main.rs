//! CLI binary for metagraph: check, inspect and export entity metadata graphs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metagraph_core::config::GraphConfig;
use metagraph_core::graph::EntityGraph;
use metagraph_core::providers::ProviderCache;
use metagraph_core::schema::Schema;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "metagraph", about = "Entity metadata graph builder and validator")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and validate the graph described by a schema document
    Check {
        /// Schema document (JSON)
        schema: PathBuf,

        /// Root entity types (repeatable, added to discovery.roots)
        #[arg(long)]
        root: Vec<String>,
    },

    /// Show the entity types of a validated graph
    Info {
        /// Schema document (JSON)
        schema: PathBuf,

        /// Root entity types (repeatable, added to discovery.roots)
        #[arg(long)]
        root: Vec<String>,

        /// Show details for a single entity type
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,

        /// Print the entity view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the validated graph as JSON
    Export {
        /// Schema document (JSON)
        schema: PathBuf,

        /// Root entity types (repeatable, added to discovery.roots)
        #[arg(long)]
        root: Vec<String>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;

    match cli.command {
        Commands::Check { schema, root } => cmd_check(&project_root, &schema, root),
        Commands::Info {
            schema,
            root,
            type_name,
            json,
        } => cmd_info(&project_root, &schema, root, type_name.as_deref(), json),
        Commands::Export {
            schema,
            root,
            output,
        } => cmd_export(&project_root, &schema, root, output.as_deref()),
    }
}

/// Resolve `path` against the project root unless it is absolute.
fn resolve(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

/// Load config and schema, then build and validate the graph.
fn build_graph(
    project_root: &Path,
    schema_path: &Path,
    roots: Vec<String>,
) -> Result<(EntityGraph<Schema>, GraphConfig)> {
    let config = GraphConfig::load(project_root)?.with_roots(roots);
    if config.discovery.roots.is_empty() {
        anyhow::bail!(
            "no root entity types. Pass --root <TYPE> or set discovery.roots in .metagraph/config.toml"
        );
    }
    tracing::debug!("discovery roots: {}", config.discovery.roots.join(", "));

    let schema = Schema::load(&resolve(project_root, schema_path))?;
    let mut graph = EntityGraph::new(schema, Arc::new(ProviderCache::new()))
        .with_roots(config.discovery.roots.iter().cloned());
    graph.initialize()?;

    let diagnostics = graph.diagnostics();
    if config.discovery.strict && !diagnostics.is_empty() {
        let lines: Vec<String> = diagnostics.iter().map(|d| format!("  {d}")).collect();
        anyhow::bail!(
            "{} entity candidate(s) skipped (strict mode):\n{}",
            diagnostics.len(),
            lines.join("\n")
        );
    }
    Ok((graph, config))
}

fn cmd_check(project_root: &Path, schema: &Path, roots: Vec<String>) -> Result<()> {
    let (graph, _) = build_graph(project_root, schema, roots)?;
    let count = graph.entity_types()?.len();
    for diagnostic in graph.diagnostics() {
        eprintln!("  warning: {diagnostic}");
    }
    println!("OK: {count} entity types validated");
    Ok(())
}

fn cmd_info(
    project_root: &Path,
    schema: &Path,
    roots: Vec<String>,
    type_name: Option<&str>,
    json: bool,
) -> Result<()> {
    let (graph, config) = build_graph(project_root, schema, roots)?;
    let view = graph.view()?;

    let Some(name) = type_name else {
        if json {
            println!("{}", view.to_json(config.output.pretty)?);
            return Ok(());
        }
        println!("Entity types: {}", view.entities.len());
        for entity in &view.entities {
            let marker = if entity.is_abstract { " (abstract)" } else { "" };
            match &entity.base {
                Some(base) => println!("  {}{} : {}", entity.name, marker, base),
                None => println!("  {}{}", entity.name, marker),
            }
        }
        if !view.diagnostics.is_empty() {
            println!("\nSkipped candidates: {}", view.diagnostics.len());
            for diagnostic in &view.diagnostics {
                println!("  {diagnostic}");
            }
        }
        return Ok(());
    };

    let entity = view
        .entity(name)
        .with_context(|| format!("'{name}' is not a registered entity type"))?;
    if json {
        let out = if config.output.pretty {
            serde_json::to_string_pretty(entity)?
        } else {
            serde_json::to_string(entity)?
        };
        println!("{out}");
        return Ok(());
    }

    println!("{}", entity.name);
    println!("Root: {}", entity.root);
    if let Some(base) = &entity.base {
        println!("Base: {base}");
    }
    if !entity.derived.is_empty() {
        println!("Derived: {}", entity.derived.join(", "));
    }
    println!("Keys: {}", entity.keys.join(", "));
    if !entity.known_types.is_empty() {
        println!("Known types: {}", entity.known_types.join(", "));
    }
    if !entity.parent_associations.is_empty() {
        let parents: Vec<String> = entity
            .parent_associations
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("Parent associations: {}", parents.join(", "));
    }
    println!("\nMembers:");
    for member in &entity.members {
        let ty = if member.is_collection {
            format!("[{}]", member.element)
        } else {
            member.ty.clone()
        };
        match &member.association {
            Some(assoc) => println!(
                "  {}: {} -> {}{}",
                member.name,
                ty,
                assoc.name,
                if assoc.foreign_key { " (fk)" } else { "" }
            ),
            None => println!("  {}: {}", member.name, ty),
        }
    }
    Ok(())
}

fn cmd_export(
    project_root: &Path,
    schema: &Path,
    roots: Vec<String>,
    output: Option<&Path>,
) -> Result<()> {
    let (graph, config) = build_graph(project_root, schema, roots)?;
    let view = graph.view()?;

    match output {
        Some(path) => {
            let path = resolve(project_root, path);
            view.save(&path, config.output.pretty)?;
            eprintln!(
                "Exported {} entity types to {}",
                view.entities.len(),
                path.display()
            );
        }
        None => println!("{}", view.to_json(config.output.pretty)?),
    }
    Ok(())
}
