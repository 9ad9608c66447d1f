use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use rust_edm::metadata::{DataSpace, EntityContainer, GlobalItem};
use rust_edm::writer::{write_schema, CsdlXmlWriter};
use rust_edm::{load_workspace, LoadOptions, MetadataWorkspace};

const SQL_CLIENT_PROVIDER: &str = "System.Data.SqlClient";

#[derive(Parser)]
#[command(name = "rust-edm")]
#[command(author, version, about = "Load and inspect entity data model metadata projects")]
struct Cli {
    /// Log at debug level unless RUST_EDM_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Space {
    Conceptual,
    Storage,
}

impl Space {
    fn data_space(self) -> DataSpace {
        match self {
            Space::Conceptual => DataSpace::CSpace,
            Space::Storage => DataSpace::SSpace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load a .edmproj file and summarize its metadata
    Inspect {
        /// Path to the .edmproj file
        #[arg(short, long)]
        project: PathBuf,

        /// Keep loading when documents record schema errors
        #[arg(long)]
        allow_errors: bool,
    },
    /// Write one namespace of a loaded project as schema XML
    WriteCsdl {
        /// Path to the .edmproj file
        #[arg(short, long)]
        project: PathBuf,

        /// Namespace to write (defaults to the first one found)
        #[arg(short, long)]
        namespace: Option<String>,

        /// Which space to write
        #[arg(short, long, value_enum, default_value = "conceptual")]
        space: Space,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_env("RUST_EDM_LOG")
        .unwrap_or_else(|_| if verbose { "debug" } else { "warn" }.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Inspect {
            project,
            allow_errors,
        } => {
            let workspace = load_workspace(LoadOptions {
                project_path: project,
                throw_on_error: allow_errors.then_some(false),
                verbose: cli.verbose,
            })?;
            print_summary(&workspace)?;
        }
        Commands::WriteCsdl {
            project,
            namespace,
            space,
            output,
        } => {
            let workspace = load_workspace(LoadOptions {
                project_path: project,
                throw_on_error: None,
                verbose: cli.verbose,
            })?;
            let xml = render_schema(&workspace, namespace.as_deref(), space)?;
            match output {
                Some(path) => std::fs::write(&path, xml)?,
                None => print!("{}", String::from_utf8_lossy(&xml)),
            }
        }
    }

    Ok(())
}

fn print_summary(workspace: &MetadataWorkspace) -> Result<()> {
    println!("Workspace {}", workspace.id());
    match workspace.schema_version() {
        Some(version) => println!("Schema version: {:.1}", version),
        None => println!("Schema version: (none)"),
    }

    for (label, space) in [
        ("Conceptual", DataSpace::CSpace),
        ("Storage", DataSpace::SSpace),
        ("Object", DataSpace::OSpace),
    ] {
        if workspace.try_get_item_collection(space)?.is_none() {
            continue;
        }
        let counts = count_items(workspace, space)?;
        println!(
            "{}: {} entity types, {} complex types, {} enum types, {} associations, {} functions",
            label, counts[0], counts[1], counts[2], counts[3], counts[4]
        );
        for container in workspace.get_items::<EntityContainer>(space)?.iter() {
            println!(
                "  container {}: {} entity sets, {} association sets",
                container.name(),
                container.entity_sets().count(),
                container.association_sets().count()
            );
        }
    }

    if let Some(hash) = workspace.get_mapping_hash()? {
        println!("Mapping hash: {}", hash);
    }
    Ok(())
}

fn count_items(workspace: &MetadataWorkspace, space: DataSpace) -> Result<[usize; 5]> {
    let mut counts = [0usize; 5];
    for namespace in namespaces(workspace, space)? {
        for item in namespace.1 {
            let slot = match item {
                GlobalItem::EntityType(_) => 0,
                GlobalItem::ComplexType(_) => 1,
                GlobalItem::EnumType(_) => 2,
                GlobalItem::AssociationType(_) => 3,
                GlobalItem::Function(_) => 4,
                _ => continue,
            };
            counts[slot] += 1;
        }
    }
    Ok(counts)
}

/// Non-primitive items of `space`, grouped by namespace in name order.
fn namespaces(workspace: &MetadataWorkspace, space: DataSpace) -> Result<Vec<(String, Vec<GlobalItem>)>> {
    let mut grouped: Vec<(String, Vec<GlobalItem>)> = Vec::new();
    for item in workspace.all_items(space)? {
        match &item {
            GlobalItem::PrimitiveType(_) => continue,
            GlobalItem::Function(f) if f.is_from_provider_manifest() => continue,
            _ => {}
        }
        let Some(namespace) = item.namespace_name().map(str::to_string) else {
            continue;
        };
        match grouped.iter_mut().find(|(name, _)| *name == namespace) {
            Some((_, items)) => items.push(item),
            None => grouped.push((namespace, vec![item])),
        }
    }
    grouped.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(grouped)
}

fn render_schema(workspace: &MetadataWorkspace, namespace: Option<&str>, space: Space) -> Result<Vec<u8>> {
    let data_space = space.data_space();
    let namespace = match namespace {
        Some(namespace) => namespace.to_string(),
        None => match namespaces(workspace, data_space)?.into_iter().next() {
            Some((name, _)) => name,
            None => bail!("the {} space has no namespaces to write", data_space),
        },
    };
    let version = workspace
        .schema_version()
        .unwrap_or(MetadataWorkspace::maximum_edm_version_supported());

    let mut writer = CsdlXmlWriter::new(Vec::new());
    match space {
        Space::Conceptual => {
            let Some(edm) = workspace.edm_collection()? else {
                bail!("the project has no conceptual documents");
            };
            write_schema(edm.items(), &namespace, version, &mut writer)?;
        }
        Space::Storage => {
            let Some(store) = workspace.store_collection()? else {
                bail!("the project has no storage documents");
            };
            writer = writer.with_provider(SQL_CLIENT_PROVIDER, store.manifest().manifest_token());
            write_schema(store.items(), &namespace, version, &mut writer)?;
        }
    }
    Ok(writer.into_inner())
}
