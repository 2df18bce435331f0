//! Command-line interface for epubcfi
//!
//! Usage:
//!   epubcfi parse `<cfi>`                       - Dump the parsed form as JSON
//!   epubcfi compare `<a>` `<b>`                 - Print the reading order of two CFIs
//!   epubcfi sort `<cfi>`...                     - Print CFIs in reading order
//!   epubcfi escape `<text>`                     - Escape reserved characters
//!   epubcfi resolve `<file>` `<cfi>`            - Resolve the last Part against a document
//!   epubcfi generate `<file>` --id `<id>`       - Generate a CFI for an element

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epubcfi::cfi::{self, Cfi, RelativeToNode, ResolvedLocation};
use epubcfi::config::Config;
use epubcfi::{DocumentTree, Resolved, Tree};

#[derive(Parser)]
#[command(name = "epubcfi", version, about = "Parse, resolve and generate EPUB CFIs")]
struct Cli {
    /// Collapse ranges into their start location
    #[arg(long, global = true)]
    flatten_range: bool,

    /// Allow qualifiers on non-terminal steps
    #[arg(long, global = true)]
    lenient: bool,

    /// Resolve by index only, ignoring ID assertions
    #[arg(long, global = true)]
    ignore_ids: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dump the parsed form of a CFI as JSON
    Parse { cfi: String },
    /// Compare two CFIs in reading order
    Compare { a: String, b: String },
    /// Sort CFIs in reading order
    Sort {
        #[arg(required = true)]
        cfis: Vec<String>,
    },
    /// Escape reserved characters for use inside a CFI
    Escape { text: String },
    /// Resolve the last Part of a CFI against an XML document
    Resolve { file: PathBuf, cfi: String },
    /// Generate a CFI for the element carrying an ID
    Generate {
        file: PathBuf,
        #[arg(long)]
        id: String,
        /// Character offset into the element's first text node
        #[arg(long)]
        offset: Option<u32>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.log.as_str().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if cli.flatten_range {
        config.parse.flatten_range = true;
    }
    if cli.lenient {
        config.parse.stricter = false;
    }
    if cli.ignore_ids {
        config.resolve.ignore_ids = true;
    }
    tracing::debug!(?config, "Loaded configuration");

    match cli.command {
        Command::Parse { cfi } => {
            let cfi = Cfi::parse_with(&cfi, config.parse)?;
            println!("{}", serde_json::to_string_pretty(&cfi)?);
        }
        Command::Compare { a, b } => {
            let a = Cfi::parse_with(&a, config.parse)?;
            let b = Cfi::parse_with(&b, config.parse)?;
            let order = match a.compare(&b) {
                Ordering::Less => "before",
                Ordering::Equal => "equal",
                Ordering::Greater => "after",
            };
            println!("{}", order);
        }
        Command::Sort { cfis } => {
            let mut parsed = cfis
                .iter()
                .map(|s| cfi::parse_with(s, config.parse))
                .collect::<Result<Vec<_>, _>>()?;
            cfi::sort(&mut parsed);
            for cfi in parsed {
                println!("{}", cfi);
            }
        }
        Command::Escape { text } => println!("{}", cfi::escape(&text)),
        Command::Resolve { file, cfi } => {
            let tree = load_tree(&file)?;
            let cfi = Cfi::parse_with(&cfi, config.parse)?;
            match cfi.resolve_last(&tree, &config.resolve)? {
                Resolved::Location(loc) => println!("{}", describe(&tree, &loc)),
                Resolved::Range { from, to } => {
                    println!("from: {}", describe(&tree, &from));
                    println!("to:   {}", describe(&tree, &to));
                }
                Resolved::NativeRange(range) => println!("{:?}", range),
            }
        }
        Command::Generate { file, id, offset } => {
            let tree = load_tree(&file)?;
            let Some(element) = tree.element_by_id(&id) else {
                bail!("no element with id '{}' in {}", id, file.display());
            };
            let (node, offset) = match offset {
                Some(offset) if !tree.has_tag(element, "img") => {
                    let text = tree
                        .children(element)
                        .into_iter()
                        .find(|&child| tree.is_text_like(child))
                        .with_context(|| format!("element '{}' has no text to offset into", id))?;
                    (text, Some(offset))
                }
                offset => (element, offset),
            };
            println!("{}", cfi::generate(&tree, node, offset)?);
        }
    }

    Ok(())
}

fn load_tree(file: &Path) -> anyhow::Result<Tree> {
    let xml = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    Tree::parse(&xml).with_context(|| format!("parsing {}", file.display()))
}

fn describe(tree: &Tree, loc: &ResolvedLocation<<Tree as DocumentTree>::Node>) -> String {
    let mut out = match (tree.tag_name(loc.node), tree.text(loc.node)) {
        (Some(tag), _) => format!("<{}>", tag),
        (None, Some(text)) => format!("{:?}", text),
        (None, None) => format!("{:?}", loc.node),
    };
    match loc.relative_to_node {
        Some(RelativeToNode::Before) => out = format!("before {}", out),
        Some(RelativeToNode::After) => out = format!("after {}", out),
        None => {}
    }
    if let Some(offset) = loc.offset {
        out.push_str(&format!(" offset {}", offset));
    }
    out
}
