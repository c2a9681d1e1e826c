use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use xqi::index::IndexConfig;
use xqi::output;
use xqi::query::{parse_query, Bindings, Compiler, Translation};
use xqi::xpath::parse_xpath;

#[derive(Parser)]
#[command(name = "xqi")]
#[command(about = "Translate XPath into full-text index queries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Index configuration file (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Namespace binding, repeatable: prefix=uri
    #[arg(short, long = "binding", global = true)]
    bindings: Vec<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an XPath expression into a search query
    Compile {
        /// The expression, e.g. "//title[contains(., 'Hamlet')]"
        xpath: String,

        /// Emit the XML tree form instead of the query string
        #[arg(long)]
        xml: bool,

        /// Emit the simplified surround grammar instead of the query string
        #[arg(long, conflicts_with = "xml")]
        surround: bool,

        /// Default field for rendering
        #[arg(short, long, default_value = "lux_text")]
        default_field: String,
    },
    /// Parse a query string and show the recognized structure
    Parse {
        /// The query, e.g. "(lux_within:1 big dog)"
        query: String,

        /// Default field for unprefixed terms
        #[arg(short, long, default_value = "lux_text")]
        default_field: String,
    },
    /// Decode a binary tree buffer and dump its structure
    Inspect {
        /// Path to the stored buffer
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<IndexConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => IndexConfig::default(),
    };

    let mut bindings = Bindings::new();
    for raw in &cli.bindings {
        let (prefix, uri) = raw
            .split_once('=')
            .with_context(|| format!("binding '{raw}' is not prefix=uri"))?;
        bindings.bind(prefix, uri);
    }

    let color = !cli.no_color;

    match cli.command {
        Commands::Compile {
            xpath,
            xml,
            surround,
            default_field,
        } => {
            let expr = parse_xpath(&xpath)?;
            let compiler = Compiler::new(&config, &bindings);
            match compiler.compile(&expr)? {
                Translation::FullScan => output::print_full_scan(color)?,
                Translation::Query(compiled) => {
                    let rendered = if xml {
                        compiled.query.to_xml(&default_field)?.to_string()
                    } else if surround {
                        compiled.query.to_surround_string(&default_field)?
                    } else {
                        compiled.query.to_query_string(&default_field)?
                    };
                    output::print_compiled(&compiled, &rendered, color)?;
                }
            }
        }

        Commands::Parse {
            query,
            default_field,
        } => {
            let parsed = parse_query(&query, &config, &bindings, &default_field)?;
            println!("{parsed:#?}");
            println!();
            println!("string: {}", parsed.to_query_string(&default_field)?);
            println!("xml:    {}", parsed.to_xml(&default_field)?);
        }

        Commands::Inspect { file } => {
            let bytes =
                fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let doc = xqi::codec::decode(&bytes)
                .with_context(|| format!("decoding {}", file.display()))?;
            output::print_document_outline(&doc, color)?;
        }
    }

    Ok(())
}
