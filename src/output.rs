//! Terminal output for the CLI.

use std::io::{self, Write};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::query::compiler::CompiledQuery;
use crate::tree::{Document, NodeKind};

fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print a compiled query: the rendered form, the facts, and any native
/// sort the engine should apply.
pub fn print_compiled(
    compiled: &CompiledQuery,
    rendered: &str,
    color: bool,
) -> io::Result<()> {
    let mut out = stdout(color);

    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
    writeln!(out, "{rendered}")?;
    out.reset()?;

    let facts = compiled.facts.names();
    if !facts.is_empty() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "facts:")?;
        out.reset()?;
        writeln!(out, " {}", facts.join(", "))?;
    }

    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
    write!(out, "type:")?;
    out.reset()?;
    writeln!(out, " {:?}", compiled.value_type)?;

    if let Some(sort) = &compiled.sort {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "sort:")?;
        out.reset()?;
        writeln!(
            out,
            " {} ({}) {}",
            sort.field,
            sort.field_type,
            if sort.descending { "descending" } else { "ascending" }
        )?;
    }

    Ok(())
}

/// Announce that an expression could not be narrowed by the index.
pub fn print_full_scan(color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
    writeln!(
        out,
        "not translatable: requires a full scan with in-memory evaluation"
    )?;
    out.reset()?;
    Ok(())
}

/// Dump a decoded document as an indented outline.
pub fn print_document_outline(doc: &Document, color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    writeln!(out, "{} nodes", doc.len())?;

    for id in doc.ids() {
        let node = doc.node(id);
        let indent = "  ".repeat(node.depth as usize);
        match &node.kind {
            NodeKind::Document => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
                writeln!(out, "{indent}#document")?;
                out.reset()?;
            }
            NodeKind::Element {
                name, attributes, ..
            } => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
                write!(out, "{indent}{}", name.as_written())?;
                out.reset()?;
                for attr in attributes {
                    write!(out, " {}=\"{}\"", attr.name.as_written(), attr.value)?;
                }
                writeln!(out)?;
            }
            NodeKind::Text { content } => {
                writeln!(out, "{indent}\"{}\"", truncate(content, 60))?;
            }
            NodeKind::Comment { content } => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                writeln!(out, "{indent}<!-- {} -->", truncate(content, 50))?;
                out.reset()?;
            }
            NodeKind::ProcessingInstruction { target, .. } => {
                writeln!(out, "{indent}<?{target}?>")?;
            }
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}
