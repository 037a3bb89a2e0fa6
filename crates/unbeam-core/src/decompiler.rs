//! Whole-module decompilation
//!
//! Reconstructs `defmodule` source from compiler debug info: every
//! definition in source-line order, heads built from the recorded kind
//! (never inferred from names), guards re-expressed through the primitive
//! rewrites, bodies rendered and re-indented.

use tracing::debug;

use crate::beam::BeamFile;
use crate::debug_info::{Clause, DebugInfo, Definition};
use crate::render::{self, format, inspect, RenderError};
use crate::rewrite;

/// Decompile a parsed `.beam` file to Elixir source.
pub fn decompile(beam: &BeamFile) -> crate::Result<String> {
    let term = beam.debug_info_term()?;
    let info = DebugInfo::from_term(&term)?;

    Ok(decompile_debug_info(&info)?)
}

/// Decompile unpacked debug info to Elixir source.
pub fn decompile_debug_info(info: &DebugInfo) -> Result<String, RenderError> {
    debug!(module = %info.module, definitions = info.definitions.len(), "decompiling");

    let mut ordered: Vec<&Definition> = info.definitions.iter().collect();
    ordered.sort_by_key(|definition| definition.line.unwrap_or(i64::MAX));

    let mut blocks = Vec::with_capacity(ordered.len());
    for definition in ordered {
        blocks.push(definition_source(definition)?);
    }

    let mut source = format!("defmodule {} do\n", inspect::inspect_atom(&info.module));
    if !blocks.is_empty() {
        source.push_str(&format::indent(&blocks.join("\n\n"), 2));
        source.push('\n');
    }
    source.push_str("end\n");

    Ok(source)
}

/// Source text of a single definition, every clause as its own block.
pub fn definition_source(definition: &Definition) -> Result<String, RenderError> {
    let mut clauses = Vec::with_capacity(definition.clauses.len());

    for clause in &definition.clauses {
        clauses.push(clause_source(definition, clause)?);
    }

    if clauses.is_empty() {
        // a bodiless definition still gets a head
        return Ok(format!(
            "{} {}({})",
            definition.kind.keyword(),
            render::identifier::inspect_as_function(&definition.name, true),
            placeholder_arguments(definition.arity)
        ));
    }

    Ok(clauses.join("\n\n"))
}

fn clause_source(definition: &Definition, clause: &Clause) -> Result<String, RenderError> {
    let arguments = clause
        .args
        .iter()
        .map(render::render)
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");

    let mut head = format!(
        "{} {}({arguments})",
        definition.kind.keyword(),
        render::identifier::inspect_as_function(&definition.name, true)
    );

    for guard in &clause.guards {
        let rewritten = rewrite::rewrite_guard(guard)?;
        head.push_str(" when ");
        head.push_str(&render::render(&rewritten)?);
    }

    let body = format::indent(&render::render_body(&clause.body)?, 2);

    Ok(format!("{head} do\n{body}\nend"))
}

fn placeholder_arguments(arity: i64) -> String {
    let count = usize::try_from(arity).unwrap_or(0);
    let mut names = Vec::with_capacity(count);
    for index in 0..count {
        names.push(format!("arg{}", index + 1));
    }

    names.join(", ")
}

/// Definitions whose `name` (and optionally `arity`) match, for selective
/// decompilation.
pub fn matching_definitions<'a>(
    info: &'a DebugInfo,
    name: &str,
    arity: Option<i64>,
) -> Vec<&'a Definition> {
    info.definitions
        .iter()
        .filter(|definition| {
            definition.name == name && arity.map(|arity| definition.arity == arity).unwrap_or(true)
        })
        .collect()
}

/// Convenience wrapper for callers holding raw bytes.
pub fn decompile_bytes(bytes: &[u8]) -> crate::Result<String> {
    decompile(&BeamFile::parse(bytes)?)
}
