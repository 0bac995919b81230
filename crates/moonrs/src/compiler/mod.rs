// Front end: source text -> positioned AST
// The parser keeps going after errors where it can; execution is only
// attempted when the collector holds no errors.

pub mod ast;
pub mod ast_display;
pub mod parser;

use std::sync::Arc;

use crate::compiler::ast::Block;
use crate::diagnostics::{Diagnostic, DiagnosticCollector};
use parser::LuaParser;

/// A compiled source unit: the chunk body plus its label.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub block: Arc<Block>,
    pub name: Arc<str>,
}

pub struct Compiler;

impl Compiler {
    /// Parse `source` into a chunk, or return every diagnostic found.
    pub fn compile(source: &str, chunk_name: &str) -> Result<Chunk, Vec<Diagnostic>> {
        let collector = DiagnosticCollector::new();
        let chunk = Self::compile_with(source, chunk_name, &collector);
        if collector.has_errors() {
            Err(collector.into_diagnostics())
        } else {
            Ok(chunk)
        }
    }

    /// Parse into `collector`; the returned chunk is meaningful only when
    /// no errors were reported.
    pub fn compile_with(
        source: &str,
        chunk_name: &str,
        collector: &DiagnosticCollector,
    ) -> Chunk {
        let text = normalize_source(source);
        let name: Arc<str> = Arc::from(chunk_name);
        let block = LuaParser::new(text, name.clone(), collector).parse_chunk();
        Chunk {
            block: Arc::new(block),
            name,
        }
    }
}

/// Skip an optional UTF-8 BOM. Line endings are handled by the lexer.
fn normalize_source(source: &str) -> &str {
    source.strip_prefix('\u{FEFF}').unwrap_or(source)
}
