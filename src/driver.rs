//! Runs the compiler pipeline over a single source file, stopping at the
//! stage the caller asked for.

use thiserror::Error;
use tracing::info_span;

use crate::{
    backend::js,
    frontend::{
        SourceFile,
        ast::Module,
        lexer::{Span, SyntaxError},
        parser::Parser,
    },
    middle::{
        analyze::{AnalysisError, analyze_module},
        hir::Program,
        optimize::optimize,
    },
};

/// The last stage of the pipeline to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Emit {
    /// The syntax tree
    Parsed,
    /// The validated program, before optimization
    Analyzed,
    /// The validated program, after optimization
    Optimized,
    /// Generated JavaScript
    #[default]
    Js,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub emit: Emit,
    /// Run the optimizer before generating code
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            emit: Emit::default(),
            optimize: true,
        }
    }
}

#[derive(Debug)]
pub enum Artifact<'source> {
    Parsed(Module<'source>),
    Analyzed(Program),
    Optimized(Program),
    JavaScript(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::Syntax(error) => error.span,
            CompileError::Analysis(error) => error.span,
        }
    }
}

pub fn compile<'source>(
    source: &'source SourceFile,
    options: &CompileOptions,
) -> Result<Artifact<'source>, CompileError> {
    let module = info_span!("pipeline.parse").in_scope(|| Parser::parse_module(source))?;

    if options.emit == Emit::Parsed {
        return Ok(Artifact::Parsed(module));
    }

    let program = info_span!("pipeline.analyze").in_scope(|| analyze_module(&module))?;

    if options.emit == Emit::Analyzed {
        return Ok(Artifact::Analyzed(program));
    }

    let program = if options.optimize || options.emit == Emit::Optimized {
        info_span!("pipeline.optimize").in_scope(|| optimize(program))
    } else {
        program
    };

    if options.emit == Emit::Optimized {
        return Ok(Artifact::Optimized(program));
    }

    let output = info_span!("pipeline.generate").in_scope(|| js::generate(&program));

    Ok(Artifact::JavaScript(output))
}

/// Compiles `source` all the way to JavaScript
pub fn compile_to_js(source: &SourceFile, optimize: bool) -> Result<String, CompileError> {
    let options = CompileOptions {
        emit: Emit::Js,
        optimize,
    };

    match compile(source, &options)? {
        Artifact::JavaScript(output) => Ok(output),
        Artifact::Parsed(_) | Artifact::Analyzed(_) | Artifact::Optimized(_) => {
            unreachable!("emitting js always runs the generator")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_the_requested_stage() {
        let source = SourceFile::from_memory("const x = 1 + 2;");

        let parsed = compile(
            &source,
            &CompileOptions {
                emit: Emit::Parsed,
                optimize: true,
            },
        )
        .unwrap();
        assert!(matches!(parsed, Artifact::Parsed(_)));

        let analyzed = compile(
            &source,
            &CompileOptions {
                emit: Emit::Analyzed,
                optimize: true,
            },
        )
        .unwrap();
        assert!(matches!(analyzed, Artifact::Analyzed(_)));

        let optimized = compile(
            &source,
            &CompileOptions {
                emit: Emit::Optimized,
                optimize: false,
            },
        )
        .unwrap();
        assert!(matches!(optimized, Artifact::Optimized(_)));
    }

    #[test]
    fn optimizing_is_optional() {
        let source = SourceFile::from_memory("const x = 1 + 2;");

        assert_eq!(compile_to_js(&source, true).unwrap(), "const x_1 = 3;\n");
        assert_eq!(compile_to_js(&source, false).unwrap(), "const x_1 = (1 + 2);\n");
    }

    #[test]
    fn errors_carry_their_span() {
        let source = SourceFile::from_memory("const x = y;");
        let error = compile_to_js(&source, true).unwrap_err();

        assert!(matches!(error, CompileError::Analysis(_)));
        assert_eq!(source.value_of_span(error.span()), "y");
    }
}
