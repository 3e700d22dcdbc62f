use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use almaz_lib::compiler::{self, CompilationError, CompileOptions};
use almaz_lib::loader::{self, ExecutionError};
use almaz_lib::parser::{self, SpanVec};
use almaz_lib::{disasm, vm};

use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    script: PathBuf,

    /// print the ast and exit
    #[arg(short = 'a', long)]
    show_ast: bool,

    /// print the disassembled module and exit
    #[arg(short = 'b', long)]
    show_bytecode: bool,

    /// name the compiled unit is installed under
    #[arg(short = 'u', long, default_value = "Program")]
    unit_name: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    fmt()
        .with_env_filter(EnvFilter::try_from_env("ALMAZ_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let src = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("could not read {}", cli.script.display()))?;
    let (ast, spans) = parser::parse(&src)?;
    debug!(script = %cli.script.display(), ast_nodes = spans.len(), "parsed script");
    if cli.show_ast {
        println!("{:#?}", ast);
        return Ok(());
    }

    let options = CompileOptions {
        unit_name: cli.unit_name,
        ..CompileOptions::default()
    };
    let (module, debug_info) = match compiler::compile_program(&ast, &options) {
        Ok(res) => res,
        Err(e) => {
            eprintln!("{}", render_compilation_error(&e, &spans));
            std::process::exit(1);
        }
    };
    if cli.show_bytecode {
        print!("{}", disasm::disassemble(&module));
        return Ok(());
    }

    let image = module.to_image()?;
    debug!(unit = %options.unit_name, image_bytes = image.len(), "encoded module image");
    let mut engine = vm::Engine::new();
    match loader::load_and_invoke(&mut engine, &image, &options) {
        Ok(()) => Ok(()),
        Err(ExecutionError::Runtime(e)) => {
            let msg = format!("Runtime error: {}", e);
            match debug_info.offset_to_ast_id(e.offset).and_then(|id| spans.get(id)) {
                Some(span) => eprintln!("{}", parser::custom_error(msg, *span)),
                None => eprintln!("{}", msg),
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn render_compilation_error(e: &CompilationError, spans: &SpanVec<'_>) -> String {
    match spans.get(e.ast_id()) {
        Some(span) => format!("Compilation error: {}", parser::custom_error(e.to_string(), *span)),
        None => format!("Compilation error: {}", e),
    }
}
