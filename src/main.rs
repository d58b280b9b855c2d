use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use clap_stdin::FileOrStdin;
use log::{error, info};

use pcc::{analyze, compile, CompileError, CompileOptions};

/// Compiler for the P language, emitting RISC-V assembly
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source file, or `-` to read from stdin
    #[arg(default_value = "-")]
    input: FileOrStdin,

    /// Output path. Defaults to `<stem>.S`, or stdout when reading stdin
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump every symbol table when its scope closes
    #[arg(long)]
    dump_table: bool,

    /// Stop after semantic analysis
    #[arg(long)]
    check: bool,
}

fn report(error: &CompileError, source: &str) {
    match error {
        CompileError::Semantic {
            diagnostics,
            table_dump,
        } => {
            print!("{}", table_dump);
            for d in diagnostics {
                eprint!("{}", d.render(source));
            }
        }
        e => eprintln!("{}", e),
    }
}

fn default_output(source_name: &str) -> PathBuf {
    let stem = Path::new(source_name)
        .file_stem()
        .map_or_else(|| "a".into(), |s| s.to_os_string());
    PathBuf::from(stem).with_extension("S")
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let from_stdin = cli.input.is_stdin();
    let source_name = cli.input.filename().to_string();
    let source = match cli.input.contents() {
        Ok(s) => s,
        Err(e) => {
            error!("cannot read {}: {}", source_name, e);
            return ExitCode::FAILURE;
        }
    };
    let options = CompileOptions {
        dump_table: cli.dump_table,
        source_name: source_name.clone(),
    };

    if cli.check {
        return match analyze(&source, &options) {
            Ok((_, analysis)) => {
                print!("{}", analysis.table_dump);
                for d in &analysis.diagnostics {
                    eprint!("{}", d.render(&source));
                }
                if analysis.has_error() {
                    ExitCode::FAILURE
                } else {
                    info!("{} has no semantic errors", source_name);
                    ExitCode::SUCCESS
                }
            }
            Err(e) => {
                report(&e, &source);
                ExitCode::FAILURE
            }
        };
    }

    let compilation = match compile(&source, &options) {
        Ok(c) => c,
        Err(e) => {
            report(&e, &source);
            return ExitCode::FAILURE;
        }
    };
    print!("{}", compilation.table_dump);

    let output = match (cli.output, from_stdin) {
        (Some(path), _) => path,
        (None, true) => {
            print!("{}", compilation.assembly);
            return ExitCode::SUCCESS;
        }
        (None, false) => default_output(&source_name),
    };
    if let Err(e) = fs::write(&output, &compilation.assembly) {
        error!("cannot write {}: {}", output.display(), e);
        return ExitCode::FAILURE;
    }
    info!("wrote {}", output.display());
    ExitCode::SUCCESS
}
