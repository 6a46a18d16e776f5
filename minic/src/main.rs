use clap::Parser;
use color_print::cprintln;
use indexmap::IndexMap;
use minic::{CodeGen, Lexer, Parser as MinicParser, Sema};
use serde::Serialize;
use std::time::{Duration, Instant};
use vm::Vm;

#[derive(Debug, Parser)]
#[command(name = "minic", version, about = "C-subset compiler and stack VM")]
struct Args {
    /// Source file
    input: String,

    /// Stop after lexing and print the token stream
    #[arg(long)]
    lex: bool,

    /// Stop after parsing and print the tree
    #[arg(long)]
    parse: bool,

    /// Stop after semantic analysis
    #[arg(long)]
    sema: bool,

    /// Print the bytecode listing instead of running
    #[arg(long)]
    codegen: bool,

    /// Run and report per-phase timings
    #[arg(long)]
    bench: bool,

    /// Trace each executed instruction to stderr
    #[arg(short, long)]
    debug: bool,

    /// Write the global/function layout as YAML
    #[arg(long, value_name = "FILE")]
    dump_symbols: Option<String>,
}

#[derive(Debug, Serialize)]
struct SymbolDump {
    code: IndexMap<String, CodeEntry>,
    data: IndexMap<String, DataEntry>,
}

#[derive(Debug, Serialize)]
struct CodeEntry {
    addr: usize,
}

#[derive(Debug, Serialize)]
struct DataEntry {
    addr: usize,
    size: usize,
}

fn main() {
    let args = Args::parse();
    std::process::exit(run(&args));
}

fn run(args: &Args) -> i32 {
    let source = match std::fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(err) => {
            cprintln!("<red,bold>error</>: cannot read {}: {}", args.input, err);
            return 1;
        }
    };

    // 1. Tokenize
    let start = Instant::now();
    let tokens = Lexer::new(&source).parse();
    let lex_time = start.elapsed();

    if args.lex {
        for token in &tokens {
            println!("{}:{}\t{:?}", token.pos.line, token.pos.col, token.kind);
        }
        return 0;
    }

    // 2. Parse
    let start = Instant::now();
    let (mut program, errors) = MinicParser::new(tokens.into_iter()).parse();
    let parse_time = start.elapsed();

    if !errors.is_empty() {
        for err in &errors {
            cprintln!("<red,bold>error</>: {}", err);
        }
        return 1;
    }

    if args.parse {
        println!("{:#?}", program);
        return 0;
    }

    // 3. Analyze
    let start = Instant::now();
    let mut sema = Sema::new();
    let ok = sema.analyze(&mut program);
    let sema_time = start.elapsed();

    if !ok {
        for diagnostic in sema.errors() {
            cprintln!("<red,bold>error</>: {}", diagnostic);
        }
        return 1;
    }

    if args.sema {
        println!("no semantic errors");
        return 0;
    }

    // 4. Generate bytecode
    let start = Instant::now();
    let code = match CodeGen::generate(&program) {
        Ok(code) => code,
        Err(err) => {
            cprintln!("<red,bold>error</>: {}", err);
            return 1;
        }
    };
    let codegen_time = start.elapsed();

    if let Some(path) = &args.dump_symbols {
        if let Err(err) = dump_symbols(&code, path) {
            cprintln!("<red,bold>error</>: cannot write {}: {}", path, err);
            return 1;
        }
    }

    if args.codegen {
        print!("{}", code);
        return 0;
    }

    // 5. Run
    let start = Instant::now();
    let mut vm = Vm::new();
    vm.set_debug(args.debug);
    let exit = match vm.run(&code) {
        Ok(value) => value,
        Err(err) => {
            cprintln!("<red,bold>runtime error</>: {}", err);
            return 1;
        }
    };
    let run_time = start.elapsed();

    if args.bench {
        println!("phase timings:");
        print_timing("lex", lex_time);
        print_timing("parse", parse_time);
        print_timing("sema", sema_time);
        print_timing("codegen", codegen_time);
        print_timing("run", run_time);
    }

    println!("exit value: {}", exit);
    0
}

fn print_timing(phase: &str, time: Duration) {
    println!("  {:<8} {:>10.3} ms", phase, time.as_secs_f64() * 1000.0);
}

fn dump_symbols(code: &bytecode::Program, path: &str) -> std::io::Result<()> {
    let dump = SymbolDump {
        code: code
            .functions
            .iter()
            .map(|(name, &addr)| (name.clone(), CodeEntry { addr }))
            .collect(),
        data: code
            .globals
            .iter()
            .map(|init| {
                (
                    init.name.clone(),
                    DataEntry {
                        addr: bytecode::GLOBAL_BASE as usize + init.offset,
                        size: init.slots,
                    },
                )
            })
            .collect(),
    };
    let yaml = serde_yaml::to_string(&dump)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
    std::fs::write(path, yaml)
}
