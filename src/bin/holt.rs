// The holt CLI.
// You can parse a TPTP problem to inspect its statements, or run the
// reasoner and get an SZS status line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;

use holt::processor::{Processor, ProcessorConfig};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[clap(
    name = "holt",
    about = "A higher-order pre-unification kernel for TPTP problems",
    version = env!("CARGO_PKG_VERSION")
)]
struct Args {
    /// Directory for resolving include directives
    #[clap(long, global = true, value_name = "DIR")]
    include_dir: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a problem and print its statements
    Parse {
        /// The TPTP problem file
        #[clap(value_name = "FILE")]
        file: String,
    },

    /// Run the reasoner on a problem and print an SZS status
    Run {
        /// The TPTP problem file
        #[clap(value_name = "FILE")]
        file: String,

        /// Bound on flex-rigid branchings per search path
        #[clap(long, value_name = "N")]
        max_depth: Option<usize>,

        /// Give up after this many milliseconds
        #[clap(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Print per-step scheduler lines
        #[clap(long)]
        verbose: bool,
    },
}

fn load(processor: &mut Processor, file: &str) {
    if let Err(error) = processor.load_file(Path::new(file)) {
        println!("{}", error);
        println!("% SZS status {} for {}", error.status, file);
        std::process::exit(1);
    }
}

fn main() {
    let args = Args::parse();
    let include_dir = args.include_dir.map(PathBuf::from);

    match args.command {
        Command::Parse { file } => {
            let config = ProcessorConfig {
                include_dir,
                ..ProcessorConfig::default()
            };
            let mut processor = Processor::new(config);
            load(&mut processor, &file);
            for formula in processor.statements() {
                println!(
                    "{}({}, {:?}, {}).",
                    formula.language, formula.name, formula.role, formula.formula
                );
            }
        }

        Command::Run {
            file,
            max_depth,
            timeout_ms,
            verbose,
        } => {
            let mut config = ProcessorConfig {
                include_dir,
                verbose,
                ..ProcessorConfig::default()
            };
            if let Some(max_depth) = max_depth {
                config.max_depth = max_depth;
            }
            let mut processor = Processor::new(config);
            load(&mut processor, &file);

            let token = CancellationToken::new();
            if let Some(ms) = timeout_ms {
                let timeout_token = token.clone();
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_millis(ms));
                    timeout_token.cancel();
                });
            }

            let status = processor.run(token);
            println!("% SZS status {} for {}", status, file);
            if !status.is_success() {
                std::process::exit(1);
            }
        }
    }
}
