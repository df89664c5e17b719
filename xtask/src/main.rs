use clap::{Parser, Subcommand};
#[cfg(not(test))]
use xtask::*;

#[derive(Parser)]
#[command(author, version, about = "Development tasks for fpmdft")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Build,
    Test,
    Clippy,
    Fmt,
    Analyze,
    Benchmark,
    /// Run one of the demos
    Demo {
        /// Demo name: masked_dft, coronagraph, wisdom or verbose_logging
        name: String,
    },
}

#[cfg(not(test))]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = detect_config();

    match cli.command {
        Commands::Build => run(&mut build_command(&cfg)),
        Commands::Test => run(&mut test_command(&cfg)),
        Commands::Clippy => run(&mut clippy_command()),
        Commands::Fmt => run(&mut fmt_command()),
        Commands::Analyze => {
            run(&mut fmt_command())?;
            run(&mut clippy_command())
        }
        Commands::Benchmark => run(&mut benchmark_command(&cfg)),
        Commands::Demo { name } => run(&mut demo_command(&cfg, &name)),
    }
}
