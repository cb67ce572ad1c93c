use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use turbit::{
    encode, tapes, AnyController, Closable, ControlError, ControllerLoader, Head, Program,
    ProgramManager, Step, Tape, TuringMachine, Word, MAX_EXECUTION_STEPS,
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// The program file to execute (.tm or .json)
    #[clap(short, long, conflicts_with = "builtin")]
    program: Option<PathBuf>,

    /// The name of a built-in program to execute
    #[clap(short, long)]
    builtin: Option<String>,

    /// List the built-in programs and exit
    #[clap(short, long)]
    list: bool,

    /// The initial tape contents, one symbol per character
    #[clap(short, long, conflicts_with_all = ["succession", "addition"])]
    input: Option<String>,

    /// Start from the unary tape for N + 1
    #[clap(long, value_name = "N", conflicts_with = "addition")]
    succession: Option<usize>,

    /// Start from the unary tape for A + B
    #[clap(long, num_args = 2, value_names = ["A", "B"])]
    addition: Option<Vec<usize>>,

    /// The blank symbol of the tape
    #[clap(long, default_value_t = '0')]
    blank: char,

    /// Run the binary-encoded form of the program
    #[clap(long)]
    binary: bool,

    /// Print the binary-encoded program and exit
    #[clap(long)]
    dump_binary: bool,

    /// Write the execution trace as CSV
    #[clap(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Extra label bits written for each state in the CSV trace
    #[clap(long, default_value_t = 0)]
    padding: usize,

    /// Stop after this many steps
    #[clap(long, default_value_t = MAX_EXECUTION_STEPS)]
    max_steps: usize,

    /// Print each step of the execution
    #[clap(short = 'd', long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, ControlError> {
    if cli.list {
        for (index, name) in ProgramManager::list_program_names().iter().enumerate() {
            println!("{index}: {name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let Program {
        name,
        mut controller,
    } = load(cli)?;
    controller.prepare()?;

    if cli.dump_binary {
        let binary = controller.into_binary()?;
        println!("{}", encode(&binary));
        if let Some(label_size) = binary.label_size() {
            eprintln!("{name}: {} entries, label size {label_size}", binary.len());
        }
        return Ok(ExitCode::SUCCESS);
    }

    if cli.binary {
        controller = AnyController::BinaryTable(controller.into_binary()?);
    }

    let mut machine = TuringMachine::new(controller, Head::new(tape(cli)));
    if cli.debug {
        println!("{}: {}", machine.timestep(), machine.head());
    }

    let mut result = machine.start();
    let mut remaining = cli.max_steps;
    while result == Step::Continue && remaining > 0 {
        result = machine.step();
        remaining -= 1;
        if cli.debug {
            let state = machine.state().map(|s| s.to_string()).unwrap_or_default();
            println!("{}: {} {}", machine.timestep(), machine.head(), state);
        }
    }

    if let Some(path) = &cli.csv {
        machine.log().export_csv(path, cli.padding)?;
    }

    println!("{}", machine.head().tape());
    match result {
        Step::Halt(halt) => {
            println!("{name}: {halt} after {} steps", machine.log().len());
            Ok(if halt.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Step::Continue => {
            println!("{name}: still running after {} steps", cli.max_steps);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn load(cli: &Cli) -> Result<Program, ControlError> {
    match (&cli.program, &cli.builtin) {
        (Some(path), _) => ControllerLoader::load_program(Path::new(path)),
        (None, Some(name)) => ProgramManager::get_program_by_name(name),
        (None, None) => Err(ControlError::ValidationError(
            "Either --program or --builtin is required".to_string(),
        )),
    }
}

fn tape(cli: &Cli) -> Tape {
    let blank = Word::from(cli.blank);

    if let Some(input) = &cli.input {
        return Tape::parse(input, blank);
    }
    if let Some(n) = cli.succession {
        return tapes::succession(n);
    }
    if let Some([a, b]) = cli.addition.as_deref() {
        return tapes::addition(*a, *b);
    }

    Tape::new(Vec::new(), blank)
}
