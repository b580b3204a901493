use clap::Parser;
use color_print::cprintln;
use indexmap::{IndexMap, IndexSet};
use masm::Program;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nudnik::msg::Msg;
use nudnik::names::fresh_name;
use nudnik::{Config, Error, Pipeline, Step, TechniqueKind};

#[derive(Parser, Debug)]
#[clap(
    name = "Nudnik",
    author = "kanade-k-1228",
    version = "v1.0.0",
    about = "Anti-disassembly obfuscator for MASM listings"
)]
struct Args {
    /// MASM listings to transform
    #[clap(required = true)]
    input: Vec<String>,

    /// Directory receiving `<name>_nudnik.asm`
    #[clap(short, long, default_value = ".")]
    output: String,

    /// YAML pipeline configuration
    #[clap(short, long)]
    config: Option<String>,

    /// Inline call sites, N passes
    #[clap(long, value_name = "N", allow_negative_numbers = true)]
    inline: Option<i64>,

    /// Inject junk instructions, N passes
    #[clap(long, value_name = "N", allow_negative_numbers = true)]
    junk: Option<i64>,

    /// Reorder independent instructions, N passes
    #[clap(long, value_name = "N", allow_negative_numbers = true)]
    permute: Option<i64>,

    /// Most junk instructions placed before one instruction
    #[clap(long, allow_negative_numbers = true)]
    junk_size: Option<i64>,

    #[clap(long)]
    seed: Option<u64>,

    /// Treat listings as 64-bit code
    #[clap(long)]
    x64: bool,

    /// Print the transformed listing
    #[clap(short, long)]
    dump: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    println!("Nudnik by kanade-k-1228");
    println!("----------------------------------------------------");

    println!("1. Load Configuration");
    let pipeline = match configure(&args).and_then(|config| Pipeline::new(&config)) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            Msg::Error(e.to_string()).print(args.config.as_deref().unwrap_or("<command line>"));
            return ExitCode::from(2);
        }
    };
    println!("  - passes: [{}]", pipeline.names().join(", "));
    if pipeline.is_empty() {
        Msg::Note("no technique enabled, listings are only reformatted".to_string())
            .print(args.config.as_deref().unwrap_or("<command line>"));
    }

    println!("2. Transform Files");
    let outputs = match output_paths(&args.input, &args.output) {
        Ok(outputs) => outputs,
        Err(e) => {
            Msg::Error(e.to_string()).print(&args.output);
            return ExitCode::from(2);
        }
    };
    let mut failed = 0;
    for (input, output) in args.input.iter().zip(&outputs) {
        println!("  < {}", input);
        match process(input, output, &args, &pipeline) {
            Ok(path) => println!("  > {}", path.display()),
            Err(Error::Parse(e)) => {
                e.print_diag(input);
                failed += 1;
            }
            Err(e) => {
                Msg::Error(e.to_string()).print(input);
                failed += 1;
            }
        }
    }

    println!("----------------------------------------------------");
    if failed > 0 {
        cprintln!("<red,bold>{}</> of {} files failed", failed, args.input.len());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Configuration file overlaid by command line options.
fn configure(args: &Args) -> nudnik::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let steps: Vec<Step> = [
        (TechniqueKind::Inline, args.inline),
        (TechniqueKind::InjectJunk, args.junk),
        (TechniqueKind::Permute, args.permute),
    ]
    .into_iter()
    .filter_map(|(kind, repeat)| repeat.map(|n| Step::new(kind, n)))
    .collect();
    if !steps.is_empty() {
        config.techniques = steps;
    }
    if let Some(size) = args.junk_size {
        config.junk_size = size;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if args.x64 {
        config.mode = arch::Mode::X64;
    }
    config.validate()?;
    Ok(config)
}

/// One `<stem>_nudnik.asm` per input. Repeated stems get a numbered suffix
/// (compared case-insensitively), so no output overwrites another.
fn output_paths(inputs: &[String], dir: &str) -> nudnik::Result<Vec<PathBuf>> {
    let mut claimed: IndexSet<String> = IndexSet::new();
    let mut paths = Vec::with_capacity(inputs.len());
    for input in inputs {
        let stem = Path::new(input)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".to_string());
        let name = fresh_name(&stem, |n| claimed.contains(&n.to_lowercase()))?;
        claimed.insert(name.to_lowercase());
        paths.push(Path::new(dir).join(format!("{name}_nudnik.asm")));
    }
    Ok(paths)
}

fn process(
    input: &str,
    output: &Path,
    args: &Args,
    pipeline: &Pipeline,
) -> nudnik::Result<PathBuf> {
    let text = fs::read_to_string(input).map_err(|e| Error::FileOpen(input.to_string(), e))?;
    let program = Program::parse(&text)?;
    warn_unclassified(input, &program);

    let result = pipeline.run(&program)?;
    if args.dump {
        masm::print_dump(&result);
    }

    fs::write(output, result.to_string())
        .map_err(|e| Error::FileCreate(output.display().to_string(), e))?;
    Ok(output.to_path_buf())
}

/// Mnemonics without a rule are kept in place, which limits what the passes can do.
fn warn_unclassified(input: &str, program: &Program) {
    // mnemonic -> (first process, occurrences)
    let mut seen: IndexMap<String, (&str, usize)> = IndexMap::new();
    for seg in &program.texts {
        for (name, body) in &seg.processes {
            for inst in body.iter().filter(|inst| !inst.is_classified()) {
                seen.entry(inst.mnemonic().to_ascii_lowercase())
                    .or_insert((name.as_str(), 0))
                    .1 += 1;
            }
        }
    }
    for (mnemonic, (first, count)) in seen {
        Msg::Warn(format!("`{mnemonic}` is not modeled, {count} occurrences treated as barriers"))
            .print_in(input, Some(first));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(inputs: &[&str]) -> Vec<String> {
        let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        output_paths(&inputs, "out")
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn outputs_are_distinct() {
        assert_eq!(
            names(&["a/main.asm", "b/main.asm", "c/MAIN.asm", "util.asm", "main1.asm"]),
            [
                "main_nudnik.asm",
                "main1_nudnik.asm",
                "MAIN2_nudnik.asm",
                "util_nudnik.asm",
                "main3_nudnik.asm",
            ]
        );
    }

    #[test]
    fn outputs_land_in_directory() {
        let inputs = vec!["src/x.asm".to_string()];
        let paths = output_paths(&inputs, "build").unwrap();
        assert_eq!(paths, [Path::new("build").join("x_nudnik.asm")]);
    }
}
