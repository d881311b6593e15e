mod logic;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use labyrace_engine::{Fidelity, HazardKind};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use logic::{BuildPlan, LayoutTester, Scenario, ScenarioResult, resolve_seed_inputs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "labyrace-tester", version = "0.1.0")]
#[command(about = "Automated QA sweeps for the Labyrace layout engine")]
struct Args {
    /// Scenarios to run (comma-separated, or "all")
    #[arg(long, default_value = "build")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated integers or free text)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Wall budget for every build
    #[arg(long, default_value_t = 6)]
    walls: u32,

    /// Single-block budget for every build
    #[arg(long, default_value_t = 4)]
    singles: u32,

    /// Hazard the builder places (radius, row, column, lightning, gravity or none)
    #[arg(long, default_value = "radius")]
    hazard: String,

    /// Search fidelity: full or greedy
    #[arg(long, default_value = "full")]
    fidelity: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios)?;
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds));
    let plan = build_plan(&args)?;
    let tester = LayoutTester::new(plan, args.verbose);

    println!("{}", "🧭 Running Layout Scenarios".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());
    let mut results: Vec<ScenarioResult> = Vec::new();
    for scenario in scenarios {
        results.extend(tester.run_scenario(scenario, &seeds, args.iterations));
    }

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for scenario in Scenario::ALL {
        writeln!(
            output_target.writer(),
            "  {:15} - {}",
            scenario.key(),
            scenario.description()
        )?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🏁 Labyrace Layout Tester".bright_cyan().bold());
    println!("{}", "=========================".cyan());
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn expand_scenarios(scenarios_arg: &str) -> Result<Vec<Scenario>> {
    let mut scenarios = Vec::new();
    for token in split_csv(scenarios_arg) {
        if token.eq_ignore_ascii_case("all") {
            scenarios.extend(Scenario::ALL);
            continue;
        }
        let Some(scenario) = Scenario::from_key(&token) else {
            bail!("Unknown scenario: {token} (see --list-scenarios)");
        };
        scenarios.push(scenario);
    }
    scenarios.dedup();
    Ok(scenarios)
}

fn build_plan(args: &Args) -> Result<BuildPlan> {
    let hazard = if args.hazard.trim().eq_ignore_ascii_case("none") {
        None
    } else {
        Some(
            args.hazard
                .parse::<HazardKind>()
                .map_err(anyhow::Error::msg)
                .context("parsing --hazard")?,
        )
    };
    let fidelity = args
        .fidelity
        .parse::<Fidelity>()
        .map_err(anyhow::Error::msg)
        .context("parsing --fidelity")?;
    Ok(BuildPlan {
        walls: args.walls,
        singles: args.singles,
        hazard,
        fidelity,
    })
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => {
            logic::reports::generate_json_report(&mut output_target, results)?;
        }
        ReportFormat::Markdown => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Labyrace Layout Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        ReportFormat::Console => {
            logic::reports::generate_console_report(
                &mut output_target,
                results,
                start_time.elapsed(),
            )?;
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            scenarios: "build".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            walls: 2,
            singles: 1,
            hazard: "none".to_string(),
            fidelity: "greedy".to_string(),
            iterations: 1,
            report: ReportFormat::Json,
            output: None,
            verbose: false,
        }
    }

    #[test]
    fn all_expands_to_every_scenario() {
        let scenarios = expand_scenarios("all").unwrap();
        assert_eq!(scenarios, Scenario::ALL.to_vec());
        assert_eq!(expand_scenarios("race, build").unwrap(), vec![Scenario::Race, Scenario::Build]);
        assert!(expand_scenarios("smoke").is_err());
    }

    #[test]
    fn build_plan_parses_hazard_and_fidelity() {
        let plan = build_plan(&base_args()).unwrap();
        assert_eq!(plan.hazard, None);
        assert_eq!(plan.fidelity, Fidelity::Greedy);

        let mut args = base_args();
        args.hazard = "Lightning".to_string();
        args.fidelity = "full".to_string();
        let plan = build_plan(&args).unwrap();
        assert_eq!(plan.hazard, Some(HazardKind::Lightning));
        assert_eq!(plan.fidelity, Fidelity::Full);

        args.hazard = "meteor".to_string();
        assert!(build_plan(&args).is_err());
    }

    #[test]
    fn reports_write_to_a_file() {
        let name = format!("labyrace-report-{}.json", std::process::id());
        let path = std::env::temp_dir().join(name);
        let mut args = base_args();
        args.output = Some(path.clone());
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), "[]");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn csv_splitting_trims_and_drops_blanks() {
        assert_eq!(split_csv(" 1, two ,,3"), vec!["1", "two", "3"]);
    }
}
