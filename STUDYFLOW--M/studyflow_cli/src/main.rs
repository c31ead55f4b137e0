use std::{
    collections::HashMap,
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use studyflow_learning::PerformanceLevel;
use studyflow_planning::{format_hours, DailyPlan, StudyPlanner, StudyflowConfig};

const DEFAULT_CONFIG: &str = "studyflow.toml";

#[derive(Parser, Debug)]
#[command(name = "studyflow", version, about = "Adaptive daily study-hour planner")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Configuration file. Defaults to ./studyflow.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the learner state file.
    #[arg(long, global = true)]
    state: Option<PathBuf>,
    /// Overrides the audit log.
    #[arg(long, global = true)]
    audit: Option<PathBuf>,
    /// Overrides the JSON-lines log file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Seeds the random source for reproducible plans.
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Builds today's plan.
    Plan(PlanArgs),
    /// Feeds completion outcomes for a stored plan back into the learner.
    Feedback {
        /// Plan JSON written by `plan --out`.
        #[arg(long)]
        plan: PathBuf,
        /// Outcome per subject, `Subject=not|half|done`. Missing subjects count as `half`.
        #[arg(long = "completion", value_parser = parse_completion)]
        completions: Vec<(String, String)>,
    },
    /// Sets a subject's performance level (0 weak, 1 medium, 2 strong; clamped).
    SetLevel {
        subject: String,
        #[arg(allow_negative_numbers = true)]
        level: i64,
    },
    /// Records an average score; moves the level under the score-band policy.
    ObserveScore { subject: String, score: f64 },
    /// Prints the stored learner state.
    Show,
    /// Prints the day's class slots.
    Slots {
        #[arg(default_value_t = 6)]
        count: u32,
    },
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Subject to schedule; repeat the flag for each one.
    #[arg(long = "subject", required = true)]
    subjects: Vec<String>,
    /// Number of timetable slots today.
    #[arg(long, conflicts_with = "class_hours")]
    class_slots: Option<u32>,
    /// Class time today in hours.
    #[arg(long)]
    class_hours: Option<f64>,
    /// Overrides the configured wake hours.
    #[arg(long)]
    wake_hours: Option<f64>,
    /// Writes the plan JSON here for later feedback.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct PlanLine<'a> {
    subject: &'a str,
    hours: f64,
    display: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.global)?;
    match cli.command {
        Commands::Plan(args) => handle_plan(config, args),
        Commands::Feedback { plan, completions } => handle_feedback(config, &plan, completions),
        Commands::SetLevel { subject, level } => {
            let mut planner = open_planner(config)?;
            let level = planner.set_level(&subject, level)?;
            print_level(&subject, Some(level))
        }
        Commands::ObserveScore { subject, score } => {
            let mut planner = open_planner(config)?;
            let level = planner.observe_score(&subject, score)?;
            print_level(&subject, level)
        }
        Commands::Show => {
            let planner = open_planner(config)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&planner.learner().snapshot())?
            );
            Ok(())
        }
        Commands::Slots { count } => {
            for slot in config.planner.clock().slots_for_day(count) {
                println!("{slot}");
            }
            Ok(())
        }
    }
}

fn load_config(global: &GlobalArgs) -> Result<StudyflowConfig> {
    let mut config = match &global.config {
        Some(path) => StudyflowConfig::load(path)?,
        None => StudyflowConfig::load_or_default(DEFAULT_CONFIG)?,
    };
    if let Some(state) = &global.state {
        config.paths.state_file.clone_from(state);
    }
    if let Some(audit) = &global.audit {
        config.paths.audit_log.clone_from(audit);
    }
    if let Some(log_file) = &global.log_file {
        config.paths.log_file = Some(log_file.clone());
    }
    if global.seed.is_some() {
        config.engine.seed = global.seed;
    }
    Ok(config)
}

fn open_planner(config: StudyflowConfig) -> Result<StudyPlanner> {
    let state = config.paths.state_file.clone();
    StudyPlanner::open(config).with_context(|| format!("opening planner state {}", state.display()))
}

fn handle_plan(config: StudyflowConfig, args: PlanArgs) -> Result<()> {
    let log_file = config.paths.log_file.clone();
    let wake_hours = args
        .wake_hours
        .unwrap_or(config.planner.total_wake_hours);
    let mut planner = open_planner(config)?;
    let plan = match (args.class_slots, args.class_hours) {
        (Some(slots), _) => {
            let class_hours = planner.config().planner.clock().class_hours(slots);
            planner.plan_for_class_hours(&args.subjects, class_hours, wake_hours)
        }
        (None, hours) => planner.plan_for_class_hours(&args.subjects, hours.unwrap_or(0.0), wake_hours),
    };

    if let Some(out) = &args.out {
        write_plan(out, &plan)?;
    }
    let lines: Vec<PlanLine<'_>> = plan
        .allocation
        .iter()
        .map(|(subject, hours)| PlanLine {
            subject,
            hours: *hours,
            display: format_hours(*hours),
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "plan_id": plan.id,
            "date": Local::now().date_naive(),
            "available_hours": plan.available_hours,
            "allocation": lines,
            "saved_to": args.out,
        }))?
    );
    if let Some(path) = log_file {
        log_cli_event(
            &path,
            LogLevel::Info,
            "cli.plan.printed",
            json!({ "plan_id": plan.id, "subjects": plan.allocation.len() }),
        )?;
    }
    Ok(())
}

fn handle_feedback(
    config: StudyflowConfig,
    plan_path: &Path,
    completions: Vec<(String, String)>,
) -> Result<()> {
    let plan = read_plan(plan_path)?;
    let completions: HashMap<String, String> = completions.into_iter().collect();
    let unknown: Vec<&String> = completions
        .keys()
        .filter(|subject| !plan.allocation.contains_key(*subject))
        .collect();
    if !unknown.is_empty() {
        eprintln!("ignoring outcomes for subjects not in the plan: {unknown:?}");
    }
    let mut planner = open_planner(config)?;
    let records = planner.apply_plan_feedback(&plan, &completions)?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn print_level(subject: &str, level: Option<PerformanceLevel>) -> Result<()> {
    let payload = level.map_or_else(
        || json!({ "subject": subject, "changed": false }),
        |level| json!({ "subject": subject, "level": level.code(), "label": level.to_string() }),
    );
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn write_plan(path: &Path, plan: &DailyPlan) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating plan directory {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("writing plan {}", path.display()))?;
    serde_json::to_writer_pretty(file, plan)?;
    Ok(())
}

fn read_plan(path: &Path) -> Result<DailyPlan> {
    let file = File::open(path).with_context(|| format!("opening plan {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing plan {}", path.display()))
}

fn parse_completion(raw: &str) -> std::result::Result<(String, String), String> {
    let (subject, label) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected Subject=label, got {raw:?}"))?;
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(format!("missing subject in {raw:?}"));
    }
    Ok((subject.to_owned(), label.to_owned()))
}

fn log_cli_event(path: &Path, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
    let logger = JsonLogger::new(path)?;
    let record = LogRecord::new("studyflow.cli", level, message).with_metadata(metadata);
    logger.log(&record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn completions_split_on_the_last_equals() {
        assert_eq!(
            parse_completion("Math=done").unwrap(),
            ("Math".to_owned(), "done".to_owned())
        );
        assert_eq!(
            parse_completion("A=B=not").unwrap(),
            ("A=B".to_owned(), "not".to_owned())
        );
        assert!(parse_completion("Math").is_err());
        assert!(parse_completion("=done").is_err());
    }

    #[test]
    fn subjects_are_taken_verbatim_from_repeated_flags() {
        let cli = Cli::try_parse_from([
            "studyflow",
            "plan",
            "--subject",
            "Data, Structures",
            "--subject",
            "ML",
            "--class-slots",
            "4",
        ])
        .unwrap();
        match cli.command {
            Commands::Plan(args) => {
                assert_eq!(args.subjects, vec!["Data, Structures", "ML"]);
                assert_eq!(args.class_slots, Some(4));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn negative_levels_parse() {
        let cli = Cli::try_parse_from(["studyflow", "set-level", "Math", "-3"]).unwrap();
        assert!(matches!(cli.command, Commands::SetLevel { level: -3, .. }));
    }
}
