use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

mod aggregate;
mod config;
mod derive;
mod error;
mod filter;
mod loader;
mod models;
mod pipeline;
mod report;
mod risk;
mod session;

use config::Settings;
use error::LoadError;
use filter::Filter;
use loader::{load_orders, LoadOptions};
use pipeline::{Analysis, Pipeline, View};
use session::{parse_keys, Session};

#[derive(Parser)]
#[command(name = "fieldops-analytics")]
#[command(about = "Service order analytics for field operations", long_about = None)]
struct Cli {
    /// TOML settings file
    #[arg(long, global = true, env = "FIELDOPS_CONFIG")]
    config: Option<PathBuf>,
    /// Order export (CSV); overrides `input.path` from the settings
    #[arg(long, global = true)]
    input: Option<PathBuf>,
    #[arg(long, global = true)]
    delimiter: Option<char>,
    /// Membership filter, `field=v1,v2`; repeat to combine with AND
    #[arg(long = "filter", global = true)]
    filters: Vec<String>,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    #[arg(long, global = true)]
    shift_hours: Option<f64>,
    #[arg(long, global = true)]
    capacity_factor: Option<f64>,
    #[arg(long, global = true)]
    overload_threshold: Option<f64>,
    #[arg(long, global = true)]
    hourly_cost: Option<f64>,
    /// Only mobilize regions whose hourly margin is positive
    #[arg(long, global = true)]
    require_profit: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Deadline risk per group
    Risk {
        /// Grouping keys, e.g. `region,risk`
        #[arg(long)]
        group_by: Option<String>,
    },
    /// Time from opening to assignment per group
    Delays {
        #[arg(long)]
        group_by: Option<String>,
    },
    /// Daily demand against team capacity per region
    Capacity,
    /// Revenue and margin per region
    Finance,
    /// Mobilization decision per region
    Mobilization,
    /// Arrival and service rates per region
    Queue,
    /// Assignment volume by type, group and hour
    Bottlenecks,
    /// Handling time distribution per regional
    Tma,
    /// Filter options left by the current selections
    Options,
    /// Write a markdown report
    Report {
        /// Views to include; every view the file supports when omitted
        #[arg(long, value_enum, value_delimiter = ',')]
        views: Vec<View>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Interactive session on stdin
    Explore,
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        if let Some(path) = &self.input {
            settings.input.path = Some(path.clone());
        }
        if let Some(delimiter) = self.delimiter {
            settings.input.delimiter = delimiter;
        }
        if let Some(hours) = self.shift_hours {
            settings.capacity.shift_hours = hours;
        }
        if let Some(factor) = self.capacity_factor {
            settings.capacity.capacity_factor = factor;
        }
        if let Some(threshold) = self.overload_threshold {
            settings.mobilization.overload_threshold = threshold;
        }
        if let Some(cost) = self.hourly_cost {
            settings.finance.hourly_team_cost = cost;
        }
        if self.require_profit {
            settings.mobilization.require_profit = true;
        }
        Ok(settings)
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = cli.settings()?;

    let Some(input) = settings.input.path.clone() else {
        bail!("no input file: pass --input or set input.path in the settings");
    };
    let delimiter = u8::try_from(settings.input.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .with_context(|| format!("delimiter '{}' must be ASCII", settings.input.delimiter))?;
    let options = LoadOptions {
        delimiter,
        columns: settings.columns.clone(),
    };

    let mut filter = Filter::new();
    for expr in &cli.filters {
        filter.add_expr(expr, &settings.aliases)?;
    }

    let pipeline = Pipeline::new(&settings);
    let single = |view: View, group_by: Option<&str>| -> anyhow::Result<()> {
        let keys = parse_keys(group_by.unwrap_or_default())?;
        let dataset = load_orders(&input, &options)?;
        let analysis = pipeline.run(&dataset, view, &keys, &filter)?;
        match cli.format {
            OutputFormat::Json => print_json(&analysis)?,
            OutputFormat::Text => {
                println!("{}:", view.title());
                print!("{}", report::render(&analysis));
            }
        }
        Ok(())
    };

    match &cli.command {
        Commands::Risk { group_by } => single(View::Risk, group_by.as_deref())?,
        Commands::Delays { group_by } => single(View::Delays, group_by.as_deref())?,
        Commands::Capacity => single(View::Capacity, None)?,
        Commands::Finance => single(View::Finance, None)?,
        Commands::Mobilization => single(View::Mobilization, None)?,
        Commands::Queue => single(View::Queue, None)?,
        Commands::Bottlenecks => single(View::Bottlenecks, None)?,
        Commands::Tma => single(View::Tma, None)?,
        Commands::Options => {
            let dataset = load_orders(&input, &options)?;
            let levels = pipeline.options(&dataset, &filter);
            match cli.format {
                OutputFormat::Json => print_json(&levels)?,
                OutputFormat::Text => print!("{}", report::render_options(&levels)),
            }
        }
        Commands::Report { views, out } => {
            let dataset = load_orders(&input, &options)?;
            let explicit = !views.is_empty();
            let views = if explicit { views.clone() } else { View::ALL.to_vec() };

            let mut sections: Vec<(View, Analysis)> = Vec::new();
            for view in views {
                match pipeline.run(&dataset, view, &[], &filter) {
                    Ok(analysis) => sections.push((view, analysis)),
                    Err(err @ LoadError::MissingColumn { .. }) if !explicit => {
                        log::warn!("skipping {}: {err}", view.title());
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            let contents = match cli.format {
                OutputFormat::Json => serde_json::to_string_pretty(&sections)?,
                OutputFormat::Text => report::build_report(&input, &filter, &sections),
            };
            std::fs::write(out, contents)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Explore => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            let mut session = Session::new(&settings, input.clone(), options.clone(), filter.clone());
            session.run(stdin.lock(), stdout.lock())?;
        }
    }

    Ok(())
}
