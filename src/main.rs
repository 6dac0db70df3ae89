//! Command line front end: every query of the dashboard printed as CSV on stdout.
//!
//! Logs go to stderr. The level comes from `RUST_LOG` when set, otherwise from
//! `AIRHEALTH_LOG_LEVEL` (default `info`).
use std::env;
use std::io;
use std::path::PathBuf;

use airhealth::config::Config;
use airhealth::daily::DailyFilter;
use airhealth::dashboard::Dashboard;
use airhealth::field::{Field, Variable};
use airhealth::profile::{AdmissionFilter, Sex};
use airhealth::station::Station;
use airhealth::table::write_csv;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser)]
#[command(name = "airhealth")]
#[command(about = "Correlate air pollution with respiratory hospital admissions", long_about = None)]
struct Cli {
    /// TOML configuration naming the sources
    #[arg(short, long, default_value = "airhealth.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// Keep only these stations
    #[arg(short, long)]
    station: Vec<Station>,

    /// Keep only these years
    #[arg(short, long)]
    year: Vec<i32>,

    /// Keep only these months (1-12)
    #[arg(short, long)]
    month: Vec<u32>,
}

impl FilterArgs {
    fn filter(self) -> DailyFilter {
        let mut filter = DailyFilter::default();
        if !self.station.is_empty() {
            filter = filter.with_stations(self.station);
        }
        if !self.year.is_empty() {
            filter = filter.with_years(self.year);
        }
        if !self.month.is_empty() {
            filter = filter.with_months(self.month);
        }
        filter
    }
}

#[derive(Args)]
struct AdmissionFilterArgs {
    /// Keep only these competence years
    #[arg(short, long)]
    year: Vec<i32>,

    /// Keep only these competence months (1-12)
    #[arg(short, long)]
    month: Vec<u32>,

    /// Keep only these sexes, e.g. female or 3
    #[arg(long)]
    sex: Vec<Sex>,
}

impl AdmissionFilterArgs {
    fn filter(self) -> AdmissionFilter {
        let mut filter = AdmissionFilter::default();
        if !self.year.is_empty() {
            filter = filter.with_years(self.year);
        }
        if !self.month.is_empty() {
            filter = filter.with_months(self.month);
        }
        if !self.sex.is_empty() {
            filter = filter.with_sexes(self.sex);
        }
        filter
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Section {
    Summary,
    Ages,
    Sexes,
    Diagnoses,
    Mortality,
    Deaths,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily means per station
    Daily {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Daily means across all selected stations
    City {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Compare stations on one field
    Stations {
        /// Field to compare, e.g. pm10
        #[arg(long, default_value = "pm10")]
        field: Field,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Distribution of one field over the selected station days
    Describe {
        #[arg(long, default_value = "pm10")]
        field: Field,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Monthly city-wide raw and standardized means
    Monthly,
    /// Monthly admission counts
    Admissions,
    /// Breakdowns of the scoped admissions
    Profile {
        #[arg(long, value_enum, default_value_t = Section::Summary)]
        section: Section,

        /// Number of diagnoses to list
        #[arg(long, default_value_t = 10)]
        top: usize,

        #[command(flatten)]
        filter: AdmissionFilterArgs,
    },
    /// Monthly pollutants joined to monthly admissions
    Merged,
    /// Correlation matrix between variables, the configured set when none are given
    Correlate {
        variables: Vec<Variable>,

        /// List the strongly correlated pairs instead of the matrix
        #[arg(long)]
        strong: bool,

        /// Correlate station-day rows instead of monthly city means
        #[arg(long)]
        by_station: bool,

        /// Correlate station-day rows among themselves, without admissions
        #[arg(long, conflicts_with = "by_station")]
        sensors: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Fit admissions against one pollutant
    Fit {
        /// Regressor, e.g. pm10 or pm10_scaled
        variable: Variable,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("failed to read {}", cli.config.display()))?;
    config.log_config();

    let mut dashboard = Dashboard::new(config);
    let out = io::stdout().lock();

    match cli.command {
        Commands::Daily { filter } => {
            write_csv(out, &dashboard.daily_aggregates(&filter.filter())?)?;
        }
        Commands::City { filter } => write_csv(out, &dashboard.city_daily(&filter.filter())?)?,
        Commands::Stations { field, filter } => {
            write_csv(out, &dashboard.station_summary(&filter.filter(), field)?)?;
        }
        Commands::Describe { field, filter } => {
            let summary = dashboard.describe(&filter.filter(), field)?;
            write_csv(out, &summary.into_iter().collect::<Vec<_>>())?;
        }
        Commands::Monthly => write_csv(out, dashboard.monthly_pollutants()?.as_slice())?,
        Commands::Admissions => write_csv(out, dashboard.monthly_admissions()?.as_slice())?,
        Commands::Profile {
            section,
            top,
            filter,
        } => {
            let profile = dashboard.admission_profile(&filter.filter(), top)?;
            match section {
                Section::Summary => write_csv(out, &[profile.summary][..])?,
                Section::Ages => write_csv(out, &profile.age_bands)?,
                Section::Sexes => write_csv(out, &profile.sexes)?,
                Section::Diagnoses => write_csv(out, &profile.top_diagnoses)?,
                Section::Mortality => write_csv(out, &profile.monthly_mortality)?,
                Section::Deaths => write_csv(out, &profile.top_death_causes)?,
            }
        }
        Commands::Merged => write_csv(out, &dashboard.merged()?.rows)?,
        Commands::Correlate {
            variables,
            strong,
            by_station,
            sensors,
            filter,
        } => {
            let matrix = if by_station || sensors {
                let variables = if variables.is_empty() {
                    dashboard.config().correlation.variables.clone()
                } else {
                    variables
                };
                if sensors {
                    dashboard.sensor_correlation_matrix(&filter.filter(), &variables)?
                } else {
                    dashboard.station_correlation_matrix(&filter.filter(), &variables)?
                }
            } else {
                dashboard.correlation_matrix(&variables)?
            };

            if strong {
                let threshold = dashboard.config().correlation.strong_threshold;
                let mut wtr = csv::Writer::from_writer(out);
                wtr.write_record(["first", "second", "correlation"])?;
                for (a, b, r) in matrix.strong_pairs(threshold) {
                    wtr.write_record([a.to_string(), b.to_string(), r.to_string()])?;
                }
                wtr.flush()?;
            } else {
                write_csv(out, &matrix)?;
            }
        }
        Commands::Fit { variable } => write_csv(out, &dashboard.regression(variable)?)?,
    }

    for (path, err) in dashboard.source_failures() {
        tracing::error!(source = %path.display(), error = %err, "source was skipped");
    }
    Ok(())
}

/// Install a stderr subscriber so stdout carries only CSV
fn init_tracing() {
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AIRHEALTH_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .compact()
        .init();
}
