//! CLI commands

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::contractor::SchedulerSettings;
use crate::engine::RouteEngine;
use crate::facade::{DatasetPaths, InternalDataFacade, SharedDataFacade, SharedRegions};
use crate::geo::FixedLatLon;
use crate::import;
use crate::prepare::{self, ExcludableClass, PrepareConfig};
use crate::profile::CarProfile;
use crate::response::RouteOptions;
use crate::server::run_server;

#[derive(Parser)]
#[command(name = "monarch-route")]
#[command(about = "Offline-preprocessing, online-query road routing engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExcludeArg {
    Ferry,
    Restricted,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Preprocess an extract into a query dataset
    Prepare {
        /// Input extract (JSON with nodes, ways, restrictions)
        input: PathBuf,
        /// Output dataset base path; artifacts get suffixes appended
        output: PathBuf,
        /// Segment speed override CSVs, stacked in order
        #[arg(long = "segment-speed-file")]
        speed_files: Vec<PathBuf>,
        /// Turn penalty override CSVs, stacked in order
        #[arg(long = "turn-penalty-file")]
        turn_penalty_files: Vec<PathBuf>,
        /// Fraction of nodes left uncontracted as the core
        #[arg(long, default_value = "0.0")]
        core_factor: f64,
        /// Node classes excluded by additional metrics
        #[arg(long = "exclude", value_enum)]
        excludes: Vec<ExcludeArg>,
        /// Worker threads (defaults to hardware concurrency)
        #[arg(short, long)]
        threads: Option<usize>,
    },
    /// Run a single route query against a dataset
    Route {
        /// Dataset base path
        base: PathBuf,
        /// Start coordinate (lat,lon)
        #[arg(long)]
        from: String,
        /// End coordinate (lat,lon)
        #[arg(long)]
        to: String,
    },
    /// Start the HTTP query service
    Serve {
        /// Dataset base path
        base: PathBuf,
        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,
        /// Memory-map the dataset instead of loading it
        #[arg(long)]
        shared: bool,
    },
    /// Validate a dataset's artifact family and print its summary
    Datastore {
        /// Dataset base path
        base: PathBuf,
    },
}

fn parse_coordinate(s: &str) -> Result<FixedLatLon> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        anyhow::bail!("coordinate must be in format 'lat,lon'");
    }
    let lat = parts[0].trim().parse::<f64>()?;
    let lon = parts[1].trim().parse::<f64>()?;
    Ok(FixedLatLon::from_degrees(lat, lon))
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare {
                input,
                output,
                speed_files,
                turn_penalty_files,
                core_factor,
                excludes,
                threads,
            } => {
                if let Some(threads) = threads {
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(threads)
                        .build_global()
                        .context("configuring the worker pool")?;
                }
                println!("Reading extract from {}...", input.display());
                let extract = import::read_extract(&input)?;

                let config = PrepareConfig {
                    speed_files,
                    turn_penalty_files,
                    excludes: excludes
                        .iter()
                        .map(|e| match e {
                            ExcludeArg::Ferry => ExcludableClass::Ferry,
                            ExcludeArg::Restricted => ExcludableClass::AccessRestricted,
                        })
                        .collect(),
                    scheduler: SchedulerSettings {
                        core_factor,
                        ..Default::default()
                    },
                    timestamp: None,
                };

                let dataset = prepare::prepare(
                    extract.nodes,
                    extract.ways,
                    &extract.restrictions,
                    &CarProfile::new(),
                    &config,
                )?;

                let paths = DatasetPaths::new(&output);
                dataset.write(&paths)?;
                println!("Dataset written to {}.*", output.display());
                Ok(())
            }
            Commands::Route { base, from, to } => {
                let paths = DatasetPaths::new(&base);
                println!("Loading dataset from {}...", base.display());
                let facade = InternalDataFacade::load(&paths)?;
                let engine = RouteEngine::new(Arc::new(facade));

                let coordinates = vec![parse_coordinate(&from)?, parse_coordinate(&to)?];
                let start = std::time::Instant::now();
                let response = engine.route(&coordinates, &RouteOptions::default())?;
                println!("Route found in {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
                println!("Distance: {:.0}m", response.summary.total_distance_m);
                println!("Duration: {:.1}s", response.summary.total_duration_s);
                println!("{}", serde_json::to_string_pretty(&response)?);
                Ok(())
            }
            Commands::Serve { base, port, shared } => {
                let paths = DatasetPaths::new(&base);
                println!("Loading dataset from {}...", base.display());
                let regions = if shared {
                    let facade = SharedDataFacade::load(&paths)?;
                    Arc::new(SharedRegions::new(Arc::new(facade)))
                } else {
                    let facade = InternalDataFacade::load(&paths)?;
                    Arc::new(SharedRegions::new(Arc::new(facade)))
                };
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(run_server(regions, port))
            }
            Commands::Datastore { base } => {
                let paths = DatasetPaths::new(&base);
                let facade = InternalDataFacade::load(&paths)?;
                use crate::facade::RouteData;
                println!("Dataset {} is consistent", base.display());
                println!("  timestamp:  {}", facade.timestamp());
                println!("  checksum:   {:#010x}", facade.checksum());
                println!("  graph:      {} nodes, {} edges",
                    facade.query_graph().node_count(),
                    facade.query_graph().edge_count());
                println!("  metrics:    {}", facade.query_graph().metric_count());
                println!("  core nodes: {}",
                    facade.core_flags().iter().filter(|&&c| c).count());
                Ok(())
            }
        }
    }
}
