use clap::{Parser, Subcommand, ValueEnum};
use moviecrawl::config::{ConfigLoader, OutputConfig, ProxyMode, ScraperConfig};
use moviecrawl::output::{self, report};
use moviecrawl::record::{RunScenario, StrategyKind};
use moviecrawl::runner::{RunReport, Runner};
use std::path::PathBuf;
use std::sync::Arc;
use validator::Validate;

#[derive(Parser)]
#[command(name = "moviecrawl")]
#[command(version = "0.1.0")]
#[command(about = "Collects the same movie catalog through an API, static HTML and a headless browser, and compares the cost of each", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the selected strategies and write records plus network reports
    Run {
        /// Path to the configuration file (JSON/YAML/TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Records to collect per strategy
        #[arg(short, long)]
        max: Option<usize>,

        /// Network route
        #[arg(long, value_enum)]
        proxy: Option<ProxyArg>,

        /// Strategies to run, comma separated
        #[arg(short, long, value_enum, value_delimiter = ',')]
        strategy: Vec<StrategyArg>,

        /// Scenario label for the reports
        #[arg(long, value_enum)]
        scenario: Option<ScenarioArg>,

        #[arg(long)]
        api_workers: Option<usize>,

        #[arg(long)]
        html_workers: Option<usize>,

        /// Browser page-load timeout in seconds
        #[arg(long)]
        nav_timeout: Option<u64>,

        /// Browser retries after a failed navigation
        #[arg(long)]
        nav_retries: Option<u32>,

        /// Show the browser window
        #[arg(long)]
        no_headless: bool,

        /// Directory for CSV/JSON output
        #[arg(short, long)]
        out_dir: Option<String>,

        /// Hide progress bars
        #[arg(long)]
        no_progress: bool,
    },
    /// Validate a configuration file
    Check {
        /// Path to the configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Merge the metrics summaries of several runs into one comparison table
    Merge {
        /// Summary JSON files written by `run`
        #[arg(required = true)]
        summaries: Vec<PathBuf>,

        #[arg(short, long, default_value = "scrape_network_metrics_all.csv")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProxyArg {
    None,
    Tor,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Api,
    Html,
    Browser,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioArg {
    Baseline,
    Multithread,
    Proxy,
}

struct RunOverrides {
    max: Option<usize>,
    proxy: Option<ProxyArg>,
    strategy: Vec<StrategyArg>,
    scenario: Option<ScenarioArg>,
    api_workers: Option<usize>,
    html_workers: Option<usize>,
    nav_timeout: Option<u64>,
    nav_retries: Option<u32>,
    no_headless: bool,
    out_dir: Option<String>,
}

impl RunOverrides {
    fn apply(self, config: &mut ScraperConfig) {
        if let Some(max) = self.max {
            config.max_records = max;
        }
        if let Some(proxy) = self.proxy {
            config.proxy.mode = match proxy {
                ProxyArg::None => ProxyMode::None,
                ProxyArg::Tor => ProxyMode::Tor,
            };
        }
        if !self.strategy.is_empty() {
            config.strategies = self
                .strategy
                .iter()
                .map(|s| match s {
                    StrategyArg::Api => StrategyKind::Api,
                    StrategyArg::Html => StrategyKind::Html,
                    StrategyArg::Browser => StrategyKind::Browser,
                })
                .collect();
        }
        if let Some(scenario) = self.scenario {
            config.scenario = match scenario {
                ScenarioArg::Baseline => RunScenario::Baseline,
                ScenarioArg::Multithread => RunScenario::Multithread,
                // resolved against the actual route at run time
                ScenarioArg::Proxy => RunScenario::ProxyDirect,
            };
        }
        if let Some(n) = self.api_workers {
            config.workers.api = n;
        }
        if let Some(n) = self.html_workers {
            config.workers.html = n;
        }
        if let Some(secs) = self.nav_timeout {
            config.navigation.timeout_secs = secs;
        }
        if let Some(retries) = self.nav_retries {
            config.navigation.retry_budget = retries;
        }
        if self.no_headless {
            config.navigation.headless = false;
        }
        if let Some(dir) = self.out_dir {
            config.output = match config.output {
                OutputConfig::Json { .. } => OutputConfig::Json { dir },
                _ => OutputConfig::Csv { dir },
            };
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> moviecrawl::Result<ScraperConfig> {
    match path {
        Some(path) => {
            log::info!("Loading config from {:?}", path);
            ConfigLoader::load(path)
        }
        None => ConfigLoader::from_env(),
    }
}

async fn write_outputs(
    config: &ScraperConfig,
    run_report: &RunReport,
    multi: Option<Arc<indicatif::MultiProgress>>,
) -> anyhow::Result<()> {
    for run in &run_report.runs {
        let mut sink = output::open_sink(&config.output, &run.method, multi.clone()).await?;
        output::write_all(sink.as_mut(), &run.records).await?;
    }
    let mut sink = output::open_sink(&config.output, "common", multi).await?;
    output::write_all(sink.as_mut(), &run_report.common).await?;

    report::write_run_reports(&output::report_dir(&config.output), &run_report.summary())?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    let cli = Cli::parse();
    let logger = env_logger::Builder::from_default_env().build();
    let multi = Arc::new(indicatif::MultiProgress::new());

    match cli.command {
        Commands::Run {
            config,
            max,
            proxy,
            strategy,
            scenario,
            api_workers,
            html_workers,
            nav_timeout,
            nav_retries,
            no_headless,
            out_dir,
            no_progress,
        } => {
            let progress = !no_progress;
            if progress {
                indicatif_log_bridge::LogWrapper::new((*multi).clone(), logger).try_init()?;
            } else {
                let level = logger.filter();
                log::set_boxed_logger(Box::new(logger))?;
                log::set_max_level(level);
            }

            let mut config_data = load_config(config.as_ref())?;
            RunOverrides {
                max,
                proxy,
                strategy,
                scenario,
                api_workers,
                html_workers,
                nav_timeout,
                nav_retries,
                no_headless,
                out_dir,
            }
            .apply(&mut config_data);
            config_data.validate()?;
            config_data.check_credentials()?;
            log::info!("Loaded run: {}", config_data.name);

            let mut runner = Runner::new(config_data.clone());
            if progress {
                runner = runner.with_progress(multi.clone());
            }

            log::info!("Starting scrape...");
            let run_report = runner.run().await?;
            write_outputs(&config_data, &run_report, progress.then(|| multi.clone())).await?;

            println!(
                "\n✅ Scrape Completed ({} route, {}):",
                run_report.route, run_report.scenario
            );
            for run in &run_report.runs {
                println!(
                    "   {:<14} {:>4} records | {:>4} requests | {:>10.2} KB | {:>8.2}s | avg {:.2}ms",
                    run.method,
                    run.records.len(),
                    run.summary.requests,
                    run.summary.bytes as f64 / 1024.0,
                    run.summary.elapsed_seconds,
                    run.summary.avg_latency_ms
                );
            }
            println!("   Common to all strategies: {}", run_report.common.len());
            println!("   Distinct movies overall:  {}", run_report.union.len());
        }
        Commands::Check { config } => {
            log::set_boxed_logger(Box::new(logger))?;
            log::set_max_level(log::LevelFilter::Warn);

            match load_config(config.as_ref()).and_then(|cfg| {
                cfg.check_credentials()?;
                Ok(cfg)
            }) {
                Ok(cfg) => {
                    println!("✅ Config is valid:");
                    println!("   Name: {}", cfg.name);
                    println!("   Strategies: {:?}", cfg.strategies);
                    println!("   Max records: {}", cfg.max_records);
                    println!("   Workers: api={} html={}", cfg.workers.api, cfg.workers.html);
                    println!("   Proxy: {:?}", cfg.proxy.mode);
                    println!(
                        "   Navigation: timeout {}s, {} retries, headless {}",
                        cfg.navigation.timeout_secs,
                        cfg.navigation.retry_budget,
                        cfg.navigation.headless
                    );
                    println!("   Output: {:?}", cfg.output);
                }
                Err(e) => {
                    eprintln!("❌ Config error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Merge { summaries, output } => {
            log::set_boxed_logger(Box::new(logger))?;
            log::set_max_level(log::LevelFilter::Info);

            let rows = report::merge_summaries(&summaries)?;
            report::write_merged(&output, &rows)?;
            println!("✅ Wrote {} rows to {}", rows.len(), output.display());
        }
    }

    Ok(())
}
