use anyhow::{Context, Result};
use clap::Parser;
use covid_toolkit::analysis::pipeline::{Pipeline, PipelineOutput};
use covid_toolkit::analysis::summary::{round1, ColumnSummary, MarketSummary};
use covid_toolkit::config::{Config, PriceSettings};
use covid_toolkit::data::loader::DataSource;
use covid_toolkit::data::schema::{PriceSchema, SchemaVersion};
use covid_toolkit::types::FillPolicy;
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "covid-toolkit",
    about = "Cumulative COVID-19 series per country, joined with a stock index"
)]
struct Cli {
    /// YAML configuration; built-in defaults are used when the file is absent.
    #[arg(short, long, default_value = "config/pipeline.yaml", env = "COVID_TOOLKIT_CONFIG")]
    config: PathBuf,

    /// Case data location, a file path or an http(s) URL.
    #[arg(long)]
    cases: Option<String>,

    /// Price series file.
    #[arg(long)]
    prices: Option<String>,

    /// Skip the market join even if prices are configured.
    #[arg(long, default_value_t = false, conflicts_with = "prices")]
    no_prices: bool,

    /// Column layout of the case file (auto, canonical, ecdc-2020-04-06, ecdc-2020-04-22).
    #[arg(long)]
    schema: Option<SchemaVersion>,

    /// Keep absent cells absent in the cumulative series instead of filling zeros.
    #[arg(long, default_value_t = false)]
    preserve_gaps: bool,

    /// Directory for CSV exports.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = if self.config.exists() {
            Config::load(&self.config)
                .with_context(|| format!("loading {}", self.config.display()))?
        } else {
            info!("{} not found, using defaults", self.config.display());
            Config::default()
        };

        if let Some(cases) = &self.cases {
            config.cases.source = match (DataSource::parse(cases), &config.cases.source) {
                // keep the configured cache for a new URL
                (DataSource::Url { url, .. }, DataSource::Url { cache, .. }) => DataSource::Url {
                    url,
                    cache: cache.clone(),
                },
                (source, _) => source,
            };
        }
        if let Some(schema) = self.schema {
            config.cases.schema = schema;
        }
        if let Some(prices) = &self.prices {
            let source = DataSource::parse(prices);
            match &mut config.prices {
                Some(settings) => settings.source = source,
                None => {
                    config.prices = Some(PriceSettings {
                        source,
                        schema: PriceSchema::default(),
                    })
                }
            }
        }
        if self.no_prices {
            config.prices = None;
        }
        if self.preserve_gaps {
            config.fill_policy = FillPolicy::PreserveGaps;
        }
        if self.output_dir.is_some() {
            config.output_dir = self.output_dir;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let _r = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp(None)
        .try_init();

    let config = Cli::parse().into_config()?;
    let output_dir = config.output_dir.clone();
    let output = Pipeline::new(config).run()?;

    // warnings were already logged where they arose
    print_report(&output);

    if let Some(dir) = output_dir {
        output
            .export(&dir)
            .with_context(|| format!("exporting to {}", dir.display()))?;
    }
    Ok(())
}

fn print_report(output: &PipelineOutput) {
    println!("\n=== Daily cases and deaths by country ===");
    println!(
        "{:<8} {:>5} {:>10} {:>10} {:>9} {:>9} {:>10} {:>10}",
        "Country", "Days", "Avg cases", "Avg deaths", "Max cases", "Max dths", "Total cases", "Total dths"
    );
    println!("{:-<80}", "");
    for s in &output.country_summaries {
        println!(
            "{:<8} {:>5} {:>10.1} {:>10.1} {:>9} {:>9} {:>10} {:>10}",
            s.country.as_str(),
            s.days,
            round1(s.mean_cases),
            round1(s.mean_deaths),
            s.max_cases,
            s.max_deaths,
            s.total_cases,
            s.total_deaths
        );
    }

    print_columns("Daily columns", &output.daily_summaries);
    print_columns("Cumulative columns", &output.cumulative_summaries);

    if let Some(market) = &output.market {
        print_market(market);
    }
    println!();
}

fn print_columns(title: &str, summaries: &[ColumnSummary]) {
    println!("\n=== {title} ===");
    println!("{:<15} {:>8} {:>12} {:>12}", "Column", "Days", "Max", "Mean");
    println!("{:-<50}", "");
    for s in summaries {
        let max = s.max.map_or_else(|| "-".to_string(), |v| v.to_string());
        let mean = s
            .mean
            .map_or_else(|| "-".to_string(), |v| format!("{:.1}", round1(v)));
        println!("{:<15} {:>8} {:>12} {:>12}", s.label, s.defined, max, mean);
    }
}

fn print_market(market: &MarketSummary) {
    let fmt = |value: Option<f64>, precision: usize| {
        value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
    };
    println!("\n=== Index vs. daily counts ({} joined days) ===", market.rows);
    println!("First close:           {}", fmt(market.first_price, 2));
    println!("Last close:            {}", fmt(market.last_price, 2));
    println!("Change:                {}%", fmt(market.price_change_pct, 2));
    println!("Corr(cases, index):    {}", fmt(market.cases_correlation, 3));
    println!("Corr(deaths, index):   {}", fmt(market.deaths_correlation, 3));
}
