use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use reqwest::Client;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use zhpop::{
    config::Config,
    fetch::{self, canton, city, linked},
    reconcile,
    report::{self, preview},
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Find Zürich population figures published by canton and city that Wikidata lacks"
)]
struct Args {
    /// YAML file overriding endpoints and defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Rows shown per table preview
    #[arg(long)]
    preview: Option<usize>,
    /// Also print every unmatched authoritative row
    #[arg(long)]
    unmatched: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Compare authoritative counts against Wikidata (default)
    Compare {
        #[arg(value_enum, default_value_t = Scope::All)]
        scope: Scope,
    },
    /// Fetch all five datasets and print a preview of each
    Preview,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scope {
    All,
    Canton,
    City,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) configure ────────────────────────────────────────────────
    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(n) = args.preview {
        cfg.preview_rows = n;
    }
    let client = fetch::http_client(&cfg)?;
    info!("startup");

    // ─── 3) run ──────────────────────────────────────────────────────
    match args.command.unwrap_or(Command::Compare { scope: Scope::All }) {
        Command::Compare { scope } => {
            if scope != Scope::City {
                run_canton(&client, &cfg, args.unmatched).await?;
            }
            if scope != Scope::Canton {
                run_city(&client, &cfg, args.unmatched).await?;
            }
        }
        Command::Preview => run_preview(&client, &cfg).await?,
    }

    info!("all done");
    Ok(())
}

async fn run_canton(client: &Client, cfg: &Config, show_unmatched: bool) -> Result<()> {
    let api = canton::fetch_canton_api(client, cfg).await?;
    let crosswalk = linked::fetch_registry_crosswalk(client, cfg).await?;
    let wikidata = linked::fetch_wikidata_canton(client, cfg).await?;

    let joined = reconcile::join_crosswalk(&api, &crosswalk);
    preview("canton API joined with registry crosswalk", &joined, cfg.preview_rows);

    let rec = reconcile::compare_canton(&wikidata, &joined)?;
    report::print_missing_years("compare canton (Wikidata vs. canton API)", &rec.missing_years());
    if show_unmatched {
        print!("{}", report::render_table(rec.unmatched.iter().copied(), usize::MAX));
    }
    Ok(())
}

async fn run_city(client: &Client, cfg: &Config, show_unmatched: bool) -> Result<()> {
    let api = city::fetch_city_api(client, cfg).await?;
    let wikidata = linked::fetch_wikidata_city(client, cfg).await?;

    let rec = reconcile::compare_city(&wikidata, &api)?;
    report::print_missing_years("compare city (Wikidata vs. city API)", &rec.missing_years());
    if show_unmatched {
        print!("{}", report::render_table(rec.unmatched.iter().copied(), usize::MAX));
    }
    Ok(())
}

async fn run_preview(client: &Client, cfg: &Config) -> Result<()> {
    let n = cfg.preview_rows;
    preview("city API", &city::fetch_city_api(client, cfg).await?, n);
    preview("canton API", &canton::fetch_canton_api(client, cfg).await?, n);
    preview(
        "canton registry crosswalk",
        &linked::fetch_registry_crosswalk(client, cfg).await?,
        n,
    );
    preview("canton Wikidata", &linked::fetch_wikidata_canton(client, cfg).await?, n);
    preview("city Wikidata", &linked::fetch_wikidata_city(client, cfg).await?, n);
    Ok(())
}
