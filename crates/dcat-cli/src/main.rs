use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dcat_catalog::{CatalogEntry, CatalogPath, RetrieveByPath};
use dcat_client::{Client, ClientConfig, JobsPage, JobsQuery, ReflectionJobsResource, SortOrder};
use dcat_resource::PollingConfig;
use dcat_storage::{FileStore, PreferenceStore, Preferences};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_PREFS_FILE: &str = "dcat-prefs.json";

fn cli() -> Command {
    Command::new("dcat")
        .version(dcat_client::VERSION)
        .about("Browse the data catalog and reflection jobs")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .global(true)
                .env("DCAT_BASE_URL")
                .help("Catalog server URL (overrides config)"),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .global(true)
                .env("DCAT_TOKEN")
                .hide_env_values(true)
                .help("Bearer token (overrides config)"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve a catalog path and print the object as JSON")
                .arg(Arg::new("path").required(true).help("Dotted catalog path")),
        )
        .subcommand(
            Command::new("list")
                .about("List catalog entries under a path (root when omitted)")
                .arg(Arg::new("path").help("Dotted catalog path")),
        )
        .subcommand(
            Command::new("jobs")
                .about("List jobs of a reflection")
                .arg(Arg::new("reflection-id").required(true))
                .arg(
                    Arg::new("pages")
                        .long("pages")
                        .default_value("1")
                        .value_parser(value_parser!(u64))
                        .help("Number of pages to aggregate"),
                )
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .default_value(dcat_client::SORT_START_TIME)
                        .help("Sort column"),
                )
                .arg(
                    Arg::new("order")
                        .long("order")
                        .default_value("DESCENDING")
                        .value_parser(parse_order)
                        .help("ASCENDING or DESCENDING"),
                )
                .arg(
                    Arg::new("filter")
                        .long("filter")
                        .action(ArgAction::Append)
                        .value_parser(parse_filter)
                        .help("Filter as key=value; repeat for more values"),
                ),
        )
        .subcommand(
            Command::new("watch")
                .about("Poll the newest jobs of a reflection")
                .arg(Arg::new("reflection-id").required(true))
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .value_parser(value_parser!(u64).range(1..))
                        .help("Polling interval (overrides config)"),
                )
                .arg(
                    Arg::new("ticks")
                        .long("ticks")
                        .value_parser(value_parser!(u64))
                        .help("Stop after this many updates"),
                ),
        )
        .subcommand(
            Command::new("prefs")
                .about("Read and write stored preferences")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List stored keys"))
                .subcommand(Command::new("get").arg(Arg::new("key").required(true)))
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true)),
                )
                .subcommand(Command::new("clear").arg(Arg::new("key").required(true))),
        )
}

fn parse_order(s: &str) -> Result<SortOrder, String> {
    s.parse()
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {s:?}")),
    }
}

fn init_logging(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Config file (if any) with command-line overrides applied
fn load_config(matches: &ArgMatches) -> Result<ClientConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config = config.with_base_url(base_url.clone());
    }
    if let Some(token) = matches.get_one::<String>("token") {
        config = config.with_token(token.clone());
    }
    config.validate()?;
    Ok(config)
}

fn parse_path(raw: &str) -> Result<CatalogPath> {
    raw.parse()
        .with_context(|| format!("invalid catalog path {raw:?}"))
}

fn print_entries(entries: &[CatalogEntry]) {
    for entry in entries {
        println!("{}\t{}", entry.reference_type, entry.path);
    }
}

fn print_jobs(page: &JobsPage) {
    for job in &page.jobs {
        let started = job
            .start_time
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
        println!(
            "{}\t{}\t{}\t{}",
            job.id,
            job.state,
            job.query_type.as_deref().unwrap_or("-"),
            started
        );
    }
}

async fn run_resolve(client: &Client, args: &ArgMatches) -> Result<()> {
    let path = parse_path(required(args, "path")?)?;
    let object = client.retrieve_by_path(&path).await?;
    println!("{}", serde_json::to_string_pretty(&object)?);
    Ok(())
}

async fn run_list(client: &Client, args: &ArgMatches) -> Result<()> {
    match args.get_one::<String>("path") {
        None => print_entries(&client.api_v3_catalog().await?),
        Some(raw) => {
            let path = parse_path(raw)?;
            let object = client.retrieve_by_path(&path).await?;
            if !object.reference_type().is_container() {
                bail!("{path} is a {}, not a container", object.reference_type());
            }
            print_entries(object.children());
        }
    }
    Ok(())
}

async fn run_jobs(client: Client, config: &ClientConfig, args: &ArgMatches) -> Result<()> {
    let reflection_id = required(args, "reflection-id")?;
    let pages = args.get_one::<u64>("pages").copied().unwrap_or(1);
    let mut query = JobsQuery::default();
    if let (Some(sort), Some(order)) = (
        args.get_one::<String>("sort"),
        args.get_one::<SortOrder>("order"),
    ) {
        query = query.with_sort(sort.clone(), *order);
    }
    for (key, value) in args
        .get_many::<(String, String)>("filter")
        .into_iter()
        .flatten()
    {
        query.filters.entry(key.clone()).or_default().push(value.clone());
    }

    let jobs = ReflectionJobsResource::new(Arc::new(client), config);
    let page = jobs.paginated(reflection_id, pages, &query).await?;
    print_jobs(&page);
    if let Some(next) = &page.next {
        tracing::info!(jobs = page.jobs.len(), next = %next, "more jobs available");
    }
    Ok(())
}

async fn run_watch(client: Client, config: ClientConfig, args: &ArgMatches) -> Result<()> {
    let reflection_id = required(args, "reflection-id")?;
    let config = match args.get_one::<u64>("interval-ms") {
        Some(ms) => config.with_jobs_polling(PollingConfig::new(Duration::from_millis(*ms))),
        None => config,
    };
    let ticks = args.get_one::<u64>("ticks").copied();

    let jobs = ReflectionJobsResource::new(Arc::new(client), &config);
    let mut subscription = jobs.poll(reflection_id);
    let mut seen = 0_u64;
    loop {
        let snapshot = tokio::select! {
            snapshot = subscription.changed() => snapshot,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        };
        let Some(snapshot) = snapshot else { break };

        seen += 1;
        match (&snapshot.error, &snapshot.value) {
            (Some(err), _) => tracing::warn!(generation = snapshot.generation, error = %err, "poll failed"),
            (None, Some(page)) => {
                println!("-- update {} ({} jobs)", snapshot.generation, page.jobs.len());
                print_jobs(page);
            }
            (None, None) => {}
        }
        if ticks.is_some_and(|limit| seen >= limit) {
            break;
        }
    }
    jobs.stop_polling();
    Ok(())
}

fn run_prefs(config: &ClientConfig, args: &ArgMatches) -> Result<()> {
    let path = config
        .storage_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PREFS_FILE));
    let prefs = Preferences::new(FileStore::new(&path))
        .with_context(|| format!("opening preferences at {}", path.display()))?;
    let store = prefs.store();

    match args.subcommand() {
        Some(("list", _)) => {
            for key in store.keys()? {
                println!("{key}");
            }
        }
        Some(("get", sub)) => {
            let key = required(sub, "key")?;
            match store.read(key)? {
                Some(value) => println!("{value}"),
                None => bail!("no preference stored under {key:?}"),
            }
        }
        Some(("set", sub)) => store.write(required(sub, "key")?, required(sub, "value")?)?,
        Some(("clear", sub)) => store.remove(required(sub, "key")?)?,
        _ => bail!("unknown prefs command"),
    }
    prefs.close()?;
    Ok(())
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing argument <{name}>"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(
        matches
            .get_one::<String>("log-format")
            .map_or("text", String::as_str),
    );
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("prefs", args)) => run_prefs(&config, args),
        Some((name, args)) => {
            let client = Client::from_config(&config)?;
            tracing::debug!(base_url = %client.base_url(), command = name, "client ready");
            match name {
                "resolve" => run_resolve(&client, args).await,
                "list" => run_list(&client, args).await,
                "jobs" => run_jobs(client, &config, args).await,
                "watch" => run_watch(client, config.clone(), args).await,
                other => bail!("unknown command {other}"),
            }
        }
        None => bail!("no command given"),
    }
}
