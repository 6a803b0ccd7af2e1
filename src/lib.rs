//! Reactive list pipeline for meeting list views.
//!
//! Raw rows flow through optional sort, filter and search stages
//! ([`pipeline::ListPipeline`]) into a selection-preserving
//! [`table::RowReconciler`]. Filter and sort choices are persisted per view
//! through [`storage::FilterStorage`] unless history mode is active.
//!
//! The `mlists` binary drives the same pipeline over JSON files.

pub mod config;
pub mod filter;
pub mod logging;
pub mod model {
    pub mod types;
}
pub mod pipeline;
pub mod record;
pub mod relay;
pub mod search;
pub mod sort;
pub mod storage;
pub mod table;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use config::{FacetConfig, ListsConfig};
use filter::{Condition, DefaultDefinitions, FilterDefinition, FilterEngine, FilterOption};
use itertools::Itertools;
use model::types::Group;
use pipeline::ListPipeline;
use record::{is_empty_value, resolve_path, stringify};
use relay::Relay;
use search::{SearchConfig, SearchEngine};
use serde_json::{Value, json};
use sort::{SortDefinition, SortEngine, compare_values};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{FilterStorage, HistoryMode, JsonFileStorage, ModeGate};
use table::RowReconciler;
use tracing::{debug, info, warn};

/// Label of the option matching rows without a value.
pub const NONE_LABEL: &str = "(none)";

#[derive(Parser, Debug)]
#[command(
    name = "mlists",
    version,
    about = "Filter, search and sort meeting lists with persisted per-view state"
)]
pub struct Cli {
    /// Machine-readable output (JSON on stdout, JSON errors on stderr).
    #[arg(long, global = true, alias = "robot")]
    pub json: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to `$XDG_CONFIG_HOME/meeting-lists/config.toml`).
    #[arg(long, global = true, env = "MEETING_LISTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for persisted filter and sort records.
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a JSON array of rows through the list pipeline of one view.
    Filter {
        /// JSON file holding an array of row objects (each with an `id`).
        rows: PathBuf,

        /// Storage key of the list view.
        #[arg(long)]
        view: String,

        /// Offer a filter dimension over this property (repeatable).
        #[arg(long = "facet", value_name = "PROP")]
        facets: Vec<String>,

        /// Populate a dimension's options from a JSON array of `{id, name}`
        /// items (repeatable).
        #[arg(long = "options-from", value_name = "PROP=FILE")]
        options_from: Vec<String>,

        /// Flip the option of PROP whose condition equals VALUE (repeatable).
        /// VALUE is parsed as JSON, falling back to a plain string.
        #[arg(long = "toggle", value_name = "PROP=VALUE")]
        toggles: Vec<String>,

        /// Deactivate every filter option before toggling.
        #[arg(long)]
        clear: bool,

        /// Search query.
        #[arg(long)]
        search: Option<String>,

        /// Properties probed by the search (repeatable).
        #[arg(long = "search-prop", value_name = "PATH")]
        search_props: Vec<String>,

        /// Ordered fallback properties for the search (repeatable).
        #[arg(long = "fallback-prop", value_name = "PROP")]
        fallback_props: Vec<String>,

        /// Sort by this property.
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending.
        #[arg(long, requires = "sort")]
        desc: bool,

        /// History mode: neither read nor write persisted state.
        #[arg(long)]
        history: bool,
    },
    /// Forget the persisted filter and sort state of a view.
    Reset {
        #[arg(long)]
        view: String,
    },
}

/// CLI failure with an exit code and a machine-readable kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliError {
    pub code: i32,
    pub kind: &'static str,
    pub message: String,
    pub hint: Option<String>,
    pub retryable: bool,
}

impl CliError {
    fn usage(message: impl Into<String>, hint: Option<&str>) -> Self {
        Self {
            code: 2,
            kind: "usage",
            message: message.into(),
            hint: hint.map(str::to_string),
            retryable: false,
        }
    }

    fn runtime(err: &anyhow::Error) -> Self {
        Self {
            code: 1,
            kind: "runtime",
            message: format!("{err:#}"),
            hint: None,
            retryable: false,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

#[derive(Debug)]
pub struct ParsedCli {
    pub cli: Cli,
}

pub fn parse_cli(raw_args: Vec<String>) -> Result<ParsedCli, CliError> {
    match Cli::try_parse_from(raw_args) {
        Ok(cli) => Ok(ParsedCli { cli }),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                let _ = err.print();
                std::process::exit(0);
            }
            _ => Err(CliError::usage(
                err.to_string().trim_end(),
                Some("run `mlists --help` for usage"),
            )),
        },
    }
}

pub async fn run_with_parsed(parsed: ParsedCli) -> Result<(), CliError> {
    let cli = parsed.cli;
    let config = load_config(cli.config.as_deref()).map_err(|e| CliError::runtime(&e))?;
    logging::init_tracing(
        logging::Verbosity::from_flags(cli.verbose, cli.quiet),
        &config.log_level,
    );

    let Some(command) = cli.command else {
        return Err(CliError::usage(
            "no command given",
            Some("try `mlists filter rows.json --view motions`"),
        ));
    };
    let storage_dir = match cli.storage_dir.clone() {
        Some(dir) => dir,
        None => config
            .resolved_storage_dir()
            .map_err(|e| CliError::runtime(&anyhow::Error::from(e)))?,
    };
    let storage: Arc<dyn FilterStorage> = Arc::new(JsonFileStorage::new(&storage_dir));
    debug!(storage_dir = %storage_dir.display(), "storage ready");

    match command {
        Commands::Filter {
            rows,
            view,
            facets,
            options_from,
            toggles,
            clear,
            search,
            search_props,
            fallback_props,
            sort,
            desc,
            history,
        } => {
            let request = FilterRequest {
                rows_path: rows,
                view,
                facets,
                options_from,
                toggles,
                clear,
                search,
                search_props,
                fallback_props,
                sort,
                desc,
                history: history || config.history_mode,
            };
            let report = run_filter(&config, storage, request)
                .await
                .map_err(|e| classify(&e))?;
            print_report(&report, cli.json).map_err(|e| CliError::runtime(&e))
        }
        Commands::Reset { view } => {
            let removed_filter = storage
                .remove(&storage::filter_key(&view))
                .await
                .map_err(|e| CliError::runtime(&anyhow::Error::from(e)))?;
            let removed_sort = storage
                .remove(&storage::sort_key(&view))
                .await
                .map_err(|e| CliError::runtime(&anyhow::Error::from(e)))?;
            info!(view = %view, removed_filter, removed_sort, "view state reset");
            if cli.json {
                println!(
                    "{}",
                    json!({"view": view, "removed_filter": removed_filter, "removed_sort": removed_sort})
                );
            } else {
                println!("reset {view}");
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ListsConfig> {
    let config = match path {
        Some(path) => {
            let mut config = ListsConfig::load_from(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            config.apply_env_overrides();
            config
        }
        None => ListsConfig::load().context("loading config")?,
    };
    Ok(config)
}

/// Input errors get a usage exit code; everything else is a runtime failure.
fn classify(err: &anyhow::Error) -> CliError {
    if err.downcast_ref::<InputError>().is_some() {
        CliError {
            code: 2,
            kind: "invalid-input",
            message: format!("{err:#}"),
            hint: None,
            retryable: false,
        }
    } else {
        CliError::runtime(err)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct InputError(String);

struct FilterRequest {
    rows_path: PathBuf,
    view: String,
    facets: Vec<String>,
    options_from: Vec<String>,
    toggles: Vec<String>,
    clear: bool,
    search: Option<String>,
    search_props: Vec<String>,
    fallback_props: Vec<String>,
    sort: Option<String>,
    desc: bool,
    history: bool,
}

/// Result of one `mlists filter` run.
#[derive(Debug, serde::Serialize)]
pub struct FilterReport {
    pub view: String,
    pub total: usize,
    pub count: usize,
    pub rows: Vec<Value>,
    pub filters: Vec<String>,
    pub definitions: Vec<FilterDefinition>,
    pub sort: SortDefinition,
    pub query: String,
    pub ignored_toggles: Vec<String>,
}

async fn run_filter(
    config: &ListsConfig,
    storage: Arc<dyn FilterStorage>,
    request: FilterRequest,
) -> Result<FilterReport> {
    let rows = read_rows(&request.rows_path)?;
    let view_config = config.view(&request.view).cloned().unwrap_or_default();

    let gate = Arc::new(HistoryMode::new());
    if request.history {
        gate.enter();
    }
    let gate: Arc<dyn ModeGate> = gate;

    let repo_sources = request
        .options_from
        .iter()
        .map(|raw| parse_assignment(raw))
        .map_ok(|(property, path)| (property, PathBuf::from(path)))
        .collect::<Result<Vec<_>>>()?;

    let mut facets: Vec<FacetConfig> = view_config.facets.clone();
    for property in request
        .facets
        .iter()
        .chain(repo_sources.iter().map(|(property, _)| property))
    {
        if !facets.iter().any(|f| &f.property == property) {
            facets.push(FacetConfig {
                property: property.clone(),
                label: None,
            });
        }
    }
    let repo_properties: Vec<String> = repo_sources.iter().map(|(p, _)| p.clone()).collect();
    let facet_rows = rows.clone();
    let defaults = move || facet_definitions(&facets, &repo_properties, &facet_rows);

    let filter = Arc::new(FilterEngine::new(
        request.view.clone(),
        storage.clone(),
        gate.clone(),
        Arc::new(DefaultDefinitions(defaults)),
    ));

    let mut group_relays = Vec::with_capacity(repo_sources.len());
    for (property, path) in &repo_sources {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading options file {}", path.display()))?;
        let groups: Vec<Group> = serde_json::from_str(&raw)
            .map_err(|e| InputError(format!("{}: expected an array of {{id, name}}: {e}", path.display())))?;
        let relay = Relay::with_value(groups);
        filter.update_filter_for_repo(
            &relay,
            property.clone(),
            Some(Box::new(|group: &Group| !group.is_default)),
            Some(NONE_LABEL.to_string()),
        );
        group_relays.push(relay);
    }

    let search_props = first_non_empty(&request.search_props, &view_config.search_props)
        .unwrap_or_else(|| vec!["title".to_string(), "name".to_string()]);
    let fallback_props =
        first_non_empty(&request.fallback_props, &view_config.fallback_props).unwrap_or_default();
    let search = Arc::new(SearchEngine::new(
        SearchConfig::new(search_props).with_fallbacks(fallback_props),
    ));

    let default_sort = view_config
        .default_sort
        .clone()
        .unwrap_or_else(|| "id".to_string());
    let sort = Arc::new(SortEngine::new(
        request.view.clone(),
        SortDefinition::ascending(default_sort),
        storage,
        gate,
    ));

    let total = rows.len();
    let source = Relay::with_value(rows);
    let pipeline = ListPipeline::new(source)
        .with_sort(sort.clone())
        .with_filter(filter.clone())
        .with_search(search.clone());
    pipeline.start().await;

    let table = Arc::new(RowReconciler::new());
    table.connect(pipeline.output());

    if request.clear {
        filter.clear_all_filters().await;
    }
    let mut ignored_toggles = Vec::new();
    for toggle in &request.toggles {
        let (property, raw_value) = parse_assignment(toggle)?;
        let condition = Condition::from(parse_value(&raw_value));
        if !filter.toggle_condition(&property, &condition).await {
            warn!(toggle = %toggle, "no filter option matched");
            ignored_toggles.push(toggle.clone());
        }
    }
    if let Some(property) = &request.sort {
        let definition = if request.desc {
            SortDefinition::descending(property.clone())
        } else {
            SortDefinition::ascending(property.clone())
        };
        sort.set_sort(definition).await;
    }
    if let Some(query) = &request.search {
        search.search(query);
    }

    let displayed = table.rendered().latest().unwrap_or_default();
    let report = FilterReport {
        view: request.view,
        total,
        count: displayed.len(),
        rows: displayed,
        filters: filter.filter_chips().iter().map(ToString::to_string).collect(),
        definitions: filter.filter_definitions().unwrap_or_default(),
        sort: sort.definition(),
        query: search.query(),
        ignored_toggles,
    };
    pipeline.dispose();
    table.disconnect();
    drop(group_relays);
    Ok(report)
}

fn read_rows(path: &Path) -> Result<Vec<Value>> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("reading rows {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&raw)
        .map_err(|e| InputError(format!("{}: invalid JSON: {e}", path.display())))?;
    let Value::Array(rows) = parsed else {
        bail!(InputError(format!("{}: expected a JSON array of rows", path.display())));
    };
    if let Some(position) = rows.iter().position(|row| !row.get("id").is_some_and(Value::is_i64)) {
        bail!(InputError(format!(
            "{}: row {position} has no integer `id`",
            path.display()
        )));
    }
    Ok(rows)
}

/// `"prop=value"` → `("prop", "value")`.
fn parse_assignment(raw: &str) -> Result<(String, String)> {
    let (property, value) = raw
        .split_once('=')
        .filter(|(property, _)| !property.trim().is_empty())
        .ok_or_else(|| anyhow!(InputError(format!("expected PROP=VALUE, got `{raw}`"))))?;
    Ok((property.trim().to_string(), value.to_string()))
}

/// JSON literal when it parses, otherwise the raw text as a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn first_non_empty(primary: &[String], secondary: &[String]) -> Option<Vec<String>> {
    [primary, secondary]
        .into_iter()
        .find(|props| !props.is_empty())
        .map(<[String]>::to_vec)
}

/// One definition per facet with an option per distinct value found in
/// `rows` (array values contribute each element), plus a "(none)" option when
/// some rows have no value. Repo-backed facets start without options.
pub fn facet_definitions(
    facets: &[FacetConfig],
    repo_properties: &[String],
    rows: &[Value],
) -> Vec<FilterDefinition> {
    facets
        .iter()
        .map(|facet| {
            let definition = FilterDefinition::new(facet.property.clone(), facet.label());
            if repo_properties.contains(&facet.property) {
                return definition;
            }
            let values: Vec<Option<Value>> = rows
                .iter()
                .map(|row| resolve_path(row, &facet.property))
                .collect();
            let has_missing = values
                .iter()
                .any(|value| value.as_ref().is_none_or(is_empty_value));
            let mut options: Vec<filter::FilterEntry> = values
                .into_iter()
                .flatten()
                .flat_map(|value| match value {
                    Value::Array(items) => items,
                    other => vec![other],
                })
                .filter(|value| !is_empty_value(value))
                .unique_by(|value| value.to_string())
                .sorted_by(|a, b| compare_values(Some(a), Some(b)))
                .map(|value| {
                    let label = stringify(&value);
                    FilterOption::new(value, label).into()
                })
                .collect();
            if has_missing {
                options.push(filter::FilterEntry::Separator(
                    filter::repo::NONE_OPTION_SEPARATOR.to_string(),
                ));
                options.push(FilterOption::new(Condition::null(), NONE_LABEL).into());
            }
            definition.with_options(options)
        })
        .collect()
}

fn print_report(report: &FilterReport, robot: bool) -> Result<()> {
    if robot {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for row in &report.rows {
        println!("{}", serde_json::to_string(row)?);
    }
    if !report.filters.is_empty() {
        eprintln!("filters: {}", report.filters.join(", "));
    }
    for toggle in &report.ignored_toggles {
        eprintln!("ignored toggle: {toggle}");
    }
    eprintln!("{} of {} rows", report.count, report.total);
    Ok(())
}
