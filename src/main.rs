use selfquery::cli::{Cli, Commands, ConfigAction};
use selfquery::config::Config;
use selfquery::error::{Result, SelfQueryError};
use selfquery::llm::OpenAiCompatibleModel;
use selfquery::query_constructor::{get_query_constructor_prompt, QueryConstructorPromptArgs};
use selfquery::store::MemoryStore;
use selfquery::{Document, SelfQueryRetriever};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Commands::Query {
            query,
            documents,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            block_on(cmd_query(config, &query, documents, json))?;
        }
        Commands::Explain { query, json } => {
            let config = load_config(cli.config, cli.profile)?;
            block_on(cmd_explain(config, &query, json))?;
        }
        Commands::Prompt { query } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_prompt(&config, query)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose {
        "selfquery=debug"
    } else {
        "selfquery=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| SelfQueryError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    rt.block_on(future)
}

fn build_retriever(config: &Config, store: MemoryStore) -> Result<SelfQueryRetriever<MemoryStore>> {
    let model = OpenAiCompatibleModel::from_config(&config.llm)?;

    tracing::info!("Using {} model {}", config.llm.provider, config.llm.model);

    Ok(
        SelfQueryRetriever::from_config(Arc::new(model), Arc::new(store), &config.retriever)
            .with_max_tokens(config.llm.max_tokens),
    )
}

async fn cmd_query(
    config: Config,
    query: &str,
    documents: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let documents_file = documents
        .or_else(|| config.store.documents_file.clone())
        .ok_or_else(|| {
            SelfQueryError::Config(
                "No documents file: pass --documents or set store.documents_file".to_string(),
            )
        })?;

    let store = MemoryStore::load_json(&expand_path(&documents_file)?)?
        .with_min_score(config.store.min_score);
    let retriever = build_retriever(&config, store)?;

    let results = retriever.get_relevant_documents(query).await?;

    if json {
        let out = serde_json::to_string_pretty(&results).map_err(|e| SelfQueryError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", out);
    } else {
        print_documents(&results);
    }

    Ok(())
}

fn print_documents(results: &[Document]) {
    if results.is_empty() {
        println!("No matching documents");
        return;
    }

    for (i, doc) in results.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, doc.score, doc.page_content);
        if !doc.metadata.is_empty() {
            let meta: Vec<String> = doc
                .metadata
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            println!("   {}", meta.join(", "));
        }
    }
}

async fn cmd_explain(config: Config, query: &str, json: bool) -> Result<()> {
    let retriever = build_retriever(&config, MemoryStore::new())?;
    let structured = retriever.construct_query(query).await?;

    if json {
        let out = serde_json::to_string_pretty(&structured).map_err(|e| SelfQueryError::Json {
            source: e,
            context: "Failed to serialize structured query".to_string(),
        })?;
        println!("{}", out);
    } else {
        println!("Query:  {:?}", structured.query);
        match &structured.filter {
            Some(filter) => println!("Filter: {}", filter),
            None => println!("Filter: (none)"),
        }
        match structured.limit {
            Some(limit) => println!("Limit:  {}", limit),
            None => println!("Limit:  {} (default)", config.retriever.default_limit),
        }
    }

    Ok(())
}

fn cmd_prompt(config: &Config, query: Option<String>) -> Result<()> {
    let prompt = get_query_constructor_prompt(QueryConstructorPromptArgs {
        document_contents: &config.retriever.document_contents,
        attribute_info: &config.retriever.attributes,
        enable_limit: config.retriever.enable_limit,
    })?;

    match query {
        Some(query) => {
            let mut inputs = HashMap::new();
            inputs.insert("query".to_string(), query);
            println!("{}", prompt.format(&inputs)?);
        }
        None => println!("{}", prompt.template()),
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;
            let value = serde_json::to_value(&config).map_err(|e| SelfQueryError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            let shown = match section {
                Some(section) => value.get(&section).cloned().ok_or_else(|| {
                    SelfQueryError::Config(format!("Unknown config section: {}", section))
                })?,
                None => value,
            };

            let json = serde_json::to_string_pretty(&shown).map_err(|e| SelfQueryError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = match profile {
                Some(profile) => Config::load_with_profile(&path, &profile)?,
                None => Config::load(&path)?,
            };
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Attributes: {}", config.retriever.attributes.len());
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| SelfQueryError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let mut config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'selfquery config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| SelfQueryError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| SelfQueryError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
