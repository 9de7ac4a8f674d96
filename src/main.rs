mod cli;

use clap::Parser;
use cli::args::{Cli, Commands, SourceArgs};
use cli::handler;
use threadview::domain::entity::ThreadData;
use threadview::domain::error::DomainError;
use threadview::domain::repository::ThreadSource;
use threadview::infra::config::Config;
use threadview::infra::http::HttpThreadSource;
use threadview::infra::logger;
use threadview::infra::sqlite::{Database, SqlitePostRepository};
use threadview::usecase::fetch::ThreadUseCase;

fn main() {
    let cli = Cli::parse();

    let result = Config::from_env()
        .map_err(anyhow::Error::from)
        .and_then(|config| {
            logger::init(&config.data_dir, config.log_level);
            run(cli, &config)
        });

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let (exit_code, user_msg) = classify_error(&e);
            log::error!("{:#}", e);
            eprintln!("error: {}", user_msg);
            std::process::exit(exit_code);
        }
    }
}

/// Where threads come from for this invocation.
enum Backend {
    Local(Database),
    Remote(HttpThreadSource),
}

impl ThreadSource for Backend {
    fn get_thread(&self, root_id: &str) -> Result<ThreadData, DomainError> {
        match self {
            Backend::Local(db) => SqlitePostRepository::new(db.connection()).get_thread(root_id),
            Backend::Remote(http) => http.get_thread(root_id),
        }
    }
}

fn open_store(config: &Config) -> anyhow::Result<Database> {
    std::fs::create_dir_all(&config.data_dir)?;
    Ok(Database::open(&config.db_path())?)
}

fn open_backend(config: &Config, args: &SourceArgs) -> anyhow::Result<Backend> {
    if args.local {
        return Ok(Backend::Local(open_store(config)?));
    }

    let api_url = args
        .api_url
        .as_deref()
        .or(config.api_url.as_deref())
        .ok_or_else(|| {
            DomainError::InvalidInput(
                "no API URL: pass --api-url, set THREADVIEW_API_URL, or use --local".to_string(),
            )
        })?;
    let limit = args.limit.unwrap_or(config.limit);

    Ok(Backend::Remote(HttpThreadSource::new(api_url, limit)?))
}

fn run(cli: Cli, config: &Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show {
            id,
            source,
            retries,
            format,
        } => {
            let mut thread_uc = ThreadUseCase::new(open_backend(config, &source)?);
            handler::handle_show(&mut thread_uc, &id, retries, &format)?;
        }
        Commands::Orphans { id, source, format } => {
            let mut thread_uc = ThreadUseCase::new(open_backend(config, &source)?);
            handler::handle_orphans(&mut thread_uc, &id, &format)?;
        }
        Commands::Import { file } => {
            let db = open_store(config)?;
            let repo = SqlitePostRepository::new(db.connection());
            handler::handle_import(&repo, file.as_deref())?;
        }
    }

    Ok(())
}

fn classify_error(e: &anyhow::Error) -> (i32, String) {
    if let Some(domain_err) = e.downcast_ref::<DomainError>() {
        (domain_err.exit_code(), domain_err.to_string())
    } else {
        (1, e.to_string())
    }
}
