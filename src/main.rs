use std::{
    io::{self, Write},
    process,
    sync::Arc,
};

use glitchwire::{
    application::{
        content::{self, ContentPipeline, WriteOutcome, WriteRequest},
        error::AppError,
        generation::{ImageGenerator, TextGenerator},
        render::markdown_renderer,
        repos::{ObjectStore, PostsRepo, PostsWriteRepo},
        syndication::SyndicationService,
        visualize::{GenerationMode, VisualizePipeline},
    },
    config::{self, Command, FeedArgs, Settings, WriteArgs},
    domain::personas::PERSONAS,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        gemini::GeminiClient,
        http::{self, HttpState},
        pollinations::PollinationsClient,
        storage::SupabaseStorage,
        telemetry,
    },
    presentation::media::ImageResolver,
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;
    info!(
        target = "glitchwire::startup",
        command = cli_args.command.name(),
        "Configuration loaded"
    );

    match cli_args.command {
        Command::Personas => run_personas(),
        Command::Write(args) => run_write(settings, args).await,
        Command::Visualize(_) => run_visualize(settings).await,
        Command::Feed(args) => run_feed(settings, args).await,
        Command::Serve(_) => run_serve(settings).await,
    }
}

fn run_personas() -> Result<(), AppError> {
    let mut out = io::stdout().lock();
    for persona in PERSONAS {
        writeln!(
            out,
            "{:<8} {:<16} {}",
            persona.key, persona.full_name, persona.category
        )
        .map_err(InfraError::from)?;
    }
    Ok(())
}

async fn run_write(settings: Settings, args: WriteArgs) -> Result<(), AppError> {
    // Reject an unknown persona before touching the database or the network.
    content::select_persona(args.writer.as_deref())?;

    let repositories = init_repositories(&settings).await?;
    let gemini = gemini_client(&settings)?;

    let posts: Arc<dyn PostsRepo> = repositories.clone();
    let writer: Arc<dyn PostsWriteRepo> = repositories;
    let text: Arc<dyn TextGenerator> = Arc::new(gemini);
    let pipeline = ContentPipeline::new(posts, writer, text, settings.content.clone());

    let outcome = pipeline
        .run(WriteRequest {
            writer: args.writer,
            topic: args.topic,
            dry_run: args.dry_run,
        })
        .await?;

    match outcome {
        WriteOutcome::DryRun(post) => {
            let rendered = serde_json::to_string_pretty(&post)
                .map_err(|err| AppError::unexpected(format!("failed to encode post: {err}")))?;
            write_stdout(&rendered)?;
        }
        WriteOutcome::Published(post) => {
            write_stdout(&format!("{}\t{}", post.id, post.slug))?;
        }
    }
    Ok(())
}

async fn run_visualize(settings: Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let gemini = Arc::new(gemini_client(&settings)?);
    let store = storage_client(&settings)?;

    let options = settings.visualize.options.clone();
    let images: Arc<dyn ImageGenerator> = match options.mode {
        GenerationMode::Gemini => gemini.clone(),
        GenerationMode::Pollinations => Arc::new(PollinationsClient::new(
            settings.visualize.pollinations_base.clone(),
            settings.generation.request_timeout,
        )?),
    };

    let posts: Arc<dyn PostsRepo> = repositories.clone();
    let writer: Arc<dyn PostsWriteRepo> = repositories;
    let director: Arc<dyn TextGenerator> = gemini;
    let store: Arc<dyn ObjectStore> = Arc::new(store);
    let pipeline = VisualizePipeline::new(posts, writer, director, images, store, options);

    let report = pipeline.run_batch().await?;
    info!(
        target = "glitchwire::visualize",
        processed = report.processed.len(),
        failed = report.failed.len(),
        "Visualize batch finished"
    );

    if report.is_success() {
        Ok(())
    } else {
        Err(AppError::IncompleteBatch {
            failed: report.failed.len(),
            total: report.processed.len() + report.failed.len(),
        })
    }
}

async fn run_feed(settings: Settings, args: FeedArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let syndication = syndication_service(&settings, repositories);
    let xml = syndication.rss_feed().await?;

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, xml.as_bytes())
                .await
                .map_err(InfraError::from)?;
            info!(
                target = "glitchwire::feed",
                path = %path.display(),
                bytes = xml.len(),
                "Feed written"
            );
        }
        None => write_stdout(&xml)?,
    }
    Ok(())
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let posts: Arc<dyn PostsRepo> = repositories.clone();
    let state = HttpState {
        posts,
        syndication: syndication_service(&settings, repositories.clone()),
        renderer: markdown_renderer(),
        resolver: image_resolver(&settings),
        health: repositories,
    };

    http::serve_http(settings.server.addr, state).await?;
    Ok(())
}

async fn init_repositories(settings: &Settings) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(InfraError::from)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn gemini_client(settings: &Settings) -> Result<GeminiClient, AppError> {
    let api_key = settings
        .gemini
        .api_key
        .as_deref()
        .ok_or_else(|| InfraError::configuration("gemini api key is not configured"))?;
    Ok(GeminiClient::new(
        &settings.gemini.base_url,
        api_key,
        settings.generation.request_timeout,
    )?)
}

fn storage_client(settings: &Settings) -> Result<SupabaseStorage, AppError> {
    let url = settings
        .storage
        .supabase_url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("supabase url is not configured"))?;
    let key = settings
        .storage
        .api_key()
        .ok_or_else(|| InfraError::configuration("supabase key is not configured"))?;
    Ok(SupabaseStorage::new(
        url,
        key,
        settings.generation.request_timeout,
    )?)
}

fn image_resolver(settings: &Settings) -> ImageResolver {
    ImageResolver::new(
        settings.storage.supabase_url.as_deref(),
        &settings.visualize.pollinations_base,
    )
}

fn syndication_service(
    settings: &Settings,
    repositories: Arc<PostgresRepositories>,
) -> SyndicationService {
    SyndicationService::new(
        repositories,
        markdown_renderer(),
        image_resolver(settings),
        settings.feed.clone(),
    )
}

fn write_stdout(text: &str) -> Result<(), AppError> {
    let mut out = io::stdout().lock();
    writeln!(out, "{text}").map_err(InfraError::from)?;
    Ok(())
}
