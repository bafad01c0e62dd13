mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;
use vaultcast::config::load_config_or_default;
use vaultcast::server::{build_coordinator, start_server};
use vaultcast_blob::RemoteBlobClient;
use vaultcast_common::VideoId;
use vaultcast_db::pool::{get_conn, init_pool};
use vaultcast_transcode::{FfmpegDriver, TranscoderDriver};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vaultcast=trace,tower_http=debug".to_string()
        } else {
            "vaultcast=info,tower_http=info".to_string()
        }
    });
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(&env_filter)).init();

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Serve { host, port } => rt.block_on(serve(cli.config.as_deref(), host, port)),
        Commands::Upload { input } => rt.block_on(upload(cli.config.as_deref(), &input)),
        Commands::List { limit, offset } => list(cli.config.as_deref(), limit, offset),
        Commands::Delete { id } => rt.block_on(delete(cli.config.as_deref(), &id)),
        Commands::TestBots => rt.block_on(test_bots(cli.config.as_deref())),
        Commands::Config => print_config(cli.config.as_deref()),
        Commands::DbStats => db_stats(cli.config.as_deref()),
    }
}

async fn serve(
    config_path: Option<&std::path::Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config_or_default(config_path)?;
    if let Some(host) = host {
        config.server.local_host = host;
    }
    if let Some(port) = port {
        config.server.local_port = port;
    }

    let db = init_pool(&config.database.path.to_string_lossy())?;

    tracing::info!(host = %config.server.local_host, port = config.server.local_port, "starting vaultcast server");
    start_server(config, db).await?;
    Ok(())
}

async fn upload(config_path: Option<&std::path::Path>, input: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        eprintln!("input file does not exist: {}", input.display());
        std::process::exit(1);
    }

    let config = load_config_or_default(config_path)?;
    let db = init_pool(&config.database.path.to_string_lossy())?;
    let driver: Arc<dyn TranscoderDriver> = Arc::new(FfmpegDriver::new());
    let (coordinator, ..) = build_coordinator(&config, db, driver);

    let original_filename = input.file_name().and_then(|n| n.to_str()).unwrap_or("upload");

    match coordinator.ingest(input, original_filename).await {
        Ok(video_id) => {
            println!("ingested {video_id}");
            Ok(())
        }
        Err(err) => {
            eprintln!("ingest failed: {err}");
            std::process::exit(1);
        }
    }
}

fn list(config_path: Option<&std::path::Path>, limit: i64, offset: i64) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_default(config_path)?;
    let db = init_pool(&config.database.path.to_string_lossy())?;
    let conn = get_conn(&db)?;

    let videos = vaultcast_db::queries::videos::list(&conn, limit, offset)?;
    if videos.is_empty() {
        println!("no videos in catalog");
        return Ok(());
    }

    println!("{:<24} {:<10} {:>10} {:>10} {:>12}", "id", "status", "segments", "codec", "bytes");
    for video in videos {
        println!(
            "{:<24} {:<10} {:>10} {:>10} {:>12}",
            video.id,
            video.status,
            video.total_segments,
            video.video_codec.as_deref().unwrap_or("-"),
            video.byte_size,
        );
    }
    Ok(())
}

async fn delete(config_path: Option<&std::path::Path>, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_default(config_path)?;
    let db = init_pool(&config.database.path.to_string_lossy())?;
    let driver: Arc<dyn TranscoderDriver> = Arc::new(FfmpegDriver::new());
    let (coordinator, ..) = build_coordinator(&config, db, driver);

    let video_id = VideoId::new(id);
    match coordinator.delete(&video_id).await {
        Ok(true) => {
            println!("deleted {video_id}");
            Ok(())
        }
        Ok(false) => {
            eprintln!("no such video: {video_id}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("delete failed: {err}");
            std::process::exit(1);
        }
    }
}

async fn test_bots(config_path: Option<&std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_default(config_path)?;
    if config.accounts.is_empty() {
        println!("no accounts configured");
        return Ok(());
    }

    let blob = Arc::new(RemoteBlobClient::new(
        vaultcast_blob::AccountList::new(config.accounts.clone()),
        config.upload.requests_per_second,
        config.upload.upload_retries,
    ));

    let mut all_ok = true;
    let mut handles = Vec::new();
    for account in config.accounts {
        let blob = blob.clone();
        handles.push(tokio::spawn(async move {
            let result = blob.ping(&account.id).await;
            (account.id, result)
        }));
    }

    for handle in handles {
        let (id, result) = handle.await?;
        match result {
            Ok(()) => println!("[{:>4}] {}", "OK", id),
            Err(err) => {
                all_ok = false;
                println!("[FAIL] {id}: {err}");
            }
        }
    }

    if !all_ok {
        std::process::exit(1);
    }
    Ok(())
}

fn print_config(config_path: Option<&std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_default(config_path)?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn db_stats(config_path: Option<&std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_default(config_path)?;
    let db = init_pool(&config.database.path.to_string_lossy())?;
    let conn = get_conn(&db)?;

    let total = vaultcast_db::queries::videos::count(&conn)?;
    let processing = vaultcast_db::queries::videos::list_processing(&conn)?.len();

    println!("total videos:      {total}");
    println!("processing:        {processing}");
    Ok(())
}
