use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use media_storage::models::{
    ListOptions, ResourceType, TransformOptions, UploadOptions, UploadRequest,
};
use media_storage::{mime, StorageConfig, StorageFacade};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "media-storage")]
#[command(about = "Store, inspect and delete media through the configured provider")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload files. Several files are uploaded concurrently, all or nothing.
    Upload {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
        #[arg(long, default_value = "uploads")]
        folder: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Upload a profile picture.
    Avatar {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    Delete {
        #[arg(required = true, value_name = "PUBLIC_ID")]
        ids: Vec<String>,
        #[arg(long, default_value = "image")]
        resource_type: ResourceType,
    },
    Info {
        #[arg(value_name = "PUBLIC_ID")]
        id: String,
        #[arg(long, default_value = "image")]
        resource_type: ResourceType,
    },
    List {
        #[arg(long, default_value = "")]
        folder: String,
        #[arg(long, default_value_t = 100)]
        max_results: u32,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long, default_value = "image")]
        resource_type: ResourceType,
    },
    /// Print an optimized delivery URL.
    Url {
        #[arg(value_name = "PUBLIC_ID")]
        id: String,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
    },
    /// Print the poster-frame URL of a stored video.
    Thumbnail {
        #[arg(value_name = "PUBLIC_ID")]
        id: String,
    },
    /// Show the active provider and upload limits.
    StorageInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Thumbnail {
    public_id: String,
    thumbnail_url: String,
}

async fn read_upload(path: &Path) -> Result<UploadRequest> {
    let buffer = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string();
    let mime_type = mime::resolve_mime(path, &buffer);

    Ok(UploadRequest::new(buffer, name, mime_type))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(storage: &StorageFacade, command: Command) -> Result<()> {
    match command {
        Command::Upload {
            paths,
            folder,
            tags,
        } => {
            let options = UploadOptions {
                tags,
                ..UploadOptions::default()
            };
            let mut files = Vec::with_capacity(paths.len());
            for path in &paths {
                files.push(read_upload(path).await?);
            }

            if files.len() == 1 {
                let file = files.remove(0);
                print_json(&storage.upload_file(file, &folder, &options).await?)
            } else {
                let results = storage
                    .upload_multiple_files(files, &folder, &options)
                    .await?;
                info!("{} files uploaded successfully", results.len());
                print_json(&results)
            }
        }
        Command::Avatar { path } => {
            let file = read_upload(&path).await?;
            print_json(&storage.upload_avatar(file).await?)
        }
        Command::Delete { ids, resource_type } => {
            let result = if ids.len() == 1 {
                storage.delete_file(&ids[0], resource_type).await?
            } else {
                storage.delete_multiple_files(&ids, resource_type).await?
            };
            print_json(&result)
        }
        Command::Info { id, resource_type } => {
            print_json(&storage.get_file_info(&id, resource_type).await?)
        }
        Command::List {
            folder,
            max_results,
            cursor,
            resource_type,
        } => {
            let options = ListOptions {
                max_results,
                cursor,
                resource_type,
            };
            print_json(&storage.list_files(&folder, &options).await?)
        }
        Command::Url { id, width, height } => {
            let transform = TransformOptions::default().with_size(width, height);
            println!("{}", storage.get_optimized_url(&id, &transform));
            Ok(())
        }
        Command::Thumbnail { id } => {
            let thumbnail_url = storage
                .get_video_thumbnail_url(&id)
                .context("Video thumbnail not available")?;
            print_json(&Thumbnail {
                public_id: id,
                thumbnail_url,
            })
        }
        Command::StorageInfo => print_json(&storage.storage_info()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let storage = match StorageConfig::from_env() {
        Ok(config) => StorageFacade::from_config(&config).await,
        Err(e) => Err(e),
    };

    match storage {
        Ok(storage) => match run(&storage, args.command).await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("{:#}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            std::process::exit(1);
        }
    }
}
