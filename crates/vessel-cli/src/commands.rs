use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use tracing::debug;
use vessel_sdk::{
    BackendConfig, BlobObject, BlobRef, BlobStorage, DeleteOutcome, LoggingListener,
    StorageConfig, StoreBlobRequest, UpdateAttributesRequest,
};

use crate::cli::{AttrsArgs, Cli, Command, GetArgs, OutputFormat, RefArgs, StoreArgs};

/// Backend root used when neither `--root` nor `--config` is given.
const DEFAULT_ROOT: &str = ".vessel";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let storage = open_storage(cli.config.as_deref(), cli.root.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Store(args) => cmd_store(&storage, args, format),
        Command::Get(args) => cmd_get(&storage, args),
        Command::Info(args) => cmd_info(&storage, args, format),
        Command::Exists(args) => cmd_exists(&storage, args, format),
        Command::Delete(args) => cmd_delete(&storage, args, format),
        Command::Attrs(args) => cmd_attrs(&storage, args, format),
    }
}

fn open_storage(config: Option<&Path>, root: Option<&Path>) -> anyhow::Result<BlobStorage> {
    let mut config = match config {
        Some(path) => StorageConfig::load(path)?,
        None => StorageConfig {
            backend: BackendConfig::Fs {
                root: PathBuf::from(DEFAULT_ROOT),
            },
            ..StorageConfig::default()
        },
    };
    if let Some(root) = root {
        config.backend = BackendConfig::Fs {
            root: root.to_path_buf(),
        };
    }
    debug!(name = %config.name, backend = ?config.backend, "opening storage");
    let storage = BlobStorage::from_config(&config).context("failed to open storage")?;
    storage.events().add_listener(Arc::new(LoggingListener));
    Ok(storage)
}

fn parse_ref(raw: &str) -> anyhow::Result<BlobRef> {
    BlobRef::parse(raw).with_context(|| format!("invalid blob reference {raw:?}"))
}

fn cmd_store(storage: &BlobStorage, args: StoreArgs, format: OutputFormat) -> anyhow::Result<()> {
    let file = File::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;
    let size = file.metadata()?.len();

    let name = match args.name {
        Some(name) => name,
        None => args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("file has no name; pass --name")?,
    };

    let mut builder = StoreBlobRequest::builder();
    builder.original_name(&name).declared_size(Some(size));
    if let Some(content_type) = args.content_type.or_else(|| guess_content_type(&args.file)) {
        builder.content_type(content_type);
    }
    for (key, value) in args.attrs {
        builder.attribute(key, value);
    }
    let request = builder.build()?;

    let stored = storage.store(file, request)?;
    match format {
        OutputFormat::Json => print_json(stored.blob())?,
        OutputFormat::Text => {
            println!(
                "{} Stored {} as {}",
                "✓".green().bold(),
                name,
                stored.blob().stored_ref().as_str().cyan()
            );
        }
    }
    Ok(())
}

fn cmd_get(storage: &BlobStorage, args: GetArgs) -> anyhow::Result<()> {
    let blob_ref = parse_ref(&args.blob_ref)?;
    let stored = storage.get_by_ref(&blob_ref)?;
    let mut reader = stored.open().context("failed to open blob content")?;

    match args.output {
        Some(path) => {
            let mut out = File::create(&path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            let copied = io::copy(&mut reader, &mut out)?;
            out.flush()?;
            eprintln!(
                "{} Wrote {} bytes to {}",
                "✓".green().bold(),
                copied,
                path.display()
            );
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            io::copy(&mut reader, &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}

fn cmd_info(storage: &BlobStorage, args: RefArgs, format: OutputFormat) -> anyhow::Result<()> {
    let blob_ref = parse_ref(&args.blob_ref)?;
    let stored = storage.get_by_ref(&blob_ref)?;
    match format {
        OutputFormat::Json => print_json(stored.blob())?,
        OutputFormat::Text => print_blob(stored.blob()),
    }
    Ok(())
}

fn cmd_exists(storage: &BlobStorage, args: RefArgs, format: OutputFormat) -> anyhow::Result<()> {
    let blob_ref = parse_ref(&args.blob_ref)?;
    let exists = storage.exists_by_ref(&blob_ref)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "ref": blob_ref.as_str(),
            "exists": exists,
        }))?,
        OutputFormat::Text if exists => println!("{} {}", "✓".green().bold(), blob_ref),
        OutputFormat::Text => println!("{} {} not found", "✗".red().bold(), blob_ref),
    }
    Ok(())
}

fn cmd_delete(storage: &BlobStorage, args: RefArgs, format: OutputFormat) -> anyhow::Result<()> {
    let blob_ref = parse_ref(&args.blob_ref)?;
    let outcome = storage.remove_by_ref(&blob_ref)?;
    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "ref": blob_ref.as_str(),
            "deleted": outcome.is_deleted(),
        }));
    }
    match outcome {
        DeleteOutcome::Deleted => println!("{} Deleted {}", "✓".green().bold(), blob_ref),
        DeleteOutcome::Denied => {
            bail!("delete of {blob_ref} was refused by policy")
        }
    }
    Ok(())
}

fn cmd_attrs(storage: &BlobStorage, args: AttrsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let blob_ref = parse_ref(&args.blob_ref)?;

    let blob = if args.set.is_empty() && args.unset.is_empty() {
        storage.get_by_ref(&blob_ref)?.into_blob()
    } else {
        let mut builder = UpdateAttributesRequest::builder();
        for (key, value) in args.set {
            builder.set(key, value);
        }
        for key in args.unset {
            builder.remove(key);
        }
        storage.update_by_ref(&blob_ref, builder.build()?)?.into_blob()
    };

    match format {
        OutputFormat::Json => print_json(blob.attributes())?,
        OutputFormat::Text => {
            if blob.attributes().is_empty() {
                println!("{}", "(no attributes)".dimmed());
            }
            for (key, value) in blob.attributes().iter() {
                println!("{} = {}", key.bold(), value);
            }
        }
    }
    Ok(())
}

fn print_blob(blob: &BlobObject) {
    println!("{}", blob.stored_ref().as_str().cyan().bold());
    println!("  {:<14} {}", "name:".dimmed(), blob.original_name());
    println!("  {:<14} {}", "content type:".dimmed(), blob.content_type());
    match blob.size() {
        Some(size) => println!("  {:<14} {} bytes", "size:".dimmed(), size),
        None => println!("  {:<14} unknown", "size:".dimmed()),
    }
    println!("  {:<14} {}", "uploaded:".dimmed(), blob.uploaded_at().to_rfc3339());
    println!("  {:<14} {}", "modified:".dimmed(), blob.last_modified_at().to_rfc3339());
    for (key, value) in blob.attributes().iter() {
        println!("  {:<14} {}", format!("@{key}:").dimmed(), value);
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn guess_content_type(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let ct = match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "json" => "application/json",
        "toml" => "application/toml",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(ct.to_string())
}
