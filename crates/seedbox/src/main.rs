use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use libseedbox::{
    chunker::DEFAULT_MAX_LENGTH,
    config::Config,
    http_api::HttpApi,
    library::Library,
    links::LinkBuilder,
    tracing_subscriber_config_utils::{InitLoggingOptions, init_logging},
};
use tracing::info;

#[cfg(feature = "rqbit")]
mod download;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Parser)]
#[command(version, author, about)]
struct Opts {
    /// The console loglevel
    #[arg(value_enum, short = 'v')]
    log_level: Option<LogLevel>,

    /// The log filename to also write to in addition to the console.
    #[arg(long = "log-file", env = "SEEDBOX_LOG_FILE")]
    log_file: Option<String>,

    /// The value for RUST_LOG in the log file
    #[arg(
        long = "log-file-rust-log",
        default_value = "info,libseedbox=debug",
        env = "SEEDBOX_LOG_FILE_RUST_LOG"
    )]
    log_file_rust_log: String,

    /// Path to a JSON config file. Defaults are used for anything missing.
    #[arg(short = 'c', long = "config", env = "SEEDBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the listen address of the media server.
    #[arg(long = "http-listen-addr", env = "SEEDBOX_HTTP_LISTEN_ADDR")]
    http_listen_addr: Option<SocketAddr>,

    /// Set this flag if you want to use tokio's single threaded runtime.
    #[arg(short, long)]
    single_thread_runtime: bool,

    /// How many threads to spawn for the executor.
    #[arg(short = 't', long)]
    worker_threads: Option<usize>,

    #[command(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
struct ServeOpts {
    /// Start downloading this magnet or torrent link while serving.
    #[cfg(feature = "rqbit")]
    #[arg(long)]
    download: Option<String>,
}

#[derive(Parser)]
struct ArchiveOpts {
    /// Name of the downloaded item, as printed by `list`.
    name: String,

    /// Compression level, 0 (store) to 9.
    #[arg(short, long, default_value_t = 0)]
    level: i64,
}

#[derive(Parser)]
enum SubCommand {
    /// Run the media server.
    Serve(ServeOpts),
    /// Print browser, download and stream links for every downloaded video.
    Links {
        /// Maximum length of one printed message.
        #[arg(long, default_value_t = DEFAULT_MAX_LENGTH)]
        max_length: usize,
    },
    /// List downloaded items.
    List,
    /// List archives.
    ListArchives,
    /// Pack a downloaded item into a zip archive and print its link.
    Archive(ArchiveOpts),
    /// Remove a downloaded item.
    Delete { name: String },
    /// Remove an archive.
    DeleteArchive { file_name: String },
    /// Remove all downloaded items and archives.
    Clean,
    /// Download a magnet or torrent link, then print the video links.
    #[cfg(feature = "rqbit")]
    Download { link: String },
}

fn load_config(opts: &Opts) -> anyhow::Result<Config> {
    let mut config = match &opts.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(addr) = opts.http_listen_addr {
        config.http.host = addr.ip();
        config.http.port = addr.port();
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    let mut rt_builder = match opts.single_thread_runtime {
        true => tokio::runtime::Builder::new_current_thread(),
        false => {
            let mut b = tokio::runtime::Builder::new_multi_thread();
            if let Some(e) = opts.worker_threads {
                b.worker_threads(e);
            }
            b
        }
    };

    let rt = rt_builder.enable_time().enable_io().build()?;

    rt.block_on(async_main(opts))
}

async fn async_main(opts: Opts) -> anyhow::Result<()> {
    let log_level = opts.log_level.map(|level| match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    });
    init_logging(InitLoggingOptions {
        default_rust_log_value: log_level,
        log_file: opts.log_file.as_deref(),
        log_file_rust_log: Some(&opts.log_file_rust_log),
    })?;

    let config = load_config(&opts)?;
    let library = Library::new(
        config.storage.download_dir.clone(),
        config.storage.archive_dir.clone(),
    );
    library
        .prepare()
        .await
        .context("error creating storage folders")?;
    let links = LinkBuilder::new(&config);

    match &opts.subcommand {
        SubCommand::Serve(serve_opts) => {
            let listen_addr = config.http.listen_addr();
            let listener = tokio::net::TcpListener::bind(listen_addr)
                .await
                .with_context(|| format!("error binding to {listen_addr}"))?;
            let http_api = HttpApi::new(&config)?;

            #[cfg(feature = "rqbit")]
            let _transfer = match &serve_opts.download {
                Some(link) => Some(download::start_in_background(&config, link).await?),
                None => None,
            };
            #[cfg(not(feature = "rqbit"))]
            let _ = serve_opts;

            http_api
                .make_http_api_and_run(listener)
                .await
                .context("error running media server")
        }
        SubCommand::Links { max_length } => {
            for message in links.render_video_links(*max_length)? {
                println!("{message}");
            }
            Ok(())
        }
        SubCommand::List => {
            for name in library.list_downloaded().await? {
                println!("{name}");
            }
            Ok(())
        }
        SubCommand::ListArchives => {
            for name in library.list_archives().await? {
                println!("{name}  {}", links.archive_link(&name));
            }
            Ok(())
        }
        SubCommand::Archive(archive_opts) => {
            let dest = library
                .archive_item(&archive_opts.name, archive_opts.level)
                .await?;
            info!(?dest, "archive created");
            let file_name = dest
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .context("archive path has no file name")?;
            println!("{}", links.archive_link(&file_name));
            Ok(())
        }
        SubCommand::Delete { name } => {
            library.delete_downloaded(name).await?;
            Ok(())
        }
        SubCommand::DeleteArchive { file_name } => {
            library.delete_archive(file_name).await?;
            Ok(())
        }
        SubCommand::Clean => {
            library.clean().await?;
            info!("removed all downloads and archives");
            Ok(())
        }
        #[cfg(feature = "rqbit")]
        SubCommand::Download { link } => download::run(&config, &links, link).await,
    }
}
