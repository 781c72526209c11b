#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI that drains a POP3S mailbox into a directory

use clap::Parser;
use pop_unpack::{MailFetcher, Options, Overrides, Progress, Settings, SubdirMode};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fetch-pop")]
#[command(about = "Fetch contents of a POP3S mailbox and unpack its contents")]
#[allow(clippy::struct_excessive_bools)]
struct Args {
    /// User name (email)
    #[arg(long)]
    user: Option<String>,

    /// Password
    #[arg(long)]
    password: Option<String>,

    /// POP3 server
    #[arg(long)]
    server: Option<String>,

    /// POP3S port [default: 995]
    #[arg(long)]
    port: Option<u16>,

    /// Directory to store message contents into
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Create sub-directories based on message UIDs
    #[arg(long, conflicts_with = "subject")]
    subdirs: bool,

    /// Create sub-directories based on message Subject
    #[arg(long)]
    subject: bool,

    /// Do not delete messages on the server
    #[arg(long)]
    no_delete: bool,

    /// Accept any server certificate
    #[arg(long)]
    insecure: bool,

    /// Reduce attachment filenames and subject directories to a
    /// single safe path component
    #[arg(long)]
    sanitize_filenames: bool,

    /// Print one JSON object per unpacked message
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let options = Options {
        delete_on_fetch: !args.no_delete,
        subdir_mode: SubdirMode::from_flags(args.subdirs, args.subject)?,
        insecure: args.insecure,
        sanitize_filenames: args.sanitize_filenames,
    };
    let overrides = Overrides {
        user: args.user,
        password: args.password,
        server: args.server,
        port: args.port,
        directory: args.directory,
    };

    let settings = Settings::from_sources(&overrides, options)?;
    let fetcher = MailFetcher::new(settings);
    let json = args.json;

    fetcher
        .run(|progress| match progress {
            Progress::Started {
                sequence,
                uid,
                subject,
            } if !json => println!("Processing {sequence}/{uid}: {subject}"),
            Progress::Unpacked(message) if json => match serde_json::to_string(message) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!(
                    "Cannot serialize message {} unpacked into {}: {}",
                    message.uid,
                    message.directory.display(),
                    e
                ),
            },
            _ => {}
        })
        .await?;

    Ok(())
}
