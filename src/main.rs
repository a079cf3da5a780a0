use anyhow::{Context, Error};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod destination;
mod error;
mod gzip;
mod link;
mod materialize;
mod offset;
mod path;
mod rewrite;
mod transcode;

const APP_NAME: &str = env!("CARGO_BIN_NAME");
const LOG_VAR: &str = "TARMAGIC_LOG";

#[derive(Debug, Parser)]
#[command(name = APP_NAME, version, about)]
struct App {
    /// The archive to read, a `.tar` or a gzip compressed `.gz`.
    #[arg(short = 'f', long = "file", value_name = "SOURCE")]
    source: String,

    /// Where to put the selected entries.
    ///
    /// A path ending in `.tar` or `.gz` receives a new archive (compressed for `.gz`), anything
    /// else must name an existing directory the entries are extracted into.
    #[arg(short, long, value_name = "DEST")]
    destination: String,

    /// Only process entries below this directory of the archive, and strip it from their paths.
    ///
    /// The directory entry itself is skipped. By default the whole archive is processed.
    #[arg(short, long, default_value = "")]
    offset: String,

    /// Increase logging verbosity
    #[arg(short, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// Decrease logging verbosity
    #[arg(short, action = clap::ArgAction::Count)]
    quietness: u8,
}

impl App {
    #[culpa::throws]
    #[tracing::instrument(fields(%self))]
    fn run(self) {
        tracing::trace!("starting app");
        transcode::Job::new(&self.source, &self.destination, &self.offset)?.run()?;
    }

    fn log_level(&self) -> LevelFilter {
        const LEVELS: [LevelFilter; 6] = [
            LevelFilter::OFF,
            LevelFilter::ERROR,
            LevelFilter::WARN,
            LevelFilter::INFO,
            LevelFilter::DEBUG,
            LevelFilter::TRACE,
        ];
        let level = (2 - i16::from(self.quietness) + i16::from(self.verbosity))
            .clamp(0, LEVELS.len() as i16 - 1);
        LEVELS[usize::try_from(level).expect("clamped into range")]
    }

    #[culpa::throws]
    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::new("WARN").add_directive(self.log_level().into());
        if let Some(directive) = get_env_directive(LOG_VAR)? {
            filter = filter.add_directive(directive);
        }
        filter
    }
}

impl std::fmt::Display for App {
    #[culpa::throws(std::fmt::Error)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) {
        write!(f, "{} -f {:?} -d {:?}", APP_NAME, self.source, self.destination)?;
        if !self.offset.is_empty() {
            write!(f, " -o {:?}", self.offset)?;
        }
        for _ in 0..self.verbosity {
            write!(f, " -v")?;
        }
        for _ in 0..self.quietness {
            write!(f, " -q")?;
        }
    }
}

#[culpa::throws]
#[fn_error_context::context("parsing directive {:?}", directive)]
fn parse_directive(directive: &str) -> tracing_subscriber::filter::Directive {
    directive.parse()?
}

#[culpa::throws]
#[fn_error_context::context("getting directive from env var {:?}", var)]
fn get_env_directive(var: &str) -> Option<tracing_subscriber::filter::Directive> {
    if let Some(value) = std::env::var_os(var) {
        let s = value
            .to_str()
            .with_context(|| format!("{var} not unicode"))?;
        Some(parse_directive(s)?)
    } else {
        None
    }
}

fn base_env_filter() -> EnvFilter {
    let mut filter = EnvFilter::new("WARN");
    // errors surface again when the final filter is built
    if let Ok(Some(directive)) = get_env_directive(LOG_VAR) {
        filter = filter.add_directive(directive);
    }
    filter
}

#[culpa::throws]
fn main() {
    let (app, filter) = tracing::subscriber::with_default(
        tracing_subscriber::fmt()
            .with_env_filter(base_env_filter())
            .with_writer(std::io::stderr)
            .pretty()
            .finish(),
        || {
            let app = App::parse();
            app.env_filter().map(|filter| (app, filter))
        },
    )?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .pretty()
        .init();
    app.run()?;
}
