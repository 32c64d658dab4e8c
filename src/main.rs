use std::env;
use std::path::Path;
use std::process::exit;

use clap::App;
use clap::Arg;
use slog::info;
use slog::Logger;

use zkgate::format_fail;
use zkgate::logging;
use zkgate::logging::LogLevel;
use zkgate::Config;
use zkgate::Result;
use zkgate::Session;

const ROOT_NODE: &str = "/study";
const CHILD_NODE: &str = "/study/0727";

fn main() {
    // Enable backtraces if the user did not set them.
    let have_rust = env::var("RUST_BACKTRACE").is_ok();
    let have_failure = env::var("RUST_FAILURE_BACKTRACE").is_ok();
    if !have_rust && !have_failure {
        env::set_var("RUST_FAILURE_BACKTRACE", "1");
    }

    if let Err(error) = run() {
        println!("{}", format_fail(&error));
        exit(1);
    }
}

/// Parse command line, load configuration, walk the demo namespace.
fn run() -> Result<()> {
    let args = App::new("zkgate")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .default_value("zkgate.yaml")
                .help("Specifies the configuration file to use")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .possible_values(&LogLevel::variants())
                .case_insensitive(true)
                .help("Verbosity of the logger")
                .takes_value(true),
        )
        .get_matches();

    let level = args
        .value_of("log-level")
        .map(|level| level.parse::<LogLevel>().expect("clap validated the log level"))
        .unwrap_or_default();
    let logger = logging::configure(level);

    let location = args.value_of("config").expect("clap provides a default config path");
    let config = if Path::new(location).exists() {
        info!(logger, "Loading configuration"; "config" => location);
        Config::from_file(location)?
    } else {
        info!(logger, "Configuration file not found, using defaults"; "config" => location);
        Config::default()
    };

    info!(
        logger, "Opening zookeeper session";
        "ensemble" => &config.ensemble,
        "timeout" => config.timeout,
    );
    let session = Session::open(config, logger.clone())?;
    session.wait_connected()?;

    let result = walk(&session, &logger);
    session.close()?;
    if result.is_ok() {
        info!(logger, "Namespace walkthrough complete");
    }
    result
}

/// Exercise every facade operation against a small fixed namespace.
fn walk(session: &Session, logger: &Logger) -> Result<()> {
    // Bootstrap the root node only when missing.
    if session.exists(ROOT_NODE)?.is_none() {
        session.create(ROOT_NODE, b"root-data")?;
    }

    // Watch the child before it exists: creation fires the callback.
    let meta = session.exists_watch(CHILD_NODE, watch_printer(logger))?;
    if meta.is_none() {
        session.create(CHILD_NODE, b"child-data")?;
    }

    let children = session.list_children_watch(ROOT_NODE, watch_printer(logger))?;
    info!(
        logger, "Listed children";
        "path" => ROOT_NODE,
        "children" => format!("{:?}", children),
    );

    let (data, meta) = session.read_watch(CHILD_NODE, watch_printer(logger))?;
    info!(
        logger, "Fetched node data";
        "path" => CHILD_NODE,
        "data" => String::from_utf8_lossy(&data).into_owned(),
        "version" => meta.version,
    );

    let meta = session.update(CHILD_NODE, b"new-data", Some(meta.version))?;
    let (data, _) = session.read(CHILD_NODE)?;
    info!(
        logger, "Fetched node data";
        "path" => CHILD_NODE,
        "data" => String::from_utf8_lossy(&data).into_owned(),
        "version" => meta.version,
    );

    session.delete(CHILD_NODE, None)?;
    let present = session.exists(CHILD_NODE)?.is_some();
    info!(logger, "Checked deleted node"; "path" => CHILD_NODE, "present" => present);
    Ok(())
}

/// One-shot callback logging the event that consumed the watch.
fn watch_printer(logger: &Logger) -> impl FnOnce(zkgate::NodeEvent) + Send + 'static {
    let logger = logger.clone();
    move |event| {
        info!(logger, "Watch fired"; "path" => event.path, "kind" => ?event.kind);
    }
}
