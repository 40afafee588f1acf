use clap::Parser;
use color_eyre::Result;
use grid::cli::{Cli, Commands, Session};
use grid::config::ConfigSource;
use grid::{Config, Database, Profile, SystemClock, logging, utils};
use std::rc::Rc;

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let source = match cli.config.as_deref() {
        Some(path) => ConfigSource::File(utils::expand_path(path)),
        None => ConfigSource::Profile(profile),
    };
    let mut config = Config::load_from(&source)?;

    if let Err(e) = logging::init_logging(&config.log_level, &config.get_log_dir()) {
        eprintln!("WARNING: file logging disabled: {}", e);
    }

    let db_path = config.get_database_path();
    let db = Database::new(
        db_path
            .to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?,
    )?;

    let mut session = Session::open(Rc::new(db), SystemClock, &config)?;

    let command = cli.command.unwrap_or(Commands::Board);
    grid::cli::run(command, &mut session, &mut config, &source)?;

    Ok(())
}
