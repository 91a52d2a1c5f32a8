//! edmission command line.
//!
//! `edmission run` drives the game until the mission cap is reached or
//! Ctrl-C is pressed. The `rules` and `config` subcommands manage the files
//! a run reads.

use std::{
	io::{self, BufRead, Write},
	path::PathBuf,
	process::ExitCode,
	sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use data::{Rule, RuleRegistry};
use edmission::{
	CancelToken, Config, Runner,
	game::EliteDangerous,
	input,
	notify::{DiscordWebhook, Notifier, Silent},
	runner, watch,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "edmission", version, about = "Accept Elite Dangerous missions that match your rules")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Scan the mission board until the cap is reached or Ctrl-C.
	Run(RunArgs),
	/// Manage the rule file.
	Rules {
		#[command(subcommand)]
		command: RulesCommand,
	},
	/// Manage the config file.
	Config {
		#[command(subcommand)]
		command: ConfigCommand,
	},
}

#[derive(Args)]
struct RunArgs {
	/// Match and report missions without accepting them.
	#[arg(long)]
	dry_run: bool,
	/// Never prompt on stdin.
	#[arg(long)]
	non_interactive: bool,
	/// Missions already accepted. Read from the screen when omitted.
	#[arg(long, value_name = "N")]
	accepted: Option<u32>,
	#[arg(long, value_name = "N")]
	max_missions: Option<u32>,
	/// Minutes between sweeps.
	#[arg(long, value_name = "MINUTES")]
	poll_interval: Option<u64>,
	/// Debug logging.
	#[arg(long)]
	debug: bool,
}

#[derive(Subcommand)]
enum RulesCommand {
	/// Print the active rules in priority order.
	List,
	/// Write the active rules to a JSON file.
	Export { path: PathBuf },
	/// Validate a JSON rule file and make it the active rule file.
	Import { path: PathBuf },
}

#[derive(Subcommand)]
enum ConfigCommand {
	/// Write the config file with default values if it does not exist.
	Init,
}

fn main() -> ExitCode {
	let cli = Cli::parse();

	let debug = matches!(&cli.command, Command::Run(args) if args.debug);
	let filter = if debug {
		EnvFilter::new("debug")
	} else {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
	};
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let result = match cli.command {
		Command::Run(args) => run(args),
		Command::Rules { command } => rules(command).map(|()| ExitCode::SUCCESS),
		Command::Config { command: ConfigCommand::Init } => config_init().map(|()| ExitCode::SUCCESS),
	};
	match result {
		Ok(code) => code,
		Err(err) => {
			tracing::error!(error = %format!("{err:#}"), "edmission failed");
			ExitCode::FAILURE
		}
	}
}

fn run(args: RunArgs) -> Result<ExitCode> {
	let mut config = Config::try_load().context("Load configuration")?;
	config.apply_env().context("Environment override")?;
	config.dry_run |= args.dry_run;
	config.interactive &= !args.non_interactive;
	if let Some(cap) = args.max_missions {
		config.max_missions = cap;
	}
	if let Some(minutes) = args.poll_interval {
		config.poll_interval_minutes = minutes;
	}
	config.validate().context("Invalid configuration")?;

	if config.interactive && config.discord_webhook_url.is_none() {
		config.discord_webhook_url = prompt("Discord webhook URL (blank for none): ")?;
	}
	let explicit_accepted = match args.accepted {
		Some(count) => Some(count),
		None if config.interactive => prompt_count("Missions already accepted (blank to read from screen): ")?,
		None => None,
	};

	let registry = Arc::new(load_rules(&config)?);
	let _watcher = config.rules_path.as_deref().and_then(|path| {
		watch::watch_rules(path, registry.clone())
			.inspect_err(|err| tracing::warn!(error = %format!("{err:#}"), "rule file will not be reloaded"))
			.ok()
	});

	let notifier: Box<dyn Notifier> = match &config.discord_webhook_url {
		Some(url) => Box::new(DiscordWebhook::new(url.clone())),
		None => Box::new(Silent),
	};

	let cancel = CancelToken::new();
	listen_for_interrupt(cancel.clone());

	let game = match input::system_keyboard().and_then(|keys| EliteDangerous::from_config(&config, keys)) {
		Ok(game) => game,
		Err(err) => {
			let summary = runner::abort(config.max_missions, explicit_accepted.unwrap_or(0), err, notifier.as_ref());
			return Ok(ExitCode::from(summary.exit_code()));
		}
	};

	let initial = match runner::initial_accepted(explicit_accepted, &game) {
		Ok(count) => count,
		Err(err) => {
			let summary = runner::abort(config.max_missions, 0, err, notifier.as_ref());
			return Ok(ExitCode::from(summary.exit_code()));
		}
	};

	let runner = Runner::new(&game, &game, &registry, notifier.as_ref(), cancel, config.runner_settings());
	let summary = runner.run(initial);
	println!(
		"{:?}: {} accepted, {} errors, {} polls",
		summary.outcome, summary.accepted_count, summary.errors, summary.polls
	);
	Ok(ExitCode::from(summary.exit_code()))
}

/// Ctrl-C cancels the run. The runner stops at its next check, which is at
/// most one mission away.
fn listen_for_interrupt(cancel: CancelToken) {
	std::thread::spawn(move || {
		let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
			Ok(rt) => rt,
			Err(err) => {
				tracing::warn!(error = %err, "Ctrl-C handler unavailable");
				return;
			}
		};
		rt.block_on(async {
			match tokio::signal::ctrl_c().await {
				Ok(()) => {
					tracing::info!("interrupt received; stopping");
					cancel.cancel();
				}
				Err(err) => tracing::warn!(error = %err, "Ctrl-C handler failed"),
			}
		});
	});
}

fn load_rules(config: &Config) -> Result<RuleRegistry> {
	match &config.rules_path {
		Some(path) if path.exists() => {
			let rules = data::interchange::import_file(path)?;
			tracing::info!(path = %path.display(), count = rules.len(), "loaded rules");
			Ok(RuleRegistry::new(rules))
		}
		Some(path) => {
			tracing::warn!(path = %path.display(), "rule file missing; using built-in rules");
			Ok(RuleRegistry::with_defaults())
		}
		None => Ok(RuleRegistry::with_defaults()),
	}
}

fn rules(command: RulesCommand) -> Result<()> {
	let config = Config::try_load().context("Load configuration")?;
	match command {
		RulesCommand::List => {
			let registry = load_rules(&config)?;
			for (i, rule) in registry.snapshot().iter().enumerate() {
				println!("{:>3}. {rule}", i + 1);
			}
		}
		RulesCommand::Export { path } => {
			let registry = load_rules(&config)?;
			data::interchange::export_file(&path, &registry.snapshot())?;
			println!("Exported {} rules to {}", registry.len(), path.display());
		}
		RulesCommand::Import { path } => {
			let imported = data::interchange::import_file(&path)?;
			let target = install_rules(config, &imported)?;
			println!("Imported {} rules into {}", imported.len(), target.display());
		}
	}
	Ok(())
}

/// Copy validated rules to the configured rule file, creating and
/// registering a default one if none is set.
fn install_rules(mut config: Config, rules: &[Rule]) -> Result<PathBuf> {
	let target = match &config.rules_path {
		Some(path) => path.clone(),
		None => {
			let path = Config::default_rules_path()?;
			config.rules_path = Some(path.clone());
			config.save().context("Save config")?;
			path
		}
	};
	data::interchange::export_file(&target, rules)?;
	Ok(target)
}

fn config_init() -> Result<()> {
	let path = Config::path()?;
	if path.exists() {
		println!("Config already exists at {}", path.display());
		return Ok(());
	}
	Config::default().save()?;
	println!("Wrote default config to {}", path.display());
	Ok(())
}

fn prompt(question: &str) -> Result<Option<String>> {
	print!("{question}");
	io::stdout().flush().context("Flush stdout")?;
	let mut line = String::new();
	io::stdin().lock().read_line(&mut line).context("Read stdin")?;
	let line = line.trim();
	Ok((!line.is_empty()).then(|| line.to_string()))
}

fn prompt_count(question: &str) -> Result<Option<u32>> {
	loop {
		let Some(answer) = prompt(question)? else {
			return Ok(None);
		};
		match answer.parse() {
			Ok(count) => return Ok(Some(count)),
			Err(_) => println!("Please enter a whole number."),
		}
	}
}
