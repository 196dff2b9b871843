use std::sync::Arc;

use clap::Parser;
use notion2github::{
	Publisher, RealGithubClient, RealNotionClient, TokioSleeper,
	config::{Cli, LOG_DIRECTIVES_ENV, Settings},
	run,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() {
	{
		color_eyre::config::HookBuilder::default()
			.capture_span_trace_by_default(false)
			.install()
			.expect("color_eyre hook already set");
		miette::set_hook(Box::new(|_| Box::new(miette::MietteHandlerOpts::new().terminal_links(true).context_lines(3).build()))).expect("miette hook already set");
	}

	let cli = Cli::parse();
	init_subscriber(cli.args.settings_flags.verbose);

	let settings = match Settings::resolve(cli.args, |var| std::env::var(var).ok()) {
		Ok(s) => s,
		Err(e) => {
			eprintln!("Error: {e:?}");
			std::process::exit(1);
		}
	};

	let sleeper = Arc::new(TokioSleeper);
	let github = Arc::new(RealGithubClient::new(settings.github_token.clone()));
	let publisher = Publisher::new(github, settings.repo, settings.retry, sleeper.clone());

	let result = run::run(&settings.source, |token| Arc::new(RealNotionClient::new(token.into_inner())), &publisher, sleeper.as_ref(), settings.run).await;

	match result {
		Ok(stats) => {
			tracing::debug!(?stats, "backlog exhausted");
			std::process::exit(0);
		}
		Err(e) => {
			eprintln!("{}", e.render());
			std::process::exit(1);
		}
	}
}

/// Filter comes from `LOG_DIRECTIVES`; `--verbose` only changes the fallback.
fn init_subscriber(verbose: bool) {
	let fallback = if verbose {
		concat!("info,", env!("CARGO_PKG_NAME"), "=debug")
	} else {
		concat!("info,", env!("CARGO_PKG_NAME"), "=info")
	};
	let filter = EnvFilter::try_from_env(LOG_DIRECTIVES_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.with(tracing_error::ErrorLayer::default())
		.init();
}
