//! The `rootbox` command line front end.

pub mod cli;
pub mod notifier;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, HideAction};
use notifier::ConsoleNotifier;
use rootbox_core::ops::{JsonRepoSource, PmPackageSource, UpdateSource};
use rootbox_core::source::to_uri;
use rootbox_core::{logging, runtime, Config, FileResolver, FlashRequest, Rootbox};
use rootbox_error::RootboxError;
use rootbox_hal::Shell;
use rootbox_workflow::MainLoop;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with(cli.log_file.clone());
    let config = load_config(&cli)?;
    let shell: Arc<dyn Shell> = Arc::new(runtime::su_shell(&config));
    execute(&cli, config, shell, &mut io::stdout())
}

/// Config file, then environment, then flags.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    Ok(config)
}

/// Run one command to completion against `shell`, writing listings to `out`.
pub fn execute(cli: &Cli, config: Config, shell: Arc<dyn Shell>, out: &mut dyn Write) -> Result<()> {
    let main = MainLoop::new();
    let notifier = Arc::new(ConsoleNotifier::new(cli.yes));
    let rootbox = Rootbox::new(config, shell.clone(), notifier, main.handle())?;
    let ops = rootbox.ops();
    let flash_ok = Arc::new(Mutex::new(None));

    let submission = match &cli.command {
        Command::Flash { source, name } => {
            let uri = to_uri(source)?;
            let resolver = Arc::new(FileResolver);
            let request = match name {
                Some(name) => FlashRequest::with_name(uri, name.clone(), resolver),
                None => FlashRequest::new(uri, resolver),
            };
            let sink = flash_ok.clone();
            rootbox.flasher().submit_with(request, move |outcome| {
                if let Ok(mut slot) = sink.lock() {
                    *slot = Some(outcome.is_success());
                }
            })
        }
        Command::Hide { action } => match action {
            HideAction::Add { package } => ops.hide_add(package),
            HideAction::Rm { package } => ops.hide_rm(package),
            HideAction::Enable => ops.hide_enable(),
            HideAction::Disable => ops.hide_disable(),
            HideAction::List => ops.refresh_hide_list(),
        },
        Command::Blocks => ops.scan_blocks(),
        Command::Modules => ops.load_modules(),
        Command::Repos { file } => {
            // Installed versions are needed to flag updates.
            ops.load_modules();
            main.run_until_idle(ops.scheduler());
            ops.load_repos(Arc::new(JsonRepoSource::new(file)))
        }
        Command::Features => ops.probe_features(),
        Command::Apps => ops.load_apps(Arc::new(PmPackageSource::new(shell))),
        Command::Update { file } => ops.check_updates(Arc::new(FileUpdateSource(file.clone()))),
        Command::Reboot => ops.reboot(),
    };

    runtime::ensure_queued(submission)?;
    main.run_until_idle(ops.scheduler());

    report(&cli.command, &rootbox, out).context("failed to write output")?;
    if let Command::Flash { source, .. } = &cli.command {
        let succeeded = flash_ok.lock().map(|slot| *slot == Some(true)).unwrap_or(false);
        if !succeeded {
            return Err(RootboxError::FlashFailed(source.clone()).into());
        }
    }
    Ok(())
}

fn report(command: &Command, rootbox: &Rootbox, out: &mut dyn Write) -> io::Result<()> {
    let state = rootbox.ops().state();
    match command {
        Command::Hide {
            action: HideAction::List,
        } => {
            for package in state.hide_list() {
                writeln!(out, "{}", package)?;
            }
        }
        Command::Blocks => {
            for block in state.block_list() {
                writeln!(out, "{}", block)?;
            }
            match state.boot_block().get() {
                Some(boot) => writeln!(out, "boot: {}", boot)?,
                None => writeln!(out, "boot: unknown")?,
            }
        }
        Command::Modules => {
            for module in state.modules().values() {
                let mut flags = Vec::new();
                if module.disable {
                    flags.push("disabled");
                }
                if module.remove {
                    flags.push("remove");
                }
                if module.update {
                    flags.push("updated");
                }
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    module.id,
                    module.version,
                    module.name,
                    flags.join(",")
                )?;
            }
        }
        Command::Repos { .. } => {
            for repo in state.repos().values() {
                let marker = if repo.update_available { "*" } else { "" };
                writeln!(out, "{}{}\t{}\t{}", repo.id, marker, repo.version, repo.name)?;
            }
        }
        Command::Features => match state.features() {
            Some(flags) => writeln!(
                out,
                "busybox: {}\nhosts: {}\ndisabled: {}",
                flags.busybox, flags.hosts, flags.disabled
            )?,
            None => writeln!(out, "features: unknown")?,
        },
        Command::Apps => {
            let hidden = state.hide_list();
            for app in state.apps() {
                let marker = if hidden.contains(&app.package) { "hidden" } else { "" };
                writeln!(out, "{}\t{}\t{}", app.package, app.label, marker)?;
            }
        }
        Command::Update { .. } => match state.remote() {
            Some(info) => writeln!(out, "latest: {}\n{}\n{}", info.version_code, info.link, info.note)?,
            None => writeln!(out, "latest: unknown")?,
        },
        _ => {}
    }
    Ok(())
}

struct FileUpdateSource(PathBuf);

impl UpdateSource for FileUpdateSource {
    fn fetch(&self) -> Result<String> {
        fs::read_to_string(&self.0)
            .with_context(|| format!("Failed to read update document: {}", self.0.display()))
    }
}
