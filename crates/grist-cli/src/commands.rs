use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use grist::{
    validate_targets, Event, JsonnetCommand, Loader, Notifier, Outcome, ParseOptions, Registry,
    Resolver, Resources, Watcher, Workflow,
};

use crate::cli::SourceArgs;
use crate::config::Config;

/// Everything a command needs, built once in `main`.
pub struct Context {
    pub config: Config,
    pub registry: Registry,
}

impl Context {
    fn workflow(&self) -> Result<Workflow<'_>> {
        Ok(Workflow::new(&self.registry)
            .with_notifier(Box::new(ConsoleNotifier))
            .with_filetype(self.config.filetype()?)
            .with_only_spec(self.config.only_spec))
    }
}

/// Prints every outcome, and the diff when there is one.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, outcome: &Outcome) {
        println!("{}", outcome);
        if let Some(diff) = &outcome.diff {
            print!("{}", diff);
        }
    }
}

/// Parses, resolves and filters the resources under `path`.
///
/// Targets are applied last so composable resources can still reference
/// resources the targets exclude.
pub fn load(ctx: &Context, path: &Path, source: &SourceArgs) -> grist::Result<Resources> {
    validate_targets(&source.targets)?;

    let options = ParseOptions {
        default_resource_kind: source
            .default_kind
            .clone()
            .or_else(|| ctx.config.default_resource_kind.clone()),
        default_folder_uid: source
            .default_folder
            .clone()
            .or_else(|| ctx.config.default_folder_uid.clone()),
        targets: Vec::new(),
    };
    let renderer = JsonnetCommand::new(&ctx.config.jsonnet_binary).with_import_paths(
        source
            .jsonnet_paths
            .iter()
            .chain(ctx.config.jsonnet_paths.iter())
            .cloned(),
    );

    let loader = Loader::new(&ctx.registry, options).with_renderer(Box::new(renderer));
    let parsed = loader.parse_path(path)?;
    log::debug!("Parsed {} resources from {}", parsed.len(), path.display());

    let resolver = Resolver::new(&ctx.registry, &parsed);
    let resolved = resolver.resolve_all(parsed)?;
    Ok(resolved.matching(&source.targets))
}

pub fn get(ctx: &Context, uid: &str) -> Result<()> {
    let workflow = ctx.workflow()?;
    let resource = workflow.get(uid)?;
    print!("{}", workflow.render(&resource)?);
    Ok(())
}

pub fn list(ctx: &Context, path: &Path, remote: bool, source: &SourceArgs) -> Result<()> {
    let workflow = ctx.workflow()?;
    let entries = if remote {
        validate_targets(&source.targets)?;
        workflow.list_remote(&source.targets)?
    } else {
        workflow.list(&load(ctx, path, source)?)?
    };

    let width = entries.iter().map(|e| e.kind.len()).max().unwrap_or(0).max(4);
    println!("{:<width$}  UID", "KIND", width = width);
    for entry in entries {
        println!("{:<width$}  {}", entry.kind, entry.uid, width = width);
    }
    Ok(())
}

pub fn show(ctx: &Context, path: &Path, source: &SourceArgs) -> Result<()> {
    let workflow = ctx.workflow()?;
    for rendered in workflow.show(&load(ctx, path, source)?)? {
        println!("# {}", rendered.title);
        print!("{}", rendered.content);
    }
    Ok(())
}

pub fn diff(ctx: &Context, path: &Path, source: &SourceArgs) -> Result<()> {
    let workflow = ctx.workflow()?;
    let report = workflow.diff(&load(ctx, path, source)?)?;
    log::info!(
        "{} resources compared, {} with changes, {} not found",
        report.len(),
        report.count(Event::ChangesDetected),
        report.count(Event::NotFound)
    );
    Ok(())
}

pub fn apply(ctx: &Context, path: &Path, source: &SourceArgs) -> Result<()> {
    let workflow = ctx.workflow()?;
    let report = workflow.apply(load(ctx, path, source)?)?;
    log::info!(
        "{} resources applied, {} changed",
        report.len(),
        report.changes()
    );
    Ok(())
}

pub fn pull(ctx: &Context, dir: &Path, targets: &[String]) -> Result<()> {
    validate_targets(targets)?;
    let report = ctx.workflow()?.pull(dir, targets)?;
    log::info!("{} resources pulled into {}", report.len(), dir.display());
    Ok(())
}

pub fn export(ctx: &Context, path: &Path, dir: &Path, source: &SourceArgs) -> Result<()> {
    let workflow = ctx.workflow()?;
    let report = workflow.export(&load(ctx, path, source)?, dir)?;
    log::info!(
        "{} resources exported, {} unchanged",
        report.count(Event::Exported),
        report.count(Event::Unchanged)
    );
    Ok(())
}

/// Applies `path` once, then again after every batch of changes under `dir`.
pub fn watch(ctx: &Context, dir: &Path, path: &Path, source: &SourceArgs) -> Result<()> {
    watch_with(ctx, &Watcher::new(dir), path, source)
}

fn watch_with(ctx: &Context, watcher: &Watcher, path: &Path, source: &SourceArgs) -> Result<()> {
    let workflow = ctx.workflow()?;
    let run = |changed: &[PathBuf]| -> grist::Result<()> {
        for file in changed {
            log::info!("Changed: {}", file.display());
        }
        workflow.apply(load(ctx, path, source)?)?;
        Ok(())
    };

    if let Err(e) = run(&[]) {
        log::error!("Initial apply failed: {}", e);
    }

    watcher
        .watch(run)
        .with_context(|| format!("Failed to watch {}", watcher.dir().display()))
}
