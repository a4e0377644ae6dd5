mod cli;

use std::ops::ControlFlow;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{CacheAction, Cli, Commands, SearchArgs};
use refhunt::cache::dependency::DependencyCache;
use refhunt::cache::envelope::LoadOutcome;
use refhunt::model::Identity;
use refhunt::project::{ContentProject, expanders};
use refhunt::query::output::{format_cache_stats, format_stats, print_result};
use refhunt::{Engine, SearchParameters, session};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Search(args) => search(args)?,

        Commands::Session { path, view, format } => {
            let Some(result) = session::load(&path)? else {
                bail!("no saved session in {}", path.display());
            };
            print_result(&result, view, format);
        }

        Commands::Cache { action } => match action {
            CacheAction::Rebuild { path } => {
                let project = open(&path)?;
                let mut cache =
                    DependencyCache::rebuild(&project, &mut |_, _| ControlFlow::Continue(()))?;
                cache.save(&path)?;
                println!("{} resources hashed", cache.len());
            }
            CacheAction::Stats { path, format } => match DependencyCache::load(&path) {
                LoadOutcome::Loaded(cache) => format_cache_stats(&cache, format),
                LoadOutcome::Missing => bail!("no dependency cache in {}", path.display()),
                LoadOutcome::Discarded(reason) => bail!("dependency cache unusable: {reason}"),
            },
        },
    }

    Ok(())
}

fn open(path: &Path) -> Result<ContentProject> {
    ContentProject::open(path).with_context(|| format!("cannot open project {}", path.display()))
}

fn search(args: SearchArgs) -> Result<()> {
    let project = open(&args.path)?;

    let mut params = SearchParameters::from_config(project.config());
    params.needles = args.needles.iter().map(|n| Identity::parse(n)).collect();
    params.scopes = args.scopes;
    if let Some(depth) = args.max_depth {
        params.max_depth = depth;
    }
    params.filter.include_non_public |= args.non_public;
    params.filter.serializable_only |= args.serializable_only;
    params.prune_weak_links &= !args.keep_weak;
    params.dedup_paths &= !args.no_dedup;
    params.report_indirect_roots |= args.indirect_roots;
    params.include_sub_objects |= args.sub_objects;

    let cache = DependencyCache::load_or_rebuild(&args.path, &project, &mut |_, _| {
        ControlFlow::Continue(())
    })?;

    let opaque = project.config().opaque_types.clone().unwrap_or_default();
    let mut engine = Engine::new(cache).with_opaque_types(opaque);
    expanders::install(&mut engine);

    let result = engine.run(&project, &params, &mut |done, total, scope| {
        info!(done, total, scope = %scope.name, "searching scope");
        ControlFlow::Continue(())
    });

    if engine.dependencies().is_dirty() {
        engine.dependencies_mut().save(&args.path)?;
    }
    if args.save_session {
        session::save(&args.path, &result)?;
    }

    print_result(&result, args.view, args.format);
    if args.stats {
        format_stats(&result.stats, args.format);
    }

    if !result.success {
        bail!(
            "search failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
