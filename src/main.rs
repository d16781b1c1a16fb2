use scenset::actions::Phase;
use scenset::cli::{parse_cli, Action};
use scenset::driver::ScenarioRunner;
use scenset::editor::EditorRegistry;
use scenset::errors::Error;
use scenset::settings::Settings;
use scenset::setup::SetupCache;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn run(settings: &Settings, action: Action) -> Result<(), Error> {
    let mut cache = SetupCache::default();
    match action {
        Action::Expand { setup, output } => {
            let xml = cache.parse(&setup)?.write_xml()?;
            match output {
                None => print!("{}", xml),
                Some(path) => std::fs::write(&path, xml)
                    .map_err(|e| Error::IoWithPath(e, path))?,
            }
        }
        Action::List { setup } => {
            let setup = cache.parse(&setup)?;
            for it in setup.iterators() {
                println!("{}", it);
            }
            let default = setup.default_group();
            for group in setup.groups().values() {
                if Some(group.name()) == default {
                    println!("{} (default)", group.name());
                } else {
                    println!("{}", group.name());
                }
                for scenario in group.scenarios().values() {
                    if scenario.is_baseline() {
                        println!("   {} (baseline)", scenario.name());
                    } else {
                        println!("   {}", scenario.name());
                    }
                }
            }
        }
        Action::Run {
            setup,
            target,
            phases,
        } => {
            let setup = cache.parse(&setup)?;
            let registry = EditorRegistry::default();
            let mut runner = ScenarioRunner::new(setup, settings, &registry, target)?;
            for phase in phases {
                match phase {
                    Phase::Static => runner.setup_static()?,
                    Phase::Dynamic => runner.setup_dynamic()?,
                }
            }
            println!("{}", runner.editor().summary());
        }
    }
    Ok(())
}

fn main() {
    let (settings, action) = match parse_cli() {
        Ok(x) => x,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(2);
        }
    };

    let default_filter = if settings.verbose {
        "scenset=debug"
    } else {
        "scenset=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&settings, action) {
        eprintln!("ERROR: {}", e);
        std::process::exit(if e.is_configuration() { 2 } else { 1 });
    }
}
