#[macro_use]
extern crate log;
use env_logger::Env;
extern crate clap;
use clap::{App, Arg};

use common::{Location, Path, RepoError};
use federation::{FederationConfig, RepositoryConnection, RepositoryConnectionFactory};
use std::process;
use std::sync::Arc;

/// Projection only needs the configuration, so no source is ever connected.
struct Disconnected;

impl RepositoryConnectionFactory for Disconnected {
    fn create_connection(&self, source_name: &str) -> Result<Box<dyn RepositoryConnection>, RepoError> {
        Err(RepoError::SourceError(format!(
            "fedproject does not connect to source '{}'",
            source_name
        )))
    }
}

fn run(config_path: &str, workspace: Option<&str>, paths: Vec<&str>) -> Result<(), RepoError> {
    let config = FederationConfig::from_file(config_path)?;
    let repository = config.into_repository(Arc::new(Disconnected))?;
    let workspace = repository.workspace(workspace)?;
    info!(
        "workspace '{}' of '{}' uses the {} projector",
        workspace.name(),
        repository.name(),
        workspace.projector_name()
    );
    for text in paths {
        let path = Path::parse(text)?;
        println!("{}", path);
        match workspace.project(&Location::with_path(path), false) {
            Some(node) => {
                for projected in node.iter() {
                    println!("  {}", projected);
                }
            }
            None => println!("  not projected"),
        }
    }
    Ok(())
}

fn main() {
    // Configure log environment
    env_logger::from_env(Env::default().default_filter_or("info")).init();

    let matches = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Federation config file")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("workspace")
                .short("w")
                .long("workspace")
                .value_name("NAME")
                .help("Workspace to project into; the default workspace when omitted")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("paths")
                .value_name("PATH")
                .help("Paths in the federated workspace")
                .multiple(true)
                .required(true),
        )
        .get_matches();

    let config_path = matches.value_of("config").unwrap();
    let paths: Vec<&str> = matches.values_of("paths").unwrap().collect();
    if let Err(e) = run(config_path, matches.value_of("workspace"), paths) {
        error!("{}", e);
        process::exit(1);
    }
}
