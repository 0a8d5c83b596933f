use clap::Parser;
use getset::Getters;
use std::path::PathBuf;

#[derive(Parser, Getters)]
#[command(about = "Reconciles NGINX ingress custom resources into proxy configuration", long_about = None)]
pub struct Cli {
    /// Directory (or single file) of GlobalConfiguration, VirtualServer,
    /// TransportServer and Policy manifests.
    #[getset(get = "pub")]
    #[arg(env = "INGRESS_MANIFESTS", long = "manifests")]
    manifests: PathBuf,

    #[getset(get = "pub")]
    #[arg(env = "INGRESS_SETTINGS", long = "settings")]
    settings: Option<PathBuf>,

    /// Directory receiving one configuration file per resource.
    #[getset(get = "pub")]
    #[arg(env = "INGRESS_OUTPUT_DIR", long = "output")]
    output: PathBuf,

    /// File receiving the statuses of every resource as YAML.
    #[getset(get = "pub")]
    #[arg(env = "INGRESS_STATUS_FILE", long = "status-file")]
    status_file: Option<PathBuf>,
}
