use clap::{ArgAction, Parser};

pub const HELM_GITHUB_ABOUT: &str =
    "Helm downloader for charts published as GitHub release assets (github:// URLs)";

/// Arguments Helm passes to a downloader plugin, in order.
///
/// The TLS file arguments are accepted for protocol compatibility and may be
/// empty strings; requests always go through the GitHub API with the token.
#[derive(Parser, Debug)]
#[command(name = "helm-github", version, about = HELM_GITHUB_ABOUT)]
pub struct HelmGithubCli {
    #[arg(value_name = "CERT_FILE", help = "Client certificate file (unused)")]
    pub cert_file: String,
    #[arg(value_name = "KEY_FILE", help = "Client key file (unused)")]
    pub key_file: String,
    #[arg(value_name = "CA_FILE", help = "CA bundle file (unused)")]
    pub ca_file: String,
    #[arg(
        value_name = "URL",
        help = "github:// URL of a repository index.yaml or a chart archive"
    )]
    pub url: String,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging on stderr (-vv reaches trace)")]
    pub verbose: u8,
}
