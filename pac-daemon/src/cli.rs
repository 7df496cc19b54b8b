//! CLI argument definitions for pac-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Kubernetes mutating admission webhook.
///
/// Serves AdmissionReview requests for Pods, Namespaces and Ingresses
/// and answers them with JSON patches generated from the mutation policy.
#[derive(Parser, Debug)]
#[command(name = "pac-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to pac.toml configuration file.
    #[arg(short, long, default_value = "/etc/pod-admission-controller/pac.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and mutation policy, then exit.
    #[arg(long)]
    pub validate: bool,

    /// Mutate a live pod (`<namespace>/<pod>`) and write the patch to `--output`.
    #[arg(long, value_name = "NAMESPACE/POD")]
    pub test_pod: Option<String>,

    /// Output file for `--test-pod`.
    #[arg(long, default_value = "patch.json")]
    pub output: PathBuf,
}

impl DaemonCli {
    /// Split `--test-pod` into namespace and pod name.
    pub fn test_pod_target(&self) -> Option<anyhow::Result<(&str, &str)>> {
        self.test_pod.as_deref().map(|target| {
            target
                .split_once('/')
                .filter(|(ns, pod)| !ns.is_empty() && !pod.is_empty() && !pod.contains('/'))
                .ok_or_else(|| {
                    anyhow::anyhow!("invalid --test-pod '{}', expected <namespace>/<pod>", target)
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["pac-daemon"]);
        assert_eq!(
            cli.config,
            PathBuf::from("/etc/pod-admission-controller/pac.toml")
        );
        assert_eq!(cli.output, PathBuf::from("patch.json"));
        assert!(!cli.validate);
        assert!(cli.test_pod_target().is_none());
    }

    #[test]
    fn test_pod_target_is_split() {
        let cli = DaemonCli::parse_from(["pac-daemon", "--test-pod", "prod/web-0"]);
        let (ns, pod) = cli.test_pod_target().unwrap().unwrap();
        assert_eq!((ns, pod), ("prod", "web-0"));
    }

    #[test]
    fn malformed_test_pod_target_is_rejected() {
        for target in ["web-0", "/web-0", "prod/", "a/b/c"] {
            let cli = DaemonCli::parse_from(["pac-daemon", "--test-pod", target]);
            assert!(cli.test_pod_target().unwrap().is_err(), "{target}");
        }
    }
}
