//! Discovery of the Rosetta executables and the shell templates.

use crate::RosettaConfig;
use starmap::job::RosettaExecutables;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const COMPILERS: [&str; 3] = ["gcc", "icc", "clang"];
const PLATFORMS: [&str; 2] = ["linux", "macos"];
const BUILD_TYPES: [&str; 2] = ["default", "static"];
const RELEASE: &str = "release";
/// Found on `PATH`, this script replaces the configured symmetry definition command.
pub const SYMMDEF_SCRIPT: &str = "make_symmdef_file.pl";

/// Result of [`discover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub executables: RosettaExecutables,
    /// Whether a build of `rosetta_scripts` was found.
    pub found: bool,
}

/// Build-suffixed names of a Rosetta executable, in search order.
///
/// MPI builds are named `{cmd}.{platform}{compiler}release`,
///     all others `{cmd}.{build type}.{platform}{compiler}release`.
pub fn candidate_names(command: &str) -> Vec<String> {
    let mut names: Vec<String> = vec![];
    for compiler in COMPILERS {
        for platform in PLATFORMS {
            for build_type in BUILD_TYPES {
                let name = if command.contains("mpi") {
                    format!("{command}.{platform}{compiler}{RELEASE}")
                } else {
                    format!("{command}.{build_type}.{platform}{compiler}{RELEASE}")
                };
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }
    names
}

fn locate<F>(command: &str, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    candidate_names(command)
        .iter()
        .find_map(|name| lookup(name))
        .map(|path| path.display().to_string())
}

/// Search `PATH` for the Rosetta executables.
pub fn discover(config: &RosettaConfig) -> Discovery {
    discover_with(
        config,
        |name| which::which(name).ok(),
        cfg!(target_os = "macos"),
    )
}

/// Search for the Rosetta executables with the given lookup function.
///
/// Executables that are not found get the fallback suffix;
///     on macOS all of them get the static macOS suffix if `rosetta_scripts` is missing.
pub fn discover_with<F>(config: &RosettaConfig, lookup: F, macos: bool) -> Discovery
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let mut scripts = locate(&config.scripts, &lookup).unwrap_or_else(|| config.scripts.clone());
    let mut scripts_mpi =
        locate(&config.scripts_mpi, &lookup).unwrap_or_else(|| config.scripts_mpi.clone());
    let mut density_tools =
        locate(&config.density_tools, &lookup).unwrap_or_else(|| config.density_tools.clone());
    let symmdef = match lookup(SYMMDEF_SCRIPT) {
        Some(path) => path.display().to_string(),
        None => config.symmdef.clone(),
    };

    if !scripts_mpi.ends_with(RELEASE) {
        scripts_mpi.push_str(&config.fallback_suffix);
    }
    let found = scripts.ends_with(RELEASE);
    if !found {
        scripts.push_str(&config.fallback_suffix);
        density_tools.push_str(&config.fallback_suffix);
        if macos {
            scripts = format!("{}{}", config.scripts, config.macos_fallback_suffix);
            scripts_mpi = scripts.clone();
            density_tools = format!("{}{}", config.density_tools, config.macos_fallback_suffix);
        }
        warn!(%scripts, "no build of rosetta_scripts found on PATH");
    } else {
        info!(%scripts, %scripts_mpi, %density_tools, "found Rosetta");
    }
    debug!(%symmdef, "symmetry definition command");

    Discovery {
        executables: RosettaExecutables {
            scripts,
            scripts_mpi,
            density_tools,
            symmdef,
        },
        found,
    }
}

/// Shell script templates, sorted by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellTemplates {
    /// Templates for runs on the local machine, named `*local.tmpl.sh`.
    pub local: Vec<PathBuf>,
    /// Templates for batch systems, named `*cluster.tmpl.sh`.
    pub cluster: Vec<PathBuf>,
}

impl ShellTemplates {
    /// Find a template by file name.
    pub fn find(&self, name: &str) -> Option<&Path> {
        self.local
            .iter()
            .chain(self.cluster.iter())
            .find(|path| path.file_name().is_some_and(|n| n == name))
            .map(PathBuf::as_path)
    }
}

/// Scan a directory for shell script templates.
pub fn shell_templates(directory: &Path) -> std::io::Result<ShellTemplates> {
    let mut names: Vec<String> = vec![];
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    let mut templates = ShellTemplates::default();
    for name in names {
        if name.ends_with("local.tmpl.sh") {
            templates.local.push(directory.join(&name));
        } else if name.ends_with("cluster.tmpl.sh") {
            templates.cluster.push(directory.join(&name));
        }
    }
    debug!(
        directory = %directory.display(),
        local = templates.local.len(),
        cluster = templates.cluster.len(),
        "found shell templates"
    );
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_defaults;

    fn rosetta_config() -> RosettaConfig {
        load_defaults().unwrap().rosetta
    }

    #[test]
    fn candidate_name_order() {
        let names = candidate_names("rosetta_scripts");
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "rosetta_scripts.default.linuxgccrelease");
        assert_eq!(names[1], "rosetta_scripts.static.linuxgccrelease");
        assert_eq!(names[2], "rosetta_scripts.default.macosgccrelease");
        assert_eq!(names[11], "rosetta_scripts.static.macosclangrelease");

        let mpi = candidate_names("rosetta_scripts.mpi");
        assert_eq!(
            mpi,
            vec![
                "rosetta_scripts.mpi.linuxgccrelease",
                "rosetta_scripts.mpi.macosgccrelease",
                "rosetta_scripts.mpi.linuxiccrelease",
                "rosetta_scripts.mpi.macosiccrelease",
                "rosetta_scripts.mpi.linuxclangrelease",
                "rosetta_scripts.mpi.macosclangrelease",
            ]
        );
    }

    #[test]
    fn found_on_path() {
        let lookup = |name: &str| match name {
            "rosetta_scripts.static.linuxgccrelease"
            | "rosetta_scripts.mpi.linuxclangrelease"
            | "density_tools.default.linuxiccrelease"
            | "make_symmdef_file.pl" => Some(PathBuf::from("/opt/rosetta/bin").join(name)),
            _ => None,
        };
        let discovery = discover_with(&rosetta_config(), lookup, false);
        assert!(discovery.found);
        assert_eq!(
            discovery.executables,
            RosettaExecutables {
                scripts: "/opt/rosetta/bin/rosetta_scripts.static.linuxgccrelease".into(),
                scripts_mpi: "/opt/rosetta/bin/rosetta_scripts.mpi.linuxclangrelease".into(),
                density_tools: "/opt/rosetta/bin/density_tools.default.linuxiccrelease".into(),
                symmdef: "/opt/rosetta/bin/make_symmdef_file.pl".into(),
            }
        );
    }

    #[test]
    fn fallback_names() {
        let discovery = discover_with(&rosetta_config(), |_| None, false);
        assert!(!discovery.found);
        assert_eq!(discovery.executables, RosettaExecutables::default());
    }

    #[test]
    fn macos_fallback_names() {
        let discovery = discover_with(&rosetta_config(), |_| None, true);
        assert_eq!(
            discovery.executables.scripts,
            "rosetta_scripts.static.macosclangrelease"
        );
        assert_eq!(
            discovery.executables.scripts_mpi,
            "rosetta_scripts.static.macosclangrelease"
        );
        assert_eq!(
            discovery.executables.density_tools,
            "density_tools.static.macosclangrelease"
        );
    }

    #[test]
    fn templates_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "starmap_slurm_cluster.tmpl.sh",
            "starmap_local.tmpl.sh",
            "starmap_mpi_local.tmpl.sh",
            "starmap_pbs_cluster.tmpl.sh",
            "rosetta_tmpl_1.2.xml",
            "notes.sh",
        ] {
            std::fs::write(dir.path().join(name), "#!/bin/sh\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("old_local.tmpl.sh")).unwrap();

        let templates = shell_templates(dir.path()).unwrap();
        assert_eq!(
            templates.local,
            vec![
                dir.path().join("starmap_local.tmpl.sh"),
                dir.path().join("starmap_mpi_local.tmpl.sh"),
            ]
        );
        assert_eq!(
            templates.cluster,
            vec![
                dir.path().join("starmap_pbs_cluster.tmpl.sh"),
                dir.path().join("starmap_slurm_cluster.tmpl.sh"),
            ]
        );
        assert_eq!(
            templates.find("starmap_pbs_cluster.tmpl.sh"),
            Some(dir.path().join("starmap_pbs_cluster.tmpl.sh").as_path())
        );
        assert_eq!(templates.find("notes.sh"), None);
    }

    #[test]
    fn missing_templates_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(shell_templates(&dir.path().join("missing")).is_err());
    }
}
