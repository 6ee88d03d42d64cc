use starmap::script::{Document, ParseError};
use starmap_config::{Loader, StarMapConfig};
use std::path::{Path, PathBuf};

/// Permissions of generated shell scripts.
#[cfg(unix)]
const SCRIPT_MODE: u32 = 0o774;

pub fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

/// Load the configuration from the given file, or from the user file if there is one.
pub fn load_config(path: Option<&Path>) -> Result<StarMapConfig, String> {
    let loader = match (path, starmap_config::user_config_path()) {
        (Some(path), _) => Loader::new().with_file(path),
        (None, Some(user)) => Loader::new().with_optional_file(user),
        (None, None) => Loader::new(),
    };
    match loader.with_environment().and_then(Loader::build) {
        Ok(config) => Ok(config),
        Err(err) => Err(format!("Failed to load the configuration: {err}")),
    }
}

pub fn read_to_string(path: &Path) -> Result<String, String> {
    match std::fs::read_to_string(path) {
        Ok(data) => Ok(data),
        Err(err) => Err(format!("Failed to read `{}`: {}", path.display(), err)),
    }
}

pub fn write(path: &Path, content: &str) -> Result<(), String> {
    match std::fs::write(path, content) {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("Failed to write `{}`: {}", path.display(), err)),
    }
}

/// Write a shell script and make it executable.
pub fn write_script(path: &Path, content: &str) -> Result<(), String> {
    write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(err) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(SCRIPT_MODE))
        {
            return Err(format!(
                "Failed to make `{}` executable: {}",
                path.display(),
                err
            ));
        }
    }
    Ok(())
}

/// Write to the file if one is given, otherwise to standard out.
pub fn write_or_print(output: Option<&Path>, content: &str, script: bool) -> Result<(), String> {
    match output {
        None => {
            print!("{content}");
            Ok(())
        }
        Some(path) if script => write_script(path, content),
        Some(path) => write(path, content),
    }
}

/// Print a parse error as a diagnostic against the given source.
pub fn report_parse_error(file_name: &str, source: &str, err: &ParseError) -> String {
    let cache = (file_name, ariadne::Source::from(source));
    match err.ariadne_report(file_name).eprint(cache) {
        // The diagnostic has been printed; nothing else to report.
        Ok(()) => String::new(),
        Err(_) => format!("Failed to parse `{file_name}`: {err}"),
    }
}

/// Path to a Rosetta script.
#[derive(Clone, Debug)]
pub struct ScriptPath(pub PathBuf);

impl ScriptPath {
    pub fn read_source(&self) -> Result<String, String> {
        read_to_string(&self.0)
    }

    pub fn read(&self) -> Result<(String, Document), String> {
        let source = self.read_source()?;
        match Document::from_source_code(&source) {
            Ok(document) => Ok((source, document)),
            Err(err) => Err(report_parse_error(&self.name(), &source, &err)),
        }
    }

    pub fn name(&self) -> String {
        self.0.as_os_str().to_string_lossy().into_owned()
    }
}

impl From<PathBuf> for ScriptPath {
    fn from(path: PathBuf) -> Self {
        ScriptPath(path)
    }
}

/// Directory of a file, `.` for bare file names.
pub fn directory_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Resolve a job file reference against the job's directory.
///
/// Empty references stay empty. Files that do not exist yet keep the joined path.
pub fn absolute(directory: &Path, reference: &str) -> String {
    if reference.is_empty() {
        return String::new();
    }
    let joined = directory.join(reference);
    std::fs::canonicalize(&joined)
        .unwrap_or(joined)
        .display()
        .to_string()
}

/// Number of cores available for local runs.
pub fn local_cores() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
