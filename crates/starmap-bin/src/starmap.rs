use clap::Parser;
use starmap::analysis::{self, ZscoreAttribute, ZSCORES_COMBINED};
use starmap::job::{Job, RenderError};
use starmap::medic;
use starmap::script::edit::{self, EditContext, ProtectedTags};
use starmap::script::Document;
use starmap::scripts::{self, AnalysisMode, ApixScript, DensityToolsScript};
use starmap_config::StarMapConfig;
use std::path::{Path, PathBuf};
use tracing::info;

mod common;
use common::*;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = cli.run() {
        if !err.is_empty() {
            eprintln!("{err}");
        }
        std::process::exit(1);
    }
}

/// Tools for preparing and analysing Rosetta refinements of cryo-EM models.
///
/// The Rosetta script templates are customized from a job file,
///     a TOML file with a `[policy]` and a `[run]` section.
/// The other subcommands write the helper scripts around a refinement
///     and extract the validation results from their logs.
#[derive(Debug, Parser)]
#[command(
    name = "starmap",
    version,
    about,
    long_about,
    max_term_width(100)
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log what is being done to standard error.
    ///
    /// More detailed filters can be set with the RUST_LOG environment variable.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file to use instead of the user configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

impl Cli {
    fn run(self) -> Result<(), String> {
        // Only some subcommands read the configuration.
        let config = || load_config(self.config.as_deref());
        match &self.command {
            Command::Check(check) => check.run(),
            Command::Fmt(format) => format.run(),
            Command::Edit(edit) => edit.run(),
            Command::Render(render) => render.run(&config()?),
            Command::Shell(shell) => shell.run(&config()?),
            Command::AnalysisScript(analysis_script) => analysis_script.run(&config()?),
            Command::Fsc(fsc) => fsc.run_fsc(),
            Command::Lcc(lcc) => lcc.run_per_residue(AnalysisMode::Lcc),
            Command::Zscore(zscore) => zscore.run_per_residue(AnalysisMode::Zscore),
            Command::Apix(apix) => apix.run(&config()?),
            Command::Medic(medic) => medic.run(),
            Command::Config => {
                let config = config()?;
                let discovery = starmap_config::discover(&config.rosetta);
                print!(
                    "{}",
                    starmap_config::report(
                        &config,
                        &discovery,
                        env!("CARGO_PKG_VERSION"),
                        local_cores()
                    )
                );
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, clap::Subcommand)]
enum Command {
    /// Check that a Rosetta script is valid.
    Check(Check),

    /// Format a Rosetta script.
    ///
    /// Tags are written one per line and indented with one tab per level.
    Fmt(Format),

    /// Delete, substitute or rename parts of a Rosetta script.
    ///
    /// The edits are applied in this order: tag deletions, value deletions,
    ///     residue substitutions, renames.
    /// Deleting a tag or a named value also deletes the `<Add mover=.../>`
    ///     references to the removed movers.
    /// If any edit fails nothing is written.
    Edit(Edit),

    /// Customize the refinement template for a job.
    Render(Render),

    /// Fill in a shell script template for a job.
    Shell(Shell),

    /// Write a density_tools script that validates a refined model.
    AnalysisScript(AnalysisScript),

    /// Extract the model-map FSC curve from the log of an FSC script.
    Fsc(Extract),

    /// Extract the per-residue local correlations from the log of an LCC script.
    Lcc(Extract),

    /// Extract the per-residue z-scores from the log of a z-score script.
    ///
    /// If `zscores_combined.csv` is next to the log,
    ///     ChimeraX scripts that color the model by each z-score term are written too.
    Zscore(Extract),

    /// Write the B-factor refinement script that also refines the map's pixel size.
    Apix(Apix),

    /// List the residues flagged in a MEDIC summary.
    Medic(Medic),

    /// Print the configuration and the Rosetta executables found on PATH.
    Config,
}

#[derive(Clone, Debug, Parser)]
struct Check {
    /// Path to the Rosetta script to validate.
    path: PathBuf,
}

impl Check {
    fn run(&self) -> Result<(), String> {
        let path = ScriptPath::from(self.path.clone());
        let (_, document) = path.read()?;
        println!("{}: {} tags", path.name(), document.tags().len());
        Ok(())
    }
}

#[derive(Clone, Debug, Parser)]
struct Format {
    /// Path to the Rosetta script to format.
    path: PathBuf,

    /// Write the result to the input file.
    #[arg(short, long)]
    in_place: bool,

    /// Output path. If not provided, the result is printed to standard out.
    #[arg(short, long, conflicts_with = "in_place")]
    output: Option<PathBuf>,
}

impl Format {
    fn run(&self) -> Result<(), String> {
        let (_, document) = ScriptPath::from(self.path.clone()).read()?;
        let output = if self.in_place {
            Some(self.path.as_path())
        } else {
            self.output.as_deref()
        };
        let rendered = document.display().to_string();
        write_or_print(output, &rendered, false)
    }
}

/// Argument of the form `TAG=VALUE`.
#[derive(Clone, Debug)]
struct Assignment {
    tag: String,
    value: String,
}

impl Assignment {
    fn parse(input: &str) -> Result<Self, String> {
        match input.split_once('=') {
            Some((tag, value)) if !tag.is_empty() => Ok(Assignment {
                tag: tag.into(),
                value: value.into(),
            }),
            _ => Err(format!("expected TAG=VALUE, got `{input}`")),
        }
    }
}

/// Argument of the form `ATTRIBUTE:FROM:TO`.
#[derive(Clone, Debug)]
struct Rename {
    attribute: String,
    from: String,
    to: String,
}

impl Rename {
    fn parse(input: &str) -> Result<Self, String> {
        let parts: Vec<&str> = input.split(':').collect();
        match parts.as_slice() {
            [attribute, from, to] if !attribute.is_empty() && !from.is_empty() => Ok(Rename {
                attribute: attribute.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            }),
            _ => Err(format!("expected ATTRIBUTE:FROM:TO, got `{input}`")),
        }
    }
}

#[derive(Clone, Debug, Parser)]
struct Edit {
    /// Path to the Rosetta script to edit.
    path: PathBuf,

    /// Delete the tags with this name and the references to the movers they define.
    #[arg(long = "delete-tag", value_name = "TAG")]
    delete_tags: Vec<String>,

    /// Delete the tags with this `name` attribute and the references to them.
    #[arg(long = "delete-value", value_name = "VALUE")]
    delete_values: Vec<String>,

    /// Set the `residues` attribute of the tags with the given name.
    #[arg(long = "residues", value_name = "TAG=RESIDUES", value_parser = Assignment::parse)]
    residues: Vec<Assignment>,

    /// Rename attribute values.
    #[arg(long = "rename", value_name = "ATTRIBUTE:FROM:TO", value_parser = Rename::parse)]
    renames: Vec<Rename>,

    /// Maximum number of values each rename rewrites.
    #[arg(long)]
    rename_limit: Option<usize>,

    /// Delete protected tags too.
    ///
    /// By default `FastRelax` tags that torsion refinement relies on are kept.
    #[arg(long)]
    no_protection: bool,

    /// Output path. If not provided, the result is printed to standard out.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Edit {
    fn run(&self) -> Result<(), String> {
        let path = ScriptPath::from(self.path.clone());
        let (_, mut document) = path.read()?;
        let protected = if self.no_protection {
            ProtectedTags::none()
        } else {
            ProtectedTags::default()
        };
        if let Err(err) = self.apply(&mut document, &mut EditContext::new(protected)) {
            return Err(format!("Failed to edit `{}`: {}", path.name(), err));
        }
        let rendered = document.display().to_string();
        write_or_print(self.output.as_deref(), &rendered, false)
    }

    fn apply(
        &self,
        document: &mut Document,
        ctx: &mut EditContext,
    ) -> Result<(), starmap::script::EditError> {
        let mut edited = document.clone();
        for tag in &self.delete_tags {
            let removal = ctx.delete_tag_and_its_movers(&mut edited, tag)?;
            info!(tag, tags = removal.tags, references = removal.references, "deleted tag");
        }
        for value in &self.delete_values {
            let removal = ctx.delete_value_and_its_movers(&mut edited, value)?;
            info!(value, tags = removal.tags, references = removal.references, "deleted value");
        }
        for assignment in &self.residues {
            let n = edit::substitute_attr_value(&mut edited.0, &assignment.tag, &assignment.value)?;
            info!(tag = assignment.tag.as_str(), n, "substituted residues");
        }
        let limit = self.rename_limit.unwrap_or(usize::MAX);
        for rename in &self.renames {
            let n = edit::rename_attr_values(
                &mut edited.0,
                &rename.attribute,
                &rename.from,
                &rename.to,
                limit,
            );
            info!(attribute = rename.attribute.as_str(), n, "renamed values");
        }
        *document = edited;
        Ok(())
    }
}

#[derive(Clone, Debug, Parser)]
struct JobArgs {
    /// Path to the job file.
    job: PathBuf,

    /// Output path. If not provided, the result is printed to standard out.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl JobArgs {
    /// Load the job file and combine it with the Rosetta executables found on PATH.
    fn load(&self, config: &StarMapConfig) -> Result<Job, String> {
        let file = match starmap_config::load_job(&self.job) {
            Ok(file) => file,
            Err(err) => return Err(format!("Failed to read `{}`: {}", self.job.display(), err)),
        };
        let discovery = starmap_config::discover(&config.rosetta);
        let mut job = Job::new(file, discovery.executables);
        if job.run.full_paths {
            let directory = directory_of(&self.job);
            let run = &mut job.run;
            for reference in [
                &mut run.script_file,
                &mut run.input_pdb,
                &mut run.density_map,
                &mut run.constraint_set,
                &mut run.symmetry_file,
                &mut run.half_map,
            ] {
                *reference = absolute(&directory, reference);
            }
        }
        Ok(job)
    }
}

#[derive(Clone, Debug, Parser)]
struct Render {
    #[command(flatten)]
    job: JobArgs,

    /// Refinement template. Defaults to the template in the configured templates directory.
    #[arg(short, long)]
    template: Option<PathBuf>,
}

impl Render {
    fn run(&self, config: &StarMapConfig) -> Result<(), String> {
        let job = self.job.load(config)?;
        let template_path = self
            .template
            .clone()
            .unwrap_or_else(|| config.templates.rosetta_script_path());
        let template = read_to_string(&template_path)?;
        let rendered = match job.render_rosetta_script(&template) {
            Ok(rendered) => rendered,
            Err(RenderError::Parse(err)) => {
                let source = job.substitutions().apply(&template);
                let name = template_path.display().to_string();
                return Err(report_parse_error(&name, &source, &err));
            }
            Err(err) => {
                return Err(format!(
                    "Failed to render `{}`: {}",
                    template_path.display(),
                    err
                ))
            }
        };
        write_or_print(self.job.output.as_deref(), &rendered, false)
    }
}

#[derive(Clone, Debug, Parser)]
struct Shell {
    #[command(flatten)]
    job: JobArgs,

    /// Shell script template.
    ///
    /// Either a path or the name of a template in the configured templates directory.
    template: String,

    /// Print the command that submits the script with this batch system command, e.g. `sbatch`.
    #[arg(long, requires = "output")]
    submit: Option<String>,
}

impl Shell {
    fn run(&self, config: &StarMapConfig) -> Result<(), String> {
        let job = self.job.load(config)?;
        let template_path = self.template_path(config)?;
        let template = read_to_string(&template_path)?;
        let rendered = job.render_shell_script(&template);
        write_or_print(self.job.output.as_deref(), &rendered, true)?;
        if let (Some(submit), Some(output)) = (&self.submit, &self.job.output) {
            println!(
                "{}",
                scripts::submission_command(submit, &output.display().to_string())
            );
        }
        Ok(())
    }

    fn template_path(&self, config: &StarMapConfig) -> Result<PathBuf, String> {
        let path = PathBuf::from(&self.template);
        if path.is_file() {
            return Ok(path);
        }
        let directory = &config.templates.directory;
        let templates = match starmap_config::shell_templates(directory) {
            Ok(templates) => templates,
            Err(err) => {
                return Err(format!(
                    "Failed to read the templates directory `{}`: {}",
                    directory.display(),
                    err
                ))
            }
        };
        match templates.find(&self.template) {
            Some(found) => Ok(found.to_path_buf()),
            None => {
                let available: Vec<String> = templates
                    .local
                    .iter()
                    .chain(templates.cluster.iter())
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect();
                Err(format!(
                    "No shell template `{}`; available templates: {}",
                    self.template,
                    available.join(", ")
                ))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum Mode {
    /// Model-map Fourier shell correlation.
    Fsc,
    /// Per-residue local cross correlation.
    Lcc,
    /// Per-residue local cross correlation with z-scores.
    Zscore,
}

impl From<Mode> for AnalysisMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Fsc => AnalysisMode::Fsc,
            Mode::Lcc => AnalysisMode::Lcc,
            Mode::Zscore => AnalysisMode::Zscore,
        }
    }
}

#[derive(Clone, Debug, Parser)]
struct AnalysisScript {
    /// Kind of validation.
    mode: Mode,

    /// The refined model.
    model: PathBuf,

    /// The density map.
    map: PathBuf,

    /// Map resolution in Angstrom.
    #[arg(short, long)]
    resolution: f64,

    /// Invoke density_tools by its full path instead of looking it up at run time.
    #[arg(long)]
    full_paths: bool,

    /// Also write a ChimeraX script that runs the FSC and LCC analysis
    ///     next to this ChimeraX session script.
    #[arg(long)]
    session: Option<PathBuf>,

    /// Directory to write to. Defaults to the directory of the model.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl AnalysisScript {
    fn run(&self, config: &StarMapConfig) -> Result<(), String> {
        let mode = AnalysisMode::from(self.mode);
        let directory = self
            .output_dir
            .clone()
            .unwrap_or_else(|| directory_of(&self.model));
        let model = self.model.display().to_string();
        let map = self.map.display().to_string();
        let discovery = starmap_config::discover(&config.rosetta);
        let script = DensityToolsScript {
            density_tools: &discovery.executables.density_tools,
            full_paths: self.full_paths,
            model: &model,
            map: &map,
            resolution: self.resolution,
            mode,
        };
        let path = directory.join(mode.script_name(&model));
        write_script(&path, &script.render())?;
        println!("{}", path.display());

        if let Some(session) = &self.session {
            let session = session.display().to_string();
            let path = directory.join(scripts::batch_analysis_name(&session));
            write(
                &path,
                &scripts::batch_analysis_script(&model, &map, self.resolution),
            )?;
            println!("{}", path.display());
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Parser)]
struct Extract {
    /// The model the analysis was run on.
    model: PathBuf,

    /// Log of the analysis script. Defaults to the log next to the model.
    #[arg(short, long)]
    log: Option<PathBuf>,
}

impl Extract {
    fn log_path(&self, mode: AnalysisMode) -> PathBuf {
        self.log.clone().unwrap_or_else(|| {
            directory_of(&self.model).join(mode.log_name(&self.model.display().to_string()))
        })
    }

    fn run_fsc(&self) -> Result<(), String> {
        let mode = AnalysisMode::Fsc;
        let log_path = self.log_path(mode);
        let log = read_to_string(&log_path)?;
        let csv = analysis::fsc_csv(&log).map_err(|err| extract_error(&log_path, err))?;
        let path = directory_of(&log_path).join(analysis::csv_name(&self.model_name(), mode, None));
        write(&path, &csv)?;
        println!("{}", path.display());
        Ok(())
    }

    fn model_name(&self) -> String {
        self.model.display().to_string()
    }

    fn run_per_residue(&self, mode: AnalysisMode) -> Result<(), String> {
        let log_path = self.log_path(mode);
        let log = read_to_string(&log_path)?;
        let result = match mode {
            AnalysisMode::Zscore => analysis::zscore_csv(&log),
            _ => analysis::lcc_csv(&log),
        };
        let chains = result.map_err(|err| extract_error(&log_path, err))?;
        let directory = directory_of(&log_path);
        for chain in &chains {
            let path = directory.join(analysis::csv_name(
                &self.model_name(),
                mode,
                Some(&chain.chain),
            ));
            write(&path, &chain.csv)?;
            println!("{}", path.display());
        }
        if mode == AnalysisMode::Zscore {
            self.write_color_scripts(&directory)?;
        }
        Ok(())
    }

    fn write_color_scripts(&self, directory: &Path) -> Result<(), String> {
        let combined_path = directory.join(ZSCORES_COMBINED);
        if !combined_path.is_file() {
            info!(path = %combined_path.display(), "no combined z-scores");
            return Ok(());
        }
        let combined = read_to_string(&combined_path)?;
        for attribute in ZscoreAttribute::ALL {
            let cxc = attribute
                .color_script(&combined)
                .map_err(|err| extract_error(&combined_path, err))?;
            let path = directory.join(attribute.script_name(&self.model_name()));
            write(&path, &cxc)?;
            println!("{}", path.display());
        }
        Ok(())
    }
}

fn extract_error(path: &Path, err: analysis::AnalysisError) -> String {
    format!("Failed to extract results from `{}`: {}", path.display(), err)
}

#[derive(Clone, Debug, Parser)]
struct Apix {
    /// The model to refine.
    model: PathBuf,

    /// The density map.
    map: PathBuf,

    /// Map resolution in Angstrom.
    #[arg(short, long)]
    resolution: f64,

    /// Refine anisotropic B-factors.
    #[arg(long)]
    aniso: bool,

    /// Protocol template. Defaults to the template in the configured templates directory.
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Path of the shell script. The protocol is written next to it.
    #[arg(short, long, default_value = "starmap_apix.sh")]
    output: PathBuf,
}

impl Apix {
    fn run(&self, config: &StarMapConfig) -> Result<(), String> {
        let template_path = self
            .template
            .clone()
            .unwrap_or_else(|| config.templates.apix_script_path());
        let template = read_to_string(&template_path)?;
        let discovery = starmap_config::discover(&config.rosetta);
        let script_name = self.output.display().to_string();
        let model = self.model.display().to_string();
        let map = self.map.display().to_string();
        let script = ApixScript {
            rosetta_scripts: &discovery.executables.scripts,
            script: &script_name,
            model: &model,
            map: &map,
            resolution: self.resolution,
            aniso: self.aniso,
        };
        let protocol_path = directory_of(&self.output).join(script.protocol_name());
        write(&protocol_path, &script.render_protocol(&template))?;
        write_script(&self.output, &script.render())?;
        println!("{}", self.output.display());
        println!("{}", protocol_path.display());
        println!("{}", script.apix_map_name());
        Ok(())
    }
}

#[derive(Clone, Debug, Parser)]
struct Medic {
    /// Path to the MEDIC summary.
    summary: PathBuf,

    /// Print the ChimeraX commands that show this residue instead of the list.
    #[arg(long)]
    residue: Option<String>,

    /// ChimeraX model spec of the model.
    #[arg(long, default_value = "#1")]
    model: String,

    /// ChimeraX model spec of the map.
    #[arg(long, default_value = "#2")]
    map: String,

    /// Restrict the map display to the density around the residue.
    #[arg(long)]
    zone: bool,
}

impl Medic {
    fn run(&self) -> Result<(), String> {
        let summary = read_to_string(&self.summary)?;
        let entries = medic::parse_summary(&summary);
        match &self.residue {
            None => {
                for entry in &entries {
                    println!("{}\t{}\t{}", entry.residue, entry.severity, entry.cause);
                }
                Ok(())
            }
            Some(residue) => {
                if !entries.iter().any(|entry| &entry.residue == residue) {
                    return Err(format!(
                        "Residue `{}` is not in `{}`",
                        residue,
                        self.summary.display()
                    ));
                }
                match medic::show_commands(&self.model, &self.map, residue, self.zone) {
                    Some(commands) => {
                        println!("{}", commands.join("\n"));
                        Ok(())
                    }
                    None => Err(format!("Residue `{residue}` is not in MEDIC notation")),
                }
            }
        }
    }
}
