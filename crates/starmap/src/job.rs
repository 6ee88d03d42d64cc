//! Rendering of refinement jobs.
//!
//! A job combines the [`RefinementPolicy`] with the run parameters and the Rosetta executables.
//! Rendering a Rosetta script template substitutes the placeholders,
//!     parses the result, applies the policy and serializes the tree.
//! Shell script templates only get the placeholders substituted.

use crate::placeholders::{self, Placeholder, Substitutions, XML_TAG_WILL_BE_DELETED};
use crate::policy::RefinementPolicy;
use crate::script::{self, EditError, ParseError};
use tracing::{debug, warn};

/// Appended to the Rosetta command line for symmetric, non-helical assemblies.
pub const SYMMETRIC_COMPLEX_FLAG: &str = " -score_symm_complex true ";

/// Score function weights used with the density term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum DensityWeight {
    #[default]
    Ref2015,
    Talaris2013,
}

impl DensityWeight {
    pub fn name(self) -> &'static str {
        match self {
            DensityWeight::Ref2015 => "ref2015",
            DensityWeight::Talaris2013 => "talaris2013",
        }
    }
}

/// Everything about a job that is not part of the refinement policy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RunParameters {
    /// Number of MPI processes; 1 selects the serial executable.
    pub cores: u32,
    /// Write absolute paths instead of file names into the generated scripts.
    pub full_paths: bool,
    /// The generated Rosetta script.
    pub script_file: String,
    /// The model to refine.
    pub input_pdb: String,
    pub density_map: String,
    pub constraint_set: String,
    pub symmetry_file: String,
    /// The second half map used for validation.
    pub half_map: String,
    /// Map resolution in Angstrom.
    pub resolution: f64,
    pub density_weight: DensityWeight,
    /// The symmetry is helical.
    pub helical: bool,
    /// Number of models; the task's default when unset.
    pub models: Option<u32>,
    /// Values of the `@@USER1@@` to `@@USER8@@` placeholders.
    /// Missing values are empty and values past the eighth are ignored.
    pub user: Vec<String>,
}

impl Default for RunParameters {
    fn default() -> Self {
        RunParameters {
            cores: 1,
            full_paths: false,
            script_file: String::new(),
            input_pdb: String::new(),
            density_map: String::new(),
            constraint_set: String::new(),
            symmetry_file: String::new(),
            half_map: String::new(),
            resolution: 3.0,
            density_weight: DensityWeight::default(),
            helical: false,
            models: None,
            user: vec![],
        }
    }
}

impl RunParameters {
    /// A file as it is written into scripts: the file name, or the path as given with full paths.
    ///
    /// Callers that want absolute paths are expected to canonicalize the paths first.
    pub fn file_reference(&self, path: &str) -> String {
        if self.full_paths {
            path.to_string()
        } else {
            file_name(path)
        }
    }
}

/// The final component of a path, or the path itself if it has none.
pub fn file_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Commands used to run Rosetta.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RosettaExecutables {
    pub scripts: String,
    pub scripts_mpi: String,
    pub density_tools: String,
    pub symmdef: String,
}

impl Default for RosettaExecutables {
    fn default() -> Self {
        RosettaExecutables {
            scripts: "rosetta_scripts.linuxgccrelease".into(),
            scripts_mpi: "rosetta_scripts.mpi.linuxgccrelease".into(),
            density_tools: "density_tools.linuxgccrelease".into(),
            symmdef: "${ROSETTA3}/source/src/apps/public/symmetry/make_symmdef_file.pl".into(),
        }
    }
}

impl RosettaExecutables {
    /// How a generated script invokes an executable.
    ///
    /// Without full paths the shell looks the executable up with `which` at run time.
    pub fn invocation(command: &str, full_paths: bool) -> String {
        if full_paths {
            format!("{command} ")
        } else {
            format!("$(which {})", file_name(command))
        }
    }
}

/// A job as stored in a job file.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct JobFile {
    pub policy: RefinementPolicy,
    pub run: RunParameters,
}

/// A job ready to be rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Job {
    pub policy: RefinementPolicy,
    pub run: RunParameters,
    pub executables: RosettaExecutables,
}

impl Job {
    pub fn new(file: JobFile, executables: RosettaExecutables) -> Job {
        Job {
            policy: file.policy,
            run: file.run,
            executables,
        }
    }

    /// Number of models to generate.
    pub fn models(&self) -> u32 {
        self.run
            .models
            .unwrap_or_else(|| self.policy.task.default_models())
    }

    /// The Rosetta command line written for `@@ROSETTA_SCRIPT_EXE@@`.
    pub fn command_line(&self) -> String {
        let command = if self.run.cores == 1 {
            &self.executables.scripts
        } else {
            &self.executables.scripts_mpi
        };
        let mut command_line = RosettaExecutables::invocation(command, self.run.full_paths);
        if self.policy.symmetry && !self.run.helical {
            command_line.push_str(SYMMETRIC_COMPLEX_FLAG);
        }
        command_line
    }

    /// The placeholder table for this job.
    pub fn substitutions(&self) -> Substitutions {
        let run = &self.run;
        let mut subs = Substitutions::new();
        subs.set(
            Placeholder::RosettaScriptFile,
            run.file_reference(&run.script_file),
        )
        .set(Placeholder::Cores, run.cores.to_string())
        .set(Placeholder::InputPdbFile, run.file_reference(&run.input_pdb))
        .set(Placeholder::Nstruct, self.models().to_string())
        .set(Placeholder::DensityFile, run.file_reference(&run.density_map))
        .set(Placeholder::ConstraintApw, "0")
        .set(
            Placeholder::ConstraintSetFile,
            run.file_reference(&run.constraint_set),
        );
        if self.policy.symmetry {
            subs.set(
                Placeholder::SymmetryFile,
                run.file_reference(&run.symmetry_file),
            )
            .set(Placeholder::UseSymmetry, "1");
        } else {
            subs.set(Placeholder::RunSymmetryCommandline, "")
                .set(Placeholder::SymmetryFile, XML_TAG_WILL_BE_DELETED)
                .set(Placeholder::UseSymmetry, "0");
        }
        subs.set(Placeholder::Strategy, self.policy.strategy.name())
            .set(Placeholder::DensityWeight, run.density_weight.name())
            .set(Placeholder::Hires, run.resolution.to_string());
        if self.policy.half_map_validation {
            subs.set(
                Placeholder::ValidationHalf2File,
                run.file_reference(&run.half_map),
            );
        } else {
            subs.set(Placeholder::ValidationHalf2File, XML_TAG_WILL_BE_DELETED);
        }
        for n in 1..=Placeholder::USER_COUNT {
            let value = run.user.get(usize::from(n) - 1).map_or("", String::as_str);
            subs.set(Placeholder::User(n), value);
        }
        subs.set(Placeholder::RosettaScriptExe, self.command_line());
        subs
    }

    /// Render a Rosetta script template for this job.
    pub fn render_rosetta_script(&self, template: &str) -> Result<String, RenderError> {
        let source = self.substitutions().apply(template);
        let rendered = script::transform(&source, |document, ctx| {
            let report = self.policy.apply(document, ctx)?;
            debug!(?report, "customized rosetta script");
            Ok::<(), RenderError>(())
        })?;
        warn_unresolved(&rendered);
        if rendered.contains(XML_TAG_WILL_BE_DELETED) {
            warn!("rendered script still references the file of a disabled feature");
        }
        Ok(rendered)
    }

    /// Render a shell script template for this job.
    pub fn render_shell_script(&self, template: &str) -> String {
        let rendered = self.substitutions().apply(template);
        warn_unresolved(&rendered);
        rendered
    }
}

fn warn_unresolved(rendered: &str) {
    let unresolved = placeholders::unresolved_tokens(rendered);
    if !unresolved.is_empty() {
        warn!(tokens = ?unresolved, "unresolved placeholders in rendered script");
    }
}

/// Error returned when rendering a Rosetta script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The template with placeholders substituted is not a valid script.
    Parse(ParseError),
    Edit(EditError),
}

impl From<ParseError> for RenderError {
    fn from(err: ParseError) -> Self {
        RenderError::Parse(err)
    }
}

impl From<EditError> for RenderError {
    fn from(err: EditError) -> Self {
        RenderError::Edit(err)
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Parse(err) => write!(f, "invalid template: {err}"),
            RenderError::Edit(err) => write!(f, "failed to customize template: {err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Parse(err) => Some(err),
            RenderError::Edit(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Strategy, Task};
    use crate::script::Document;

    const TEMPLATE: &str = include_str!("../tests/data/rosetta_tmpl.xml");

    fn job() -> Job {
        Job {
            policy: RefinementPolicy::default(),
            run: RunParameters {
                cores: 4,
                script_file: "/work/run/model_rosetta.xml".into(),
                input_pdb: "/work/run/model_sel.pdb".into(),
                density_map: "/work/maps/emd_1234.mrc".into(),
                constraint_set: "/work/run/model.cst".into(),
                symmetry_file: "/work/run/model.symm".into(),
                half_map: "/work/maps/half2.mrc".into(),
                resolution: 3.4,
                ..Default::default()
            },
            executables: RosettaExecutables {
                scripts: "/opt/rosetta/bin/rosetta_scripts.default.linuxgccrelease".into(),
                scripts_mpi: "/opt/rosetta/bin/rosetta_scripts.mpi.linuxgccrelease".into(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn file_references() {
        let mut job = job();
        assert_eq!(job.run.file_reference("/work/run/model.pdb"), "model.pdb");
        job.run.full_paths = true;
        assert_eq!(job.run.file_reference("/work/run/model.pdb"), "/work/run/model.pdb");
        assert_eq!(file_name("model.pdb"), "model.pdb");
    }

    #[test]
    fn command_line() {
        let mut job = job();
        assert_eq!(job.command_line(), "$(which rosetta_scripts.mpi.linuxgccrelease)");
        job.run.cores = 1;
        assert_eq!(
            job.command_line(),
            "$(which rosetta_scripts.default.linuxgccrelease)"
        );
        job.run.full_paths = true;
        assert_eq!(
            job.command_line(),
            "/opt/rosetta/bin/rosetta_scripts.default.linuxgccrelease "
        );
        job.policy.symmetry = true;
        assert_eq!(
            job.command_line(),
            "/opt/rosetta/bin/rosetta_scripts.default.linuxgccrelease  -score_symm_complex true "
        );
        job.run.helical = true;
        assert_eq!(
            job.command_line(),
            "/opt/rosetta/bin/rosetta_scripts.default.linuxgccrelease "
        );
    }

    #[test]
    fn substitutions_without_symmetry() {
        let subs = job().substitutions();
        assert_eq!(subs.get(Placeholder::RosettaScriptFile), Some("model_rosetta.xml"));
        assert_eq!(subs.get(Placeholder::Cores), Some("4"));
        assert_eq!(subs.get(Placeholder::Nstruct), Some("20"));
        assert_eq!(subs.get(Placeholder::ConstraintApw), Some("0"));
        assert_eq!(subs.get(Placeholder::RunSymmetryCommandline), Some(""));
        assert_eq!(subs.get(Placeholder::SymmetryFile), Some(XML_TAG_WILL_BE_DELETED));
        assert_eq!(subs.get(Placeholder::UseSymmetry), Some("0"));
        assert_eq!(subs.get(Placeholder::Strategy), Some("auto"));
        assert_eq!(subs.get(Placeholder::DensityWeight), Some("ref2015"));
        assert_eq!(subs.get(Placeholder::Hires), Some("3.4"));
        assert_eq!(
            subs.get(Placeholder::ValidationHalf2File),
            Some(XML_TAG_WILL_BE_DELETED)
        );
        assert_eq!(subs.get(Placeholder::User(8)), Some(""));
        let last = subs.iter().last().map(|(p, _)| p);
        assert_eq!(last, Some(Placeholder::RosettaScriptExe));
    }

    #[test]
    fn substitutions_with_symmetry_and_validation() {
        let mut job = job();
        job.policy.symmetry = true;
        job.policy.half_map_validation = true;
        job.policy.task = Task::MinimumRebuild;
        job.run.user = vec!["-extra_res_cen LIG.params".into()];
        let subs = job.substitutions();
        assert_eq!(subs.get(Placeholder::SymmetryFile), Some("model.symm"));
        assert_eq!(subs.get(Placeholder::UseSymmetry), Some("1"));
        assert_eq!(subs.get(Placeholder::RunSymmetryCommandline), None);
        assert_eq!(subs.get(Placeholder::ValidationHalf2File), Some("half2.mrc"));
        assert_eq!(subs.get(Placeholder::Nstruct), Some("10"));
        assert_eq!(subs.get(Placeholder::User(1)), Some("-extra_res_cen LIG.params"));
    }

    #[test]
    fn render_rosetta_script() {
        let rendered = job().render_rosetta_script(TEMPLATE).unwrap();
        assert!(!rendered.contains("@@"));
        assert!(rendered.contains(r#"<LoadDensityMap name="loaddens" mapfile="emd_1234.mrc"/>"#));
        assert!(rendered.contains(r#"<ReportFSC name="reportFSC" res_low="10.0" res_high="3.4"/>"#));
        assert!(!rendered.contains("SetupForSymmetry"));
        assert!(rendered.starts_with("<ROSETTASCRIPTS>\n\t<SCOREFXNS>\n"));
        assert!(rendered.ends_with("\t<OUTPUT scorefxn=\"dens\"/>\n</ROSETTASCRIPTS>\n"));

        // rendering is stable: the output parses back to the same tree
        let reparsed = Document::from_source_code(&rendered).unwrap();
        assert_eq!(reparsed.display().to_string(), rendered);
    }

    #[test]
    fn render_user_strategy() {
        let mut job = job();
        job.policy.strategy = Strategy::User;
        job.policy.residues = "10A-20A".into();
        let rendered = job.render_rosetta_script(TEMPLATE).unwrap();
        assert_eq!(rendered.matches(r#"strategy="user""#).count(), 4);
        assert_eq!(rendered.matches(r#"residues="10A-20A""#).count(), 4);
    }

    #[test]
    fn render_reports_parse_errors() {
        let err = job()
            .render_rosetta_script("<MOVERS><Add mover=@@STRATEGY@@/>")
            .unwrap_err();
        assert!(matches!(err, RenderError::Parse(_)));
    }

    #[test]
    fn quote_in_user_value_is_a_parse_error() {
        let template = r#"<MOVERS><Stage name="@@USER1@@"/></MOVERS>"#;
        let mut job = job();
        job.run.user = vec!["extra_res_cen".into()];
        assert_eq!(
            job.render_rosetta_script(template).unwrap(),
            "<MOVERS>\n\t<Stage name=\"extra_res_cen\"/>\n</MOVERS>\n"
        );

        for value in ["res\"cen", "res\ncen"] {
            job.run.user = vec![value.into()];
            let err = job.render_rosetta_script(template).unwrap_err();
            assert!(matches!(err, RenderError::Parse(_)), "{value:?}");
        }
    }

    #[test]
    fn render_reports_edit_errors() {
        let template = r#"<M><LocalRelax name="lr"/></M><P><Add mover="lr" cores="@@CORES@@"/></P>"#;
        let err = job().render_rosetta_script(template).unwrap_err();
        assert_eq!(
            err,
            RenderError::Edit(EditError::MalformedMoverReference { mover: "lr".into() })
        );
    }

    #[test]
    fn render_shell_script() {
        let template = "#!/bin/sh\nmpirun -np @@CORES@@ @@ROSETTA_SCRIPT_EXE@@ -parser:protocol @@ROSETTA_SCRIPT_FILE@@ -s @@INPUT_PDB_FILE@@ -nstruct @@NSTRUCT@@ @@RUN_SYMMETRY_COMMANDLINE@@\n";
        assert_eq!(
            job().render_shell_script(template),
            "#!/bin/sh\nmpirun -np 4 $(which rosetta_scripts.mpi.linuxgccrelease) -parser:protocol model_rosetta.xml -s model_sel.pdb -nstruct 20 \n"
        );
    }
}
