//! Generation of the helper scripts around a refinement run.
//!
//! All generators return the script text; writing the files and making them executable
//!     is up to the caller.

use crate::job::{file_name, RosettaExecutables};
use crate::placeholders::{Placeholder, Substitutions};

pub const SHEBANG: &str = "#!/bin/sh\n";

/// Last line of every generated script; its output marks the end of the log.
pub const END_OF_LOG: &str = "echo --- StarMap: end of log ---\n";

const PER_RESIDUE_FLAGS: &str =
    " -perres -ignore_unrecognized_res -out:levels protocols.hybridization.FragmentBiasAssigner:999\n";

const FSC_FLAGS: &str = " -nresbins 200 -hires 0.01 -verbose -mask_resolution 10\n";

/// Collates the per-residue correlations and the fragment bias z-scores into `zscores_combined.csv`.
const ZSCORE_COLLATION: &str = "myself=`basename $0`
mylog=${myself%.sh}.out
grep FragmentBias ${mylog} | grep -v init | grep -v Probs_ | grep -v rsn | grep -v Size | cut -d':' -f2 >fragmentbias.tmp
grep PERRESCC ${mylog} | cut -d' ' -f4- >prerescc.tmp
paste prerescc.tmp fragmentbias.tmp | tr '\\t' ' ' >zscores.tmp
cat zscores.tmp | tr -s ' ' >zscores_combined.csv
rm -f fragmentbias.tmp prerescc.tmp zscores.tmp
";

/// The file name without its final extension.
pub fn file_stem(path: &str) -> String {
    let name = file_name(path);
    match name.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name,
    }
}

/// Name of the log a script writes when run by StarMap: the script name with an `.out` extension.
pub fn log_name(script: &str) -> String {
    format!("{}.out", file_stem(script))
}

/// Kind of model validation run with `density_tools`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Model-map Fourier shell correlation.
    Fsc,
    /// Per-residue local cross correlation.
    Lcc,
    /// Per-residue local cross correlation with z-scores.
    Zscore,
}

impl AnalysisMode {
    /// Suffix appended to the model stem to name the script and its outputs.
    pub fn suffix(self) -> &'static str {
        match self {
            AnalysisMode::Fsc => "_fsc_mm",
            AnalysisMode::Lcc => "_lcc_res",
            AnalysisMode::Zscore => "_lcc_res_zscore",
        }
    }

    pub fn script_name(self, model: &str) -> String {
        format!("{}{}.sh", file_stem(model), self.suffix())
    }

    pub fn log_name(self, model: &str) -> String {
        format!("{}{}.out", file_stem(model), self.suffix())
    }
}

/// Inputs of a `density_tools` validation script.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityToolsScript<'a> {
    /// The `density_tools` command.
    pub density_tools: &'a str,
    pub full_paths: bool,
    /// The refined model.
    pub model: &'a str,
    pub map: &'a str,
    pub resolution: f64,
    pub mode: AnalysisMode,
}

impl<'a> DensityToolsScript<'a> {
    /// The script text.
    ///
    /// Model and map are referenced by file name; the script is run from their directory.
    pub fn render(&self) -> String {
        let mut s = String::from(SHEBANG);
        if self.full_paths {
            s.push_str(self.density_tools);
        } else {
            s.push_str(&format!("$(which {})", file_name(self.density_tools)));
        }
        s.push_str(&format!(
            " -s {} -mapfile {} -mapreso {} -cryoem_scatterers",
            file_name(self.model),
            file_name(self.map),
            self.resolution
        ));
        match self.mode {
            AnalysisMode::Fsc => s.push_str(FSC_FLAGS),
            AnalysisMode::Lcc | AnalysisMode::Zscore => {
                s.push_str(PER_RESIDUE_FLAGS);
                s.push_str(ZSCORE_COLLATION);
            }
        }
        s.push_str(END_OF_LOG);
        s
    }
}

/// Inputs of the B-factor refinement run that rewrites the map with refined pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct ApixScript<'a> {
    /// The serial `rosetta_scripts` command.
    pub rosetta_scripts: &'a str,
    /// Name of the generated shell script.
    pub script: &'a str,
    pub model: &'a str,
    pub map: &'a str,
    pub resolution: f64,
    /// Refine anisotropic B-factors.
    pub aniso: bool,
}

impl<'a> ApixScript<'a> {
    /// Name of the protocol file: the shell script name with an `.xml` extension.
    pub fn protocol_name(&self) -> String {
        format!("{}.xml", file_stem(self.script))
    }

    /// Name of the map written by the protocol, e.g. `emd_1234_apix.mrc`.
    pub fn apix_map_name(&self) -> String {
        let name = file_name(self.map);
        match name.rsplit_once('.') {
            Some((stem, extension)) => format!("{stem}_apix.{extension}"),
            None => format!("{name}_apix"),
        }
    }

    /// Fill in the apix protocol template.
    pub fn render_protocol(&self, template: &str) -> String {
        Substitutions::new()
            .with(Placeholder::ApixMap, self.apix_map_name())
            .with(Placeholder::Aniso, if self.aniso { "1" } else { "0" })
            .apply(template)
    }

    /// The shell script text.
    pub fn render(&self) -> String {
        let mut s = String::from(SHEBANG);
        s.push_str(&format!(
            "{} \\\n",
            RosettaExecutables::invocation(self.rosetta_scripts, false)
        ));
        s.push_str(&format!(
            "  -parser:protocol \"{}\" \\\n",
            self.protocol_name()
        ));
        s.push_str(&format!(
            "  -edensity:mapfile \"{}\" \\\n",
            file_name(self.map)
        ));
        s.push_str(&format!("  -s \"{}\" \\\n", file_name(self.model)));
        s.push_str(&format!("  -mapreso {} \\\n", self.resolution));
        s.push_str("  -crystal_refine \\\n");
        s.push_str("  -out:suffix \"_apix_bfactor\" \\\n");
        s.push_str("  -out:no_nstruct_label \n");
        s.push_str(END_OF_LOG);
        s
    }
}

/// The command that hands a script to a batch system, e.g. `sbatch run.sh`.
///
/// Task spooler (`ts`) submissions are labelled and made to keep their output.
pub fn submission_command(submit: &str, script: &str) -> String {
    let mut submit = submit.to_string();
    if submit.starts_with("ts ") {
        submit.push_str(" -L starmap -n -E ");
    }
    format!("{submit} {script}")
}

/// ChimeraX script that runs the FSC and LCC analysis of a refined model without user interaction.
pub fn batch_analysis_script(model: &str, map: &str, resolution: f64) -> String {
    [
        "ui tool show StarMap".to_string(),
        format!("stmset alspdb={}", file_name(model)),
        format!("stmset densitymap={}", file_name(map)),
        format!("stmset mapres={resolution}"),
        "stmrunfsc".to_string(),
        "stmrunlcc".to_string(),
        "exit\n".to_string(),
    ]
    .join("\n")
}

/// Name of the batch analysis script written next to a ChimeraX session script.
pub fn batch_analysis_name(session_script: &str) -> String {
    format!("{}_fsc.cxc", file_stem(session_script))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn density_tools(mode: AnalysisMode) -> DensityToolsScript<'static> {
        DensityToolsScript {
            density_tools: "/opt/rosetta/bin/density_tools.default.linuxgccrelease",
            full_paths: false,
            model: "/work/run/model_0001.pdb",
            map: "/work/maps/emd_1234.mrc",
            resolution: 3.4,
            mode,
        }
    }

    #[test]
    fn stems_and_names() {
        assert_eq!(file_stem("/work/run/model_0001.pdb"), "model_0001");
        assert_eq!(file_stem("model.tar.gz"), "model.tar");
        assert_eq!(file_stem("README"), "README");
        assert_eq!(log_name("/work/run/refine.sh"), "refine.out");
        assert_eq!(AnalysisMode::Fsc.script_name("m.pdb"), "m_fsc_mm.sh");
        assert_eq!(AnalysisMode::Lcc.script_name("m.pdb"), "m_lcc_res.sh");
        assert_eq!(AnalysisMode::Zscore.script_name("m.pdb"), "m_lcc_res_zscore.sh");
        assert_eq!(AnalysisMode::Zscore.log_name("m.pdb"), "m_lcc_res_zscore.out");
    }

    #[test]
    fn fsc_script() {
        assert_eq!(
            density_tools(AnalysisMode::Fsc).render(),
            "#!/bin/sh\n\
             $(which density_tools.default.linuxgccrelease) -s model_0001.pdb -mapfile emd_1234.mrc -mapreso 3.4 -cryoem_scatterers \
             -nresbins 200 -hires 0.01 -verbose -mask_resolution 10\n\
             echo --- StarMap: end of log ---\n"
        );
    }

    #[test]
    fn full_path_executable() {
        let script = DensityToolsScript {
            full_paths: true,
            ..density_tools(AnalysisMode::Fsc)
        }
        .render();
        assert!(script.starts_with(
            "#!/bin/sh\n/opt/rosetta/bin/density_tools.default.linuxgccrelease -s model_0001.pdb "
        ));
    }

    #[test]
    fn per_residue_script() {
        let script = density_tools(AnalysisMode::Lcc).render();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines.len(), 10);
        assert!(lines[1].ends_with(
            "-cryoem_scatterers -perres -ignore_unrecognized_res -out:levels protocols.hybridization.FragmentBiasAssigner:999"
        ));
        assert_eq!(lines[2], "myself=`basename $0`");
        assert_eq!(lines[6], "paste prerescc.tmp fragmentbias.tmp | tr '\\t' ' ' >zscores.tmp");
        assert_eq!(lines[7], "cat zscores.tmp | tr -s ' ' >zscores_combined.csv");
        assert_eq!(lines[9], "echo --- StarMap: end of log ---");
        assert_eq!(density_tools(AnalysisMode::Zscore).render(), script);
    }

    #[test]
    fn apix() {
        let apix = ApixScript {
            rosetta_scripts: "/opt/rosetta/bin/rosetta_scripts.default.linuxgccrelease",
            script: "/work/run/starmap_apix.sh",
            model: "/work/run/model_0001.pdb",
            map: "/work/maps/emd_1234.mrc",
            resolution: 3.4,
            aniso: true,
        };
        assert_eq!(apix.protocol_name(), "starmap_apix.xml");
        assert_eq!(apix.apix_map_name(), "emd_1234_apix.mrc");
        assert_eq!(
            apix.render(),
            "#!/bin/sh\n\
             $(which rosetta_scripts.default.linuxgccrelease) \\\n  \
             -parser:protocol \"starmap_apix.xml\" \\\n  \
             -edensity:mapfile \"emd_1234.mrc\" \\\n  \
             -s \"model_0001.pdb\" \\\n  \
             -mapreso 3.4 \\\n  \
             -crystal_refine \\\n  \
             -out:suffix \"_apix_bfactor\" \\\n  \
             -out:no_nstruct_label \n\
             echo --- StarMap: end of log ---\n"
        );
        let template = r#"<MapToFile name="write" mapfile="@@APIX_MAP@@"/><BfactorFitting aniso="@@ANISO@@"/>"#;
        assert_eq!(
            apix.render_protocol(template),
            r#"<MapToFile name="write" mapfile="emd_1234_apix.mrc"/><BfactorFitting aniso="1"/>"#
        );
        let isotropic = ApixScript { aniso: false, ..apix };
        assert!(isotropic.render_protocol(template).ends_with(r#"aniso="0"/>"#));
    }

    #[test]
    fn submission() {
        assert_eq!(submission_command("sbatch", "run.sh"), "sbatch run.sh");
        assert_eq!(
            submission_command("ts -G 1", "run.sh"),
            "ts -G 1 -L starmap -n -E  run.sh"
        );
        assert_eq!(submission_command("tsp", "run.sh"), "tsp run.sh");
    }

    #[test]
    fn batch_analysis() {
        assert_eq!(
            batch_analysis_script("/work/model_sel.pdb", "emd_1234.mrc", 3.4),
            "ui tool show StarMap\n\
             stmset alspdb=model_sel.pdb\n\
             stmset densitymap=emd_1234.mrc\n\
             stmset mapres=3.4\n\
             stmrunfsc\n\
             stmrunlcc\n\
             exit\n"
        );
        assert_eq!(batch_analysis_name("/work/session.cxc"), "session_fsc.cxc");
    }
}
