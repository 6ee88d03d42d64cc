//! Extraction of validation results from `density_tools` logs.
//!
//! The logs are scanned line by line; tokens are separated by whitespace.

use crate::scripts::{file_stem, AnalysisMode};

/// Marker of the log lines that hold per-residue correlations.
pub const PER_RESIDUE_MARKER: &str = "PERRESCC";
/// Marker of the log lines that hold the model-map FSC curve.
pub const FSC_MARKER: &str = "density_tools:";
/// File written by the z-score collation in the per-residue scripts.
pub const ZSCORES_COMBINED: &str = "zscores_combined.csv";

/// Error in an analysis input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisError {
    /// 1-based line number.
    pub line: usize,
    pub kind: AnalysisErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisErrorKind {
    /// The line has fewer whitespace separated fields than needed.
    TooFewFields { found: usize, needed: usize },
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            AnalysisErrorKind::TooFewFields { found, needed } => write!(
                f,
                "line {} has {found} fields but at least {needed} are needed; is there an error message in the log?",
                self.line
            ),
        }
    }
}

impl std::error::Error for AnalysisError {}

fn field<'a>(tokens: &[&'a str], index: usize, line: usize) -> Result<&'a str, AnalysisError> {
    tokens.get(index).copied().ok_or(AnalysisError {
        line,
        kind: AnalysisErrorKind::TooFewFields {
            found: tokens.len(),
            needed: index + 1,
        },
    })
}

/// Model-map FSC curve as `resolution value` rows.
///
/// Lines with the `density_tools:` marker whose second field is not a number are headers and skipped.
pub fn fsc_csv(log: &str) -> Result<String, AnalysisError> {
    let mut csv = String::new();
    for (i, line) in log.lines().enumerate() {
        if !line.contains(FSC_MARKER) {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(resolution) = tokens.get(1) else {
            continue;
        };
        if resolution.parse::<f64>().is_err() {
            continue;
        }
        let value = field(&tokens, 8, i + 1)?;
        csv.push_str(&format!("{resolution} {value}\n"));
    }
    Ok(csv)
}

/// Per-residue values of one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCsv {
    pub chain: String,
    /// Rows of `residue value`.
    pub csv: String,
}

/// Per-residue correlations grouped by chain, in order of first appearance.
///
/// `column` selects the value field: 6 for the local correlation, 7 for its z-score.
pub fn per_residue_csv(log: &str, column: usize) -> Result<Vec<ChainCsv>, AnalysisError> {
    let mut chains: Vec<ChainCsv> = vec![];
    for (i, line) in log.lines().enumerate() {
        if !line.contains(PER_RESIDUE_MARKER) {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let chain = field(&tokens, 4, i + 1)?;
        let residue = field(&tokens, 5, i + 1)?;
        let value = field(&tokens, column, i + 1)?;
        let row = format!("{residue} {value}\n");
        match chains.iter_mut().find(|c| c.chain == chain) {
            Some(existing) => existing.csv.push_str(&row),
            None => chains.push(ChainCsv {
                chain: chain.to_string(),
                csv: row,
            }),
        }
    }
    Ok(chains)
}

/// Per-residue local correlations.
pub fn lcc_csv(log: &str) -> Result<Vec<ChainCsv>, AnalysisError> {
    per_residue_csv(log, 6)
}

/// Per-residue z-scores.
pub fn zscore_csv(log: &str) -> Result<Vec<ChainCsv>, AnalysisError> {
    per_residue_csv(log, 7)
}

/// Name of the CSV file extracted from an analysis of the model.
///
/// FSC results go into one file; per-residue results get one file per chain.
pub fn csv_name(model: &str, mode: AnalysisMode, chain: Option<&str>) -> String {
    let stem = format!("{}{}", file_stem(model), mode.suffix());
    match chain {
        Some(chain) => format!("{stem}_{chain}.csv"),
        None => format!("{stem}.csv"),
    }
}

/// Per-residue z-score terms that can be mapped onto the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZscoreAttribute {
    Zscore,
    Zdensity,
    Zneighborhood,
    Zrama,
    Zbondstrain,
}

impl ZscoreAttribute {
    pub const ALL: [ZscoreAttribute; 5] = [
        ZscoreAttribute::Zscore,
        ZscoreAttribute::Zdensity,
        ZscoreAttribute::Zneighborhood,
        ZscoreAttribute::Zrama,
        ZscoreAttribute::Zbondstrain,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ZscoreAttribute::Zscore => "zscore",
            ZscoreAttribute::Zdensity => "zdensity",
            ZscoreAttribute::Zneighborhood => "zneighborhood",
            ZscoreAttribute::Zrama => "zrama",
            ZscoreAttribute::Zbondstrain => "zbondstrain",
        }
    }

    /// Field of the attribute in `zscores_combined.csv`.
    pub fn column(self) -> usize {
        match self {
            ZscoreAttribute::Zscore => 4,
            ZscoreAttribute::Zdensity => 5,
            ZscoreAttribute::Zneighborhood => 6,
            ZscoreAttribute::Zrama => 7,
            ZscoreAttribute::Zbondstrain => 8,
        }
    }

    /// Name of the coloring script, e.g. `model_lcc_res_zrama.cxc`.
    pub fn script_name(self, model: &str) -> String {
        format!(
            "{}{}_{}.cxc",
            file_stem(model),
            AnalysisMode::Lcc.suffix(),
            self.name()
        )
    }

    /// ChimeraX script that colors the model by this attribute.
    ///
    /// `combined` is the content of `zscores_combined.csv`.
    pub fn color_script(self, combined: &str) -> Result<String, AnalysisError> {
        let name = self.name();
        let mut cxc = String::from("hide atoms\nshow cartoons\n");
        for (i, line) in combined.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let chain = field(&tokens, 1, i + 1)?;
            let residue = field(&tokens, 2, i + 1)?;
            let value = field(&tokens, self.column(), i + 1)?;
            cxc.push_str(&format!(
                "setattr /{chain}:{residue} res {name} {value} create true\n"
            ));
        }
        cxc.push_str(&format!(
            "color byattribute {name} palette -1,red:-0.5,white:0,gold\n"
        ));
        Ok(cxc)
    }
}
