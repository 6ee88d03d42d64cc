//! Customization of the refinement template from the user's choices.
//!
//! The template contains the movers for every supported setup.
//! [`RefinementPolicy::apply`] removes the movers that do not apply to the current job.

use crate::script::edit::{self, EditContext};
use crate::script::{Document, EditError};
use tracing::{debug, info};

/// Selections below this size are refined with `FastRelax`, larger ones with `LocalRelax`.
pub const LOCAL_RELAX_RESIDUE_LIMIT: usize = 800;

/// Maximum number of `relaxcart` references rewritten for torsion refinement.
pub const TORSION_RENAME_LIMIT: usize = 9;

/// Refinement task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Task {
    #[default]
    FullRebuild,
    MinimumRebuild,
    RefinementOnly,
    TorsionRefine,
}

impl Task {
    pub const ALL: [Task; 4] = [
        Task::FullRebuild,
        Task::MinimumRebuild,
        Task::RefinementOnly,
        Task::TorsionRefine,
    ];

    /// Number of models generated when the user does not choose one.
    pub fn default_models(self) -> u32 {
        match self {
            Task::FullRebuild => 20,
            Task::MinimumRebuild => 10,
            Task::RefinementOnly | Task::TorsionRefine => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Task::FullRebuild => "Full rebuild",
            Task::MinimumRebuild => "Minimum rebuild",
            Task::RefinementOnly => "Refinement only",
            Task::TorsionRefine => "Torsion refine",
        }
    }

    /// Names of the rebuilding stages this task does not run.
    pub fn skipped_stages(self) -> &'static [&'static str] {
        match self {
            Task::FullRebuild => &[],
            Task::MinimumRebuild => &["cen5_50", "cen5_60", "cen5_70"],
            Task::RefinementOnly | Task::TorsionRefine => {
                &["cen5_50", "cen5_60", "cen5_70", "cen5_80", "cen5_rama"]
            }
        }
    }
}

/// How the rebuilding stages choose residues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Strategy {
    /// Rosetta picks the worst fitting residues.
    #[default]
    Auto,
    /// Only the residues in [`RefinementPolicy::residues`] are rebuilt.
    User,
}

impl Strategy {
    /// Name of the strategy as written into the script.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Auto => "auto",
            Strategy::User => edit::USER_STRATEGY,
        }
    }
}

/// The choices that decide which parts of the template survive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RefinementPolicy {
    /// Number of residues in the model selected for refinement.
    pub selected_residues: usize,
    pub symmetry: bool,
    /// Whether a constraint set file is supplied.
    pub constraints: bool,
    /// Whether a second half map is supplied for model validation.
    pub half_map_validation: bool,
    pub strategy: Strategy,
    /// Residue selection used with [`Strategy::User`], e.g. `22A-36A,56B-77B`.
    pub residues: String,
    pub task: Task,
}

/// Totals over all steps of [`RefinementPolicy::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyReport {
    pub tags: usize,
    pub references: usize,
    pub substitutions: usize,
    pub renamed: usize,
}

impl PolicyReport {
    fn add(&mut self, removal: edit::Removal) {
        self.tags += removal.tags;
        self.references += removal.references;
    }
}

impl RefinementPolicy {
    /// Remove the parts of the template that do not apply.
    ///
    /// On error the document is left unchanged.
    pub fn apply(
        &self,
        document: &mut Document,
        ctx: &mut EditContext,
    ) -> Result<PolicyReport, EditError> {
        let mut working = document.clone();
        let mut report = PolicyReport::default();

        let relax = if self.selected_residues < LOCAL_RELAX_RESIDUE_LIMIT {
            "LocalRelax"
        } else {
            "FastRelax"
        };
        debug!(
            selected_residues = self.selected_residues,
            removed = relax,
            "choosing relax protocol"
        );
        report.add(ctx.delete_tag_and_its_movers(&mut working, relax)?);

        let symmetry_tags: &[&str] = if self.symmetry {
            &["SetupForDensityScoring", "MinMover"]
        } else {
            &["SetupForSymmetry", "SymMinMover"]
        };
        for tag in symmetry_tags {
            report.add(ctx.delete_tag_and_its_movers(&mut working, tag)?);
        }

        if !self.constraints {
            report.add(ctx.delete_tag_and_its_movers(&mut working, "ConstraintSetMover")?);
        }

        let report_fsc = if self.half_map_validation {
            "reportFSC"
        } else {
            "reportFSC_withtest"
        };
        report.add(ctx.delete_value_and_its_movers(&mut working, report_fsc)?);

        if self.strategy == Strategy::User {
            ctx.reset();
            report.substitutions +=
                edit::substitute_attr_value(&mut working.0, "CartesianSampler", &self.residues)?;
            edit::compact(&mut working.0);
        }

        for stage in self.task.skipped_stages() {
            report.add(ctx.delete_value_and_its_movers(&mut working, stage)?);
        }

        if self.task == Task::TorsionRefine {
            report.renamed = edit::rename_attr_values(
                &mut working.0,
                edit::MOVER_ATTRIBUTE,
                "relaxcart",
                "relax",
                TORSION_RENAME_LIMIT,
            );
        }

        *document = working;
        info!(
            task = self.task.label(),
            tags = report.tags,
            references = report.references,
            "applied refinement policy"
        );
        Ok(report)
    }
}
