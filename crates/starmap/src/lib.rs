//! Template engine of StarMap, the Rosetta refinement front end for cryo-EM models.
//!
//! The [`script`] module parses, edits and serializes the Rosetta script dialect the templates are written in.
//! The other modules build on it:
//!
//! - [`policy`] removes the parts of the refinement template that do not apply to a job.
//! - [`placeholders`] and [`job`] fill in the `@@NAME@@` tokens of Rosetta and shell templates.
//! - [`scripts`] generates the helper scripts for validation and B-factor refinement.
//! - [`analysis`] extracts validation results from `density_tools` logs.
//! - [`medic`] reads MEDIC error summaries.
//!
//! The crate does no I/O; callers pass file contents in and write the results out.

pub mod analysis;
pub mod job;
pub mod medic;
pub mod placeholders;
pub mod policy;
pub mod script;
pub mod scripts;
