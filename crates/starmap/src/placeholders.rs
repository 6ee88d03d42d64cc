//! Placeholders in StarMap templates.
//!
//! Templates mark the values supplied by a job with tokens of the form `@@NAME@@`.

/// Stand-in value for the file of a disabled feature.
///
/// Tags that carry this value are removed by the refinement policy.
pub const XML_TAG_WILL_BE_DELETED: &str = "@@XML_TAG_WILL_BE_DELETED@@";

const DELIMITER: &str = "@@";

/// A placeholder recognized in templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    RosettaScriptFile,
    RosettaScriptExe,
    Cores,
    InputPdbFile,
    Nstruct,
    DensityFile,
    ConstraintApw,
    ConstraintSetFile,
    SymmetryFile,
    UseSymmetry,
    RunSymmetryCommandline,
    Strategy,
    DensityWeight,
    Hires,
    ValidationHalf2File,
    /// One of the eight free-form user placeholders, numbered from 1.
    User(u8),
    ApixMap,
    Aniso,
}

impl Placeholder {
    /// Number of user placeholders.
    pub const USER_COUNT: u8 = 8;

    /// Name of the placeholder without the delimiters.
    pub fn name(&self) -> String {
        let s = match self {
            Placeholder::RosettaScriptFile => "ROSETTA_SCRIPT_FILE",
            Placeholder::RosettaScriptExe => "ROSETTA_SCRIPT_EXE",
            Placeholder::Cores => "CORES",
            Placeholder::InputPdbFile => "INPUT_PDB_FILE",
            Placeholder::Nstruct => "NSTRUCT",
            Placeholder::DensityFile => "DENSITY_FILE",
            Placeholder::ConstraintApw => "CONSTRAINT_APW",
            Placeholder::ConstraintSetFile => "CONSTRAINT_SET_FILE",
            Placeholder::SymmetryFile => "SYMMETRY_FILE",
            Placeholder::UseSymmetry => "USE_SYMMETRY",
            Placeholder::RunSymmetryCommandline => "RUN_SYMMETRY_COMMANDLINE",
            Placeholder::Strategy => "STRATEGY",
            Placeholder::DensityWeight => "DENSITY_WEIGHT",
            Placeholder::Hires => "HIRES",
            Placeholder::ValidationHalf2File => "VALIDATION_HALF2_FILE",
            Placeholder::User(n) => return format!("USER{n}"),
            Placeholder::ApixMap => "APIX_MAP",
            Placeholder::Aniso => "ANISO",
        };
        s.to_string()
    }

    /// The token as it appears in templates, e.g. `@@CORES@@`.
    pub fn token(&self) -> String {
        format!("{DELIMITER}{}{DELIMITER}", self.name())
    }
}

/// An ordered table of placeholder values.
///
/// Values are applied in insertion order by plain text replacement.
/// Setting a placeholder twice keeps the first position and the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions(Vec<(Placeholder, String)>);

impl Substitutions {
    pub fn new() -> Substitutions {
        Default::default()
    }

    pub fn set<S: Into<String>>(&mut self, placeholder: Placeholder, value: S) -> &mut Self {
        let value = value.into();
        match self.0.iter_mut().find(|(p, _)| *p == placeholder) {
            Some(entry) => entry.1 = value,
            None => self.0.push((placeholder, value)),
        }
        self
    }

    pub fn with<S: Into<String>>(mut self, placeholder: Placeholder, value: S) -> Self {
        self.set(placeholder, value);
        self
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.0
            .iter()
            .find(|(p, _)| *p == placeholder)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Placeholder, &str)> {
        self.0.iter().map(|(p, v)| (*p, v.as_str()))
    }

    /// Replace every token of the table in the text.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (placeholder, value) in &self.0 {
            out = out.replace(&placeholder.token(), value);
        }
        out
    }
}

/// Tokens of the form `@@NAME@@` left in the text, in order of first appearance.
///
/// The deletion marker is not reported.
pub fn unresolved_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = vec![];
    let mut rest = text;
    while let Some(start) = rest.find(DELIMITER) {
        let after = &rest[start + DELIMITER.len()..];
        let Some(len) = after.find(DELIMITER) else {
            break;
        };
        let name = &after[..len];
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            let token = format!("{DELIMITER}{name}{DELIMITER}");
            if token != XML_TAG_WILL_BE_DELETED && !tokens.contains(&token) {
                tokens.push(token);
            }
            rest = &after[len + DELIMITER.len()..];
        } else {
            rest = &after[len..];
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens() {
        assert_eq!(Placeholder::Cores.token(), "@@CORES@@");
        assert_eq!(Placeholder::User(3).token(), "@@USER3@@");
        assert_eq!(
            Placeholder::ValidationHalf2File.token(),
            "@@VALIDATION_HALF2_FILE@@"
        );
    }

    #[test]
    fn apply_replaces_every_occurrence() {
        let subs = Substitutions::new()
            .with(Placeholder::Hires, "3.2")
            .with(Placeholder::Cores, "4");
        assert_eq!(
            subs.apply(r#"<R hi="@@HIRES@@" lo="@@HIRES@@" n="@@CORES@@" x="@@NSTRUCT@@"/>"#),
            r#"<R hi="3.2" lo="3.2" n="4" x="@@NSTRUCT@@"/>"#
        );
    }

    #[test]
    fn set_keeps_position_and_last_value() {
        let mut subs = Substitutions::new();
        subs.set(Placeholder::Cores, "1")
            .set(Placeholder::Hires, "3")
            .set(Placeholder::Cores, "8");
        let got: Vec<(Placeholder, &str)> = subs.iter().collect();
        assert_eq!(got, vec![(Placeholder::Cores, "8"), (Placeholder::Hires, "3")]);
        assert_eq!(subs.get(Placeholder::Cores), Some("8"));
        assert_eq!(subs.get(Placeholder::Aniso), None);
    }

    #[test]
    fn unresolved() {
        let text = format!(
            "a @@CORES@@ b @@USER1@@ {XML_TAG_WILL_BE_DELETED} @@ not a token @@ @@CORES@@ @@DANGLING"
        );
        assert_eq!(unresolved_tokens(&text), vec!["@@CORES@@", "@@USER1@@"]);
    }

    #[test]
    fn unresolved_adjacent_tokens() {
        assert_eq!(
            unresolved_tokens("@@A@@@@B@@"),
            vec!["@@A@@".to_string(), "@@B@@".to_string()]
        );
    }
}
