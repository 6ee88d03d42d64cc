//! MEDIC error summaries.
//!
//! MEDIC writes a summary of the residues it flags as blocks separated by blank lines.
//! A block names the residue and its severity, `12A-15A, definite error`,
//!     and a line that describes the likely causes.

/// File name MEDIC writes its summary to.
pub const MEDIC_SUMMARY: &str = "MEDIC_summary.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Definite,
    Possible,
    Other(String),
}

impl Severity {
    fn parse(s: &str) -> Severity {
        match s {
            "definite error" => Severity::Definite,
            "possible error" => Severity::Possible,
            other => Severity::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Definite => write!(f, "definite error"),
            Severity::Possible => write!(f, "possible error"),
            Severity::Other(s) => write!(f, "{s}"),
        }
    }
}

/// One flagged residue or residue range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Residue in MEDIC notation, e.g. `12A` or `12A-15A`.
    pub residue: String,
    pub severity: Severity,
    pub cause: String,
}

#[derive(Default)]
struct PartialEntry {
    residue: Option<String>,
    severity: Option<Severity>,
    cause: String,
}

impl PartialEntry {
    fn flush(&mut self, entries: &mut Vec<Entry>) {
        let partial = std::mem::take(self);
        if let (Some(residue), Some(severity)) = (partial.residue, partial.severity) {
            entries.push(Entry {
                residue,
                severity,
                cause: partial.cause,
            });
        }
    }
}

/// Parse a MEDIC summary.
///
/// Blocks without a residue line are skipped.
pub fn parse_summary(summary: &str) -> Vec<Entry> {
    let mut entries = vec![];
    let mut partial = PartialEntry::default();
    for line in summary.lines() {
        if line.trim().len() <= 1 {
            partial.flush(&mut entries);
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        match fields.as_slice() {
            [cause] if cause.contains("causes") => {
                partial.cause = cause.trim().to_string();
            }
            [residue, severity] => {
                partial.residue = Some(residue.trim().replace(' ', ""));
                partial.severity = Some(Severity::parse(severity.trim()));
            }
            _ => {}
        }
    }
    partial.flush(&mut entries);
    entries
}

/// Convert a residue in MEDIC notation to a ChimeraX chain and residue spec.
///
/// `12A` becomes `A:12` and `12A-15A` becomes `A:12-15`.
pub fn chimerax_spec(residue: &str) -> Option<String> {
    let runs = digit_runs(residue);
    match runs.as_slice() {
        [number, chain] => Some(format!("{chain}:{number}")),
        [first, _, last, chain] => Some(format!("{chain}:{first}-{last}")),
        _ => None,
    }
}

/// Split into maximal runs of digits and non-digits.
fn digit_runs(s: &str) -> Vec<&str> {
    let mut runs = vec![];
    let mut start = 0;
    let mut previous: Option<bool> = None;
    for (i, c) in s.char_indices() {
        let digit = c.is_ascii_digit();
        if previous.is_some_and(|p| p != digit) {
            runs.push(&s[start..i]);
            start = i;
        }
        previous = Some(digit);
    }
    if start < s.len() {
        runs.push(&s[start..]);
    }
    runs
}

/// ChimeraX commands that select and center a flagged residue.
///
/// With `zone` set, the map display is restricted to the density around the selection.
/// Returns [`None`] if the residue is not in MEDIC notation.
pub fn show_commands(model: &str, map: &str, residue: &str, zone: bool) -> Option<Vec<String>> {
    let selection = format!("sel {model}/{}", chimerax_spec(residue)?);
    let mut commands = vec!["~sel".to_string()];
    if zone {
        commands.push(selection);
        commands.push("view sel".into());
        commands.push(format!("volume zone {map} near sel range 3"));
    } else {
        commands.push(format!("volume unzone {map}"));
        commands.push(selection);
        commands.push("view sel".into());
    }
    commands.push("clip off".into());
    commands.push("zoom 0.4".into());
    Some(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str = "\
12A-15A, definite error
 causes: poor density fit and strained backbone

 36 B, possible error
 causes: rama outlier

77C, suspicious
";

    #[test]
    fn parse() {
        assert_eq!(
            parse_summary(SUMMARY),
            vec![
                Entry {
                    residue: "12A-15A".into(),
                    severity: Severity::Definite,
                    cause: "causes: poor density fit and strained backbone".into(),
                },
                Entry {
                    residue: "36B".into(),
                    severity: Severity::Possible,
                    cause: "causes: rama outlier".into(),
                },
                Entry {
                    residue: "77C".into(),
                    severity: Severity::Other("suspicious".into()),
                    cause: "".into(),
                },
            ]
        );
    }

    #[test]
    fn parse_last_entry_without_trailing_newline() {
        let entries = parse_summary("5A, possible error\ncauses: clash");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cause, "causes: clash");
    }

    #[test]
    fn blank_blocks_are_skipped() {
        assert_eq!(parse_summary("\n\n \n"), vec![]);
    }

    #[test]
    fn specs() {
        assert_eq!(chimerax_spec("12A"), Some("A:12".into()));
        assert_eq!(chimerax_spec("12A-15A"), Some("A:12-15".into()));
        assert_eq!(chimerax_spec("A"), None);
        assert_eq!(chimerax_spec("12A15"), None);
    }

    #[test]
    fn commands_with_zone() {
        assert_eq!(
            show_commands("#1", "#2", "12A", true).unwrap(),
            vec![
                "~sel",
                "sel #1/A:12",
                "view sel",
                "volume zone #2 near sel range 3",
                "clip off",
                "zoom 0.4",
            ]
        );
    }

    #[test]
    fn commands_without_zone() {
        assert_eq!(
            show_commands("#1", "#2", "12A-15A", false).unwrap(),
            vec![
                "~sel",
                "volume unzone #2",
                "sel #1/A:12-15",
                "view sel",
                "clip off",
                "zoom 0.4",
            ]
        );
        assert_eq!(show_commands("#1", "#2", "bad", false), None);
    }
}
