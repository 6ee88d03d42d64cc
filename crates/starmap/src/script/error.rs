//! Errors relating to Rosetta script parsing and editing

/// Error generated while parsing a Rosetta script.
///
/// Parse errors are fatal: no partial document is returned.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ParseError {
    /// Location of the part of the script that generates this error.
    ///
    /// The span is in bytes.
    pub span: std::ops::Range<usize>,
    /// Line of the start of the span, starting at 1.
    pub line: usize,
    /// Column of the start of the span, starting at 1.
    ///
    /// The column is in number of Unicode code points, not bytes.
    pub column: usize,
    /// Kind of the error.
    pub kind: ParseErrorKind,
}

/// Kind of parse error.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum ParseErrorKind {
    /// The script contains a character that is not part of the grammar.
    InvalidCharacter(char),
    /// A double quoted value is not closed before the end of the line.
    UnterminatedString,
    /// A tag name contains characters other than letters, digits and underscores;
    ///     e.g. `<Fast.Relax/>`.
    InvalidTagName(String),
    /// An attribute name contains characters other than letters, digits and underscores.
    InvalidAttributeName(String),
    /// An opening angle bracket is not followed by a tag name.
    ExpectedTagName,
    /// An attribute name is not followed by `=`.
    ExpectedEquals { attribute: String },
    /// An `=` is not followed by a bare or quoted value.
    ExpectedValue { attribute: String },
    /// A tag is not terminated by `>` or `/>`.
    ExpectedTagEnd,
    /// Text appears outside of a tag; e.g. `<MOVERS> text </MOVERS>`.
    JunkOutsideTag(String),
    /// A closing tag appears with no corresponding opening tag.
    UnexpectedClosingTag(String),
    /// A closing tag does not match the most recently opened tag.
    MismatchedClosingTag { expected: String, found: String },
    /// The document ends while a tag is still open.
    UnclosedTag(String),
    /// The document contains no tags.
    EmptyDocument,
}

struct Data {
    rule: &'static str,
    problem: String,
    action: &'static str,
}

impl ParseErrorKind {
    fn data(&self) -> Data {
        use ParseErrorKind::*;
        match self {
            InvalidCharacter(c) => Data {
                rule: "scripts may only contain tags, attribute names, values and whitespace",
                problem: format!("invalid character {c:?}"),
                action: "remove the character or quote the value that contains it",
            },
            UnterminatedString => Data {
                rule: "quoted values must be closed on the same line",
                problem: "unterminated quoted value".into(),
                action: "add a closing double quote",
            },
            InvalidTagName(name) => Data {
                rule: "tag names consist of letters, digits and underscores",
                problem: format!("invalid tag name `{name}`"),
                action: "rename the tag",
            },
            InvalidAttributeName(name) => Data {
                rule: "attribute names consist of letters, digits and underscores",
                problem: format!("invalid attribute name `{name}`"),
                action: "rename the attribute",
            },
            ExpectedTagName => Data {
                rule: "every `<` must be followed by a tag name",
                problem: "expected a tag name".into(),
                action: "add a tag name after the `<`",
            },
            ExpectedEquals { attribute } => Data {
                rule: "attributes have the form name=value",
                problem: format!("expected `=` after attribute `{attribute}`"),
                action: "add a value for the attribute",
            },
            ExpectedValue { attribute } => Data {
                rule: "values are bare words or double quoted strings",
                problem: format!("expected a value for attribute `{attribute}`"),
                action: "add a value, quoting it if it contains other characters",
            },
            ExpectedTagEnd => Data {
                rule: "tags end with `>` or `/>`",
                problem: "expected the end of the tag".into(),
                action: "close the tag",
            },
            JunkOutsideTag(junk) => Data {
                rule: "text content is not allowed between tags",
                problem: format!("unexpected text `{junk}` outside of a tag"),
                action: "remove the text or move it into an attribute",
            },
            UnexpectedClosingTag(name) => Data {
                rule: "",
                problem: format!("closing tag `</{name}>` has no opening tag"),
                action: "remove the closing tag",
            },
            MismatchedClosingTag { expected, found } => Data {
                rule: "a closing tag must repeat the name of the tag it closes",
                problem: format!("expected `</{expected}>` but found `</{found}>`"),
                action: "fix the name of the closing tag",
            },
            UnclosedTag(name) => Data {
                rule: "",
                problem: format!("tag `<{name}>` is never closed"),
                action: "add a closing tag or make the tag self-closing",
            },
            EmptyDocument => Data {
                rule: "",
                problem: "the script contains no tags".into(),
                action: "provide a non-empty script",
            },
        }
    }
}

impl ParseError {
    /// Create a new parse error, computing the line and column from the source.
    pub fn new(source: &str, span: std::ops::Range<usize>, kind: ParseErrorKind) -> ParseError {
        let (line, column) = line_and_column(source, span.start);
        ParseError {
            span,
            line,
            column,
            kind,
        }
    }

    /// Short description of the problem.
    pub fn message(&self) -> String {
        self.kind.data().problem
    }

    #[cfg(feature = "ariadne")]
    pub fn ariadne_report<'a>(
        &self,
        file_name: &'a str,
    ) -> ariadne::Report<'static, (&'a str, std::ops::Range<usize>)> {
        use ariadne::*;
        let light_blue = Color::Fixed(81);

        let data = self.kind.data();
        let mut builder = Report::build(ReportKind::Error, (file_name, self.span.clone()))
            .with_message(&data.problem)
            .with_label(
                Label::new((file_name, self.span.clone()))
                    .with_message(&data.problem)
                    .with_color(light_blue),
            )
            .with_note(data.action);
        if !data.rule.is_empty() {
            builder = builder.with_help(data.rule);
        }
        builder.finish()
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (line {}, column {})",
            self.message(),
            self.line,
            self.column
        )
    }
}

impl std::error::Error for ParseError {}

fn line_and_column(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// Error generated when the tree does not have the shape an edit expects.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum EditError {
    /// An `Add` tag references a removed mover but is not a bare `<Add mover="..."/>`.
    MalformedMoverReference { mover: String },
    /// A tag carries the same attribute more than once.
    AmbiguousAttribute { tag: String, attribute: String },
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::MalformedMoverReference { mover } => write!(
                f,
                "the reference to mover `{mover}` must be a self-closing `Add` tag with a single `mover` attribute"
            ),
            EditError::AmbiguousAttribute { tag, attribute } => write!(
                f,
                "tag `{tag}` has more than one `{attribute}` attribute"
            ),
        }
    }
}

impl std::error::Error for EditError {}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! position_tests {
        ( $( ($name: ident, $source: expr, $offset: expr, $want: expr, ), )+ ) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(line_and_column($source, $offset), $want);
                }
            )+
        };
    }

    position_tests!(
        (start_of_file, "<a/>", 0, (1, 1),),
        (same_line, "<a/>", 3, (1, 4),),
        (second_line, "<a>\n  <b/>\n</a>", 6, (2, 3),),
        (after_multibyte, "é <", 3, (1, 3),),
        (end_of_file, "<a>\n", 4, (2, 1),),
    );

    #[test]
    fn display_includes_position() {
        let err = ParseError::new(
            "<a>\n</b>",
            4..8,
            ParseErrorKind::MismatchedClosingTag {
                expected: "a".into(),
                found: "b".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "expected `</a>` but found `</b>` (line 2, column 1)"
        );
    }
}
