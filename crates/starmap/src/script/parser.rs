//! Stack based parser that builds a [`Document`] from tokens.

use super::error::{ParseError, ParseErrorKind};
use super::lexer::{Lexer, Token, TokenKind};
use super::tree::{Attribute, Document, Node, Tag};

/// A paired tag whose closing tag has not been seen yet.
struct OpenTag {
    tag: Tag,
    children: Vec<Node>,
    /// Span of the tag name, used when the tag is never closed.
    name_span: std::ops::Range<usize>,
}

struct Parser<'a> {
    source: &'a str,
    lexer: std::iter::Peekable<Lexer<'a>>,
}

enum TagStart {
    Opening(Tag, std::ops::Range<usize>),
    SelfClosing(Tag),
    Closing(String, std::ops::Range<usize>),
}

pub(crate) fn parse(source: &str) -> Result<Document, ParseError> {
    let mut parser = Parser::new(source);
    let mut document = Document(vec![]);
    let mut stack: Vec<OpenTag> = vec![];

    while let Some(token) = parser.next_token()? {
        let node = match token.0 {
            TokenKind::OpenAngle => match parser.parse_tag()? {
                TagStart::Opening(tag, name_span) => {
                    stack.push(OpenTag {
                        tag,
                        children: vec![],
                        name_span,
                    });
                    continue;
                }
                TagStart::SelfClosing(tag) => Node::SelfClosing(tag),
                TagStart::Closing(name, span) => match stack.pop() {
                    None => {
                        return Err(parser.error(span, ParseErrorKind::UnexpectedClosingTag(name)))
                    }
                    Some(open) => {
                        if open.tag.name != name {
                            return Err(parser.error(
                                span,
                                ParseErrorKind::MismatchedClosingTag {
                                    expected: open.tag.name,
                                    found: name,
                                },
                            ));
                        }
                        Node::Paired {
                            tag: open.tag,
                            children: open.children,
                        }
                    }
                },
            },
            _ => {
                let junk = source[token.span()].to_string();
                return Err(parser.error(token.span(), ParseErrorKind::JunkOutsideTag(junk)));
            }
        };
        match stack.last_mut() {
            None => document.0.push(node),
            Some(tail) => tail.children.push(node),
        }
    }

    if let Some(open) = stack.pop() {
        return Err(parser.error(open.name_span, ParseErrorKind::UnclosedTag(open.tag.name)));
    }
    if document.0.is_empty() {
        return Err(parser.error(0..source.len(), ParseErrorKind::EmptyDocument));
    }
    Ok(document)
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            lexer: Lexer::new(source).peekable(),
        }
    }

    fn error(&self, span: std::ops::Range<usize>, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.source, span, kind)
    }

    fn end_of_input(&self) -> std::ops::Range<usize> {
        self.source.len()..self.source.len()
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.lexer.next().transpose()
    }

    fn peek_is(&mut self, kind: &TokenKind) -> bool {
        matches!(self.lexer.peek(), Some(Ok(Token(k, _))) if k == kind)
    }

    /// Parses the remainder of a tag after the opening `<`.
    fn parse_tag(&mut self) -> Result<TagStart, ParseError> {
        if self.peek_is(&TokenKind::Slash) {
            self.next_token()?;
            let (name, span) = self.parse_name()?;
            self.expect_close_angle()?;
            return Ok(TagStart::Closing(name, span));
        }
        let (name, name_span) = self.parse_name()?;
        let mut tag = Tag {
            name,
            attributes: vec![],
        };
        loop {
            let token = match self.next_token()? {
                None => return Err(self.error(self.end_of_input(), ParseErrorKind::ExpectedTagEnd)),
                Some(token) => token,
            };
            match token.0 {
                TokenKind::CloseAngle => return Ok(TagStart::Opening(tag, name_span)),
                TokenKind::Slash => {
                    self.expect_close_angle()?;
                    return Ok(TagStart::SelfClosing(tag));
                }
                TokenKind::Word(ref word) => {
                    if !is_valid_name(word) {
                        return Err(self.error(
                            token.span(),
                            ParseErrorKind::InvalidAttributeName(word.clone()),
                        ));
                    }
                    let attribute = self.parse_attribute_value(word.clone(), token.span().end)?;
                    tag.attributes.push(attribute);
                }
                _ => return Err(self.error(token.span(), ParseErrorKind::ExpectedTagEnd)),
            }
        }
    }

    fn parse_name(&mut self) -> Result<(String, std::ops::Range<usize>), ParseError> {
        match self.next_token()? {
            None => Err(self.error(self.end_of_input(), ParseErrorKind::ExpectedTagName)),
            Some(token) => {
                let span = token.span();
                match token.0 {
                    TokenKind::Word(name) => {
                        if is_valid_name(&name) {
                            Ok((name, span))
                        } else {
                            Err(self.error(span, ParseErrorKind::InvalidTagName(name)))
                        }
                    }
                    _ => Err(self.error(span, ParseErrorKind::ExpectedTagName)),
                }
            }
        }
    }

    fn parse_attribute_value(
        &mut self,
        name: String,
        name_end: usize,
    ) -> Result<Attribute, ParseError> {
        match self.next_token()? {
            Some(Token(TokenKind::Equals, _)) => {}
            Some(token) => {
                return Err(self.error(
                    token.span(),
                    ParseErrorKind::ExpectedEquals { attribute: name },
                ))
            }
            None => {
                return Err(self.error(
                    name_end..name_end,
                    ParseErrorKind::ExpectedEquals { attribute: name },
                ))
            }
        }
        match self.next_token()? {
            Some(Token(TokenKind::Word(value), _)) | Some(Token(TokenKind::Quoted(value), _)) => {
                Ok(Attribute { name, value })
            }
            Some(token) => Err(self.error(
                token.span(),
                ParseErrorKind::ExpectedValue { attribute: name },
            )),
            None => Err(self.error(
                self.end_of_input(),
                ParseErrorKind::ExpectedValue { attribute: name },
            )),
        }
    }

    fn expect_close_angle(&mut self) -> Result<(), ParseError> {
        match self.next_token()? {
            Some(Token(TokenKind::CloseAngle, _)) => Ok(()),
            Some(token) => Err(self.error(token.span(), ParseErrorKind::ExpectedTagEnd)),
            None => Err(self.error(self.end_of_input(), ParseErrorKind::ExpectedTagEnd)),
        }
    }
}

fn is_valid_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, want: Vec<Node>) {
        let got = Document::from_source_code(source).unwrap();
        assert_eq!(got, Document(want));
    }

    fn run_err(source: &str, want_kind: ParseErrorKind, want_line: usize, want_column: usize) {
        let got = Document::from_source_code(source).unwrap_err();
        assert_eq!(got.kind, want_kind);
        assert_eq!((got.line, got.column), (want_line, want_column));
    }

    fn tag(name: &str, attributes: &[(&str, &str)]) -> Tag {
        let mut tag = Tag::new(name);
        for (k, v) in attributes {
            tag = tag.with_attribute(k, v);
        }
        tag
    }

    macro_rules! parse_tests {
        ( $( ($name: ident, $input: expr, $want: expr, ), )+ ) => {
            $(
                #[test]
                fn $name() {
                    run($input, $want);
                }
            )+
        };
    }

    macro_rules! parse_error_tests {
        ( $( ($name: ident, $input: expr, $want_kind: expr, $want_line: expr, $want_column: expr, ), )+ ) => {
            $(
                #[test]
                fn $name() {
                    run_err($input, $want_kind, $want_line, $want_column);
                }
            )+
        };
    }

    parse_tests!(
        (
            self_closing_without_attributes,
            "<MOVERS/>",
            vec![Node::SelfClosing(tag("MOVERS", &[]))],
        ),
        (
            self_closing_with_attributes,
            r#"<Add mover="relax" filter=fsc/>"#,
            vec![Node::SelfClosing(tag(
                "Add",
                &[("mover", "relax"), ("filter", "fsc")]
            ))],
        ),
        (
            paired_without_children,
            r#"<FastRelax name=relax repeats=5></FastRelax>"#,
            vec![Node::Paired {
                tag: tag("FastRelax", &[("name", "relax"), ("repeats", "5")]),
                children: vec![],
            }],
        ),
        (
            nested,
            "<ROSETTASCRIPTS>\n\t<MOVERS>\n\t\t<Stage name=\"A\"/>\n\t</MOVERS>\n</ROSETTASCRIPTS>\n",
            vec![Node::Paired {
                tag: tag("ROSETTASCRIPTS", &[]),
                children: vec![Node::Paired {
                    tag: tag("MOVERS", &[]),
                    children: vec![Node::SelfClosing(tag("Stage", &[("name", "A")]))],
                }],
            }],
        ),
        (
            multiple_roots,
            r#"<Stage name="A"/><Add mover="A"/>"#,
            vec![
                Node::SelfClosing(tag("Stage", &[("name", "A")])),
                Node::SelfClosing(tag("Add", &[("mover", "A")])),
            ],
        ),
        (
            lenient_whitespace,
            "< Stage name = \"A\" / >< Outer >< / Outer >",
            vec![
                Node::SelfClosing(tag("Stage", &[("name", "A")])),
                Node::Paired {
                    tag: tag("Outer", &[]),
                    children: vec![],
                },
            ],
        ),
        (
            quoted_value_with_spaces_and_placeholders,
            r#"<Load name=map file="@@DENSITY_FILE@@ -x"/>"#,
            vec![Node::SelfClosing(tag(
                "Load",
                &[("name", "map"), ("file", "@@DENSITY_FILE@@ -x")]
            ))],
        ),
        (
            bare_values_with_dots_and_percent,
            "<Sampler fraction=12.5% weight=0.1/>",
            vec![Node::SelfClosing(tag(
                "Sampler",
                &[("fraction", "12.5%"), ("weight", "0.1")]
            ))],
        ),
    );

    parse_error_tests!(
        (
            empty_document,
            "  \n ",
            ParseErrorKind::EmptyDocument,
            1,
            1,
        ),
        (
            text_between_tags,
            "<MOVERS>\n  hello\n</MOVERS>",
            ParseErrorKind::JunkOutsideTag("hello".into()),
            2,
            3,
        ),
        (
            mismatched_closing_tag,
            "<MOVERS>\n</FILTERS>",
            ParseErrorKind::MismatchedClosingTag {
                expected: "MOVERS".into(),
                found: "FILTERS".into(),
            },
            2,
            3,
        ),
        (
            unexpected_closing_tag,
            "<A/></A>",
            ParseErrorKind::UnexpectedClosingTag("A".into()),
            1,
            7,
        ),
        (
            unclosed_tag,
            "<A>\n  <B>\n  </B>\n",
            ParseErrorKind::UnclosedTag("A".into()),
            1,
            2,
        ),
        (
            missing_equals,
            "<A b c=1/>",
            ParseErrorKind::ExpectedEquals {
                attribute: "b".into()
            },
            1,
            6,
        ),
        (
            missing_value,
            "<A b=/>",
            ParseErrorKind::ExpectedValue {
                attribute: "b".into()
            },
            1,
            6,
        ),
        (
            missing_tag_name,
            "<=/>",
            ParseErrorKind::ExpectedTagName,
            1,
            2,
        ),
        (
            invalid_tag_name,
            "<Fast.Relax/>",
            ParseErrorKind::InvalidTagName("Fast.Relax".into()),
            1,
            2,
        ),
        (
            invalid_attribute_name,
            "<A b%=1/>",
            ParseErrorKind::InvalidAttributeName("b%".into()),
            1,
            4,
        ),
        (
            tag_never_ends,
            "<A b=1",
            ParseErrorKind::ExpectedTagEnd,
            1,
            7,
        ),
        (
            unquoted_placeholder,
            "<A file=@@DENSITY_FILE@@/>",
            ParseErrorKind::InvalidCharacter('@'),
            1,
            9,
        ),
        (
            comment,
            "<!-- note -->",
            ParseErrorKind::InvalidCharacter('!'),
            1,
            2,
        ),
    );
}
