// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP statement scanner and nom tokenizer
//!
//! The scanner cuts a section into `...;` statements without looking at
//! their structure (it only tracks string literals and comments). Each
//! statement is then tokenized with nom; lists are parsed recursively, so a
//! parameter such as `((#4,#5),(#6,#7))` is always one value.

use memchr::{memchr, memmem};
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{eof, map, map_res, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::error::{Error, Result};
use crate::value::Value;

/// Parse entity reference: #123
fn entity_ref(input: &str) -> IResult<&str, Value> {
    map(
        preceded(char('#'), map_res(digit1, |s: &str| s.parse::<u64>())),
        Value::EntityRef,
    )(input)
}

/// Parse string literal: 'text' (or "hex" binary)
/// STEP uses '' to escape a single quote within a string
fn string_literal(input: &str) -> IResult<&str, Value> {
    fn content(input: &str, quote: u8) -> IResult<&str, &str> {
        let bytes = input.as_bytes();
        let mut i = 0;
        while let Some(found) = memchr(quote, &bytes[i..]) {
            let at = i + found;
            if bytes.get(at + 1) == Some(&quote) {
                i = at + 2;
                continue;
            }
            return Ok((&input[at..], &input[..at]));
        }
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )))
    }

    alt((
        map(
            delimited(char('\''), |i| content(i, b'\''), char('\'')),
            |s: &str| Value::String(s.replace("''", "'")),
        ),
        map(
            delimited(char('"'), |i| content(i, b'"'), char('"')),
            |s: &str| Value::String(s.to_string()),
        ),
    ))(input)
}

/// Parse integer: 42, -42, +7
fn integer(input: &str) -> IResult<&str, Value> {
    map_res(recognize(pair(opt(one_of("+-")), digit1)), |s: &str| {
        s.trim_start_matches('+').parse::<i64>().map(Value::Integer)
    })(input)
}

/// Parse real: 3.14, -3.14, 1.5E-10, 0.
fn real(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(tuple((
            opt(one_of("+-")),
            digit1,
            char('.'),
            opt(digit1),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| fast_float::parse::<f64, _>(s.trim_start_matches('+')).map(Value::Real),
    )(input)
}

/// Parse enum: .T., .ELEMENT., .NOTDEFINED.
fn enum_value(input: &str) -> IResult<&str, Value> {
    map(
        delimited(
            char('.'),
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
            char('.'),
        ),
        |s: &str| Value::Enum(s.to_string()),
    )(input)
}

fn omitted(input: &str) -> IResult<&str, Value> {
    map(char('$'), |_| Value::Omitted)(input)
}

fn derived(input: &str) -> IResult<&str, Value> {
    map(char('*'), |_| Value::Derived)(input)
}

fn keyword(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')(input)
}

/// Parse typed value: IFCLENGTHMEASURE(0.3048), IFCBOOLEAN(.T.)
fn typed_value(input: &str) -> IResult<&str, Value> {
    map(pair(keyword, parameter_list), |(name, args)| {
        Value::Typed(name.to_ascii_uppercase(), args)
    })(input)
}

/// Skip whitespace
fn ws(input: &str) -> IResult<&str, ()> {
    map(take_while(|c: char| c.is_whitespace()), |_| ())(input)
}

/// Parse one parameter with optional surrounding whitespace
fn token(input: &str) -> IResult<&str, Value> {
    delimited(
        ws,
        alt((
            real, // before integer: a real starts with an integer
            integer,
            entity_ref,
            string_literal,
            enum_value,
            list,
            typed_value,
            omitted,
            derived,
        )),
        ws,
    )(input)
}

/// `( token, token, ... )`
fn parameter_list(input: &str) -> IResult<&str, Vec<Value>> {
    delimited(
        char('('),
        separated_list0(char(','), token),
        preceded(ws, char(')')),
    )(input)
}

/// Parse list: (1, 2, 3) or nested lists
fn list(input: &str) -> IResult<&str, Value> {
    map(parameter_list, Value::List)(input)
}

/// Map a nom failure to a byte position inside the statement
fn nom_error(input: &str, offset: usize, err: nom::Err<nom::error::Error<&str>>) -> Error {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let at = input.len() - e.input.len();
            let near: String = e.input.chars().take(16).collect();
            Error::parse(offset + at, format!("unexpected input near `{}`", near))
        }
        nom::Err::Incomplete(_) => Error::parse(offset + input.len(), "incomplete statement"),
    }
}

/// Parse a complete entity instance
/// Example: #123=IFCWALL('guid',#2,$,$,'name',$,$,$);
///
/// `offset` is the statement's byte offset in the file, used for error
/// positions. Returns the id, the upper-case type name and the parameters.
pub fn parse_entity(input: &str, offset: usize) -> Result<(u64, String, Vec<Value>)> {
    let result: IResult<&str, (u64, &str, Vec<Value>)> = terminated(
        tuple((
            delimited(
                ws,
                preceded(char('#'), map_res(digit1, |s: &str| s.parse::<u64>())),
                ws,
            ),
            preceded(char('='), delimited(ws, keyword, ws)),
            parameter_list,
        )),
        tuple((ws, char(';'), ws, eof)),
    )(input);

    match result {
        Ok((_, (id, type_name, params))) => Ok((id, type_name.to_ascii_uppercase(), params)),
        Err(e) => Err(nom_error(input, offset, e)),
    }
}

/// Parse a header record such as `FILE_SCHEMA(('IFC4'));`
pub fn parse_record(input: &str, offset: usize) -> Result<(String, Vec<Value>)> {
    let result: IResult<&str, (&str, Vec<Value>)> = terminated(
        pair(delimited(ws, keyword, ws), parameter_list),
        tuple((ws, char(';'), ws, eof)),
    )(input);

    match result {
        Ok((_, (name, params))) => Ok((name.to_ascii_uppercase(), params)),
        Err(e) => Err(nom_error(input, offset, e)),
    }
}

/// One `...;` statement cut from the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement<'a> {
    /// Byte offset of the first character in the scanned content
    pub offset: usize,
    /// Statement text, including the trailing `;` when terminated
    pub text: &'a str,
    /// `false` when the statement ran into the next `#N=` line or the end
    /// of input before its `;`
    pub terminated: bool,
}

impl<'a> Statement<'a> {
    /// Section keywords such as `HEADER;`, `DATA;` and `ENDSEC;`
    pub fn keyword(&self) -> Option<&'a str> {
        let body = self.text.trim().strip_suffix(';')?.trim_end();
        if !body.is_empty() && body.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            Some(body)
        } else {
            None
        }
    }
}

/// Splits STEP text into statements
///
/// Quote-aware (`'it''s; fine'` does not end a statement) and skips
/// `/* ... */` comments between and inside statements.
pub struct StatementScanner<'a> {
    content: &'a str,
    position: usize,
}

impl<'a> StatementScanner<'a> {
    /// Create a new scanner
    pub fn new(content: &'a str) -> Self {
        Self {
            content,
            position: 0,
        }
    }

    /// Start scanning at a byte offset
    pub fn at(content: &'a str, position: usize) -> Self {
        Self {
            content,
            position: position.min(content.len()),
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.position
    }

    fn skip_trivia(&mut self) {
        let bytes = self.content.as_bytes();
        loop {
            while self.position < bytes.len() && bytes[self.position].is_ascii_whitespace() {
                self.position += 1;
            }
            if bytes[self.position..].starts_with(b"/*") {
                self.position = match memmem::find(&bytes[self.position + 2..], b"*/") {
                    Some(end) => self.position + 2 + end + 2,
                    None => bytes.len(),
                };
            } else {
                return;
            }
        }
    }

    /// A new line that opens another entity instance: `#<digits> =`
    fn starts_instance(bytes: &[u8]) -> bool {
        let mut i = 0;
        while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t' || bytes[i] == b'\r') {
            i += 1;
        }
        if bytes.get(i) != Some(&b'#') {
            return false;
        }
        i += 1;
        let digits = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits {
            return false;
        }
        while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
            i += 1;
        }
        bytes.get(i) == Some(&b'=')
    }
}

impl<'a> Iterator for StatementScanner<'a> {
    type Item = Statement<'a>;

    fn next(&mut self) -> Option<Statement<'a>> {
        self.skip_trivia();
        let bytes = self.content.as_bytes();
        let start = self.position;
        if start >= bytes.len() {
            return None;
        }

        let mut i = start;
        while i < bytes.len() {
            match bytes[i] {
                b'\'' => {
                    // Jump over the literal, honouring '' escapes
                    let mut j = i + 1;
                    loop {
                        match memchr(b'\'', &bytes[j..]) {
                            Some(found) if bytes.get(j + found + 1) == Some(&b'\'') => {
                                j += found + 2;
                            }
                            Some(found) => {
                                i = j + found + 1;
                                break;
                            }
                            None => {
                                i = bytes.len();
                                break;
                            }
                        }
                    }
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    i = match memmem::find(&bytes[i + 2..], b"*/") {
                        Some(end) => i + 2 + end + 2,
                        None => bytes.len(),
                    };
                }
                b';' => {
                    self.position = i + 1;
                    return Some(Statement {
                        offset: start,
                        text: &self.content[start..=i],
                        terminated: true,
                    });
                }
                b'\n' if Self::starts_instance(&bytes[i + 1..]) => {
                    self.position = i + 1;
                    return Some(Statement {
                        offset: start,
                        text: self.content[start..i].trim_end(),
                        terminated: false,
                    });
                }
                _ => i += 1,
            }
        }

        self.position = bytes.len();
        Some(Statement {
            offset: start,
            text: self.content[start..].trim_end(),
            terminated: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref() {
        assert_eq!(entity_ref("#123"), Ok(("", Value::EntityRef(123))));
        assert_eq!(entity_ref("#0"), Ok(("", Value::EntityRef(0))));
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            string_literal("'hello'"),
            Ok(("", Value::String("hello".into())))
        );
        assert_eq!(
            string_literal("'it''s'"),
            Ok(("", Value::String("it's".into())))
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(integer("-42"), Ok(("", Value::Integer(-42))));
        assert_eq!(real("3.14"), Ok(("", Value::Real(3.14))));
        assert_eq!(real("0."), Ok(("", Value::Real(0.0))));
        assert_eq!(real("1.5E-10"), Ok(("", Value::Real(1.5e-10))));
        assert_eq!(token("7"), Ok(("", Value::Integer(7))));
    }

    #[test]
    fn test_enum() {
        assert_eq!(enum_value(".T."), Ok(("", Value::Enum("T".into()))));
        assert_eq!(
            enum_value(".ELEMENT."),
            Ok(("", Value::Enum("ELEMENT".into())))
        );
    }

    #[test]
    fn test_nested_list() {
        let (_, value) = list("(1,(2,3),4)").unwrap();
        assert_eq!(
            value,
            Value::List(vec![
                Value::Integer(1),
                Value::List(vec![Value::Integer(2), Value::Integer(3)]),
                Value::Integer(4),
            ])
        );
    }

    #[test]
    fn test_polyline_points_stay_one_parameter() {
        let (id, type_name, params) = parse_entity("#1=IFCPOLYLINE((#2,#3));", 0).unwrap();
        assert_eq!(id, 1);
        assert_eq!(type_name, "IFCPOLYLINE");
        assert_eq!(params.len(), 1);
        assert_eq!(
            params[0],
            Value::List(vec![Value::EntityRef(2), Value::EntityRef(3)])
        );
    }

    #[test]
    fn test_parse_entity_with_typed_value_and_spaces() {
        let input = "#7 = IFCPROPERTYSINGLEVALUE('Width', $, IFCLENGTHMEASURE(0.25), $) ;";
        let (id, type_name, params) = parse_entity(input, 0).unwrap();
        assert_eq!(id, 7);
        assert_eq!(type_name, "IFCPROPERTYSINGLEVALUE");
        assert_eq!(params.len(), 4);
        assert_eq!(params[2].as_f64(), Some(0.25));
    }

    #[test]
    fn test_parse_entity_rejects_malformed_number() {
        let err = parse_entity("#5=IFCCARTESIANPOINT((1.0.2,0.));", 100).unwrap_err();
        match err {
            Error::Parse { position, .. } => assert!(position > 100),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parse_record() {
        let (name, params) = parse_record("FILE_SCHEMA(('IFC4'));", 0).unwrap();
        assert_eq!(name, "FILE_SCHEMA");
        assert_eq!(params[0], Value::List(vec![Value::String("IFC4".into())]));
    }

    #[test]
    fn test_scanner_respects_quotes_and_comments() {
        let content = "#1=IFCLABEL('a;b');\n/* note; */ #2=IFCLABEL('c');";
        let statements: Vec<_> = StatementScanner::new(content).collect();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].text, "#1=IFCLABEL('a;b');");
        assert_eq!(statements[1].text, "#2=IFCLABEL('c');");
        assert!(statements.iter().all(|s| s.terminated));
    }

    #[test]
    fn test_scanner_cuts_unterminated_statement_at_next_instance() {
        let content = "#1=IFCWALL('a',$\n#2=IFCWALL('b');";
        let statements: Vec<_> = StatementScanner::new(content).collect();
        assert_eq!(statements.len(), 2);
        assert!(!statements[0].terminated);
        assert_eq!(statements[0].text, "#1=IFCWALL('a',$");
        assert!(statements[1].terminated);
        assert_eq!(statements[1].offset, content.find("#2").unwrap());
    }

    #[test]
    fn test_statement_keyword() {
        let mut scanner = StatementScanner::new("HEADER;\nENDSEC;\n#1=X();");
        assert_eq!(scanner.next().unwrap().keyword(), Some("HEADER"));
        assert_eq!(scanner.next().unwrap().keyword(), Some("ENDSEC"));
        assert_eq!(scanner.next().unwrap().keyword(), None);
    }
}
