//! Statement scanner for the STEP data section.
//!
//! Splits the section into `;`-terminated statements while skipping
//! `/* */` comments and ignoring `;` inside single-quoted strings. A
//! trailing fragment without a terminator is dropped.

use memchr::{memchr, memchr3, memmem};

/// Iterator over the statements of a data section.
#[derive(Debug, Clone)]
pub struct Statements<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Iterate the statements of `data`.
pub fn statements(data: &[u8]) -> Statements<'_> {
    Statements { data, pos: 0 }
}

impl Iterator for Statements<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let mut statement = Vec::new();
        let mut segment_start = self.pos;
        let mut in_string = false;

        loop {
            let rest = self.data.get(self.pos..).unwrap_or_default();
            let hit = if in_string {
                memchr(b'\'', rest)
            } else {
                memchr3(b';', b'\'', b'/', rest)
            };
            let Some(offset) = hit else {
                self.pos = self.data.len();
                return None;
            };

            let at = self.pos + offset;
            match self.data[at] {
                // Doubled quotes ('') toggle twice and stay inside the string.
                b'\'' => {
                    in_string = !in_string;
                    self.pos = at + 1;
                }
                b';' => {
                    statement.extend_from_slice(&self.data[segment_start..at]);
                    self.pos = at + 1;
                    return Some(String::from_utf8_lossy(&statement).into_owned());
                }
                b'/' if self.data.get(at + 1) == Some(&b'*') => {
                    statement.extend_from_slice(&self.data[segment_start..at]);
                    statement.push(b' ');
                    let body = &self.data[at + 2..];
                    let Some(end) = memmem::find(body, b"*/") else {
                        self.pos = self.data.len();
                        return None;
                    };
                    self.pos = at + 2 + end + 2;
                    segment_start = self.pos;
                }
                _ => self.pos = at + 1,
            }
        }
    }
}

/// Entity type names declared by an instance statement, or `None` when
/// the statement is not of the form `#<int> = TYPE(...)` or
/// `#<int> = (A(...) B(...))`. Names are uppercased.
pub fn instance_types(statement: &str) -> Option<Vec<String>> {
    let s = statement.trim_start();
    let s = s.strip_prefix('#')?;
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let s = s[digits..].trim_start().strip_prefix('=')?.trim_start();

    if let Some(complex) = s.strip_prefix('(') {
        return complex_types(complex);
    }

    let (name, rest) = split_keyword(s)?;
    rest.trim_start().starts_with('(').then(|| vec![name])
}

/// Constituent names of a complex instance body, after its opening `(`.
fn complex_types(mut s: &str) -> Option<Vec<String>> {
    let mut names = Vec::new();
    loop {
        s = s.trim_start();
        if s.starts_with(')') {
            break;
        }
        let (name, rest) = split_keyword(s)?;
        let rest = rest.trim_start().strip_prefix('(')?;
        let close = matching_paren(rest)?;
        names.push(name);
        s = &rest[close + 1..];
    }
    (!names.is_empty()).then_some(names)
}

/// Split a leading `[A-Za-z][A-Za-z0-9_]*` keyword off `s`.
fn split_keyword(s: &str) -> Option<(String, &str)> {
    if !s.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let len = s
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    Some((s[..len].to_ascii_uppercase(), &s[len..]))
}

/// Offset of the `)` closing a group whose `(` was just consumed.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'\'' => in_string = !in_string,
            b'(' if !in_string => depth += 1,
            b')' if !in_string => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_respect_strings_and_comments() {
        let data = b"#1=A('x;y'); /* #2=B(); */ #3=C('it''s;');\n#4=D(";
        let stmts: Vec<String> = statements(data).collect();
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("'x;y'"));
        assert!(stmts[1].contains("#3=C"));
        assert!(!stmts[1].contains("#2"));
    }

    #[test]
    fn test_multiline_statement() {
        let data = b"#10 =\n  MANIFOLD_SOLID_BREP\n  ('S', #40)\n;";
        let stmts: Vec<String> = statements(data).collect();
        assert_eq!(stmts.len(), 1);
        assert_eq!(
            instance_types(&stmts[0]),
            Some(vec!["MANIFOLD_SOLID_BREP".to_string()])
        );
    }

    #[test]
    fn test_simple_instance() {
        assert_eq!(
            instance_types("#12 = PLANE('',#60)"),
            Some(vec!["PLANE".to_string()])
        );
    }

    #[test]
    fn test_non_instances() {
        assert_eq!(instance_types("ENDSEC"), None);
        assert_eq!(instance_types("#=PLANE()"), None);
        assert_eq!(instance_types("#5=#6"), None);
        assert_eq!(instance_types("#5=PLANE"), None);
    }

    #[test]
    fn test_complex_instance() {
        let stmt = "#7=( BOUNDED_SURFACE() B_SPLINE_SURFACE(1,1,((#1,#2)),.UNSPECIFIED.,.F.,.F.,.F.) \
                    SURFACE() )";
        assert_eq!(
            instance_types(stmt),
            Some(vec![
                "BOUNDED_SURFACE".to_string(),
                "B_SPLINE_SURFACE".to_string(),
                "SURFACE".to_string(),
            ])
        );
    }

    #[test]
    fn test_unterminated_comment_ends_scan() {
        let stmts: Vec<String> = statements(b"#1=A(); /* open").collect();
        assert_eq!(stmts.len(), 1);
    }
}
