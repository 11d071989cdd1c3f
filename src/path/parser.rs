use super::Path;
use std::error::Error;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
    pub input: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f,
               "invalid path {:?} at offset {}: {}",
               self.input,
               self.offset,
               self.message)
    }
}

impl Error for ParseError {}

/// Parses a slash-delimited path.
pub fn parse_path(txt: &str) -> Result<Path, ParseError> {
    let mut elems = Vec::new();

    let mut is_first = true;
    let mut cur_elem = String::new();
    for (i, c) in txt.char_indices() {
        if c == '/' {
            if is_first {
                is_first = false;
            } else if cur_elem.is_empty() {
                return Err(error("Empty path element", i, txt));
            } else {
                elems.push(cur_elem);
                cur_elem = String::new();
            }
        } else if is_first {
            return Err(error("Path must begin with '/'", i, txt));
        } else if !is_valid(c) {
            return Err(error(format!("Invalid character: {:?}", c), i, txt));
        } else {
            cur_elem.push(c);
        }
    }

    if is_first {
        return Err(error("Empty string", 0, txt));
    }

    // If cur_elem is empty, the path ended in a slash.
    if !cur_elem.is_empty() {
        elems.push(cur_elem);
    }

    Ok(Path::new(elems))
}

fn error<M: Into<String>>(message: M, offset: usize, input: &str) -> ParseError {
    ParseError {
        message: message.into(),
        offset,
        input: input.into(),
    }
}

fn is_valid(c: char) -> bool {
    match c {
        '-' | '_' | '\\' | ':' | '#' | '%' | '$' | '.' => true,
        _ => c.is_ascii_alphanumeric(),
    }
}

#[test]
fn test_parse_path_empty() {
    assert!(parse_path("/").unwrap().is_empty());
}

#[test]
fn test_parse_path_ok() {
    let strs = ["/svc/default", "/svc/default/"];
    for s in &strs {
        let path = parse_path(s).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.elems()[0], "svc");
        assert_eq!(path.elems()[1], "default");
        assert_eq!(path.to_string(), "/svc/default");
    }
}

#[test]
fn test_parse_path_whitespace_err() {
    let err = parse_path("/red bone").unwrap_err();
    assert_eq!(err.offset, 4);

    let err = parse_path(" /redbone").unwrap_err();
    assert_eq!(err.offset, 0);

    let err = parse_path("/redbone/ ").unwrap_err();
    assert_eq!(err.offset, 9);
}

#[test]
fn test_parse_path_empty_elem_err() {
    let err = parse_path("/svc//default").unwrap_err();
    assert_eq!(err.offset, 5);
    assert!(parse_path("").is_err());
}
