use std::fmt;
use std::str::FromStr;

mod parser;

pub use self::parser::ParseError;

/// A slash-delimited logical name, e.g. `/svc/default`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialOrd, PartialEq)]
pub struct Path(Vec<String>);

impl Path {
    pub fn new(elems: Vec<String>) -> Path {
        Path(elems)
    }

    pub fn elems(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for e in &self.0 {
            write!(f, "/{}", e)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = ParseError;

    fn from_str(txt: &str) -> Result<Path, ParseError> {
        parser::parse_path(txt)
    }
}
