//! G-code tokenizer and formatter.
//!
//! A line is split into letter/value words. The first word is the command
//! (`G1`, `G28`, ...), the rest are parameters. Values keep their original
//! text so a reformatted line only differs where a parameter was changed
//! through [`GCodeLine::set`], which always writes three decimals.
//!
//! ```text
//! "g1 X10 y-2.5 ; travel"  ->  G1 { X:"10", Y:"-2.5" }
//! "G1X10Y5"                 ->  G1 { X:"10", Y:"5" }
//! "G28 Z"                   ->  G28 { Z:"" }
//! "G28XZ"                   ->  G28 { X:"", Z:"" }
//! ```

use std::fmt;

/// Precision used for every number this crate writes into a command
pub const DECIMALS: usize = 3;

/// One parameter word
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Letter as written
    pub letter: char,
    /// Value text as written (empty for flags such as `G28 Z`)
    pub raw: String,
}

impl Param {
    /// Numeric value, `None` for flags and malformed numbers
    pub fn value(&self) -> Option<f64> {
        self.raw.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    fn is(&self, letter: char) -> bool {
        self.letter.eq_ignore_ascii_case(&letter)
    }
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq)]
pub struct GCodeLine {
    letter: char,
    number: String,
    params: Vec<Param>,
}

/// Split a comment-free line into (letter, value) words
fn words(line: &str) -> Vec<Param> {
    let mut out = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        // Parameter values are numeric, so any letter after the command word
        // starts the next word ("G28XZ"); the command itself splits after its
        // number ("G1X10")
        let is_command = out.is_empty();
        let mut raw = String::new();
        while let Some(&next) = chars.peek() {
            let next_word = next.is_ascii_alphabetic()
                && (!is_command || raw.chars().any(|c| c.is_ascii_digit()));
            if next.is_whitespace() || next_word {
                break;
            }
            raw.push(next);
            chars.next();
        }
        out.push(Param { letter: c, raw });
    }
    out
}

impl GCodeLine {
    /// Parse a line, `None` when it holds no command
    pub fn parse(line: &str) -> Option<Self> {
        let code = strip_comment(line);
        let mut words = words(code).into_iter();
        let command = words.next()?;
        if !command.letter.is_ascii_alphabetic() {
            return None;
        }
        Some(Self {
            letter: command.letter.to_ascii_uppercase(),
            number: command.raw,
            params: words.collect(),
        })
    }

    /// Build a command from scratch
    pub fn new(command: &str) -> Self {
        let mut chars = command.chars();
        let letter = chars.next().unwrap_or('G').to_ascii_uppercase();
        Self {
            letter,
            number: chars.collect(),
            params: Vec::new(),
        }
    }

    /// Command is `letter` followed by `number` (`G01` matches G 1)
    pub fn is(&self, letter: char, number: u32) -> bool {
        self.letter == letter && self.number.parse::<u32>().ok() == Some(number)
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Parameter is present (with or without a value)
    pub fn has(&self, letter: char) -> bool {
        self.params.iter().any(|p| p.is(letter))
    }

    /// Numeric value of the first `letter` parameter
    pub fn get(&self, letter: char) -> Option<f64> {
        self.params.iter().find(|p| p.is(letter)).and_then(Param::value)
    }

    /// Replace the first `letter` parameter's value or append it
    pub fn set(&mut self, letter: char, value: f64) {
        let raw = format!("{:.*}", DECIMALS, value);
        match self.params.iter_mut().find(|p| p.is(letter)) {
            Some(param) => param.raw = raw,
            None => self.params.push(Param {
                letter: letter.to_ascii_uppercase(),
                raw,
            }),
        }
    }

    /// Builder form of [`set`](Self::set)
    pub fn with(mut self, letter: char, value: f64) -> Self {
        self.set(letter, value);
        self
    }
}

impl fmt::Display for GCodeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter, self.number)?;
        for param in &self.params {
            write!(f, " {}{}", param.letter, param.raw)?;
        }
        Ok(())
    }
}

/// Text before the first `;`
pub fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(index) => &line[..index],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_move() {
        let line = GCodeLine::parse("G1 X10 Y-2.5 F3000").unwrap();
        assert!(line.is('G', 1));
        assert_eq!(line.get('X'), Some(10.0));
        assert_eq!(line.get('Y'), Some(-2.5));
        assert_eq!(line.get('Z'), None);
        assert_eq!(line.to_string(), "G1 X10 Y-2.5 F3000");
    }

    #[test]
    fn test_leading_zero_and_lowercase() {
        let line = GCodeLine::parse("g01 x5 z0.2").unwrap();
        assert!(line.is('G', 1));
        assert_eq!(line.get('X'), Some(5.0));
        assert_eq!(line.get('z'), Some(0.2));
    }

    #[test]
    fn test_unspaced_words() {
        let line = GCodeLine::parse("G1X10Y5").unwrap();
        assert_eq!(line.get('X'), Some(10.0));
        assert_eq!(line.get('Y'), Some(5.0));
        assert_eq!(line.to_string(), "G1 X10 Y5");
    }

    #[test]
    fn test_comment_stripped() {
        let line = GCodeLine::parse("G0 X1 ; Z5 is not a parameter").unwrap();
        assert!(!line.has('Z'));
        assert_eq!(line.to_string(), "G0 X1");
        assert!(GCodeLine::parse("; only a comment").is_none());
        assert!(GCodeLine::parse("   ").is_none());
    }

    #[test]
    fn test_flag_parameter() {
        let line = GCodeLine::parse("G28 X Z").unwrap();
        assert!(line.is('G', 28));
        assert!(line.has('Z'));
        assert_eq!(line.get('Z'), None);
        assert!(!line.has('Y'));
    }

    #[test]
    fn test_malformed_value_reads_as_missing() {
        let line = GCodeLine::parse("G1 X1-2 Y.").unwrap();
        assert_eq!(line.get('X'), None);
        assert_eq!(line.get('Y'), None);
        assert!(line.has('X'));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut line = GCodeLine::parse("G1 Z0.3 X4 F100").unwrap();
        line.set('Z', 0.55);
        assert_eq!(line.to_string(), "G1 Z0.550 X4 F100");
    }

    #[test]
    fn test_set_appends_missing() {
        let mut line = GCodeLine::parse("G1 X50 Y50").unwrap();
        line.set('Z', 1.0 / 3.0);
        assert_eq!(line.to_string(), "G1 X50 Y50 Z0.333");
    }

    #[test]
    fn test_build_command() {
        let line = GCodeLine::new("G0").with('X', 100.0).with('Y', 12.3456);
        assert_eq!(line.to_string(), "G0 X100.000 Y12.346");
        assert_eq!(GCodeLine::new("G91").to_string(), "G91");
    }

    #[test]
    fn test_non_gcode_words_survive() {
        let line = GCodeLine::parse("M104 S200").unwrap();
        assert!(line.is('M', 104));
        assert!(!line.is('G', 104));
        assert_eq!(line.to_string(), "M104 S200");
    }

    #[test]
    fn test_unspaced_flag_parameters() {
        let line = GCodeLine::parse("G28XZ").unwrap();
        assert!(line.is('G', 28));
        assert!(line.has('X'));
        assert!(line.has('Z'));
        assert!(!line.has('Y'));
        assert_eq!(line.to_string(), "G28 X Z");

        let line = GCodeLine::parse("g28 xz").unwrap();
        assert!(line.has('Z'));

        let line = GCodeLine::parse("G1 X10Z.2").unwrap();
        assert_eq!(line.get('X'), Some(10.0));
        assert_eq!(line.get('Z'), Some(0.2));
    }
}
