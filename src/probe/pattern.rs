//! Matching of probe reports in device output

/// Expected shape of a response line: an anchor followed by three labelled
/// numbers, e.g. `Bed X: 10.000 Y: 20.000 Z: 0.125`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePattern {
    anchor: String,
    labels: [String; 3],
}

impl ResponsePattern {
    pub fn new(anchor: &str, labels: [&str; 3]) -> Self {
        Self {
            anchor: anchor.to_string(),
            labels: labels.map(str::to_string),
        }
    }

    /// Report printed by the device after a `G30` single-point probe
    pub fn probe_report() -> Self {
        Self::new("Bed", ["X:", "Y:", "Z:"])
    }

    /// Extract the three numbers, `None` if the line does not match
    pub fn captures(&self, line: &str) -> Option<[f64; 3]> {
        let start = line.find(&self.anchor)? + self.anchor.len();
        let mut rest = &line[start..];
        let mut values = [0.0; 3];
        for (value, label) in values.iter_mut().zip(&self.labels) {
            let at = rest.find(label.as_str())? + label.len();
            let (number, tail) = leading_number(rest[at..].trim_start())?;
            *value = number;
            rest = tail;
        }
        Some(values)
    }
}

/// Parse a number made of digits, '.' and '-' at the start of `text`
fn leading_number(text: &str) -> Option<(f64, &str)> {
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(text.len());
    let value = text[..end].parse::<f64>().ok()?;
    Some((value, &text[end..]))
}
