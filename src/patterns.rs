/// Generalizes a filename into a wildcard pattern, given every filename
/// currently known to the store.
///
/// Implementations must be deterministic for a fixed corpus and must give the
/// same answer whether or not `filename` itself appears in `corpus`.
pub trait PatternEngine {
    fn compute(&self, filename: &str, corpus: &[String]) -> Option<String>;
}

impl<F> PatternEngine for F
where
    F: Fn(&str, &[String]) -> Option<String>,
{
    fn compute(&self, filename: &str, corpus: &[String]) -> Option<String> {
        self(filename, corpus)
    }
}

/// Extracts the local part of an email address encoded in a filename
/// (e.g. `john.doe_invoice.pdf` → `john.doe`). Supplied by the caller.
pub trait LocalpartParser {
    fn localpart(&self, filename: &str) -> Option<String>;
}

/// Reference engine: every run of ASCII digits becomes `*`.
///
/// A pattern is only produced when at least one *other* corpus entry
/// generalizes to the same pattern, so a lone filename never matches and is
/// left for a later refresh once siblings show up.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigitRunEngine;

impl DigitRunEngine {
    pub fn generalize(filename: &str) -> Option<String> {
        let mut pattern = String::with_capacity(filename.len());
        let mut in_digits = false;
        let mut replaced = false;

        for c in filename.chars() {
            if c.is_ascii_digit() {
                if !in_digits {
                    pattern.push('*');
                    in_digits = true;
                    replaced = true;
                }
            } else {
                pattern.push(c);
                in_digits = false;
            }
        }

        // A pattern made of nothing but wildcards matches everything
        if !replaced || pattern.chars().all(|c| c == '*') {
            return None;
        }
        Some(pattern)
    }
}

impl PatternEngine for DigitRunEngine {
    fn compute(&self, filename: &str, corpus: &[String]) -> Option<String> {
        let pattern = Self::generalize(filename)?;

        corpus
            .iter()
            .filter(|other| other.as_str() != filename)
            .any(|other| Self::generalize(other).as_deref() == Some(pattern.as_str()))
            .then_some(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn corpus(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_generalize_collapses_digit_runs() {
        assert_eq!(
            DigitRunEngine::generalize("invoice123.pdf.exe").as_deref(),
            Some("invoice*.pdf.exe")
        );
        assert_eq!(
            DigitRunEngine::generalize("scan_2024_07_01.zip").as_deref(),
            Some("scan_*_*_*.zip")
        );
        assert_eq!(DigitRunEngine::generalize("report.pdf"), None);
        assert_eq!(DigitRunEngine::generalize("12345"), None);
    }

    #[test]
    fn test_compute_needs_a_sibling() {
        let engine = DigitRunEngine;
        assert_eq!(
            engine.compute("invoice123.pdf.exe", &corpus(&["invoice123.pdf.exe"])),
            None
        );
        assert_eq!(
            engine
                .compute(
                    "invoice123.pdf.exe",
                    &corpus(&["invoice123.pdf.exe", "invoice456.pdf.exe"])
                )
                .as_deref(),
            Some("invoice*.pdf.exe")
        );
    }

    #[test]
    fn test_compute_ignores_self_inclusion() {
        let engine = DigitRunEngine;
        let without = corpus(&["invoice456.pdf.exe"]);
        let with = corpus(&["invoice123.pdf.exe", "invoice456.pdf.exe"]);
        assert_eq!(
            engine.compute("invoice123.pdf.exe", &without),
            engine.compute("invoice123.pdf.exe", &with)
        );
    }

    #[test]
    fn test_closure_engine() {
        let engine = |name: &str, _: &[String]| Some(name.to_uppercase());
        assert_eq!(engine.compute("a.exe", &[]).as_deref(), Some("A.EXE"));
    }
}
