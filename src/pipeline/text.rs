//! Line cleaning and ordered line scanning shared by the page parsers.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b20\d{2}\b").unwrap());
static CLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}$").unwrap());

/// Collapses whitespace runs to one space and trims the ends.
pub fn clean_line(s: &str) -> String {
    WHITESPACE_RUN.replace_all(s.trim(), " ").into_owned()
}

/// Splits on line breaks, cleaning each piece and dropping empty ones.
pub fn split_clean_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines().map(clean_line).filter(|l| !l.is_empty())
}

pub fn has_year(line: &str) -> bool {
    YEAR.is_match(line)
}

/// `H:MM` or `HH:MM` and nothing else.
pub fn is_clock_time(line: &str) -> bool {
    CLOCK.is_match(line.trim())
}

/// Absolute links pass through; bare paths get `authority` prefixed.
pub fn absolute_link(authority: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!(
            "{}/{}",
            authority.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

/// Lowercase, ASCII-alphanumeric runs joined by `-`.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars().flat_map(|c| c.to_lowercase()) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            out.push(c);
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Ordered scan over a window of lines.
///
/// The "first line matching X after the line matching Y" lookups in listing
/// blocks, detail sections and table headers all go through this.
#[derive(Debug, Clone, Copy)]
pub struct LineScan<'a, S: AsRef<str>> {
    lines: &'a [S],
}

impl<'a, S: AsRef<str>> LineScan<'a, S> {
    pub fn new(lines: &'a [S]) -> Self {
        Self { lines }
    }

    /// Narrows to the lines after the first one matching `marker`.
    /// The window is unchanged when nothing matches.
    pub fn after_first<P>(self, marker: P) -> Self
    where
        P: Fn(&str) -> bool,
    {
        match self.position(marker) {
            Some(idx) => Self {
                lines: &self.lines[idx + 1..],
            },
            None => self,
        }
    }

    pub fn position<P>(&self, pred: P) -> Option<usize>
    where
        P: Fn(&str) -> bool,
    {
        self.lines.iter().position(|l| pred(l.as_ref()))
    }

    pub fn first<P>(&self, pred: P) -> Option<&'a str>
    where
        P: Fn(&str) -> bool,
    {
        let lines: &'a [S] = self.lines;
        lines.iter().map(|l| l.as_ref()).find(|l| pred(l))
    }
}
