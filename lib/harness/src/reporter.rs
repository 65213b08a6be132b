use std::io::{self, Write};
use std::time::Duration;

/// The default width of a report line.
pub const DEFAULT_WIDTH: usize = 55;

/// Where the label of a report line is placed within the padded area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// The label is followed by the padding.
    Left,
    /// The padding is followed by the label.
    Right,
    /// The padding is split around the label. The right side gets the extra character.
    Center,
}

/// The terminator appended to each report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// The line terminator of the platform.
    Native,
    /// An HTML line break, for reports served over HTTP.
    Html,
}

impl LineEnding {
    /// Returns the terminator.
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Native if cfg!(windows) => "\r\n",
            LineEnding::Native => "\n",
            LineEnding::Html => "<br/>",
        }
    }
}

/// Formats a duration as seconds with four decimal places, e.g. `1.2345 s`.
pub fn format_seconds(duration: Duration) -> String {
    format!("{:.4} s", duration.as_secs_f64())
}

/// Renders a single report line without terminator.
///
/// The `label` is padded with `pad` such that the line, including the `trailer` and the space
/// separating it from the label, is `width` characters wide. A label that does not fit is not
/// truncated, the padding just shrinks to zero.
pub fn format_line(
    label: &str,
    trailer: &str,
    pad: char,
    alignment: Alignment,
    width: usize,
) -> String {
    let trailer = if trailer.is_empty() {
        String::new()
    } else {
        format!(" {trailer}")
    };
    let padded_len = width.saturating_sub(trailer.chars().count());
    let missing = padded_len.saturating_sub(label.chars().count());
    let (left, right) = match alignment {
        Alignment::Left => (0, missing),
        Alignment::Right => (missing, 0),
        Alignment::Center => (missing / 2, missing - missing / 2),
    };

    let mut line = String::with_capacity(left + label.len() + right + trailer.len());
    line.extend(std::iter::repeat(pad).take(left));
    line.push_str(label);
    line.extend(std::iter::repeat(pad).take(right));
    line.push_str(&trailer);
    line
}

/// Writes aligned report lines to an output sink.
#[derive(Debug)]
pub struct Reporter<W: Write> {
    /// The sink.
    out: W,
    /// The width of a line.
    width: usize,
    /// The line terminator.
    line_ending: LineEnding,
}

impl<W: Write> Reporter<W> {
    /// Creates a new [Reporter] with the given line `width` and native line endings.
    ///
    /// A width of zero is treated as one.
    pub fn new(out: W, width: usize) -> Self {
        Self {
            out,
            width: width.max(1),
            line_ending: LineEnding::Native,
        }
    }

    /// Changes the line terminator.
    #[must_use]
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Writes a padded line. See [format_line].
    pub fn line(
        &mut self,
        label: &str,
        trailer: &str,
        pad: char,
        alignment: Alignment,
    ) -> io::Result<()> {
        let line = format_line(label, trailer, pad, alignment, self.width);
        write!(self.out, "{line}{}", self.line_ending.as_str())
    }

    /// Writes a `label....... value` line.
    pub fn key_value(&mut self, label: &str, value: &str) -> io::Result<()> {
        self.line(label, value, '.', Alignment::Left)
    }

    /// Writes a line of dashes.
    pub fn separator(&mut self) -> io::Result<()> {
        self.line("", "", '-', Alignment::Left)
    }

    /// Writes a centered heading surrounded by dashes.
    pub fn title(&mut self, text: &str) -> io::Result<()> {
        self.line(&format!(" {text} "), "", '-', Alignment::Center)
    }

    /// Writes a centered line padded with spaces.
    pub fn banner(&mut self, text: &str) -> io::Result<()> {
        self.line(text, "", ' ', Alignment::Center)
    }

    /// Writes the closing summary of a run.
    pub fn totals(&mut self, total: Duration, peak_memory_mib: Option<f64>) -> io::Result<()> {
        let peak_memory = peak_memory_mib
            .map_or_else(|| "unavailable".to_owned(), |mib| format!("{mib:.2} MiB"));

        self.separator()?;
        self.key_value("Total time", &format_seconds(total))?;
        self.key_value("Peak memory usage", &peak_memory)
    }

    /// Writes `text` verbatim, without padding or terminator.
    pub fn raw(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())
    }

    /// Flushes the sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Returns the sink.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn render(width: usize, write: impl FnOnce(&mut Reporter<Vec<u8>>) -> io::Result<()>) -> String {
        let mut reporter = Reporter::new(Vec::new(), width);
        write(&mut reporter).unwrap();
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn empty_trailer_adds_no_space() {
        let line = format_line("X", "", '.', Alignment::Left, 55);
        assert_eq!(line, format!("X{}", ".".repeat(54)));
        assert_eq!(line.chars().count(), 55);
    }

    #[test]
    fn center_gives_the_extra_character_to_the_right() {
        assert_eq!(format_line("ab", "", '*', Alignment::Center, 7), "**ab***");
        assert_eq!(format_line("ab", "", '*', Alignment::Center, 6), "**ab**");
    }

    #[test]
    fn right_alignment_pads_before_the_label() {
        assert_eq!(format_line("ab", "1", ' ', Alignment::Right, 6), "  ab 1");
    }

    #[test]
    fn long_trailer_clamps_padding_to_zero() {
        let line = format_line("label", "a trailer that does not fit", '.', Alignment::Left, 10);
        assert_eq!(line, "label a trailer that does not fit");
        assert!(line.len() >= "a trailer that does not fit".len());
    }

    #[test]
    fn padding_counts_characters_not_bytes() {
        let line = format_line("\u{e9}t\u{e9}", "", '.', Alignment::Left, 5);
        assert_eq!(line, "\u{e9}t\u{e9}..");
    }

    #[test]
    fn html_line_ending() {
        let mut reporter = Reporter::new(Vec::new(), 3).with_line_ending(LineEnding::Html);
        reporter.separator().unwrap();
        assert_eq!(reporter.into_inner(), b"---<br/>");
    }

    #[test]
    fn zero_width_is_treated_as_one() {
        assert_eq!(render(0, Reporter::separator), format!("-{}", LineEnding::Native.as_str()));
    }

    #[test]
    fn report_layout() {
        let output = render(30, |reporter| {
            reporter.separator()?;
            reporter.title("Info")?;
            reporter.key_value("Platform", "linux x86_64")?;
            reporter.key_value("core::math", &format_seconds(Duration::from_micros(123_400)))?;
            reporter.line("Right", "", '.', Alignment::Right)?;
            reporter.totals(Duration::from_millis(1875), Some(12.5))
        });

        assert_snapshot!(output.trim_end(), @r"
        ------------------------------
        ------------ Info ------------
        Platform......... linux x86_64
        core::math........... 0.1234 s
        .........................Right
        ------------------------------
        Total time........... 1.8750 s
        Peak memory usage... 12.50 MiB
        ");
    }

    #[test]
    fn totals_without_peak_memory() {
        let output = render(40, |reporter| reporter.totals(Duration::ZERO, None));
        let expected = format_line("Peak memory usage", "unavailable", '.', Alignment::Left, 40);
        assert!(output.contains(&expected));
    }
}
