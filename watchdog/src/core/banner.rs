//! Section banners around timeout reports

/// Separator for timeout-event banners
pub const TIMEOUT_SEP: char = '+';

/// Separator for stack and captured-output sections
pub const SECTION_SEP: char = '~';

/// Width used when the terminal size is unknown
pub const DEFAULT_WIDTH: usize = 80;

/// Renders banners padded to the terminal width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportFormatter {
    width: usize,
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter {
    /// Formatter sized to the current terminal
    pub fn new() -> Self {
        Self {
            width: terminal_width(),
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// A single banner line, without surrounding newlines
    pub fn render_line(&self, title: &str, sep: char) -> String {
        let title_len = title.chars().count();
        let fill = self.width.saturating_sub(title_len + 2) / 2;
        let bar: String = std::iter::repeat_n(sep, fill).collect();

        let mut line = format!("{bar} {title} {bar}");
        let line_len = line.chars().count();
        if line_len < self.width {
            line.extend(std::iter::repeat_n(sep, self.width - line_len));
        }
        line
    }

    /// Banner preceded and followed by a newline, ready to write
    pub fn render_title(&self, title: &str, sep: char) -> String {
        format!("\n{}\n", self.render_line(title, sep))
    }

    /// The `+` "Timeout" banner opening and closing every timeout report
    pub fn timeout_banner(&self) -> String {
        self.render_title("Timeout", TIMEOUT_SEP)
    }

    /// A `~` titled section followed by its body
    pub fn section(&self, title: &str, body: &str) -> String {
        let mut text = self.render_title(title, SECTION_SEP);
        text.push_str(body);
        text
    }
}

/// Terminal width, falling back to 80 columns
pub fn terminal_width() -> usize {
    term_size::dimensions()
        .map(|(width, _)| width)
        .filter(|width| *width > 0)
        .unwrap_or(DEFAULT_WIDTH)
}
