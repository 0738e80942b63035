/// Kind of a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Info,
    Success,
    Warning,
    Error,
}

/// One progress line of a work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub kind: LineKind,
    pub text: String,
}

/// Progress lines of a single work item.
///
/// Lines are buffered while the item runs and handed to the observer in one
/// piece when it resolves, so output of concurrent items never interleaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemLog {
    lines: Vec<LogLine>,
}

impl ItemLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: LineKind, text: impl Into<String>) {
        self.lines.push(LogLine {
            kind,
            text: text.into(),
        });
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(LineKind::Info, text);
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.push(LineKind::Success, text);
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        self.push(LineKind::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(LineKind::Error, text);
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
