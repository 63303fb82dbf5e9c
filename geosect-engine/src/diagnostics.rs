use std::fmt;

/// 汇总报告中每类诊断最多列出的标识数量。
pub const SUMMARY_SAMPLE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticKind {
    InvalidCoordinate,
    MalformedShape,
    /// 结构合法但结果为空，属于正常终态而非错误。
    EmptySelection,
}

impl DiagnosticKind {
    pub const ALL: [DiagnosticKind; 3] = [
        DiagnosticKind::InvalidCoordinate,
        DiagnosticKind::MalformedShape,
        DiagnosticKind::EmptySelection,
    ];

    pub fn is_informational(self) -> bool {
        matches!(self, DiagnosticKind::EmptySelection)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::InvalidCoordinate => "invalid coordinate",
            DiagnosticKind::MalformedShape => "malformed shape",
            DiagnosticKind::EmptySelection => "empty selection",
        };
        f.write_str(name)
    }
}

/// 单条诊断：类别、涉及的对象（通常为钻孔 ID）与说明。
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub subject: Option<String>,
    pub message: String,
}

/// 随结果一起返回的诊断集合。逐项累积，按类别汇总为“数量 + 前几个 ID”。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticReport {
    entries: Vec<Diagnostic>,
}

impl DiagnosticReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        kind: DiagnosticKind,
        subject: Option<&str>,
        message: impl Into<String>,
    ) {
        self.entries.push(Diagnostic {
            kind,
            subject: subject.map(str::to_string),
            message: message.into(),
        });
    }

    pub fn merge(&mut self, other: DiagnosticReport) {
        self.entries.extend(other.entries);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|entry| entry.kind == kind).count()
    }

    #[inline]
    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.entries.iter().any(|entry| entry.kind == kind)
    }

    /// 是否存在需要用户处理的诊断（空选区之类的提示不算）。
    pub fn has_problems(&self) -> bool {
        self.entries.iter().any(|entry| !entry.kind.is_informational())
    }

    /// 某类诊断涉及的前 `limit` 个对象。
    pub fn subjects(&self, kind: DiagnosticKind, limit: usize) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .filter_map(|entry| entry.subject.as_deref())
            .take(limit)
            .collect()
    }

    /// 每类一行的汇总文本，例如 `invalid coordinate: 7 (BH1, BH2, BH3, BH4, BH5, ...)`。
    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for kind in DiagnosticKind::ALL {
            let count = self.count(kind);
            if count == 0 {
                continue;
            }
            let subjects = self.subjects(kind, SUMMARY_SAMPLE);
            if subjects.is_empty() {
                let first = self
                    .entries
                    .iter()
                    .find(|entry| entry.kind == kind)
                    .map(|entry| entry.message.as_str())
                    .unwrap_or_default();
                lines.push(format!("{kind}: {count} ({first})"));
            } else {
                let more = if count > subjects.len() { ", ..." } else { "" };
                lines.push(format!("{kind}: {count} ({}{more})", subjects.join(", ")));
            }
        }
        lines
    }
}
