use std::sync::LazyLock;

use regex::Regex;

static TABLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\|[-:\s|]+\|$").expect("table separator pattern"));
static HEADING: LazyLock<[(u8, Regex); 3]> = LazyLock::new(|| {
    [
        (1, Regex::new(r"^#\s").expect("h1 pattern")),
        (2, Regex::new(r"^##\s").expect("h2 pattern")),
        (3, Regex::new(r"^###\s").expect("h3 pattern")),
    ]
});
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*]\s").expect("bullet pattern"));
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.\s").expect("numbered item pattern"));
static INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*.*?\*\*|\*.*?\*|`.*?`").expect("inline span pattern"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            bold: true,
            ..Self::plain(text)
        }
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            italic: true,
            ..Self::plain(text)
        }
    }

    pub fn monospace(text: impl Into<String>) -> Self {
        Self {
            monospace: true,
            ..Self::plain(text)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCell {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub header: bool,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    Paragraph(Vec<Span>),
    BulletItem(Vec<Span>),
    NumberedItem(Vec<Span>),
    Table(Vec<TableRow>),
}

impl Block {
    pub fn plain_text(&self) -> String {
        match self {
            Block::Heading { spans, .. }
            | Block::Paragraph(spans)
            | Block::BulletItem(spans)
            | Block::NumberedItem(spans) => spans_text(spans),
            Block::Table(rows) => rows
                .iter()
                .map(|row| {
                    row.cells
                        .iter()
                        .map(|cell| {
                            cell.blocks
                                .iter()
                                .map(Block::plain_text)
                                .collect::<String>()
                        })
                        .collect::<Vec<_>>()
                        .join(" | ")
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

fn spans_text(spans: &[Span]) -> String {
    spans.iter().map(|span| span.text.as_str()).collect()
}

/// Anything unrecognised becomes a paragraph.
pub fn render(markdown: &str) -> Document {
    let lines: Vec<&str> = markdown.lines().map(str::trim).collect();
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while cursor < lines.len() {
        let line = lines[cursor];

        if line.is_empty() {
            cursor += 1;
            continue;
        }

        if line.starts_with('|') {
            let (rows, next) = parse_table(&lines, cursor);
            if !rows.is_empty() {
                blocks.push(Block::Table(rows));
            }
            cursor = next.max(cursor + 1);
            continue;
        }

        blocks.push(render_line(line));
        cursor += 1;
    }

    Document { blocks }
}

fn render_line(line: &str) -> Block {
    for (level, pattern) in HEADING.iter() {
        if let Some(marker) = pattern.find(line) {
            return Block::Heading {
                level: *level,
                spans: spans(&line[marker.end()..]),
            };
        }
    }
    if let Some(marker) = BULLET.find(line) {
        return Block::BulletItem(spans(&line[marker.end()..]));
    }
    if let Some(marker) = NUMBERED.find(line) {
        return Block::NumberedItem(spans(&line[marker.end()..]));
    }
    Block::Paragraph(spans(line))
}

/// Returns the rows and the index of the first line after the `|` run.
fn parse_table(lines: &[&str], start: usize) -> (Vec<TableRow>, usize) {
    let mut rows = Vec::new();
    let mut cursor = start;

    while cursor < lines.len() && lines[cursor].starts_with('|') {
        let line = lines[cursor];
        cursor += 1;

        if TABLE_SEPARATOR.is_match(line) {
            continue;
        }

        let cells = split_cells(line);
        if cells.is_empty() {
            continue;
        }

        rows.push(TableRow {
            header: rows.is_empty(),
            cells: cells
                .into_iter()
                .map(|text| TableCell {
                    blocks: vec![Block::Paragraph(spans(text))],
                })
                .collect(),
        });
    }

    (rows, cursor)
}

// Interior empty cells are kept.
fn split_cells(line: &str) -> Vec<&str> {
    let mut cells: Vec<&str> = line.split('|').map(str::trim).collect();
    while cells.first().is_some_and(|cell| cell.is_empty()) {
        cells.remove(0);
    }
    while cells.last().is_some_and(|cell| cell.is_empty()) {
        cells.pop();
    }
    cells
}

/// No nesting: `**a *b* c**` is one bold span holding `a *b* c`.
pub fn spans(text: &str) -> Vec<Span> {
    let mut out = Vec::new();
    let mut last = 0;

    for found in INLINE.find_iter(text) {
        push_token(&mut out, &text[last..found.start()]);
        push_token(&mut out, found.as_str());
        last = found.end();
    }
    push_token(&mut out, &text[last..]);

    out
}

fn push_token(out: &mut Vec<Span>, token: &str) {
    if token.is_empty() {
        return;
    }

    let span = if token.len() >= 4 && token.starts_with("**") && token.ends_with("**") {
        Span::bold(&token[2..token.len() - 2])
    } else if token.len() >= 2 && token.starts_with('*') && token.ends_with('*') {
        Span::italic(&token[1..token.len() - 1])
    } else if token.len() >= 2 && token.starts_with('`') && token.ends_with('`') {
        Span::monospace(&token[1..token.len() - 1])
    } else {
        Span::plain(token)
    };

    if !span.text.is_empty() {
        out.push(span);
    }
}
