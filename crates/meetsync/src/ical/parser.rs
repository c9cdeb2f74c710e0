use std::collections::BTreeMap;

pub const ROOT_BLOCK: &str = "VCALENDAR";

const BEGIN: &str = "BEGIN:";
const END: &str = "END:";

/// Properties regenerated on every export request. Dropping them keeps
/// re-scrapes of an unchanged event from producing a diff.
const VOLATILE_PREFIXES: &[&str] = &["DTSTAMP:"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed calendar at line {line}: {kind}")]
pub struct MalformedBlockError {
    pub line: usize,
    pub kind: MalformedKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedKind {
    #[error("input contains no {ROOT_BLOCK} block")]
    EmptyInput,
    #[error("expected BEGIN:{ROOT_BLOCK}, found {0:?}")]
    ExpectedRoot(String),
    #[error("END:{found} does not close BEGIN:{expected}")]
    MismatchedEnd { expected: String, found: String },
    #[error("BEGIN:{0} is never closed")]
    UnclosedBlock(String),
    #[error("duplicate key {0}")]
    DuplicateKey(String),
    #[error("duplicate block {0}")]
    DuplicateBlock(String),
    #[error("continuation line without a preceding key")]
    OrphanContinuation,
    #[error("expected KEY:VALUE, found {0:?}")]
    MissingColon(String),
    #[error("content after END:{ROOT_BLOCK}")]
    TrailingContent,
}

/// A node of the block tree: either a property value or a nested block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Value(String),
    Block(Block),
}

/// A named block. Property keys and child block names share one namespace
/// and are unique within the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    name: String,
    entries: BTreeMap<String, Node>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.get(key)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(Node::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn child(&self, name: &str) -> Option<&Block> {
        match self.entries.get(name) {
            Some(Node::Block(block)) => Some(block),
            _ => None,
        }
    }

    /// Property key/value pairs in key order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(key, node)| match node {
            Node::Value(value) => Some((key.as_str(), value.as_str())),
            Node::Block(_) => None,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = &Block> {
        self.entries.values().filter_map(|node| match node {
            Node::Block(block) => Some(block),
            Node::Value(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert_value(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), MalformedKind> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(MalformedKind::DuplicateKey(key));
        }
        self.entries.insert(key, Node::Value(value.into()));
        Ok(())
    }

    pub fn insert_block(&mut self, block: Block) -> Result<(), MalformedKind> {
        if self.entries.contains_key(&block.name) {
            return Err(MalformedKind::DuplicateBlock(block.name));
        }
        self.entries.insert(block.name.clone(), Node::Block(block));
        Ok(())
    }

    fn append(&mut self, key: &str, fragment: &str) -> Result<(), MalformedKind> {
        match self.entries.get_mut(key) {
            Some(Node::Value(value)) => {
                value.push_str(fragment);
                Ok(())
            }
            _ => Err(MalformedKind::OrphanContinuation),
        }
    }
}

struct Frame {
    block: Block,
    begin_line: usize,
    last_key: Option<String>,
}

impl Frame {
    fn open(name: &str, begin_line: usize) -> Self {
        Self {
            block: Block::new(name),
            begin_line,
            last_key: None,
        }
    }
}

pub fn unescape(value: &str) -> String {
    value.replace(r"\,", ",").replace(r"\n", "\n")
}

fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().map(|(i, line)| (i + 1, line))
}

/// Parses every line of `text` into the root block.
pub fn parse_calendar(text: &str) -> Result<Block, MalformedBlockError> {
    parse_lines(numbered_lines(text))
}

/// Parses a calendar export fetched from the provider, dropping volatile
/// properties (and their continuation lines) first. Line numbers in errors
/// still refer to the unfiltered input.
pub fn parse_export(text: &str) -> Result<Block, MalformedBlockError> {
    let mut dropping = false;
    let lines = numbered_lines(text).filter(move |(_, line)| {
        if line.starts_with(' ') {
            return !dropping;
        }
        dropping = VOLATILE_PREFIXES
            .iter()
            .any(|prefix| line.starts_with(prefix));
        !dropping
    });
    parse_lines(lines)
}

/// Parses numbered `BEGIN:`/`END:`/`KEY:VALUE` lines. A line starting with a
/// single space continues the value last assigned in the same block.
pub fn parse_lines<'a>(
    lines: impl IntoIterator<Item = (usize, &'a str)>,
) -> Result<Block, MalformedBlockError> {
    let at = |line: usize| move |kind: MalformedKind| MalformedBlockError { line, kind };

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Block> = None;
    let mut last_line = 0;

    for (number, line) in lines {
        last_line = number;

        if let Some(name) = line.strip_prefix(END) {
            let Some(frame) = stack.pop() else {
                let kind = match root {
                    Some(_) => MalformedKind::TrailingContent,
                    None => MalformedKind::ExpectedRoot(line.to_string()),
                };
                return Err(at(number)(kind));
            };
            if frame.block.name != name {
                return Err(at(number)(MalformedKind::MismatchedEnd {
                    expected: frame.block.name,
                    found: name.to_string(),
                }));
            }
            match stack.last_mut() {
                Some(parent) => parent
                    .block
                    .insert_block(frame.block)
                    .map_err(at(frame.begin_line))?,
                None => root = Some(frame.block),
            }
            continue;
        }

        if stack.is_empty() {
            if line.trim().is_empty() {
                continue;
            }
            if root.is_some() {
                return Err(at(number)(MalformedKind::TrailingContent));
            }
            if line.strip_prefix(BEGIN) != Some(ROOT_BLOCK) {
                return Err(at(number)(MalformedKind::ExpectedRoot(line.to_string())));
            }
            stack.push(Frame::open(ROOT_BLOCK, number));
            continue;
        }

        if let Some(name) = line.strip_prefix(BEGIN) {
            stack.push(Frame::open(name, number));
            continue;
        }

        let Some(frame) = stack.last_mut() else {
            return Err(at(number)(MalformedKind::TrailingContent));
        };

        if let Some(fragment) = line.strip_prefix(' ') {
            let key = frame
                .last_key
                .as_deref()
                .ok_or(MalformedKind::OrphanContinuation)
                .map_err(at(number))?;
            frame
                .block
                .append(key, &unescape(fragment))
                .map_err(at(number))?;
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| MalformedKind::MissingColon(line.to_string()))
            .map_err(at(number))?;
        frame
            .block
            .insert_value(key, unescape(value))
            .map_err(at(number))?;
        frame.last_key = Some(key.to_string());
    }

    if let Some(frame) = stack.pop() {
        return Err(at(frame.begin_line)(MalformedKind::UnclosedBlock(
            frame.block.name,
        )));
    }

    root.ok_or(MalformedBlockError {
        line: last_line + 1,
        kind: MalformedKind::EmptyInput,
    })
}
