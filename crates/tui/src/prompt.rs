use anyhow::{anyhow, bail, Context, Result};
use subway_core::{LineId, LineRequest, SectionAddRequest, StationId};

const MAX_INPUT_LEN: usize = 96;

/// What the open prompt collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    NewStation,
    NewLine,
    AddSection(LineId),
    RemoveStation(LineId),
}

/// Parsed prompt input, ready to hand to a service.
#[derive(Debug, Clone)]
pub enum Command {
    CreateStation(String),
    CreateLine(LineRequest),
    AddSection(LineId, SectionAddRequest),
    RemoveStation(LineId, StationId),
}

/// Single-line text input shown as a modal.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: String,
    /// Cursor position in characters.
    pub cursor: usize,
}

impl Prompt {
    pub fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            input: String::new(),
            cursor: 0,
        }
    }

    pub fn title(&self) -> String {
        match self.kind {
            PromptKind::NewStation => "New Station".to_string(),
            PromptKind::NewLine => "New Line".to_string(),
            PromptKind::AddSection(line_id) => format!("Add Section - Line #{line_id}"),
            PromptKind::RemoveStation(line_id) => format!("Remove Station - Line #{line_id}"),
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self.kind {
            PromptKind::NewStation => "name",
            PromptKind::NewLine => "name color up_id down_id distance",
            PromptKind::AddSection(_) => "up_id down_id distance",
            PromptKind::RemoveStation(_) => "station_id",
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.input.chars().count() as isize;
        let next = (self.cursor as isize + delta).clamp(0, len);
        self.cursor = next as usize;
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    pub fn insert(&mut self, ch: char) {
        if ch.is_control() || self.input.chars().count() >= MAX_INPUT_LEN {
            return;
        }
        let at = self.byte_offset(self.cursor);
        self.input.insert(at, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_offset(self.cursor);
        self.input.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let at = self.byte_offset(self.cursor);
            self.input.remove(at);
        }
    }

    /// Input text left of the cursor.
    pub fn before_cursor(&self) -> &str {
        &self.input[..self.byte_offset(self.cursor)]
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.input
            .char_indices()
            .nth(chars)
            .map(|(idx, _)| idx)
            .unwrap_or(self.input.len())
    }

    /// Turn the current input into a command.
    pub fn parse(&self) -> Result<Command> {
        let input = self.input.trim();
        if input.is_empty() {
            bail!("expected: {}", self.instruction());
        }
        match self.kind {
            PromptKind::NewStation => Ok(Command::CreateStation(input.to_string())),
            PromptKind::NewLine => parse_line_request(input).map(Command::CreateLine),
            PromptKind::AddSection(line_id) => {
                let [up, down, distance] = numbers(input, self.instruction())?;
                Ok(Command::AddSection(
                    line_id,
                    SectionAddRequest::new(up, down, to_distance(distance)?),
                ))
            }
            PromptKind::RemoveStation(line_id) => {
                let [station] = numbers(input, self.instruction())?;
                Ok(Command::RemoveStation(line_id, StationId(station)))
            }
        }
    }
}

/// `<name...> <color> <up_id> <down_id> <distance>`; the name may contain spaces.
fn parse_line_request(input: &str) -> Result<LineRequest> {
    let normalized = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut parts = normalized.rsplitn(5, ' ');
    let distance = parts.next();
    let down = parts.next();
    let up = parts.next();
    let color = parts.next();
    let name = parts.next().map(str::trim).filter(|name| !name.is_empty());
    let (Some(name), Some(color), Some(up), Some(down), Some(distance)) =
        (name, color, up, down, distance)
    else {
        bail!("expected: name color up_id down_id distance");
    };

    Ok(LineRequest::new(
        name,
        color,
        parse_id(up)?,
        parse_id(down)?,
        to_distance(parse_id(distance)?)?,
    ))
}

fn numbers<const N: usize>(input: &str, usage: &str) -> Result<[i64; N]> {
    let values = input
        .split_whitespace()
        .map(parse_id)
        .collect::<Result<Vec<_>>>()?;
    values
        .try_into()
        .map_err(|_| anyhow!("expected: {usage}"))
}

fn parse_id(token: &str) -> Result<i64> {
    token
        .parse()
        .with_context(|| format!("{token:?} is not a number"))
}

fn to_distance(value: i64) -> Result<u32> {
    u32::try_from(value).with_context(|| format!("distance {value} is out of range"))
}
