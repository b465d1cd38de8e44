//! Slash command language.
//!
//! One command per line, for example:
//!
//! ```text
//! /node-create process "Review" 400,100
//! /connect "Start" "Review"
//! /task-create "Draft" "Start" high
//! /tag-add "urgent" "Draft"
//! /task-advance "Draft"
//! /workflow-save "release"
//! ```
//!
//! Elements are named by id or by case-insensitive text, quoted when the
//! text contains spaces. Batch commands take comma-separated lists.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::canvas::{
    Advance, AdvanceCandidate, Canvas, GENERAL_TAG_CATEGORY, MoveOutcome, NodeDeletion,
    fallback_text,
};
use crate::codec::default_file_name;
use crate::error::{CommandError, TransitionError};
use crate::ir::{Entity, FlowlineType, NodeKind, Point, Priority, START_TEXT, Tag, TagCategory};
use crate::layout::Measure;
use crate::matrix::{EisenhowerMatrix, Quadrant};
use crate::store::DEFAULT_START_POSITION;
use crate::theme::Theme;

static NODE_CREATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^/node[-_]?create\s+(\w+)(?:\s+("[^"]+"|\w+))?(?:\s+(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?))?$"#)
        .unwrap()
});
static NODE_DELETE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?:node[-_]?delete|delete[-_]?node|remove[-_]?node)\s+(.+)$").unwrap()
});
static NODE_RENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^/node[-_]?rename\s+("[^"]+"|\S+)\s+"([^"]+)"$"#).unwrap());
static NODE_MOVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/node[-_]?move\s+(.+)\s+(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)$").unwrap()
});
static NODE_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/node[-_]?type\s+(.+)\s+(\w+)$").unwrap());
static TASK_CREATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^/(?:task[-_]?create|add[-_]?task|create[-_]?task)\s+"([^"]+)"(?:\s+"([^"]+)")?(?:\s+(\w+))?$"#)
        .unwrap()
});
static TASK_DELETE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/task[-_]?delete\s+(.+)$").unwrap());
static TASK_MOVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^/task[-_]?move\s+(.+)\s+"([^"]+)"$"#).unwrap());
static TASK_ADVANCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^/task[-_]?advance\s+(.+?)(?:\s+"([^"]+)")?$"#).unwrap());
static TASK_REVERSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/task[-_]?(?:reverse|back)\s+(.+)$").unwrap());
static TASK_PRIORITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/task[-_]?priority\s+(.+)\s+(\w+)$").unwrap());
static CONNECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^/(?:flowline[-_]?create|connect)\s+"([^"]+)"\s+"([^"]+)"(?:\s+(\w+))?$"#)
        .unwrap()
});
static DISCONNECT_ALL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/disconnect\s+all$").unwrap());
static DISCONNECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^/(?:flowline[-_]?delete|disconnect)\s+"([^"]+)"\s+"([^"]+)"$"#).unwrap()
});
static FLOWLINE_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^/flowline[-_]?type\s+"([^"]+)"\s+"([^"]+)"\s+(\w+)$"#).unwrap()
});
static TAG_CREATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^/tag[-_]?create\s+"([^"]+)"(?:\s+(\w+))?(?:\s+(.+))?$"#).unwrap()
});
static TAG_ADD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^/tag[-_]?add\s+"([^"]+)"\s+(.+)$"#).unwrap());
static TAG_REMOVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^/tag[-_]?remove\s+"([^"]+)"\s+(.+)$"#).unwrap());
static TAG_LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/tag[-_]?list(?:\s+(.+))?$").unwrap());
static WORKFLOW_SAVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^/workflow[-_]?save(?:\s+"([^"]+)")?$"#).unwrap());
static WORKFLOW_LOAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^/workflow[-_]?load\s+"([^"]+)"$"#).unwrap());
static WORKFLOW_EXPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/workflow[-_]?export(?:\s+(\w+))?$").unwrap());
static WORKFLOW_CLEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/workflow[-_]?(?:clear|reset)(?:\s+(yes|confirm))?$").unwrap()
});
static WORKFLOW_STATUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/workflow[-_]?status$").unwrap());
static WORKFLOW_STATS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/workflow[-_]?stats$").unwrap());
static MATRIX_MOVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/matrix[-_]?move\s+(.+)\s+([\w-]+)$").unwrap());
static MATRIX_SHOW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/matrix[-_]?show(?:\s+([\w-]+))?$").unwrap());
static BATCH_CREATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/batch[-_]?create\s+(\w+)\s+(.+)$").unwrap());
static BATCH_CONNECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^/batch[-_]?connect\s+"([^"]+)"\s+"([^"]+)"$"#).unwrap()
});
static BATCH_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^/batch[-_]?tag\s+"([^"]+)"\s+(.+)$"#).unwrap());

/// Command names offered as suggestions for unknown input.
pub const COMMANDS: &[&str] = &[
    "/node-create",
    "/node-delete",
    "/node-rename",
    "/node-move",
    "/node-type",
    "/task-create",
    "/task-delete",
    "/task-move",
    "/task-advance",
    "/task-reverse",
    "/task-priority",
    "/connect",
    "/disconnect",
    "/flowline-type",
    "/disconnect all",
    "/tag-create",
    "/tag-add",
    "/tag-remove",
    "/tag-list",
    "/workflow-save",
    "/workflow-load",
    "/workflow-export",
    "/workflow-clear",
    "/workflow-status",
    "/workflow-stats",
    "/matrix-move",
    "/matrix-show",
    "/batch-create",
    "/batch-connect",
    "/batch-tag",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Svg,
}

impl ExportFormat {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }
}

/// What `/batch-create` makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Node(NodeKind),
    Task,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    NodeCreate {
        kind: NodeKind,
        text: Option<String>,
        position: Option<Point>,
    },
    NodeDelete {
        node: String,
    },
    NodeRename {
        node: String,
        text: String,
    },
    NodeMove {
        node: String,
        position: Point,
    },
    NodeType {
        node: String,
        kind: NodeKind,
    },
    TaskCreate {
        text: String,
        anchor: Option<String>,
        priority: Option<Priority>,
    },
    TaskDelete {
        task: String,
    },
    TaskMove {
        task: String,
        target: String,
    },
    TaskAdvance {
        task: String,
        target: Option<String>,
    },
    TaskReverse {
        task: String,
    },
    TaskPriority {
        task: String,
        priority: Priority,
    },
    Connect {
        source: String,
        target: String,
        kind: Option<FlowlineType>,
    },
    Disconnect {
        source: String,
        target: String,
    },
    SetFlowlineType {
        source: String,
        target: String,
        kind: FlowlineType,
    },
    DisconnectAll,
    TagCreate {
        name: String,
        category: Option<String>,
        description: Option<String>,
    },
    /// `tag` is a raw token, read against the canvas's tag definitions.
    TagAdd {
        tag: String,
        task: String,
    },
    TagRemove {
        tag: String,
        task: String,
    },
    TagList {
        filter: Option<String>,
    },
    WorkflowSave {
        file: Option<String>,
    },
    WorkflowLoad {
        file: String,
    },
    WorkflowExport {
        format: ExportFormat,
    },
    WorkflowClear {
        confirmed: bool,
    },
    WorkflowStatus,
    WorkflowStats,
    MatrixMove {
        task: String,
        quadrant: Quadrant,
    },
    MatrixShow {
        quadrant: Option<Quadrant>,
    },
    BatchCreate {
        kind: BatchKind,
        names: Vec<String>,
    },
    /// Connects every source to every target.
    BatchConnect {
        sources: Vec<String>,
        targets: Vec<String>,
    },
    BatchTag {
        tag: String,
        tasks: Vec<String>,
    },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_command(input)
    }
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').to_string()
}

fn group(caps: &Captures<'_>, idx: usize) -> Option<String> {
    caps.get(idx).map(|m| unquote(m.as_str()))
}

/// Comma-separated names, each optionally quoted.
fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(unquote)
        .filter(|name| !name.is_empty())
        .collect()
}

fn coordinate(value: &str) -> Result<f32, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidValue {
        what: "coordinate",
        value: value.to_string(),
        expected: "a number".to_string(),
    })
}

fn node_kind(value: &str) -> Result<NodeKind, CommandError> {
    NodeKind::from_token(value).ok_or_else(|| CommandError::InvalidValue {
        what: "node type",
        value: value.to_string(),
        expected: "process, decision, terminal, start".to_string(),
    })
}

fn flowline_kind(value: &str) -> Result<FlowlineType, CommandError> {
    FlowlineType::from_token(value).ok_or_else(|| CommandError::InvalidValue {
        what: "flowline type",
        value: value.to_string(),
        expected: "straight, perpendicular".to_string(),
    })
}

fn priority(value: &str) -> Result<Priority, CommandError> {
    Priority::from_token(value).ok_or_else(|| CommandError::InvalidValue {
        what: "priority",
        value: value.to_string(),
        expected: Priority::ALL.map(Priority::as_str).join(", "),
    })
}

fn batch_kind(value: &str) -> Result<BatchKind, CommandError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "task" | "tasks" => Ok(BatchKind::Task),
        other => NodeKind::from_token(other)
            .map(BatchKind::Node)
            .ok_or_else(|| CommandError::InvalidValue {
                what: "batch type",
                value: value.to_string(),
                expected: "task, process, decision, terminal".to_string(),
            }),
    }
}

fn quadrant(value: &str) -> Result<Quadrant, CommandError> {
    Quadrant::from_token(value).ok_or_else(|| CommandError::InvalidValue {
        what: "matrix quadrant",
        value: value.to_string(),
        expected: Quadrant::ALL.map(Quadrant::as_str).join(", "),
    })
}

pub fn parse_command(input: &str) -> Result<Command, CommandError> {
    let line = input.trim();
    if !line.starts_with('/') {
        return Err(CommandError::NotACommand(line.to_string()));
    }

    if let Some(caps) = NODE_CREATE_RE.captures(line) {
        let position = match (caps.get(3), caps.get(4)) {
            (Some(x), Some(y)) => Some(Point::new(coordinate(x.as_str())?, coordinate(y.as_str())?)),
            _ => None,
        };
        return Ok(Command::NodeCreate {
            kind: node_kind(&caps[1])?,
            text: group(&caps, 2),
            position,
        });
    }
    if let Some(caps) = NODE_DELETE_RE.captures(line) {
        return Ok(Command::NodeDelete {
            node: unquote(&caps[1]),
        });
    }
    if let Some(caps) = NODE_RENAME_RE.captures(line) {
        return Ok(Command::NodeRename {
            node: unquote(&caps[1]),
            text: caps[2].to_string(),
        });
    }
    if let Some(caps) = NODE_MOVE_RE.captures(line) {
        return Ok(Command::NodeMove {
            node: unquote(&caps[1]),
            position: Point::new(coordinate(&caps[2])?, coordinate(&caps[3])?),
        });
    }
    if let Some(caps) = NODE_TYPE_RE.captures(line) {
        return Ok(Command::NodeType {
            node: unquote(&caps[1]),
            kind: node_kind(&caps[2])?,
        });
    }
    if let Some(caps) = TASK_CREATE_RE.captures(line) {
        return Ok(Command::TaskCreate {
            text: caps[1].to_string(),
            anchor: group(&caps, 2),
            priority: caps.get(3).map(|m| priority(m.as_str())).transpose()?,
        });
    }
    if let Some(caps) = TASK_DELETE_RE.captures(line) {
        return Ok(Command::TaskDelete {
            task: unquote(&caps[1]),
        });
    }
    if let Some(caps) = TASK_MOVE_RE.captures(line) {
        return Ok(Command::TaskMove {
            task: unquote(&caps[1]),
            target: caps[2].to_string(),
        });
    }
    if let Some(caps) = TASK_ADVANCE_RE.captures(line) {
        return Ok(Command::TaskAdvance {
            task: unquote(&caps[1]),
            target: group(&caps, 2),
        });
    }
    if let Some(caps) = TASK_REVERSE_RE.captures(line) {
        return Ok(Command::TaskReverse {
            task: unquote(&caps[1]),
        });
    }
    if let Some(caps) = TASK_PRIORITY_RE.captures(line) {
        return Ok(Command::TaskPriority {
            task: unquote(&caps[1]),
            priority: priority(&caps[2])?,
        });
    }
    if let Some(caps) = CONNECT_RE.captures(line) {
        return Ok(Command::Connect {
            source: caps[1].to_string(),
            target: caps[2].to_string(),
            kind: caps.get(3).map(|m| flowline_kind(m.as_str())).transpose()?,
        });
    }
    if DISCONNECT_ALL_RE.is_match(line) {
        return Ok(Command::DisconnectAll);
    }
    if let Some(caps) = DISCONNECT_RE.captures(line) {
        return Ok(Command::Disconnect {
            source: caps[1].to_string(),
            target: caps[2].to_string(),
        });
    }
    if let Some(caps) = FLOWLINE_TYPE_RE.captures(line) {
        return Ok(Command::SetFlowlineType {
            source: caps[1].to_string(),
            target: caps[2].to_string(),
            kind: flowline_kind(&caps[3])?,
        });
    }
    if let Some(caps) = TAG_CREATE_RE.captures(line) {
        return Ok(Command::TagCreate {
            name: caps[1].to_string(),
            category: group(&caps, 2),
            description: group(&caps, 3),
        });
    }
    if let Some(caps) = TAG_ADD_RE.captures(line) {
        return Ok(Command::TagAdd {
            tag: caps[1].to_string(),
            task: unquote(&caps[2]),
        });
    }
    if let Some(caps) = TAG_REMOVE_RE.captures(line) {
        return Ok(Command::TagRemove {
            tag: caps[1].to_string(),
            task: unquote(&caps[2]),
        });
    }
    if let Some(caps) = TAG_LIST_RE.captures(line) {
        return Ok(Command::TagList {
            filter: group(&caps, 1),
        });
    }
    if let Some(caps) = WORKFLOW_SAVE_RE.captures(line) {
        return Ok(Command::WorkflowSave {
            file: group(&caps, 1),
        });
    }
    if let Some(caps) = WORKFLOW_LOAD_RE.captures(line) {
        return Ok(Command::WorkflowLoad {
            file: caps[1].to_string(),
        });
    }
    if let Some(caps) = WORKFLOW_EXPORT_RE.captures(line) {
        let format = match caps.get(1) {
            Some(m) => ExportFormat::from_token(m.as_str()).ok_or_else(|| {
                CommandError::InvalidValue {
                    what: "export format",
                    value: m.as_str().to_string(),
                    expected: "json, svg".to_string(),
                }
            })?,
            None => ExportFormat::Json,
        };
        return Ok(Command::WorkflowExport { format });
    }
    if let Some(caps) = WORKFLOW_CLEAR_RE.captures(line) {
        return Ok(Command::WorkflowClear {
            confirmed: caps.get(1).is_some(),
        });
    }
    if WORKFLOW_STATUS_RE.is_match(line) {
        return Ok(Command::WorkflowStatus);
    }
    if WORKFLOW_STATS_RE.is_match(line) {
        return Ok(Command::WorkflowStats);
    }
    if let Some(caps) = MATRIX_MOVE_RE.captures(line) {
        return Ok(Command::MatrixMove {
            task: unquote(&caps[1]),
            quadrant: quadrant(&caps[2])?,
        });
    }
    if let Some(caps) = MATRIX_SHOW_RE.captures(line) {
        return Ok(Command::MatrixShow {
            quadrant: caps.get(1).map(|m| quadrant(m.as_str())).transpose()?,
        });
    }
    if let Some(caps) = BATCH_CREATE_RE.captures(line) {
        return Ok(Command::BatchCreate {
            kind: batch_kind(&caps[1])?,
            names: list(&caps[2]),
        });
    }
    if let Some(caps) = BATCH_CONNECT_RE.captures(line) {
        return Ok(Command::BatchConnect {
            sources: list(&caps[1]),
            targets: list(&caps[2]),
        });
    }
    if let Some(caps) = BATCH_TAG_RE.captures(line) {
        return Ok(Command::BatchTag {
            tag: caps[1].to_string(),
            tasks: list(&caps[2]),
        });
    }

    let word = line.split_whitespace().next().unwrap_or(line).to_string();
    let suggestion = suggest_command(&word).map(str::to_string);
    Err(CommandError::Unknown {
        input: word,
        suggestion,
    })
}

/// Closest known command by shared characters, if any is close enough.
pub fn suggest_command(unknown: &str) -> Option<&'static str> {
    let unknown = unknown.trim_start_matches('/').to_ascii_lowercase();
    if unknown.is_empty() {
        return None;
    }
    let unknown_chars: std::collections::HashSet<char> = unknown.chars().collect();
    let mut best: Option<(&'static str, f64)> = None;
    for &command in COMMANDS {
        let name = command.trim_start_matches('/');
        let name_chars: std::collections::HashSet<char> = name.chars().collect();
        let common = unknown_chars.intersection(&name_chars).count();
        let score = common as f64 / unknown.len().max(name.len()) as f64;
        if score > 0.3 && best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((command, score));
        }
    }
    best.map(|(command, _)| command)
}

/// Non-blank, non-comment lines of a command script with 1-based line numbers.
pub fn script_lines(script: &str) -> impl Iterator<Item = (usize, &str)> {
    script
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Done(String),
    Created { id: String, message: String },
    /// A batch command created several elements, in request order.
    CreatedMany { ids: Vec<String>, message: String },
    /// The task's anchor has several outbound flowlines; repeat the advance
    /// with one of these targets.
    Choose {
        task: String,
        candidates: Vec<AdvanceCandidate>,
    },
    Export { format: ExportFormat, body: String },
    Report(String),
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(message)
            | Self::Created { message, .. }
            | Self::CreatedMany { message, .. }
            | Self::Report(message) => f.write_str(message.trim_end()),
            Self::Choose { task, candidates } => {
                writeln!(f, "Task '{task}' can advance to:")?;
                for candidate in candidates {
                    writeln!(f, "  {} ({})", candidate.label, candidate.target)?;
                }
                write!(f, "Use: /task-advance \"{task}\" \"<target>\"")
            }
            Self::Export { body, .. } => f.write_str(body),
        }
    }
}

fn tag_label(tag: &Tag) -> String {
    format!("{}:{}", tag.category.as_str(), tag.option)
}

/// Appends `.json` when the name has no extension.
fn with_json_extension(name: &str) -> PathBuf {
    let path = PathBuf::from(name.trim());
    if path.extension().is_some() {
        path
    } else {
        path.with_extension("json")
    }
}

fn file_error(path: &Path, err: std::io::Error) -> CommandError {
    CommandError::File {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

fn describe_move(task: &str, outcome: &MoveOutcome) -> String {
    match outcome {
        MoveOutcome::Unchanged => format!("Task '{task}' is already there"),
        MoveOutcome::Moved { from, to, slot } => {
            format!("Moved task '{task}' from '{from}' to '{to}' (slot {slot})")
        }
    }
}

impl<M: Measure> Canvas<M> {
    fn resolve_node(&self, ident: &str) -> Result<String, CommandError> {
        match self.store().resolve(ident) {
            Some(Entity::Node(node)) => Ok(node.id.clone()),
            Some(Entity::Task(task)) => Err(TransitionError::NotANode(task.id.clone()).into()),
            None => Err(CommandError::UnknownElement(ident.to_string())),
        }
    }

    fn resolve_task(&self, ident: &str) -> Result<String, CommandError> {
        match self.store().resolve(ident) {
            Some(Entity::Task(task)) => Ok(task.id.clone()),
            Some(Entity::Node(node)) => Err(TransitionError::TaskNotFound(node.id.clone()).into()),
            None => Err(CommandError::UnknownElement(ident.to_string())),
        }
    }

    /// Parses and applies one command line.
    pub fn run(&mut self, line: &str) -> Result<CommandOutput, CommandError> {
        let command = parse_command(line)?;
        self.execute(command)
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandOutput, CommandError> {
        tracing::debug!(?command, "executing command");
        let output = match command {
            Command::NodeCreate {
                kind,
                text,
                position,
            } => {
                let position = position.unwrap_or_else(|| self.next_free_position());
                let id = self.create_node(kind, text.as_deref().unwrap_or_default(), position)?;
                if text.is_none() {
                    self.rename(&id, &fallback_text(kind.as_str(), &id))?;
                }
                CommandOutput::Created {
                    message: format!("Created {} node '{id}'", kind.as_str()),
                    id,
                }
            }
            Command::NodeDelete { node } => {
                let id = self.resolve_node(&node)?;
                match self.delete_node(&id)? {
                    NodeDeletion::Deleted { flowlines_removed } => CommandOutput::Done(format!(
                        "Deleted node '{id}' and {flowlines_removed} flowline(s)"
                    )),
                    NodeDeletion::NeedsReassignment { tasks } => CommandOutput::Report(format!(
                        "Node '{id}' still holds {} task(s): {}. Move them first.",
                        tasks.len(),
                        tasks.join(", ")
                    )),
                }
            }
            Command::NodeRename { node, text } => {
                let id = self.resolve_node(&node)?;
                self.rename(&id, &text)?;
                CommandOutput::Done(format!("Renamed node '{id}' to '{text}'"))
            }
            Command::NodeMove { node, position } => {
                let id = self.resolve_node(&node)?;
                self.move_node(&id, position)?;
                CommandOutput::Done(format!(
                    "Moved node '{id}' to {},{}",
                    position.x, position.y
                ))
            }
            Command::NodeType { node, kind } => {
                let id = self.resolve_node(&node)?;
                self.set_node_kind(&id, kind)?;
                CommandOutput::Done(format!("Node '{id}' is now a {} node", kind.as_str()))
            }
            Command::TaskCreate {
                text,
                anchor,
                priority,
            } => {
                let anchor = anchor.map(|a| self.resolve_node(&a)).transpose()?;
                let id = self.create_task(&text, anchor.as_deref())?;
                if let Some(priority) = priority {
                    self.set_priority(&id, priority)?;
                }
                CommandOutput::Created {
                    message: format!("Created task '{id}'"),
                    id,
                }
            }
            Command::TaskDelete { task } => {
                let id = self.resolve_task(&task)?;
                self.delete_task(&id)?;
                CommandOutput::Done(format!("Deleted task '{id}'"))
            }
            Command::TaskMove { task, target } => {
                let id = self.resolve_task(&task)?;
                let target = self.resolve_node(&target)?;
                let outcome = self.move_task(&id, &target)?;
                CommandOutput::Done(describe_move(&id, &outcome))
            }
            Command::TaskAdvance { task, target } => {
                let id = self.resolve_task(&task)?;
                match target {
                    Some(target) => {
                        let target = self.resolve_node(&target)?;
                        let outcome = self.advance_task_to(&id, &target)?;
                        CommandOutput::Done(describe_move(&id, &outcome))
                    }
                    None => match self.advance_task(&id)? {
                        Advance::Moved(outcome) => CommandOutput::Done(describe_move(&id, &outcome)),
                        Advance::Choose(candidates) => CommandOutput::Choose {
                            task: id,
                            candidates,
                        },
                    },
                }
            }
            Command::TaskReverse { task } => {
                let id = self.resolve_task(&task)?;
                let outcome = self.reverse_task(&id)?;
                CommandOutput::Done(describe_move(&id, &outcome))
            }
            Command::TaskPriority { task, priority } => {
                let id = self.resolve_task(&task)?;
                self.set_priority(&id, priority)?;
                CommandOutput::Done(format!(
                    "Task '{id}' priority set to {}",
                    priority.as_str()
                ))
            }
            Command::Connect {
                source,
                target,
                kind,
            } => {
                let source = self.resolve_node(&source)?;
                let target = self.resolve_node(&target)?;
                if self.connect(&source, &target, kind)? {
                    CommandOutput::Done(format!("Connected '{source}' -> '{target}'"))
                } else {
                    CommandOutput::Done(format!("'{source}' -> '{target}' already exists"))
                }
            }
            Command::Disconnect { source, target } => {
                let source = self.resolve_node(&source)?;
                let target = self.resolve_node(&target)?;
                if self.disconnect(&source, &target)? {
                    CommandOutput::Done(format!("Disconnected '{source}' -> '{target}'"))
                } else {
                    CommandOutput::Done(format!("No flowline '{source}' -> '{target}'"))
                }
            }
            Command::SetFlowlineType {
                source,
                target,
                kind,
            } => {
                let source = self.resolve_node(&source)?;
                let target = self.resolve_node(&target)?;
                if self.set_flowline_kind(&source, &target, kind)? {
                    CommandOutput::Done(format!(
                        "Flowline '{source}' -> '{target}' is now {}",
                        kind.as_str()
                    ))
                } else {
                    CommandOutput::Done(format!("No flowline '{source}' -> '{target}'"))
                }
            }
            Command::DisconnectAll => {
                let removed = self.disconnect_all();
                CommandOutput::Done(format!("Removed {removed} flowline(s)"))
            }
            Command::TagCreate {
                name,
                category,
                description,
            } => {
                let category = category.as_deref().unwrap_or(GENERAL_TAG_CATEGORY);
                let mut tag = Tag::new(category, name.trim().to_ascii_lowercase());
                tag.description = description;
                let label = tag_label(&tag);
                let message = match self.define_tag(&name, tag) {
                    Some(_) => format!("Redefined tag '{name}' as {label}"),
                    None => format!("Defined tag '{name}' as {label}"),
                };
                CommandOutput::Done(message)
            }
            Command::TagAdd { tag, task } => {
                let id = self.resolve_task(&task)?;
                let tag = self.tag_from_token(&tag);
                let label = tag_label(&tag);
                let replaced = self.add_tag(&id, tag)?;
                CommandOutput::Done(match replaced {
                    Some(old) => format!("Task '{id}' tag {label} replaced {}", old.option),
                    None => format!("Task '{id}' tagged {label}"),
                })
            }
            Command::TagRemove { tag, task } => {
                let id = self.resolve_task(&task)?;
                let category = self.category_to_remove(&id, &tag);
                match self.remove_tag(&id, &category)? {
                    Some(_) => CommandOutput::Done(format!(
                        "Removed {} tag from task '{id}'",
                        category.as_str()
                    )),
                    None => CommandOutput::Done(format!(
                        "Task '{id}' has no {} tag",
                        category.as_str()
                    )),
                }
            }
            Command::TagList { filter } => CommandOutput::Report(self.tag_listing(filter.as_deref())),
            Command::WorkflowSave { file } => {
                let path = match file {
                    Some(name) => with_json_extension(&name),
                    None => PathBuf::from(default_file_name(chrono::Utc::now())),
                };
                let json = self.save_json()?;
                std::fs::write(&path, json).map_err(|err| file_error(&path, err))?;
                tracing::info!(path = %path.display(), "saved workflow file");
                CommandOutput::Done(format!("Saved workflow to {}", path.display()))
            }
            Command::WorkflowLoad { file } => {
                let path = with_json_extension(&file);
                let input = std::fs::read_to_string(&path).map_err(|err| file_error(&path, err))?;
                let report = self.load_json(&input)?;
                let mut lines = vec![format!(
                    "Loaded {} (version {}): {} nodes, {} tasks, {} flowlines",
                    path.display(),
                    report.source_version,
                    report.nodes,
                    report.tasks,
                    report.flowlines
                )];
                lines.extend(report.warnings.iter().map(|w| format!("warning: {w}")));
                CommandOutput::Report(lines.join("\n"))
            }
            Command::WorkflowExport { format } => {
                let body = match format {
                    ExportFormat::Json => self.save_json()?,
                    ExportFormat::Svg => self.to_svg(&Theme::default()),
                };
                CommandOutput::Export { format, body }
            }
            Command::WorkflowClear { confirmed } => {
                if !confirmed {
                    return Err(CommandError::ConfirmationRequired);
                }
                self.clear();
                CommandOutput::Done("Workflow cleared".to_string())
            }
            Command::WorkflowStatus => CommandOutput::Report(self.stats().status_line()),
            Command::WorkflowStats => {
                let stats = self.stats();
                let body = serde_json::to_string_pretty(&stats)
                    .unwrap_or_else(|_| stats.status_line());
                CommandOutput::Report(body)
            }
            Command::MatrixMove { task, quadrant } => {
                let id = self.resolve_task(&task)?;
                for tag in quadrant.tags() {
                    self.add_tag(&id, tag)?;
                }
                CommandOutput::Done(format!("Task '{id}' moved to {}", quadrant.as_str()))
            }
            Command::MatrixShow { quadrant } => {
                let matrix = EisenhowerMatrix::from_store(self.store());
                let report = match quadrant {
                    Some(quadrant) => {
                        let names: Vec<&str> = matrix
                            .tasks(quadrant)
                            .iter()
                            .filter_map(|id| self.store().task(id).map(|t| t.text.as_str()))
                            .collect();
                        format!("{} ({}): {}", quadrant.as_str(), quadrant.label(), names.join(", "))
                    }
                    None => matrix.describe(self.store()),
                };
                CommandOutput::Report(report)
            }
            Command::BatchCreate { kind, names } => self.batch_create(kind, &names)?,
            Command::BatchConnect { sources, targets } => {
                let sources = sources
                    .iter()
                    .map(|name| self.resolve_node(name))
                    .collect::<Result<Vec<_>, _>>()?;
                let targets = targets
                    .iter()
                    .map(|name| self.resolve_node(name))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(node) = sources.iter().find(|source| targets.contains(source)) {
                    return Err(TransitionError::SelfLoop(node.clone()).into());
                }
                let mut added = 0;
                for source in &sources {
                    for target in &targets {
                        if self.connect(source, target, None)? {
                            added += 1;
                        }
                    }
                }
                CommandOutput::Done(format!(
                    "Connected {} source(s) to {} target(s): {added} new flowline(s)",
                    sources.len(),
                    targets.len()
                ))
            }
            Command::BatchTag { tag, tasks } => {
                let ids = tasks
                    .iter()
                    .map(|name| self.resolve_task(name))
                    .collect::<Result<Vec<_>, _>>()?;
                let tag = self.tag_from_token(&tag);
                let label = tag_label(&tag);
                for id in &ids {
                    self.add_tag(id, tag.clone())?;
                }
                CommandOutput::Done(format!("Tagged {} task(s) {label}", ids.len()))
            }
        };
        Ok(output)
    }

    /// Creates every named element or, if any name would be refused,
    /// none of them. New nodes line up to the right of the content.
    fn batch_create(&mut self, kind: BatchKind, names: &[String]) -> Result<CommandOutput, CommandError> {
        if names.is_empty() {
            return Err(CommandError::InvalidValue {
                what: "batch list",
                value: String::new(),
                expected: "comma-separated names".to_string(),
            });
        }
        let mut ids = Vec::with_capacity(names.len());
        match kind {
            BatchKind::Task => {
                for name in names {
                    ids.push(self.create_task(name, None)?);
                }
            }
            BatchKind::Node(node_kind) => {
                if node_kind == NodeKind::Terminal && names.iter().any(|name| name == START_TEXT) {
                    return Err(
                        TransitionError::DuplicateStart(self.store().start_id().to_string()).into(),
                    );
                }
                for name in names {
                    let position = self.next_free_position();
                    ids.push(self.create_node(node_kind, name, position)?);
                }
            }
        }
        let type_name = match kind {
            BatchKind::Task => "task",
            BatchKind::Node(node_kind) => node_kind.as_str(),
        };
        Ok(CommandOutput::CreatedMany {
            message: format!("Created {} {type_name}(s): {}", ids.len(), ids.join(", ")),
            ids,
        })
    }

    /// Right of everything on the canvas, at the Start row.
    fn next_free_position(&self) -> Point {
        let x = self
            .layout()
            .content_bounds(self.store())
            .map(|bounds| bounds.max_x + self.config().append_gap)
            .unwrap_or(DEFAULT_START_POSITION.x);
        Point::new(x, DEFAULT_START_POSITION.y)
    }

    /// The category a `/tag-remove` token names on this task: an explicit
    /// `category:option`, a category the task carries, or the category the
    /// token would be added under.
    fn category_to_remove(&self, task_id: &str, token: &str) -> TagCategory {
        let token = token.trim();
        if let Some((category, _)) = token.split_once(':') {
            return TagCategory::from(category.trim());
        }
        let carried = self.store().task(task_id).and_then(|task| {
            task.tags
                .iter()
                .find(|tag| tag.category.as_str().eq_ignore_ascii_case(token))
                .map(|tag| tag.category.clone())
        });
        carried.unwrap_or_else(|| self.tag_from_token(token).category)
    }

    fn tag_listing(&self, filter: Option<&str>) -> String {
        let filter = filter.map(|f| f.to_ascii_lowercase());
        let mut lines = Vec::new();
        for task in self.store().tasks() {
            for tag in &task.tags {
                let label = tag_label(tag);
                if filter
                    .as_deref()
                    .is_some_and(|f| !label.to_ascii_lowercase().contains(f))
                {
                    continue;
                }
                let done = if tag.completed { " (done)" } else { "" };
                lines.push(format!("{}: {label}{done}", task.text));
            }
        }
        if lines.is_empty() {
            "No tags".to_string()
        } else {
            lines.join("\n")
        }
    }
}
