use thiserror::Error;

/// A workflow document could not be read. Load and append leave the canvas
/// untouched when they return one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Failed to parse workflow JSON: {0}")]
    Parse(String),

    #[error("Workflow document has no version field")]
    MissingVersion,

    #[error("Unsupported workflow document version '{0}' (supported: 1.0, 1.1, 2.0.0)")]
    UnsupportedVersion(String),

    #[error(
        "Workflow document version '{0}' is deprecated; import it with a 1.x designer and re-export it"
    )]
    DeprecatedVersion(String),

    #[error("Invalid workflow document: {0}")]
    Invalid(String),

    #[error("Entity id '{0}' appears more than once in the workflow document")]
    DuplicateId(String),
}

/// A graph mutation or task transition was refused. The store is unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    #[error("No node or task has id '{0}'")]
    ElementNotFound(String),

    #[error("'{0}' is a task, not a node")]
    NotANode(String),

    #[error("Node '{0}' has no outbound flowlines, so its tasks cannot advance")]
    NoOutboundFlowline(String),

    #[error("Task '{0}' has no previous anchor to return to")]
    NoPreviousAnchor(String),

    #[error("Previous anchor '{anchor}' of task '{task}' no longer exists")]
    PreviousAnchorMissing { task: String, anchor: String },

    #[error("The Start node cannot be deleted or changed")]
    StartNodeProtected,

    #[error("A Start node already exists ('{0}'); only one terminal may be named Start")]
    DuplicateStart(String),

    #[error("Task '{task}' needs a new anchor before node '{node}' can be deleted")]
    MissingReassignment { task: String, node: String },

    #[error("Task '{task}' cannot be reassigned to '{target}', the node being deleted")]
    ReassignedToDeletedNode { task: String, target: String },

    #[error("Cannot connect node '{0}' to itself")]
    SelfLoop(String),

    #[error("Node '{target}' is not reachable by a flowline from '{anchor}'")]
    NotAnAdvanceTarget { anchor: String, target: String },
}

/// A slash command could not be parsed or applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Not a command: '{0}' (commands start with '/')")]
    NotACommand(String),

    #[error("Unknown command '{input}'{}", suggestion_hint(.suggestion))]
    Unknown {
        input: String,
        suggestion: Option<String>,
    },

    #[error("Invalid {what} '{value}'. Valid values: {expected}")]
    InvalidValue {
        what: &'static str,
        value: String,
        expected: String,
    },

    #[error("No node or task matches '{0}'")]
    UnknownElement(String),

    #[error("Clearing the workflow is destructive. Use: /workflow-clear yes")]
    ConfirmationRequired,

    #[error("Cannot access '{path}': {message}")]
    File { path: String, message: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(command) => format!(". Did you mean {command}?"),
        None => String::new(),
    }
}
