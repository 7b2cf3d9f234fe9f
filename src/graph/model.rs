//! Question graph data model — questions, choices, edges, and a builder.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The declared answer type of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    PlainText,
    Integer,
    Boolean,
    Attachment,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PlainText => "plain_text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Attachment => "attachment",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for FieldType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain_text" => Ok(Self::PlainText),
            "integer" => Ok(Self::Integer),
            "boolean" => Ok(Self::Boolean),
            "attachment" => Ok(Self::Attachment),
            _ => Err(format!("Unknown field type: {}", s)),
        }
    }
}

/// A permitted answer value attached to a question.
///
/// When the owning question has `enforce_choices` set, an answer payload must
/// exactly equal one of the question's choice payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Unique choice ID.
    pub id: Uuid,
    /// The permitted answer value.
    pub payload: Value,
    /// Optional display text shown instead of the raw payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Choice {
    pub fn new(payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            display: None,
        }
    }

    /// Builder: set display text.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// A prompt with a declared answer type and optional enforced choice set.
///
/// Effectively immutable once referenced by answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique question ID.
    pub id: Uuid,
    /// Optional stable key used to retrieve this question's answer in
    /// downstream analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_key: Option<String>,
    /// Full prompt shown to the respondent.
    pub label: String,
    /// Short prompt for overviews and exports.
    pub short_label: String,
    /// Declared answer type.
    pub field_type: FieldType,
    /// Whether an answer is mandatory to close the path.
    pub required: bool,
    /// Whether the answer must equal one of `choices`.
    pub enforce_choices: bool,
    /// Permitted answer values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

impl Question {
    /// Create a new optional question; the label doubles as short label.
    pub fn new(label: impl Into<String>, field_type: FieldType) -> Self {
        let label = label.into();
        Self {
            id: Uuid::new_v4(),
            analysis_key: None,
            short_label: label.clone(),
            label,
            field_type,
            required: false,
            enforce_choices: false,
            choices: Vec::new(),
        }
    }

    /// Builder: set the short label.
    pub fn with_short_label(mut self, short_label: impl Into<String>) -> Self {
        self.short_label = short_label.into();
        self
    }

    /// Builder: set the analysis key.
    pub fn with_analysis_key(mut self, key: impl Into<String>) -> Self {
        self.analysis_key = Some(key.into());
        self
    }

    /// Builder: mark the question as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Builder: add a permitted choice.
    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    /// Builder: only the attached choices are accepted as answers.
    pub fn enforce_choices(mut self) -> Self {
        self.enforce_choices = true;
        self
    }

    /// Look up an owned choice by ID.
    pub fn choice(&self, id: Uuid) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }
}

/// A directed, optionally choice-conditioned transition between two questions.
///
/// An edge with a choice is taken only if the answer payload equals that
/// choice's payload; an edge without one is a default transition. `order` is
/// the persisted custom order over a question's outgoing edges; edges with
/// equal order keep their insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge ID.
    pub id: Uuid,
    /// Source question.
    pub question: Uuid,
    /// Destination question.
    pub next_question: Uuid,
    /// Choice (owned by the source question) conditioning this edge, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<Uuid>,
    /// Persisted ordering among the source question's outgoing edges.
    pub order: i32,
}

/// A set of questions connected by transition edges, entered at
/// `first_question`.
///
/// Questions live in an arena keyed by ID and edges are plain
/// (from, to, choice) records, so structural cycles cost nothing. A single
/// question with no edges is a legal, degenerate graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionGraph {
    /// Unique graph ID.
    pub id: Uuid,
    /// Name used in operator tooling and error messages.
    pub name: String,
    /// Entry point of every session walking this graph.
    pub first_question: Uuid,
    /// All questions, reachable or not.
    pub questions: Vec<Question>,
    /// All transition edges.
    pub edges: Vec<Edge>,
}

/// Fluent construction of a [`QuestionGraph`].
///
/// Questions are added first; `connect`/`connect_via` then wire them up.
/// Edge order is assigned per source question in call order unless
/// `connect_ordered` is used.
pub struct GraphBuilder {
    name: String,
    first_question: Option<Uuid>,
    questions: Vec<Question>,
    edges: Vec<Edge>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            first_question: None,
            questions: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Add a question. The first question added becomes the graph entry
    /// point unless `first` overrides it.
    pub fn question(&mut self, question: Question) -> Uuid {
        let id = question.id;
        if self.first_question.is_none() {
            self.first_question = Some(id);
        }
        self.questions.push(question);
        id
    }

    /// Override the graph entry point.
    pub fn first(&mut self, question_id: Uuid) -> &mut Self {
        self.first_question = Some(question_id);
        self
    }

    /// Add a default (unconditional) edge.
    pub fn connect(&mut self, from: Uuid, to: Uuid) -> Uuid {
        self.push_edge(from, to, None, None)
    }

    /// Add an edge conditioned on a choice of the source question.
    pub fn connect_via(&mut self, from: Uuid, to: Uuid, choice: Uuid) -> Uuid {
        self.push_edge(from, to, Some(choice), None)
    }

    /// Add an edge with an explicit order value.
    pub fn connect_ordered(
        &mut self,
        from: Uuid,
        to: Uuid,
        choice: Option<Uuid>,
        order: i32,
    ) -> Uuid {
        self.push_edge(from, to, choice, Some(order))
    }

    fn push_edge(&mut self, from: Uuid, to: Uuid, choice: Option<Uuid>, order: Option<i32>) -> Uuid {
        let order = order.unwrap_or_else(|| {
            self.edges.iter().filter(|e| e.question == from).count() as i32
        });
        let edge = Edge {
            id: Uuid::new_v4(),
            question: from,
            next_question: to,
            choice,
            order,
        };
        let id = edge.id;
        self.edges.push(edge);
        id
    }

    /// Finish the graph. Panics if no question was added; structural
    /// validation happens at materialization.
    pub fn build(self) -> QuestionGraph {
        QuestionGraph {
            id: Uuid::new_v4(),
            name: self.name,
            first_question: self
                .first_question
                .expect("graph needs at least one question"),
            questions: self.questions,
            edges: self.edges,
        }
    }
}
