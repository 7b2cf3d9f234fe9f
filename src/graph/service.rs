//! QuestionGraphService — materializes a stored graph into a traversable
//! form plus identity indices.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use crate::error::GraphError;

use super::model::{Question, QuestionGraph};

/// An outgoing edge with its conditioning choice payload resolved.
#[derive(Debug, Clone)]
pub struct OutEdge {
    pub edge_id: Uuid,
    pub next_question: Uuid,
    /// Payload of the conditioning choice; `None` for a default edge.
    pub choice_payload: Option<serde_json::Value>,
    pub order: i32,
}

/// In-memory traversable form of a [`QuestionGraph`]: per-question ordered
/// outgoing edge lists plus an index of all questions by ID.
///
/// Structural cycles are legal and never eagerly expanded; path resolution
/// interleaves with real answers and lives in the session service.
#[derive(Debug)]
pub struct QuestionGraphService {
    graph: QuestionGraph,
    question_index: HashMap<Uuid, usize>,
    out_edges: HashMap<Uuid, Vec<OutEdge>>,
}

impl QuestionGraphService {
    /// Build the traversable form, checking structural sanity: the question
    /// count cap, edge endpoints, choice references, and the entry point.
    pub fn materialize(graph: QuestionGraph, max_questions: usize) -> Result<Self, GraphError> {
        if graph.questions.len() > max_questions {
            return Err(GraphError::TooManyQuestions {
                name: graph.name.clone(),
                max: max_questions,
            });
        }

        let question_index: HashMap<Uuid, usize> = graph
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| (q.id, i))
            .collect();

        if !question_index.contains_key(&graph.first_question) {
            return Err(GraphError::UnknownQuestion {
                edge_id: Uuid::nil(),
                question_id: graph.first_question,
            });
        }

        let mut out_edges: HashMap<Uuid, Vec<OutEdge>> = HashMap::new();
        for edge in &graph.edges {
            let source_idx =
                *question_index
                    .get(&edge.question)
                    .ok_or(GraphError::UnknownQuestion {
                        edge_id: edge.id,
                        question_id: edge.question,
                    })?;
            if !question_index.contains_key(&edge.next_question) {
                return Err(GraphError::UnknownQuestion {
                    edge_id: edge.id,
                    question_id: edge.next_question,
                });
            }

            let choice_payload = match edge.choice {
                Some(choice_id) => {
                    let source = &graph.questions[source_idx];
                    let choice =
                        source
                            .choice(choice_id)
                            .ok_or(GraphError::UnknownChoice {
                                edge_id: edge.id,
                                choice_id,
                            })?;
                    Some(choice.payload.clone())
                }
                None => None,
            };

            out_edges.entry(edge.question).or_default().push(OutEdge {
                edge_id: edge.id,
                next_question: edge.next_question,
                choice_payload,
                order: edge.order,
            });
        }

        // Stable sort: edges with equal order keep their persisted insertion
        // order, which is what breaks ties among several default edges.
        for edges in out_edges.values_mut() {
            edges.sort_by_key(|e| e.order);
        }

        Ok(Self {
            graph,
            question_index,
            out_edges,
        })
    }

    /// The underlying stored graph.
    pub fn graph(&self) -> &QuestionGraph {
        &self.graph
    }

    /// Look up a question by ID.
    pub fn question(&self, id: Uuid) -> Option<&Question> {
        self.question_index.get(&id).map(|&i| &self.graph.questions[i])
    }

    /// Whether the graph contains the question.
    pub fn contains(&self, id: Uuid) -> bool {
        self.question_index.contains_key(&id)
    }

    /// All questions, reachable or not.
    pub fn questions(&self) -> &[Question] {
        &self.graph.questions
    }

    /// The entry point question.
    pub fn first_question(&self) -> &Question {
        // Presence checked at materialization.
        &self.graph.questions[self.question_index[&self.graph.first_question]]
    }

    /// Ordered outgoing edges of a question.
    pub fn out_edges(&self, id: Uuid) -> &[OutEdge] {
        self.out_edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of outgoing edges of a question.
    pub fn out_degree(&self, id: Uuid) -> usize {
        self.out_edges(id).len()
    }

    /// Single-hop successors of a question, in edge order. A sanity-check
    /// helper; answer-driven resolution lives in the session service.
    pub fn successors(&self, id: Uuid) -> Vec<&Question> {
        self.out_edges(id)
            .iter()
            .filter_map(|e| self.question(e.next_question))
            .collect()
    }

    /// Every question reachable from the entry point, answers ignored.
    pub fn reachable_questions(&self) -> Vec<&Question> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        let mut reachable = Vec::new();

        seen.insert(self.graph.first_question);
        queue.push_back(self.graph.first_question);
        while let Some(id) = queue.pop_front() {
            if let Some(q) = self.question(id) {
                reachable.push(q);
            }
            for edge in self.out_edges(id) {
                if seen.insert(edge.next_question) {
                    queue.push_back(edge.next_question);
                }
            }
        }
        reachable
    }

    /// Reachable questions with no outgoing edges — where a fully-answered
    /// path may terminate.
    pub fn endpoint_questions(&self) -> Vec<&Question> {
        self.reachable_questions()
            .into_iter()
            .filter(|q| self.out_degree(q.id) == 0)
            .collect()
    }
}
