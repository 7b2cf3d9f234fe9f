//! SessionService — resolves "next question" against real answers, computes
//! the answered path, and decides freeze-readiness.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{GraphError, SessionError};
use crate::graph::{Question, QuestionGraphService};

use super::model::{Answer, Session};

/// The current path through a session's graph, derived from its answers.
#[derive(Debug, Clone)]
pub struct SessionPath {
    /// Questions along the current path, in walk order. Always a connected
    /// path starting at the graph's first question.
    pub reachable: Vec<Uuid>,
    /// Path questions with no answer yet: empty, or exactly the pending
    /// element the walk stopped at.
    pub unanswered: Vec<Uuid>,
    /// Latest answer per answered path question, in path order.
    pub answered: Vec<Answer>,
    /// Whether the path is complete and the session may be frozen.
    pub can_freeze: bool,
}

/// One answered question prepared for downstream consumers.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResponseEntry {
    /// The question's analysis key, when it has one.
    pub key: Option<String>,
    /// The question's short label.
    pub label: String,
    /// The authoritative answer payload.
    pub payload: Value,
}

/// Composes a session, its materialized graph, and its answers.
///
/// All computations here are pure functions over already-fetched data; the
/// caller is responsible for providing a consistent snapshot and for
/// persisting any state transition.
pub struct SessionService {
    session: Session,
    graph: QuestionGraphService,
    answers: Vec<Answer>,
}

impl SessionService {
    pub fn new(session: Session, graph: QuestionGraphService, answers: Vec<Answer>) -> Self {
        Self {
            session,
            graph,
            answers,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn graph(&self) -> &QuestionGraphService {
        &self.graph
    }

    /// Latest answer per question: a fold over time-ordered answers, so the
    /// most recent correction wins while older rows stay untouched.
    pub fn latest_answers_by_question(&self) -> HashMap<Uuid, &Answer> {
        let mut ordered: Vec<&Answer> = self.answers.iter().collect();
        ordered.sort_by_key(|a| a.created_at);

        let mut latest = HashMap::new();
        for answer in ordered {
            latest.insert(answer.question_id, answer);
        }
        latest
    }

    /// Resolve the next question given a question and an answer payload.
    ///
    /// Outgoing edges are tried in persisted custom order: the first edge
    /// whose choice payload exactly equals the answer payload wins; if none
    /// match, the first default edge (no choice) wins; with neither, the
    /// question is terminal. Pure and side-effect-free.
    pub fn next_question(&self, question_id: Uuid, payload: &Value) -> Option<&Question> {
        let edges = self.graph.out_edges(question_id);

        let matched = edges
            .iter()
            .find(|e| e.choice_payload.as_ref() == Some(payload))
            .or_else(|| edges.iter().find(|e| e.choice_payload.is_none()));

        matched.and_then(|e| self.graph.question(e.next_question))
    }

    /// Walk the graph forward from the first question, following answers.
    ///
    /// Stops at the first question without an answer (the pending element) or
    /// at a terminal question. The walk only advances over answered
    /// questions, so a structurally cyclic graph cannot loop on its own;
    /// revisiting a question means the caller re-resolved the same answers
    /// around a cycle, which is outside the contract and raises.
    pub fn path(&self) -> Result<SessionPath, GraphError> {
        let latest = self.latest_answers_by_question();

        let mut seen = HashSet::new();
        let mut reachable = Vec::new();
        let mut unanswered = Vec::new();
        let mut answered = Vec::new();

        let mut current = self.graph.first_question().id;
        loop {
            if !seen.insert(current) {
                return Err(GraphError::CycleDetected {
                    question_id: current,
                });
            }
            reachable.push(current);

            let Some(answer) = latest.get(&current) else {
                unanswered.push(current);
                break;
            };
            answered.push((*answer).clone());

            match self.next_question(current, &answer.payload) {
                Some(next) => current = next.id,
                None => break,
            }
        }

        let can_freeze = unanswered.is_empty();
        debug!(
            session = %self.session.uuid,
            reachable = reachable.len(),
            answered = answered.len(),
            can_freeze,
            "resolved session path"
        );

        Ok(SessionPath {
            reachable,
            unanswered,
            answered,
            can_freeze,
        })
    }

    /// Whether every question on the current path has an answer.
    pub fn can_freeze(&self) -> Result<bool, GraphError> {
        Ok(self.path()?.can_freeze)
    }

    /// Latest path answers keyed by the questions' analysis keys. Questions
    /// without a key are skipped; answers to questions no longer on the path
    /// (orphaned by a corrected decision) drop out.
    pub fn answers_by_analysis_key(&self) -> Result<HashMap<String, Answer>, GraphError> {
        let mut by_key = HashMap::new();
        for answer in self.path()?.answered {
            let Some(question) = self.graph.question(answer.question_id) else {
                continue;
            };
            if let Some(key) = &question.analysis_key {
                by_key.insert(key.clone(), answer);
            }
        }
        Ok(by_key)
    }

    /// Ordered `{key, label, payload}` records for the answered path — the
    /// shape handed to exporters assembling a submission.
    pub fn collect_responses(&self) -> Result<Vec<ResponseEntry>, GraphError> {
        let mut entries = Vec::new();
        for answer in self.path()?.answered {
            let Some(question) = self.graph.question(answer.question_id) else {
                continue;
            };
            entries.push(ResponseEntry {
                key: question.analysis_key.clone(),
                label: question.short_label.clone(),
                payload: answer.payload,
            });
        }
        Ok(entries)
    }

    /// Mark the session's answers final.
    ///
    /// Rejected while the path is incomplete; freezing an already-frozen
    /// session is a no-op success. A frozen session's path is fixed at
    /// freeze time and never recomputed against a live graph.
    pub fn freeze(&mut self) -> Result<&Session, SessionError> {
        if self.session.frozen {
            return Ok(&self.session);
        }
        let can_freeze = self.can_freeze().map_err(|e| {
            debug!(session = %self.session.uuid, error = %e, "path resolution failed during freeze");
            SessionError::CannotFreeze {
                uuid: self.session.uuid,
            }
        })?;
        if !can_freeze {
            return Err(SessionError::CannotFreeze {
                uuid: self.session.uuid,
            });
        }
        self.session.frozen = true;
        debug!(session = %self.session.uuid, "session frozen");
        Ok(&self.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Choice, FieldType, GraphBuilder, Question, QuestionGraph};
    use serde_json::json;

    fn service_for(graph: QuestionGraph, answers: Vec<Answer>) -> SessionService {
        let mut session = Session::new(Uuid::new_v4());
        session.started_at = Some(chrono::Utc::now());
        let answers = answers
            .into_iter()
            .map(|mut a| {
                a.session_uuid = session.uuid;
                a
            })
            .collect();
        SessionService::new(
            session,
            QuestionGraphService::materialize(graph, 50).unwrap(),
            answers,
        )
    }

    fn answer(question_id: Uuid, payload: Value) -> Answer {
        Answer::new(Uuid::nil(), question_id, payload)
    }

    /// q1 --"yes"--> q2, q1 --"no"--> q3, both rejoining at q4.
    fn branching_graph() -> (QuestionGraph, [Uuid; 4]) {
        let mut b = GraphBuilder::new("branching");
        let yes = Choice::new(json!("yes"));
        let no = Choice::new(json!("no"));
        let (yes_id, no_id) = (yes.id, no.id);
        let q1 = b.question(
            Question::new("Continue?", FieldType::PlainText)
                .required()
                .with_choice(yes)
                .with_choice(no),
        );
        let q2 = b.question(Question::new("Great, why?", FieldType::PlainText).required());
        let q3 = b.question(Question::new("What went wrong?", FieldType::PlainText).required());
        let q4 = b.question(Question::new("Anything else?", FieldType::PlainText).required());
        b.connect_via(q1, q2, yes_id);
        b.connect_via(q1, q3, no_id);
        b.connect(q2, q4);
        b.connect(q3, q4);
        (b.build(), [q1, q2, q3, q4])
    }

    #[test]
    fn next_question_matches_choice_edges() {
        let (graph, [q1, q2, q3, _]) = branching_graph();
        let service = service_for(graph, vec![]);
        assert_eq!(service.next_question(q1, &json!("yes")).unwrap().id, q2);
        assert_eq!(service.next_question(q1, &json!("no")).unwrap().id, q3);
    }

    #[test]
    fn next_question_without_match_or_default_is_terminal() {
        let (graph, [q1, _, _, q4]) = branching_graph();
        let service = service_for(graph, vec![]);
        // "maybe" matches no choice and q1 has no default edge.
        assert!(service.next_question(q1, &json!("maybe")).is_none());
        // q4 has no outgoing edges at all.
        for payload in [json!("yes"), json!(1), Value::Null] {
            assert!(service.next_question(q4, &payload).is_none());
        }
    }

    #[test]
    fn next_question_falls_back_to_first_default() {
        let mut b = GraphBuilder::new("defaults");
        let c = Choice::new(json!("special"));
        let c_id = c.id;
        let q1 = b.question(Question::new("q1", FieldType::PlainText).with_choice(c));
        let q2 = b.question(Question::new("q2", FieldType::PlainText));
        let q3 = b.question(Question::new("q3", FieldType::PlainText));
        let q4 = b.question(Question::new("q4", FieldType::PlainText));
        b.connect_via(q1, q2, c_id);
        b.connect(q1, q3); // first default
        b.connect(q1, q4); // second default
        let service = service_for(b.build(), vec![]);

        assert_eq!(service.next_question(q1, &json!("special")).unwrap().id, q2);
        assert_eq!(service.next_question(q1, &json!("anything")).unwrap().id, q3);
    }

    #[test]
    fn matching_choice_edge_wins_over_earlier_default() {
        // Default edge persisted before the conditional one: an exact match
        // still beats it; only non-matching payloads take the default.
        let mut b = GraphBuilder::new("order");
        let c = Choice::new(json!("deep"));
        let c_id = c.id;
        let q1 = b.question(Question::new("q1", FieldType::PlainText).with_choice(c));
        let q2 = b.question(Question::new("q2", FieldType::PlainText));
        let q3 = b.question(Question::new("q3", FieldType::PlainText));
        b.connect(q1, q2);
        b.connect_via(q1, q3, c_id);
        let service = service_for(b.build(), vec![]);

        assert_eq!(service.next_question(q1, &json!("deep")).unwrap().id, q3);
        assert_eq!(service.next_question(q1, &json!("other")).unwrap().id, q2);
    }

    #[test]
    fn reordering_default_edges_changes_tie_break() {
        let build = |flipped: bool| {
            let mut b = GraphBuilder::new("ties");
            let q1 = b.question(Question::new("q1", FieldType::PlainText));
            let q2 = b.question(Question::new("q2", FieldType::PlainText));
            let q3 = b.question(Question::new("q3", FieldType::PlainText));
            b.connect_ordered(q1, q2, None, if flipped { 1 } else { 0 });
            b.connect_ordered(q1, q3, None, if flipped { 0 } else { 1 });
            (service_for(b.build(), vec![]), q1, q2, q3)
        };
        let (service, q1, q2, _) = build(false);
        assert_eq!(service.next_question(q1, &json!("x")).unwrap().id, q2);
        let (service, q1, _, q3) = build(true);
        assert_eq!(service.next_question(q1, &json!("x")).unwrap().id, q3);
    }

    #[test]
    fn latest_answer_per_question_wins() {
        let (graph, [q1, _, q3, _]) = branching_graph();
        let mut first = answer(q1, json!("yes"));
        let mut second = answer(q1, json!("no"));
        first.created_at = chrono::Utc::now() - chrono::Duration::minutes(5);
        second.created_at = chrono::Utc::now();
        let service = service_for(graph, vec![second.clone(), first]);

        let latest = service.latest_answers_by_question();
        assert_eq!(latest[&q1].payload, json!("no"));

        // The corrected answer steers the path to q3.
        let path = service.path().unwrap();
        assert_eq!(path.reachable[1], q3);
    }

    #[test]
    fn path_with_no_answers_stops_at_first_question() {
        let (graph, [q1, ..]) = branching_graph();
        let service = service_for(graph, vec![]);
        let path = service.path().unwrap();
        assert_eq!(path.reachable, vec![q1]);
        assert_eq!(path.unanswered, vec![q1]);
        assert!(path.answered.is_empty());
        assert!(!path.can_freeze);
    }

    #[test]
    fn path_follows_answers_and_stops_at_pending() {
        let (graph, [q1, q2, _, q4]) = branching_graph();
        let service = service_for(graph, vec![answer(q1, json!("yes"))]);
        let path = service.path().unwrap();
        assert_eq!(path.reachable, vec![q1, q2]);
        assert_eq!(path.unanswered, vec![q2]);
        assert_eq!(path.answered.len(), 1);
        assert!(!path.can_freeze);
        assert!(!path.reachable.contains(&q4));
    }

    #[test]
    fn fully_answered_path_can_freeze() {
        let (graph, [q1, q2, _, q4]) = branching_graph();
        let service = service_for(
            graph,
            vec![
                answer(q1, json!("yes")),
                answer(q2, json!("quick response")),
                answer(q4, json!("no")),
            ],
        );
        let path = service.path().unwrap();
        assert_eq!(path.reachable, vec![q1, q2, q4]);
        assert!(path.unanswered.is_empty());
        assert!(path.can_freeze);
    }

    #[test]
    fn optional_question_closed_with_null_payload() {
        let mut b = GraphBuilder::new("optional-tail");
        let q1 = b.question(Question::new("q1", FieldType::PlainText).required());
        let q2 = b.question(Question::new("q2 (optional)", FieldType::PlainText));
        b.connect(q1, q2);
        let graph = b.build();

        let unanswered_tail = service_for(graph.clone(), vec![answer(q1, json!("done"))]);
        assert!(!unanswered_tail.can_freeze().unwrap());

        let closed = service_for(
            graph,
            vec![answer(q1, json!("done")), answer(q2, Value::Null)],
        );
        assert!(closed.can_freeze().unwrap());
    }

    #[test]
    fn unreachable_answer_does_not_unlock_freeze() {
        let (graph, [q1, q2, ..]) = branching_graph();
        // q2 answered but q1 (the decision) is not: path stops at q1.
        let service = service_for(graph, vec![answer(q2, json!("orphan"))]);
        let path = service.path().unwrap();
        assert_eq!(path.reachable, vec![q1]);
        assert!(path.answered.is_empty());
        assert!(!path.can_freeze);
    }

    #[test]
    fn answered_cycle_is_detected() {
        let mut b = GraphBuilder::new("cycle");
        let q1 = b.question(Question::new("q1", FieldType::PlainText));
        let q2 = b.question(Question::new("q2", FieldType::PlainText));
        b.connect(q1, q2);
        b.connect(q2, q1);
        let service = service_for(
            b.build(),
            vec![answer(q1, json!("a")), answer(q2, json!("b"))],
        );
        assert!(matches!(
            service.path(),
            Err(GraphError::CycleDetected { question_id }) if question_id == q1
        ));
    }

    #[test]
    fn unanswered_cycle_walks_fine() {
        // Structural cycles are legal; the walk stops at the first
        // unanswered question long before revisiting anything.
        let mut b = GraphBuilder::new("cycle");
        let q1 = b.question(Question::new("q1", FieldType::PlainText));
        let q2 = b.question(Question::new("q2", FieldType::PlainText));
        b.connect(q1, q2);
        b.connect(q2, q1);
        let service = service_for(b.build(), vec![answer(q1, json!("a"))]);
        let path = service.path().unwrap();
        assert_eq!(path.reachable, vec![q1, q2]);
        assert_eq!(path.unanswered, vec![q2]);
    }

    #[test]
    fn answers_by_analysis_key_follows_current_path() {
        let mut b = GraphBuilder::new("keyed");
        let yes = Choice::new(json!(true));
        let no = Choice::new(json!(false));
        let (yes_id, no_id) = (yes.id, no.id);
        let q1 = b.question(
            Question::new("Satisfied?", FieldType::Boolean)
                .required()
                .with_analysis_key("satisfied")
                .with_choice(yes)
                .with_choice(no)
                .enforce_choices(),
        );
        let q_happy = b.question(
            Question::new("Why satisfied?", FieldType::PlainText).with_analysis_key("reason_satisfied"),
        );
        let q_unhappy = b.question(
            Question::new("Why unsatisfied?", FieldType::PlainText)
                .with_analysis_key("reason_unsatisfied"),
        );
        b.connect_via(q1, q_happy, yes_id);
        b.connect_via(q1, q_unhappy, no_id);
        let graph = b.build();

        let service = service_for(
            graph,
            vec![
                // Stale answer on the happy branch from before the correction.
                answer(q_happy, json!("all good")),
                answer(q1, json!(false)),
                answer(q_unhappy, json!("took too long")),
            ],
        );

        let by_key = service.answers_by_analysis_key().unwrap();
        assert_eq!(by_key["satisfied"].payload, json!(false));
        assert_eq!(by_key["reason_unsatisfied"].payload, json!("took too long"));
        assert!(!by_key.contains_key("reason_satisfied"));
    }

    #[test]
    fn collect_responses_keeps_path_order() {
        let (graph, [q1, q2, _, q4]) = branching_graph();
        let service = service_for(
            graph,
            vec![
                answer(q4, json!("nothing else")),
                answer(q1, json!("yes")),
                answer(q2, json!("fast")),
            ],
        );
        let responses = service.collect_responses().unwrap();
        let labels: Vec<&str> = responses.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Continue?", "Great, why?", "Anything else?"]);
        assert_eq!(responses[0].payload, json!("yes"));
    }

    #[test]
    fn freeze_rejected_while_incomplete() {
        let (graph, [q1, ..]) = branching_graph();
        let mut service = service_for(graph, vec![answer(q1, json!("yes"))]);
        assert!(matches!(
            service.freeze(),
            Err(SessionError::CannotFreeze { .. })
        ));
        assert!(!service.session().frozen);
    }

    #[test]
    fn freeze_complete_path_then_idempotent() {
        let (graph, [q1, q2, _, q4]) = branching_graph();
        let mut service = service_for(
            graph,
            vec![
                answer(q1, json!("yes")),
                answer(q2, json!("fast")),
                answer(q4, json!("no")),
            ],
        );
        assert!(service.freeze().unwrap().frozen);
        // Second freeze is a no-op success.
        assert!(service.freeze().unwrap().frozen);
    }

    #[test]
    fn terminal_decision_answer_ends_path() {
        // "maybe" matches no edge: q1 becomes terminal and, being answered,
        // the session is freezable right there.
        let (graph, [q1, ..]) = branching_graph();
        let service = service_for(graph, vec![answer(q1, json!("maybe"))]);
        let path = service.path().unwrap();
        assert_eq!(path.reachable, vec![q1]);
        assert!(path.can_freeze);
    }
}
