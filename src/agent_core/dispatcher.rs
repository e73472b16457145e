//! Tool dispatcher: drives the model/tool round trip for each question.
//!
//! One question is at most three model turns: the opening call with the
//! tool schema, an optional tool round, and a follow-up. A failed tool
//! round earns exactly one repair cycle; a second failure is surfaced to
//! the user verbatim rather than looping.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use super::errors::AgentError;
use super::transcript::{ToolInvocation, Transcript, Turn};
use crate::inference::client::ModelGateway;
use crate::inference::types::{FunctionDefinition, ModelReply, ToolCallRequest, ToolDefinition};
use crate::store::executor::{QueryExecutor, QueryResult};
use crate::store::guard::{self, Verdict};
use crate::store::tickets::{Ticket, TicketOrigin, TicketPriority, TicketSink};

// ─── Tool surface ────────────────────────────────────────────────────────────

/// Tool the model calls to query the catalog.
pub const ASK_DATABASE: &str = "ask_database";

/// Tool the model calls to escalate to a human.
pub const CREATE_SUPPORT_TICKET: &str = "create_support_ticket";

/// System turn opening every session.
pub const SYSTEM_PROMPT: &str = "\
You are TableTalk, a helpful assistant that answers questions about a media catalog \
by querying its SQLite database.
Rules:
- Generate safe, single-statement, read-only SQL (SELECT ... or WITH ... SELECT) against the titles table.
- The director column holds comma-separated lists; to count or group by individual directors, expand it with a json_each CTE over the value converted to a JSON array, trimming each element.
- Apply sensible LIMIT values (for example 10 or 20) unless the user asks for more.
- If results look incorrect or incomplete, or the user explicitly asks for a human, suggest creating a support ticket with the provided tool.
Provide concise answers in markdown, summarising the results.";

/// Column reference embedded in the query tool's schema.
const TITLES_SCHEMA: &str = "\
Table: titles
Columns:
- show_id (TEXT): unique identifier
- type (TEXT): 'Movie' or 'TV Show'
- title (TEXT)
- director (TEXT): comma-separated names, may be empty
- \"cast\" (TEXT): comma-separated names, quote the column in SQL
- country (TEXT)
- date_added (TEXT)
- release_year (INTEGER)
- rating (TEXT): audience rating code
- duration (TEXT): minutes or seasons
- listed_in (TEXT): comma-separated genres
- description (TEXT)";

/// Tool schema advertised on the opening call of each question.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: ASK_DATABASE.to_string(),
                description: "Answer questions about the media catalog by running a read-only \
                              SQL query. The input must be a fully formed SQL statement."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": format!(
                                "Single read-only SQL statement extracting the information \
                                 needed to answer the user's question, against this schema:\n\
                                 {TITLES_SCHEMA}\n\
                                 Return plain SQL text, not JSON."
                            ),
                        }
                    },
                    "required": ["query"],
                }),
            },
        },
        ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: CREATE_SUPPORT_TICKET.to_string(),
                description: "Create a support ticket for human follow-up when the data looks \
                              incorrect or incomplete, or when the user explicitly asks for \
                              human help."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "summary": {
                            "type": "string",
                            "description": "Short summary of the issue.",
                        },
                        "description": {
                            "type": "string",
                            "description": "Detailed description of the observed problem with context.",
                        },
                        "priority": {
                            "type": "string",
                            "enum": ["low", "medium", "high"],
                            "default": "medium",
                            "description": "Priority of the ticket.",
                        }
                    },
                    "required": ["summary", "description"],
                }),
            },
        },
    ]
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Everything one answered question produced.
#[derive(Debug, Clone)]
pub struct QuestionOutcome {
    /// Final natural-language answer.
    pub answer: String,
    /// Statement behind the answer, when a query round succeeded.
    pub executed_sql: Option<String>,
    /// Rows behind the answer, when a query round succeeded.
    pub result: Option<QueryResult>,
    /// Ticket the model filed, if any.
    pub ticket: Option<Ticket>,
}

/// Result of one tool round.
enum ToolOutcome {
    /// Tool ran; payload is folded into the transcript for the model.
    Success { payload: Value },
    /// Recoverable failure; the hint is folded back for one repair cycle.
    Failure { hint: String, class: &'static str },
}

/// Arguments for [`ASK_DATABASE`].
#[derive(Debug, Deserialize)]
struct AskDatabaseArgs {
    query: String,
}

/// Arguments for [`CREATE_SUPPORT_TICKET`].
#[derive(Debug, Deserialize)]
struct CreateTicketArgs {
    summary: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    priority: TicketPriority,
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

/// Routes model tool requests to the catalog and the ticket sink.
///
/// Shared across sessions: the gateway and stores are behind `Arc`, and the
/// per-session state lives in each session's [`Transcript`].
pub struct Dispatcher {
    gateway: Arc<dyn ModelGateway>,
    executor: Arc<QueryExecutor>,
    tickets: Arc<TicketSink>,
}

impl Dispatcher {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        executor: Arc<QueryExecutor>,
        tickets: Arc<TicketSink>,
    ) -> Self {
        Self {
            gateway,
            executor,
            tickets,
        }
    }

    /// Answer one user question.
    ///
    /// The opening call advertises the tool schema. After a successful tool
    /// round the follow-up call advertises none, forcing text. After a
    /// failed round the follow-up also advertises none, but one more tool
    /// request is honored so the model can submit a corrected call; a second
    /// failure becomes the answer text verbatim.
    pub async fn ask(
        &self,
        transcript: &mut Transcript,
        question: &str,
    ) -> Result<QuestionOutcome, AgentError> {
        let session_id = transcript.session_id().to_string();
        tracing::info!(session_id = %session_id, question, "question received");

        transcript.append(Turn::user(question));

        let tools = tool_definitions();
        let mut reply = self
            .gateway
            .send(&transcript.to_chat_messages(), Some(tools.as_slice()))
            .await?;

        let mut outcome = QuestionOutcome {
            answer: String::new(),
            executed_sql: None,
            result: None,
            ticket: None,
        };
        let mut repair_used = false;
        let mut forcing_answer = false;

        loop {
            match reply {
                ModelReply::Answer(text) => {
                    transcript.append(Turn::assistant(text.clone()));
                    tracing::info!(
                        session_id = %session_id,
                        turns = transcript.len(),
                        "question answered"
                    );
                    outcome.answer = text;
                    return Ok(outcome);
                }
                ModelReply::ToolRequest(request) => {
                    if forcing_answer {
                        tracing::error!(
                            session_id = %session_id,
                            tool = %request.name,
                            "tool requested on a call that advertised no tools"
                        );
                        return Err(AgentError::UnknownTool { name: request.name });
                    }

                    tracing::info!(
                        session_id = %session_id,
                        tool = %request.name,
                        "tool requested"
                    );
                    transcript.append(Turn::tool_call(ToolInvocation {
                        id: request.id.clone(),
                        name: request.name.clone(),
                        arguments: request.arguments.clone(),
                    }));

                    match self.execute_tool(&session_id, &request, &mut outcome)? {
                        ToolOutcome::Success { payload } => {
                            transcript.append(Turn::tool_result(
                                &request.id,
                                &request.name,
                                &payload,
                            ));
                            tracing::info!(
                                session_id = %session_id,
                                tool = %request.name,
                                "tool round succeeded"
                            );
                            forcing_answer = true;
                        }
                        ToolOutcome::Failure { hint, class } => {
                            transcript.append(Turn::tool_result(
                                &request.id,
                                &request.name,
                                &Value::String(hint.clone()),
                            ));
                            if repair_used {
                                tracing::warn!(
                                    session_id = %session_id,
                                    class,
                                    "second tool failure, surfacing to the user"
                                );
                                transcript.append(Turn::assistant(hint.clone()));
                                outcome.answer = hint;
                                return Ok(outcome);
                            }
                            repair_used = true;
                            tracing::warn!(
                                session_id = %session_id,
                                class,
                                "tool round failed, folding a repair turn"
                            );
                        }
                    }

                    reply = self
                        .gateway
                        .send(&transcript.to_chat_messages(), None)
                        .await?;
                }
            }
        }
    }

    /// Run one tool request, producing a payload to fold or a recoverable
    /// failure hint. Only a tool outside the schema is fatal here.
    fn execute_tool(
        &self,
        session_id: &str,
        request: &ToolCallRequest,
        outcome: &mut QuestionOutcome,
    ) -> Result<ToolOutcome, AgentError> {
        match request.name.as_str() {
            ASK_DATABASE => Ok(self.run_ask_database(session_id, &request.arguments, outcome)),
            CREATE_SUPPORT_TICKET => {
                Ok(self.run_create_ticket(session_id, &request.arguments, outcome))
            }
            _ => {
                tracing::error!(
                    session_id,
                    tool = %request.name,
                    "model requested a tool outside the schema"
                );
                Err(AgentError::UnknownTool {
                    name: request.name.clone(),
                })
            }
        }
    }

    fn run_ask_database(
        &self,
        session_id: &str,
        raw_arguments: &str,
        outcome: &mut QuestionOutcome,
    ) -> ToolOutcome {
        let args: AskDatabaseArgs = match serde_json::from_str(raw_arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "malformed ask_database arguments");
                return ToolOutcome::Failure {
                    hint: format!(
                        "The tool arguments could not be parsed: {e}. Reply with a valid JSON \
                         object containing a \"query\" string."
                    ),
                    class: "malformed_arguments",
                };
            }
        };

        let normalized = match guard::validate(&args.query) {
            Verdict::Accepted { normalized } => {
                tracing::info!(session_id, query = %normalized, "guard accepted query");
                normalized
            }
            Verdict::Rejected { reason } => {
                tracing::warn!(
                    session_id,
                    reason = reason.as_str(),
                    query = %args.query,
                    "guard rejected query"
                );
                return ToolOutcome::Failure {
                    hint: reason.hint(),
                    class: reason.as_str(),
                };
            }
        };

        match self.executor.run(&normalized) {
            Ok(result) => {
                let payload = serde_json::to_value(&result).unwrap_or(Value::Null);
                outcome.executed_sql = Some(normalized);
                outcome.result = Some(result);
                ToolOutcome::Success { payload }
            }
            Err(crate::store::StoreError::QueryRejected { reason }) => ToolOutcome::Failure {
                hint: reason.hint(),
                class: reason.as_str(),
            },
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(session_id, error = %message, "query execution failed");
                ToolOutcome::Failure {
                    hint: format!(
                        "{message}. Submit a corrected single SELECT statement for the titles \
                         table."
                    ),
                    class: "execution_error",
                }
            }
        }
    }

    fn run_create_ticket(
        &self,
        session_id: &str,
        raw_arguments: &str,
        outcome: &mut QuestionOutcome,
    ) -> ToolOutcome {
        let args: CreateTicketArgs = match serde_json::from_str(raw_arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "malformed create_support_ticket arguments");
                return ToolOutcome::Failure {
                    hint: format!(
                        "The tool arguments could not be parsed: {e}. Reply with a valid JSON \
                         object containing \"summary\" and \"description\" strings."
                    ),
                    class: "malformed_arguments",
                };
            }
        };

        match self
            .tickets
            .create(&args.summary, &args.description, args.priority, TicketOrigin::Agent)
        {
            Ok(ticket) => {
                let payload = serde_json::to_value(&ticket).unwrap_or(Value::Null);
                outcome.ticket = Some(ticket);
                ToolOutcome::Success { payload }
            }
            Err(e) => {
                tracing::warn!(session_id, error = %e, "ticket creation failed");
                ToolOutcome::Failure {
                    hint: format!("{e}. Tell the user the ticket could not be filed right now."),
                    class: "ticket_error",
                }
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rusqlite::Connection;
    use tempfile::TempDir;

    use crate::inference::errors::GatewayError;
    use crate::inference::types::{ChatMessage, Role};

    /// Replays a scripted sequence of replies and records whether each call
    /// advertised tools.
    struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<ModelReply, GatewayError>>>,
        advertised: Mutex<Vec<bool>>,
    }

    impl ScriptedGateway {
        fn new(replies: Vec<Result<ModelReply, GatewayError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                advertised: Mutex::new(Vec::new()),
            }
        }

        /// Per call: did the request carry a tool schema?
        fn advertised(&self) -> Vec<bool> {
            self.advertised.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn send(
            &self,
            _messages: &[ChatMessage],
            tools: Option<&[ToolDefinition]>,
        ) -> Result<ModelReply, GatewayError> {
            self.advertised.lock().unwrap().push(tools.is_some());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("gateway script exhausted")
        }
    }

    fn answer(text: &str) -> Result<ModelReply, GatewayError> {
        Ok(ModelReply::Answer(text.into()))
    }

    fn tool_request(name: &str, arguments: &str) -> Result<ModelReply, GatewayError> {
        Ok(ModelReply::ToolRequest(ToolCallRequest {
            id: "call_1".into(),
            name: name.into(),
            arguments: arguments.into(),
        }))
    }

    fn ask_database(query: &str) -> Result<ModelReply, GatewayError> {
        tool_request(ASK_DATABASE, &json!({ "query": query }).to_string())
    }

    /// Seed a catalog with `rows` titles and wire a dispatcher around it.
    fn dispatcher_with(gateway: Arc<ScriptedGateway>, rows: usize) -> (TempDir, Dispatcher) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("titles.db");
        let mut conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE titles (
                show_id TEXT PRIMARY KEY,
                type TEXT,
                title TEXT,
                director TEXT,
                release_year INTEGER
            );",
        )
        .unwrap();
        let tx = conn.transaction().unwrap();
        {
            let mut insert = tx
                .prepare("INSERT INTO titles (show_id, type, title) VALUES (?1, ?2, ?3)")
                .unwrap();
            for i in 0..rows {
                insert
                    .execute(rusqlite::params![
                        format!("s{i}"),
                        "Movie",
                        format!("Title {i}")
                    ])
                    .unwrap();
            }
        }
        tx.commit().unwrap();
        drop(conn);

        let executor = Arc::new(QueryExecutor::open(&db_path).unwrap());
        let tickets = Arc::new(TicketSink::new(dir.path().join("tickets.csv")));
        let dispatcher = Dispatcher::new(gateway, executor, tickets);
        (dir, dispatcher)
    }

    #[tokio::test]
    async fn test_direct_answer_needs_no_tool_round() {
        let gateway = Arc::new(ScriptedGateway::new(vec![answer(
            "The catalog holds movies and TV shows.",
        )]));
        let (_dir, dispatcher) = dispatcher_with(gateway.clone(), 3);
        let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);

        let outcome = dispatcher
            .ask(&mut transcript, "What kind of data is this?")
            .await
            .unwrap();

        assert_eq!(outcome.answer, "The catalog holds movies and TV shows.");
        assert!(outcome.executed_sql.is_none());
        assert!(outcome.ticket.is_none());
        assert_eq!(gateway.advertised(), vec![true]);
        assert_eq!(transcript.len(), 3); // system, user, assistant
    }

    #[tokio::test]
    async fn test_count_question_runs_query_and_answers() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ask_database("SELECT COUNT(*) FROM titles"),
            answer("There are 8807 titles in the catalog."),
        ]));
        let (_dir, dispatcher) = dispatcher_with(gateway.clone(), 8807);
        let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);

        let outcome = dispatcher
            .ask(&mut transcript, "How many titles are in the catalog?")
            .await
            .unwrap();

        assert_eq!(outcome.answer, "There are 8807 titles in the catalog.");
        assert_eq!(
            outcome.executed_sql.as_deref(),
            Some("SELECT COUNT(*) FROM titles")
        );
        let result = outcome.result.unwrap();
        assert_eq!(result.rows[0]["COUNT(*)"], 8807);
        assert!(!result.truncated);

        // Opening call advertises tools, the follow-up does not.
        assert_eq!(gateway.advertised(), vec![true, false]);
        let roles: Vec<Role> = transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Assistant
            ]
        );
    }

    #[tokio::test]
    async fn test_mutation_attempt_becomes_refusal() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ask_database("DROP TABLE titles"),
            answer("I can only read the catalog, so I cannot delete anything."),
        ]));
        let (_dir, dispatcher) = dispatcher_with(gateway.clone(), 3);
        let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);

        let outcome = dispatcher
            .ask(&mut transcript, "Please delete every title.")
            .await
            .unwrap();

        // The refusal comes from the model; nothing was executed.
        assert!(outcome.answer.contains("cannot delete"));
        assert!(outcome.executed_sql.is_none());
        assert!(outcome.result.is_none());
        assert_eq!(gateway.advertised(), vec![true, false]);

        let tool_turn = &transcript.turns()[3];
        assert_eq!(tool_turn.role, Role::Tool);
        assert!(tool_turn.content.contains("DROP"), "hint names the keyword");
    }

    #[tokio::test]
    async fn test_repaired_query_succeeds() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ask_database("SELECT wrong_column FROM titles"),
            ask_database("SELECT COUNT(*) AS total FROM titles"),
            answer("There are 5 titles."),
        ]));
        let (_dir, dispatcher) = dispatcher_with(gateway.clone(), 5);
        let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);

        let outcome = dispatcher
            .ask(&mut transcript, "How many titles are there?")
            .await
            .unwrap();

        assert_eq!(outcome.answer, "There are 5 titles.");
        assert_eq!(
            outcome.executed_sql.as_deref(),
            Some("SELECT COUNT(*) AS total FROM titles")
        );
        // Repair and follow-up calls both advertise no tools.
        assert_eq!(gateway.advertised(), vec![true, false, false]);
    }

    #[tokio::test]
    async fn test_second_failure_surfaced_verbatim() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ask_database("SELECT wrong_column FROM titles"),
            ask_database("SELECT also_missing FROM titles"),
        ]));
        let (_dir, dispatcher) = dispatcher_with(gateway.clone(), 5);
        let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);

        let outcome = dispatcher
            .ask(&mut transcript, "How many titles are there?")
            .await
            .unwrap();

        // No third gateway call; the failure text is the answer.
        assert_eq!(gateway.advertised(), vec![true, false]);
        assert!(outcome.answer.contains("also_missing"));
        assert!(outcome.executed_sql.is_none());
        let last = transcript.turns().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, outcome.answer);
    }

    #[tokio::test]
    async fn test_malformed_arguments_get_repair_turn() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            tool_request(ASK_DATABASE, "{not valid json"),
            answer("Could you rephrase the question?"),
        ]));
        let (_dir, dispatcher) = dispatcher_with(gateway.clone(), 3);
        let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);

        let outcome = dispatcher
            .ask(&mut transcript, "How many titles?")
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Could you rephrase the question?");
        assert_eq!(gateway.advertised(), vec![true, false]);
        let tool_turn = &transcript.turns()[3];
        assert!(tool_turn.content.contains("could not be parsed"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fatal_without_another_call() {
        let gateway = Arc::new(ScriptedGateway::new(vec![tool_request(
            "escalate_to_human",
            "{}",
        )]));
        let (_dir, dispatcher) = dispatcher_with(gateway.clone(), 3);
        let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);

        let result = dispatcher.ask(&mut transcript, "Get me a person.").await;

        match result {
            Err(AgentError::UnknownTool { name }) => assert_eq!(name, "escalate_to_human"),
            other => panic!("expected unknown tool error, got {other:?}"),
        }
        assert_eq!(gateway.advertised(), vec![true]);
    }

    #[tokio::test]
    async fn test_tool_request_after_success_is_fatal() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ask_database("SELECT COUNT(*) AS total FROM titles"),
            ask_database("SELECT COUNT(*) AS total FROM titles"),
        ]));
        let (_dir, dispatcher) = dispatcher_with(gateway.clone(), 3);
        let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);

        let result = dispatcher.ask(&mut transcript, "How many titles?").await;

        assert!(matches!(result, Err(AgentError::UnknownTool { .. })));
        assert_eq!(gateway.advertised(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_ticket_request_files_ticket() {
        let arguments = json!({
            "summary": "Release year looks wrong",
            "description": "A 1994 film shows release_year 2094.",
            "priority": "high",
        })
        .to_string();
        let gateway = Arc::new(ScriptedGateway::new(vec![
            tool_request(CREATE_SUPPORT_TICKET, &arguments),
            answer("I filed a high priority ticket for the data team."),
        ]));
        let (dir, dispatcher) = dispatcher_with(gateway.clone(), 3);
        let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);

        let outcome = dispatcher
            .ask(&mut transcript, "That year is wrong, please report it.")
            .await
            .unwrap();

        let ticket = outcome.ticket.unwrap();
        assert_eq!(ticket.priority, TicketPriority::High);
        assert_eq!(ticket.origin, TicketOrigin::Agent);
        assert!(ticket.ticket_id.starts_with("T-"));

        let csv = std::fs::read_to_string(dir.path().join("tickets.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2); // header + one ticket
        assert!(csv.contains("Release year looks wrong"));
    }

    #[tokio::test]
    async fn test_ticket_priority_defaults_to_medium() {
        let arguments = json!({
            "summary": "Missing director",
            "description": "Several titles have empty director fields.",
        })
        .to_string();
        let gateway = Arc::new(ScriptedGateway::new(vec![
            tool_request(CREATE_SUPPORT_TICKET, &arguments),
            answer("Filed."),
        ]));
        let (_dir, dispatcher) = dispatcher_with(gateway.clone(), 3);
        let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);

        let outcome = dispatcher
            .ask(&mut transcript, "Report the missing directors.")
            .await
            .unwrap();

        assert_eq!(outcome.ticket.unwrap().priority, TicketPriority::Medium);
    }

    #[tokio::test]
    async fn test_gateway_error_propagates() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Err(GatewayError::HttpError {
            status: 401,
            body: "bad key".into(),
        })]));
        let (_dir, dispatcher) = dispatcher_with(gateway.clone(), 3);
        let mut transcript = Transcript::with_system_prompt(SYSTEM_PROMPT);

        let result = dispatcher.ask(&mut transcript, "How many titles?").await;

        assert!(matches!(result, Err(AgentError::Gateway(_))));
    }
}
