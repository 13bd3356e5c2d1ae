use std::sync::Arc;

use tracing::{debug, warn};

use tailor_core::domain::profile::{ListField, Profile, UserId};
use tailor_core::errors::{ApplicationError, DomainError};
use tailor_db::repositories::ProfileRepository;

use crate::model::{AgentMessage, ChatModel};
use crate::mutator::ProfileMutator;

/// How many pending questions are surfaced ahead of a turn. Older questions
/// win; the rest wait for a later turn.
const OPEN_QUESTION_LIMIT: usize = 3;

const PREAMBLE_INTRO: &str =
    "Before we continue, here are open questions from earlier that still need answers:";

const SYSTEM_PROMPT: &str = "You're a helpful assistant for updating job search profiles. \
     Use tools to update fields based on user's natural language input. \
     When you need information the user has not provided, add a question to the \
     pending_questions list with AddToListField. When the user answers a pending question, \
     save the answer to the matching field and remove exactly that question from \
     pending_questions with RemoveFromListField.";

pub const STORE_UNAVAILABLE_REPLY: &str =
    "Sorry, I can't reach your profile right now. Please try again in a few minutes.";

pub const AGENT_FAILURE_REPLY: &str =
    "Sorry, something went wrong while handling your message. Please try again.";

/// Orchestrates one conversational turn: load the profile, surface pending
/// questions, run the tool loop, relay the model's final text.
pub struct AgentRuntime {
    model: Arc<dyn ChatModel>,
    store: Arc<dyn ProfileRepository>,
    mutator: ProfileMutator,
    max_tool_rounds: u32,
}

impl AgentRuntime {
    pub fn new(
        model: Arc<dyn ChatModel>,
        store: Arc<dyn ProfileRepository>,
        max_tool_rounds: u32,
    ) -> Self {
        let mutator = ProfileMutator::new(store.clone());
        Self { model, store, mutator, max_tool_rounds }
    }

    /// Run one turn for the given user. Blank inputs are the only errors the
    /// caller sees; store and model failures degrade into fixed apologetic
    /// replies so the conversation surface never throws.
    pub async fn process_turn(
        &self,
        user_id: &UserId,
        message: &str,
    ) -> Result<String, DomainError> {
        if user_id.0.trim().is_empty() {
            return Err(DomainError::BlankUserId);
        }
        if message.trim().is_empty() {
            return Err(DomainError::BlankMessage);
        }

        match self.run_workflow(user_id, message).await {
            Ok(reply) => Ok(reply),
            Err(ApplicationError::Store(detail)) => {
                warn!(
                    event_name = "turn.store_unavailable",
                    user_id = %user_id,
                    detail,
                    "profile store unavailable during turn"
                );
                Ok(STORE_UNAVAILABLE_REPLY.to_string())
            }
            Err(ApplicationError::Domain(error)) => Err(error),
            Err(error) => {
                warn!(
                    event_name = "turn.agent_failure",
                    user_id = %user_id,
                    error = %error,
                    "agent runtime failed during turn"
                );
                Ok(AGENT_FAILURE_REPLY.to_string())
            }
        }
    }

    async fn run_workflow(
        &self,
        user_id: &UserId,
        message: &str,
    ) -> Result<String, ApplicationError> {
        let profile = self
            .store
            .find_by_id(user_id)
            .await
            .map_err(|err| ApplicationError::Store(err.to_string()))?
            .unwrap_or_else(|| Profile::empty(user_id.clone()));

        let pending = profile.list_field(ListField::PendingQuestions);
        debug!(
            event_name = "turn.start",
            user_id = %user_id,
            pending_questions = pending.len(),
            "starting agent turn"
        );

        let mut transcript = vec![
            AgentMessage::System(SYSTEM_PROMPT.to_string()),
            AgentMessage::User(effective_input(pending, message)),
        ];

        for round in 0..self.max_tool_rounds {
            let turn = self
                .model
                .converse(&transcript)
                .await
                .map_err(|err| ApplicationError::AgentRuntime(err.to_string()))?;

            if turn.commands.is_empty() {
                let reply = turn.reply.unwrap_or_default();
                debug!(
                    event_name = "turn.complete",
                    user_id = %user_id,
                    rounds = round + 1,
                    "agent turn complete"
                );
                return Ok(reply);
            }

            let mut results = Vec::with_capacity(turn.commands.len());
            for call in &turn.commands {
                let output = match &call.parsed {
                    Ok(command) => self
                        .mutator
                        .apply(user_id, command)
                        .await
                        .map_err(|err| ApplicationError::Store(err.to_string()))?,
                    Err(error) => {
                        warn!(
                            event_name = "turn.tool_rejected",
                            user_id = %user_id,
                            tool = %call.tool_name,
                            error = %error,
                            "rejected tool call"
                        );
                        format!("Error: {error}")
                    }
                };
                results.push(AgentMessage::CommandResult {
                    call_id: call.call_id.clone(),
                    output,
                });
            }

            transcript.push(AgentMessage::Assistant {
                reply: turn.reply,
                commands: turn.commands,
            });
            transcript.extend(results);
        }

        Err(ApplicationError::AgentRuntime(format!(
            "model did not finish within {} tool rounds",
            self.max_tool_rounds
        )))
    }
}

fn effective_input(pending_questions: &[String], message: &str) -> String {
    if pending_questions.is_empty() {
        return message.to_string();
    }

    let mut input = String::from(PREAMBLE_INTRO);
    input.push('\n');
    for question in pending_questions.iter().take(OPEN_QUESTION_LIMIT) {
        input.push_str("- ");
        input.push_str(question);
        input.push('\n');
    }
    input.push('\n');
    input.push_str(message);
    input
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use tailor_core::domain::profile::{ListField, ListTarget, Profile, UserId};
    use tailor_core::errors::DomainError;
    use tailor_db::repositories::{
        InMemoryProfileRepository, ProfileRepository, RepositoryError,
        UnavailableProfileRepository,
    };

    use super::{AgentRuntime, AGENT_FAILURE_REPLY, STORE_UNAVAILABLE_REPLY};
    use crate::model::{AgentMessage, AgentTurn, ChatModel, CommandCall, LlmError};
    use crate::tools;

    struct ScriptedModel {
        turns: Mutex<VecDeque<Result<AgentTurn, LlmError>>>,
        transcripts: Mutex<Vec<Vec<AgentMessage>>>,
    }

    impl ScriptedModel {
        fn with_script(turns: Vec<Result<AgentTurn, LlmError>>) -> Self {
            Self { turns: Mutex::new(turns.into()), transcripts: Mutex::new(Vec::new()) }
        }

        async fn call_count(&self) -> usize {
            self.transcripts.lock().await.len()
        }

        async fn transcript(&self, index: usize) -> Vec<AgentMessage> {
            self.transcripts.lock().await[index].clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatModel for ScriptedModel {
        async fn converse(&self, transcript: &[AgentMessage]) -> Result<AgentTurn, LlmError> {
            self.transcripts.lock().await.push(transcript.to_vec());
            self.turns.lock().await.pop_front().unwrap_or_else(|| {
                Ok(AgentTurn { reply: Some("done".to_string()), commands: Vec::new() })
            })
        }
    }

    struct WriteFailingStore {
        inner: InMemoryProfileRepository,
    }

    #[async_trait::async_trait]
    impl ProfileRepository for WriteFailingStore {
        async fn find_by_id(&self, id: &UserId) -> Result<Option<Profile>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn save(&self, _profile: Profile) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("simulated write failure".to_string()))
        }
    }

    fn user() -> UserId {
        UserId("casey@example.com".to_string())
    }

    fn call(id: &str, tool_name: &str, arguments: &str) -> CommandCall {
        CommandCall {
            call_id: id.to_string(),
            tool_name: tool_name.to_string(),
            arguments: arguments.to_string(),
            parsed: tools::decode(tool_name, arguments),
        }
    }

    fn tool_turn(calls: Vec<CommandCall>) -> Result<AgentTurn, LlmError> {
        Ok(AgentTurn { reply: None, commands: calls })
    }

    fn reply_turn(reply: &str) -> Result<AgentTurn, LlmError> {
        Ok(AgentTurn { reply: Some(reply.to_string()), commands: Vec::new() })
    }

    fn user_content(message: &AgentMessage) -> &str {
        match message {
            AgentMessage::User(content) => content,
            other => panic!("expected user message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn applies_listed_skills_in_message_order() {
        let store = Arc::new(InMemoryProfileRepository::default());
        let model = Arc::new(ScriptedModel::with_script(vec![
            tool_turn(vec![
                call("c1", "AddToListField", r#"{"field_name": "skills", "item": "budgeting"}"#),
                call("c2", "AddToListField", r#"{"field_name": "skills", "item": "Tableau"}"#),
                call("c3", "AddToListField", r#"{"field_name": "skills", "item": "Excel"}"#),
            ]),
            reply_turn("Added budgeting, Tableau, and Excel to your skills."),
        ]));
        let runtime = AgentRuntime::new(model.clone(), store.clone(), 8);

        let reply = runtime
            .process_turn(&user(), "Add budgeting, Tableau, and Excel to my skills.")
            .await
            .expect("turn succeeds");

        assert_eq!(reply, "Added budgeting, Tableau, and Excel to your skills.");
        let profile = store.find_by_id(&user()).await.expect("find").expect("record exists");
        assert_eq!(profile.skills, vec!["budgeting", "Tableau", "Excel"]);

        let second_transcript = model.transcript(1).await;
        assert_eq!(second_transcript.len(), 6);
        assert!(matches!(second_transcript[2], AgentMessage::Assistant { .. }));
        assert!(matches!(second_transcript[5], AgentMessage::CommandResult { .. }));
    }

    #[tokio::test]
    async fn relays_the_model_reply_verbatim() {
        let store = Arc::new(InMemoryProfileRepository::default());
        let model =
            Arc::new(ScriptedModel::with_script(vec![reply_turn("Got it, nothing to change!")]));
        let runtime = AgentRuntime::new(model, store, 8);

        let reply = runtime.process_turn(&user(), "Just saying hi.").await.expect("turn succeeds");

        assert_eq!(reply, "Got it, nothing to change!");
    }

    #[tokio::test]
    async fn store_outage_degrades_without_invoking_the_model() {
        let model = Arc::new(ScriptedModel::with_script(Vec::new()));
        let runtime =
            AgentRuntime::new(model.clone(), Arc::new(UnavailableProfileRepository), 8);

        let reply = runtime
            .process_turn(&user(), "Add Excel to my skills.")
            .await
            .expect("turn degrades, does not fail");

        assert_eq!(reply, STORE_UNAVAILABLE_REPLY);
        assert_eq!(model.call_count().await, 0);
    }

    #[tokio::test]
    async fn preamble_surfaces_only_the_first_three_pending_questions() {
        let store = Arc::new(InMemoryProfileRepository::default());
        let mut profile = Profile::empty(user());
        for question in [
            "Which industries interest you?",
            "What is your current location?",
            "What is your highest degree?",
            "What salary range do you expect?",
        ] {
            profile.add_to_list(&ListTarget::Known(ListField::PendingQuestions), question);
        }
        store.save(profile).await.expect("seed profile");

        let model = Arc::new(ScriptedModel::with_script(vec![reply_turn("Noted!")]));
        let runtime = AgentRuntime::new(model.clone(), store, 8);

        runtime
            .process_turn(&user(), "Please update my headline.")
            .await
            .expect("turn succeeds");

        let transcript = model.transcript(0).await;
        let content = user_content(&transcript[1]);

        assert!(content.starts_with(super::PREAMBLE_INTRO));
        assert!(content.contains("- Which industries interest you?"));
        assert!(content.contains("- What is your current location?"));
        assert!(content.contains("- What is your highest degree?"));
        assert!(!content.contains("What salary range do you expect?"));
        assert!(content.ends_with("\n\nPlease update my headline."));
    }

    #[tokio::test]
    async fn no_pending_questions_leaves_the_input_untouched() {
        let store = Arc::new(InMemoryProfileRepository::default());
        let model = Arc::new(ScriptedModel::with_script(vec![reply_turn("Hello!")]));
        let runtime = AgentRuntime::new(model.clone(), store, 8);

        runtime.process_turn(&user(), "Set my location to Berlin.").await.expect("turn succeeds");

        let transcript = model.transcript(0).await;
        assert_eq!(user_content(&transcript[1]), "Set my location to Berlin.");
    }

    #[tokio::test]
    async fn answered_pending_question_can_be_cleared_by_the_model() {
        let store = Arc::new(InMemoryProfileRepository::default());
        let mut profile = Profile::empty(user());
        profile.add_to_list(
            &ListTarget::Known(ListField::PendingQuestions),
            "What is your current location?",
        );
        store.save(profile).await.expect("seed profile");

        let model = Arc::new(ScriptedModel::with_script(vec![
            tool_turn(vec![
                call("c1", "SetStringField", r#"{"field_name": "location", "value": "Berlin"}"#),
                call(
                    "c2",
                    "RemoveFromListField",
                    r#"{"field_name": "pending_questions", "item": "What is your current location?"}"#,
                ),
            ]),
            reply_turn("Thanks, your location is saved."),
        ]));
        let runtime = AgentRuntime::new(model, store.clone(), 8);

        let reply =
            runtime.process_turn(&user(), "I live in Berlin.").await.expect("turn succeeds");

        assert_eq!(reply, "Thanks, your location is saved.");
        let profile = store.find_by_id(&user()).await.expect("find").expect("record exists");
        assert_eq!(profile.location, "Berlin");
        assert!(profile.pending_questions.is_empty());
    }

    #[tokio::test]
    async fn model_failure_keeps_committed_commands() {
        let store = Arc::new(InMemoryProfileRepository::default());
        let model = Arc::new(ScriptedModel::with_script(vec![
            tool_turn(vec![call(
                "c1",
                "AddToListField",
                r#"{"field_name": "skills", "item": "Excel"}"#,
            )]),
            Err(LlmError::MalformedResponse("response had no choices".to_string())),
        ]));
        let runtime = AgentRuntime::new(model, store.clone(), 8);

        let reply = runtime
            .process_turn(&user(), "Add Excel to my skills.")
            .await
            .expect("turn degrades, does not fail");

        assert_eq!(reply, AGENT_FAILURE_REPLY);
        let profile = store.find_by_id(&user()).await.expect("find").expect("record exists");
        assert_eq!(profile.skills, vec!["Excel"]);
    }

    #[tokio::test]
    async fn mid_turn_store_failure_degrades_to_store_reply() {
        let store = Arc::new(WriteFailingStore { inner: InMemoryProfileRepository::default() });
        let model = Arc::new(ScriptedModel::with_script(vec![tool_turn(vec![call(
            "c1",
            "AddToListField",
            r#"{"field_name": "skills", "item": "Excel"}"#,
        )])]));
        let runtime = AgentRuntime::new(model.clone(), store, 8);

        let reply = runtime
            .process_turn(&user(), "Add Excel to my skills.")
            .await
            .expect("turn degrades, does not fail");

        assert_eq!(reply, STORE_UNAVAILABLE_REPLY);
        assert_eq!(model.call_count().await, 1);
    }

    #[tokio::test]
    async fn undecodable_tool_calls_are_reported_back_to_the_model() {
        let store = Arc::new(InMemoryProfileRepository::default());
        let model = Arc::new(ScriptedModel::with_script(vec![
            tool_turn(vec![call("c1", "DeleteProfile", "{}")]),
            reply_turn("I can't do that."),
        ]));
        let runtime = AgentRuntime::new(model.clone(), store.clone(), 8);

        let reply = runtime
            .process_turn(&user(), "Delete everything.")
            .await
            .expect("turn succeeds");

        assert_eq!(reply, "I can't do that.");
        let transcript = model.transcript(1).await;
        let last = transcript.last().expect("command result present");
        match last {
            AgentMessage::CommandResult { output, .. } => {
                assert!(output.starts_with("Error:"), "unexpected output: {output}");
            }
            other => panic!("expected command result, got {other:?}"),
        }
        assert_eq!(store.find_by_id(&user()).await.expect("find"), None);
    }

    #[tokio::test]
    async fn exhausting_tool_rounds_degrades_gracefully() {
        let store = Arc::new(InMemoryProfileRepository::default());
        let model = Arc::new(ScriptedModel::with_script(vec![
            tool_turn(vec![call(
                "c1",
                "AddToListField",
                r#"{"field_name": "skills", "item": "Excel"}"#,
            )]),
            tool_turn(vec![call(
                "c2",
                "AddToListField",
                r#"{"field_name": "skills", "item": "Tableau"}"#,
            )]),
        ]));
        let runtime = AgentRuntime::new(model.clone(), store.clone(), 2);

        let reply = runtime
            .process_turn(&user(), "Keep adding skills.")
            .await
            .expect("turn degrades, does not fail");

        assert_eq!(reply, AGENT_FAILURE_REPLY);
        assert_eq!(model.call_count().await, 2);
        let profile = store.find_by_id(&user()).await.expect("find").expect("record exists");
        assert_eq!(profile.skills, vec!["Excel", "Tableau"]);
    }

    #[tokio::test]
    async fn blank_inputs_are_rejected_before_any_work() {
        let model = Arc::new(ScriptedModel::with_script(Vec::new()));
        let runtime = AgentRuntime::new(
            model.clone(),
            Arc::new(InMemoryProfileRepository::default()),
            8,
        );

        let blank_user = runtime.process_turn(&UserId(String::new()), "hello").await;
        assert_eq!(blank_user, Err(DomainError::BlankUserId));

        let blank_message = runtime.process_turn(&user(), "   ").await;
        assert_eq!(blank_message, Err(DomainError::BlankMessage));

        assert_eq!(model.call_count().await, 0);
    }
}
