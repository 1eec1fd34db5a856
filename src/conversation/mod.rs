//! Conversation loop.
//!
//! A strictly sequential state machine: resolve a query, invoke the agent,
//! render the answer, repeat until the user quits. Agent failures are not
//! handled here; they propagate to the caller, which owns session cleanup.

mod input;

pub use input::{InputResolver, Query};

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;

use tokio::io::AsyncBufRead;
use tracing::debug;

use crate::agent::{AgentHandle, Message};
use crate::error::Error;
use crate::ui::ConsoleStyle;
use crate::Result;

const FAREWELL: &str = "Goodbye!";

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub query: String,
    /// Content of the last message the agent returned.
    pub result_text: String,
    /// Content of the second-to-last message when it came from a tool.
    pub tool_output: Option<String>,
}

impl ConversationTurn {
    /// Read the answer, and any tool output right before it, from an agent
    /// result. With fewer than two messages there is nothing to check.
    pub fn from_messages(query: String, messages: &[Message]) -> Self {
        let result_text = messages.last().map(|m| m.content.clone()).unwrap_or_default();

        let tool_output = if messages.len() >= 2 {
            let preceding = &messages[messages.len() - 2];
            preceding.is_tool_output().then(|| preceding.content.clone())
        } else {
            None
        };

        Self {
            query,
            result_text,
            tool_output,
        }
    }
}

/// Where the loop is.
#[derive(Debug)]
enum State {
    AwaitingInput,
    InvokingAgent(String),
    RenderingResult(ConversationTurn),
    Ended,
}

/// What a finished conversation leaves behind.
#[derive(Debug, Default)]
pub struct ConversationSummary {
    pub turns: Vec<ConversationTurn>,
    /// Samples never used.
    pub remaining_samples: VecDeque<String>,
}

/// Drives one interactive conversation against an agent.
pub struct ConversationLoop<W> {
    agent: Arc<dyn AgentHandle>,
    thread_id: String,
    verbose: bool,
    style: ConsoleStyle,
    samples: VecDeque<String>,
    out: W,
}

impl<W: Write> ConversationLoop<W> {
    pub fn new(agent: Arc<dyn AgentHandle>, thread_id: impl Into<String>, out: W) -> Self {
        Self {
            agent,
            thread_id: thread_id.into(),
            verbose: false,
            style: ConsoleStyle::plain(),
            samples: VecDeque::new(),
            out,
        }
    }

    /// Echo tool output before each answer.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn style(mut self, style: ConsoleStyle) -> Self {
        self.style = style;
        self
    }

    pub fn samples(mut self, samples: impl IntoIterator<Item = String>) -> Self {
        self.samples = samples.into_iter().collect();
        self
    }

    /// Run until the user quits or the agent fails.
    pub async fn run<R: AsyncBufRead + Unpin>(mut self, input: R) -> Result<ConversationSummary> {
        let mut resolver = InputResolver::new(input, self.style);
        let mut turns = Vec::new();

        self.print_intro()?;

        let mut state = State::AwaitingInput;
        loop {
            state = match state {
                State::AwaitingInput => {
                    match resolver.resolve_query(&mut self.samples, &mut self.out).await? {
                        Query::Typed(text) | Query::Sample(text) => State::InvokingAgent(text),
                        Query::Terminate => State::Ended,
                    }
                }
                State::InvokingAgent(query) => {
                    let messages = self.invoke(&query).await?;
                    State::RenderingResult(ConversationTurn::from_messages(query, &messages))
                }
                State::RenderingResult(turn) => {
                    self.render(&turn)?;
                    turns.push(turn);
                    State::AwaitingInput
                }
                State::Ended => break,
            };
        }

        writeln!(self.out, "{}", self.style.answer(FAREWELL))?;
        self.out.flush()?;
        resolver.close();

        Ok(ConversationSummary {
            turns,
            remaining_samples: self.samples,
        })
    }

    fn print_intro(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "\nConversation started. Type \"quit\" or \"q\" to end the conversation."
        )?;
        if !self.samples.is_empty() {
            writeln!(self.out, "\nSample queries (press Enter to use the next one):")?;
            for sample in &self.samples {
                writeln!(self.out, "{}", self.style.hint(&format!("- {sample}")))?;
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    async fn invoke(&self, query: &str) -> Result<Vec<Message>> {
        debug!("Invoking agent on thread {}", self.thread_id);

        let spinner = self.style.thinking_spinner();
        let result = self
            .agent
            .invoke(vec![Message::user(query)], &self.thread_id)
            .await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        result.map_err(Error::invocation)
    }

    fn render(&mut self, turn: &ConversationTurn) -> Result<()> {
        if self.verbose {
            if let Some(tool_output) = &turn.tool_output {
                writeln!(self.out, "{}", self.style.hint(tool_output))?;
                writeln!(self.out)?;
            }
        }
        writeln!(self.out, "{}", self.style.answer(&turn.result_text))?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers `ECHO:<input>`, optionally after a tool message, and records
    /// every thread id it sees.
    #[derive(Default)]
    struct EchoAgent {
        thread_ids: Mutex<Vec<String>>,
        tool_output: Option<String>,
        fail_on: Option<String>,
    }

    impl EchoAgent {
        fn with_tool_output(output: &str) -> Self {
            Self {
                tool_output: Some(output.to_string()),
                ..Default::default()
            }
        }

        fn failing_on(query: &str) -> Self {
            Self {
                fail_on: Some(query.to_string()),
                ..Default::default()
            }
        }

        fn thread_ids(&self) -> Vec<String> {
            self.thread_ids.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AgentHandle for EchoAgent {
        async fn invoke(&self, messages: Vec<Message>, thread_id: &str) -> Result<Vec<Message>> {
            self.thread_ids.lock().unwrap().push(thread_id.to_string());

            let input = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if self.fail_on.as_deref() == Some(input.as_str()) {
                return Err(Error::Llm("model unavailable".to_string()));
            }

            let mut result = messages;
            if let Some(output) = &self.tool_output {
                result.push(Message::tool_result("call-1", "lookup", output.clone()));
            }
            result.push(Message::assistant(format!("ECHO:{input}")));
            Ok(result)
        }
    }

    async fn run_loop(
        agent: Arc<EchoAgent>,
        input: &str,
        samples: &[&str],
        verbose: bool,
    ) -> (Result<ConversationSummary>, String) {
        let mut out = Vec::new();
        let result = ConversationLoop::new(agent, "thread-1", &mut out)
            .verbose(verbose)
            .samples(samples.iter().map(|s| s.to_string()))
            .run(input.as_bytes())
            .await;
        (result, String::from_utf8(out).unwrap())
    }

    fn answers(summary: &ConversationSummary) -> Vec<&str> {
        summary.turns.iter().map(|t| t.result_text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_echo_scenario_with_sample() {
        let agent = Arc::new(EchoAgent::default());
        let (result, out) = run_loop(agent, "hello\n\nquit\n", &["sample-A"], false).await;
        let summary = result.unwrap();

        assert_eq!(answers(&summary), vec!["ECHO:hello", "ECHO:sample-A"]);
        assert!(summary.remaining_samples.is_empty());
        assert!(out.contains("Sample Query: sample-A"));
        assert!(out.trim_end().ends_with(FAREWELL));
    }

    #[tokio::test]
    async fn test_k_samples_are_used_in_order() {
        let agent = Arc::new(EchoAgent::default());
        let (result, out) = run_loop(agent, "\n\n\n\nquit\n", &["a", "b", "c"], false).await;
        let summary = result.unwrap();

        assert_eq!(answers(&summary), vec!["ECHO:a", "ECHO:b", "ECHO:c"]);
        assert_eq!(out.matches("Please type a query").count(), 1);
    }

    #[tokio::test]
    async fn test_quit_variants_end_without_invoking() {
        for quit in ["QUIT", "Quit", "q", "Q", "  quit "] {
            let agent = Arc::new(EchoAgent::default());
            let (result, out) = run_loop(agent.clone(), &format!("{quit}\n"), &[], false).await;

            assert!(result.unwrap().turns.is_empty());
            assert!(agent.thread_ids().is_empty());
            assert!(out.contains(FAREWELL));
        }
    }

    #[tokio::test]
    async fn test_thread_id_is_stable_across_turns() {
        let agent = Arc::new(EchoAgent::default());
        let (result, _) = run_loop(agent.clone(), "one\ntwo\nthree\nq\n", &[], false).await;
        result.unwrap();

        let ids = agent.thread_ids();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| id == "thread-1"));
    }

    #[tokio::test]
    async fn test_tool_output_only_rendered_when_verbose() {
        let agent = Arc::new(EchoAgent::with_tool_output("TOOL-RESULT"));
        let (result, out) = run_loop(agent, "lookup\nq\n", &[], false).await;
        assert_eq!(result.unwrap().turns[0].tool_output.as_deref(), Some("TOOL-RESULT"));
        assert!(!out.contains("TOOL-RESULT"));

        let agent = Arc::new(EchoAgent::with_tool_output("TOOL-RESULT"));
        let (result, out) = run_loop(agent, "lookup\nq\n", &[], true).await;
        result.unwrap();
        let tool_at = out.find("TOOL-RESULT").unwrap();
        let answer_at = out.find("ECHO:lookup").unwrap();
        assert!(tool_at < answer_at);
    }

    #[tokio::test]
    async fn test_agent_failure_propagates_as_invocation_error() {
        let agent = Arc::new(EchoAgent::failing_on("boom"));
        let (result, out) = run_loop(agent, "fine\nboom\nnever\n", &[], false).await;

        assert!(matches!(result, Err(Error::Invocation(_))));
        assert!(out.contains("ECHO:fine"));
        assert!(!out.contains(FAREWELL));
    }

    #[tokio::test]
    async fn test_end_of_input_ends_conversation() {
        let agent = Arc::new(EchoAgent::default());
        let (result, out) = run_loop(agent, "hello\n", &[], false).await;

        assert_eq!(answers(&result.unwrap()), vec!["ECHO:hello"]);
        assert!(out.contains(FAREWELL));
    }

    #[test]
    fn test_turn_from_short_results() {
        let turn = ConversationTurn::from_messages("q".into(), &[]);
        assert_eq!(turn.result_text, "");
        assert_eq!(turn.tool_output, None);

        let turn = ConversationTurn::from_messages("q".into(), &[Message::assistant("only")]);
        assert_eq!(turn.result_text, "only");
        assert_eq!(turn.tool_output, None);
    }

    #[test]
    fn test_turn_ignores_non_tool_predecessor() {
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        let turn = ConversationTurn::from_messages("hi".into(), &messages);
        assert_eq!(turn.tool_output, None);
    }
}
