//! Input resolver: console lines plus the sample queue become the next query.

use std::collections::VecDeque;
use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::ui::ConsoleStyle;
use crate::Result;

const PROMPT: &str = "Query: ";
const SAMPLE_PROMPT: &str = "Sample Query: ";
const BLANK_INPUT_HINT: &str = "Please type a query, or \"quit\" or \"q\" to exit";

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Text the user typed, trimmed.
    Typed(String),
    /// A sample query substituted for a blank line.
    Sample(String),
    /// `quit`, `q` or end of input.
    Terminate,
}

fn is_quit(input: &str) -> bool {
    input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("q")
}

/// Reads console lines one at a time.
pub struct InputResolver<R> {
    reader: R,
    buf: Vec<u8>,
    style: ConsoleStyle,
}

impl<R: AsyncBufRead + Unpin> InputResolver<R> {
    pub fn new(reader: R, style: ConsoleStyle) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            style,
        }
    }

    /// Next line without its terminator, or `None` at end of input.
    /// Bytes that are not UTF-8 become U+FFFD.
    async fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    /// Prompt until the user types something, a sample can be substituted,
    /// or input ends.
    pub async fn resolve_query<W: Write>(
        &mut self,
        samples: &mut VecDeque<String>,
        out: &mut W,
    ) -> Result<Query> {
        loop {
            write!(out, "{}{}", self.style.prompt(PROMPT), self.style.begin_input_echo())?;
            out.flush()?;

            let line = self.next_line().await;
            write!(out, "{}", self.style.end_input_echo())?;
            let Some(line) = line? else {
                debug!("Console input closed");
                writeln!(out)?;
                return Ok(Query::Terminate);
            };

            let input = line.trim();
            if is_quit(input) {
                return Ok(Query::Terminate);
            }

            if !input.is_empty() {
                return Ok(Query::Typed(input.to_string()));
            }

            if let Some(sample) = samples.pop_front() {
                write!(out, "{}", self.style.erase_previous_line())?;
                writeln!(out, "{}", self.style.prompt(&format!("{SAMPLE_PROMPT}{sample}")))?;
                return Ok(Query::Sample(sample));
            }

            writeln!(out, "{}", self.style.hint(BLANK_INPUT_HINT))?;
        }
    }

    /// Release the underlying reader.
    pub fn close(self) {
        drop(self.reader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(items: &[&str]) -> VecDeque<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn resolve(input: &[u8], queue: &mut VecDeque<String>) -> (Query, String) {
        let mut resolver = InputResolver::new(input, ConsoleStyle::plain());
        let mut out = Vec::new();
        let query = resolver.resolve_query(queue, &mut out).await.unwrap();
        (query, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_typed_query_is_trimmed() {
        let (query, out) = resolve(b"  what time is it?  \n", &mut VecDeque::new()).await;
        assert_eq!(query, Query::Typed("what time is it?".to_string()));
        assert_eq!(out, "Query: ");
    }

    #[tokio::test]
    async fn test_quit_variants_terminate() {
        for input in ["quit\n", "QUIT\n", "Quit\n", "q\n", "Q\n", "  q  \n"] {
            let (query, _) = resolve(input.as_bytes(), &mut VecDeque::new()).await;
            assert_eq!(query, Query::Terminate, "input {input:?}");
        }
    }

    #[tokio::test]
    async fn test_quit_prefix_is_a_query() {
        let (query, _) = resolve(b"quitting time\n", &mut VecDeque::new()).await;
        assert_eq!(query, Query::Typed("quitting time".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let mut resolver = InputResolver::new(&b"caf\xe9\nq\n"[..], ConsoleStyle::plain());
        let mut queue = VecDeque::new();
        let mut out = Vec::new();

        assert_eq!(
            resolver.resolve_query(&mut queue, &mut out).await.unwrap(),
            Query::Typed("caf\u{FFFD}".to_string())
        );
        assert_eq!(resolver.resolve_query(&mut queue, &mut out).await.unwrap(), Query::Terminate);
    }

    #[tokio::test]
    async fn test_crlf_and_unterminated_last_line() {
        let mut resolver = InputResolver::new(&b"hello\r\nbye"[..], ConsoleStyle::plain());
        let mut queue = VecDeque::new();
        let mut out = Vec::new();

        assert_eq!(
            resolver.resolve_query(&mut queue, &mut out).await.unwrap(),
            Query::Typed("hello".to_string())
        );
        assert_eq!(
            resolver.resolve_query(&mut queue, &mut out).await.unwrap(),
            Query::Typed("bye".to_string())
        );
        assert_eq!(resolver.resolve_query(&mut queue, &mut out).await.unwrap(), Query::Terminate);
    }

    #[tokio::test]
    async fn test_colored_input_echo_is_reset_after_read() {
        let style = ConsoleStyle::colored();
        let mut resolver = InputResolver::new(&b"hello\n"[..], style);
        let mut out = Vec::new();

        resolver.resolve_query(&mut VecDeque::new(), &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        let begin = out.find(&style.begin_input_echo()).unwrap();
        assert!(out.ends_with(style.end_input_echo()));
        assert!(begin < out.len() - style.end_input_echo().len());
    }

    #[tokio::test]
    async fn test_end_of_input_terminates() {
        let (query, _) = resolve(b"", &mut VecDeque::new()).await;
        assert_eq!(query, Query::Terminate);
    }

    #[tokio::test]
    async fn test_blank_line_takes_front_sample() {
        let mut queue = samples(&["first", "second"]);
        let (query, out) = resolve(b"\n", &mut queue).await;

        assert_eq!(query, Query::Sample("first".to_string()));
        assert_eq!(queue, samples(&["second"]));
        assert_eq!(out, "Query: Sample Query: first\n");
    }

    #[tokio::test]
    async fn test_colored_sample_erases_blank_line() {
        let mut resolver = InputResolver::new(&b"\n"[..], ConsoleStyle::colored());
        let mut queue = samples(&["first"]);
        let mut out = Vec::new();

        resolver.resolve_query(&mut queue, &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("\x1b[1A\x1b[2K"));
        assert!(out.contains("Sample Query: first"));
    }

    #[tokio::test]
    async fn test_blank_lines_without_samples_reprompt() {
        let blanks = "\n".repeat(10_000);
        let input = format!("{blanks}hello\n");
        let (query, out) = resolve(input.as_bytes(), &mut VecDeque::new()).await;

        assert_eq!(query, Query::Typed("hello".to_string()));
        assert_eq!(out.matches(BLANK_INPUT_HINT).count(), 10_000);
        assert_eq!(out.matches(PROMPT).count(), 10_001);
    }

    #[tokio::test]
    async fn test_resolver_reads_one_line_per_call() {
        let reader = tokio_test::io::Builder::new()
            .read(b"one\n")
            .read(b"\n")
            .read(b"quit\n")
            .build();
        let reader = tokio::io::BufReader::new(reader);
        let mut resolver = InputResolver::new(reader, ConsoleStyle::plain());
        let mut queue = samples(&["sample-A"]);
        let mut out = Vec::new();

        assert_eq!(
            resolver.resolve_query(&mut queue, &mut out).await.unwrap(),
            Query::Typed("one".to_string())
        );
        assert_eq!(
            resolver.resolve_query(&mut queue, &mut out).await.unwrap(),
            Query::Sample("sample-A".to_string())
        );
        assert_eq!(resolver.resolve_query(&mut queue, &mut out).await.unwrap(), Query::Terminate);
        assert!(queue.is_empty());
        resolver.close();
    }
}
