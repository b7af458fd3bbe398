use std::path::PathBuf;
use std::sync::Arc;

use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::chat::copy::{
    APP_TAGLINE, APP_TITLE, HELP_TEXT, INPUT_PLACEHOLDER, MODEL_LABEL, PENDING_INDICATOR,
    SUGGESTIONS, USER_LABEL,
};
use crate::chat::{
    Attachment, ChatSnapshot, Part, Role, SendOutcome, SendRejection, SessionController,
    SessionState, Turn, UserInput,
};

/// One line of shell input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Blank line.
    Noop,
    Send(String),
    /// Zero-based index into the suggestion list.
    Suggest(usize),
    Attach(PathBuf),
    Detach,
    Help,
    Quit,
}

#[derive(Debug, Snafu)]
pub enum CommandError {
    #[snafu(display("unknown command `/{command}`, type /help"))]
    UnknownCommand { command: String },
    #[snafu(display("/attach needs a file path"))]
    MissingPath,
    #[snafu(display("choose a suggestion between 1 and {count}"))]
    InvalidSuggestion { count: usize },
}

#[derive(Debug, Snafu)]
pub enum ShellError {
    #[snafu(display("failed to read input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to write output on `{stage}`: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub fn parse_command(line: &str) -> Result<ShellCommand, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ShellCommand::Noop);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(ShellCommand::Send(line.to_string()));
    };

    let (name, argument) = rest
        .split_once(char::is_whitespace)
        .map(|(name, argument)| (name, argument.trim()))
        .unwrap_or((rest, ""));

    match name {
        "quit" | "exit" => Ok(ShellCommand::Quit),
        "help" => Ok(ShellCommand::Help),
        "detach" => Ok(ShellCommand::Detach),
        "attach" => {
            ensure!(!argument.is_empty(), MissingPathSnafu);
            Ok(ShellCommand::Attach(PathBuf::from(argument)))
        }
        "suggest" => {
            let number = argument
                .parse::<usize>()
                .ok()
                .filter(|number| (1..=SUGGESTIONS.len()).contains(number))
                .context(InvalidSuggestionSnafu {
                    count: SUGGESTIONS.len(),
                })?;
            Ok(ShellCommand::Suggest(number - 1))
        }
        _ => UnknownCommandSnafu {
            command: name.to_string(),
        }
        .fail(),
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let value = bytes as f64;
    if value >= MIB {
        format!("{:.1} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.1} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

pub fn render_part(part: &Part) -> String {
    match part {
        Part::Text(text) => text.clone(),
        Part::InlineImage(image) => format!(
            "[image: {}, {}]",
            image.mime_type,
            format_size(image.decoded_len())
        ),
    }
}

pub fn render_turn(turn: &Turn) -> String {
    let label = match turn.role() {
        Role::User => USER_LABEL,
        Role::Model => MODEL_LABEL,
    };
    let body = turn
        .parts()
        .iter()
        .map(render_part)
        .collect::<Vec<_>>()
        .join("\n");

    format!("{label}: {body}")
}

pub fn render_header(snapshot: &ChatSnapshot) -> String {
    let mut lines = vec![APP_TITLE.to_string(), APP_TAGLINE.to_string(), String::new()];

    if let Some(message) = snapshot.status.init_error() {
        lines.push(render_blocked(message));
        return lines.join("\n");
    }

    if snapshot.transcript.is_empty() {
        lines.extend(
            SUGGESTIONS
                .iter()
                .enumerate()
                .map(|(index, suggestion)| format!("  {}. {suggestion}", index + 1)),
        );
        lines.push(String::new());
    }
    lines.push(INPUT_PLACEHOLDER.to_string());
    lines.push("Type /help for commands.".to_string());
    lines.join("\n")
}

fn render_blocked(message: &str) -> String {
    format!("{message}\nType /quit to exit.")
}

fn render_rejection(rejection: SendRejection, status: &SessionState) -> Option<String> {
    match rejection {
        SendRejection::Unavailable => Some(match status.init_error() {
            Some(message) => render_blocked(message),
            None => "The chat is still starting, try again in a moment.".to_string(),
        }),
        SendRejection::Busy => Some("Still waiting for the previous reply.".to_string()),
        SendRejection::EmptyInput => None,
    }
}

/// Line-oriented chat front end over a [`SessionController`].
///
/// Only reads controller snapshots; every mutation goes through `send`.
pub struct ChatShell<W> {
    controller: Arc<SessionController>,
    out: W,
    pending: Option<Attachment>,
    rendered_turns: usize,
    shown_pending: bool,
    shown_error: Option<String>,
}

impl<W> ChatShell<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(controller: Arc<SessionController>, out: W) -> Self {
        Self {
            controller,
            out,
            pending: None,
            rendered_turns: 0,
            shown_pending: false,
            shown_error: None,
        }
    }

    pub fn pending_attachment(&self) -> Option<&Attachment> {
        self.pending.as_ref()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Reads commands until `/quit` or end of input.
    pub async fn run<R>(&mut self, input: R) -> Result<(), ShellError>
    where
        R: AsyncBufRead + Unpin,
    {
        let snapshot = self.controller.snapshot();
        self.write_line(&render_header(&snapshot)).await?;
        self.rendered_turns = snapshot.transcript.len();
        self.shown_error = snapshot.error_message.clone();

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context(ReadInputSnafu {
            stage: "shell-read-line",
        })? {
            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(error) => {
                    self.write_line(&error.to_string()).await?;
                    continue;
                }
            };

            if !self.handle(command).await? {
                break;
            }
        }

        tracing::debug!("chat shell finished");
        Ok(())
    }

    /// Returns `false` when the shell should stop.
    async fn handle(&mut self, command: ShellCommand) -> Result<bool, ShellError> {
        match command {
            ShellCommand::Noop => {}
            ShellCommand::Quit => return Ok(false),
            ShellCommand::Help => self.write_line(HELP_TEXT).await?,
            ShellCommand::Attach(path) => match Attachment::from_path(path) {
                Ok(attachment) => {
                    let message = format!(
                        "attached {} ({}), it will be sent with your next message",
                        attachment.name, attachment.mime_type
                    );
                    self.pending = Some(attachment);
                    self.write_line(&message).await?;
                }
                Err(error) => self.write_line(&error.to_string()).await?,
            },
            ShellCommand::Detach => {
                let message = match self.pending.take() {
                    Some(attachment) => format!("removed {}", attachment.name),
                    None => "no image attached".to_string(),
                };
                self.write_line(&message).await?;
            }
            ShellCommand::Suggest(index) => {
                if let Some(suggestion) = SUGGESTIONS.get(index) {
                    self.submit(UserInput::text(*suggestion)).await?;
                }
            }
            ShellCommand::Send(text) => {
                let input = UserInput::new(text, self.pending.clone());
                let outcome = self.submit(input).await?;
                if !outcome.is_ignored() {
                    self.pending = None;
                }
            }
        }

        Ok(true)
    }

    async fn submit(&mut self, input: UserInput) -> Result<SendOutcome, ShellError> {
        let controller = Arc::clone(&self.controller);
        let mut updates = controller.subscribe();
        // Each accepted send reports its own error, even when the text repeats.
        let previous_error = self.shown_error.take();
        let send = controller.send(input);
        tokio::pin!(send);

        let mut watching = true;
        let outcome = loop {
            tokio::select! {
                outcome = &mut send => break outcome,
                changed = updates.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    let snapshot = updates.borrow_and_update().clone();
                    self.render_updates(&snapshot).await?;
                }
            }
        };

        if outcome.is_ignored() {
            self.shown_error = previous_error;
        }
        let snapshot = controller.snapshot();
        self.render_updates(&snapshot).await?;
        if let SendOutcome::Ignored(rejection) = &outcome {
            if let Some(message) = render_rejection(*rejection, &snapshot.status) {
                self.write_line(&message).await?;
            }
        }

        Ok(outcome)
    }

    /// Prints whatever changed since the last rendered snapshot.
    async fn render_updates(&mut self, snapshot: &ChatSnapshot) -> Result<(), ShellError> {
        let mut lines = snapshot
            .transcript
            .iter()
            .skip(self.rendered_turns)
            .map(render_turn)
            .collect::<Vec<_>>();
        self.rendered_turns = self.rendered_turns.max(snapshot.transcript.len());

        let awaiting_reply = snapshot.is_sending
            && snapshot.transcript.last().map(Turn::role) == Some(Role::User);
        if awaiting_reply && !self.shown_pending {
            lines.push(PENDING_INDICATOR.to_string());
            self.shown_pending = true;
        }
        if !snapshot.is_sending {
            self.shown_pending = false;
        }

        if snapshot.error_message != self.shown_error {
            if let Some(message) = &snapshot.error_message {
                lines.push(message.clone());
            }
            self.shown_error = snapshot.error_message.clone();
        }

        if lines.is_empty() {
            return Ok(());
        }
        self.write_line(&lines.join("\n")).await
    }

    async fn write_line(&mut self, text: &str) -> Result<(), ShellError> {
        self.out
            .write_all(format!("{text}\n").as_bytes())
            .await
            .context(WriteOutputSnafu {
                stage: "shell-write",
            })?;
        self.out.flush().await.context(WriteOutputSnafu {
            stage: "shell-flush",
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use gramgpt_llm::{BoxFuture, ChatSession, ProviderError, ProviderPart, ProviderResult};

    use super::*;
    use crate::chat::InputLimits;
    use crate::chat::copy::PROVIDER_FAILURE_MESSAGE;
    use crate::settings::AppSettings;

    /// Replies with the text it received; the text `fail` makes it fail.
    struct EchoSession;

    impl ChatSession for EchoSession {
        fn id(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo"
        }

        fn send_message<'a>(
            &'a self,
            parts: Vec<ProviderPart>,
        ) -> BoxFuture<'a, ProviderResult<String>> {
            Box::pin(async move {
                let text = parts
                    .iter()
                    .filter_map(|part| match part {
                        ProviderPart::Text { text } => Some(text.as_str()),
                        ProviderPart::InlineData { .. } => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ");

                if text == "fail" {
                    return Err(ProviderError::Status {
                        stage: "test",
                        status: 503,
                        body: "unavailable".to_string(),
                    });
                }
                Ok(format!("echo: {text} ({} parts)", parts.len()))
            })
        }

        fn history_len<'a>(&'a self) -> BoxFuture<'a, usize> {
            Box::pin(async { 0 })
        }
    }

    fn echo_controller() -> Arc<SessionController> {
        let controller = SessionController::new(InputLimits::default());
        controller
            .initialize(|| Ok(Arc::new(EchoSession) as Arc<dyn ChatSession>))
            .expect("initialize");
        Arc::new(controller)
    }

    async fn run_script(
        controller: Arc<SessionController>,
        script: &str,
    ) -> (String, Option<Attachment>) {
        let mut shell = ChatShell::new(controller, Vec::new());
        shell.run(script.as_bytes()).await.expect("shell run");
        let pending = shell.pending_attachment().cloned();
        let output = String::from_utf8(shell.into_inner()).expect("utf-8 output");
        (output, pending)
    }

    #[test]
    fn parses_commands_and_plain_text() {
        let parse = |line: &str| parse_command(line).expect("valid command");

        assert_eq!(parse("   "), ShellCommand::Noop);
        assert_eq!(parse("  হ্যালো  "), ShellCommand::Send("হ্যালো".to_string()));
        assert_eq!(parse("/quit"), ShellCommand::Quit);
        assert_eq!(parse("/help"), ShellCommand::Help);
        assert_eq!(parse("/detach"), ShellCommand::Detach);
        assert_eq!(parse("/suggest 4"), ShellCommand::Suggest(3));
        assert_eq!(
            parse("/attach  ~/Pictures/my leaf.png "),
            ShellCommand::Attach(PathBuf::from("~/Pictures/my leaf.png"))
        );
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(matches!(
            parse_command("/attach"),
            Err(CommandError::MissingPath)
        ));
        for line in ["/suggest", "/suggest 0", "/suggest 5", "/suggest two"] {
            assert!(matches!(
                parse_command(line),
                Err(CommandError::InvalidSuggestion { count: 4 })
            ));
        }
        assert!(matches!(
            parse_command("/frobnicate now"),
            Err(CommandError::UnknownCommand { command }) if command == "frobnicate"
        ));
    }

    #[test]
    fn formats_sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn renders_image_parts_as_placeholders() {
        let turn = Turn::user(vec![
            Part::inline_image("image/png", "aGVsbG8="),
            Part::Text("এটা কী?".to_string()),
        ])
        .expect("turn");

        assert_eq!(render_turn(&turn), "আপনি: [image: image/png, 5 B]\nএটা কী?");

        let reply = Turn::model_text("ধানক্ষেত").expect("reply");
        assert_eq!(render_turn(&reply), "গ্রামজিপিটি: ধানক্ষেত");
    }

    #[test]
    fn header_lists_suggestions_only_for_empty_transcript() {
        let header = render_header(&ChatSnapshot::default());

        assert!(header.starts_with(APP_TITLE));
        assert!(header.contains(APP_TAGLINE));
        for (index, suggestion) in SUGGESTIONS.iter().enumerate() {
            assert!(header.contains(&format!("{}. {suggestion}", index + 1)));
        }
    }

    #[test]
    fn header_blocks_when_initialization_failed() {
        let snapshot = ChatSnapshot {
            status: SessionState::InitFailed {
                message: "Chat is unavailable: no key".to_string(),
            },
            ..ChatSnapshot::default()
        };
        let header = render_header(&snapshot);

        assert!(header.contains("Chat is unavailable: no key"));
        assert!(header.contains("/quit"));
        assert!(!header.contains(SUGGESTIONS[0]));
    }

    #[tokio::test]
    async fn sends_lines_and_renders_replies_until_quit() {
        let controller = echo_controller();
        let (output, _) = run_script(controller.clone(), "হ্যালো\n/quit\nnever sent\n").await;

        assert!(output.contains("আপনি: হ্যালো"));
        assert!(output.contains("গ্রামজিপিটি: echo: হ্যালো (1 parts)"));
        assert_eq!(output.matches("আপনি: হ্যালো").count(), 1);
        assert_eq!(controller.transcript().len(), 2);
    }

    #[tokio::test]
    async fn suggestion_is_sent_as_plain_text() {
        let controller = echo_controller();
        run_script(controller.clone(), "/suggest 2\n").await;

        let transcript = controller.transcript();
        let user_turn = transcript.get(0).expect("user turn");
        assert_eq!(user_turn.parts(), &[Part::Text(SUGGESTIONS[1].to_string())]);
    }

    #[tokio::test]
    async fn attachment_goes_with_the_next_message_only() {
        let mut file = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .expect("temp file");
        file.write_all(b"hello").expect("write png");

        let controller = echo_controller();
        let script = format!("/attach {}\nএটা কী?\nআবার\n", file.path().display());
        let (output, pending) = run_script(controller.clone(), &script).await;

        assert!(output.contains("[image: image/png, 5 B]"));
        assert!(pending.is_none());

        let transcript = controller.transcript();
        assert_eq!(transcript.get(0).map(|turn| turn.parts().len()), Some(2));
        assert_eq!(transcript.get(2).map(|turn| turn.parts().len()), Some(1));
    }

    #[tokio::test]
    async fn non_image_attachment_is_refused() {
        let controller = echo_controller();
        let (output, pending) = run_script(controller.clone(), "/attach notes.txt\n").await;

        assert!(output.contains("is not an image"));
        assert!(pending.is_none());
        assert!(controller.transcript().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_prints_the_error_message() {
        let controller = echo_controller();
        let (output, _) = run_script(controller.clone(), "fail\n").await;

        assert!(output.contains("আপনি: fail"));
        assert!(output.contains(PROVIDER_FAILURE_MESSAGE));
        assert_eq!(controller.transcript().len(), 1);
    }

    #[tokio::test]
    async fn repeated_failures_each_print_the_error() {
        let controller = echo_controller();
        let (output, _) = run_script(controller.clone(), "fail\nfail\n").await;

        assert_eq!(output.matches(PROVIDER_FAILURE_MESSAGE).count(), 2);
        assert_eq!(controller.transcript().len(), 2);
    }

    #[tokio::test]
    async fn failed_initialization_blocks_every_send() {
        let controller = Arc::new(SessionController::from_settings(&AppSettings::default()));
        let state = controller.state();
        let message = state.init_error().expect("init failed");

        let (output, _) = run_script(controller.clone(), "hello\n/suggest 1\n").await;

        assert_eq!(output.matches(message).count(), 3);
        assert!(controller.transcript().is_empty());
    }
}
