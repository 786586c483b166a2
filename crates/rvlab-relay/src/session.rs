use crate::error::RelayError;
use crate::protocol::{ClientEvent, ElfPayload, PeerEvent, UserInput};
use crate::registers::RegisterFile;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Connecting,
    Connected,
    Executing,
    AwaitingInput,
    Completed,
    Errored,
    Disconnected,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Errored | SessionStatus::Disconnected
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Executing => "executing",
            SessionStatus::AwaitingInput => "awaiting-input",
            SessionStatus::Completed => "completed",
            SessionStatus::Errored => "errored",
            SessionStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    /// Streaming program output.
    Cpu,
    /// Final text carried by the execution result.
    Result,
    /// A line the client sent as input.
    Echo,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputEntry {
    pub kind: OutputKind,
    pub text: String,
}

/// Append-only record of everything shown to the user, in arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputLog {
    entries: Vec<OutputEntry>,
}

impl OutputLog {
    fn push(&mut self, kind: OutputKind, text: impl Into<String>) -> OutputEntry {
        let entry = OutputEntry {
            kind,
            text: text.into(),
        };
        self.entries.push(entry.clone());
        entry
    }

    pub fn entries(&self) -> &[OutputEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-session diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub dial_attempts: u32,
    pub bytes_sent: u64,
    /// Byte count the backend reported when acknowledging the artifact.
    pub bytes_acknowledged: Option<u64>,
    pub events_received: u64,
    pub inputs_sent: u64,
}

/// What the listener learns about as a session advances.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    Status {
        status: SessionStatus,
        message: String,
    },
    Output(OutputEntry),
    Registers(RegisterFile),
    InputRequested {
        prompt: Option<String>,
    },
    Finished {
        status: SessionStatus,
        message: String,
        error: Option<String>,
    },
}

/// State of one relay run against one workspace's artifact.
///
/// Pure state machine; [`crate::client`] feeds it transport events. Once a
/// terminal status is reached every further peer event is ignored and the
/// output log and registers stay readable.
#[derive(Clone, Debug)]
pub struct ExecutionSession {
    workspace: String,
    status: SessionStatus,
    message: String,
    error: Option<String>,
    output: OutputLog,
    registers: RegisterFile,
    stats: SessionStats,
}

impl ExecutionSession {
    pub fn new(workspace: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            status: SessionStatus::Idle,
            message: "Not connected".into(),
            error: None,
            output: OutputLog::default(),
            registers: RegisterFile::default(),
            stats: SessionStats::default(),
        }
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn output(&self) -> &OutputLog {
        &self.output
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    fn set_status(&mut self, status: SessionStatus, message: impl Into<String>) -> SessionUpdate {
        if self.status != status {
            tracing::debug!(
                workspace = %self.workspace,
                "relay session {} -> {}",
                self.status,
                status
            );
        }
        self.status = status;
        self.message = message.into();
        if status.is_terminal() {
            SessionUpdate::Finished {
                status,
                message: self.message.clone(),
                error: self.error.clone(),
            }
        } else {
            SessionUpdate::Status {
                status,
                message: self.message.clone(),
            }
        }
    }

    /// Idle -> Connecting. Refused before any dial when there is nothing to
    /// send.
    pub fn begin_dial(&mut self, artifact: Option<&ElfPayload>) -> Result<SessionUpdate, RelayError> {
        if self.status != SessionStatus::Idle {
            return Err(RelayError::AlreadyStarted(self.status));
        }
        if artifact.is_none() {
            return Err(RelayError::NoArtifact(self.workspace.clone()));
        }
        self.stats.dial_attempts += 1;
        Ok(self.set_status(SessionStatus::Connecting, "Connecting to RV32I CPU..."))
    }

    pub fn dial_failed(&mut self, reason: impl Into<String>) -> SessionUpdate {
        self.error = Some(reason.into());
        self.set_status(SessionStatus::Errored, "Connection error")
    }

    /// Connecting -> Connected once the channel handshake completes.
    pub fn channel_open(&mut self) -> SessionUpdate {
        self.set_status(
            SessionStatus::Connected,
            "Connected to RV32I CPU. Sending ELF file...",
        )
    }

    pub fn artifact_sent(&mut self, bytes: usize) {
        self.stats.bytes_sent += bytes as u64;
    }

    /// Folds one peer event into the session.
    pub fn apply(&mut self, event: &PeerEvent) -> Vec<SessionUpdate> {
        self.stats.events_received += 1;
        if self.status.is_terminal() {
            tracing::debug!(
                workspace = %self.workspace,
                "ignoring {} after session reached {}",
                event.name(),
                self.status
            );
            return Vec::new();
        }
        match event {
            PeerEvent::Connected(_) => {
                if self.status == SessionStatus::Connecting {
                    vec![self.channel_open()]
                } else {
                    Vec::new()
                }
            }
            PeerEvent::ElfReceived(ack) => {
                self.stats.bytes_acknowledged = ack.bytes;
                if self.status == SessionStatus::Connected {
                    vec![self.set_status(
                        SessionStatus::Executing,
                        "ELF file received by CPU. Executing program...",
                    )]
                } else {
                    Vec::new()
                }
            }
            PeerEvent::CpuOutput(out) => {
                if !self.running() {
                    return self.out_of_turn(event);
                }
                vec![SessionUpdate::Output(
                    self.output.push(OutputKind::Cpu, out.output.clone()),
                )]
            }
            PeerEvent::RegisterUpdate(update) => {
                self.registers.merge(update);
                vec![SessionUpdate::Registers(self.registers)]
            }
            PeerEvent::InputRequest(request) => {
                if !self.running() {
                    return self.out_of_turn(event);
                }
                vec![
                    self.set_status(SessionStatus::AwaitingInput, "CPU is waiting for input..."),
                    SessionUpdate::InputRequested {
                        prompt: request.prompt.clone(),
                    },
                ]
            }
            PeerEvent::InputReceived => {
                if !self.running() {
                    return self.out_of_turn(event);
                }
                vec![self.set_status(
                    self.status,
                    "Input received by CPU, continuing execution...",
                )]
            }
            PeerEvent::ExecutionResult(result) => {
                if !self.running() {
                    return self.out_of_turn(event);
                }
                let text = if result.output.is_empty() {
                    "No output from CPU".to_string()
                } else {
                    result.output.clone()
                };
                let entry = self.output.push(OutputKind::Result, text);
                vec![
                    SessionUpdate::Output(entry),
                    self.set_status(SessionStatus::Completed, "Execution completed"),
                ]
            }
            PeerEvent::Error(err) => {
                let message = if err.message.is_empty() {
                    "Unknown error".to_string()
                } else {
                    err.message.clone()
                };
                self.error = Some(message);
                vec![self.set_status(SessionStatus::Errored, "Error occurred")]
            }
            PeerEvent::Disconnect(_) => vec![self.channel_closed()],
            PeerEvent::Unknown { event } => {
                tracing::warn!(workspace = %self.workspace, "ignoring unknown relay event '{event}'");
                Vec::new()
            }
        }
    }

    /// Executing or AwaitingInput: the artifact was acknowledged and no
    /// terminal event arrived yet.
    fn running(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Executing | SessionStatus::AwaitingInput
        )
    }

    pub fn accepts_input(&self) -> bool {
        self.running()
    }

    fn out_of_turn(&self, event: &PeerEvent) -> Vec<SessionUpdate> {
        tracing::warn!(
            workspace = %self.workspace,
            "ignoring {} while session is {}",
            event.name(),
            self.status
        );
        Vec::new()
    }

    /// Accepts a line of input while the program runs. Any pending input
    /// request is satisfied and the line is echoed to the output log.
    pub fn submit_input(
        &mut self,
        line: impl Into<String>,
    ) -> Result<(ClientEvent, Vec<SessionUpdate>), RelayError> {
        if !self.running() {
            return Err(RelayError::NotAcceptingInput(self.status));
        }
        let input = line.into();
        self.stats.inputs_sent += 1;
        let echo = self.output.push(OutputKind::Echo, format!("> {input}"));
        let mut updates = vec![SessionUpdate::Output(echo)];
        if self.status == SessionStatus::AwaitingInput {
            updates.push(self.set_status(SessionStatus::Executing, "Input sent to CPU"));
        }
        Ok((ClientEvent::UserInput(UserInput { input }), updates))
    }

    /// The channel went away. Completed and Errored sessions keep their
    /// status; anything else becomes Disconnected.
    pub fn channel_closed(&mut self) -> SessionUpdate {
        if matches!(
            self.status,
            SessionStatus::Completed | SessionStatus::Errored
        ) {
            return SessionUpdate::Finished {
                status: self.status,
                message: self.message.clone(),
                error: self.error.clone(),
            };
        }
        self.set_status(SessionStatus::Disconnected, "Disconnected from RV32I CPU")
    }

    pub fn transport_failed(&mut self, reason: impl Into<String>) -> SessionUpdate {
        if self.status.is_terminal() {
            return self.channel_closed();
        }
        self.error = Some(reason.into());
        self.channel_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CpuOutput, Disconnect, ElfReceived, InputRequest, PeerError, RegisterUpdate};

    fn payload() -> ElfPayload {
        ElfPayload {
            folder_name: "folder-1-abcdef".into(),
            file_name: "program.elf".into(),
            elf_data: vec![0x7f, b'E', b'L', b'F'],
        }
    }

    fn running() -> ExecutionSession {
        let mut session = ExecutionSession::new("folder-1-abcdef");
        session.begin_dial(Some(&payload())).expect("dial");
        session.channel_open();
        session.apply(&PeerEvent::ElfReceived(ElfReceived {
            file_name: Some("program.elf".into()),
            bytes: Some(4),
        }));
        session
    }

    fn out(text: &str) -> PeerEvent {
        PeerEvent::CpuOutput(CpuOutput {
            output: text.into(),
        })
    }

    #[test]
    fn start_without_artifact_is_rejected_before_dial() {
        let mut session = ExecutionSession::new("folder-1-abcdef");
        match session.begin_dial(None) {
            Err(RelayError::NoArtifact(ws)) => assert_eq!(ws, "folder-1-abcdef"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(session.stats().dial_attempts, 0);
    }

    #[test]
    fn handshake_and_ack_reach_executing() {
        let session = running();
        assert_eq!(session.status(), SessionStatus::Executing);
        assert_eq!(session.stats().bytes_acknowledged, Some(4));
        assert_eq!(session.stats().dial_attempts, 1);
    }

    #[test]
    fn dial_failure_is_terminal() {
        let mut session = ExecutionSession::new("ws");
        session.begin_dial(Some(&payload())).expect("dial");
        let update = session.dial_failed("connection refused");
        assert!(matches!(
            update,
            SessionUpdate::Finished {
                status: SessionStatus::Errored,
                ..
            }
        ));
        assert_eq!(session.error(), Some("connection refused"));
        assert!(matches!(
            session.begin_dial(Some(&payload())),
            Err(RelayError::AlreadyStarted(SessionStatus::Errored))
        ));
    }

    #[test]
    fn input_round_trip() {
        let mut session = running();
        session.apply(&out("Enter a number: "));
        let updates = session.apply(&PeerEvent::InputRequest(InputRequest::default()));
        assert_eq!(session.status(), SessionStatus::AwaitingInput);
        assert!(updates
            .iter()
            .any(|u| matches!(u, SessionUpdate::InputRequested { .. })));

        let (event, _) = session.submit_input("42").expect("input");
        assert_eq!(
            event,
            ClientEvent::UserInput(UserInput { input: "42".into() })
        );
        assert_eq!(session.status(), SessionStatus::Executing);
        session.apply(&PeerEvent::InputReceived);
        assert_eq!(session.status(), SessionStatus::Executing);
        assert_eq!(session.stats().inputs_sent, 1);

        let texts: Vec<_> = session
            .output()
            .entries()
            .iter()
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(texts, vec!["Enter a number: ", "> 42"]);
    }

    #[test]
    fn input_before_execution_is_refused() {
        let mut session = ExecutionSession::new("ws");
        assert!(matches!(
            session.submit_input("1"),
            Err(RelayError::NotAcceptingInput(SessionStatus::Idle))
        ));
    }

    #[test]
    fn output_log_survives_every_exit_transition() {
        let exits = [
            PeerEvent::ExecutionResult(CpuOutput {
                output: "done".into(),
            }),
            PeerEvent::Error(PeerError {
                message: "illegal instruction".into(),
            }),
            PeerEvent::Disconnect(Disconnect::default()),
        ];
        for exit in exits {
            for await_input in [false, true] {
                let mut session = running();
                session.apply(&out("a"));
                session.apply(&out("b"));
                if await_input {
                    session.apply(&PeerEvent::InputRequest(InputRequest::default()));
                }
                let before = session.output().entries().to_vec();
                session.apply(&exit);
                assert!(session.status().is_terminal());
                assert_eq!(&session.output().entries()[..before.len()], &before[..]);
                session.apply(&out("late"));
                assert!(session.output().len() <= before.len() + 1);
            }
        }
    }

    #[test]
    fn terminal_states_are_distinct() {
        let mut completed = running();
        completed.apply(&PeerEvent::ExecutionResult(CpuOutput::default()));
        assert_eq!(completed.status(), SessionStatus::Completed);
        assert_eq!(
            completed.output().entries().last().map(|e| e.text.as_str()),
            Some("No output from CPU")
        );
        completed.channel_closed();
        assert_eq!(completed.status(), SessionStatus::Completed);

        let mut errored = running();
        errored.apply(&PeerEvent::Error(PeerError::default()));
        assert_eq!(errored.status(), SessionStatus::Errored);
        assert_eq!(errored.error(), Some("Unknown error"));

        let mut dropped = running();
        dropped.apply(&PeerEvent::InputRequest(InputRequest::default()));
        dropped.transport_failed("connection reset");
        assert_eq!(dropped.status(), SessionStatus::Disconnected);
        assert_eq!(dropped.error(), Some("connection reset"));
        assert!(dropped.submit_input("abandoned").is_err());
    }

    #[test]
    fn register_updates_merge_in_order() {
        let mut session = running();
        let first = RegisterUpdate([("x10".to_string(), 1), ("x11".to_string(), 2)].into());
        let second = RegisterUpdate([("a0".to_string(), 3)].into());
        session.apply(&PeerEvent::RegisterUpdate(first));
        session.apply(&PeerEvent::RegisterUpdate(second));
        assert_eq!(session.registers().get(10), 3);
        assert_eq!(session.registers().get(11), 2);
        assert_eq!(session.registers().get(12), 0);
    }

    fn connected() -> ExecutionSession {
        let mut session = ExecutionSession::new("folder-1-abcdef");
        session.begin_dial(Some(&payload())).expect("dial");
        session.channel_open();
        session
    }

    #[test]
    fn input_request_before_ack_is_ignored() {
        let mut session = connected();
        let updates = session.apply(&PeerEvent::InputRequest(InputRequest::default()));
        assert!(updates.is_empty());
        assert_eq!(session.status(), SessionStatus::Connected);
        assert!(matches!(
            session.submit_input("1"),
            Err(RelayError::NotAcceptingInput(SessionStatus::Connected))
        ));
    }

    #[test]
    fn execution_result_before_ack_is_ignored() {
        let mut session = connected();
        let updates = session.apply(&PeerEvent::ExecutionResult(CpuOutput {
            output: "done".into(),
        }));
        assert!(updates.is_empty());
        assert_eq!(session.status(), SessionStatus::Connected);
        assert!(session.output().is_empty());

        session.apply(&PeerEvent::ElfReceived(ElfReceived::default()));
        assert_eq!(session.status(), SessionStatus::Executing);
    }

    #[test]
    fn cpu_output_before_ack_is_ignored() {
        let mut session = ExecutionSession::new("folder-1-abcdef");
        session.begin_dial(Some(&payload())).expect("dial");
        assert!(session.apply(&out("early")).is_empty());
        assert_eq!(session.status(), SessionStatus::Connecting);

        session.channel_open();
        assert!(session.apply(&out("early")).is_empty());
        assert!(session.output().is_empty());
        assert_eq!(session.stats().events_received, 2);
    }

    #[test]
    fn input_received_before_ack_keeps_message() {
        let mut session = connected();
        let before = session.message().to_string();
        assert!(session.apply(&PeerEvent::InputReceived).is_empty());
        assert_eq!(session.message(), before);
    }

    #[test]
    fn unknown_events_change_nothing() {
        let mut session = running();
        let updates = session.apply(&PeerEvent::Unknown {
            event: "memory_dump".into(),
        });
        assert!(updates.is_empty());
        assert_eq!(session.status(), SessionStatus::Executing);
        assert_eq!(session.stats().events_received, 2);
    }
}
