//! Sequential execution of split submissions.
//!
//! The [`Dispatcher`] runs sub-submissions strictly in order: item `n + 1` is
//! not started until the outcome of item `n` is known, whether its kernel is
//! an in-process [`Backend`] or a remote kernel behind a [`ProxyTransport`].
//! A failure is reported for its own item only and never retried; the rest of
//! the list still runs. Cancelling through a [`CancellationToken`] stops the
//! items that have not started yet.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use indexmap::IndexMap;
use log::{debug, info, warn};
use thiserror::Error;

use polyglot_core::identifier::Id;
use polyglot_parser::{DirectiveOptions, error::Diagnostic};

use crate::{
    remap::RemappedDiagnostic,
    split::{SubSubmission, SubmissionKind},
};

/// What a backend reports for one compile, run or action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendResult {
    succeeded: bool,
    output: Vec<String>,
    diagnostics: Vec<RemappedDiagnostic>,
    exception: Option<String>,
}

impl BackendResult {
    pub fn success(output: Vec<String>) -> Self {
        Self {
            succeeded: true,
            output,
            ..Self::default()
        }
    }

    /// A failure with diagnostics already in buffer coordinates.
    pub fn failure(diagnostics: Vec<RemappedDiagnostic>) -> Self {
        Self {
            diagnostics,
            ..Self::default()
        }
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self {
            exception: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn diagnostics(&self) -> &[RemappedDiagnostic] {
        &self.diagnostics
    }

    pub fn exception_message(&self) -> Option<&str> {
        self.exception.as_deref()
    }
}

/// An in-process kernel.
///
/// Implementations compose the code into whatever unit their compiler needs
/// and return diagnostics remapped with
/// [`DiagnosticRemapper`](crate::remap::DiagnosticRemapper).
///
/// Code items carry no directive options, so `compile` and `run` receive an
/// empty [`DirectiveOptions`] for them.
pub trait Backend {
    fn compile(&mut self, code: &str, options: &DirectiveOptions) -> BackendResult;

    fn run(&mut self, code: &str, options: &DirectiveOptions) -> BackendResult;

    /// Executes an action directive such as `#!time`.
    fn invoke(&mut self, name: &str, options: &DirectiveOptions) -> BackendResult;
}

/// Correlates a proxy response with the command that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u64);

impl CommandId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Code forwarded to a proxy kernel without interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCommand {
    pub id: CommandId,
    pub target: Id,
    pub code: String,
}

/// The terminal event a proxy kernel sends back for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEvent {
    pub id: CommandId,
    pub outcome: ProxyOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyOutcome {
    Completed { output: Vec<String> },
    Failed { message: String },
}

/// Failure to reach a proxy kernel, as opposed to the kernel rejecting code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("proxy kernel `{0}` is unreachable")]
    Unreachable(String),

    #[error("timed out waiting for command {0:?}")]
    Timeout(CommandId),

    #[error("received a response for command {got:?} while waiting for {expected:?}")]
    Mismatched { expected: CommandId, got: CommandId },

    #[error("transport error: {0}")]
    Other(String),
}

/// The channel to a remote kernel.
///
/// `send` blocks until the terminal event for the command arrives or the
/// transport gives up. Timeouts are the transport's own policy.
pub trait ProxyTransport {
    fn send(&mut self, command: ProxyCommand) -> Result<ProxyEvent, TransportError>;
}

/// A registered kernel.
pub enum KernelHandle {
    Local(Box<dyn Backend>),
    Proxy(Box<dyn ProxyTransport>),
}

impl std::fmt::Debug for KernelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(_) => f.write_str("Local"),
            Self::Proxy(_) => f.write_str("Proxy"),
        }
    }
}

/// Why a sub-submission failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelFailure {
    /// The kernel compiled or ran the code and reported errors.
    #[error("execution failed")]
    Execution {
        diagnostics: Vec<RemappedDiagnostic>,
        exception: Option<String>,
    },

    /// The directive was malformed; nothing reached the kernel.
    #[error("directive could not be executed")]
    Directive { diagnostics: Vec<Diagnostic> },

    #[error("no kernel named `{0}` is registered")]
    UnknownKernel(Id),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The result of one sub-submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { output: Vec<String> },
    Failed(KernelFailure),
    /// Never started because dispatch was cancelled.
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Shared flag that stops a dispatch between sub-submissions.
///
/// Clones share the flag, so a kernel or another thread can cancel a
/// dispatch in progress.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs sub-submissions against registered kernels, one at a time.
#[derive(Debug, Default)]
pub struct Dispatcher {
    kernels: IndexMap<Id, KernelHandle>,
    next_command: u64,
    cancellation: CancellationToken,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, name: &str, backend: impl Backend + 'static) -> Self {
        self.kernels
            .insert(Id::new(name), KernelHandle::Local(Box::new(backend)));
        self
    }

    pub fn with_proxy(mut self, name: &str, transport: impl ProxyTransport + 'static) -> Self {
        self.kernels
            .insert(Id::new(name), KernelHandle::Proxy(Box::new(transport)));
        self
    }

    /// Shares a cancellation token with the caller.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Executes `items` in order and returns one outcome per item.
    pub fn dispatch(&mut self, items: &[SubSubmission]) -> Vec<Outcome> {
        info!(items = items.len(); "Dispatching submission");

        let mut outcomes = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if self.cancellation.is_cancelled() {
                warn!(
                    remaining = items.len() - index;
                    "Dispatch cancelled, skipping remaining sub-submissions"
                );
                outcomes.resize(items.len(), Outcome::Cancelled);
                break;
            }

            let outcome = self.execute(item);
            debug!(
                index = index,
                kernel = item.target().to_name(),
                success = outcome.is_success();
                "Sub-submission finished"
            );
            outcomes.push(outcome);
        }

        outcomes
    }

    fn execute(&mut self, item: &SubSubmission) -> Outcome {
        if let SubmissionKind::Failed { diagnostics } = item.kind() {
            return Outcome::Failed(KernelFailure::Directive {
                diagnostics: diagnostics.clone(),
            });
        }

        let command_id = CommandId(self.next_command);
        let Some(kernel) = self.kernels.get_mut(&item.target()) else {
            return Outcome::Failed(KernelFailure::UnknownKernel(item.target()));
        };

        match kernel {
            KernelHandle::Local(backend) => match item.kind() {
                SubmissionKind::Action { name, options } => {
                    execution_outcome(backend.invoke(name, options))
                }
                _ => {
                    let options = DirectiveOptions::default();
                    let compiled = backend.compile(item.code(), &options);
                    if !compiled.succeeded() {
                        return execution_outcome(compiled);
                    }
                    execution_outcome(backend.run(item.code(), &options))
                }
            },
            KernelHandle::Proxy(transport) => {
                self.next_command += 1;
                let command = ProxyCommand {
                    id: command_id,
                    target: item.target(),
                    code: item.code().to_string(),
                };
                match transport.send(command) {
                    Ok(event) if event.id != command_id => {
                        Outcome::Failed(KernelFailure::Transport(TransportError::Mismatched {
                            expected: command_id,
                            got: event.id,
                        }))
                    }
                    Ok(ProxyEvent {
                        outcome: ProxyOutcome::Completed { output },
                        ..
                    }) => Outcome::Succeeded { output },
                    Ok(ProxyEvent {
                        outcome: ProxyOutcome::Failed { message },
                        ..
                    }) => Outcome::Failed(KernelFailure::Execution {
                        diagnostics: Vec::new(),
                        exception: Some(message),
                    }),
                    Err(err) => {
                        warn!(
                            kernel = item.target().to_name(),
                            err = err.to_string();
                            "Proxy transport failed"
                        );
                        Outcome::Failed(KernelFailure::Transport(err))
                    }
                }
            }
        }
    }
}

fn execution_outcome(result: BackendResult) -> Outcome {
    if result.succeeded {
        Outcome::Succeeded {
            output: result.output,
        }
    } else {
        Outcome::Failed(KernelFailure::Execution {
            diagnostics: result.diagnostics,
            exception: result.exception,
        })
    }
}
