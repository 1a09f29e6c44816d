//! Crate-level session tests driving scripted programs.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use camino::Utf8PathBuf;
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::protocol::{Request, Response};
use crate::session::{EndReason, Session, SessionContext, SessionEnd};
use crate::transport::{Transport, TransportError};


/// A hosted program: given the response to its previous request, it yields
/// its next request, or `None` to close the channel.
type Program = Box<dyn FnMut(Option<&Response>) -> Option<Request>>;

/// What a [`ProgramTransport`] observed, shared with the test after the
/// session consumed the transport.
#[derive(Default)]
struct Observed {
    responses: RefCell<Vec<Response>>,
    shutdowns: Cell<usize>,
}

/// Transport that runs a [`Program`] in-process.
struct ProgramTransport {
    program: Program,
    last: Option<Response>,
    completion: i32,
    observed: Rc<Observed>,
}

impl ProgramTransport {
    fn new(program: Program, completion: i32) -> (Self, Rc<Observed>) {
        let observed = Rc::new(Observed::default());
        let transport = Self {
            program,
            last: None,
            completion,
            observed: Rc::clone(&observed),
        };
        (transport, observed)
    }
}

impl Transport for ProgramTransport {
    fn next_request(&mut self) -> Result<Option<Request>, TransportError> {
        let last = self.last.take();
        Ok((self.program)(last.as_ref()))
    }

    fn respond(&mut self, response: &Response) -> Result<(), TransportError> {
        self.observed.responses.borrow_mut().push(response.clone());
        self.last = Some(response.clone());
        Ok(())
    }

    fn completion_status(&mut self) -> Result<i32, TransportError> {
        Ok(self.completion)
    }

    fn shutdown(&mut self) {
        self.observed.shutdowns.set(self.observed.shutdowns.get() + 1);
    }
}

/// One request of a scripted program, computed from the previous response.
type Step = Box<dyn FnMut(Option<&Response>) -> Request>;

fn step(f: impl FnMut(Option<&Response>) -> Request + 'static) -> Step {
    Box::new(f)
}

/// A step that ignores the previous response.
fn send(name: &str, value: Value) -> Step {
    let request = Request::new(name, value);
    step(move |_| request.clone())
}

/// Builds a program that runs `steps` in order and then closes its channel.
fn scripted(steps: Vec<Step>) -> Program {
    let mut remaining = steps.into_iter();
    Box::new(move |last: Option<&Response>| remaining.next().map(|mut next| next(last)))
}

struct Run {
    _cwd: TempDir,
    end: SessionEnd,
    stdout: Vec<u8>,
    observed: Rc<Observed>,
}

fn run(program: Program, completion: i32) -> Run {
    let cwd = TempDir::new().expect("cwd");
    let root = Utf8PathBuf::from_path_buf(cwd.path().to_path_buf()).expect("utf8");
    let (transport, observed) = ProgramTransport::new(program, completion);
    let context = SessionContext::new(&root, "tether-session-", Vec::new());
    let (end, context) = Session::new(transport, context).run();
    Run {
        _cwd: cwd,
        end,
        stdout: context.stdout().clone(),
        observed,
    }
}

#[test]
fn session_answers_every_request_once_and_shuts_down_once() {
    let program = scripted(vec![
        send("checkVersion", json!([9, 1])),
        send("writeStdout", json!("a")),
        send("stat", json!(["."])),
    ]);
    let outcome = run(program, 0);

    assert!(matches!(outcome.end.reason, EndReason::Completed(0)));
    assert_eq!(outcome.observed.responses.borrow().len(), 3);
    assert_eq!(outcome.observed.shutdowns.get(), 1);
    assert_eq!(outcome.stdout, b"a");
}

#[test]
fn closed_channel_uses_program_status() {
    let program = scripted(vec![send("checkVersion", json!([9, 0]))]);
    let outcome = run(program, 42);
    assert_eq!(outcome.end.exit_code(), 42);
}

fn path_of(response: Option<&Response>) -> Utf8PathBuf {
    response
        .and_then(Response::value)
        .and_then(Value::as_str)
        .map(Utf8PathBuf::from)
        .expect("temporary directory path")
}

#[test]
fn failed_cleanup_keeps_the_requested_exit_code() {
    let broken = Rc::new(RefCell::new(None::<Utf8PathBuf>));
    let recorded = Rc::clone(&broken);
    let program = scripted(vec![
        send("checkVersion", json!([9, 1])),
        send("createTemporaryDirectory", Value::Null),
        step(move |last| {
            let path = path_of(last);
            std::fs::remove_dir(&path).expect("remove directory");
            std::fs::write(&path, "not a directory").expect("replace with file");
            *recorded.borrow_mut() = Some(path);
            Request::new("createTemporaryDirectory", Value::Null)
        }),
        send("exit", json!(3)),
    ]);
    let outcome = run(program, 0);

    assert_eq!(outcome.end.exit_code(), 3);
    assert_eq!(outcome.end.cleanup.failed, 1);
    assert_eq!(outcome.end.cleanup.removed, 1);

    let leftover = broken.borrow_mut().take().expect("broken path recorded");
    std::fs::remove_file(&leftover).expect("remove stand-in file");
}

#[test]
fn fatal_error_still_sweeps() {
    let program = scripted(vec![
        send("checkVersion", json!([9, 1])),
        send("createTemporaryDirectory", Value::Null),
        send("createTemporaryDirectory", Value::Null),
        send("frobnicate", Value::Null),
    ]);
    let outcome = run(program, 0);

    assert_eq!(outcome.end.exit_code(), 1);
    assert!(matches!(
        outcome.end.reason.fatal(),
        Some(crate::BrokerError::UnknownRequest { .. })
    ));
    assert_eq!(outcome.end.cleanup.removed, 2);
    for response in outcome.observed.responses.borrow().iter().skip(1) {
        let path = response.value().and_then(Value::as_str).expect("path");
        assert!(!std::path::Path::new(path).exists());
    }
}
