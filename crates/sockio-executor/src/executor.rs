//! Request executor
//!
//! Owns the socket bag, the selector and the event caller, and runs the
//! stage pipeline until no socket has work left.

use sockio_core::{
    kdebug, kerror, kinfo, LimitationSolver, Selector, SockError, SockResult, Socket, SocketId,
    SocketMetadata, SocketTelemetry,
};
use sockio_module::SelectSelector;

use crate::bag::SocketBag;
use crate::config::ExecutorConfig;
use crate::control::ExecutionState;
use crate::handler::EventHandler;
use crate::operation::Operation;
use crate::pipeline::Pipeline;
use crate::stage::{self, ReturnPolicy};

pub struct RequestExecutor<S: Selector = SelectSelector> {
    selector: S,
    pipeline: Pipeline,
    policy: ReturnPolicy,
}

impl Default for RequestExecutor<SelectSelector> {
    fn default() -> Self {
        Self::new(SelectSelector::new())
    }
}

impl<S: Selector> RequestExecutor<S> {
    pub fn new(selector: S) -> Self {
        Self {
            selector,
            pipeline: Pipeline::new(ExecutorConfig::from_env()),
            policy: ReturnPolicy::default(),
        }
    }

    /// Handler receiving the events of every socket, after the socket's own
    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.pipeline.caller.handler = Some(Box::new(handler));
        self
    }

    pub fn with_limitation_solver(mut self, solver: impl LimitationSolver + 'static) -> Self {
        self.pipeline.caller.solver = Box::new(solver);
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.pipeline.config = config;
        self
    }

    /// Descriptors the connect stage hands on to the rest of a pass
    pub fn with_return_policy(mut self, policy: ReturnPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.pipeline.config
    }

    pub fn selector(&self) -> &S {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut S {
        &mut self.selector
    }

    pub fn bag(&self) -> &SocketBag {
        &self.pipeline.bag
    }

    #[inline]
    pub fn is_executing(&self) -> bool {
        self.pipeline.bag.is_executing()
    }

    // ---- socket bag ----

    pub fn add_socket(
        &mut self,
        socket: Box<dyn Socket>,
        operation: Operation,
        metadata: Option<SocketMetadata>,
        handler: Option<Box<dyn EventHandler>>,
    ) -> SockResult<SocketId> {
        self.pipeline
            .bag
            .add_socket(socket, operation, metadata, handler)
    }

    pub fn remove_socket(&mut self, id: SocketId) -> SockResult<()> {
        self.pipeline.bag.remove_socket(id)
    }

    pub fn has_socket(&self, id: SocketId) -> bool {
        self.pipeline.bag.has_socket(id)
    }

    pub fn postpone_socket(&mut self, id: SocketId) -> SockResult<()> {
        self.pipeline.bag.postpone_socket(id)
    }

    pub fn socket_metadata(&self, id: SocketId) -> SockResult<&SocketMetadata> {
        self.pipeline.bag.socket_metadata(id)
    }

    pub fn socket_metadata_mut(&mut self, id: SocketId) -> SockResult<&mut SocketMetadata> {
        self.pipeline.bag.socket_metadata_mut(id)
    }

    pub fn set_socket_metadata(&mut self, id: SocketId, metadata: SocketMetadata) -> SockResult<()> {
        self.pipeline.bag.set_socket_metadata(id, metadata)
    }

    pub fn socket_operation(&self, id: SocketId) -> SockResult<&Operation> {
        self.pipeline.bag.socket_operation(id)
    }

    pub fn set_socket_operation(&mut self, id: SocketId, operation: Operation) -> SockResult<()> {
        self.pipeline.bag.set_socket_operation(id, operation)
    }

    pub fn socket_telemetry(&self, id: SocketId) -> SockResult<&SocketTelemetry> {
        self.pipeline.bag.socket_telemetry(id)
    }

    /// Keep-alive sockets released from the bag without a close
    pub fn take_released_sockets(&mut self) -> Vec<Box<dyn Socket>> {
        self.pipeline.bag.take_released_sockets()
    }

    // ---- execution ----

    /// Drive every registered socket until none has work left
    ///
    /// Socket-level failures are reported through `EXCEPTION` and do not
    /// end the request. Any other error closes all sockets and is returned.
    pub fn execute_request(&mut self) -> SockResult<()> {
        if self.is_executing() {
            return Err(SockError::AlreadyExecuting);
        }
        if let Err(e) = self.pipeline.config.validate() {
            kerror!("executor: {}", e);
            return Err(SockError::InvalidOperation("invalid executor configuration"));
        }

        self.begin();
        kinfo!("executor: request started with {} sockets", self.pipeline.bag.len());

        let result = self.run_loop();
        if let Err(e) = &result {
            kerror!("executor: request aborted: {}", e);
            self.abort();
        }

        self.end();
        result
    }

    /// Ask a running request to stop
    ///
    /// Handlers stop a request through `Event::stop_request`.
    pub fn stop_request(&mut self) -> SockResult<()> {
        if !self.is_executing() {
            return Err(SockError::NotExecuting);
        }
        self.pipeline.state.stop_requested = true;
        Ok(())
    }

    pub(crate) fn begin(&mut self) {
        self.pipeline.bag.set_executing(true);
        self.pipeline.state = ExecutionState::default();
        self.pipeline.bag.reset_retained();
        self.pipeline.caller.solver.initialize();
    }

    pub(crate) fn end(&mut self) {
        self.pipeline.caller.solver.finalize();
        self.selector.clear_interests();
        self.pipeline.bag.set_executing(false);
        self.pipeline.state = ExecutionState::default();
    }

    fn run_loop(&mut self) -> SockResult<()> {
        while self.run_pass()? {}
        Ok(())
    }

    /// One pass over all stages; `false` once nothing is left to do
    pub(crate) fn run_pass(&mut self) -> SockResult<bool> {
        let p = &mut self.pipeline;
        let selector: &mut dyn Selector = &mut self.selector;
        let policy = self.policy;

        if p.state.stop_requested {
            kdebug!("executor: stop requested, draining");
            drain(p, selector)?;
            return Ok(false);
        }

        let candidates = p.bag.active_ids();
        let running = match policy {
            ReturnPolicy::AllRunning => stage::connect::connect(p, &candidates, policy)?,
            ReturnPolicy::NewlyAdmitted => {
                let mut carried: Vec<SocketId> = p
                    .bag
                    .descriptors()
                    .filter(|d| d.running && d.is_active())
                    .map(|d| d.id)
                    .collect();
                carried.extend(stage::connect::connect(p, &candidates, policy)?);
                carried
            }
        };
        let ready = stage::delay::delay(p, running)?;
        let selected = stage::select::select(p, selector, &ready)?;
        let progressed = stage::io::io(p, &selected)?;

        let idle: Vec<SocketId> = p
            .bag
            .descriptors()
            .filter(|d| d.running && d.is_active() && !progressed.contains(&d.id))
            .map(|d| d.id)
            .collect();
        stage::timeout::timeout(p, &idle)?;

        let active = p.bag.active_ids();
        stage::guardian::guardian(p, selector, &active)?;
        stage::disconnect::settle(p, selector)?;
        p.bag.collect_finalized();

        Ok(p.bag.has_active() || p.state.stop_requested)
    }

    /// Close and drop everything after a fatal error
    fn abort(&mut self) {
        for mut desc in self.pipeline.bag.drain() {
            if let Err(e) = desc.socket.close() {
                kdebug!("executor: closing {} failed: {}", desc.id, e);
            }
        }
    }
}

/// Disconnect every remaining descriptor after a stop request
fn drain(p: &mut Pipeline, selector: &mut dyn Selector) -> SockResult<()> {
    for id in p.bag.ids() {
        if let Some(desc) = p.bag.get_mut(id) {
            if !desc.finalized {
                desc.mark_complete();
            }
        }
    }
    stage::disconnect::settle(p, selector)?;
    p.bag.collect_finalized();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, CallbackEventHandler, EventMultiHandler};
    use crate::testing::{MockHandle, MockSelector, MockSocket};
    use sockio_core::{
        CryptoMethod, EventKind, FixedLengthFramePicker, HandshakeStatus, MarkerFramePicker,
        RawFramePicker, Timeout, TimeoutPhase,
    };
    use sockio_module::ConstantLimitationSolver;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    type Log = Rc<RefCell<Vec<(SocketId, EventKind)>>>;

    fn recorder(log: &Log) -> impl EventHandler + 'static {
        let log = log.clone();
        handler_fn(move |e| {
            log.borrow_mut().push((e.socket_id(), e.kind()));
            Ok(())
        })
    }

    fn kinds(log: &Log, id: SocketId) -> Vec<EventKind> {
        log.borrow()
            .iter()
            .filter(|(i, _)| *i == id)
            .map(|(_, k)| *k)
            .collect()
    }

    fn executor() -> RequestExecutor<MockSelector> {
        RequestExecutor::new(MockSelector::default()).with_config(ExecutorConfig::new())
    }

    fn http_socket() -> (MockSocket, MockHandle) {
        let (sock, state) = MockSocket::pair();
        state
            .borrow_mut()
            .incoming
            .extend([b"HTTP/1.1 200 OK\r\n".to_vec(), b"\r\nbody".to_vec()]);
        (sock, state)
    }

    #[test]
    fn test_event_order_for_request() {
        let log: Log = Rc::default();
        let (sock, state) = http_socket();
        let mut exec = executor().with_event_handler(recorder(&log));

        let op = Operation::write("GET / HTTP/1.1\r\n\r\n")
            .then(Operation::read(MarkerFramePicker::until("\r\n\r\n")));
        let meta = SocketMetadata::new().address("tcp://127.0.0.1:80");
        let id = exec.add_socket(Box::new(sock), op, Some(meta), None).unwrap();

        exec.execute_request().unwrap();

        assert_eq!(
            kinds(&log, id),
            vec![
                EventKind::Initialize,
                EventKind::Connected,
                EventKind::Write,
                EventKind::Read,
                EventKind::Disconnected,
                EventKind::Finalize,
            ]
        );
        let s = state.borrow();
        assert_eq!(s.written, b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(s.last_address.as_deref(), Some("tcp://127.0.0.1:80"));
        assert_eq!(s.closed, 1);
        assert!(!exec.has_socket(id));
        assert!(!exec.is_executing());
    }

    #[test]
    fn test_read_handler_chains_next_operation() {
        let frames = Rc::new(RefCell::new(Vec::new()));
        let seen = frames.clone();
        let (sock, state) = MockSocket::pair();
        state
            .borrow_mut()
            .incoming
            .extend([b"abcdef".to_vec()]);

        let handler = CallbackEventHandler::new().on(EventKind::Read, move |e| {
            let frame = e.take_frame().unwrap();
            let first = seen.borrow().is_empty();
            seen.borrow_mut().push(frame.into_data());
            if first {
                e.set_next_operation(Operation::read(FixedLengthFramePicker::new(3)));
            }
            Ok(())
        });

        let mut exec = executor();
        exec.add_socket(
            Box::new(sock),
            Operation::read(FixedLengthFramePicker::new(3)),
            None,
            Some(Box::new(handler)),
        )
        .unwrap();
        exec.execute_request().unwrap();

        assert_eq!(*frames.borrow(), vec![b"abc".to_vec(), b"def".to_vec()]);
    }

    #[test]
    fn test_single_connected_across_partial_reads() {
        let log: Log = Rc::default();
        let (sock, state) = MockSocket::pair();
        let mut exec = executor().with_event_handler(recorder(&log));
        let id = exec
            .add_socket(Box::new(sock), Operation::read(FixedLengthFramePicker::new(4)), None, None)
            .unwrap();

        exec.begin();
        for chunk in [b"a".to_vec(), b"b".to_vec(), b"cd".to_vec()] {
            assert!(exec.run_pass().unwrap());
            state.borrow_mut().incoming.push_back(chunk);
        }
        while exec.run_pass().unwrap() {}
        exec.end();

        let events = kinds(&log, id);
        assert_eq!(events.iter().filter(|k| **k == EventKind::Connected).count(), 1);
        assert_eq!(events.iter().filter(|k| **k == EventKind::Read).count(), 1);
        assert_eq!(events.last(), Some(&EventKind::Finalize));
    }

    #[test]
    fn test_short_writes_resume_without_event() {
        let log: Log = Rc::default();
        let (sock, state) = MockSocket::pair();
        state.borrow_mut().write_limit = Some(3);

        let mut exec = executor()
            .with_event_handler(recorder(&log))
            .with_config(ExecutorConfig::new().write_chunk_size(4));
        let id = exec
            .add_socket(
                Box::new(sock),
                Operation::write_chunks(vec![b"hello ".to_vec(), b"world".to_vec()]),
                None,
                None,
            )
            .unwrap();
        exec.execute_request().unwrap();

        assert_eq!(state.borrow().written, b"hello world");
        let writes = kinds(&log, id)
            .into_iter()
            .filter(|k| *k == EventKind::Write)
            .count();
        assert_eq!(writes, 1);
    }

    #[test]
    fn test_write_event_replaces_data() {
        let (sock, state) = MockSocket::pair();
        let handler = CallbackEventHandler::new().on(EventKind::Write, |e| {
            e.set_write_data("replaced");
            Ok(())
        });
        let mut exec = executor().with_event_handler(handler);
        exec.add_socket(Box::new(sock), Operation::write("original"), None, None)
            .unwrap();
        exec.execute_request().unwrap();

        assert_eq!(state.borrow().written, b"replaced");
    }

    #[test]
    fn test_network_error_routes_to_exception() {
        let log: Log = Rc::default();
        let (sock, state) = MockSocket::pair();
        state.borrow_mut().eof = true;

        let mut exec = executor().with_event_handler(recorder(&log));
        let id = exec
            .add_socket(Box::new(sock), Operation::read(RawFramePicker::new()), None, None)
            .unwrap();
        exec.execute_request().unwrap();

        assert_eq!(
            kinds(&log, id),
            vec![
                EventKind::Initialize,
                EventKind::Connected,
                EventKind::Exception,
                EventKind::Disconnected,
                EventKind::Finalize,
            ]
        );
    }

    #[test]
    fn test_open_failure_skips_disconnected() {
        let log: Log = Rc::default();
        let (sock, state) = MockSocket::pair();
        state.borrow_mut().open_error = Some(SockError::network("refused"));

        let mut exec = executor().with_event_handler(recorder(&log));
        let id = exec.add_socket(Box::new(sock), Operation::Null, None, None).unwrap();
        exec.execute_request().unwrap();

        assert_eq!(
            kinds(&log, id),
            vec![EventKind::Initialize, EventKind::Exception, EventKind::Finalize]
        );
    }

    #[test]
    fn test_handler_error_is_fatal() {
        let (first, first_state) = MockSocket::pair();
        let (second, second_state) = MockSocket::pair();
        let handler = CallbackEventHandler::new().on(EventKind::Connected, |_| {
            Err(SockError::handler("boom"))
        });

        let mut exec = executor().with_event_handler(handler);
        exec.add_socket(Box::new(first), Operation::write("x"), None, None).unwrap();
        exec.add_socket(Box::new(second), Operation::write("y"), None, None).unwrap();

        let err = exec.execute_request().unwrap_err();
        assert_eq!(err, SockError::handler("boom"));
        assert!(!exec.is_executing());
        assert!(exec.bag().is_empty());
        assert_eq!(first_state.borrow().closed, 1);
        assert_eq!(second_state.borrow().closed, 1);
    }

    #[test]
    fn test_selector_failure_is_fatal() {
        let mut exec = executor();
        exec.selector_mut().fail = Some(SockError::Selector(9));
        exec.add_socket(Box::new(MockSocket::new()), Operation::write("x"), None, None)
            .unwrap();
        assert_eq!(exec.execute_request().unwrap_err(), SockError::Selector(9));
    }

    #[test]
    fn test_already_executing_and_not_executing() {
        let mut exec = executor();
        assert_eq!(exec.stop_request().unwrap_err(), SockError::NotExecuting);

        exec.begin();
        assert_eq!(exec.execute_request().unwrap_err(), SockError::AlreadyExecuting);
        exec.stop_request().unwrap();
        exec.end();
    }

    #[test]
    fn test_solver_bound_holds_every_pass() {
        let mut exec = executor().with_limitation_solver(ConstantLimitationSolver::new(2));
        let mut handles = Vec::new();
        for _ in 0..5 {
            let (sock, state) = MockSocket::pair();
            handles.push(state);
            exec.add_socket(Box::new(sock), Operation::read(FixedLengthFramePicker::new(2)), None, None)
                .unwrap();
        }

        exec.begin();
        let mut passes = 0;
        loop {
            // one byte per pass, so each socket needs several passes
            for state in &handles {
                state.borrow_mut().incoming.push_back(b"x".to_vec());
            }
            let more = exec.run_pass().unwrap();
            assert!(exec.bag().running_count() <= 2);
            passes += 1;
            if !more {
                break;
            }
            assert!(passes < 100);
        }
        exec.end();

        for state in &handles {
            assert_eq!(state.borrow().opened, 1);
            assert_eq!(state.borrow().closed, 1);
        }
    }

    #[test]
    fn test_newly_admitted_policy_keeps_running_sockets() {
        let mut exec = executor()
            .with_limitation_solver(ConstantLimitationSolver::new(1))
            .with_return_policy(ReturnPolicy::NewlyAdmitted);
        let mut handles = Vec::new();
        for _ in 0..3 {
            let (sock, state) = MockSocket::pair();
            state.borrow_mut().incoming.push_back(b"abcd".to_vec());
            handles.push(state);
            exec.add_socket(Box::new(sock), Operation::read(FixedLengthFramePicker::new(4)), None, None)
                .unwrap();
        }
        exec.execute_request().unwrap();

        for state in &handles {
            assert_eq!(state.borrow().closed, 1);
        }
    }

    #[test]
    fn test_connect_timeout_one_more_attempt() {
        let log: Log = Rc::default();
        let retried = Rc::new(RefCell::new(false));
        let flag = retried.clone();

        let (sock, state) = MockSocket::pair();
        let handler = CallbackEventHandler::new().on(EventKind::Timeout, move |e| {
            if !*flag.borrow() {
                *flag.borrow_mut() = true;
                e.enable_one_more_attempt();
            }
            Ok(())
        });
        let meta = SocketMetadata::new().connect_timeout(Duration::from_millis(20));

        let mut exec = executor().with_event_handler(recorder(&log));
        let id = exec
            .add_socket(Box::new(sock), Operation::write("x"), Some(meta), Some(Box::new(handler)))
            .unwrap();
        exec.selector_mut().stalled.insert(id);
        exec.execute_request().unwrap();

        assert_eq!(state.borrow().opened, 2);
        assert_eq!(
            kinds(&log, id),
            vec![
                EventKind::Initialize,
                EventKind::Timeout,
                EventKind::Timeout,
                EventKind::Finalize,
            ]
        );
    }

    #[test]
    fn test_connectionless_read_times_out_on_silent_peer() {
        let log: Log = Rc::default();
        let phases = Rc::new(RefCell::new(Vec::new()));
        let seen = phases.clone();

        let (sock, state) = MockSocket::pair();
        state.borrow_mut().connectionless = true;
        let handler = CallbackEventHandler::new().on(EventKind::Timeout, move |e| {
            seen.borrow_mut().extend(e.timeout_phase());
            Ok(())
        });
        let meta = SocketMetadata::new().io_timeout(Duration::from_millis(30));

        let mut exec = executor().with_event_handler(recorder(&log));
        let id = exec
            .add_socket(
                Box::new(sock),
                Operation::read(RawFramePicker::new()),
                Some(meta),
                Some(Box::new(handler)),
            )
            .unwrap();
        exec.execute_request().unwrap();

        assert_eq!(*phases.borrow(), vec![TimeoutPhase::DuringIo]);
        assert_eq!(
            kinds(&log, id),
            vec![
                EventKind::Initialize,
                EventKind::Connected,
                EventKind::Timeout,
                EventKind::Disconnected,
                EventKind::Finalize,
            ]
        );
        assert_eq!(state.borrow().closed, 1);
        assert_eq!(exec.selector().selects, 0);
    }

    #[test]
    fn test_partial_read_with_bytes_is_not_idle() {
        let log: Log = Rc::default();
        let (sock, state) = MockSocket::pair();
        state.borrow_mut().incoming.push_back(b"he".to_vec());
        let meta = SocketMetadata::new().io_timeout(Duration::from_millis(20));

        let mut exec = executor().with_event_handler(recorder(&log));
        let id = exec
            .add_socket(
                Box::new(sock),
                Operation::read(FixedLengthFramePicker::new(5)),
                Some(meta),
                None,
            )
            .unwrap();

        exec.begin();
        assert!(exec.run_pass().unwrap());
        std::thread::sleep(Duration::from_millis(40));

        // past the deadline, but bytes moved this pass
        state.borrow_mut().incoming.push_back(b"ll".to_vec());
        assert!(exec.run_pass().unwrap());
        assert!(!kinds(&log, id).contains(&EventKind::Timeout));

        // nothing arrives
        assert!(!exec.run_pass().unwrap());
        exec.end();
        assert_eq!(
            kinds(&log, id),
            vec![
                EventKind::Initialize,
                EventKind::Connected,
                EventKind::Timeout,
                EventKind::Disconnected,
                EventKind::Finalize,
            ]
        );
    }

    #[test]
    fn test_io_timeout_forever_never_expires_in_select_wait() {
        let mut exec = executor();
        let meta = SocketMetadata::new()
            .io_timeout(Timeout::Forever)
            .connect_timeout(Timeout::Forever);
        let id = exec
            .add_socket(Box::new(MockSocket::new()), Operation::write("x"), Some(meta), None)
            .unwrap();
        exec.selector_mut().stalled.insert(id);

        exec.begin();
        exec.run_pass().unwrap();
        assert_eq!(exec.selector().last_timeout, Some(None));
        exec.stop_request().unwrap();
        while exec.run_pass().unwrap() {}
        exec.end();
    }

    #[test]
    fn test_guardian_alerts_then_closes() {
        let alerts = Rc::new(RefCell::new(Vec::new()));
        let errors = Rc::new(RefCell::new(Vec::new()));
        let (a, e) = (alerts.clone(), errors.clone());

        let handler = CallbackEventHandler::new()
            .on(EventKind::DataAlert, move |ev| {
                a.borrow_mut().push(ev.data_alert().unwrap());
                Ok(())
            })
            .on(EventKind::Exception, move |ev| {
                e.borrow_mut().push(ev.error().cloned().unwrap());
                Ok(())
            });

        let (sock, state) = MockSocket::connected();
        let mut exec = executor().with_event_handler(handler);
        let id = exec.add_socket(Box::new(sock), Operation::Null, None, None).unwrap();
        exec.execute_request().unwrap();

        let alerts = alerts.borrow();
        assert_eq!(alerts.len(), 24);
        assert_eq!(alerts[0], (1, 25));
        assert_eq!(alerts[23], (24, 25));
        assert_eq!(
            *errors.borrow(),
            vec![SockError::UnmanagedSocket { id, attempts: 25 }]
        );
        assert_eq!(state.borrow().closed, 1);
    }

    #[test]
    fn test_guardian_spared_by_late_operation() {
        let errors = Rc::new(RefCell::new(0));
        let e = errors.clone();

        let handler = CallbackEventHandler::new()
            .on(EventKind::DataAlert, |ev| {
                if ev.data_alert() == Some((24, 25)) {
                    ev.set_next_operation(Operation::write("bye"));
                }
                Ok(())
            })
            .on(EventKind::Exception, move |_| {
                *e.borrow_mut() += 1;
                Ok(())
            });

        let (sock, state) = MockSocket::connected();
        let mut exec = executor().with_event_handler(handler);
        exec.add_socket(Box::new(sock), Operation::Null, None, None).unwrap();
        exec.execute_request().unwrap();

        assert_eq!(*errors.borrow(), 0);
        assert_eq!(state.borrow().written, b"bye");
    }

    #[test]
    fn test_stop_request_drains_sockets() {
        let log: Log = Rc::default();
        let (first, _) = MockSocket::pair();
        let (second, second_state) = MockSocket::pair();

        let handler = CallbackEventHandler::new().on(EventKind::Connected, |e| e.stop_request());
        let mut exec = executor().with_event_handler(both(handler, recorder(&log)));
        let a = exec
            .add_socket(Box::new(first), Operation::read(RawFramePicker::new()), None, None)
            .unwrap();
        let b = exec
            .add_socket(Box::new(second), Operation::read(RawFramePicker::new()), None, None)
            .unwrap();
        exec.execute_request().unwrap();

        // the first CONNECTED stops the request; the second is suppressed
        assert_eq!(kinds(&log, a).last(), Some(&EventKind::Finalize));
        assert_eq!(kinds(&log, b).last(), Some(&EventKind::Finalize));
        assert!(!kinds(&log, b).contains(&EventKind::Read));
        assert_eq!(second_state.borrow().closed, 1);
        assert!(exec.bag().is_empty());
    }

    #[test]
    fn test_cancel_disconnects_silently() {
        let log: Log = Rc::default();
        let (sock, state) = http_socket();
        let handler = CallbackEventHandler::new().on(EventKind::Write, |e| {
            e.cancel_operation();
            Ok(())
        });
        let mut exec = executor().with_event_handler(both(recorder(&log), handler));
        let id = exec.add_socket(Box::new(sock), Operation::write("x"), None, None).unwrap();
        exec.execute_request().unwrap();

        assert!(state.borrow().written.is_empty());
        assert!(!kinds(&log, id).contains(&EventKind::Exception));
        assert_eq!(kinds(&log, id).last(), Some(&EventKind::Finalize));
    }

    #[test]
    fn test_read_write_composite() {
        let (sock, state) = http_socket();
        let read_frames = Rc::new(RefCell::new(0));
        let seen = read_frames.clone();
        let handler = CallbackEventHandler::new().on(EventKind::Read, move |_| {
            *seen.borrow_mut() += 1;
            Ok(())
        });

        let mut exec = executor().with_event_handler(handler);
        let op = Operation::read_write(
            Some(Operation::read(MarkerFramePicker::until("\r\n\r\n"))),
            Some(Operation::write("request")),
            false,
        );
        exec.add_socket(Box::new(sock), op, None, None).unwrap();
        exec.execute_request().unwrap();

        assert_eq!(state.borrow().written, b"request");
        assert_eq!(*read_frames.borrow(), 1);
    }

    #[test]
    fn test_read_write_rejects_nested_handshake() {
        let mut exec = executor();
        let op = Operation::read_write(
            Some(Operation::handshake(CryptoMethod::TlsClient, Operation::Null)),
            None,
            true,
        );
        exec.add_socket(Box::new(MockSocket::new()), op, None, None).unwrap();
        assert!(matches!(
            exec.execute_request().unwrap_err(),
            SockError::InvalidOperation(_)
        ));
    }

    #[test]
    fn test_handshake_then_next_operation() {
        let (sock, state) = MockSocket::pair();
        state
            .borrow_mut()
            .handshakes
            .extend([HandshakeStatus::InProgress, HandshakeStatus::Done]);

        let mut exec = executor();
        let op = Operation::handshake(CryptoMethod::Tls13Client, Operation::write("secure"));
        exec.add_socket(Box::new(sock), op, None, None).unwrap();
        exec.execute_request().unwrap();

        assert_eq!(state.borrow().written, b"secure");
        assert!(state.borrow().handshakes.is_empty());
    }

    #[test]
    fn test_failed_handshake_raises_exception() {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let e = errors.clone();
        let (sock, state) = MockSocket::pair();
        state.borrow_mut().handshakes.push_back(HandshakeStatus::Failed);

        let handler = CallbackEventHandler::new().on(EventKind::Exception, move |ev| {
            e.borrow_mut().push(ev.error().cloned().unwrap());
            Ok(())
        });
        let mut exec = executor().with_event_handler(handler);
        let op = Operation::handshake(CryptoMethod::TlsClient, Operation::write("never"));
        exec.add_socket(Box::new(sock), op, None, None).unwrap();
        exec.execute_request().unwrap();

        assert!(matches!(errors.borrow()[0], SockError::Handshake(_)));
        assert!(state.borrow().written.is_empty());
    }

    #[test]
    fn test_oob_event_installs_operation() {
        let oob = Rc::new(RefCell::new(Vec::new()));
        let seen = oob.clone();
        let (sock, state) = MockSocket::connected();
        state.borrow_mut().oob.push_back(b'!');

        let handler = CallbackEventHandler::new().on(EventKind::Oob, move |e| {
            seen.borrow_mut().extend_from_slice(e.frame().unwrap().data());
            e.set_next_operation(Operation::write("ack"));
            Ok(())
        });
        let mut exec = executor().with_event_handler(handler);
        let id = exec
            .add_socket(Box::new(sock), Operation::read(RawFramePicker::new()), None, None)
            .unwrap();
        exec.selector_mut().oob_ready.insert(id);
        exec.execute_request().unwrap();

        assert_eq!(*oob.borrow(), b"!");
        assert_eq!(state.borrow().written, b"ack");
    }

    #[test]
    fn test_delayed_operation_runs_after_predicate() {
        let polls = Rc::new(RefCell::new(0));
        let counter = polls.clone();
        let (sock, state) = MockSocket::pair();
        let op = Operation::delayed(Operation::write("late"), move |_, _| {
            *counter.borrow_mut() += 1;
            *counter.borrow() < 3
        });

        let mut exec = executor()
            .with_config(ExecutorConfig::new().delay_poll_interval(Duration::from_millis(1)));
        exec.add_socket(Box::new(sock), op, None, None).unwrap();
        exec.execute_request().unwrap();

        assert_eq!(*polls.borrow(), 3);
        assert_eq!(state.borrow().written, b"late");
    }

    #[test]
    fn test_keep_alive_socket_retained_and_postponed() {
        let (sock, state) = MockSocket::pair();
        state.borrow_mut().live = true;
        let meta = SocketMetadata::new().keep_alive(true);

        let park = Rc::new(Cell::new(false));
        let flag = park.clone();
        let handler = CallbackEventHandler::new().on(EventKind::Connected, move |e| {
            if flag.get() {
                let id = e.socket_id();
                e.executor().postpone_socket(id)?;
            }
            Ok(())
        });

        let mut exec = executor().with_event_handler(handler);
        let id = exec
            .add_socket(Box::new(sock), Operation::write("one"), Some(meta), None)
            .unwrap();
        exec.execute_request().unwrap();
        assert!(exec.has_socket(id));
        assert_eq!(state.borrow().closed, 0);

        exec.set_socket_operation(id, Operation::write("two")).unwrap();
        exec.execute_request().unwrap();
        assert_eq!(state.borrow().written, b"onetwo");

        // parked while waiting for a read that never arrives
        park.set(true);
        exec.set_socket_operation(id, Operation::read(RawFramePicker::new()))
            .unwrap();
        exec.execute_request().unwrap();
        assert!(exec.has_socket(id));
        assert_eq!(state.borrow().closed, 0);
        assert_eq!(state.borrow().opened, 3);

        exec.remove_socket(id).unwrap();
        assert_eq!(exec.take_released_sockets().len(), 1);
    }

    #[test]
    fn test_accept_client_added_from_handler() {
        let log: Log = Rc::default();
        let (client, client_state) = MockSocket::connected();
        client_state
            .borrow_mut()
            .incoming
            .push_back(b"ping".to_vec());

        let pending = Rc::new(RefCell::new(Some(client)));
        let handler = CallbackEventHandler::new().on(EventKind::DataArrived, move |e| {
            if let Some(client) = pending.borrow_mut().take() {
                let op = Operation::read(FixedLengthFramePicker::new(4));
                e.executor().add_socket(Box::new(client), op, None, None)?;
            }
            e.cancel_operation();
            Ok(())
        });

        let (listener, _) = MockSocket::connected();
        let mut exec = executor().with_event_handler(both(recorder(&log), handler));
        exec.add_socket(Box::new(listener), Operation::Null, None, None)
            .unwrap();
        exec.execute_request().unwrap();

        let reads = log
            .borrow()
            .iter()
            .filter(|(_, k)| *k == EventKind::Read)
            .count();
        assert_eq!(reads, 1);
    }

    /// Two handlers run in order
    fn both(
        first: impl EventHandler + 'static,
        second: impl EventHandler + 'static,
    ) -> EventMultiHandler {
        EventMultiHandler::new().with(first).with(second)
    }
}
