//! Send / wait / classify / retry loop

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::app::{AppContext, AppEvent};
use crate::config::{ProbeSettings, SequencePolicy};
use crate::error::ProbeError;
use crate::probe::classify::{classify, ReplyVerdict};
use crate::probe::packet::EchoRequest;
use crate::probe::transport::{IcmpTransport, RecvOutcome};

/// Blocking delay between attempts, swappable in tests.
pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Counters for one probe run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeStats {
    pub attempts: u32,
    pub timeouts: u32,
    pub send_errors: u32,
    pub receive_errors: u32,
    pub unrelated: u32,
    pub malformed: u32,
    pub oversized: u32,
}

/// Target, request and the channel that carries it.
///
/// The transport is owned here and released when the session drops, on the
/// success path and on every error path.
pub struct ProbeSession<T> {
    target: String,
    address: Ipv4Addr,
    request: EchoRequest,
    transport: T,
}

impl<T: IcmpTransport> ProbeSession<T> {
    pub fn with_transport(
        target: impl Into<String>,
        address: Ipv4Addr,
        request: EchoRequest,
        transport: T,
    ) -> Self {
        Self {
            target: target.into(),
            address,
            request,
            transport,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn request(&self) -> &EchoRequest {
        &self.request
    }

    /// Writes `request` to the channel.
    pub fn send_request(&mut self, request: &EchoRequest) -> Result<(), ProbeError> {
        self.transport
            .send(&request.to_bytes())
            .map_err(ProbeError::Send)
    }

    /// Waits up to `timeout` for the next datagram.
    pub fn await_reply(&mut self, timeout: Duration) -> RecvOutcome {
        self.transport.recv(timeout)
    }
}

/// Drives a session until a matching echo reply arrives.
///
/// There is no retry limit. Timeouts resend immediately; unrelated replies
/// and receive errors resend after the configured delay.
pub struct Prober<P = ThreadSleep> {
    settings: ProbeSettings,
    pauser: P,
}

impl<P: Pause> Prober<P> {
    pub fn with_pause(settings: ProbeSettings, pauser: P) -> Self {
        Self { settings, pauser }
    }

    pub fn pauser(&self) -> &P {
        &self.pauser
    }

    /// Runs until matched and returns the counters. Progress lines go to the
    /// context's output hook.
    pub fn run<T: IcmpTransport>(
        &mut self,
        session: &mut ProbeSession<T>,
        context: &AppContext,
    ) -> ProbeStats {
        let mut stats = ProbeStats::default();
        let mut current = session.request().clone();

        context.emit_line(&format!("Pinging {}...", session.target()));

        loop {
            if self.settings.sequence == SequencePolicy::Increment {
                current = session.request().with_sequence(stats.attempts as u16);
            }
            stats.attempts += 1;
            let attempt = stats.attempts;

            if let Err(e) = session.send_request(&current) {
                stats.send_errors += 1;
                crate::log_warn!("Attempt {}: {}", attempt, e);
                context.emit_line(&e.to_string());
                context.emit_event(AppEvent::SendFailed {
                    attempt,
                    message: e.to_string(),
                });
            }

            match session.await_reply(self.settings.reply_timeout()) {
                RecvOutcome::TimedOut => {
                    stats.timeouts += 1;
                    crate::log_debug!(
                        "Attempt {}: no reply within {:?}",
                        attempt,
                        self.settings.reply_timeout()
                    );
                    context.emit_event(AppEvent::AttemptTimedOut { attempt });
                    continue;
                }
                RecvOutcome::Failed(e) => {
                    let err = ProbeError::Receive(e);
                    stats.receive_errors += 1;
                    crate::log_warn!("Attempt {}: {}", attempt, err);
                    context.emit_line(&err.to_string());
                    context.emit_event(AppEvent::ReceiveFailed {
                        attempt,
                        message: err.to_string(),
                    });
                }
                RecvOutcome::Received(datagram) => {
                    if datagram.is_truncated() {
                        stats.oversized += 1;
                        crate::log_warn!(
                            "Attempt {}: datagram exceeded {} bytes and was truncated",
                            attempt,
                            datagram.len()
                        );
                    }

                    match classify(datagram.as_slice(), &current) {
                        ReplyVerdict::Match => {
                            context.emit_line("Ping successful!");
                            context.emit_event(AppEvent::Matched { attempts: attempt });
                            crate::log_stderr!(
                                "Echo reply from {} after {} attempt(s)",
                                session.address(),
                                attempt
                            );
                            return stats;
                        }
                        ReplyVerdict::Unrelated(reply) => {
                            stats.unrelated += 1;
                            context.emit_line(&format!(
                                "Received ICMP packet: type={} code={} id={} seq={} data={}",
                                reply.icmp_type,
                                reply.code,
                                reply.identifier,
                                reply.sequence,
                                reply.payload_quoted()
                            ));
                            context.emit_event(AppEvent::UnrelatedReply {
                                attempt,
                                icmp_type: reply.icmp_type,
                                code: reply.code,
                                identifier: reply.identifier,
                                sequence: reply.sequence,
                            });
                        }
                        ReplyVerdict::Truncated { len } => {
                            stats.malformed += 1;
                            context.emit_line(&format!(
                                "Received ICMP packet: {} byte(s), too short for an echo header",
                                len
                            ));
                            context.emit_event(AppEvent::MalformedReply { attempt, len });
                        }
                    }
                }
            }

            self.pauser.pause(self.settings.retry_delay());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChecksumMode, ECHO_PAYLOAD};
    use crate::probe::transport::ReceiveBuffer;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    const ID: u16 = 0x0A0B;

    struct Scripted {
        replies: VecDeque<RecvOutcome>,
        sent: Vec<Vec<u8>>,
        fail_sends: usize,
    }

    impl Scripted {
        fn new(replies: Vec<RecvOutcome>) -> Self {
            Self {
                replies: replies.into(),
                sent: Vec::new(),
                fail_sends: 0,
            }
        }
    }

    impl IcmpTransport for Scripted {
        fn send(&mut self, message: &[u8]) -> io::Result<()> {
            if self.fail_sends > 0 {
                self.fail_sends -= 1;
                return Err(io::Error::new(io::ErrorKind::Other, "network is down"));
            }
            self.sent.push(message.to_vec());
            Ok(())
        }

        fn recv(&mut self, _timeout: Duration) -> RecvOutcome {
            self.replies.pop_front().expect("script exhausted before a match")
        }
    }

    #[derive(Default)]
    struct Recorded(Vec<Duration>);

    impl Pause for Recorded {
        fn pause(&mut self, duration: Duration) {
            self.0.push(duration);
        }
    }

    fn reply(icmp_type: u8, id: u16, seq: u16, payload: &[u8]) -> RecvOutcome {
        let mut raw = vec![icmp_type, 0, 0, 0];
        raw.extend_from_slice(&id.to_be_bytes());
        raw.extend_from_slice(&seq.to_be_bytes());
        raw.extend_from_slice(payload);
        RecvOutcome::Received(Box::new(ReceiveBuffer::copy_from(&raw)))
    }

    fn capture() -> (AppContext, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let context = AppContext::default().with_output_hook(Arc::new(move |line: &str| {
            sink.lock().expect("output lock").push(line.to_string());
        }));
        (context, lines)
    }

    fn session(script: Scripted) -> ProbeSession<Scripted> {
        let request = EchoRequest::new(ID, 0, ECHO_PAYLOAD, ChecksumMode::Zero);
        ProbeSession::with_transport("test-host", Ipv4Addr::LOCALHOST, request, script)
    }

    #[test]
    fn timeouts_retry_without_delay() {
        let mut script = vec![RecvOutcome::TimedOut, RecvOutcome::TimedOut];
        script.push(reply(0, ID, 0, ECHO_PAYLOAD));
        let mut session = session(Scripted::new(script));
        let (context, lines) = capture();

        let mut prober = Prober::with_pause(ProbeSettings::default(), Recorded::default());
        let stats = prober.run(&mut session, &context);

        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.timeouts, 2);
        assert!(prober.pauser().0.is_empty());
        assert_eq!(session.transport.sent.len(), 3);
        let lines = lines.lock().expect("output lock");
        assert_eq!(lines.first().map(String::as_str), Some("Pinging test-host..."));
        assert_eq!(lines.last().map(String::as_str), Some("Ping successful!"));
    }

    #[test]
    fn fixed_policy_retransmits_identical_bytes() {
        let script = vec![
            RecvOutcome::TimedOut,
            reply(3, 0, 0, b""),
            reply(0, ID, 0, ECHO_PAYLOAD),
        ];
        let mut session = session(Scripted::new(script));
        let (context, _) = capture();

        Prober::with_pause(ProbeSettings::default(), Recorded::default())
            .run(&mut session, &context);

        let sent = &session.transport.sent;
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|bytes| bytes == &sent[0]));
    }

    #[test]
    fn unrelated_reply_is_printed_then_delayed() {
        let script = vec![reply(8, ID, 0, ECHO_PAYLOAD), reply(0, ID, 0, ECHO_PAYLOAD)];
        let mut session = session(Scripted::new(script));
        let (context, lines) = capture();

        let mut prober = Prober::with_pause(ProbeSettings::default(), Recorded::default());
        let stats = prober.run(&mut session, &context);

        assert_eq!(stats.unrelated, 1);
        assert_eq!(prober.pauser().0, vec![Duration::from_secs(5)]);
        let lines = lines.lock().expect("output lock");
        assert!(lines.contains(&format!(
            "Received ICMP packet: type=8 code=0 id={} seq=0 data=\"Hello, world!\"",
            ID
        )));
    }

    #[test]
    fn receive_error_is_reported_then_delayed() {
        let script = vec![
            RecvOutcome::Failed(io::Error::new(io::ErrorKind::Other, "bad descriptor")),
            reply(0, ID, 0, ECHO_PAYLOAD),
        ];
        let mut session = session(Scripted::new(script));
        let (context, lines) = capture();

        let mut prober = Prober::with_pause(ProbeSettings::default(), Recorded::default());
        let stats = prober.run(&mut session, &context);

        assert_eq!(stats.receive_errors, 1);
        assert_eq!(prober.pauser().0.len(), 1);
        let lines = lines.lock().expect("output lock");
        assert!(lines.contains(&"Error receiving ICMP packet: bad descriptor".to_string()));
    }

    #[test]
    fn send_failure_does_not_stop_the_loop() {
        let mut script = Scripted::new(vec![RecvOutcome::TimedOut, reply(0, ID, 0, ECHO_PAYLOAD)]);
        script.fail_sends = 1;
        let mut session = session(script);
        let (context, lines) = capture();

        let stats = Prober::with_pause(ProbeSettings::default(), Recorded::default())
            .run(&mut session, &context);

        assert_eq!(stats.send_errors, 1);
        assert_eq!(stats.attempts, 2);
        let lines = lines.lock().expect("output lock");
        assert!(lines.contains(&"Error sending ICMP packet: network is down".to_string()));
    }

    #[test]
    fn short_datagram_counts_as_malformed() {
        let script = vec![
            RecvOutcome::Received(Box::new(ReceiveBuffer::copy_from(&[0, 0]))),
            reply(0, ID, 0, ECHO_PAYLOAD),
        ];
        let mut session = session(Scripted::new(script));
        let (context, _) = capture();

        let mut prober = Prober::with_pause(ProbeSettings::default(), Recorded::default());
        let stats = prober.run(&mut session, &context);

        assert_eq!(stats.malformed, 1);
        assert_eq!(prober.pauser().0.len(), 1);
    }

    #[test]
    fn oversized_datagram_is_counted_and_still_classified() {
        let script = vec![
            RecvOutcome::Received(Box::new(ReceiveBuffer::copy_from(&[0xAB; 1600]))),
            reply(0, ID, 0, ECHO_PAYLOAD),
        ];
        let mut session = session(Scripted::new(script));
        let (context, lines) = capture();

        let mut prober = Prober::with_pause(ProbeSettings::default(), Recorded::default());
        let stats = prober.run(&mut session, &context);

        assert_eq!(stats.oversized, 1);
        assert_eq!(stats.unrelated, 1);
        assert_eq!(stats.attempts, 2);
        assert_eq!(prober.pauser().0, vec![Duration::from_secs(5)]);
        let lines = lines.lock().expect("output lock");
        assert!(lines
            .iter()
            .any(|line| line.starts_with("Received ICMP packet: type=171 code=171 id=43947")));
        assert_eq!(lines.last().map(String::as_str), Some("Ping successful!"));
    }

    #[test]
    fn binary_payload_is_escaped_in_dump_line() {
        let script = vec![reply(3, ID, 0, &[0x00, 0xff, b'a']), reply(0, ID, 0, ECHO_PAYLOAD)];
        let mut session = session(Scripted::new(script));
        let (context, lines) = capture();

        Prober::with_pause(ProbeSettings::default(), Recorded::default())
            .run(&mut session, &context);

        let lines = lines.lock().expect("output lock");
        let expected = format!(
            "Received ICMP packet: type=3 code=0 id={} seq=0 data=\"\\x00\\xffa\"",
            ID
        );
        assert!(lines.contains(&expected), "missing dump line in {:?}", lines);
    }

    #[test]
    fn increment_policy_expects_latest_sequence() {
        let settings = ProbeSettings {
            sequence: SequencePolicy::Increment,
            ..ProbeSettings::default()
        };
        // A late reply to attempt 0 arrives during attempt 1 and must not match.
        let script = vec![
            RecvOutcome::TimedOut,
            reply(0, ID, 0, ECHO_PAYLOAD),
            reply(0, ID, 2, ECHO_PAYLOAD),
        ];
        let mut session = session(Scripted::new(script));
        let (context, _) = capture();

        let mut prober = Prober::with_pause(settings, Recorded::default());
        let stats = prober.run(&mut session, &context);

        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.unrelated, 1);
        let sequences: Vec<u16> = session
            .transport
            .sent
            .iter()
            .map(|bytes| u16::from_be_bytes([bytes[6], bytes[7]]))
            .collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn events_follow_the_loop() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let (context, _) = capture();
        let context = context.with_event_hook(Arc::new(move |event: &AppEvent| {
            sink.lock().expect("event lock").push(event.clone());
        }));

        let script = vec![RecvOutcome::TimedOut, reply(0, ID, 0, ECHO_PAYLOAD)];
        let mut session = session(Scripted::new(script));
        Prober::with_pause(ProbeSettings::default(), Recorded::default())
            .run(&mut session, &context);

        let events = events.lock().expect("event lock");
        assert_eq!(
            *events,
            vec![
                AppEvent::AttemptTimedOut { attempt: 1 },
                AppEvent::Matched { attempts: 2 },
            ]
        );
    }
}
