use std::borrow::Cow;
use std::collections::VecDeque;
use std::iter::FromIterator;
use std::time::{Duration, Instant};

use futures::task::Poll;

use cdpdrive_types::Response;

use crate::cdp::browser_protocol::target::TargetId;
use crate::error::DeadlineExceeded;
use crate::handler::REQUEST_TIMEOUT;

#[derive(Debug)]
pub struct CommandChain {
    /// The commands to process: (method identifier, params)
    cmds: VecDeque<(Cow<'static, str>, serde_json::Value)>,
    /// The last issued command we currently waiting for its completion
    waiting: Option<(Cow<'static, str>, Instant)>,
    /// The window a response after issuing a request must arrive
    timeout: Duration,
}

impl CommandChain {
    /// Creates a new `CommandChain` from an `Iterator`.
    ///
    /// The order of the commands corresponds to the iterator's
    pub fn new<I>(cmds: I) -> Self
    where
        I: IntoIterator<Item = (Cow<'static, str>, serde_json::Value)>,
    {
        Self {
            cmds: VecDeque::from_iter(cmds),
            waiting: None,
            timeout: Duration::from_millis(REQUEST_TIMEOUT),
        }
    }

    /// queue in another request
    pub fn push_back(&mut self, method: Cow<'static, str>, params: serde_json::Value) {
        self.cmds.push_back((method, params))
    }

    /// The method name of the command currently awaiting a response, if any.
    pub fn waiting_method(&self) -> Option<&str> {
        self.waiting.as_ref().map(|(m, _)| m.as_ref())
    }

    /// Removes the waiting state if the identifier matches that of the last
    /// issued command
    pub fn received_response(&mut self, identifier: &str) -> bool {
        return if self.waiting.as_ref().map(|(c, _)| c.as_ref()) == Some(identifier) {
            self.waiting.take();
            true
        } else {
            false
        };
    }

    /// Return the next command to process or `None` if done.
    /// If the response timeout an error is returned instead
    pub fn poll(
        &mut self,
        now: Instant,
    ) -> Poll<Option<Result<(Cow<'static, str>, serde_json::Value), DeadlineExceeded>>> {
        if let Some((_, deadline)) = self.waiting.as_ref() {
            if now > *deadline {
                Poll::Ready(Some(Err(DeadlineExceeded::new(now, *deadline))))
            } else {
                Poll::Pending
            }
        } else {
            if let Some((method, val)) = self.cmds.pop_front() {
                self.waiting = Some((method.clone(), now + self.timeout));
                Poll::Ready(Some(Ok((method, val))))
            } else {
                Poll::Ready(None)
            }
        }
    }
}

impl Default for CommandChain {
    fn default() -> Self {
        Self {
            cmds: Default::default(),
            waiting: None,
            timeout: Duration::from_millis(REQUEST_TIMEOUT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> CommandChain {
        CommandChain::new(vec![
            (Cow::Borrowed("Page.enable"), serde_json::json!({})),
            (Cow::Borrowed("Network.enable"), serde_json::json!({})),
        ])
    }

    #[test]
    fn issues_commands_in_order_and_waits_one_at_a_time() {
        let mut chain = chain();
        let now = Instant::now();

        match chain.poll(now) {
            Poll::Ready(Some(Ok((method, _)))) => assert_eq!(method, "Page.enable"),
            other => panic!("expected first command, got {other:?}"),
        }
        assert_eq!(chain.waiting_method(), Some("Page.enable"));

        // A second poll while still waiting on the first response must not
        // issue the next command.
        assert!(matches!(chain.poll(now), Poll::Pending));

        assert!(chain.received_response("Page.enable"));
        assert_eq!(chain.waiting_method(), None);

        match chain.poll(now) {
            Poll::Ready(Some(Ok((method, _)))) => assert_eq!(method, "Network.enable"),
            other => panic!("expected second command, got {other:?}"),
        }
        assert!(chain.received_response("Network.enable"));
        assert!(matches!(chain.poll(now), Poll::Ready(None)));
    }

    #[test]
    fn received_response_ignores_mismatched_identifier() {
        let mut chain = chain();
        let now = Instant::now();
        chain.poll(now);
        assert!(!chain.received_response("Network.enable"));
        assert_eq!(chain.waiting_method(), Some("Page.enable"));
    }

    #[test]
    fn poll_reports_deadline_exceeded_once_timeout_elapses() {
        let mut chain = chain();
        let now = Instant::now();
        chain.poll(now);
        let past_deadline = now + Duration::from_millis(REQUEST_TIMEOUT) + Duration::from_secs(1);
        match chain.poll(past_deadline) {
            Poll::Ready(Some(Err(_))) => {}
            other => panic!("expected a timeout error, got {other:?}"),
        }
    }

    #[test]
    fn push_back_appends_after_existing_commands() {
        let mut chain = chain();
        chain.push_back(Cow::Borrowed("Runtime.enable"), serde_json::json!({}));
        let now = Instant::now();
        chain.poll(now);
        chain.received_response("Page.enable");
        chain.poll(now);
        chain.received_response("Network.enable");
        match chain.poll(now) {
            Poll::Ready(Some(Ok((method, _)))) => assert_eq!(method, "Runtime.enable"),
            other => panic!("expected the pushed command last, got {other:?}"),
        }
    }
}
