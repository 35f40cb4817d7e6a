//! Download gate state machine.
//!
//! The flow is `Idle -> AwaitingResponse -> Gating -> Redirecting`, driven by
//! user actions and clock ticks. The pending token lives in a single slot that
//! is filled when the server answers and taken exactly once on confirm, so a
//! token can never be consumed twice.

/// Seconds the gate stays closed after a successful response.
pub const GATE_SECONDS: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingResponse,
    Gating { remaining: u8 },
    Redirecting,
}

#[derive(Debug)]
pub struct GateFlow {
    state: GateState,
    token: Option<String>,
}

impl GateFlow {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
            token: None,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// Dispatch a request. Returns false while another request is in flight
    /// or the gate is already open, so duplicate submissions are refused.
    pub fn submit(&mut self) -> bool {
        if self.state != GateState::Idle {
            return false;
        }
        self.state = GateState::AwaitingResponse;
        true
    }

    /// Server accepted: hold the token and open the gate at the full count.
    pub fn response_ok(&mut self, token: String) {
        if self.state != GateState::AwaitingResponse {
            return;
        }
        self.token = Some(token);
        self.state = GateState::Gating {
            remaining: GATE_SECONDS,
        };
    }

    /// Server refused or the request failed: back to idle, nothing held.
    pub fn response_failed(&mut self) {
        if self.state != GateState::AwaitingResponse {
            return;
        }
        self.token = None;
        self.state = GateState::Idle;
    }

    /// One countdown tick. Only meaningful while gating; a stray tick after
    /// the count reached zero must not re-disable confirm.
    pub fn tick(&mut self) {
        if let GateState::Gating { remaining } = &mut self.state {
            *remaining = remaining.saturating_sub(1);
        }
    }

    /// Countdown value while the gate is shown.
    pub fn remaining(&self) -> Option<u8> {
        match self.state {
            GateState::Gating { remaining } => Some(remaining),
            _ => None,
        }
    }

    /// The confirm action is enabled exactly when the countdown has elapsed.
    pub fn can_confirm(&self) -> bool {
        matches!(self.state, GateState::Gating { remaining: 0 })
    }

    /// Consume the held token. Yields it at most once, and only once the
    /// countdown has elapsed.
    pub fn confirm(&mut self) -> Option<String> {
        if !self.can_confirm() {
            return None;
        }
        self.state = GateState::Redirecting;
        self.token.take()
    }

    /// Navigation handed off; the flow may accept a new submission.
    pub fn finish(&mut self) {
        if self.state == GateState::Redirecting {
            self.state = GateState::Idle;
        }
    }
}

impl Default for GateFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Path the browser-equivalent navigates to once the gate is confirmed.
pub fn download_path(token: &str) -> String {
    format!("/download/{}", urlencoding::encode(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gated_flow(token: &str) -> GateFlow {
        let mut flow = GateFlow::new();
        assert!(flow.submit());
        flow.response_ok(token.to_string());
        flow
    }

    #[test]
    fn submit_refuses_duplicates_while_in_flight() {
        let mut flow = GateFlow::new();
        assert!(flow.submit());
        assert!(!flow.submit());
        assert_eq!(flow.state(), &GateState::AwaitingResponse);
    }

    #[test]
    fn success_opens_gate_at_full_count_with_confirm_disabled() {
        let flow = gated_flow("tok");
        assert_eq!(flow.remaining(), Some(GATE_SECONDS));
        assert!(!flow.can_confirm());
    }

    #[test]
    fn confirm_enabled_exactly_at_zero() {
        let mut flow = gated_flow("tok");
        for expected in (1..=GATE_SECONDS).rev() {
            assert_eq!(flow.remaining(), Some(expected));
            assert!(!flow.can_confirm());
            flow.tick();
        }
        assert_eq!(flow.remaining(), Some(0));
        assert!(flow.can_confirm());
    }

    #[test]
    fn stray_ticks_after_zero_keep_confirm_enabled() {
        let mut flow = gated_flow("tok");
        for _ in 0..GATE_SECONDS + 3 {
            flow.tick();
        }
        assert_eq!(flow.remaining(), Some(0));
        assert!(flow.can_confirm());
    }

    #[test]
    fn confirm_yields_token_once_and_clears_the_slot() {
        let mut flow = gated_flow("abc 123");
        for _ in 0..GATE_SECONDS {
            flow.tick();
        }
        assert_eq!(flow.confirm().as_deref(), Some("abc 123"));
        assert_eq!(flow.state(), &GateState::Redirecting);
        assert_eq!(flow.confirm(), None);
        flow.finish();
        assert_eq!(flow.state(), &GateState::Idle);
    }

    #[test]
    fn confirm_before_zero_yields_nothing() {
        let mut flow = gated_flow("tok");
        flow.tick();
        assert_eq!(flow.confirm(), None);
        assert_eq!(flow.remaining(), Some(GATE_SECONDS - 1));
    }

    #[test]
    fn failure_returns_to_idle_and_allows_retry() {
        let mut flow = GateFlow::new();
        assert!(flow.submit());
        flow.response_failed();
        assert_eq!(flow.state(), &GateState::Idle);
        assert_eq!(flow.remaining(), None);
        assert!(flow.submit());
    }

    #[test]
    fn download_path_percent_encodes_the_token() {
        assert_eq!(download_path("abc 123"), "/download/abc%20123");
        assert_eq!(download_path("video-1a2b.mp4"), "/download/video-1a2b.mp4");
        assert_eq!(download_path("a/b"), "/download/a%2Fb");
    }
}
