//! Submission pipeline orchestration.
//!
//! The controller owns the whole client-side flow: honeypot check,
//! validation, cooldown check, sanitization, delivery, status reporting.
//! All collaborators are injected at construction; nothing here reaches
//! into ambient state.

use crate::rate_limiter::CooldownGate;
use crate::transport::{SubmissionRequest, Transport, TransportOutcome};
use crate::validator::{is_valid_email, sanitize};

/// User-facing status messages.
pub const MSG_THANKS: &str = "Thanks for signing up!";
pub const MSG_EMAIL_REQUIRED: &str = "Please enter an email address";
pub const MSG_EMAIL_INVALID: &str = "Invalid email address";
pub const MSG_COOLDOWN: &str = "Please wait before submitting again";
pub const MSG_SEND_FAILED: &str = "Something went wrong, please try again";

/// Where the controller reports progress and results.
///
/// In a browser this would be the form's message area, submit button and
/// input field; in `submit` mode it is the terminal.
pub trait StatusSink {
    fn show_success(&self, message: &str);
    fn show_error(&self, message: &str);
    fn clear_message(&self);
    /// Toggle the loading indicator and disable/enable the submit control.
    fn set_loading(&self, loading: bool);
    fn clear_input(&self);
    fn focus_input(&self);
}

/// Terminal state of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Success,
    Error,
}

/// Orchestrates a single signup submission from raw input to settlement.
///
/// `submit` takes `&mut self`, so one submission is in flight at a time by
/// construction, the same way a disabled submit button prevents a second
/// click.
#[derive(Debug)]
pub struct SubmissionController<T: Transport, S: StatusSink> {
    transport: T,
    gate: CooldownGate,
    sink: S,
}

/// Restores the loading indicator on every exit path out of the send phase.
struct LoadingGuard<'a, S: StatusSink> {
    sink: &'a S,
}

impl<'a, S: StatusSink> LoadingGuard<'a, S> {
    fn engage(sink: &'a S) -> Self {
        sink.set_loading(true);
        Self { sink }
    }
}

impl<S: StatusSink> Drop for LoadingGuard<'_, S> {
    fn drop(&mut self) {
        self.sink.set_loading(false);
    }
}

impl<T: Transport, S: StatusSink> SubmissionController<T, S> {
    pub fn new(transport: T, gate: CooldownGate, sink: S) -> Self {
        Self {
            transport,
            gate,
            sink,
        }
    }

    /// Runs the pipeline once: validate, rate-check, deliver, settle.
    ///
    /// `honeypot` carries the hidden anti-bot field. A non-empty value
    /// settles as success without sending anything, so automated fillers
    /// see normal feedback while their input is dropped.
    pub async fn submit(&mut self, raw_email: &str, honeypot: &str) -> Settlement {
        self.sink.clear_message();

        if !honeypot.is_empty() {
            log::info!("honeypot tripped, dropping submission");
            self.sink.show_success(MSG_THANKS);
            return Settlement::Success;
        }

        let email = raw_email.trim();
        if email.is_empty() {
            self.sink.show_error(MSG_EMAIL_REQUIRED);
            self.sink.focus_input();
            return Settlement::Error;
        }
        if !is_valid_email(email) {
            self.sink.show_error(MSG_EMAIL_INVALID);
            self.sink.focus_input();
            return Settlement::Error;
        }

        if self.gate.is_rate_limited() {
            self.sink.show_error(MSG_COOLDOWN);
            return Settlement::Error;
        }

        let request = SubmissionRequest::new(sanitize(email));

        let _loading = LoadingGuard::engage(&self.sink);
        match self.transport.send(&request).await {
            // Unknown means the attempt completed but nothing observed the
            // result; policy here is to report it as delivered.
            TransportOutcome::Success | TransportOutcome::Unknown => {
                if let Err(e) = self.gate.record_submission() {
                    log::warn!("failed to persist cooldown state: {e}");
                }
                self.sink.clear_input();
                self.sink.show_success(MSG_THANKS);
                Settlement::Success
            }
            TransportOutcome::Failure(reason) => {
                log::warn!("delivery failed: {reason}");
                self.sink.show_error(MSG_SEND_FAILED);
                Settlement::Error
            }
        }
    }
}
