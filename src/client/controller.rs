use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    feed::{EntryFeed, FeedEvent, Subscription},
    token::TokenStore,
    words::{count_words, truncate_words, MAX_WORDS},
    AuthResponse, ClientError, EntryResponse, JournalBackend, PublicUser,
};
use crate::auth::services::{is_valid_email, normalize_email};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    Authenticating,
    SignedIn { user: PublicUser },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Submitting,
    /// `content` is what will be re-sent on retry.
    Failed {
        content: String,
        message: String,
        retryable: bool,
    },
}

/// Holds the signed-in user, the compose buffer and the entry list, and
/// drives the auth and submit workflows against a [`JournalBackend`].
///
/// Every failure ends up in [`SessionController::error_message`]; only a
/// rejected token changes the auth state (back to signed out).
pub struct SessionController<B: JournalBackend, T: TokenStore> {
    backend: Arc<B>,
    tokens: T,
    token: Option<String>,
    auth: AuthState,
    submit: SubmitState,
    compose: String,
    word_count: usize,
    entries: Vec<EntryResponse>,
    last_insight: Option<String>,
    error: Option<String>,
    list_failed: bool,
    feed: Option<Subscription>,
}

impl<B: JournalBackend, T: TokenStore> SessionController<B, T> {
    pub fn new(backend: Arc<B>, tokens: T) -> Self {
        Self {
            backend,
            tokens,
            token: None,
            auth: AuthState::SignedOut,
            submit: SubmitState::Idle,
            compose: String::new(),
            word_count: 0,
            entries: Vec::new(),
            last_insight: None,
            error: None,
            list_failed: false,
            feed: None,
        }
    }

    pub fn auth_state(&self) -> &AuthState {
        &self.auth
    }

    pub fn user(&self) -> Option<&PublicUser> {
        match &self.auth {
            AuthState::SignedIn { user } => Some(user),
            _ => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user().is_some()
    }

    pub fn submit_state(&self) -> &SubmitState {
        &self.submit
    }

    pub fn compose_text(&self) -> &str {
        &self.compose
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn entries(&self) -> &[EntryResponse] {
        &self.entries
    }

    pub fn last_insight(&self) -> Option<&str> {
        self.last_insight.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True when the last submit or list failed and can be re-attempted as is.
    pub fn can_retry(&self) -> bool {
        matches!(self.submit, SubmitState::Failed { retryable: true, .. }) || self.list_failed
    }

    /// True while a feed is attached and its poller is still running.
    pub fn has_feed(&self) -> bool {
        self.feed.as_ref().is_some_and(|f| !f.is_finished())
    }

    // -- Auth --

    /// Resumes a persisted session, validating the stored token first.
    pub async fn restore(&mut self) {
        self.clear_held();
        let token = match self.tokens.load() {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "token store load failed");
                self.error = Some("Could not read the saved session".into());
                return;
            }
        };

        self.auth = AuthState::Authenticating;
        match self.backend.me(&token).await {
            Ok(user) => {
                info!(user_id = %user.id, "session restored");
                self.token = Some(token);
                self.auth = AuthState::SignedIn { user };
                self.error = None;
            }
            Err(e) if e.is_unauthorized() => self.expire_session(),
            Err(e) => {
                // Keep the stored token so a later restore can try again.
                self.auth = AuthState::SignedOut;
                self.error = Some(e.to_string());
            }
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) {
        if email.trim().is_empty() || password.is_empty() {
            self.error = Some("Email and password are required".into());
            return;
        }
        self.reset_local();
        self.auth = AuthState::Authenticating;
        let res = self.backend.login(email, password).await;
        self.finish_auth(res);
    }

    pub async fn register(&mut self, email: &str, password: &str, name: &str) {
        if email.trim().is_empty() || password.is_empty() || name.trim().is_empty() {
            self.error = Some("Email, password and name are required".into());
            return;
        }
        self.reset_local();
        self.auth = AuthState::Authenticating;
        let res = self.backend.register(email, password, name).await;
        self.finish_auth(res);
    }

    fn finish_auth(&mut self, res: Result<AuthResponse, ClientError>) {
        match res {
            Ok(AuthResponse { user, token }) => {
                if let Err(e) = self.tokens.save(&token) {
                    warn!(error = %e, "token store save failed; session will not persist");
                }
                info!(user_id = %user.id, "signed in");
                self.token = Some(token);
                self.auth = AuthState::SignedIn { user };
                self.error = None;
            }
            Err(e) => {
                self.auth = AuthState::SignedOut;
                self.error = Some(e.to_string());
            }
        }
    }

    /// Logs out server-side when possible, then drops all local session state.
    pub async fn sign_out(&mut self) {
        self.stop_feed();
        if let Some(token) = self.token.take() {
            if let Err(e) = self.backend.logout(&token).await {
                debug!(error = %e, "logout request failed; discarding token locally");
            }
        }
        self.reset_local();
        self.error = None;
    }

    /// A rejected token forces the signed-out state.
    fn expire_session(&mut self) {
        info!("session expired");
        self.reset_local();
        self.error = Some("Your session has expired. Please sign in again.".into());
    }

    /// Drops everything tied to the current session, including the stored token.
    fn reset_local(&mut self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "token store clear failed");
        }
        self.clear_held();
    }

    /// Drops the in-memory session; the token store is left alone.
    fn clear_held(&mut self) {
        self.stop_feed();
        self.token = None;
        self.auth = AuthState::SignedOut;
        self.submit = SubmitState::Idle;
        self.compose.clear();
        self.word_count = 0;
        self.entries.clear();
        self.last_insight = None;
        self.list_failed = false;
    }

    fn session(&self) -> Option<(String, PublicUser)> {
        match (&self.token, &self.auth) {
            (Some(token), AuthState::SignedIn { user }) => Some((token.clone(), user.clone())),
            _ => None,
        }
    }

    pub async fn update_email(&mut self, email: &str) {
        let Some((token, _)) = self.session() else {
            self.error = Some("No user logged in".into());
            return;
        };
        if !is_valid_email(&normalize_email(email)) {
            self.error = Some("Invalid email format".into());
            return;
        }
        match self.backend.update_email(&token, email).await {
            Ok(user) => {
                self.auth = AuthState::SignedIn { user };
                self.error = None;
            }
            Err(e) if e.is_unauthorized() => self.expire_session(),
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    // -- Compose & submit --

    pub fn set_compose_text(&mut self, text: impl Into<String>) {
        self.compose = text.into();
        self.update_word_count();
    }

    /// Recounts words and cuts the buffer to the first [`MAX_WORDS`] words.
    pub fn update_word_count(&mut self) {
        if let Some(cut) = truncate_words(&self.compose, MAX_WORDS) {
            self.compose = cut;
        }
        self.word_count = count_words(&self.compose);
    }

    pub async fn submit(&mut self) {
        if self.submit == SubmitState::Submitting {
            return;
        }
        if self.compose.trim().is_empty() {
            self.error = Some("Journal entry cannot be empty".into());
            return;
        }
        let content = self.compose.clone();
        self.send_entry(content).await;
    }

    /// Re-sends the content of a failed submit.
    pub async fn retry(&mut self) {
        match &self.submit {
            SubmitState::Failed {
                content,
                retryable: true,
                ..
            } => {
                let content = content.clone();
                self.send_entry(content).await;
            }
            _ if self.list_failed => self.load_entries().await,
            _ => {}
        }
    }

    async fn send_entry(&mut self, content: String) {
        let Some((token, user)) = self.session() else {
            self.error = Some("No user logged in".into());
            return;
        };

        self.submit = SubmitState::Submitting;
        self.error = None;

        match self.backend.create_entry(&token, user.id, &content).await {
            Ok(entry) => {
                self.last_insight = entry.ai_insight.clone();
                self.merge(entry);
                self.compose.clear();
                self.word_count = 0;
                self.submit = SubmitState::Idle;
            }
            Err(e) if e.is_unauthorized() => self.expire_session(),
            Err(e) => {
                warn!(error = %e, "entry submit failed");
                self.error = Some(e.to_string());
                self.submit = SubmitState::Failed {
                    content,
                    message: e.to_string(),
                    retryable: true,
                };
            }
        }
    }

    /// Inserts `entry` keeping the list newest first; ties go on top.
    fn merge(&mut self, entry: EntryResponse) -> bool {
        if self.entries.iter().any(|e| e.id == entry.id) {
            return false;
        }
        let at = self
            .entries
            .iter()
            .position(|e| e.created_at <= entry.created_at)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, entry);
        true
    }

    // -- Listing --

    pub async fn load_entries(&mut self) {
        let Some((token, user)) = self.session() else {
            self.error = Some("No user logged in".into());
            return;
        };
        self.list_failed = false;
        match self.backend.list_entries(&token, user.id).await {
            Ok(entries) => {
                self.entries = entries;
                self.error = None;
            }
            Err(e) if e.is_unauthorized() => self.expire_session(),
            Err(e) => {
                self.error = Some(format!("Failed to load journal entries: {e}"));
                self.list_failed = true;
            }
        }
    }

    /// Starts polling for entries created elsewhere; replaces any running feed.
    pub fn start_feed(&mut self, every: Duration) {
        let Some((token, user)) = self.session() else {
            return;
        };
        let seen: HashSet<_> = self.entries.iter().map(|e| e.id).collect();
        self.feed = Some(EntryFeed::spawn(
            self.backend.clone(),
            token,
            user.id,
            seen,
            every,
        ));
    }

    pub fn stop_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.cancel();
        }
    }

    /// Merges buffered feed events into the entry list; returns how many
    /// entries were added.
    pub fn drain_feed(&mut self) -> usize {
        let mut events = Vec::new();
        if let Some(feed) = self.feed.as_mut() {
            while let Some(event) = feed.try_next() {
                events.push(event);
            }
        }

        let mut added = 0;
        for event in events {
            match event {
                FeedEvent::Entry(entry) => {
                    if self.merge(entry) {
                        added += 1;
                    }
                }
                FeedEvent::Expired => {
                    self.expire_session();
                    break;
                }
            }
        }
        added
    }
}
