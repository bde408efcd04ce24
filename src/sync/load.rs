//! Two-phase result of a profile load: cached now, authoritative later.

use tokio::sync::oneshot;

use crate::remote::User;

/// Where the final profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
  /// Fresh record from the remote store
  Remote,
  /// Remote refresh failed, serving the cached projection
  Cached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedProfile {
  pub user: User,
  pub source: ProfileSource,
}

#[derive(Debug)]
enum LoadState {
  Loading(oneshot::Receiver<Option<User>>),
  Done(LoadedProfile),
}

/// In-flight profile load.
///
/// The cached profile is available immediately via `provisional()`. The refresh
/// runs on its own task, so dropping this handle does not cancel it.
#[derive(Debug)]
pub struct ProfileLoad {
  provisional: User,
  state: LoadState,
}

impl ProfileLoad {
  pub(crate) fn new(provisional: User, receiver: oneshot::Receiver<Option<User>>) -> Self {
    Self {
      provisional,
      state: LoadState::Loading(receiver),
    }
  }

  /// Cached profile, shown while the refresh is pending.
  pub fn provisional(&self) -> &User {
    &self.provisional
  }

  pub fn is_loading(&self) -> bool {
    matches!(self.state, LoadState::Loading(_))
  }

  /// Check for the refresh result without blocking.
  ///
  /// Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.state {
      LoadState::Loading(rx) => rx,
      LoadState::Done(_) => return false,
    };

    match receiver.try_recv() {
      Ok(outcome) => {
        self.state = LoadState::Done(self.resolve(outcome));
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => false,
      Err(oneshot::error::TryRecvError::Closed) => {
        // Refresh task died without answering
        self.state = LoadState::Done(self.resolve(None));
        true
      }
    }
  }

  /// Wait for the refresh and return the final profile.
  pub async fn finish(self) -> LoadedProfile {
    match self.state {
      LoadState::Done(loaded) => loaded,
      LoadState::Loading(receiver) => {
        let outcome = receiver.await.ok().flatten();
        Self::resolve_with(self.provisional, outcome)
      }
    }
  }

  fn resolve(&self, outcome: Option<User>) -> LoadedProfile {
    Self::resolve_with(self.provisional.clone(), outcome)
  }

  fn resolve_with(provisional: User, outcome: Option<User>) -> LoadedProfile {
    match outcome {
      Some(user) => LoadedProfile {
        user,
        source: ProfileSource::Remote,
      },
      None => LoadedProfile {
        user: provisional,
        source: ProfileSource::Cached,
      },
    }
  }
}
