use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{error, info};

use crate::notice::{Notice, Notifier};
use crate::storage::{StateStorage, StorageError};

static FATAL_TRIGGERED: AtomicBool = AtomicBool::new(false);

/// What happens to the persisted document after an uncaught fault.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FatalPolicy {
  /// Delete the document so the next launch starts from defaults.
  #[default]
  Wipe,
  /// Copy the document to a timestamped backup key, then delete it.
  Backup,
}

pub fn backup_key(key: &str) -> String {
  let timestamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
  format!("{key}.backup-{timestamp}")
}

/// Removes the persisted document under `key` according to `policy` and tells
/// the operator to restart. Returns the backup key when one was written.
pub fn recover_from_fatal(
  storage: &mut dyn StateStorage,
  key: &str,
  policy: FatalPolicy,
  notifier: &dyn Notifier,
) -> Result<Option<String>, StorageError> {
  let mut backup = None;
  if policy == FatalPolicy::Backup {
    if let Some(document) = storage.load(key)? {
      let target = backup_key(key);
      storage.store(&target, &document)?;
      info!("Backed up state {key:?} to {target:?}");
      backup = Some(target);
    }
  }
  storage.remove(key)?;
  error!("Removed persisted state {key:?} after a fatal error");
  notifier.notify(&Notice::Fatal);
  Ok(backup)
}

pub fn fatal_triggered() -> bool {
  FATAL_TRIGGERED.load(Ordering::SeqCst)
}

/// Notifier slot read by the panic hook at the moment of the fault, so the
/// shell can swap in a visible notifier once its window exists.
#[derive(Clone)]
pub struct FatalNotifier {
  current: Arc<RwLock<Arc<dyn Notifier>>>,
}

impl FatalNotifier {
  pub fn new(notifier: Arc<dyn Notifier>) -> Self {
    FatalNotifier { current: Arc::new(RwLock::new(notifier)) }
  }

  pub fn set(&self, notifier: Arc<dyn Notifier>) {
    let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
    *slot = notifier;
  }

  fn current(&self) -> Arc<dyn Notifier> {
    self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
  }
}

impl Notifier for FatalNotifier {
  fn notify(&self, notice: &Notice) {
    self.current().notify(notice);
  }
}

/// Installs a panic hook that applies `policy` to a fresh handle on the
/// persisted document. The hook does not touch the live store, whose lock
/// may be held by the panicking thread. Returns the slot holding the
/// notifier the hook reports through.
pub fn install_panic_hook<S>(make_storage: S, key: String, policy: FatalPolicy, notifier: Arc<dyn Notifier>) -> FatalNotifier
where
  S: Fn() -> Box<dyn StateStorage> + Send + Sync + 'static,
{
  let fatal_notifier = FatalNotifier::new(notifier);
  let hook_notifier = fatal_notifier.clone();
  let previous = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    error!("Caught unhandled error: {info}");
    if !FATAL_TRIGGERED.swap(true, Ordering::SeqCst) {
      let mut storage = make_storage();
      if let Err(e) = recover_from_fatal(storage.as_mut(), &key, policy, &hook_notifier) {
        error!("Fatal recovery failed: {e}");
      }
    }
    previous(info);
  }));
  fatal_notifier
}
