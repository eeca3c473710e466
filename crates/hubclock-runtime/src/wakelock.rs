//! Reference-counted kernel wake lock.
//!
//! Linux exposes user-space wake locks through two sysfs nodes: writing a
//! name to `/sys/power/wake_lock` takes the lock and writing the same name
//! to `/sys/power/wake_unlock` drops it. [`Wakelock`] counts outstanding
//! wakeup events and only touches the nodes when the count leaves or
//! returns to zero.

use hubclock_common::config::WakelockConfig;
use hubclock_common::error::{HubError, HubResult};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, trace};

#[derive(Debug)]
struct WakelockInner {
    /// Outstanding wakeup events.
    count: u32,
    /// Whether the kernel lock is currently taken.
    held: bool,
    lock_node: File,
    unlock_node: File,
}

/// Kernel wake lock held while any wakeup event is outstanding.
#[derive(Debug)]
pub struct Wakelock {
    name: String,
    inner: Mutex<WakelockInner>,
}

impl Wakelock {
    /// Open the lock and unlock nodes named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Wakelock`] if either node cannot be opened for
    /// writing or the name is empty.
    pub fn open(config: &WakelockConfig) -> HubResult<Self> {
        if config.name.is_empty() {
            return Err(HubError::Wakelock("wake lock name is empty".into()));
        }

        let lock_node = open_node(&config.lock_path)?;
        let unlock_node = open_node(&config.unlock_path)?;
        info!(name = %config.name, "Wake lock opened");

        Ok(Self {
            name: config.name.clone(),
            inner: Mutex::new(WakelockInner {
                count: 0,
                held: false,
                lock_node,
                unlock_node,
            }),
        })
    }

    /// Register `count` new wakeup events, taking the kernel lock on the
    /// first one.
    ///
    /// # Errors
    ///
    /// Fails on count overflow or if the lock node cannot be written; the
    /// count is left unchanged in both cases.
    pub fn acquire(&self, count: u32) -> HubResult<()> {
        let mut inner = self.lock_inner();
        let held_count = inner.count;
        let Some(new_count) = held_count.checked_add(count) else {
            error!(requested = count, held = held_count, "wake lock count would overflow");
            return Err(HubError::WakelockOverflow {
                requested: count,
                held: held_count,
            });
        };

        if held_count == 0 && !inner.held && count > 0 {
            write_name(&mut inner.lock_node, &self.name)?;
            inner.held = true;
            trace!(name = %self.name, "wake lock acquired");
        }
        inner.count = new_count;
        debug!(name = %self.name, count = new_count, "wake lock references");
        Ok(())
    }

    /// Retire `count` wakeup events, dropping the kernel lock when none
    /// remain.
    ///
    /// # Errors
    ///
    /// Fails if more events are released than are held, or if the unlock
    /// node cannot be written.
    pub fn release(&self, count: u32) -> HubResult<()> {
        let mut inner = self.lock_inner();
        let held_count = inner.count;
        let Some(new_count) = held_count.checked_sub(count) else {
            error!(requested = count, held = held_count, "wake lock over-release");
            return Err(HubError::WakelockUnderflow {
                requested: count,
                held: held_count,
            });
        };

        inner.count = new_count;
        if new_count == 0 && inner.held {
            write_name(&mut inner.unlock_node, &self.name)?;
            inner.held = false;
            trace!(name = %self.name, "wake lock released");
        } else {
            debug!(name = %self.name, count = new_count, "wake lock references remaining");
        }
        Ok(())
    }

    /// Take one reference for the lifetime of the returned guard.
    ///
    /// # Errors
    ///
    /// Same as [`Wakelock::acquire`].
    pub fn guard(&self) -> HubResult<WakeGuard<'_>> {
        self.acquire(1)?;
        Ok(WakeGuard { lock: self })
    }

    /// Name written to the sysfs nodes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Outstanding wakeup events.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.lock_inner().count
    }

    /// Whether the kernel lock is taken.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.lock_inner().held
    }

    fn lock_inner(&self) -> MutexGuard<'_, WakelockInner> {
        // State stays consistent across a panic in a holder; keep going
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for Wakelock {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.held {
            inner.count = 0;
            if let Err(e) = write_name(&mut inner.unlock_node, &self.name) {
                error!(%e, "failed to release wake lock on drop");
            }
            inner.held = false;
        }
    }
}

/// One wake lock reference, released on drop.
#[derive(Debug)]
pub struct WakeGuard<'a> {
    lock: &'a Wakelock,
}

impl Drop for WakeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release(1) {
            error!(%e, "failed to release wake guard");
        }
    }
}

fn open_node(path: &Path) -> HubResult<File> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| HubError::Wakelock(format!("failed to open {}: {e}", path.display())))
}

fn write_name(node: &mut File, name: &str) -> HubResult<()> {
    node.write_all(name.as_bytes())
        .and_then(|()| node.flush())
        .map_err(|e| HubError::Wakelock(format!("failed to write wake lock {name}: {e}")))
}
