//! Bare machine creation.

use std::sync::Mutex;

use charmctl_core::api::{AddMachineArgs, ControlPlane};
use charmctl_core::ModelName;

use crate::error::ReconcileError;

/// Held for the duration of every `AddMachines` call in this process.
static ADD_MACHINE_LOCK: Mutex<()> = Mutex::new(());

/// Add one machine and return its id.
pub fn create_machine<C>(
    control: &C,
    model: &ModelName,
    args: &AddMachineArgs,
) -> Result<String, ReconcileError>
where
    C: ControlPlane + ?Sized,
{
    let _guard = ADD_MACHINE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let id = control
        .add_machine(model, args)
        .map_err(|e| ReconcileError::remote("add machine", e))?;
    tracing::info!(model = %model, machine = %id, "machine added");
    Ok(id)
}
