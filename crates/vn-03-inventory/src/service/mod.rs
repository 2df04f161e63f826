//! Filter building, inventory assembly and the reconciliation driver.

pub mod inventory;
pub mod reconcile;


pub use inventory::InventoryService;
pub use reconcile::ReconcileReport;
