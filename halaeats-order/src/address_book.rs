use halaeats_core::{Address, CoreError, CoreResult};
use uuid::Uuid;

use crate::ticket::{Generation, Ticket};

/// Outcome of applying an address load.
#[derive(Debug)]
pub enum LoadOutcome {
    /// List replaced. `auto_selected` is set when this load picked the selection.
    Loaded { auto_selected: Option<Uuid> },
    /// A newer load or a save started after this one; result dropped.
    Stale,
    /// Fetch failed; the previous list is kept.
    Failed(CoreError),
}

#[derive(Debug)]
pub enum SaveOutcome {
    Updated(Address),
    Added(Address),
    Failed(CoreError),
}

/// A user's saved addresses plus the checkout's selected one.
///
/// Async work is split into `begin_*` / `finish_*` so the owner can release
/// its lock while the service call is in flight. `is_loading()` stays true
/// until every started operation has finished.
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    addresses: Vec<Address>,
    selected: Option<Uuid>,
    in_flight: u32,
    loads: Generation,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn selected_id(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Address> {
        let id = self.selected?;
        self.get(id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Address> {
        self.addresses.iter().find(|a| a.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Select a known address. Unknown ids leave the selection untouched.
    pub fn select(&mut self, id: Uuid) -> bool {
        if self.get(id).is_some() {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn begin_load(&mut self) -> Ticket {
        self.in_flight += 1;
        self.loads.issue()
    }

    pub fn finish_load(&mut self, ticket: Ticket, result: CoreResult<Vec<Address>>) -> LoadOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);
        if !self.loads.is_current(ticket) {
            return LoadOutcome::Stale;
        }

        match result {
            Ok(addresses) => {
                self.addresses = addresses;
                if self.selected.is_some_and(|id| self.get(id).is_none()) {
                    self.selected = None;
                }
                let auto_selected = if self.selected.is_none() {
                    self.selected = self.default_choice();
                    self.selected
                } else {
                    None
                };
                LoadOutcome::Loaded { auto_selected }
            }
            Err(e) => LoadOutcome::Failed(e),
        }
    }

    /// Start a save. Loads already in flight are invalidated so they cannot
    /// overwrite the list with a snapshot that predates the save.
    pub fn begin_save(&mut self) {
        self.in_flight += 1;
        self.loads.bump();
    }

    pub fn finish_save(&mut self, result: CoreResult<Address>) -> SaveOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);
        match result {
            Ok(address) => self.upsert(address),
            Err(e) => SaveOutcome::Failed(e),
        }
    }

    fn default_choice(&self) -> Option<Uuid> {
        self.addresses
            .iter()
            .find(|a| a.is_default)
            .or_else(|| self.addresses.first())
            .map(|a| a.id)
    }

    fn upsert(&mut self, address: Address) -> SaveOutcome {
        if address.is_default {
            for other in self.addresses.iter_mut().filter(|a| a.id != address.id) {
                other.is_default = false;
            }
        }

        if let Some(existing) = self.addresses.iter_mut().find(|a| a.id == address.id) {
            *existing = address.clone();
            SaveOutcome::Updated(address)
        } else {
            self.selected = Some(address.id);
            self.addresses.push(address.clone());
            SaveOutcome::Added(address)
        }
    }
}
