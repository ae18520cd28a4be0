use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::align::align;
use crate::config::SourceOptions;
use crate::error::DataResult;
use crate::fetch::Fetch;
use crate::models::{AlignedTable, CanonicalTable};
use crate::source::{self, Source};

type Slot = Mutex<Option<Arc<CanonicalTable>>>;

/// Fetches and caches one canonical table per source.
///
/// Each source has its own slot lock, held for the whole fetch, so a source
/// is downloaded at most once at a time and readers only ever observe a
/// complete table.
pub struct DataService<F> {
    fetcher: F,
    slots: HashMap<Source, Slot>,
}

impl<F: Fetch> DataService<F> {
    pub fn new(fetcher: F) -> Self {
        let slots = Source::ALL
            .into_iter()
            .map(|source| (source, Mutex::new(None)))
            .collect();
        Self { fetcher, slots }
    }

    pub fn table(&self, source: Source, force: bool) -> DataResult<Arc<CanonicalTable>> {
        let mut slot = self.slots[&source]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(table) = slot.as_ref().filter(|_| !force) {
            return Ok(Arc::clone(table));
        }

        info!("fetching {} data", source.label());
        let text = self.fetcher.fetch_text(source.url())?;
        let table = Arc::new(source::parse(source, &text)?);
        *slot = Some(Arc::clone(&table));
        Ok(table)
    }

    pub fn aligned(
        &self,
        source: Source,
        options: &SourceOptions,
        force: bool,
    ) -> DataResult<AlignedTable> {
        let table = self.table(source, force)?;
        let restricted = source::restrict(&table, options)?;
        align(&restricted, options.n, options.max_date)
    }
}
