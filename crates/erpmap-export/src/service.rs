//! Export orchestration

use std::sync::Arc;
use std::time::Instant;

use erpmap_mapping::DynamicMappingService;
use erpmap_model::Record;
use erpmap_store::{InvoiceSource, MappingRepository};
use tracing::{debug, info};

use crate::format::ExportFormat;
use crate::push::{ErpPusher, LoggingPusher};
use crate::rows::RowBuilder;
use crate::{Error, Result};

/// Parameters of one export run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub erp_name: String,
    pub format: ExportFormat,
    pub flatten: bool,
    /// Drop the ERP's cached rules before mapping
    pub refresh: bool,
}

impl ExportRequest {
    pub fn new(erp_name: impl Into<String>) -> Self {
        Self {
            erp_name: erp_name.into(),
            format: ExportFormat::default(),
            flatten: false,
            refresh: false,
        }
    }

    #[must_use]
    pub fn format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    #[must_use]
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
}

/// Rendered export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
    pub row_count: usize,
}

impl ExportOutput {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    pub fn file_name(&self) -> Option<&'static str> {
        self.format.file_name()
    }
}

/// Maps approved invoices through an ERP's active rules
#[derive(Clone)]
pub struct ExportService {
    repository: MappingRepository,
    invoices: Arc<dyn InvoiceSource>,
    mapper: DynamicMappingService,
    pusher: Arc<dyn ErpPusher>,
}

impl ExportService {
    /// Service with the built-in transforms and a logging pusher
    pub fn new(repository: MappingRepository, invoices: Arc<dyn InvoiceSource>) -> Self {
        Self {
            repository,
            invoices,
            mapper: DynamicMappingService::default(),
            pusher: Arc::new(LoggingPusher),
        }
    }

    #[must_use]
    pub fn with_mapper(mut self, mapper: DynamicMappingService) -> Self {
        self.mapper = mapper;
        self
    }

    #[must_use]
    pub fn with_pusher(mut self, pusher: Arc<dyn ErpPusher>) -> Self {
        self.pusher = pusher;
        self
    }

    pub fn repository(&self) -> &MappingRepository {
        &self.repository
    }

    /// Mapped records for every approved invoice (or invoice item when
    /// flattening), in source order.
    ///
    /// # Errors
    ///
    /// Fails if the ERP is unknown, the store fails, or any record fails to
    /// map. No partial result is returned.
    pub async fn export_mapped(&self, erp_name: &str, flatten: bool) -> Result<Vec<Record>> {
        let rules = self.repository.find_active_by_erp_name(erp_name).await?;
        let invoices = self.invoices.find_approved().await?;
        let sources = RowBuilder::new(flatten).build(&invoices);
        debug!(
            erp = erp_name,
            rules = rules.len(),
            invoices = invoices.len(),
            records = sources.len(),
            flatten,
            "Mapping export records"
        );
        Ok(self.mapper.apply_all(&rules, &sources)?)
    }

    /// Run an export and render it in the requested format.
    ///
    /// # Errors
    ///
    /// See [`ExportService::export_mapped`]; rendering errors are returned too.
    pub async fn export(&self, request: &ExportRequest) -> Result<ExportOutput> {
        let started = Instant::now();
        if request.refresh {
            self.repository.invalidate(&request.erp_name);
        }

        let rows = self
            .export_mapped(&request.erp_name, request.flatten)
            .await?;
        let bytes = request.format.render(&rows)?;

        info!(
            erp = %request.erp_name,
            format = %request.format,
            flatten = request.flatten,
            refresh = request.refresh,
            rows = rows.len(),
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Export finished"
        );
        Ok(ExportOutput {
            bytes,
            format: request.format,
            row_count: rows.len(),
        })
    }

    /// Map and hand the rows to the configured pusher. Returns the row count.
    ///
    /// # Errors
    ///
    /// Mapping errors, or [`Error::Push`] from the pusher.
    pub async fn push_to_erp(&self, erp_name: &str, flatten: bool) -> Result<usize> {
        let rows = self.export_mapped(erp_name, flatten).await?;
        self.pusher.push(erp_name, &rows).await.map_err(|error| match error {
            Error::Push { .. } => error,
            other => Error::push(erp_name, other.to_string()),
        })?;
        Ok(rows.len())
    }
}

impl std::fmt::Debug for ExportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportService")
            .field("repository", &self.repository)
            .field("mapper", &self.mapper)
            .finish_non_exhaustive()
    }
}
