//! Services that span more than one repository

pub mod book_ingestion;
pub mod record_factory;
pub mod reference_resolver;
