//! Clients for Carnegie Mellon web endpoints: the ScottyLabs scheduling API,
//! the Andrew directory search and the cluster printer status dashboard.

pub mod config;
mod directory;
mod error;
mod printer_status;
mod requests;
mod scheduling;
mod semester;
mod text_manipulators;

pub use directory::{
    DIRECTORY_BASE_URL, DirectoryClient, DirectoryInfo, Person, parse_people, parse_person,
    valid_andrew_id,
};
pub use error::{CmuApiError, Result};
pub use printer_status::{
    PRINTER_STATUS_URL, PrinterStatus, PrinterStatusClient, RawPrinterStatus, Readiness,
    derive_status, parse_status_table,
};
pub use requests::RequestClient;
pub use scheduling::{CourseQuery, Department, SCHEDULING_BASE_URL, SchedulingClient};
pub use semester::{Semester, Term};
