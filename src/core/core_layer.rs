// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "participants/participant_parser.rs"]
pub mod participants;

#[path = "certificates/certificate_service.rs"]
pub mod certificates;

#[path = "report/run_report.rs"]
pub mod report;
