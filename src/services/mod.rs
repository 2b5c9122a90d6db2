pub mod status_reporter;
