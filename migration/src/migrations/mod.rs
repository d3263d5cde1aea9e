pub mod m202601150001_create_attendance_sessions;
pub mod m202601150002_create_scan_tokens;
pub mod m202601150003_create_attendance_records;
